use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::dto::public_dto::{SessionResponse, SubmitSessionRequest};
use crate::middleware::auth::Claims;
use crate::models::test_result::LearnerResult;
use crate::services::session_service::SessionView;
use crate::routes::AppJson;
use crate::AppState;

fn session_response(view: SessionView, now: DateTime<Utc>) -> SessionResponse {
    SessionResponse {
        session_id: view.session.id,
        test_id: view.test.id,
        title: view.test.title,
        started_at: view.session.created_at,
        expires_at: view.session.expires_at,
        time_remaining_seconds: view
            .session
            .expires_at
            .map(|at| (at - now).num_seconds().max(0)),
        questions: view.questions,
    }
}

#[axum::debug_handler]
pub async fn start_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let now = Utc::now();
    let view = state
        .session_service
        .start_session(test_id, &claims.sub, now)
        .await?;
    Ok((StatusCode::CREATED, Json(session_response(view, now))).into_response())
}

#[axum::debug_handler]
pub async fn get_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<String>,
) -> crate::error::Result<Json<SessionResponse>> {
    let now = Utc::now();
    let view = state
        .session_service
        .get_session(&session_id, &claims.sub, now)
        .await?;
    Ok(Json(session_response(view, now)))
}

#[axum::debug_handler]
pub async fn submit_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<String>,
    AppJson(payload): AppJson<SubmitSessionRequest>,
) -> crate::error::Result<Json<LearnerResult>> {
    payload.validate()?;
    let result = state
        .session_service
        .submit(&session_id, &claims.sub, &payload.answers, Utc::now())
        .await?;
    Ok(Json(result.into()))
}

#[axum::debug_handler]
pub async fn get_result(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(result_id): Path<Uuid>,
) -> crate::error::Result<Json<LearnerResult>> {
    let result = state
        .session_service
        .get_learner_result(result_id, &claims.sub)
        .await?;
    Ok(Json(result.into()))
}
