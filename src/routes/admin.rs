use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;

use crate::dto::admin_dto::{
    CreateQuestion, CreateTestPayload, ListQuery, PaginatedTests, TestDetail, UpdateTestPayload,
};
use crate::middleware::auth::Claims;
use crate::models::test::Test;
use crate::models::test_result::TestResult;
use crate::routes::AppJson;
use crate::AppState;

#[axum::debug_handler]
pub async fn create_test(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<CreateTestPayload>,
) -> crate::error::Result<Response> {
    let detail = state.test_service.create_test(payload, &claims.sub).await?;
    Ok((StatusCode::CREATED, Json(detail)).into_response())
}

#[axum::debug_handler]
pub async fn list_tests(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> crate::error::Result<Json<PaginatedTests>> {
    let page = state
        .test_service
        .list_tests(query.page.unwrap_or(1), query.per_page.unwrap_or(20))
        .await?;
    Ok(Json(page))
}

#[axum::debug_handler]
pub async fn get_test(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
) -> crate::error::Result<Json<TestDetail>> {
    Ok(Json(state.test_service.get_test(test_id).await?))
}

#[axum::debug_handler]
pub async fn update_test(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
    AppJson(payload): AppJson<UpdateTestPayload>,
) -> crate::error::Result<Json<Test>> {
    Ok(Json(state.test_service.update_test(test_id, payload).await?))
}

#[axum::debug_handler]
pub async fn delete_test(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
) -> crate::error::Result<StatusCode> {
    state.test_service.delete_test(test_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn add_question(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
    AppJson(payload): AppJson<CreateQuestion>,
) -> crate::error::Result<Response> {
    let question = state.test_service.add_question(test_id, payload).await?;
    Ok((StatusCode::CREATED, Json(question)).into_response())
}

#[axum::debug_handler]
pub async fn delete_question(
    State(state): State<AppState>,
    Path((test_id, question_id)): Path<(Uuid, Uuid)>,
) -> crate::error::Result<StatusCode> {
    state.test_service.delete_question(test_id, question_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn list_results(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
) -> crate::error::Result<Json<Vec<TestResult>>> {
    Ok(Json(state.test_service.list_results(test_id).await?))
}

#[axum::debug_handler]
pub async fn get_result(
    State(state): State<AppState>,
    Path(result_id): Path<Uuid>,
) -> crate::error::Result<Json<TestResult>> {
    Ok(Json(state.test_service.get_result(result_id).await?))
}
