pub mod admin;
pub mod health;
pub mod public;

use axum::{
    extract::FromRequest,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};

use crate::error::Error;
use crate::middleware::{auth, rate_limit};
use crate::AppState;

/// JSON body extractor whose rejections use the API error format.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct AppJson<T>(pub T);

/// All routes with their auth and rate-limit layers. Auth runs first so the
/// limiter can key on the verified subject. Outer layers such as tracing and
/// CORS are added by the binary.
pub fn build_router(state: AppState, admin_rps: u32, learner_rps: u32) -> Router {
    let admin_api = Router::new()
        .route(
            "/api/admin/tests",
            get(admin::list_tests).post(admin::create_test),
        )
        .route(
            "/api/admin/tests/:id",
            get(admin::get_test)
                .patch(admin::update_test)
                .delete(admin::delete_test),
        )
        .route("/api/admin/tests/:id/questions", post(admin::add_question))
        .route(
            "/api/admin/tests/:id/questions/:question_id",
            delete(admin::delete_question),
        )
        .route("/api/admin/tests/:id/results", get(admin::list_results))
        .route("/api/admin/results/:id", get(admin::get_result))
        .route_layer(from_fn_with_state(
            rate_limit::new_rps_state(admin_rps),
            rate_limit::rps_middleware,
        ))
        .route_layer(from_fn_with_state(state.clone(), auth::require_admin));

    let learner_api = Router::new()
        .route("/api/tests/:id/sessions", post(public::start_session))
        .route("/api/sessions/:id", get(public::get_session))
        .route("/api/sessions/:id/submit", post(public::submit_session))
        .route("/api/results/:id", get(public::get_result))
        .route_layer(from_fn_with_state(
            rate_limit::new_rps_state(learner_rps),
            rate_limit::rps_middleware,
        ))
        .route_layer(from_fn_with_state(state.clone(), auth::require_learner));

    Router::new()
        .route("/health", get(health::health))
        .merge(admin_api)
        .merge(learner_api)
        .with_state(state)
}
