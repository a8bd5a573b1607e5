pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::database::store::QuizStore;
use crate::services::{session_service::SessionService, test_service::TestService};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub test_service: TestService,
    pub session_service: SessionService,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(store: Arc<dyn QuizStore>, jwt_secret: &str) -> Self {
        Self {
            test_service: TestService::new(store.clone()),
            session_service: SessionService::new(store),
            jwt_secret: Arc::from(jwt_secret),
        }
    }
}
