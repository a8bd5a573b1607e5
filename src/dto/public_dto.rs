use crate::models::question::PublicQuestion;
use crate::services::scoring_service::SubmittedAnswer;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub test_id: uuid::Uuid,
    pub title: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub time_remaining_seconds: Option<i64>,
    pub questions: Vec<PublicQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitSessionRequest {
    #[validate(length(max = 500))]
    pub answers: Vec<SubmittedAnswer>,
}
