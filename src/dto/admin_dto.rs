use crate::models::question::{Question, QuestionKind};
use crate::models::test::Test;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateChoice {
    /// Kept when supplied so existing clients can reference choices by their own ids.
    pub id: Option<Uuid>,
    #[validate(length(min = 1, max = 1024))]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateQuestion {
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[validate(length(min = 1, max = 4096))]
    pub text: String,
    pub description: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub choices: Vec<CreateChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTestPayload {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    #[validate(range(min = 1, message = "questions_count must be at least 1"))]
    pub questions_count: i32,
    #[validate(range(min = 0, message = "minimum_correct_answers cannot be negative"))]
    pub minimum_correct_answers: i32,
    pub auto_score: Option<bool>,
    #[validate(range(min = 1, message = "Time limit must be at least 1 minute"))]
    pub time_in_minutes: Option<i32>,
    #[validate(range(min = 1, message = "Attempts must be at least 1"))]
    pub attempts: Option<i32>,
    pub questions: Option<Vec<CreateQuestion>>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTestPayload {
    #[serde(default, deserialize_with = "trim_optional_string")]
    #[validate(length(max = 200))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "trim_optional_string")]
    pub description: Option<String>,

    #[validate(range(min = 1, message = "questions_count must be at least 1"))]
    pub questions_count: Option<i32>,

    #[validate(range(min = 0, message = "minimum_correct_answers cannot be negative"))]
    pub minimum_correct_answers: Option<i32>,

    pub auto_score: Option<bool>,

    #[validate(range(min = 1, message = "Time limit must be at least 1 minute"))]
    pub time_in_minutes: Option<i32>,

    #[validate(range(min = 1, message = "Attempts must be at least 1"))]
    pub attempts: Option<i32>,
}

// Blank strings mean "leave unchanged".
fn trim_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PaginatedTests {
    #[serde(rename = "items")]
    pub tests: Vec<Test>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct TestDetail {
    #[serde(flatten)]
    pub test: Test,
    pub questions: Vec<Question>,
}
