use crate::error::{Error, Result};
use crate::models::question::Question;
use crate::models::test::{Test, TestChanges};
use crate::models::test_result::TestResult;
use crate::models::test_session::TestSession;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Everything the services need from persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuizStore: Send + Sync {
    /// Inserts the test together with its initial question bank.
    async fn create_test(&self, test: Test, questions: Vec<Question>) -> Result<Test>;

    async fn get_test(&self, test_id: Uuid) -> Result<Test>;

    /// Newest first. Returns the page and the total row count.
    async fn list_tests(&self, page: i64, per_page: i64) -> Result<(Vec<Test>, i64)>;

    async fn update_test(&self, test_id: Uuid, changes: TestChanges) -> Result<Test>;

    /// Removes the test with its questions, sessions and results.
    async fn delete_test(&self, test_id: Uuid) -> Result<bool>;

    /// The test's questions ordered by position.
    async fn fetch_question_bank(&self, test_id: Uuid) -> Result<Vec<Question>>;

    /// Appends a question after the current last position.
    async fn insert_question(&self, question: Question) -> Result<Question>;

    async fn delete_question(&self, test_id: Uuid, question_id: Uuid) -> Result<bool>;

    /// Inserts the session unless the learner already used `attempts_cap`
    /// attempts at the test (results, live sessions and abandoned sessions).
    /// The check and the insert happen as one unit; an exhausted cap is
    /// `Forbidden`.
    async fn persist_session(
        &self,
        session: TestSession,
        attempts_cap: Option<i32>,
    ) -> Result<TestSession>;

    async fn fetch_session(&self, session_id: &str) -> Result<TestSession>;

    /// Moves expired sessions out of the live set. They keep counting as
    /// attempts.
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Stores the result and its answer records and removes the session, as
    /// one unit. Fails with `NotFound` when the session is already gone.
    async fn persist_result(&self, result: TestResult) -> Result<TestResult>;

    async fn get_result(&self, result_id: Uuid) -> Result<TestResult>;

    async fn list_results(&self, test_id: Uuid) -> Result<Vec<TestResult>>;
}

/// Error returned when a learner has no attempts left at a test.
pub fn attempts_exhausted(used: i64, cap: i32) -> Error {
    Error::Forbidden(format!(
        "attempts_exhausted: {} of {} attempts used",
        used, cap
    ))
}
