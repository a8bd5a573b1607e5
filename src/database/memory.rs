use crate::database::store::{attempts_exhausted, QuizStore};
use crate::error::{Error, Result};
use crate::models::question::Question;
use crate::models::test::{Test, TestChanges};
use crate::models::test_result::{AnsweredQuestion, TestResult};
use crate::models::test_session::TestSession;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    tests: HashMap<Uuid, Test>,
    questions: HashMap<Uuid, Question>,
    sessions: HashMap<String, TestSession>,
    /// Expired sessions removed by the sweeper, kept as used attempts.
    abandoned: HashMap<String, TestSession>,
    /// Result rows, stored without their answers.
    results: HashMap<Uuid, TestResult>,
    answer_rows: HashMap<Uuid, Vec<AnsweredQuestion>>,
}

/// Process-local store. Multi-step writes are applied to a copy of the state
/// and swapped in only when every step succeeded.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_answer_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the answer-row step of `persist_result` fail until reset.
    pub fn fail_answer_writes(&self, fail: bool) {
        self.fail_answer_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| Error::Internal(format!("memory store poisoned: {}", e)))
    }

    fn write_answer_rows(&self, state: &mut MemoryState, result_id: Uuid, answers: Vec<AnsweredQuestion>) -> Result<()> {
        if self.fail_answer_writes.load(Ordering::SeqCst) {
            return Err(Error::Internal("answer rows could not be written".to_string()));
        }
        state.answer_rows.insert(result_id, answers);
        Ok(())
    }
}

impl MemoryState {
    fn attempts_used(&self, test_id: Uuid, learner_id: &str) -> i64 {
        let owned = |test: Uuid, learner: &str| test == test_id && learner == learner_id;
        let results = self
            .results
            .values()
            .filter(|r| owned(r.test_id, &r.learner_id))
            .count();
        let sessions = self
            .sessions
            .values()
            .chain(self.abandoned.values())
            .filter(|s| owned(s.test_id, &s.learner_id))
            .count();
        (results + sessions) as i64
    }
}

fn assemble(state: &MemoryState, row: &TestResult) -> TestResult {
    let mut result = row.clone();
    result.answers = state.answer_rows.get(&row.id).cloned().unwrap_or_default();
    result
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn create_test(&self, test: Test, questions: Vec<Question>) -> Result<Test> {
        let mut state = self.lock()?;
        if state.tests.contains_key(&test.id) {
            return Err(Error::Conflict(format!("test {} already exists", test.id)));
        }
        for question in questions {
            state.questions.insert(question.id, question);
        }
        state.tests.insert(test.id, test.clone());
        Ok(test)
    }

    async fn get_test(&self, test_id: Uuid) -> Result<Test> {
        let state = self.lock()?;
        state
            .tests
            .get(&test_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Test {} not found", test_id)))
    }

    async fn list_tests(&self, page: i64, per_page: i64) -> Result<(Vec<Test>, i64)> {
        let state = self.lock()?;
        let mut tests: Vec<Test> = state.tests.values().cloned().collect();
        tests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = tests.len() as i64;
        let offset = (page - 1).max(0).saturating_mul(per_page.max(0));
        let items = tests
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(per_page).unwrap_or(0))
            .collect();
        Ok((items, total))
    }

    async fn update_test(&self, test_id: Uuid, changes: TestChanges) -> Result<Test> {
        let mut state = self.lock()?;
        let test = state
            .tests
            .get_mut(&test_id)
            .ok_or_else(|| Error::NotFound(format!("Test {} not found", test_id)))?;
        changes.apply_to(test);
        test.updated_at = Utc::now();
        Ok(test.clone())
    }

    async fn delete_test(&self, test_id: Uuid) -> Result<bool> {
        let mut state = self.lock()?;
        if state.tests.remove(&test_id).is_none() {
            return Ok(false);
        }
        state.questions.retain(|_, q| q.test_id != test_id);
        state.sessions.retain(|_, s| s.test_id != test_id);
        state.abandoned.retain(|_, s| s.test_id != test_id);
        let removed: Vec<Uuid> = state
            .results
            .values()
            .filter(|r| r.test_id == test_id)
            .map(|r| r.id)
            .collect();
        for id in removed {
            state.results.remove(&id);
            state.answer_rows.remove(&id);
        }
        Ok(true)
    }

    async fn fetch_question_bank(&self, test_id: Uuid) -> Result<Vec<Question>> {
        let state = self.lock()?;
        let mut bank: Vec<Question> = state
            .questions
            .values()
            .filter(|q| q.test_id == test_id)
            .cloned()
            .collect();
        bank.sort_by_key(|q| q.position);
        Ok(bank)
    }

    async fn insert_question(&self, mut question: Question) -> Result<Question> {
        let mut state = self.lock()?;
        if !state.tests.contains_key(&question.test_id) {
            return Err(Error::NotFound(format!("Test {} not found", question.test_id)));
        }
        question.position = state
            .questions
            .values()
            .filter(|q| q.test_id == question.test_id)
            .map(|q| q.position + 1)
            .max()
            .unwrap_or(0);
        state.questions.insert(question.id, question.clone());
        Ok(question)
    }

    async fn delete_question(&self, test_id: Uuid, question_id: Uuid) -> Result<bool> {
        let mut state = self.lock()?;
        let owned = state
            .questions
            .get(&question_id)
            .is_some_and(|q| q.test_id == test_id);
        if owned {
            state.questions.remove(&question_id);
        }
        Ok(owned)
    }

    async fn persist_session(
        &self,
        session: TestSession,
        attempts_cap: Option<i32>,
    ) -> Result<TestSession> {
        let mut state = self.lock()?;
        if !state.tests.contains_key(&session.test_id) {
            return Err(Error::NotFound(format!("Test {} not found", session.test_id)));
        }
        if let Some(cap) = attempts_cap {
            let used = state.attempts_used(session.test_id, &session.learner_id);
            if used >= cap as i64 {
                return Err(attempts_exhausted(used, cap));
            }
        }
        if state.sessions.contains_key(&session.id) {
            return Err(Error::Conflict("session id already in use".to_string()));
        }
        state.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn fetch_session(&self, session_id: &str) -> Result<TestSession> {
        let state = self.lock()?;
        state
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::NotFound("Test session not found".to_string()))
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut state = self.lock()?;
        let expired: Vec<String> = state
            .sessions
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| s.id.clone())
            .collect();
        for id in &expired {
            if let Some(session) = state.sessions.remove(id) {
                state.abandoned.insert(session.id.clone(), session);
            }
        }
        Ok(expired.len() as u64)
    }

    async fn persist_result(&self, result: TestResult) -> Result<TestResult> {
        let mut state = self.lock()?;
        let mut staged = state.clone();

        if staged.sessions.remove(&result.session_id).is_none() {
            return Err(Error::NotFound(
                "Test session not found or already submitted".to_string(),
            ));
        }
        if staged.results.values().any(|r| r.session_id == result.session_id) {
            return Err(Error::Conflict("session already has a result".to_string()));
        }

        let mut row = result.clone();
        let answers = std::mem::take(&mut row.answers);
        staged.results.insert(row.id, row);
        self.write_answer_rows(&mut staged, result.id, answers)?;

        *state = staged;
        Ok(result)
    }

    async fn get_result(&self, result_id: Uuid) -> Result<TestResult> {
        let state = self.lock()?;
        state
            .results
            .get(&result_id)
            .map(|row| assemble(&state, row))
            .ok_or_else(|| Error::NotFound(format!("Result {} not found", result_id)))
    }

    async fn list_results(&self, test_id: Uuid) -> Result<Vec<TestResult>> {
        let state = self.lock()?;
        let mut results: Vec<TestResult> = state
            .results
            .values()
            .filter(|r| r.test_id == test_id)
            .map(|row| assemble(&state, row))
            .collect();
        results.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_result::ResultType;
    use chrono::Duration;

    fn test_row() -> Test {
        let now = Utc::now();
        Test {
            id: Uuid::new_v4(),
            title: "Rust basics".into(),
            description: None,
            questions_count: 1,
            minimum_correct_answers: 1,
            auto_score: true,
            time_in_minutes: None,
            attempts: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn session(test_id: Uuid, id: &str, expires_at: Option<DateTime<Utc>>) -> TestSession {
        TestSession {
            id: id.into(),
            test_id,
            learner_id: "learner-1".into(),
            question_ids: vec![],
            created_at: Utc::now(),
            expires_at,
        }
    }

    fn result_for(session: &TestSession) -> TestResult {
        TestResult {
            id: Uuid::new_v4(),
            session_id: session.id.clone(),
            test_id: session.test_id,
            learner_id: session.learner_id.clone(),
            answers: vec![AnsweredQuestion {
                question_id: Uuid::new_v4(),
                is_correct: true,
                choices: vec![],
            }],
            count_correct: 1,
            count_incorrect: 0,
            suggested_result_type: ResultType::Passed,
            result_type: ResultType::Passed,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn failed_answer_write_leaves_nothing_behind() {
        let store = MemoryStore::new();
        let test = store.create_test(test_row(), vec![]).await.unwrap();
        let s = store.persist_session(session(test.id, "sess-1", None), None).await.unwrap();
        let result = result_for(&s);

        store.fail_answer_writes(true);
        assert!(store.persist_result(result.clone()).await.is_err());
        assert!(matches!(store.get_result(result.id).await, Err(Error::NotFound(_))));
        assert!(store.list_results(test.id).await.unwrap().is_empty());
        assert!(store.fetch_session("sess-1").await.is_ok());

        store.fail_answer_writes(false);
        let stored = store.persist_result(result.clone()).await.unwrap();
        assert_eq!(store.get_result(stored.id).await.unwrap(), result);
        assert!(store.fetch_session("sess-1").await.is_err());
    }

    #[tokio::test]
    async fn second_submission_finds_no_session() {
        let store = MemoryStore::new();
        let test = store.create_test(test_row(), vec![]).await.unwrap();
        let s = store.persist_session(session(test.id, "once", None), None).await.unwrap();

        store.persist_result(result_for(&s)).await.unwrap();
        let err = store.persist_result(result_for(&s)).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(store.list_results(test.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sweeps_only_expired_sessions() {
        let store = MemoryStore::new();
        let test = store.create_test(test_row(), vec![]).await.unwrap();
        let now = Utc::now();
        store
            .persist_session(session(test.id, "old", Some(now - Duration::minutes(1))), None)
            .await
            .unwrap();
        store
            .persist_session(session(test.id, "live", Some(now + Duration::minutes(5))), None)
            .await
            .unwrap();
        store.persist_session(session(test.id, "untimed", None), None).await.unwrap();

        assert_eq!(store.delete_expired_sessions(now).await.unwrap(), 1);
        assert!(store.fetch_session("old").await.is_err());
        assert!(store.fetch_session("live").await.is_ok());
        assert_eq!(store.lock().unwrap().attempts_used(test.id, "learner-1"), 3);
    }

    #[tokio::test]
    async fn swept_sessions_still_use_up_attempts() {
        let store = MemoryStore::new();
        let test = store.create_test(test_row(), vec![]).await.unwrap();
        let now = Utc::now();
        store
            .persist_session(session(test.id, "first", Some(now + Duration::minutes(5))), Some(1))
            .await
            .unwrap();
        assert_eq!(
            store.delete_expired_sessions(now + Duration::minutes(6)).await.unwrap(),
            1
        );

        let err = store
            .persist_session(session(test.id, "second", None), Some(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        assert!(store.fetch_session("second").await.is_err());
    }

    #[tokio::test]
    async fn concurrent_starts_respect_the_cap() {
        let store = MemoryStore::new();
        let test_id = store.create_test(test_row(), vec![]).await.unwrap().id;

        let starts: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let id = format!("race-{}", i);
                tokio::spawn(async move {
                    store.persist_session(session(test_id, &id, None), Some(2)).await
                })
            })
            .collect();
        let mut opened = 0;
        for handle in starts {
            if handle.await.unwrap().is_ok() {
                opened += 1;
            }
        }
        assert_eq!(opened, 2);
    }

    #[tokio::test]
    async fn far_pages_are_empty() {
        let store = MemoryStore::new();
        store.create_test(test_row(), vec![]).await.unwrap();
        let (items, total) = store.list_tests(i64::MAX, 100).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn deleting_a_test_cascades() {
        let store = MemoryStore::new();
        let test = store.create_test(test_row(), vec![]).await.unwrap();
        let s = store.persist_session(session(test.id, "gone", None), None).await.unwrap();
        let result = store.persist_result(result_for(&s)).await.unwrap();

        assert!(store.delete_test(test.id).await.unwrap());
        assert!(store.get_result(result.id).await.is_err());
        assert!(!store.delete_test(test.id).await.unwrap());
    }
}
