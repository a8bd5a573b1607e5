use crate::database::store::QuizStore;
use crate::error::{Error, Result};
use crate::models::question::{PublicQuestion, Question};
use crate::models::test::Test;
use crate::models::test_result::TestResult;
use crate::models::test_session::TestSession;
use crate::services::sampler;
use crate::services::scoring_service::{ScoringRules, ScoringService, SubmittedAnswer};
use crate::utils::token::generate_session_id;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

const SESSION_ID_LENGTH: usize = 32;

/// A session together with what the learner is shown for it.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub session: TestSession,
    pub test: Test,
    pub questions: Vec<PublicQuestion>,
}

#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn QuizStore>,
}

impl SessionService {
    pub fn new(store: Arc<dyn QuizStore>) -> Self {
        Self { store }
    }

    pub async fn start_session(
        &self,
        test_id: Uuid,
        learner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionView> {
        let test = self.store.get_test(test_id).await?;
        let bank = self.store.fetch_question_bank(test_id).await?;
        let bank_ids: Vec<Uuid> = bank.iter().map(|q| q.id).collect();
        let session_id = generate_session_id(SESSION_ID_LENGTH);
        let question_ids =
            sampler::sample_questions(&bank_ids, test.questions_count.max(0) as usize, &session_id);
        if question_ids.is_empty() {
            return Err(Error::BadRequest("Test has no questions".to_string()));
        }

        let session = TestSession {
            id: session_id,
            test_id,
            learner_id: learner_id.to_string(),
            question_ids,
            created_at: now,
            expires_at: test
                .time_in_minutes
                .map(|minutes| now + Duration::minutes(minutes as i64)),
        };
        let session = self
            .store
            .persist_session(session, test.attempts)
            .await
            .map_err(|e| {
                if let Error::Forbidden(reason) = &e {
                    tracing::warn!(test_id = %test_id, learner_id, reason = %reason, "session start refused");
                }
                e
            })?;
        let questions = present(&session, &bank)?;

        tracing::info!(
            test_id = %test_id,
            learner_id,
            questions = session.question_ids.len(),
            expires_at = ?session.expires_at,
            "test session started"
        );
        Ok(SessionView {
            session,
            test,
            questions,
        })
    }

    pub async fn get_session(
        &self,
        session_id: &str,
        learner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionView> {
        let session = self.live_session(session_id, learner_id, now).await?;
        let test = self.store.get_test(session.test_id).await?;
        let bank = self.store.fetch_question_bank(session.test_id).await?;
        let questions = present(&session, &bank)?;
        Ok(SessionView {
            session,
            test,
            questions,
        })
    }

    pub async fn submit(
        &self,
        session_id: &str,
        learner_id: &str,
        answers: &[SubmittedAnswer],
        now: DateTime<Utc>,
    ) -> Result<TestResult> {
        let session = self.live_session(session_id, learner_id, now).await?;
        let test = self.store.get_test(session.test_id).await?;
        let bank = self.store.fetch_question_bank(session.test_id).await?;
        let assigned = assigned_questions(&session, bank)?;

        let rules = ScoringRules {
            minimum_correct_answers: test.minimum_correct_answers,
            auto_score: test.auto_score,
        };
        let card = ScoringService::score(rules, &assigned, answers).map_err(|e| {
            tracing::warn!(session_id, error = %e, "submission rejected");
            e
        })?;

        let result = TestResult {
            id: Uuid::new_v4(),
            session_id: session.id.clone(),
            test_id: session.test_id,
            learner_id: session.learner_id.clone(),
            answers: card.answers,
            count_correct: card.count_correct,
            count_incorrect: card.count_incorrect,
            suggested_result_type: card.suggested_result_type,
            result_type: card.result_type,
            created_at: now,
        };
        let stored = self.store.persist_result(result).await?;

        tracing::info!(
            result_id = %stored.id,
            test_id = %stored.test_id,
            count_correct = stored.count_correct,
            count_incorrect = stored.count_incorrect,
            result_type = stored.result_type.as_str(),
            "test session scored"
        );
        Ok(stored)
    }

    pub async fn get_learner_result(&self, result_id: Uuid, learner_id: &str) -> Result<TestResult> {
        let result = self.store.get_result(result_id).await?;
        if result.learner_id != learner_id {
            return Err(Error::NotFound(format!("Result {} not found", result_id)));
        }
        Ok(result)
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let removed = self.store.delete_expired_sessions(now).await?;
        if removed > 0 {
            tracing::info!(removed, "expired test sessions removed");
        }
        Ok(removed)
    }

    /// Loads a session owned by `learner_id` that has not run out of time.
    /// Sessions of other learners look absent.
    async fn live_session(
        &self,
        session_id: &str,
        learner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<TestSession> {
        let session = self.store.fetch_session(session_id).await?;
        if session.learner_id != learner_id {
            return Err(Error::NotFound("Test session not found".to_string()));
        }
        if session.is_expired(now) {
            return Err(Error::Forbidden("session_expired".to_string()));
        }
        Ok(session)
    }
}

fn present(session: &TestSession, bank: &[Question]) -> Result<Vec<PublicQuestion>> {
    sampler::present_session(&session.question_ids, bank, &session.id)
        .map_err(|missing| Error::NotFound(format!("Question {} no longer exists", missing)))
}

/// The session's questions in assignment order.
fn assigned_questions(session: &TestSession, bank: Vec<Question>) -> Result<Vec<Question>> {
    let mut by_id: std::collections::HashMap<Uuid, Question> =
        bank.into_iter().map(|q| (q.id, q)).collect();
    session
        .question_ids
        .iter()
        .map(|id| {
            by_id
                .remove(id)
                .ok_or_else(|| Error::NotFound(format!("Question {} no longer exists", id)))
        })
        .collect()
}
