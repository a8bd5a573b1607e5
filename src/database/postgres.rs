use crate::database::store::{attempts_exhausted, QuizStore};
use crate::error::{Error, Result};
use crate::models::question::{AnswerChoice, Question, QuestionKind};
use crate::models::test::{Test, TestChanges};
use crate::models::test_result::{AnsweredQuestion, DetailedChoice, ResultType, TestResult};
use crate::models::test_session::TestSession;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct QuestionRow {
    id: Uuid,
    test_id: Uuid,
    position: i32,
    kind: String,
    text: String,
    description: Option<String>,
    image_url: Option<String>,
    choices: Json<Vec<AnswerChoice>>,
}

impl TryFrom<QuestionRow> for Question {
    type Error = Error;

    fn try_from(row: QuestionRow) -> Result<Self> {
        Ok(Question {
            id: row.id,
            test_id: row.test_id,
            position: row.position,
            kind: row.kind.parse::<QuestionKind>()?,
            text: row.text,
            description: row.description,
            image_url: row.image_url,
            choices: row.choices.0,
        })
    }
}

#[derive(Debug, FromRow)]
struct ResultRow {
    id: Uuid,
    session_id: String,
    test_id: Uuid,
    learner_id: String,
    count_correct: i32,
    count_incorrect: i32,
    suggested_result_type: String,
    result_type: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct AnswerRow {
    result_id: Uuid,
    question_id: Uuid,
    is_correct: bool,
    choices: Json<Vec<DetailedChoice>>,
}

fn parse_result_type(raw: &str) -> Result<ResultType> {
    raw.parse::<ResultType>().map_err(Error::Internal)
}

impl ResultRow {
    fn into_result(self, answers: Vec<AnsweredQuestion>) -> Result<TestResult> {
        Ok(TestResult {
            id: self.id,
            session_id: self.session_id,
            test_id: self.test_id,
            learner_id: self.learner_id,
            answers,
            count_correct: self.count_correct,
            count_incorrect: self.count_incorrect,
            suggested_result_type: parse_result_type(&self.suggested_result_type)?,
            result_type: parse_result_type(&self.result_type)?,
            created_at: self.created_at,
        })
    }
}

impl From<AnswerRow> for AnsweredQuestion {
    fn from(row: AnswerRow) -> Self {
        AnsweredQuestion {
            question_id: row.question_id,
            is_correct: row.is_correct,
            choices: row.choices.0,
        }
    }
}

const QUESTION_COLUMNS: &str =
    "id, test_id, position, kind, text, description, image_url, choices";

async fn insert_question_row<'e, E>(executor: E, question: &Question) -> Result<QuestionRow>
where
    E: sqlx::PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, QuestionRow>(&format!(
        r#"
        INSERT INTO questions (id, test_id, position, kind, text, description, image_url, choices)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {}
        "#,
        QUESTION_COLUMNS
    ))
    .bind(question.id)
    .bind(question.test_id)
    .bind(question.position)
    .bind(question.kind.as_str())
    .bind(&question.text)
    .bind(&question.description)
    .bind(&question.image_url)
    .bind(Json(&question.choices))
    .fetch_one(executor)
    .await?;
    Ok(row)
}

#[async_trait]
impl QuizStore for PgStore {
    async fn create_test(&self, test: Test, questions: Vec<Question>) -> Result<Test> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Test>(
            r#"
            INSERT INTO tests (
                id, title, description, questions_count, minimum_correct_answers,
                auto_score, time_in_minutes, attempts, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(test.id)
        .bind(&test.title)
        .bind(&test.description)
        .bind(test.questions_count)
        .bind(test.minimum_correct_answers)
        .bind(test.auto_score)
        .bind(test.time_in_minutes)
        .bind(test.attempts)
        .bind(&test.created_by)
        .bind(test.created_at)
        .bind(test.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        for question in &questions {
            insert_question_row(&mut *tx, question).await?;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn get_test(&self, test_id: Uuid) -> Result<Test> {
        sqlx::query_as::<_, Test>(r#"SELECT * FROM tests WHERE id = $1"#)
            .bind(test_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Test {} not found", test_id)))
    }

    async fn list_tests(&self, page: i64, per_page: i64) -> Result<(Vec<Test>, i64)> {
        let offset = (page - 1).max(0).saturating_mul(per_page);
        let total: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM tests"#)
            .fetch_one(&self.pool)
            .await?;

        let tests = sqlx::query_as::<_, Test>(
            r#"SELECT * FROM tests ORDER BY created_at DESC LIMIT $1 OFFSET $2"#,
        )
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((tests, total))
    }

    async fn update_test(&self, test_id: Uuid, changes: TestChanges) -> Result<Test> {
        sqlx::query_as::<_, Test>(
            r#"
            UPDATE tests
            SET
                title = COALESCE($1, title),
                description = COALESCE($2, description),
                questions_count = COALESCE($3, questions_count),
                minimum_correct_answers = COALESCE($4, minimum_correct_answers),
                auto_score = COALESCE($5, auto_score),
                time_in_minutes = COALESCE($6, time_in_minutes),
                attempts = COALESCE($7, attempts),
                updated_at = NOW()
            WHERE id = $8
            RETURNING *
            "#,
        )
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.questions_count)
        .bind(changes.minimum_correct_answers)
        .bind(changes.auto_score)
        .bind(changes.time_in_minutes)
        .bind(changes.attempts)
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Test {} not found", test_id)))
    }

    async fn delete_test(&self, test_id: Uuid) -> Result<bool> {
        let result = sqlx::query(r#"DELETE FROM tests WHERE id = $1"#)
            .bind(test_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn fetch_question_bank(&self, test_id: Uuid) -> Result<Vec<Question>> {
        let rows = sqlx::query_as::<_, QuestionRow>(&format!(
            r#"SELECT {} FROM questions WHERE test_id = $1 ORDER BY position ASC"#,
            QUESTION_COLUMNS
        ))
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Question::try_from).collect()
    }

    async fn insert_question(&self, mut question: Question) -> Result<Question> {
        let mut tx = self.pool.begin().await?;

        // Locks the parent row so concurrent appends get distinct positions.
        sqlx::query(r#"SELECT id FROM tests WHERE id = $1 FOR UPDATE"#)
            .bind(question.test_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Test {} not found", question.test_id)))?;

        question.position = sqlx::query_scalar(
            r#"SELECT COALESCE(MAX(position) + 1, 0) FROM questions WHERE test_id = $1"#,
        )
        .bind(question.test_id)
        .fetch_one(&mut *tx)
        .await?;

        let row = insert_question_row(&mut *tx, &question).await?;
        tx.commit().await?;
        Question::try_from(row)
    }

    async fn delete_question(&self, test_id: Uuid, question_id: Uuid) -> Result<bool> {
        let result = sqlx::query(r#"DELETE FROM questions WHERE id = $1 AND test_id = $2"#)
            .bind(question_id)
            .bind(test_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn persist_session(
        &self,
        session: TestSession,
        attempts_cap: Option<i32>,
    ) -> Result<TestSession> {
        let mut tx = self.pool.begin().await?;

        // Serializes session starts per test so two starts cannot both pass the cap.
        sqlx::query(r#"SELECT id FROM tests WHERE id = $1 FOR UPDATE"#)
            .bind(session.test_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Test {} not found", session.test_id)))?;

        if let Some(cap) = attempts_cap {
            let used: i64 = sqlx::query_scalar(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM test_results WHERE test_id = $1 AND learner_id = $2)
                  + (SELECT COUNT(*) FROM test_sessions WHERE test_id = $1 AND learner_id = $2)
                  + (SELECT COUNT(*) FROM abandoned_sessions WHERE test_id = $1 AND learner_id = $2)
                "#,
            )
            .bind(session.test_id)
            .bind(&session.learner_id)
            .fetch_one(&mut *tx)
            .await?;
            if used >= cap as i64 {
                return Err(attempts_exhausted(used, cap));
            }
        }

        let stored = sqlx::query_as::<_, TestSession>(
            r#"
            INSERT INTO test_sessions (id, test_id, learner_id, question_ids, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&session.id)
        .bind(session.test_id)
        .bind(&session.learner_id)
        .bind(&session.question_ids)
        .bind(session.created_at)
        .bind(session.expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(stored)
    }

    async fn fetch_session(&self, session_id: &str) -> Result<TestSession> {
        sqlx::query_as::<_, TestSession>(r#"SELECT * FROM test_sessions WHERE id = $1"#)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Test session not found".to_string()))
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            WITH expired AS (
                DELETE FROM test_sessions
                WHERE expires_at IS NOT NULL AND expires_at <= $1
                RETURNING id, test_id, learner_id, expires_at
            )
            INSERT INTO abandoned_sessions (id, test_id, learner_id, expired_at)
            SELECT id, test_id, learner_id, expires_at FROM expired
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn persist_result(&self, result: TestResult) -> Result<TestResult> {
        let mut tx = self.pool.begin().await?;

        // Claiming the session row first makes a concurrent second submission
        // wait here and then find nothing.
        let claimed: Option<String> =
            sqlx::query_scalar(r#"DELETE FROM test_sessions WHERE id = $1 RETURNING id"#)
                .bind(&result.session_id)
                .fetch_optional(&mut *tx)
                .await?;
        if claimed.is_none() {
            return Err(Error::NotFound(
                "Test session not found or already submitted".to_string(),
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO test_results (
                id, session_id, test_id, learner_id, count_correct, count_incorrect,
                suggested_result_type, result_type, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(result.id)
        .bind(&result.session_id)
        .bind(result.test_id)
        .bind(&result.learner_id)
        .bind(result.count_correct)
        .bind(result.count_incorrect)
        .bind(result.suggested_result_type.as_str())
        .bind(result.result_type.as_str())
        .bind(result.created_at)
        .execute(&mut *tx)
        .await?;

        for (position, answer) in result.answers.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO test_result_answers (result_id, question_id, position, is_correct, choices)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(result.id)
            .bind(answer.question_id)
            .bind(position as i32)
            .bind(answer.is_correct)
            .bind(Json(&answer.choices))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(result)
    }

    async fn get_result(&self, result_id: Uuid) -> Result<TestResult> {
        let row = sqlx::query_as::<_, ResultRow>(r#"SELECT * FROM test_results WHERE id = $1"#)
            .bind(result_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Result {} not found", result_id)))?;

        let answers = sqlx::query_as::<_, AnswerRow>(
            r#"
            SELECT result_id, question_id, is_correct, choices
            FROM test_result_answers
            WHERE result_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(result_id)
        .fetch_all(&self.pool)
        .await?;

        row.into_result(answers.into_iter().map(AnsweredQuestion::from).collect())
    }

    async fn list_results(&self, test_id: Uuid) -> Result<Vec<TestResult>> {
        let rows = sqlx::query_as::<_, ResultRow>(
            r#"SELECT * FROM test_results WHERE test_id = $1 ORDER BY created_at ASC"#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let answer_rows = sqlx::query_as::<_, AnswerRow>(
            r#"
            SELECT result_id, question_id, is_correct, choices
            FROM test_result_answers
            WHERE result_id = ANY($1)
            ORDER BY result_id, position ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<AnsweredQuestion>> = HashMap::new();
        for answer in answer_rows {
            grouped.entry(answer.result_id).or_default().push(answer.into());
        }

        rows.into_iter()
            .map(|row| {
                let answers = grouped.remove(&row.id).unwrap_or_default();
                row.into_result(answers)
            })
            .collect()
    }
}
