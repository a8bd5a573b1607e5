use crate::database::store::QuizStore;
use crate::dto::admin_dto::{
    CreateQuestion, CreateTestPayload, PaginatedTests, TestDetail, UpdateTestPayload,
};
use crate::error::{Error, Result};
use crate::models::question::{AnswerChoice, Question};
use crate::models::test::{Test, TestChanges};
use crate::models::test_result::TestResult;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

const MAX_PAGE: i64 = 1_000_000;

#[derive(Clone)]
pub struct TestService {
    store: Arc<dyn QuizStore>,
}

impl TestService {
    pub fn new(store: Arc<dyn QuizStore>) -> Self {
        Self { store }
    }

    pub async fn create_test(&self, payload: CreateTestPayload, created_by: &str) -> Result<TestDetail> {
        payload.validate()?;
        ensure_reachable_threshold(payload.minimum_correct_answers, payload.questions_count)?;

        let now = Utc::now();
        let test = Test {
            id: Uuid::new_v4(),
            title: payload.title.trim().to_string(),
            description: payload.description,
            questions_count: payload.questions_count,
            minimum_correct_answers: payload.minimum_correct_answers,
            auto_score: payload.auto_score.unwrap_or(true),
            time_in_minutes: payload.time_in_minutes,
            attempts: payload.attempts,
            created_by: Some(created_by.to_string()),
            created_at: now,
            updated_at: now,
        };

        let questions = payload
            .questions
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(idx, q)| build_question(test.id, idx as i32, q))
            .collect::<Result<Vec<_>>>()?;

        let test = self.store.create_test(test, questions.clone()).await?;
        tracing::info!(test_id = %test.id, questions = questions.len(), "test created");
        Ok(TestDetail { test, questions })
    }

    pub async fn get_test(&self, test_id: Uuid) -> Result<TestDetail> {
        let test = self.store.get_test(test_id).await?;
        let questions = self.store.fetch_question_bank(test_id).await?;
        Ok(TestDetail { test, questions })
    }

    pub async fn list_tests(&self, page: i64, per_page: i64) -> Result<PaginatedTests> {
        let page = page.clamp(1, MAX_PAGE);
        let per_page = per_page.clamp(1, 100);
        let (tests, total) = self.store.list_tests(page, per_page).await?;
        let total_pages = (total + per_page - 1) / per_page;

        Ok(PaginatedTests {
            tests,
            total,
            page,
            per_page,
            total_pages,
        })
    }

    pub async fn update_test(&self, test_id: Uuid, payload: UpdateTestPayload) -> Result<Test> {
        payload.validate()?;
        let current = self.store.get_test(test_id).await?;
        let changes = TestChanges {
            title: payload.title,
            description: payload.description,
            questions_count: payload.questions_count,
            minimum_correct_answers: payload.minimum_correct_answers,
            auto_score: payload.auto_score,
            time_in_minutes: payload.time_in_minutes,
            attempts: payload.attempts,
        };

        let mut merged = current;
        changes.apply_to(&mut merged);
        ensure_reachable_threshold(merged.minimum_correct_answers, merged.questions_count)?;

        let updated = self.store.update_test(test_id, changes).await?;
        tracing::info!(test_id = %test_id, "test updated");
        Ok(updated)
    }

    pub async fn delete_test(&self, test_id: Uuid) -> Result<()> {
        if !self.store.delete_test(test_id).await? {
            return Err(Error::NotFound(format!("Test {} not found", test_id)));
        }
        tracing::info!(test_id = %test_id, "test deleted");
        Ok(())
    }

    pub async fn add_question(&self, test_id: Uuid, payload: CreateQuestion) -> Result<Question> {
        let question = build_question(test_id, 0, payload)?;
        let stored = self.store.insert_question(question).await?;
        tracing::info!(test_id = %test_id, question_id = %stored.id, position = stored.position, "question added");
        Ok(stored)
    }

    pub async fn delete_question(&self, test_id: Uuid, question_id: Uuid) -> Result<()> {
        if !self.store.delete_question(test_id, question_id).await? {
            return Err(Error::NotFound(format!(
                "Question {} not found in test {}",
                question_id, test_id
            )));
        }
        Ok(())
    }

    pub async fn list_results(&self, test_id: Uuid) -> Result<Vec<TestResult>> {
        self.store.get_test(test_id).await?;
        self.store.list_results(test_id).await
    }

    pub async fn get_result(&self, result_id: Uuid) -> Result<TestResult> {
        self.store.get_result(result_id).await
    }
}

fn ensure_reachable_threshold(minimum_correct_answers: i32, questions_count: i32) -> Result<()> {
    if minimum_correct_answers > questions_count {
        return Err(Error::BadRequest(format!(
            "minimum_correct_answers ({}) cannot exceed questions_count ({})",
            minimum_correct_answers, questions_count
        )));
    }
    Ok(())
}

fn build_question(test_id: Uuid, position: i32, payload: CreateQuestion) -> Result<Question> {
    payload.validate()?;
    let question = Question {
        id: Uuid::new_v4(),
        test_id,
        position,
        kind: payload.kind,
        text: payload.text,
        description: payload.description,
        image_url: payload.image_url,
        choices: payload
            .choices
            .into_iter()
            .map(|c| AnswerChoice {
                id: c.id.unwrap_or_else(Uuid::new_v4),
                text: c.text,
                is_correct: c.is_correct,
            })
            .collect(),
    };
    question.validate()?;
    Ok(question)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::dto::admin_dto::CreateChoice;
    use crate::models::question::{QuestionError, QuestionKind};

    fn service() -> TestService {
        TestService::new(Arc::new(MemoryStore::new()))
    }

    fn single(text: &str) -> CreateQuestion {
        CreateQuestion {
            kind: QuestionKind::SingleVariant,
            text: text.into(),
            description: None,
            image_url: None,
            choices: vec![
                CreateChoice { id: None, text: "yes".into(), is_correct: true },
                CreateChoice { id: None, text: "no".into(), is_correct: false },
            ],
        }
    }

    fn payload(questions: Vec<CreateQuestion>) -> CreateTestPayload {
        CreateTestPayload {
            title: "  Borrow checker  ".into(),
            description: Some("Ownership drills".into()),
            questions_count: 2,
            minimum_correct_answers: 1,
            auto_score: None,
            time_in_minutes: Some(15),
            attempts: Some(2),
            questions: Some(questions),
        }
    }

    #[tokio::test]
    async fn creates_test_with_ordered_bank() {
        let svc = service();
        let created = svc
            .create_test(payload(vec![single("one"), single("two")]), "admin-1")
            .await
            .unwrap();
        assert_eq!(created.test.title, "Borrow checker");
        assert!(created.test.auto_score);

        let detail = svc.get_test(created.test.id).await.unwrap();
        let texts: Vec<_> = detail.questions.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two"]);

        let added = svc.add_question(created.test.id, single("three")).await.unwrap();
        assert_eq!(added.position, 2);
    }

    #[tokio::test]
    async fn rejects_invalid_question_shapes() {
        let svc = service();
        let mut broken = single("both right");
        broken.choices[1].is_correct = true;

        let err = svc.create_test(payload(vec![broken]), "admin-1").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Question(QuestionError::AmbiguousSingleVariant(2))
        ));
    }

    #[tokio::test]
    async fn rejects_unreachable_pass_threshold() {
        let svc = service();
        let mut p = payload(vec![]);
        p.minimum_correct_answers = 3;
        assert!(matches!(
            svc.create_test(p, "admin-1").await,
            Err(Error::BadRequest(_))
        ));

        let created = svc.create_test(payload(vec![]), "admin-1").await.unwrap();
        let err = svc
            .update_test(
                created.test.id,
                UpdateTestPayload {
                    questions_count: Some(1),
                    minimum_correct_answers: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        let updated = svc
            .update_test(
                created.test.id,
                UpdateTestPayload {
                    auto_score: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!updated.auto_score);
        assert_eq!(updated.minimum_correct_answers, 1);
    }

    #[tokio::test]
    async fn paginates_tests() {
        let svc = service();
        for _ in 0..3 {
            svc.create_test(payload(vec![]), "admin-1").await.unwrap();
        }
        let page = svc.list_tests(2, 2).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.tests.len(), 1);

        let far = svc.list_tests(i64::MAX, 100).await.unwrap();
        assert!(far.tests.is_empty());
        assert_eq!(far.page, MAX_PAGE);
        assert_eq!(far.total, 3);
    }

    #[tokio::test]
    async fn missing_question_delete_is_not_found() {
        let svc = service();
        let created = svc.create_test(payload(vec![single("q")]), "admin-1").await.unwrap();
        let question_id = created.questions[0].id;

        assert!(svc.delete_question(Uuid::new_v4(), question_id).await.is_err());
        svc.delete_question(created.test.id, question_id).await.unwrap();
        assert!(matches!(
            svc.delete_question(created.test.id, question_id).await,
            Err(Error::NotFound(_))
        ));
    }
}
