use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerTag {
    Correct,
    Incorrect,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultType {
    Passed,
    Failed,
    Pending,
}

impl ResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultType::Passed => "passed",
            ResultType::Failed => "failed",
            ResultType::Pending => "pending",
        }
    }
}

impl std::str::FromStr for ResultType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passed" => Ok(ResultType::Passed),
            "failed" => Ok(ResultType::Failed),
            "pending" => Ok(ResultType::Pending),
            other => Err(format!("unknown result type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedChoice {
    pub choice_id: Uuid,
    pub text: String,
    pub is_correct: bool,
    pub tag: AnswerTag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    pub question_id: Uuid,
    pub is_correct: bool,
    pub choices: Vec<DetailedChoice>,
}

/// Immutable outcome of one submitted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub id: Uuid,
    pub session_id: String,
    pub test_id: Uuid,
    pub learner_id: String,
    pub answers: Vec<AnsweredQuestion>,
    pub count_correct: i32,
    pub count_incorrect: i32,
    pub suggested_result_type: ResultType,
    pub result_type: ResultType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerChoice {
    pub choice_id: Uuid,
    pub text: String,
    pub selected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<AnswerTag>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerAnswer {
    pub question_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    pub choices: Vec<LearnerChoice>,
}

/// What a learner may see of their own result: tags only, never the
/// correctness flag of choices they did not pick. While the verdict is
/// `Pending` nothing that reveals it is shown, only the selections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerResult {
    pub id: Uuid,
    pub test_id: Uuid,
    pub answers: Vec<LearnerAnswer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_correct: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_incorrect: Option<i32>,
    pub result_type: ResultType,
    pub created_at: DateTime<Utc>,
}

impl From<TestResult> for LearnerResult {
    fn from(result: TestResult) -> Self {
        let graded = result.result_type != ResultType::Pending;
        let answers = result
            .answers
            .into_iter()
            .map(|answer| LearnerAnswer {
                question_id: answer.question_id,
                is_correct: graded.then_some(answer.is_correct),
                choices: answer
                    .choices
                    .into_iter()
                    .map(|c| LearnerChoice {
                        choice_id: c.choice_id,
                        text: c.text,
                        selected: c.tag != AnswerTag::None,
                        tag: graded.then_some(c.tag),
                    })
                    .collect(),
            })
            .collect();

        Self {
            id: result.id,
            test_id: result.test_id,
            answers,
            count_correct: graded.then_some(result.count_correct),
            count_incorrect: graded.then_some(result.count_incorrect),
            result_type: result.result_type,
            created_at: result.created_at,
        }
    }
}
