use crate::models::question::{Question, QuestionKind};
use crate::models::test_result::{AnswerTag, AnsweredQuestion, DetailedChoice, ResultType};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// The choices a learner picked for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: Uuid,
    #[serde(default)]
    pub selected: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringRules {
    pub minimum_correct_answers: i32,
    pub auto_score: bool,
}

/// Reasons a submission is rejected as a whole.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error("no answer submitted for question {0}")]
    MissingAnswer(Uuid),
    #[error("question {0} was answered more than once")]
    DuplicateAnswer(Uuid),
    #[error("question {0} is not part of this session")]
    UnknownQuestion(Uuid),
    #[error("choice {choice_id} does not belong to question {question_id}")]
    UnknownChoice { question_id: Uuid, choice_id: Uuid },
    #[error("question {question_id} accepts a single choice, got {selected}")]
    TooManySelections { question_id: Uuid, selected: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreCard {
    pub answers: Vec<AnsweredQuestion>,
    pub count_correct: i32,
    pub count_incorrect: i32,
    pub suggested_result_type: ResultType,
    pub result_type: ResultType,
}

pub struct ScoringService;

impl ScoringService {
    /// Scores a full submission against the session's questions, in the
    /// order of `questions`. Nothing is scored unless every question has
    /// exactly one well-formed answer.
    pub fn score(
        rules: ScoringRules,
        questions: &[Question],
        submitted: &[SubmittedAnswer],
    ) -> Result<ScoreCard, SubmissionError> {
        let known: HashSet<Uuid> = questions.iter().map(|q| q.id).collect();
        let mut by_question: HashMap<Uuid, HashSet<Uuid>> = HashMap::with_capacity(submitted.len());
        for answer in submitted {
            if !known.contains(&answer.question_id) {
                return Err(SubmissionError::UnknownQuestion(answer.question_id));
            }
            let selected: HashSet<Uuid> = answer.selected.iter().copied().collect();
            if by_question.insert(answer.question_id, selected).is_some() {
                return Err(SubmissionError::DuplicateAnswer(answer.question_id));
            }
        }

        let mut answers = Vec::with_capacity(questions.len());
        for question in questions {
            let selected = by_question
                .get(&question.id)
                .ok_or(SubmissionError::MissingAnswer(question.id))?;
            answers.push(Self::score_question(question, selected)?);
        }

        let count_correct = answers.iter().filter(|a| a.is_correct).count() as i32;
        let count_incorrect = answers.len() as i32 - count_correct;
        let suggested_result_type = if count_correct >= rules.minimum_correct_answers {
            ResultType::Passed
        } else {
            ResultType::Failed
        };
        let result_type = if rules.auto_score {
            suggested_result_type
        } else {
            ResultType::Pending
        };

        Ok(ScoreCard {
            answers,
            count_correct,
            count_incorrect,
            suggested_result_type,
            result_type,
        })
    }

    fn score_question(
        question: &Question,
        selected: &HashSet<Uuid>,
    ) -> Result<AnsweredQuestion, SubmissionError> {
        if let Some(choice_id) = selected.iter().find(|id| question.choice(**id).is_none()) {
            return Err(SubmissionError::UnknownChoice {
                question_id: question.id,
                choice_id: *choice_id,
            });
        }
        if question.kind == QuestionKind::SingleVariant && selected.len() > 1 {
            return Err(SubmissionError::TooManySelections {
                question_id: question.id,
                selected: selected.len(),
            });
        }

        // Unselected choices are tagged None even when correct; the stored
        // is_correct flag still tells them apart.
        let choices: Vec<DetailedChoice> = question
            .choices
            .iter()
            .map(|choice| {
                let tag = match (selected.contains(&choice.id), choice.is_correct) {
                    (true, true) => AnswerTag::Correct,
                    (true, false) => AnswerTag::Incorrect,
                    (false, _) => AnswerTag::None,
                };
                DetailedChoice {
                    choice_id: choice.id,
                    text: choice.text.clone(),
                    is_correct: choice.is_correct,
                    tag,
                }
            })
            .collect();

        let is_correct = match question.kind {
            QuestionKind::SingleVariant => choices.iter().any(|c| c.tag == AnswerTag::Correct),
            QuestionKind::MultipleVariants => {
                choices.iter().all(|c| c.is_correct == (c.tag == AnswerTag::Correct))
                    && !choices.iter().any(|c| c.tag == AnswerTag::Incorrect)
            }
        };

        Ok(AnsweredQuestion {
            question_id: question.id,
            is_correct,
            choices,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::AnswerChoice;

    struct Bank {
        q1: Question,
        q2: Question,
    }

    fn choice(is_correct: bool) -> AnswerChoice {
        AnswerChoice {
            id: Uuid::new_v4(),
            text: if is_correct { "right".into() } else { "wrong".into() },
            is_correct,
        }
    }

    fn question(kind: QuestionKind, choices: Vec<AnswerChoice>) -> Question {
        Question {
            id: Uuid::new_v4(),
            test_id: Uuid::nil(),
            position: 0,
            kind,
            text: "?".into(),
            description: None,
            image_url: None,
            choices,
        }
    }

    /// Q1 single variant with A1 correct, A2 wrong; Q2 multiple variants with
    /// B1, B2 correct and B3 wrong.
    fn bank() -> Bank {
        Bank {
            q1: question(QuestionKind::SingleVariant, vec![choice(true), choice(false)]),
            q2: question(
                QuestionKind::MultipleVariants,
                vec![choice(true), choice(true), choice(false)],
            ),
        }
    }

    fn answer(q: &Question, picks: &[usize]) -> SubmittedAnswer {
        SubmittedAnswer {
            question_id: q.id,
            selected: picks.iter().map(|i| q.choices[*i].id).collect(),
        }
    }

    fn rules(minimum: i32, auto_score: bool) -> ScoringRules {
        ScoringRules {
            minimum_correct_answers: minimum,
            auto_score,
        }
    }

    #[test]
    fn end_to_end_pass_and_fail() {
        let b = bank();
        let questions = vec![b.q1.clone(), b.q2.clone()];

        let card = ScoringService::score(
            rules(2, true),
            &questions,
            &[answer(&b.q1, &[0]), answer(&b.q2, &[0, 1])],
        )
        .unwrap();
        assert_eq!(card.count_correct, 2);
        assert_eq!(card.count_incorrect, 0);
        assert_eq!(card.result_type, ResultType::Passed);

        let card = ScoringService::score(
            rules(2, true),
            &questions,
            &[answer(&b.q1, &[1]), answer(&b.q2, &[0, 2])],
        )
        .unwrap();
        assert_eq!(card.count_correct, 0);
        assert_eq!(card.count_incorrect, 2);
        assert_eq!(card.result_type, ResultType::Failed);
    }

    #[test]
    fn multiple_variants_need_an_exact_match() {
        let q2 = bank().q2;
        let questions = vec![q2.clone()];
        let judge = |picks: &[usize]| {
            ScoringService::score(rules(1, true), &questions, &[answer(&q2, picks)])
                .unwrap()
                .answers[0]
                .is_correct
        };

        assert!(judge(&[0, 1]));
        assert!(!judge(&[0]));
        assert!(!judge(&[0, 1, 2]));
        assert!(!judge(&[]));
    }

    #[test]
    fn single_variant_rejects_two_selections() {
        let q1 = bank().q1;
        let err = ScoringService::score(rules(1, true), &[q1.clone()], &[answer(&q1, &[0, 1])])
            .unwrap_err();
        assert_eq!(
            err,
            SubmissionError::TooManySelections {
                question_id: q1.id,
                selected: 2
            }
        );
    }

    #[test]
    fn repeated_choice_counts_once() {
        let q1 = bank().q1;
        let card = ScoringService::score(rules(1, true), &[q1.clone()], &[answer(&q1, &[0, 0])])
            .unwrap();
        assert_eq!(card.count_correct, 1);
    }

    #[test]
    fn threshold_is_inclusive() {
        let b = bank();
        let questions = vec![b.q1.clone(), b.q2.clone()];
        let submission = [answer(&b.q1, &[0]), answer(&b.q2, &[2])];

        let at = ScoringService::score(rules(1, true), &questions, &submission).unwrap();
        assert_eq!(at.count_correct, 1);
        assert_eq!(at.suggested_result_type, ResultType::Passed);

        let below = ScoringService::score(rules(2, true), &questions, &submission).unwrap();
        assert_eq!(below.suggested_result_type, ResultType::Failed);
    }

    #[test]
    fn manual_scoring_keeps_verdict_pending() {
        let b = bank();
        let questions = vec![b.q1.clone(), b.q2.clone()];

        let passing = [answer(&b.q1, &[0]), answer(&b.q2, &[0, 1])];
        let card = ScoringService::score(rules(2, false), &questions, &passing).unwrap();
        assert_eq!(card.suggested_result_type, ResultType::Passed);
        assert_eq!(card.result_type, ResultType::Pending);

        let failing = [answer(&b.q1, &[1]), answer(&b.q2, &[])];
        let card = ScoringService::score(rules(2, false), &questions, &failing).unwrap();
        assert_eq!(card.suggested_result_type, ResultType::Failed);
        assert_eq!(card.result_type, ResultType::Pending);
    }

    #[test]
    fn tags_follow_selection_and_correctness() {
        let q2 = bank().q2;
        let card = ScoringService::score(rules(0, true), &[q2.clone()], &[answer(&q2, &[0, 2])])
            .unwrap();
        let tags: Vec<_> = card.answers[0].choices.iter().map(|c| c.tag).collect();
        assert_eq!(tags, vec![AnswerTag::Correct, AnswerTag::None, AnswerTag::Incorrect]);
        assert!(card.answers[0].choices[1].is_correct);
    }

    #[test]
    fn missing_answer_rejects_the_whole_submission() {
        let b = bank();
        let err = ScoringService::score(
            rules(1, true),
            &[b.q1.clone(), b.q2.clone()],
            &[answer(&b.q1, &[0])],
        )
        .unwrap_err();
        assert_eq!(err, SubmissionError::MissingAnswer(b.q2.id));
    }

    #[test]
    fn answers_outside_the_session_are_rejected() {
        let b = bank();
        let err = ScoringService::score(
            rules(1, true),
            &[b.q1.clone()],
            &[answer(&b.q1, &[0]), answer(&b.q2, &[0])],
        )
        .unwrap_err();
        assert_eq!(err, SubmissionError::UnknownQuestion(b.q2.id));

        let stray = Uuid::new_v4();
        let err = ScoringService::score(
            rules(1, true),
            &[b.q1.clone()],
            &[SubmittedAnswer {
                question_id: b.q1.id,
                selected: vec![stray],
            }],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SubmissionError::UnknownChoice {
                question_id: b.q1.id,
                choice_id: stray
            }
        );
    }

    #[test]
    fn duplicate_answers_are_rejected() {
        let q1 = bank().q1;
        let err = ScoringService::score(
            rules(1, true),
            &[q1.clone()],
            &[answer(&q1, &[0]), answer(&q1, &[1])],
        )
        .unwrap_err();
        assert_eq!(err, SubmissionError::DuplicateAnswer(q1.id));
    }

    #[test]
    fn detailed_records_follow_question_order() {
        let b = bank();
        let card = ScoringService::score(
            rules(0, true),
            &[b.q2.clone(), b.q1.clone()],
            &[answer(&b.q1, &[0]), answer(&b.q2, &[1])],
        )
        .unwrap();
        assert_eq!(card.answers[0].question_id, b.q2.id);
        assert_eq!(card.answers[1].question_id, b.q1.id);
    }
}
