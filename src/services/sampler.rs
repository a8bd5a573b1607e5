//! Session-seeded question sampling.
//!
//! Everything here is a pure function of the session id and the question
//! bank, so re-fetching a session reproduces exactly what the learner saw
//! when the session started.

use crate::models::question::{PublicChoice, PublicQuestion, Question};
use uuid::Uuid;

const LCG_MULTIPLIER: u64 = 9301;
const LCG_INCREMENT: u64 = 49297;
const LCG_MODULUS: u64 = 233280;

/// Sum of the character codes of `session_id`.
///
/// Collides for anagrams. Existing sessions depend on the exact value, so
/// it must not be swapped for a real hash.
pub fn session_seed(session_id: &str) -> u64 {
    session_id.chars().map(|c| c as u64).sum()
}

/// Linear congruential generator over `[0, 1)`.
#[derive(Debug, Clone)]
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn from_session(session_id: &str) -> Self {
        Self::new(session_seed(session_id))
    }

    pub fn next_f64(&mut self) -> f64 {
        self.state = (self.state.wrapping_mul(LCG_MULTIPLIER).wrapping_add(LCG_INCREMENT))
            % LCG_MODULUS;
        self.state as f64 / LCG_MODULUS as f64
    }

    /// Uniform index in `0..=upper`.
    fn index_up_to(&mut self, upper: usize) -> usize {
        let j = (self.next_f64() * (upper + 1) as f64).floor() as usize;
        j.min(upper)
    }
}

/// In-place Fisher-Yates, walking from the last slot down.
pub fn shuffle<T>(items: &mut [T], rng: &mut SeededRng) {
    for i in (1..items.len()).rev() {
        let j = rng.index_up_to(i);
        items.swap(i, j);
    }
}

/// Picks the session's question order: a seeded shuffle of the whole bank
/// truncated to `questions_count`. A bank smaller than the request is
/// returned whole.
pub fn sample_questions(bank: &[Uuid], questions_count: usize, session_id: &str) -> Vec<Uuid> {
    if bank.is_empty() {
        tracing::warn!(session_id, "question bank is empty, nothing to sample");
        return Vec::new();
    }
    if questions_count > bank.len() {
        tracing::warn!(
            session_id,
            requested = questions_count,
            available = bank.len(),
            "question bank smaller than requested count, using the whole bank"
        );
    }

    let mut order = bank.to_vec();
    let mut rng = SeededRng::from_session(session_id);
    shuffle(&mut order, &mut rng);
    order.truncate(questions_count);
    order
}

/// Learner-facing copy of `question` with its choices shuffled for this
/// session. The result type has no correctness field.
pub fn present_question(question: &Question, session_id: &str) -> PublicQuestion {
    let mut choices: Vec<PublicChoice> = question.choices.iter().map(PublicChoice::from).collect();
    let mut rng = SeededRng::from_session(&format!("{}{}", session_id, question.id));
    shuffle(&mut choices, &mut rng);

    PublicQuestion {
        id: question.id,
        kind: question.kind,
        text: question.text.clone(),
        description: question.description.clone(),
        image_url: question.image_url.clone(),
        choices,
    }
}

/// Presents the assigned questions in assignment order. `bank` may be in any
/// order; assigned ids missing from it are reported back to the caller.
pub fn present_session(
    assigned: &[Uuid],
    bank: &[Question],
    session_id: &str,
) -> Result<Vec<PublicQuestion>, Uuid> {
    assigned
        .iter()
        .map(|id| {
            bank.iter()
                .find(|q| q.id == *id)
                .map(|q| present_question(q, session_id))
                .ok_or(*id)
        })
        .collect()
}
