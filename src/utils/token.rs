use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Random alphanumeric identifier for a test session.
pub fn generate_session_id(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
