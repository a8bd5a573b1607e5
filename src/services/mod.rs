pub mod sampler;
pub mod scoring_service;
pub mod session_service;
pub mod test_service;
