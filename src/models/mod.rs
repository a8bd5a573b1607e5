pub mod question;
pub mod test_result;
pub mod test_session;
