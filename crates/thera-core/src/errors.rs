use thiserror::Error;

#[derive(Debug, Error)]
pub enum TheraError {
    #[error("http error: {0}")]
    Http(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("credential storage error: {0}")]
    Storage(String),
}
