use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unrecognized grade: {0:?}")]
    InvalidGrade(String),
    #[error("not found: {0}")]
    NotFound(&'static str),
    #[error("invalid input: {0}")]
    Invalid(&'static str),
    #[error("conflict: {0}")]
    Conflict(&'static str),
    #[error("invariant violated: {0}")]
    InvariantViolation(&'static str),
    #[error("storage error: {0}")]
    Storage(&'static str),
}
