use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("transaction conflict, batch re-queued")]
    TransactionConflict,
    #[error("record not found")]
    NotFound,
}
