//! Store error types.

/// Failures of the persistence port. The session thread swallows these after
/// logging; they never reach a client.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store i/o error: {0}")]
    Io(String),
    #[error("store serialization error: {0}")]
    Serialization(String),
}
