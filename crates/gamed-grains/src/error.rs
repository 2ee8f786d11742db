use gamed_store::StoreError;
use thiserror::Error;

/// Lifecycle failures (`init` / `terminate`). Request-level failures are reported
/// in the response envelope instead.
#[derive(Debug, Error)]
pub enum GrainError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("grain {0} is not running")]
    NotRunning(String),
}
