use thiserror::Error;

use certtrack_core::CoreError;
use certtrack_notify::NotifyError;
use certtrack_store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Calendar error: {0}")]
    Core(#[from] CoreError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),
}

impl EngineError {
    /// Transient infrastructure failures (database connectivity) are
    /// retried by the task-level backoff; everything else is either a
    /// per-entity skip or a terminal failure.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::Store(StoreError::Database(_))
                | EngineError::Notify(NotifyError::Store(StoreError::Database(_)))
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
