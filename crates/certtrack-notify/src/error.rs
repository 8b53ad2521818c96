use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Store error: {0}")]
    Store(#[from] certtrack_store::StoreError),

    /// The entity a notification points at no longer exists.
    #[error("Entity not found for notification {code}: {entity_id}")]
    MissingEntity { code: String, entity_id: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NotifyError>;
