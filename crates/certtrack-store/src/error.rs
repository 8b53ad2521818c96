use thiserror::Error;

/// Errors that can occur within the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A row that was expected to exist is missing.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A stored value could not be interpreted (bad enum text, malformed
    /// timestamp).
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
