//! Error type for document store operations

/// Errors surfaced by a [`DocumentStore`](super::DocumentStore) and by the
/// ledger operations built on top of it.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to decode document {doc}: {source}")]
    Decode {
        doc: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Transaction aborted after {attempts} attempts due to contention")]
    Contention { attempts: u32 },

    #[error("XP total in {doc} would overflow")]
    XpOverflow { doc: String },

    #[error("Invalid field path: {0:?}")]
    InvalidFieldPath(String),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Failed to prepare store location: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// True when retrying the whole operation later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Contention { .. } => true,
            Self::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}
