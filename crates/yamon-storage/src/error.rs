use yamon_common::error::MetricError;
use yamon_common::types::MetricKind;

/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use yamon_common::types::MetricKind;
/// use yamon_storage::error::StorageError;
///
/// let err = StorageError::NotFound {
///     kind: MetricKind::Counter,
///     name: "requests".to_string(),
/// };
/// assert!(err.is_not_found());
/// assert!(err.to_string().contains("requests"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The metric failed validation (negative counter delta, non-finite gauge).
    /// Nothing was written.
    #[error("Storage: {0}")]
    Invalid(#[from] MetricError),

    /// No metric of that kind is stored under the name.
    #[error("Storage: {kind} {name} not found")]
    NotFound { kind: MetricKind, name: String },

    /// Merging the delta would overflow the stored `i64` total.
    #[error("Storage: counter {name} would overflow")]
    CounterOverflow { name: String },

    /// Restore replays totals through the additive merge, which is only
    /// correct on an empty store.
    #[error("Storage: refusing to restore into a non-empty store")]
    RestoreIntoNonEmpty,

    /// Snapshot file could not be read or written.
    #[error("Storage: snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot contents are not a valid envelope array.
    #[error("Storage: snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An underlying SQLite error.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The background flush task could not be joined.
    #[error("Storage: flush task failed: {0}")]
    Task(String),
}

impl StorageError {
    pub fn not_found(kind: MetricKind, name: &str) -> Self {
        StorageError::NotFound {
            kind,
            name: name.to_string(),
        }
    }

    /// True when the caller sent a metric the store refuses to accept.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StorageError::Invalid(_) | StorageError::CounterOverflow { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
