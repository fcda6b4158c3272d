use std::error::Error as StdError;
use thiserror::Error;

pub type BoxedError = Box<dyn StdError + Send + Sync>;

pub type Result<T> = std::result::Result<T, OperatorError>;

#[derive(Debug, Error)]
pub enum OperatorError {
    /// The connection URL could not be parsed. The raw URL is never echoed back
    /// since it may carry a password.
    #[error("malformed database URL: {0}")]
    MalformedUrl(String),

    #[error("unsupported database URL scheme '{0}' (supported: postgresql, mongodb)")]
    UnsupportedScheme(String),

    #[error("invalid snapshot name '{0}': only letters, digits and underscores are allowed")]
    InvalidLabel(String),

    #[error("malformed snapshot database name '{0}'")]
    MalformedName(String),

    #[error("snapshot '{label}' already exists for database '{database}'")]
    NameTaken { label: String, database: String },

    /// The storage name would decode as a snapshot of another, longer-named
    /// database on the same server.
    #[error("snapshot name '{label}' for database '{database}' would be read as a snapshot of '{other}'; choose another name")]
    AmbiguousLabel {
        label: String,
        database: String,
        other: String,
    },

    #[error("snapshot '{label}' does not exist for database '{database}'")]
    SnapshotNotFound { label: String, database: String },

    #[error("snapshot database name '{name}' is longer than {limit} bytes; use a shorter snapshot name")]
    NameTooLong { name: String, limit: usize },

    #[error("database '{0}' has no collections to copy")]
    EmptySource(String),

    #[error("leftover backup database '{0}' found from an earlier restore; inspect and drop it first")]
    StaleBackup(String),

    /// Driver or network failure. `url` is always the redacted form.
    #[error("{operation} failed ({url}): {source}")]
    Connection {
        operation: String,
        url: String,
        #[source]
        source: BoxedError,
    },

    /// A best-effort rollback step failed. Only logged, never returned.
    #[error("rollback step '{step}' failed: {source}")]
    Rollback {
        step: &'static str,
        #[source]
        source: Box<OperatorError>,
    },
}

impl OperatorError {
    pub fn connection(
        operation: impl Into<String>,
        url: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            operation: operation.into(),
            url: url.into(),
            source: Box::new(source),
        }
    }

    /// Scheme mismatches tell operator selection to try the next builder.
    pub fn is_unsupported_scheme(&self) -> bool {
        matches!(self, Self::UnsupportedScheme(_))
    }
}
