//! Error types for slateorm

use thiserror::Error;

/// Result type alias for slateorm operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for session operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// The builder was used incorrectly (missing table, empty payload, unfiltered delete, ...)
    #[error("Usage error: {0}")]
    Usage(String),

    /// A record descriptor cannot be turned into a table mapping
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Prepare/execute/scan failure reported by the execution adapter
    #[error("Driver error: {0}")]
    Driver(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Row decode/coercion error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a usage error
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    /// Create a metadata error
    pub fn metadata(message: impl Into<String>) -> Self {
        Self::Metadata(message.into())
    }

    /// Wrap an adapter error verbatim
    pub fn driver<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Driver(Box::new(err))
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Check if this is a usage error
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }

    /// Check if this is a metadata error
    pub fn is_metadata(&self) -> bool {
        matches!(self, Self::Metadata(_))
    }

    /// Check if this error came from the execution adapter
    pub fn is_driver(&self) -> bool {
        matches!(self, Self::Driver(_))
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for OrmError {
    fn from(err: rusqlite::Error) -> Self {
        Self::driver(err)
    }
}
