//! Error types for the photo wall.
//!
//! Every failure a caller can observe falls into one of a handful of
//! categories. Capacity and validation failures are returned to the
//! submitter only and are never broadcast to viewers.

/// Result type for photo wall operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Photo wall errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Admission refused because too many submissions are in flight.
    #[error("server busy: {in_flight} submissions in flight (limit {limit})")]
    Capacity { in_flight: usize, limit: usize },

    /// Malformed, oversized or undecodable payload.
    #[error("invalid submission: {0}")]
    Validation(String),

    /// No photo with this id.
    #[error("photo not found: {id}")]
    NotFound { id: String },

    /// File read, write or delete failure.
    #[error("storage error in {context}: {source}")]
    StorageIo {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Shutdown has begun; no new mutations are accepted.
    #[error("server is shutting down")]
    ShuttingDown,

    /// Invalid runtime configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unexpected failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a storage error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::StorageIo {
            context: context.into(),
            source,
        }
    }

    /// Create a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// Create a not found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create an internal error.
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }

    /// Whether the caller should retry the same request later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Capacity { .. } | Self::ShuttingDown)
    }

    /// Get the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound { .. } => 404,
            Self::Capacity { .. } | Self::ShuttingDown => 503,
            Self::StorageIo { .. } | Self::Config(_) | Self::Internal(_) => 500,
        }
    }

    /// Message safe to show to the caller.
    ///
    /// Storage and internal failures collapse to a generic message so that
    /// file paths and OS error detail stay in the server log.
    pub fn public_message(&self) -> String {
        match self {
            Self::StorageIo { .. } | Self::Config(_) | Self::Internal(_) => {
                "internal server error".to_string()
            },
            other => other.to_string(),
        }
    }

    /// Label used for metrics and audit logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Capacity { .. } => "busy",
            Self::Validation(_) => "rejected",
            Self::NotFound { .. } => "not_found",
            Self::StorageIo { .. } => "storage_io",
            Self::ShuttingDown => "shutting_down",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }
}
