use std::fmt;

/// Error types produced by the sync worker.
#[derive(Debug)]
pub enum SyncError {
    /// Database-related errors.
    Database(sqlx::Error),
    /// Transport-level HTTP failure (connect, timeout, body read).
    Http(reqwest::Error),
    /// The solicitations API answered with a non-success status.
    UnexpectedStatus {
        /// HTTP status code returned.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },
    /// The response body did not match any known page shape.
    UnexpectedShape(String),
    /// Invalid runtime configuration.
    Config(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<SyncError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Database(e) => write!(f, "Database error: {}", e),
            SyncError::Http(e) => write!(f, "HTTP error: {}", e),
            SyncError::UnexpectedStatus { status, body } => {
                write!(f, "API returned status {}: {}", status, body)
            }
            SyncError::UnexpectedShape(msg) => write!(f, "Unexpected response shape: {}", msg),
            SyncError::Config(msg) => write!(f, "Configuration error: {}", msg),
            SyncError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Database(e) => Some(e),
            SyncError::Http(e) => Some(e),
            SyncError::WithContext { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Database(err)
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Http(err)
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `SyncError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, SyncError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, SyncError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, SyncError> {
    fn context(self, context: impl Into<String>) -> Result<T, SyncError> {
        self.map_err(|e| SyncError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, SyncError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| SyncError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

/// Extension for sqlx::Error to add context
impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, SyncError> {
        self.map_err(|e| SyncError::WithContext {
            source: Box::new(SyncError::Database(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, SyncError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| SyncError::WithContext {
            source: Box::new(SyncError::Database(e)),
            context: f(),
        })
    }
}
