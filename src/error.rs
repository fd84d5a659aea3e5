//! Error types for the query front-end and its storage tiers

use std::fmt;
use thiserror::Error;

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    /// A render target could not be parsed
    #[error("failed to parse target {target:?} at column {column}: {message}")]
    Parser {
        /// The offending target text
        target: String,
        /// What the parser expected or found
        message: String,
        /// 1-based column of the offending token
        column: usize,
    },

    /// A `from`/`until` or interval string could not be parsed
    #[error("failed to parse time {input:?}: {message}")]
    TimeParser {
        /// The raw input
        input: String,
        /// Reason
        message: String,
    },

    /// Function name not present in the function table
    #[error("unsupported function: {0}")]
    UnsupportedFunction(String),

    /// Wrong arity or argument kind for a known function
    #[error("invalid argument for {func_name}: {message}")]
    Argument {
        /// Function being invoked
        func_name: String,
        /// What was wrong
        message: String,
    },

    /// Hot or cold tier failure
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A request exceeded its time budget
    #[error("timeout: {0}")]
    Timeout(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Build an argument error for `func_name`
    pub fn argument(func_name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Argument {
            func_name: func_name.into(),
            message: message.into(),
        }
    }

    /// Build a time parser error
    pub fn time_parser(input: impl Into<String>, message: impl Into<String>) -> Self {
        Error::TimeParser {
            input: input.into(),
            message: message.into(),
        }
    }

    /// True for errors caused by the request itself (rendered as HTTP 400)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Parser { .. }
                | Error::TimeParser { .. }
                | Error::UnsupportedFunction(_)
                | Error::Argument { .. }
        )
    }
}

/// Storage error with a kind for programmatic handling
#[derive(Debug)]
pub struct StorageError {
    /// Error kind
    pub kind: StorageErrorKind,
    /// Human-readable message
    pub message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StorageError {
    /// Create a new storage error
    pub fn new(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying cause
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Transient I/O or connection failure
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Io, message)
    }

    /// Backend rejected the request because of provisioned throughput
    pub fn throttled(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Throttled, message)
    }

    /// Table or resource does not exist
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::NotFound, message)
    }

    /// A backend call exceeded its timeout
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Timeout, message)
    }

    /// Stored data could not be decoded
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Decode, message)
    }

    /// Any other backend failure
    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Backend, message)
    }

    /// Whether a retry may succeed
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            StorageErrorKind::Io | StorageErrorKind::Throttled | StorageErrorKind::Timeout
        )
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Categories of storage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// Transient I/O, connection dropped
    Io,
    /// Throughput exceeded
    Throttled,
    /// Resource not found
    NotFound,
    /// Call timed out
    Timeout,
    /// Malformed stored data
    Decode,
    /// Other backend error
    Backend,
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageErrorKind::Io => write!(f, "Io"),
            StorageErrorKind::Throttled => write!(f, "Throttled"),
            StorageErrorKind::NotFound => write!(f, "NotFound"),
            StorageErrorKind::Timeout => write!(f, "Timeout"),
            StorageErrorKind::Decode => write!(f, "Decode"),
            StorageErrorKind::Backend => write!(f, "Backend"),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
