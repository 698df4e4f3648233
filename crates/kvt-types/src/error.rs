use std::fmt;

use thiserror::Error;

/// Status code reported for malformed caller input.
pub const STATUS_PARAMETER: i32 = -2;
/// Status code reported for client-side conversion failures.
pub const STATUS_CLIENT: i32 = -1;
/// Generic server-side failure code.
pub const STATUS_SERVER: i32 = 1;

/// Errors produced by transcoding operations.
///
/// Every conversion returns exactly one of these kinds plus a human-readable
/// message. `Serialization` is a refinement of `Client`: [`CodecError::is_client`]
/// is true for both.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Malformed, missing, or unsupported input shape.
    #[error("parameter error: {0}")]
    Parameter(String),

    /// Internal conversion failure: unexpected type, pool exhaustion, depth limit.
    #[error("client error: {0}")]
    Client(String),

    /// A serializer or deserializer was absent or failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Failure reported by the storage layer, propagated opaquely.
    #[error("server error ({code}): {message}")]
    Server { code: i32, message: String },
}

/// The taxonomy bucket of a [`CodecError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Parameter,
    Client,
    Serialization,
    Server,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parameter => write!(f, "parameter"),
            Self::Client => write!(f, "client"),
            Self::Serialization => write!(f, "serialization"),
            Self::Server => write!(f, "server"),
        }
    }
}

impl CodecError {
    pub fn parameter(message: impl Into<String>) -> Self {
        Self::Parameter(message.into())
    }

    pub fn client(message: impl Into<String>) -> Self {
        Self::Client(message.into())
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    pub fn server(code: i32, message: impl Into<String>) -> Self {
        Self::Server {
            code,
            message: message.into(),
        }
    }

    /// The taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parameter(_) => ErrorKind::Parameter,
            Self::Client(_) => ErrorKind::Client,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Server { .. } => ErrorKind::Server,
        }
    }

    /// Returns `true` for client errors, including serialization failures.
    pub fn is_client(&self) -> bool {
        matches!(self, Self::Client(_) | Self::Serialization(_))
    }

    /// Numeric status in the datastore client's convention.
    pub fn status_code(&self) -> i32 {
        match self {
            Self::Parameter(_) => STATUS_PARAMETER,
            Self::Client(_) | Self::Serialization(_) => STATUS_CLIENT,
            Self::Server { code, .. } => *code,
        }
    }

    /// The message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Parameter(m) | Self::Client(m) | Self::Serialization(m) => m,
            Self::Server { message, .. } => message,
        }
    }

    /// Prefix the message with caller context, keeping the kind unchanged.
    pub fn context(self, context: impl fmt::Display) -> Self {
        match self {
            Self::Parameter(m) => Self::Parameter(format!("{context}: {m}")),
            Self::Client(m) => Self::Client(format!("{context}: {m}")),
            Self::Serialization(m) => Self::Serialization(format!("{context}: {m}")),
            Self::Server { code, message } => Self::Server {
                code,
                message: format!("{context}: {message}"),
            },
        }
    }
}

/// Result alias for transcoding operations.
pub type CodecResult<T> = Result<T, CodecError>;
