use kvt_types::{CodecError, Digest};

/// Datastore status for a missing record.
pub const STATUS_NOT_FOUND: i32 = 2;
/// Datastore status for a failed generation check.
pub const STATUS_GENERATION: i32 = 3;
/// Datastore status for a store that cannot serve requests.
pub const STATUS_UNAVAILABLE: i32 = 1;

/// Errors reported by a [`RecordStore`](crate::RecordStore).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No record exists under the key.
    #[error("record not found: {namespace}/{digest}")]
    NotFound { namespace: String, digest: Digest },

    /// The write's generation expectation did not hold.
    #[error("generation mismatch: record is at {actual}, write expected {expected}")]
    GenerationMismatch { expected: String, actual: u16 },

    /// The store cannot serve the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Numeric status in the datastore's convention.
    pub fn code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => STATUS_NOT_FOUND,
            Self::GenerationMismatch { .. } => STATUS_GENERATION,
            Self::Unavailable(_) => STATUS_UNAVAILABLE,
        }
    }
}

impl From<StoreError> for CodecError {
    fn from(err: StoreError) -> Self {
        CodecError::server(err.code(), err.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
