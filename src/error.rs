/// Error type for helper and connection operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HelperError {
    /// The key was rejected by the validation predicate before any store call.
    ///
    /// This error is fatal and non-retryable: the caller passed a key that the
    /// configured validator refuses to write under.
    #[error("invalid key: {reason}")]
    InvalidKey { reason: String },

    /// A typed hash-field read found a value that cannot be decoded into the
    /// requested type.
    ///
    /// This signals a caller-side schema mismatch and is never produced for an
    /// absent field (absent fields read as `None`).
    #[error("type mismatch for field '{field}' of key '{key}': {detail}")]
    TypeMismatch {
        key: String,
        field: String,
        detail: String,
    },

    /// A failure surfaced by the underlying store connection.
    ///
    /// Propagated with command/key context added: no retry, no suppression.
    #[error("[{op}] store error for key '{key}': {message}")]
    Store {
        op: String,
        key: String,
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl HelperError {
    /// Create a new store error with command and key context.
    pub fn store(
        op: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        HelperError::Store {
            op: op.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a new invalid-key error.
    pub fn invalid_key(reason: impl Into<String>) -> Self {
        HelperError::InvalidKey {
            reason: reason.into(),
        }
    }

    /// Create a new type-mismatch error.
    pub fn type_mismatch(
        key: impl Into<String>,
        field: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        HelperError::TypeMismatch {
            key: key.into(),
            field: field.into(),
            detail: detail.into(),
        }
    }
}
