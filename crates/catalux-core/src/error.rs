use thiserror::Error;

/// Canonical error type shared by the classification, indexing and query layers.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity was not found in the current snapshot.
    #[error("{entity} `{id}` was not found")]
    NotFound {
        /// Entity type name (e.g. `"product"`).
        entity: &'static str,
        /// Identifier of the missing entity.
        id: String,
    },

    /// No index snapshot has been published yet.
    ///
    /// Distinct from an empty result: the caller asked before the first
    /// rebuild completed.
    #[error("index unavailable: no snapshot has been built yet")]
    IndexUnavailable,

    /// A rebuild was requested while another one is still running.
    #[error("a rebuild is already in progress")]
    RebuildInProgress,

    /// A rebuild was cancelled before it could publish a snapshot.
    #[error("rebuild cancelled")]
    Cancelled,

    /// An upstream collaborator (catalog or configuration source) failed.
    #[error("{source_name} source failed: {message}")]
    Source {
        /// Name of the failing source (e.g. `"catalog"`).
        source_name: &'static str,
        /// Human-readable failure description.
        message: String,
    },

    /// Unexpected internal error occurred.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable details for debugging purposes.
        message: String,
    },

    /// I/O error occurred while reading a source file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error occurred.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error occurred.
    #[error("deserialization error: {0}")]
    DeserializationError(String),

    /// Validation error for configuration or request data.
    #[error("validation error: {0}")]
    ValidationError(String),
}

impl CoreError {
    /// Creates a `NotFound` variant.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates a `Source` variant.
    #[must_use]
    pub fn source(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::Source {
            source_name,
            message: message.into(),
        }
    }

    /// Creates a `ValidationError` variant.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// Creates an `Internal` variant.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_eof() || err.is_syntax() || err.is_data() {
            Self::DeserializationError(err.to_string())
        } else {
            Self::SerializationError(err.to_string())
        }
    }
}

/// Convenient result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_is_distinct_from_not_found() {
        let err = CoreError::IndexUnavailable;
        assert!(err.to_string().contains("index unavailable"));
        assert!(!matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn json_syntax_errors_map_to_deserialization() {
        let err: CoreError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, CoreError::DeserializationError(_)));
    }
}
