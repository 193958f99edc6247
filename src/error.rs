use thiserror::Error;

/// Crate-wide result alias for the RAG pipeline.
pub type Result<T> = std::result::Result<T, RagError>;

/// Error taxonomy for the ingestion and query pipelines.
///
/// Ingestion failures are collected per document and never abort a batch;
/// query failures are raised once per call so the boundary layer can
/// translate them into caller-visible messaging.
#[derive(Debug, Error)]
pub enum RagError {
    /// Empty or malformed user input.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Missing or invalid provider credentials or settings. The message
    /// names the environment variable to fix, never its value.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Transient failure of an external provider call (rate limit,
    /// timeout, server error).
    #[error("{provider} request failed: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// Vector store unreachable.
    #[error("vector store unavailable: {0}")]
    RetrievalUnavailable(String),

    /// Embedding failed after exhausting retries. `batch_index` is the
    /// position of the first text in the failed batch so the caller can
    /// skip or report that subset.
    #[error("embedding failed at batch index {batch_index}: {message}")]
    Embedding {
        batch_index: usize,
        message: String,
    },
}

impl RagError {
    pub fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        RagError::Provider {
            provider,
            message: message.into(),
        }
    }

    /// Whether a retry with backoff may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RagError::Provider { .. } | RagError::RetrievalUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(RagError::provider("gemini", "503").is_transient());
        assert!(RagError::RetrievalUnavailable("refused".into()).is_transient());
        assert!(!RagError::Configuration("GEMINI_API_KEY is not set".into()).is_transient());
        assert!(!RagError::InvalidQuery("empty".into()).is_transient());
    }
}
