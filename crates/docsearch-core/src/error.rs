use thiserror::Error;

/// Engine error taxonomy.
///
/// `Cache` and `Suggestion` are recoverable and are coerced to defaults where
/// they occur; every other variant is fatal for the call that produced it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingGeneration(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Suggestion error: {0}")]
    Suggestion(String),

    #[error("Indexing failed: {0}")]
    Indexing(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Search failed: {0}")]
    SearchFailed(Box<Error>),
}

impl Error {
    /// Wraps a fatal search-path error; already wrapped or validation errors pass through.
    pub fn into_search_failed(self) -> Self {
        match self {
            Self::SearchFailed(_) | Self::Validation(_) => self,
            other => Self::SearchFailed(Box::new(other)),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_failed_message_wraps_cause() {
        let err = Error::Retrieval("connection reset".into()).into_search_failed();
        assert_eq!(err.to_string(), "Search failed: Retrieval failed: connection reset");
    }

    #[test]
    fn validation_is_not_wrapped() {
        let err = Error::Validation("empty query".into()).into_search_failed();
        assert!(matches!(err, Error::Validation(_)));
    }
}
