#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("collection error: {0}")]
    Collection(String),

    #[error("upsert error: {0}")]
    Upsert(String),

    #[error("search error: {0}")]
    Search(String),

    #[error("namespace '{0}' not found and could not be created")]
    NotFound(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] quarry_llm::LlmError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_the_namespace() {
        let err = StoreError::NotFound("docs".into());
        assert_eq!(
            err.to_string(),
            "namespace 'docs' not found and could not be created"
        );
    }

    #[test]
    fn embedding_error_wraps_llm_error() {
        let err = StoreError::from(quarry_llm::LlmError::Other("backend down".into()));
        assert!(err.to_string().contains("backend down"));
    }
}
