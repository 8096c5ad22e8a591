#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] quarry_llm::LlmError),

    #[error(transparent)]
    Store(#[from] quarry_store::StoreError),

    #[error(transparent)]
    Tool(#[from] quarry_tools::ToolError),

    #[error(transparent)]
    Ingest(#[from] quarry_ingest::IngestError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("step budget of {steps} exhausted before the model produced an answer")]
    BudgetExceeded { steps: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_exceeded_names_the_budget() {
        let err = AgentError::BudgetExceeded { steps: 3 };
        assert_eq!(
            err.to_string(),
            "step budget of 3 exhausted before the model produced an answer"
        );
    }

    #[test]
    fn budget_exceeded_is_distinguishable() {
        let err = AgentError::BudgetExceeded { steps: 1 };
        assert!(matches!(err, AgentError::BudgetExceeded { .. }));

        let other = AgentError::Llm(quarry_llm::LlmError::Other("down".into()));
        assert!(!matches!(other, AgentError::BudgetExceeded { .. }));
    }
}
