//! Second pipeline stage: turn the analysis into a SQL candidate.

use crate::application::use_cases::response_parser::extract_sql;
use crate::domain::analysis::QueryAnalysis;
use crate::domain::error::{AppError, Result};
use crate::domain::outcome::SqlCandidate;
use crate::infrastructure::llm::CompletionGateway;
use crate::infrastructure::prompts::PromptStore;
use std::sync::Arc;
use tracing::debug;

pub struct SqlSynthesizer {
    gateway: Arc<dyn CompletionGateway + Send + Sync>,
    prompts: Arc<PromptStore>,
}

impl SqlSynthesizer {
    pub fn new(
        gateway: Arc<dyn CompletionGateway + Send + Sync>,
        prompts: Arc<PromptStore>,
    ) -> Self {
        Self { gateway, prompts }
    }

    /// Generate a candidate statement for the question. The full completion
    /// text is kept as the explanation; the statement is whatever the
    /// extractor could pull out of it, unvalidated.
    pub async fn synthesize(
        &self,
        question: &str,
        analysis: &QueryAnalysis,
        schema: &str,
    ) -> Result<SqlCandidate> {
        let analysis_json = serde_json::to_string_pretty(analysis)
            .map_err(|e| AppError::Internal(format!("Failed to serialize analysis: {}", e)))?;
        let business_rules = self.prompts.business_rules();

        let (system, user) = self.prompts.render_pair(
            "sql_generation",
            &[
                ("question", question),
                ("schema", schema),
                ("business_rules", &business_rules),
                ("analysis", &analysis_json),
            ],
        )?;

        let completion = self.gateway.complete(&system, &user).await?;
        let statement = extract_sql(&completion);

        debug!(statement, "sql candidate generated");

        Ok(SqlCandidate {
            statement,
            explanation: completion,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedGateway(String);

    #[async_trait]
    impl CompletionGateway for FixedGateway {
        async fn complete(&self, _system: &str, user: &str) -> Result<String> {
            // The analysis must have reached the user prompt.
            assert!(user.contains("\"intent\""));
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_synthesize_extracts_fenced_sql_and_keeps_explanation() {
        let tmp = tempfile::tempdir().unwrap();
        let prompts = Arc::new(PromptStore::new(tmp.path()));
        prompts.seed_defaults().unwrap();

        let completion =
            "```sql\nSELECT COUNT(*) AS n FROM orders LIMIT 1000\n```\nCounts all orders.";
        let synthesizer =
            SqlSynthesizer::new(Arc::new(FixedGateway(completion.to_string())), prompts);

        let candidate = synthesizer
            .synthesize(
                "How many orders?",
                &QueryAnalysis::heuristic("How many orders?"),
                "Table: orders",
            )
            .await
            .unwrap();

        assert_eq!(
            candidate.statement,
            "SELECT COUNT(*) AS n FROM orders LIMIT 1000"
        );
        assert_eq!(candidate.explanation, completion);
    }
}
