//! First pipeline stage: classify the user's question.

use crate::application::use_cases::response_parser::extract_json;
use crate::domain::analysis::QueryAnalysis;
use crate::domain::error::{AppError, Result};
use crate::infrastructure::llm::CompletionGateway;
use crate::infrastructure::prompts::PromptStore;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct QueryAnalyzer {
    gateway: Arc<dyn CompletionGateway + Send + Sync>,
    prompts: Arc<PromptStore>,
}

impl QueryAnalyzer {
    pub fn new(
        gateway: Arc<dyn CompletionGateway + Send + Sync>,
        prompts: Arc<PromptStore>,
    ) -> Self {
        Self { gateway, prompts }
    }

    /// Ask the model to classify the question against the schema.
    ///
    /// An unparseable completion degrades to the keyword heuristic instead
    /// of failing the run; gateway faults (auth, rate limit, transport)
    /// still surface so the caller can report them.
    pub async fn analyze(&self, question: &str, schema: &str) -> Result<QueryAnalysis> {
        let business_rules = self.prompts.business_rules();
        let (system, user) = self.prompts.render_pair(
            "query_analysis",
            &[
                ("question", question),
                ("schema", schema),
                ("business_rules", &business_rules),
            ],
        )?;

        let completion = self.gateway.complete(&system, &user).await?;

        match extract_json(&completion).and_then(|value| {
            serde_json::from_value::<QueryAnalysis>(value)
                .map_err(|e| AppError::UnparseableResponse(e.to_string()))
        }) {
            Ok(analysis) => {
                debug!(?analysis.query_type, confidence = analysis.confidence, "question analyzed");
                Ok(analysis)
            }
            Err(AppError::UnparseableResponse(reason)) => {
                warn!(reason, "analysis response not parseable, using heuristic");
                Ok(QueryAnalysis::heuristic(question))
            }
            Err(other) => Err(other),
        }
    }
}
