//! The question-to-insights pipeline.
//!
//! Five stages run in order: analyze, synthesize, validate, execute,
//! narrate. The first failing stage short-circuits the rest. `run` never
//! returns an error; every fault is folded into the outcome so callers
//! always get something serializable back.

use crate::application::use_cases::analyzer::QueryAnalyzer;
use crate::application::use_cases::insights::InsightGenerator;
use crate::application::use_cases::safety_gate;
use crate::application::use_cases::synthesizer::SqlSynthesizer;
use crate::domain::error::AppError;
use crate::domain::outcome::PipelineOutcome;
use crate::infrastructure::db::AnalyticsStore;
use crate::infrastructure::llm::CompletionGateway;
use crate::infrastructure::prompts::PromptStore;
use std::sync::Arc;
use tracing::{info, warn};

pub struct AnalyticsPipeline {
    analyzer: QueryAnalyzer,
    synthesizer: SqlSynthesizer,
    insights: InsightGenerator,
    store: Arc<AnalyticsStore>,
}

impl AnalyticsPipeline {
    pub fn new(
        gateway: Arc<dyn CompletionGateway + Send + Sync>,
        prompts: Arc<PromptStore>,
        store: Arc<AnalyticsStore>,
    ) -> Self {
        Self {
            analyzer: QueryAnalyzer::new(gateway.clone(), prompts.clone()),
            synthesizer: SqlSynthesizer::new(gateway.clone(), prompts.clone()),
            insights: InsightGenerator::new(gateway, prompts),
            store,
        }
    }

    pub async fn run(&self, question: &str) -> PipelineOutcome {
        info!(question, "pipeline run started");

        let schema = match self.store.describe_schema().await {
            Ok(schema) => schema,
            Err(e) => return Self::fail("schema introspection", e),
        };

        let analysis = match self.analyzer.analyze(question, &schema).await {
            Ok(analysis) => analysis,
            Err(e) => return Self::fail("analysis", e),
        };

        let candidate = match self.synthesizer.synthesize(question, &analysis, &schema).await {
            Ok(candidate) => candidate,
            Err(e) => return Self::fail("sql generation", e),
        };

        let validation = safety_gate::validate(&candidate.statement);
        if !validation.valid {
            warn!(errors = ?validation.errors, "statement rejected");
            // Rejections keep the partial artifacts so the caller can show
            // what was attempted.
            let mut outcome = Self::fail(
                "validation",
                AppError::ValidationFailed(validation.errors),
            );
            outcome.analysis = Some(analysis);
            outcome.statement = Some(candidate.statement);
            return outcome;
        }

        let rows = match self.store.execute(&candidate.statement).await {
            Ok(rows) => rows,
            Err(e) => return Self::fail("execution", e),
        };

        let insights = match self.insights.generate(question, &analysis, &rows).await {
            Ok(insights) => insights,
            Err(e) => return Self::fail("insight generation", e),
        };

        info!(row_count = rows.len(), "pipeline run finished");

        PipelineOutcome {
            success: true,
            row_count: Some(rows.len()),
            analysis: Some(analysis),
            statement: Some(candidate.statement),
            explanation: Some(candidate.explanation),
            rows: Some(rows),
            insights: Some(insights),
            error: None,
        }
    }

    fn fail(stage: &str, error: AppError) -> PipelineOutcome {
        warn!(stage, %error, "pipeline run failed");
        PipelineOutcome::failure(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Gateway double that replays completions in call order.
    struct ScriptedGateway {
        responses: Mutex<Vec<std::result::Result<String, AppError>>>,
    }

    impl ScriptedGateway {
        fn new(responses: Vec<std::result::Result<String, AppError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl CompletionGateway for ScriptedGateway {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            let mut responses = self.responses.lock().unwrap();
            assert!(!responses.is_empty(), "gateway called more times than scripted");
            responses.remove(0)
        }
    }

    async fn pipeline_with(
        responses: Vec<std::result::Result<String, AppError>>,
    ) -> (tempfile::TempDir, AnalyticsPipeline) {
        let tmp = tempfile::tempdir().unwrap();
        let prompts = Arc::new(PromptStore::new(tmp.path()));
        prompts.seed_defaults().unwrap();

        let store = Arc::new(AnalyticsStore::connect("sqlite::memory:", 5).await.unwrap());
        sqlx::query("CREATE TABLE orders (id INTEGER PRIMARY KEY, amount REAL)")
            .execute(store.pool())
            .await
            .unwrap();
        for amount in [10.0, 20.0, 30.0] {
            sqlx::query("INSERT INTO orders (amount) VALUES (?)")
                .bind(amount)
                .execute(store.pool())
                .await
                .unwrap();
        }

        let gateway = Arc::new(ScriptedGateway::new(responses));
        (tmp, AnalyticsPipeline::new(gateway, prompts, store))
    }

    const ANALYSIS_JSON: &str = r#"{"type": "statistical", "intent": "count orders", "columns": ["id"], "analysis_type": "descriptive", "confidence": 0.9}"#;

    #[tokio::test]
    async fn test_happy_path_end_to_end() {
        let (_tmp, pipeline) = pipeline_with(vec![
            Ok(ANALYSIS_JSON.to_string()),
            Ok("```sql\nSELECT COUNT(*) AS n FROM orders\n```\nCounts orders.".to_string()),
            Ok("There are 3 orders in total.".to_string()),
        ])
        .await;

        let outcome = pipeline.run("How many orders?").await;
        assert!(outcome.success, "error: {:?}", outcome.error);
        assert_eq!(outcome.row_count, Some(1));
        assert_eq!(outcome.rows.as_ref().unwrap()[0]["n"], serde_json::json!(3));
        assert_eq!(outcome.insights.as_deref(), Some("There are 3 orders in total."));
        assert!(outcome.statement.as_deref().unwrap().starts_with("SELECT"));
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_rejected_statement_keeps_partial_artifacts() {
        let (_tmp, pipeline) = pipeline_with(vec![
            Ok(ANALYSIS_JSON.to_string()),
            Ok("```sql\nDELETE FROM orders\n```".to_string()),
        ])
        .await;

        let outcome = pipeline.run("Remove everything").await;
        assert!(!outcome.success);
        assert!(outcome.error.as_deref().unwrap().contains("DELETE"));
        // Partial artifacts survive a rejection.
        assert!(outcome.analysis.is_some());
        assert_eq!(outcome.statement.as_deref(), Some("DELETE FROM orders"));
        // Execution never ran.
        assert!(outcome.rows.is_none());
        assert!(outcome.insights.is_none());
    }

    #[tokio::test]
    async fn test_execution_failure_discards_artifacts() {
        let (_tmp, pipeline) = pipeline_with(vec![
            Ok(ANALYSIS_JSON.to_string()),
            Ok("```sql\nSELECT * FROM no_such_table\n```".to_string()),
        ])
        .await;

        let outcome = pipeline.run("Show me everything").await;
        assert!(!outcome.success);
        assert!(outcome.error.as_deref().unwrap().contains("no_such_table"));
        assert!(outcome.analysis.is_none());
        assert!(outcome.statement.is_none());
    }

    #[tokio::test]
    async fn test_insight_failure_discards_rows() {
        let (_tmp, pipeline) = pipeline_with(vec![
            Ok(ANALYSIS_JSON.to_string()),
            Ok("```sql\nSELECT COUNT(*) AS n FROM orders\n```".to_string()),
            Err(AppError::TransportError("connection reset".to_string())),
        ])
        .await;

        let outcome = pipeline.run("How many orders?").await;
        assert!(!outcome.success);
        assert!(outcome.error.as_deref().unwrap().contains("connection reset"));
        assert!(outcome.rows.is_none());
        assert!(outcome.row_count.is_none());
    }

    #[tokio::test]
    async fn test_gateway_auth_failure_short_circuits() {
        let (_tmp, pipeline) = pipeline_with(vec![Err(AppError::AuthError(
            "invalid api key".to_string(),
        ))])
        .await;

        let outcome = pipeline.run("How many orders?").await;
        assert!(!outcome.success);
        assert!(outcome.error.as_deref().unwrap().contains("invalid api key"));
    }

    #[tokio::test]
    async fn test_unparseable_analysis_still_completes_via_heuristic() {
        let (_tmp, pipeline) = pipeline_with(vec![
            Ok("no json here, sorry".to_string()),
            Ok("```sql\nSELECT COUNT(*) AS n FROM orders\n```".to_string()),
            Ok("Three orders.".to_string()),
        ])
        .await;

        let outcome = pipeline.run("How many orders?").await;
        assert!(outcome.success);
        let analysis = outcome.analysis.unwrap();
        assert_eq!(
            analysis.source,
            crate::domain::analysis::AnalysisSource::Heuristic
        );
    }
}
