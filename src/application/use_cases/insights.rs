//! Final pipeline stage: narrate the executed rows.

use crate::domain::analysis::QueryAnalysis;
use crate::domain::error::{AppError, Result};
use crate::domain::outcome::ResultRow;
use crate::infrastructure::llm::CompletionGateway;
use crate::infrastructure::prompts::PromptStore;
use std::sync::Arc;

/// How many rows the model gets to see. Full result sets can be large and
/// the sample is enough for narration.
const SAMPLE_ROWS: usize = 10;

pub struct InsightGenerator {
    gateway: Arc<dyn CompletionGateway + Send + Sync>,
    prompts: Arc<PromptStore>,
}

impl InsightGenerator {
    pub fn new(
        gateway: Arc<dyn CompletionGateway + Send + Sync>,
        prompts: Arc<PromptStore>,
    ) -> Self {
        Self { gateway, prompts }
    }

    pub async fn generate(
        &self,
        question: &str,
        analysis: &QueryAnalysis,
        rows: &[ResultRow],
    ) -> Result<String> {
        let analysis_json = serde_json::to_string_pretty(analysis)
            .map_err(|e| AppError::Internal(format!("Failed to serialize analysis: {}", e)))?;
        let data_summary = digest(rows)?;

        let (system, user) = self.prompts.render_pair(
            "insights_generation",
            &[
                ("question", question),
                ("analysis", &analysis_json),
                ("data_summary", &data_summary),
            ],
        )?;

        let completion = self.gateway.complete(&system, &user).await?;
        Ok(completion.trim().to_string())
    }
}

/// Compact textual digest of a result set: total count plus a pretty-printed
/// sample of the first rows.
pub fn digest(rows: &[ResultRow]) -> Result<String> {
    if rows.is_empty() {
        return Ok("No data returned".to_string());
    }

    let sample = &rows[..rows.len().min(SAMPLE_ROWS)];
    let sample_json = serde_json::to_string_pretty(sample)
        .map_err(|e| AppError::Internal(format!("Failed to serialize rows: {}", e)))?;

    Ok(format!(
        "Total rows: {}\n\nSample (first {} rows):\n{}",
        rows.len(),
        sample.len(),
        sample_json
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(n: i64) -> ResultRow {
        let mut row = ResultRow::new();
        row.insert("n".to_string(), serde_json::json!(n));
        row
    }

    #[test]
    fn test_digest_small_result_set() {
        let rows = vec![row(1), row(2)];
        let text = digest(&rows).unwrap();
        assert!(text.starts_with("Total rows: 2"));
        assert!(text.contains("Sample (first 2 rows):"));
        assert!(text.contains("\"n\": 1"));
    }

    #[test]
    fn test_digest_caps_sample() {
        let rows: Vec<ResultRow> = (0..25).map(row).collect();
        let text = digest(&rows).unwrap();
        assert!(text.starts_with("Total rows: 25"));
        assert!(text.contains("Sample (first 10 rows):"));
        assert!(!text.contains("\"n\": 11"));
    }

    #[test]
    fn test_digest_empty_result_set() {
        assert_eq!(digest(&[]).unwrap(), "No data returned");
    }
}
