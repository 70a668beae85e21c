use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Statistical,
    Visualization,
    Ml,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Descriptive,
    Prediction,
    Comparison,
    Trend,
}

/// Whether the analysis came from the model or from the keyword heuristic
/// used when the model response could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisSource {
    Parsed,
    Heuristic,
}

/// Classification of a user question, produced once per pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnalysis {
    #[serde(rename = "type")]
    pub query_type: QueryType,
    pub intent: String,
    #[serde(default)]
    pub columns: Vec<String>,
    pub analysis_type: AnalysisType,
    pub confidence: f64,
    #[serde(default = "default_source")]
    pub source: AnalysisSource,
}

fn default_source() -> AnalysisSource {
    AnalysisSource::Parsed
}

/// Fixed confidence assigned on the heuristic fallback path.
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

impl QueryAnalysis {
    /// Heuristic classification for when the model response is not valid JSON.
    pub fn heuristic(question: &str) -> Self {
        let lower = question.to_lowercase();
        let statistical = ["count", "sum", "average", "total", "how many"]
            .iter()
            .any(|kw| lower.contains(kw));

        Self {
            query_type: if statistical {
                QueryType::Statistical
            } else {
                QueryType::General
            },
            intent: question.to_string(),
            columns: Vec::new(),
            analysis_type: AnalysisType::Descriptive,
            confidence: FALLBACK_CONFIDENCE,
            source: AnalysisSource::Heuristic,
        }
    }
}
