//! File-backed prompt template store.
//!
//! Templates live at `<dir>/<role>/<name>.txt`. First resolution of a
//! `(role, name)` pair is cached for the lifetime of the process behind an
//! `RwLock`; the cache is never invalidated, so edits to a template file
//! require a restart.

use crate::domain::error::{AppError, Result};
use crate::domain::prompt::{render_template, PromptRole, PromptTemplate};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::info;

pub struct PromptStore {
    dir: PathBuf,
    cache: RwLock<HashMap<(PromptRole, String), Arc<PromptTemplate>>>,
}

impl PromptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve a named template for the given role, reading it from disk on
    /// first use. A concurrent first access may read the file twice; both
    /// reads produce the same template, which is acceptable.
    pub fn resolve(&self, role: PromptRole, name: &str) -> Result<Arc<PromptTemplate>> {
        let key = (role, name.to_string());

        if let Some(template) = self.cache.read().unwrap().get(&key) {
            return Ok(template.clone());
        }

        let path = self.dir.join(role.as_dir()).join(format!("{}.txt", name));
        let body = std::fs::read_to_string(&path).map_err(|_| {
            AppError::TemplateNotFound(format!("{} ({})", name, path.display()))
        })?;

        let template = Arc::new(PromptTemplate {
            name: name.to_string(),
            role,
            body,
        });

        self.cache
            .write()
            .unwrap()
            .insert(key, template.clone());

        Ok(template)
    }

    /// Resolve the system/user pair for a pipeline stage and render both
    /// with the same variables. A stage whose templates are missing falls
    /// back to the generic `system_prompt` plus a bare question turn.
    pub fn render_pair(&self, name: &str, variables: &[(&str, &str)]) -> Result<(String, String)> {
        let system = match self.resolve(PromptRole::System, name) {
            Ok(template) => template,
            Err(AppError::TemplateNotFound(_)) => self.resolve(PromptRole::System, "system_prompt")?,
            Err(e) => return Err(e),
        };
        let user = match self.resolve(PromptRole::User, name) {
            Ok(template) => template.render(variables),
            Err(AppError::TemplateNotFound(_)) => {
                render_template("Question: \"{question}\"", variables)
            }
            Err(e) => return Err(e),
        };
        Ok((system.render(variables), user))
    }

    /// Read the business rules text, falling back to a placeholder when the
    /// file has not been provisioned.
    pub fn business_rules(&self) -> String {
        match self.resolve(PromptRole::System, "business_rules") {
            Ok(template) => template.body.clone(),
            Err(_) => "No specific business rules defined".to_string(),
        }
    }

    /// Write the default template files, skipping any that already exist.
    pub fn seed_defaults(&self) -> Result<usize> {
        let mut written = 0;
        for (role, name, body) in default_templates() {
            let dir = self.dir.join(role.as_dir());
            std::fs::create_dir_all(&dir)?;
            let path = dir.join(format!("{}.txt", name));
            if path.exists() {
                continue;
            }
            std::fs::write(&path, body)?;
            info!(path = %path.display(), "created prompt template");
            written += 1;
        }
        Ok(written)
    }
}

/// Standalone render used by callers that build prompt text inline.
pub fn render(template: &str, variables: &[(&str, &str)]) -> String {
    render_template(template, variables)
}

fn default_templates() -> Vec<(PromptRole, &'static str, &'static str)> {
    vec![
        (
            PromptRole::System,
            "system_prompt",
            "You are an expert business analytics AI assistant specialized in analyzing tabular data.\n\n\
             Your capabilities include:\n\
             - Analyzing data patterns and customer behavior\n\
             - Generating SQL queries for SQLite databases\n\
             - Providing actionable insights and recommendations\n\n\
             You should:\n\
             - Always provide data-driven insights\n\
             - Be concise but comprehensive\n\
             - Explain your reasoning\n\
             - Highlight key findings",
        ),
        (
            PromptRole::System,
            "business_rules",
            "## BUSINESS RULES\n\n\
             ### DATA HANDLING\n\
             - Handle NULL values appropriately with COALESCE or IS NOT NULL\n\
             - Use appropriate data types (numbers for amounts, dates for temporal data)\n\n\
             ### QUERY STANDARDS\n\
             - Always use LIMIT to prevent excessive data returns (default 1000)\n\
             - Use meaningful column aliases for clarity\n\
             - Add ORDER BY for sorted results\n\
             - Use WHERE clauses for filtering",
        ),
        (
            PromptRole::System,
            "query_analysis",
            "You are an analytics assistant. Analyze the user's question and return structured information.\n\n\
             Database Schema:\n{schema}\n\n\
             Business Rules:\n{business_rules}\n\n\
             Analyze the question and return ONLY a JSON object with this structure:\n\
             {\n\
               \"type\": \"statistical or visualization or ml or general\",\n\
               \"intent\": \"short description of what the user wants\",\n\
               \"columns\": [\"list\", \"of\", \"relevant\", \"columns\"],\n\
               \"analysis_type\": \"descriptive or prediction or comparison or trend\",\n\
               \"confidence\": 0.0 to 1.0\n\
             }\n\n\
             Types:\n\
             - statistical: counts, sums, averages, aggregations\n\
             - visualization: charts, graphs, visual representations\n\
             - ml: predictions, forecasts, patterns\n\
             - general: general information queries\n\n\
             Return ONLY the JSON object, no additional text.",
        ),
        (
            PromptRole::User,
            "query_analysis",
            "Question: \"{question}\"\n\nAnalyze this question and return the JSON response.",
        ),
        (
            PromptRole::System,
            "sql_generation",
            "You are an expert SQL query generator for SQLite databases.\n\n\
             Database Schema:\n{schema}\n\n\
             Business Rules:\n{business_rules}\n\n\
             Question Analysis:\n{analysis}\n\n\
             Generate a valid SQLite SQL query based on the user's request.\n\n\
             Requirements:\n\
             1. Use valid SQLite syntax\n\
             2. Include WHERE clauses for filtering\n\
             3. Use GROUP BY for aggregations\n\
             4. Add ORDER BY for sorted results\n\
             5. Always include LIMIT (default 1000)\n\
             6. Use meaningful column aliases\n\
             7. Handle NULL values with COALESCE\n\n\
             Safety:\n\
             - Only generate SELECT queries\n\
             - Never use DROP, DELETE, TRUNCATE, ALTER, CREATE, INSERT, UPDATE\n\n\
             Format: Put SQL in a ```sql code block, then briefly explain the query.",
        ),
        (
            PromptRole::User,
            "sql_generation",
            "Question: \"{question}\"\n\n\
             Analysis Results: {analysis}\n\n\
             Generate an optimized SQL query. Include:\n\
             1. The SQL query in a ```sql code block\n\
             2. A brief explanation",
        ),
        (
            PromptRole::System,
            "insights_generation",
            "You are a business intelligence analyst generating insights from data.\n\n\
             Original Question: {question}\n\n\
             Question Analysis: {analysis}\n\n\
             Data Summary:\n{data_summary}\n\n\
             Generate insights:\n\
             1. Identify key patterns and trends\n\
             2. Provide actionable insights\n\
             3. Highlight important metrics\n\
             4. Note any interesting findings\n\n\
             Keep the response concise but informative. Focus on business value.",
        ),
        (
            PromptRole::User,
            "insights_generation",
            "Generate insights and recommendations from the data.\n\n\
             Focus on:\n\
             - What the data reveals\n\
             - Key trends or patterns\n\
             - Actionable recommendations",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_and_resolve() {
        let tmp = tempfile::tempdir().unwrap();
        let store = PromptStore::new(tmp.path());

        let written = store.seed_defaults().unwrap();
        assert_eq!(written, 8);

        let template = store.resolve(PromptRole::System, "query_analysis").unwrap();
        assert!(template.body.contains("{schema}"));

        // Second seed is a no-op
        assert_eq!(store.seed_defaults().unwrap(), 0);
    }

    #[test]
    fn test_resolve_missing_template() {
        let tmp = tempfile::tempdir().unwrap();
        let store = PromptStore::new(tmp.path());
        let err = store.resolve(PromptRole::System, "nope").unwrap_err();
        assert!(matches!(err, AppError::TemplateNotFound(_)));
    }

    #[test]
    fn test_cache_survives_file_removal() {
        let tmp = tempfile::tempdir().unwrap();
        let store = PromptStore::new(tmp.path());
        store.seed_defaults().unwrap();

        store.resolve(PromptRole::User, "query_analysis").unwrap();
        std::fs::remove_file(tmp.path().join("user/query_analysis.txt")).unwrap();

        // Cached copy is still served after the file disappears.
        assert!(store.resolve(PromptRole::User, "query_analysis").is_ok());
    }

    #[test]
    fn test_render_pair_falls_back_to_generic_prompt() {
        let tmp = tempfile::tempdir().unwrap();
        let store = PromptStore::new(tmp.path());
        store.seed_defaults().unwrap();
        std::fs::remove_file(tmp.path().join("system/sql_generation.txt")).unwrap();
        std::fs::remove_file(tmp.path().join("user/sql_generation.txt")).unwrap();

        let (system, user) = store
            .render_pair("sql_generation", &[("question", "how many rows?")])
            .unwrap();
        assert!(system.contains("expert business analytics"));
        assert_eq!(user, "Question: \"how many rows?\"");
    }

    #[test]
    fn test_render_pair_fails_without_generic_prompt() {
        let tmp = tempfile::tempdir().unwrap();
        let store = PromptStore::new(tmp.path());
        let err = store.render_pair("sql_generation", &[]).unwrap_err();
        assert!(matches!(err, AppError::TemplateNotFound(_)));
    }

    #[test]
    fn test_render_pair_substitutes_both_sides() {
        let tmp = tempfile::tempdir().unwrap();
        let store = PromptStore::new(tmp.path());
        store.seed_defaults().unwrap();

        let (system, user) = store
            .render_pair(
                "query_analysis",
                &[
                    ("question", "how many rows?"),
                    ("schema", "Table: t"),
                    ("business_rules", "none"),
                ],
            )
            .unwrap();
        assert!(system.contains("Table: t"));
        assert!(user.contains("how many rows?"));
        assert!(!user.contains("{question}"));
    }
}
