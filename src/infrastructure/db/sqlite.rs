//! SQLite-backed tabular store.
//!
//! Holds the shared read-mostly pool, introspects the schema into the text
//! form the generation stages consume, and executes validated statements.
//! The pipeline never writes; only the ingestion path does.

use crate::domain::error::{AppError, Result};
use crate::domain::outcome::ResultRow;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::{Column, Row};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

pub struct AnalyticsStore {
    pool: SqlitePool,
    query_timeout_secs: u64,
}

impl AnalyticsStore {
    pub async fn connect(database_url: &str, query_timeout_secs: u64) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to parse connection string: {}", e))
            })?
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect: {}", e)))?;

        info!(database_url, "connected to analytics store");

        Ok(Self {
            pool,
            query_timeout_secs,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Health check: one trivial round trip.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| AppError::DatabaseError(format!("Health check failed: {}", e)))
    }

    /// Run a validated statement exactly as given and materialize all rows.
    /// The safety gate upstream is what guarantees this never mutates the
    /// store; no further rewriting happens here.
    pub async fn execute(&self, statement: &str) -> Result<Vec<ResultRow>> {
        debug!(statement, "executing statement");

        let result = tokio::time::timeout(
            Duration::from_secs(self.query_timeout_secs),
            sqlx::query(statement).fetch_all(&self.pool),
        )
        .await
        .map_err(|_| {
            AppError::ExecutionError(format!(
                "Query timed out after {} seconds",
                self.query_timeout_secs
            ))
        })?
        .map_err(|e| AppError::ExecutionError(e.to_string()))?;

        let mut rows: Vec<ResultRow> = Vec::with_capacity(result.len());
        for row in &result {
            let mut row_map = ResultRow::new();
            for (i, column) in row.columns().iter().enumerate() {
                row_map.insert(column.name().to_string(), Self::extract_column_value(row, i));
            }
            rows.push(row_map);
        }

        debug!(row_count = rows.len(), "statement returned");
        Ok(rows)
    }

    /// Decode one column into a JSON scalar, trying the common SQLite
    /// storage classes in order.
    fn extract_column_value(row: &SqliteRow, index: usize) -> serde_json::Value {
        if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
            return v
                .map(|n| serde_json::Value::Number(n.into()))
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
            return v
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<String>, _>(index) {
            return v
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
            return v
                .map(serde_json::Value::Bool)
                .unwrap_or(serde_json::Value::Null);
        }

        serde_json::Value::Null
    }

    /// Render the schema of every user table as stable text: columns with
    /// declared types, primary-key flags and approximate row counts. This
    /// is the `{schema}` input of the generation prompts.
    pub async fn describe_schema(&self) -> Result<String> {
        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list tables: {}", e)))?;

        if tables.is_empty() {
            return Ok("Database schema not available (no tables)".to_string());
        }

        let mut structure = format!("DATABASE SCHEMA:\n{}\n\n", "=".repeat(60));

        for (table_name,) in &tables {
            structure.push_str(&format!("Table: {}\n", table_name));
            structure.push_str(&format!("{}\n", "-".repeat(40)));

            let columns: Vec<(i64, String, String, i64, Option<String>, i64)> =
                sqlx::query_as(&format!("PRAGMA table_info(\"{}\")", table_name))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| {
                        AppError::DatabaseError(format!(
                            "Failed to read columns of {}: {}",
                            table_name, e
                        ))
                    })?;

            structure.push_str("Columns:\n");
            for (_cid, name, col_type, _notnull, _default, pk) in &columns {
                structure.push_str(&format!("  - {} ({})", name, col_type));
                if *pk > 0 {
                    structure.push_str(" [PRIMARY KEY]");
                }
                structure.push('\n');
            }

            let (count,): (i64,) =
                sqlx::query_as(&format!("SELECT COUNT(*) FROM \"{}\"", table_name))
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| {
                        AppError::DatabaseError(format!(
                            "Failed to count rows of {}: {}",
                            table_name, e
                        ))
                    })?;

            structure.push_str(&format!("\nTotal rows: {}\n\n", count));
        }

        Ok(structure)
    }
}
