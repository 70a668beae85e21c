//! CSV to SQLite ingestion.
//!
//! Loads a flat file into a single table with cleaned column names,
//! heuristic column typing, helpful indexes and an ANALYZE at the end.
//! When a datetime-like column exists the most recent rows win the
//! row-count cap.

use crate::domain::error::{AppError, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{info, warn};

const INSERT_BATCH: usize = 500;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w]+").unwrap());
static UNDERSCORE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").unwrap());
static NON_NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d\.\-]").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    fn sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub table: String,
    pub columns: Vec<String>,
    pub rows_written: usize,
    pub indexes_created: usize,
}

pub struct CsvIngestor {
    /// Maximum number of rows to keep; most recent first when a
    /// datetime-like column is present.
    max_rows: usize,
    /// Rows sampled for column type inference.
    sample_rows: usize,
}

impl Default for CsvIngestor {
    fn default() -> Self {
        Self {
            max_rows: 300_000,
            sample_rows: 5_000,
        }
    }
}

impl CsvIngestor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Load a CSV file into `table`, replacing any previous contents.
    pub async fn ingest(
        &self,
        pool: &SqlitePool,
        csv_path: &Path,
        table: &str,
    ) -> Result<IngestReport> {
        if !is_valid_identifier(table) {
            return Err(AppError::ValidationFailed(vec![format!(
                "Invalid table name: {}",
                table
            )]));
        }

        let content = read_with_encoding_detection(csv_path)?;

        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| AppError::IoError(format!("Failed to read CSV headers: {}", e)))?
            .clone();
        let columns = clean_columns(&headers);

        let mut records: Vec<StringRecord> = Vec::new();
        for result in reader.records() {
            let record =
                result.map_err(|e| AppError::IoError(format!("Failed to parse CSV row: {}", e)))?;
            records.push(record);
        }
        info!(rows = records.len(), path = %csv_path.display(), "read CSV file");

        // Most recent rows win the cap when a datetime-like column exists.
        let date_idx = columns.iter().position(|c| likely_datetime(c));
        if records.len() > self.max_rows {
            if let Some(idx) = date_idx {
                records.sort_by(|a, b| {
                    b.get(idx).unwrap_or("").cmp(a.get(idx).unwrap_or(""))
                });
            } else {
                warn!("no datetime-like column found, keeping first {} rows", self.max_rows);
            }
            records.truncate(self.max_rows);
        }

        let types = infer_column_types(&columns, &records, self.sample_rows);

        self.create_table(pool, table, &columns, &types).await?;
        let rows_written = self
            .insert_rows(pool, table, &columns, &types, &records)
            .await?;
        let indexes_created = self.create_helpful_indexes(pool, table, &columns).await?;

        sqlx::query("ANALYZE")
            .execute(pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("ANALYZE failed: {}", e)))?;

        info!(table, rows_written, indexes_created, "ingestion complete");

        Ok(IngestReport {
            table: table.to_string(),
            columns,
            rows_written,
            indexes_created,
        })
    }

    async fn create_table(
        &self,
        pool: &SqlitePool,
        table: &str,
        columns: &[String],
        types: &[ColumnType],
    ) -> Result<()> {
        sqlx::query(&format!("DROP TABLE IF EXISTS \"{}\"", table))
            .execute(pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to drop table: {}", e)))?;

        let column_defs: Vec<String> = columns
            .iter()
            .zip(types)
            .map(|(name, ty)| format!("\"{}\" {}", name, ty.sql()))
            .collect();

        sqlx::query(&format!(
            "CREATE TABLE \"{}\" ({})",
            table,
            column_defs.join(", ")
        ))
        .execute(pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create table: {}", e)))?;

        Ok(())
    }

    async fn insert_rows(
        &self,
        pool: &SqlitePool,
        table: &str,
        columns: &[String],
        types: &[ColumnType],
        records: &[StringRecord],
    ) -> Result<usize> {
        let placeholders = vec!["?"; columns.len()].join(", ");
        let column_list = columns
            .iter()
            .map(|c| format!("\"{}\"", c))
            .collect::<Vec<_>>()
            .join(", ");
        let insert_sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            table, column_list, placeholders
        );

        let mut written = 0usize;
        for batch in records.chunks(INSERT_BATCH) {
            let mut tx = pool
                .begin()
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to begin batch: {}", e)))?;

            for record in batch {
                let mut query = sqlx::query(&insert_sql);
                for (i, (column, ty)) in columns.iter().zip(types).enumerate() {
                    let raw = record.get(i).unwrap_or("").trim();
                    query = bind_field(query, column, *ty, raw);
                }
                query.execute(&mut *tx).await.map_err(|e| {
                    AppError::DatabaseError(format!("Failed to insert row: {}", e))
                })?;
                written += 1;
            }

            tx.commit()
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to commit batch: {}", e)))?;
        }

        Ok(written)
    }

    /// Index id-like columns, amount, and the first datetime-like column.
    async fn create_helpful_indexes(
        &self,
        pool: &SqlitePool,
        table: &str,
        columns: &[String],
    ) -> Result<usize> {
        let mut candidates: Vec<String> = ["transaction_id", "customer_id", "user_id", "merchant_id", "amount"]
            .iter()
            .filter(|c| columns.iter().any(|col| col == *c))
            .map(|c| c.to_string())
            .collect();

        if let Some(dt) = columns.iter().find(|c| likely_datetime(c)) {
            if !candidates.contains(dt) {
                candidates.push(dt.clone());
            }
        }

        let mut created = 0;
        for column in &candidates {
            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{}_{} ON \"{}\"(\"{}\")",
                table, column, table, column
            ))
            .execute(pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create index: {}", e)))?;
            created += 1;
        }

        Ok(created)
    }
}

type SqliteQuery<'q> =
    sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_field<'q>(
    query: SqliteQuery<'q>,
    column: &str,
    ty: ColumnType,
    raw: &str,
) -> SqliteQuery<'q> {
    if raw.is_empty() {
        return query.bind(Option::<String>::None);
    }

    let cleaned;
    let value = if likely_numeric(column) {
        cleaned = NON_NUMERIC.replace_all(raw, "").into_owned();
        cleaned.as_str()
    } else {
        raw
    };

    match ty {
        ColumnType::Integer => match value.parse::<i64>() {
            Ok(n) => query.bind(n),
            Err(_) => query.bind(Option::<i64>::None),
        },
        ColumnType::Real => match value.parse::<f64>() {
            Ok(n) => query.bind(n),
            Err(_) => query.bind(Option::<f64>::None),
        },
        ColumnType::Text => query.bind(value.to_string()),
    }
}

/// Lowercase, collapse non-word runs to underscores, dedupe underscores.
pub fn clean_columns(headers: &StringRecord) -> Vec<String> {
    headers
        .iter()
        .map(|h| {
            let lowered = h.trim().to_lowercase();
            let cleaned = NON_WORD.replace_all(&lowered, "_");
            let cleaned = UNDERSCORE_RUN.replace_all(&cleaned, "_");
            let cleaned = cleaned.trim_matches('_').to_string();
            if cleaned.is_empty() {
                "col".to_string()
            } else {
                cleaned
            }
        })
        .collect()
}

pub fn likely_datetime(name: &str) -> bool {
    let k = name.to_lowercase();
    ["date", "time", "timestamp", "created", "dt"]
        .iter()
        .any(|t| k.contains(t))
}

pub fn likely_numeric(name: &str) -> bool {
    let k = name.to_lowercase();
    ["amount", "value", "balance", "qty", "count", "fee", "price"]
        .iter()
        .any(|t| k.contains(t))
}

fn infer_column_types(
    columns: &[String],
    records: &[StringRecord],
    sample_rows: usize,
) -> Vec<ColumnType> {
    columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let mut saw_value = false;
            let mut all_integer = true;
            let mut all_real = true;

            for record in records.iter().take(sample_rows) {
                let raw = record.get(i).unwrap_or("").trim();
                if raw.is_empty() {
                    continue;
                }
                let cleaned;
                let value = if likely_numeric(column) {
                    cleaned = NON_NUMERIC.replace_all(raw, "").into_owned();
                    cleaned.as_str()
                } else {
                    raw
                };
                if value.is_empty() {
                    continue;
                }
                saw_value = true;
                if value.parse::<i64>().is_err() {
                    all_integer = false;
                }
                if value.parse::<f64>().is_err() {
                    all_real = false;
                }
            }

            if !saw_value {
                ColumnType::Text
            } else if all_integer {
                ColumnType::Integer
            } else if all_real {
                ColumnType::Real
            } else {
                ColumnType::Text
            }
        })
        .collect()
}

fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Read a file as UTF-8, falling back to Latin-1 decoding.
fn read_with_encoding_detection(path: &Path) -> Result<String> {
    let buffer = std::fs::read(path)
        .map_err(|e| AppError::IoError(format!("Failed to read {}: {}", path.display(), e)))?;

    match String::from_utf8(buffer) {
        Ok(content) => Ok(content),
        Err(err) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(err.as_bytes());
            Ok(decoded.into_owned())
        }
    }
}
