pub mod ingest;

pub use ingest::{CsvIngestor, IngestReport};
