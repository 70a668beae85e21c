use std::path::Path;
use std::sync::{Arc, Mutex};
use tanyadata::application::use_cases::AnalyticsPipeline;
use tanyadata::infrastructure::config::AppConfig;
use tanyadata::infrastructure::csv::CsvIngestor;
use tanyadata::infrastructure::db::AnalyticsStore;
use tanyadata::infrastructure::llm::GroqClient;
use tanyadata::infrastructure::prompts::PromptStore;
use tanyadata::interfaces::http::{start_server, HttpState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("ingest") => {
            let Some(csv_path) = args.get(2) else {
                eprintln!("usage: tanyadata ingest <file.csv> [table]");
                std::process::exit(2);
            };
            let table = args.get(3).map(String::as_str).unwrap_or("transactions");
            run_ingest(&config, csv_path, table).await
        }
        Some("setup-prompts") => {
            let prompts = PromptStore::new(&config.prompts_dir);
            match prompts.seed_defaults() {
                Ok(written) => {
                    info!(written, dir = %config.prompts_dir, "prompt templates seeded");
                    Ok(())
                }
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
            }
        }
        Some("serve") | None => serve(config).await,
        Some(other) => {
            eprintln!("unknown command: {}", other);
            eprintln!("usage: tanyadata [serve | ingest <file.csv> [table] | setup-prompts]");
            std::process::exit(2);
        }
    }
}

async fn serve(config: AppConfig) -> std::io::Result<()> {
    let store = AnalyticsStore::connect(&config.database_url, config.query_timeout_secs)
        .await
        .unwrap_or_else(|e| {
            eprintln!("{}", e);
            std::process::exit(1);
        });
    let store = Arc::new(store);

    let prompts = Arc::new(PromptStore::new(&config.prompts_dir));
    // Idempotent; makes a fresh checkout usable without a separate step.
    if let Err(e) = prompts.seed_defaults() {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let has_api_key = config.llm.api_key.is_some();
    let gateway = Arc::new(GroqClient::new(config.llm.clone()));
    let pipeline = Arc::new(AnalyticsPipeline::new(
        gateway,
        prompts.clone(),
        store.clone(),
    ));

    let state = HttpState {
        pipeline,
        store,
        prompts,
        has_api_key,
        sessions: Mutex::new(Default::default()),
        logs: Arc::new(Mutex::new(Vec::new())),
    };

    info!(
        host = %config.bind_host,
        port = config.bind_port,
        "starting http server"
    );
    start_server(state, &config.bind_host, config.bind_port)?.await
}

async fn run_ingest(config: &AppConfig, csv_path: &str, table: &str) -> std::io::Result<()> {
    let store = AnalyticsStore::connect(&config.database_url, config.query_timeout_secs)
        .await
        .unwrap_or_else(|e| {
            eprintln!("{}", e);
            std::process::exit(1);
        });

    let ingestor = CsvIngestor::new();
    match ingestor.ingest(store.pool(), Path::new(csv_path), table).await {
        Ok(report) => {
            info!(
                table = %report.table,
                rows = report.rows_written,
                columns = report.columns.len(),
                indexes = report.indexes_created,
                "csv ingested"
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
