use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LlmConfig;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Application configuration, merged from defaults, `tanyadata.toml` and
/// `TANYADATA_`-prefixed environment variables. The Groq credential is
/// always taken from `GROQ_API_KEY`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub prompts_dir: String,
    pub bind_host: String,
    pub bind_port: u16,
    pub query_timeout_secs: u64,
    pub llm: LlmConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://tanyadata.sqlite".to_string(),
            prompts_dir: "prompts".to_string(),
            bind_host: "127.0.0.1".to_string(),
            bind_port: 3001,
            query_timeout_secs: 30,
            llm: LlmConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        // .env is optional; missing file is not an error.
        let _ = dotenvy::dotenv();

        let mut config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file("tanyadata.toml"))
            .merge(Env::prefixed("TANYADATA_").split("__"))
            .extract()
            .map_err(|e| AppError::ConfigError(e.to_string()))?;

        if config.llm.api_key.is_none() {
            config.llm.api_key = std::env::var("GROQ_API_KEY").ok().filter(|k| !k.is_empty());
        }

        Ok(config)
    }
}
