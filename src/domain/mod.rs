pub mod analysis;
pub mod error;
pub mod llm_config;
pub mod outcome;
pub mod prompt;
