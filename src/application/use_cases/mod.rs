pub mod analyzer;
pub mod insights;
pub mod pipeline;
pub mod response_parser;
pub mod safety_gate;
pub mod synthesizer;

pub use pipeline::AnalyticsPipeline;
