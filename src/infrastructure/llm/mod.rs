pub mod groq;

use crate::domain::error::Result;
use async_trait::async_trait;

pub use groq::GroqClient;

/// Remote text-completion backend: one system/user instruction pair in,
/// raw generated text out. Implementations classify transport failures as
/// `AuthError`, `RateLimited` or `TransportError` so callers can choose
/// distinct user-facing messages.
#[async_trait]
pub trait CompletionGateway {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}
