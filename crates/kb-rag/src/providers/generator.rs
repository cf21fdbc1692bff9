//! Answer generator trait for text synthesis

use async_trait::async_trait;
use crate::error::Result;

/// Trait for LLM-based text generation
///
/// Used for query expansion, hypothetical documents, answer synthesis and
/// relationship / optimization analysis.
///
/// Implementations:
/// - `OllamaGenerator`: Local Ollama server
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Generate text for a prompt; failures surface as `Error::Generation`
    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
