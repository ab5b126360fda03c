//! Chat/completion provider trait.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that answers a prompt with free text.
///
/// Used by the multi-query strategy to paraphrase queries and by the
/// self-query strategy to extract structured filters.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Complete `prompt`, returning the model's raw text answer.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Short provider name used in logs and errors.
    fn name(&self) -> &str {
        "completion"
    }
}
