//! Hypothetical document retrieval
//!
//! The generator drafts an ideal answer document and the knowledge source is
//! queried with that text instead of the question.

use crate::generation::PromptBuilder;
use crate::types::{StrategyKind, StrategyResult};

use super::Executor;

pub async fn run(exec: &Executor, query: &str, k: usize) -> StrategyResult {
    let config = exec.config();
    let prompt = PromptBuilder::hypothetical_document(query);

    let (probe, generation_failed) = match exec
        .generate(&prompt, config.generation_max_tokens, config.generation_temperature)
        .await
    {
        Ok(document) => (document, false),
        Err(e) => {
            tracing::warn!("Hypothetical document generation failed, using original query: {}", e);
            (query.to_string(), true)
        }
    };

    let gathered = exec.gather(&[(probe.clone(), k)], StrategyKind::Hyde).await;
    let degraded = generation_failed || gathered.is_degraded();
    let contexts = gathered.finish(exec.source_id(), query, k, StrategyKind::Hyde);

    let preview: String = probe.chars().take(200).collect();
    let thinking = if generation_failed {
        format!("HyDE generation failed; retrieved with the original query. Found {} contexts.", contexts.len())
    } else {
        format!(
            "Generated hypothetical document:\n{}...\nRetrieved {} contexts with it.",
            preview,
            contexts.len()
        )
    };

    let result = StrategyResult::new(contexts, thinking);
    if degraded {
        result.degraded()
    } else {
        result
    }
}
