//! Query expansion: retrieve for several paraphrases and union the results

use crate::generation::PromptBuilder;
use crate::types::{StrategyKind, StrategyResult};

use super::Executor;

/// Generated paraphrases kept per query
pub const MAX_PARAPHRASES: usize = 5;

/// Split generator output into at most `MAX_PARAPHRASES` paraphrases, keeping the original query
pub fn paraphrases(query: &str, generated: &str) -> Vec<String> {
    let mut queries: Vec<String> = Vec::new();
    for line in generated.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if queries.len() == MAX_PARAPHRASES {
            break;
        }
        if !queries.iter().any(|q| q == line) {
            queries.push(line.to_string());
        }
    }
    if !queries.iter().any(|q| q == query) {
        queries.push(query.to_string());
    }
    queries
}

pub async fn run(exec: &Executor, query: &str, k: usize) -> StrategyResult {
    let config = exec.config();
    let prompt = PromptBuilder::expansion(query);

    let (queries, generation_failed) = match exec
        .generate(&prompt, config.expansion_max_tokens, config.expansion_temperature)
        .await
    {
        Ok(text) => (paraphrases(query, &text), false),
        Err(e) => {
            tracing::warn!("Query expansion failed, using original query: {}", e);
            (vec![query.to_string()], true)
        }
    };

    let probes: Vec<(String, usize)> = queries.iter().map(|q| (q.clone(), k)).collect();
    let gathered = exec.gather(&probes, StrategyKind::Expansion).await;
    let degraded = generation_failed || gathered.is_degraded();
    let contexts = gathered.finish(exec.source_id(), query, k, StrategyKind::Expansion);

    let thinking = format!(
        "Expanded '{}' into {} queries:\n{}\nAggregated to {} contexts.",
        query,
        queries.len(),
        queries
            .iter()
            .map(|q| format!("- {}", q))
            .collect::<Vec<_>>()
            .join("\n"),
        contexts.len()
    );

    let result = StrategyResult::new(contexts, thinking);
    if degraded {
        result.degraded()
    } else {
        result
    }
}
