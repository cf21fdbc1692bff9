//! Table relationship retrieval and analysis

use crate::generation::PromptBuilder;
use crate::types::{RetrievedContext, StrategyKind, StrategyResult};

use super::Executor;

/// Default number of contexts kept for relationship analysis
pub const DEFAULT_K: usize = 10;

/// Probe queries issued for a table
pub fn probes(table: &str, k: usize) -> Vec<(String, usize)> {
    let per_probe = ((k + 4) / 5).max(1);
    [
        format!("relationships of {} table", table),
        format!("{} foreign keys", table),
        format!("tables that reference {}", table),
        format!("{} primary key", table),
        format!("{} table schema relationships", table),
    ]
    .into_iter()
    .map(|q| (q, per_probe))
    .collect()
}

pub async fn run(exec: &Executor, table: &str, k: usize) -> StrategyResult {
    let probes = probes(table, k);
    let gathered = exec.gather(&probes, StrategyKind::Relationship).await;
    let mut degraded = gathered.is_degraded();
    let contexts = gathered.finish(
        exec.source_id(),
        &format!("relationships of {} table", table),
        k,
        StrategyKind::Relationship,
    );

    let config = exec.config();
    let documentation: Vec<RetrievedContext> =
        contexts.iter().filter(|c| !c.is_fallback()).cloned().collect();
    let prompt = PromptBuilder::relationship_analysis(table, &documentation);
    let analysis = match exec
        .generate(&prompt, config.generation_max_tokens, config.generation_temperature)
        .await
    {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Relationship analysis for '{}' failed: {}", table, e);
            degraded = true;
            PromptBuilder::relationship_fallback(table, &e.to_string())
        }
    };

    let thinking = format!(
        "Ran {} relationship probes for table '{}' ({} results each) and kept {} contexts.",
        probes.len(),
        table,
        probes.first().map(|(_, n)| *n).unwrap_or_default(),
        contexts.len()
    );

    let result = StrategyResult::new(contexts, thinking).with_answer(analysis);
    if degraded {
        result.degraded()
    } else {
        result
    }
}
