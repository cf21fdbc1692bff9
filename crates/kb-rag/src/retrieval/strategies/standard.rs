//! Single direct retrieval

use crate::types::{StrategyKind, StrategyResult};

use super::Executor;

pub async fn run(exec: &Executor, query: &str, k: usize) -> StrategyResult {
    let gathered = exec
        .gather(&[(query.to_string(), k)], StrategyKind::Standard)
        .await;
    let degraded = gathered.is_degraded();
    let contexts = gathered.finish(exec.source_id(), query, k, StrategyKind::Standard);

    let thinking = if degraded {
        format!("Standard retrieval for '{}' failed; returning a fallback context.", query)
    } else {
        format!("Standard retrieval for '{}' returned {} contexts.", query, contexts.len())
    };

    let result = StrategyResult::new(contexts, thinking);
    if degraded {
        result.degraded()
    } else {
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::strategies::testing::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_single_call_ranked() {
        let gateway = Arc::new(EchoGateway::new("KB1"));
        let exec = executor(gateway.clone(), Arc::new(FixedGenerator::failing()));

        let result = run(&exec, "orders table", 3).await;

        assert_eq!(gateway.queries(), vec!["orders table"]);
        assert_eq!(result.contexts.len(), 3);
        assert!(result.contexts[0].score >= result.contexts[1].score);
        assert!(!result.degraded);
    }

    #[tokio::test]
    async fn test_failure_degrades() {
        let gateway = Arc::new(EchoGateway::new("KB1").failing_on("*"));
        let exec = executor(gateway, Arc::new(FixedGenerator::failing()));

        let result = run(&exec, "orders", 3).await;

        assert!(result.degraded);
        assert!(result.contexts[0].is_fallback());
        assert_eq!(result.usable_contexts().count(), 0);
    }
}
