//! SQL optimization: probe schema knowledge for every referenced table

use regex::Regex;
use std::sync::LazyLock;

use crate::generation::PromptBuilder;
use crate::types::{RetrievedContext, StrategyKind, StrategyResult};

use super::Executor;

/// Contexts kept for the optimization prompt
pub const CONTEXT_LIMIT: usize = 10;
const TABLE_PROBE_K: usize = 3;
const PATTERN_PROBE_K: usize = 5;

static TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:FROM|JOIN)\s+(\w+)").expect("Invalid regex"));

/// Table names following FROM/JOIN, deduplicated case-insensitively in order
pub fn extract_tables(sql: &str) -> Vec<String> {
    let mut tables: Vec<String> = Vec::new();
    for caps in TABLE_RE.captures_iter(sql) {
        let name = &caps[1];
        if !tables.iter().any(|t| t.eq_ignore_ascii_case(name)) {
            tables.push(name.to_string());
        }
    }
    tables
}

/// Schema probes per table plus one optimization-pattern probe
pub fn probes(sql: &str, tables: &[String]) -> Vec<(String, usize)> {
    let mut probes: Vec<(String, usize)> = tables
        .iter()
        .flat_map(|t| {
            [
                format!("{} schema columns indexes", t),
                format!("{} table structure", t),
                format!("{} primary key and indexes", t),
            ]
        })
        .map(|q| (q, TABLE_PROBE_K))
        .collect();

    let head: String = sql.chars().take(100).collect();
    probes.push((format!("SQL query optimization for: {}...", head), PATTERN_PROBE_K));
    probes
}

pub async fn run(exec: &Executor, sql: &str) -> StrategyResult {
    let tables = extract_tables(sql);
    let probes = probes(sql, &tables);

    let gathered = exec.gather(&probes, StrategyKind::Optimization).await;
    let mut degraded = gathered.is_degraded();
    let contexts = gathered.finish(exec.source_id(), sql, CONTEXT_LIMIT, StrategyKind::Optimization);

    let config = exec.config();
    let schema: Vec<RetrievedContext> =
        contexts.iter().filter(|c| !c.is_fallback()).cloned().collect();
    let prompt = PromptBuilder::sql_optimization(sql, &schema);
    let optimized = match exec
        .generate(&prompt, config.optimization_max_tokens, config.generation_temperature)
        .await
    {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("SQL optimization generation failed: {}", e);
            degraded = true;
            PromptBuilder::optimization_fallback(&e.to_string())
        }
    };

    let thinking = format!(
        "Identified tables: {}\nRan {} schema probes and kept {} contexts.",
        if tables.is_empty() {
            "none".to_string()
        } else {
            tables.join(", ")
        },
        probes.len(),
        contexts.len()
    );

    let result = StrategyResult::new(contexts, thinking).with_answer(optimized);
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

    #[test]
    fn test_extract_tables() {
        let sql = "SELECT * FROM orders o JOIN Customers c ON o.cid = c.id \
                   left join ORDERS x on 1=1 inner join payments p on p.oid = o.id";
        assert_eq!(extract_tables(sql), vec!["orders", "Customers", "payments"]);
        assert!(extract_tables("SELECT 1").is_empty());
    }

    #[test]
    fn test_probe_layout() {
        let tables = vec!["orders".to_string(), "customers".to_string()];
        let p = probes("SELECT * FROM orders", &tables);

        assert_eq!(p.len(), 7);
        assert_eq!(p[0], ("orders schema columns indexes".to_string(), 3));
        assert_eq!(p[4], ("customers table structure".to_string(), 3));
        assert_eq!(p[6], ("SQL query optimization for: SELECT * FROM orders...".to_string(), 5));
    }

    #[test]
    fn test_pattern_probe_truncates_sql() {
        let sql = format!("SELECT {} FROM t", "x".repeat(200));
        let p = probes(&sql, &[]);
        assert_eq!(p.len(), 1);
        assert_eq!(p[0].0.chars().count(), "SQL query optimization for: ".len() + 100 + 3);
    }

    #[tokio::test]
    async fn test_run_caps_contexts() {
        let generator = Arc::new(FixedGenerator::replying("SELECT id FROM orders;"));
        let exec = executor(Arc::new(EchoGateway::new("KB1")), generator.clone());

        let result = run(&exec, "SELECT * FROM orders JOIN customers ON 1=1").await;

        assert_eq!(result.contexts.len(), CONTEXT_LIMIT);
        assert_eq!(result.derived_answer.as_deref(), Some("SELECT id FROM orders;"));
        assert_eq!(generator.prompts.lock()[0].1, 3000);
    }

    #[tokio::test]
    async fn test_unreachable_source_kept_out_of_prompt() {
        let generator = Arc::new(FixedGenerator::replying("SELECT id FROM orders;"));
        let exec = executor(Arc::new(EchoGateway::new("KB1").failing_on("*")), generator.clone());

        let result = run(&exec, "SELECT * FROM orders").await;

        assert!(result.degraded);
        assert_eq!(result.contexts.len(), 1);
        assert!(result.contexts[0].is_fallback());
        assert!(!generator.prompts.lock()[0].0.contains("could not be reached"));
    }
}
