//! Retrieval engine: cached strategy execution per knowledge source

use std::future::Future;
use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::generation::PromptBuilder;
use crate::providers::{AnswerGenerator, GatewayResolver};
use crate::types::{RetrievedContext, StrategyKind, StrategyResult};

use super::aggregator::{aggregate, sql_fingerprint};
use super::cache::{cache_key, StrategyCache};
use super::strategies::{self, generate_bounded, Executor};

/// Synthesized answer for one knowledge source
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub answer: String,
    /// True when the generator failed and templated text was used
    pub degraded: bool,
}

/// Runs strategies against resolved knowledge sources through a shared cache
pub struct RetrievalEngine {
    resolver: Arc<dyn GatewayResolver>,
    generator: Arc<dyn AnswerGenerator>,
    cache: Arc<StrategyCache>,
    config: RetrievalConfig,
}

impl RetrievalEngine {
    pub fn new(
        resolver: Arc<dyn GatewayResolver>,
        generator: Arc<dyn AnswerGenerator>,
        cache: Arc<StrategyCache>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            resolver,
            generator,
            cache,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<StrategyCache> {
        &self.cache
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    fn executor(&self, source_id: &str) -> Result<Executor> {
        let gateway = self.resolver.resolve(source_id)?;
        Ok(Executor::new(gateway, self.generator.clone(), self.config.clone()))
    }

    async fn cached<F, Fut>(
        &self,
        source_id: &str,
        text: &str,
        k: usize,
        kind: StrategyKind,
        extra: &[(&str, &str)],
        run: F,
    ) -> Result<Arc<StrategyResult>>
    where
        F: FnOnce(Executor) -> Fut,
        Fut: Future<Output = StrategyResult>,
    {
        let exec = self.executor(source_id)?;
        let mut params = vec![("source", source_id)];
        params.extend_from_slice(extra);
        let key = cache_key(text, k, kind, &params);
        self.cache
            .get_or_compute(key, || async move { Ok(run(exec).await) })
            .await
    }

    pub async fn standard(&self, source_id: &str, query: &str, k: usize) -> Result<Arc<StrategyResult>> {
        self.cached(source_id, query, k, StrategyKind::Standard, &[], |exec| async move {
            strategies::standard::run(&exec, query, k).await
        })
        .await
    }

    pub async fn expansion(&self, source_id: &str, query: &str, k: usize) -> Result<Arc<StrategyResult>> {
        self.cached(source_id, query, k, StrategyKind::Expansion, &[], |exec| async move {
            strategies::expansion::run(&exec, query, k).await
        })
        .await
    }

    pub async fn hyde(&self, source_id: &str, query: &str, k: usize) -> Result<Arc<StrategyResult>> {
        self.cached(source_id, query, k, StrategyKind::Hyde, &[], |exec| async move {
            strategies::hyde::run(&exec, query, k).await
        })
        .await
    }

    pub async fn relationship(&self, source_id: &str, table: &str, k: usize) -> Result<Arc<StrategyResult>> {
        self.cached(source_id, table, k, StrategyKind::Relationship, &[], |exec| async move {
            strategies::relationship::run(&exec, table, k).await
        })
        .await
    }

    pub async fn optimization(&self, source_id: &str, sql: &str) -> Result<Arc<StrategyResult>> {
        let k = strategies::optimization::CONTEXT_LIMIT;
        // query normalization lowercases, which would merge statements differing in literals
        let statement = sql_fingerprint(sql);
        self.cached(source_id, sql, k, StrategyKind::Optimization, &[("sql", &statement)], |exec| async move {
            strategies::optimization::run(&exec, sql).await
        })
        .await
    }

    /// Standard, Expansion and HyDE concurrently, each with `max(2, k/3)`,
    /// aggregated to `k`
    pub async fn multi_strategy(&self, source_id: &str, query: &str, k: usize) -> Result<Arc<StrategyResult>> {
        let key = cache_key(query, k, StrategyKind::MultiStrategy, &[("source", source_id)]);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let per_strategy = (k / 3).max(2);
        let (standard, expansion, hyde) = tokio::try_join!(
            self.standard(source_id, query, per_strategy),
            self.expansion(source_id, query, per_strategy),
            self.hyde(source_id, query, per_strategy),
        )?;

        let parts = [&standard, &expansion, &hyde];
        let degraded = parts.iter().any(|r| r.degraded);
        let union: Vec<RetrievedContext> = parts
            .iter()
            .flat_map(|r| r.usable_contexts().cloned())
            .collect();

        let contexts = if union.is_empty() {
            // keep one explanatory fallback so callers can see why nothing came back
            parts
                .iter()
                .flat_map(|r| r.contexts.iter())
                .take(1)
                .cloned()
                .collect()
        } else {
            aggregate(union, k)
        };

        let thinking = format!(
            "Multi-strategy retrieval ({} per strategy, top {}):\n\n## Standard\n{}\n\n## Expansion\n{}\n\n## HyDE\n{}\n\nCombined into {} unique contexts.",
            per_strategy,
            k,
            standard.thinking,
            expansion.thinking,
            hyde.thinking,
            contexts.len()
        );

        let mut result = StrategyResult::new(contexts, thinking);
        result.degraded = degraded;
        tracing::info!(
            "Multi-strategy retrieval on '{}' returned {} contexts{}",
            source_id,
            result.contexts.len(),
            if degraded { " (degraded)" } else { "" }
        );
        Ok(self.cache.put(key, result))
    }

    /// Synthesize an answer from merged contexts
    pub async fn synthesize(&self, query: &str, contexts: &[RetrievedContext], source_title: &str) -> Synthesis {
        let usable: Vec<RetrievedContext> = contexts.iter().filter(|c| !c.is_fallback()).cloned().collect();
        if usable.is_empty() {
            return Synthesis {
                answer: PromptBuilder::no_context_answer(query, source_title),
                degraded: false,
            };
        }

        let prompt = PromptBuilder::answer(query, &usable);
        match generate_bounded(
            self.generator.as_ref(),
            self.config.call_timeout(),
            &prompt,
            self.config.generation_max_tokens,
            self.config.generation_temperature,
        )
        .await
        {
            Ok(answer) => Synthesis {
                answer,
                degraded: false,
            },
            Err(e) => {
                tracing::warn!("Answer synthesis with {} failed: {}", self.generator.name(), e);
                Synthesis {
                    answer: PromptBuilder::fallback_answer(query, &usable),
                    degraded: true,
                }
            }
        }
    }
}
