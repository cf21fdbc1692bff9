//! Strategy executors
//!
//! Every executor returns a `StrategyResult`. Knowledge source and generator
//! failures are absorbed here: a failed retrieval becomes an explanatory
//! fallback context, a failed generation becomes templated text, and either
//! marks the result as degraded.

pub mod expansion;
pub mod hyde;
pub mod optimization;
pub mod relationship;
pub mod standard;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::config::RetrievalConfig;
use crate::error::{Error, Result};
use crate::providers::{AnswerGenerator, KnowledgeSourceGateway};
use crate::types::{RetrievedContext, StrategyKind};

use super::aggregator::aggregate;

/// Outcome of a batch of sub-queries
#[derive(Debug, Default)]
pub struct Gathered {
    pub contexts: Vec<RetrievedContext>,
    /// Error message for each failed sub-query
    pub failures: Vec<String>,
}

impl Gathered {
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Aggregate to `k`, substituting a fallback context when nothing came back
    pub fn finish(self, source_id: &str, query: &str, k: usize, strategy: StrategyKind) -> Vec<RetrievedContext> {
        if self.contexts.is_empty() {
            if let Some(reason) = self.failures.first() {
                return vec![RetrievedContext::fallback(source_id, query, reason, strategy)];
            }
        }
        aggregate(self.contexts, k)
    }
}

/// Shared handles for one strategy run against one knowledge source
#[derive(Clone)]
pub struct Executor {
    gateway: Arc<dyn KnowledgeSourceGateway>,
    generator: Arc<dyn AnswerGenerator>,
    config: RetrievalConfig,
}

impl Executor {
    pub fn new(
        gateway: Arc<dyn KnowledgeSourceGateway>,
        generator: Arc<dyn AnswerGenerator>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            gateway,
            generator,
            config,
        }
    }

    pub fn source_id(&self) -> &str {
        self.gateway.source_id()
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// One bounded knowledge source call
    pub async fn retrieve(&self, query: &str, k: usize, strategy: StrategyKind) -> Result<Vec<RetrievedContext>> {
        let source_id = self.source_id();
        let chunks = timeout(self.config.call_timeout(), self.gateway.retrieve(query, k))
            .await
            .map_err(|_| Error::retrieval(source_id, format!("timed out after {:?}", self.config.call_timeout())))??;

        Ok(chunks
            .into_iter()
            .map(|chunk| RetrievedContext::new(chunk.content, chunk.source_uri, chunk.score, query, strategy))
            .collect())
    }

    /// Run sub-queries concurrently, collecting contexts and failures
    pub async fn gather(&self, probes: &[(String, usize)], strategy: StrategyKind) -> Gathered {
        let calls = probes
            .iter()
            .map(|(query, k)| self.retrieve(query, *k, strategy));
        let outcomes = futures_util::future::join_all(calls).await;

        let mut gathered = Gathered::default();
        for ((query, _), outcome) in probes.iter().zip(outcomes) {
            match outcome {
                Ok(mut contexts) => gathered.contexts.append(&mut contexts),
                Err(e) => {
                    tracing::warn!("{} sub-query '{}' failed: {}", strategy, query, e);
                    gathered.failures.push(e.to_string());
                }
            }
        }
        gathered
    }

    pub async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String> {
        generate_bounded(
            self.generator.as_ref(),
            self.config.call_timeout(),
            prompt,
            max_tokens,
            temperature,
        )
        .await
    }
}

/// One generator call bounded by `limit`; blank output counts as a failure
pub async fn generate_bounded(
    generator: &dyn AnswerGenerator,
    limit: Duration,
    prompt: &str,
    max_tokens: u32,
    temperature: f32,
) -> Result<String> {
    let text = timeout(limit, generator.generate(prompt, max_tokens, temperature))
        .await
        .map_err(|_| Error::generation(format!("timed out after {:?}", limit)))??;

    if text.trim().is_empty() {
        return Err(Error::generation("empty response"));
    }
    Ok(text)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted gateway and generator shared by the strategy tests

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    use crate::config::RetrievalConfig;
    use crate::error::{Error, Result};
    use crate::providers::{AnswerGenerator, KnowledgeSourceGateway, RetrievedChunk};
    use crate::types::CorrectedDocument;

    use super::Executor;

    /// Gateway answering each query with a chunk derived from the query text
    pub struct EchoGateway {
        pub id: String,
        pub fail_on: Vec<String>,
        pub calls: Mutex<Vec<(String, usize)>>,
    }

    impl EchoGateway {
        pub fn new(id: &str) -> Self {
            Self {
                id: id.to_string(),
                fail_on: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing_on(mut self, query: &str) -> Self {
            self.fail_on.push(query.to_string());
            self
        }

        pub fn queries(&self) -> Vec<String> {
            self.calls.lock().iter().map(|(q, _)| q.clone()).collect()
        }
    }

    #[async_trait]
    impl KnowledgeSourceGateway for EchoGateway {
        async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
            self.calls.lock().push((query.to_string(), k));
            if self.fail_on.iter().any(|q| q == query || q == "*") {
                return Err(Error::retrieval(&self.id, "unavailable"));
            }
            Ok((0..k)
                .map(|i| RetrievedChunk {
                    content: format!("{} #{}", query, i),
                    source_uri: format!("s3://{}/{}", self.id, i),
                    score: 1.0 - i as f32 * 0.1,
                })
                .collect())
        }

        async fn ingest_documents(&self, _documents: &[CorrectedDocument]) -> Result<String> {
            Ok("job-1".to_string())
        }

        fn source_id(&self) -> &str {
            &self.id
        }
    }

    /// Generator returning a fixed reply, or failing when `None`
    pub struct FixedGenerator {
        pub reply: Option<String>,
        pub prompts: Mutex<Vec<(String, u32, f32)>>,
    }

    impl FixedGenerator {
        pub fn replying(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            Self {
                reply: None,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AnswerGenerator for FixedGenerator {
        async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String> {
            self.prompts.lock().push((prompt.to_string(), max_tokens, temperature));
            self.reply
                .clone()
                .ok_or_else(|| Error::generation("model unavailable"))
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    pub fn executor(gateway: Arc<EchoGateway>, generator: Arc<FixedGenerator>) -> Executor {
        Executor::new(gateway, generator, RetrievalConfig::default())
    }
}
