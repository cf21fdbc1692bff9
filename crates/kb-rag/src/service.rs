//! Knowledge service facade
//!
//! Wires routing, merging, retrieval and the correction loop together and
//! exposes the operations the boundary layer calls.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::learning::{CorrectionLoop, CorrectionStore};
use crate::providers::{AnswerGenerator, GatewayResolver, HttpSourceResolver, OllamaGenerator};
use crate::retrieval::strategies::relationship;
use crate::retrieval::{CacheStats, RetrievalEngine, StrategyCache};
use crate::routing::{Merger, Router};
use crate::storage::SqliteCorrectionStore;
use crate::types::{
    KnowledgeSourceDescriptor, MergedComponent, NewCorrection, ProcessingOutcome, QueryMode,
    QueryResponse, QueryTarget, SourceType, StrategyResult, SubmissionResponse,
};

const DEGRADED_NOTE: &str =
    "Some knowledge sources or the answer generator were unavailable; this answer may be incomplete.";

/// Entry point for queries and corrections
pub struct KnowledgeService {
    engine: Arc<RetrievalEngine>,
    router: Router,
    merger: Merger,
    corrections: CorrectionLoop,
    descriptors: Vec<KnowledgeSourceDescriptor>,
    default_k: usize,
}

impl KnowledgeService {
    pub fn new(
        config: &EngineConfig,
        resolver: Arc<dyn GatewayResolver>,
        generator: Arc<dyn AnswerGenerator>,
        store: Arc<dyn CorrectionStore>,
    ) -> Result<Self> {
        let cache = Arc::new(StrategyCache::new(&config.cache)?);
        let engine = Arc::new(RetrievalEngine::new(
            resolver.clone(),
            generator,
            cache,
            config.retrieval.clone(),
        ));

        Ok(Self {
            merger: Merger::new(engine.clone()),
            engine,
            router: Router::default(),
            corrections: CorrectionLoop::new(store, resolver),
            descriptors: config.knowledge_sources.descriptors.clone(),
            default_k: config.retrieval.default_k,
        })
    }

    /// Build the service with the HTTP knowledge source, Ollama and SQLite backends
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let resolver = Arc::new(HttpSourceResolver::new(&config.knowledge_sources)?);
        let generator = Arc::new(OllamaGenerator::new(&config.generator)?);
        let store = Arc::new(SqliteCorrectionStore::new(&config.corrections.database_path)?);

        tracing::info!(
            "Knowledge service ready: {} default sources, generator {}",
            config.knowledge_sources.descriptors.len(),
            config.generator.model
        );
        Self::new(config, resolver, generator, store)
    }

    /// Replace the routing classifier
    pub fn with_router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    pub fn descriptors(&self) -> &[KnowledgeSourceDescriptor] {
        &self.descriptors
    }

    /// Route over the configured sources and answer
    pub async fn query(&self, text: &str, mode: QueryMode) -> Result<QueryResponse> {
        self.run(text, None, mode, &self.descriptors, &CancellationToken::new())
            .await
    }

    /// Answer across explicit targets, or route over `descriptors` when none are given
    pub async fn query_multi(
        &self,
        text: &str,
        explicit_targets: Option<&[QueryTarget]>,
        descriptors: &[KnowledgeSourceDescriptor],
    ) -> Result<QueryResponse> {
        self.run(text, explicit_targets, QueryMode::Smart, descriptors, &CancellationToken::new())
            .await
    }

    /// `query_multi` that stops as soon as `cancel` fires
    pub async fn query_multi_cancellable(
        &self,
        text: &str,
        explicit_targets: Option<&[QueryTarget]>,
        descriptors: &[KnowledgeSourceDescriptor],
        cancel: &CancellationToken,
    ) -> Result<QueryResponse> {
        self.run(text, explicit_targets, QueryMode::Smart, descriptors, cancel)
            .await
    }

    async fn run(
        &self,
        text: &str,
        explicit_targets: Option<&[QueryTarget]>,
        mode: QueryMode,
        descriptors: &[KnowledgeSourceDescriptor],
        cancel: &CancellationToken,
    ) -> Result<QueryResponse> {
        let started = Instant::now();
        let targets = self.router.route(text, explicit_targets, mode, descriptors)?;
        let merged = self
            .merger
            .merge(text, &targets, self.default_k, cancel)
            .await?;

        let mut response = QueryResponse::new(merged.answer);
        response.thinking = Some(merged.thinking);
        response.contexts = Some(merged.contexts);
        response.components = merged.components;
        if merged.degraded {
            response.note = Some(DEGRADED_NOTE.to_string());
        }
        response.processing_time_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            "Query {} answered from {} sources in {}ms",
            response.request_id,
            response.components.len(),
            response.processing_time_ms
        );
        Ok(response)
    }

    fn database_source(&self) -> Result<&KnowledgeSourceDescriptor> {
        KnowledgeSourceDescriptor::find(&self.descriptors, SourceType::Database).ok_or_else(|| {
            Error::NoTargetsAvailable("no database knowledge source configured".to_string())
        })
    }

    fn strategy_response(
        source: &KnowledgeSourceDescriptor,
        result: &StrategyResult,
        started: Instant,
    ) -> QueryResponse {
        let mut response = QueryResponse::new(result.derived_answer.clone().unwrap_or_default());
        response.thinking = Some(result.thinking.clone());
        response.contexts = Some(result.contexts.clone());
        response.components = vec![MergedComponent::from(&QueryTarget::from(source))];
        if result.degraded {
            response.note = Some(DEGRADED_NOTE.to_string());
        }
        response.processing_time_ms = started.elapsed().as_millis() as u64;
        response
    }

    /// Relationship analysis for a table against the database source
    pub async fn relationships(&self, table: &str) -> Result<QueryResponse> {
        let started = Instant::now();
        let source = self.database_source()?;
        let result = self
            .engine
            .relationship(&source.source_id, table, relationship::DEFAULT_K)
            .await?;
        Ok(Self::strategy_response(source, &result, started))
    }

    /// SQL optimization advice against the database source
    pub async fn optimize(&self, sql: &str) -> Result<QueryResponse> {
        let started = Instant::now();
        let source = self.database_source()?;
        let result = self.engine.optimization(&source.source_id, sql).await?;
        Ok(Self::strategy_response(source, &result, started))
    }

    pub fn submit_correction(&self, correction: &NewCorrection) -> Result<SubmissionResponse> {
        let correction_id = self.corrections.submit(correction)?;
        Ok(SubmissionResponse {
            status: "success".to_string(),
            correction_id,
        })
    }

    pub async fn process_corrections(&self, source_id: &str, company_id: i64) -> Result<ProcessingOutcome> {
        self.corrections.process_pending(source_id, company_id).await
    }

    pub fn reject_correction(&self, id: i64) -> Result<()> {
        self.corrections.reject(id)
    }

    pub fn pending_corrections(&self, source_id: &str, company_id: i64) -> Result<usize> {
        self.corrections.pending_count(source_id, company_id)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.engine.cache().stats()
    }

    pub fn purge_cache(&self) -> usize {
        self.engine.cache().purge_expired()
    }
}
