//! Knowledge source gateway trait for retrieval and document ingestion

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::CorrectedDocument;

/// A chunk as returned by a knowledge source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Chunk text
    pub content: String,
    /// Provenance URI
    #[serde(default)]
    pub source_uri: String,
    /// Provider-defined score (higher is more relevant)
    #[serde(default)]
    pub score: f32,
}

/// Trait for an external managed retrieval store
///
/// Implementations:
/// - `HttpKnowledgeSource`: JSON retrieval service over HTTP
///
/// Failures must surface as `Error::TransientRetrieval`; provider-specific
/// errors are never passed through.
#[async_trait]
pub trait KnowledgeSourceGateway: Send + Sync {
    /// Retrieve up to `k` chunks for the query; order is not guaranteed
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>>;

    /// Submit documents for asynchronous ingestion, returning the job id
    async fn ingest_documents(&self, documents: &[CorrectedDocument]) -> Result<String>;

    /// Identifier of the knowledge source behind this gateway
    fn source_id(&self) -> &str;
}

/// Maps a knowledge source identifier to its gateway
pub trait GatewayResolver: Send + Sync {
    fn resolve(&self, source_id: &str) -> Result<Arc<dyn KnowledgeSourceGateway>>;
}

/// Resolver over a fixed set of gateways
#[derive(Default, Clone)]
pub struct StaticResolver {
    gateways: HashMap<String, Arc<dyn KnowledgeSourceGateway>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a gateway under its own source id
    pub fn with_gateway(mut self, gateway: Arc<dyn KnowledgeSourceGateway>) -> Self {
        self.gateways.insert(gateway.source_id().to_string(), gateway);
        self
    }

    pub fn insert(&mut self, gateway: Arc<dyn KnowledgeSourceGateway>) {
        self.gateways.insert(gateway.source_id().to_string(), gateway);
    }
}

impl GatewayResolver for StaticResolver {
    fn resolve(&self, source_id: &str) -> Result<Arc<dyn KnowledgeSourceGateway>> {
        self.gateways
            .get(source_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("knowledge source '{}'", source_id)))
    }
}
