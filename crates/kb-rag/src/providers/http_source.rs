//! HTTP-backed knowledge source gateway
//!
//! Talks to a retrieval service that fronts the managed vector indexes:
//! - `POST {base}/sources/{id}/retrieve` with `{query, k}`
//! - `POST {base}/sources/{id}/ingest` with `{documents}`

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::KnowledgeSourceConfig;
use crate::error::{Error, Result};
use crate::types::CorrectedDocument;

use super::knowledge_source::{GatewayResolver, KnowledgeSourceGateway, RetrievedChunk};

#[derive(Serialize)]
struct RetrieveRequest<'a> {
    query: &'a str,
    k: usize,
}

#[derive(Deserialize)]
struct RetrieveResponse {
    #[serde(default)]
    results: Vec<RetrievedChunk>,
}

#[derive(Serialize)]
struct IngestDocument {
    text: String,
    query_pattern: String,
    category: String,
    created_at: String,
}

#[derive(Serialize)]
struct IngestRequest {
    documents: Vec<IngestDocument>,
}

#[derive(Deserialize)]
struct IngestResponse {
    job_id: String,
}

/// Gateway for a single knowledge source behind the retrieval service
pub struct HttpKnowledgeSource {
    client: Client,
    base_url: String,
    source_id: String,
}

impl HttpKnowledgeSource {
    pub fn new(client: Client, base_url: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            source_id: source_id.into(),
        }
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/sources/{}/{}",
            self.base_url,
            urlencoding::encode(&self.source_id),
            action
        )
    }

    fn transient(&self, message: impl Into<String>) -> Error {
        Error::retrieval(self.source_id.clone(), message)
    }
}

#[async_trait]
impl KnowledgeSourceGateway for HttpKnowledgeSource {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let response = self
            .client
            .post(self.endpoint("retrieve"))
            .json(&RetrieveRequest { query, k })
            .send()
            .await
            .map_err(|e| self.transient(format!("retrieve request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(self.transient(format!("retrieve failed: HTTP {}", response.status())));
        }

        let body: RetrieveResponse = response
            .json()
            .await
            .map_err(|e| self.transient(format!("invalid retrieve response: {}", e)))?;

        tracing::debug!(
            "Retrieved {} chunks from '{}' (k={})",
            body.results.len(),
            self.source_id,
            k
        );
        Ok(body.results)
    }

    async fn ingest_documents(&self, documents: &[CorrectedDocument]) -> Result<String> {
        let request = IngestRequest {
            documents: documents
                .iter()
                .map(|doc| IngestDocument {
                    text: doc.to_text(),
                    query_pattern: doc.query_pattern.clone(),
                    category: doc.category.clone(),
                    created_at: doc.created_at.to_rfc3339(),
                })
                .collect(),
        };

        let response = self
            .client
            .post(self.endpoint("ingest"))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transient(format!("ingest request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(self.transient(format!("ingest failed: HTTP {}", response.status())));
        }

        let body: IngestResponse = response
            .json()
            .await
            .map_err(|e| self.transient(format!("invalid ingest response: {}", e)))?;

        tracing::info!(
            "Submitted {} documents to '{}' (job {})",
            documents.len(),
            self.source_id,
            body.job_id
        );
        Ok(body.job_id)
    }

    fn source_id(&self) -> &str {
        &self.source_id
    }
}

/// Resolver creating one HTTP gateway per source id, sharing a client
pub struct HttpSourceResolver {
    client: Client,
    base_url: String,
    gateways: DashMap<String, Arc<HttpKnowledgeSource>>,
}

impl HttpSourceResolver {
    pub fn new(config: &KnowledgeSourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            gateways: DashMap::new(),
        })
    }
}

impl GatewayResolver for HttpSourceResolver {
    fn resolve(&self, source_id: &str) -> Result<Arc<dyn KnowledgeSourceGateway>> {
        if source_id.trim().is_empty() {
            return Err(Error::NotFound("empty knowledge source id".to_string()));
        }

        let gateway = self
            .gateways
            .entry(source_id.to_string())
            .or_insert_with(|| {
                Arc::new(HttpKnowledgeSource::new(
                    self.client.clone(),
                    self.base_url.clone(),
                    source_id,
                ))
            })
            .clone();

        Ok(gateway)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_source_id() {
        let source = HttpKnowledgeSource::new(Client::new(), "http://kb.local/", "KB 1");
        assert_eq!(source.endpoint("retrieve"), "http://kb.local/sources/KB%201/retrieve");
    }

    #[test]
    fn test_resolver_reuses_gateways() {
        let resolver = HttpSourceResolver::new(&KnowledgeSourceConfig::default()).unwrap();
        let a = resolver.resolve("KB-DB").unwrap();
        let b = resolver.resolve("KB-DB").unwrap();
        assert_eq!(a.source_id(), b.source_id());
        assert_eq!(resolver.gateways.len(), 1);
        assert!(resolver.resolve("").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_source_is_transient() {
        let source = HttpKnowledgeSource::new(Client::new(), "http://127.0.0.1:9", "KB-DB");
        let err = source.retrieve("tables", 3).await.unwrap_err();
        assert!(err.is_recoverable());
    }
}
