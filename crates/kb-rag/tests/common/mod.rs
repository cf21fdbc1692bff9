//! In-memory knowledge sources and a prompt-scripted generator

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use kb_rag::config::{EngineConfig, KnowledgeSourceConfig};
use kb_rag::learning::CorrectionStore;
use kb_rag::providers::{AnswerGenerator, KnowledgeSourceGateway, RetrievedChunk, StaticResolver};
use kb_rag::storage::SqliteCorrectionStore;
use kb_rag::types::CorrectedDocument;
use kb_rag::{Error, KnowledgeService, KnowledgeSourceDescriptor, Result};

/// Knowledge source returning a fixed set of chunks for every query
pub struct MemorySource {
    id: String,
    chunks: Vec<String>,
    fail: bool,
    delay: Option<Duration>,
    pub queries: Mutex<Vec<String>>,
    pub ingested: Mutex<Vec<CorrectedDocument>>,
}

impl MemorySource {
    pub fn new(id: &str, chunks: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            fail: false,
            delay: None,
            queries: Mutex::new(Vec::new()),
            ingested: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(id: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(id, &[])
        }
    }

    pub fn slow(id: &str, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(id, &["slow content"])
        }
    }
}

#[async_trait]
impl KnowledgeSourceGateway for MemorySource {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        self.queries.lock().push(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(Error::retrieval(self.id.clone(), "connection refused"));
        }
        Ok(self
            .chunks
            .iter()
            .take(k)
            .enumerate()
            .map(|(i, content)| RetrievedChunk {
                content: content.clone(),
                source_uri: format!("mem://{}/{}", self.id, i),
                score: 1.0 - i as f32 * 0.1,
            })
            .collect())
    }

    async fn ingest_documents(&self, documents: &[CorrectedDocument]) -> Result<String> {
        self.ingested.lock().extend_from_slice(documents);
        Ok(format!("job-{}", self.id))
    }

    fn source_id(&self) -> &str {
        &self.id
    }
}

/// Generator that replies according to which prompt template it receives
///
/// Answer-synthesis prompts are matched against `(marker, reply)` rules on the
/// embedded documentation.
pub struct ScriptedGenerator {
    answers: Vec<(String, String)>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(answers: &[(&str, &str)]) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|(m, r)| (m.to_string(), r.to_string()))
                .collect(),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AnswerGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, _max_tokens: u32, _temperature: f32) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());

        if prompt.contains("semantically diverse variations") {
            return Ok("list every table\nenumerate schema tables".to_string());
        }
        if prompt.contains("hypothetical, ideal document") {
            return Ok("The schema contains the customers and orders tables.".to_string());
        }
        if prompt.contains("relationships for the") {
            return Ok("customers.id is referenced by orders.customer_id".to_string());
        }
        if prompt.contains("OPTIMIZED SQL:") {
            return Ok("SELECT id FROM orders WHERE status = 'open'; -- add index on status".to_string());
        }

        self.answers
            .iter()
            .find(|(marker, _)| prompt.contains(marker.as_str()))
            .map(|(_, reply)| reply.clone())
            .ok_or_else(|| Error::generation("no scripted reply"))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub struct Harness {
    pub service: KnowledgeService,
    pub generator: Arc<ScriptedGenerator>,
    pub store: Arc<SqliteCorrectionStore>,
}

pub fn harness(
    sources: Vec<Arc<MemorySource>>,
    descriptors: Vec<KnowledgeSourceDescriptor>,
    generator: ScriptedGenerator,
) -> Harness {
    let mut resolver = StaticResolver::new();
    for source in sources {
        resolver.insert(source);
    }

    let config = EngineConfig {
        knowledge_sources: KnowledgeSourceConfig {
            descriptors,
            ..Default::default()
        },
        ..Default::default()
    };

    let generator = Arc::new(generator);
    let store = Arc::new(SqliteCorrectionStore::in_memory().unwrap());
    let service = KnowledgeService::new(
        &config,
        Arc::new(resolver),
        generator.clone(),
        store.clone() as Arc<dyn CorrectionStore>,
    )
    .unwrap();

    Harness {
        service,
        generator,
        store,
    }
}
