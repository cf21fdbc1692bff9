//! Provider abstractions for knowledge sources and answer generation
//!
//! The engine only reaches external systems through these traits, so the
//! HTTP/Ollama backends can be swapped for other providers or test doubles.

pub mod generator;
pub mod http_source;
pub mod knowledge_source;
pub mod ollama;

pub use generator::AnswerGenerator;
pub use http_source::{HttpKnowledgeSource, HttpSourceResolver};
pub use knowledge_source::{GatewayResolver, KnowledgeSourceGateway, RetrievedChunk, StaticResolver};
pub use ollama::OllamaGenerator;
