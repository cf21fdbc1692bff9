//! kb-rag: multi-strategy retrieval and routing over knowledge sources
//!
//! Routes a question to one or more knowledge sources (database schema,
//! support articles, product documentation), retrieves with several strategies
//! (standard, query expansion, hypothetical document, relationship analysis,
//! SQL optimization), merges per-source answers into one response, and feeds
//! user corrections back into the sources as ingestible documents.

pub mod config;
pub mod error;
pub mod generation;
pub mod learning;
pub mod providers;
pub mod retrieval;
pub mod routing;
pub mod service;
pub mod storage;
pub mod types;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use service::KnowledgeService;
pub use types::{
    context::{RetrievedContext, StrategyKind, StrategyResult},
    correction::{NewCorrection, ProcessingOutcome},
    response::{MergedComponent, QueryResponse, SubmissionResponse},
    target::{KnowledgeSourceDescriptor, QueryMode, QueryTarget, SourceType},
};
