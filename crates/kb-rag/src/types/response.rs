//! Response types handed to the boundary layer

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::context::RetrievedContext;
use super::target::{QueryTarget, SourceType};

/// Answer produced for one routed target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetAnswer {
    pub target: QueryTarget,
    pub answer: String,
    pub contexts: Vec<RetrievedContext>,
    pub thinking: String,
    /// True when the answer was built from fallback output
    pub degraded: bool,
}

/// Provenance of one part of a merged answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedComponent {
    pub source_type: SourceType,
    pub source_id: String,
    pub is_secondary: bool,
}

impl From<&QueryTarget> for MergedComponent {
    fn from(target: &QueryTarget) -> Self {
        Self {
            source_type: target.source_type,
            source_id: target.source_id.clone(),
            is_secondary: target.secondary,
        }
    }
}

/// Final response for `query` / `query_multi` / `relationships` / `optimize`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Request identifier for log correlation
    pub request_id: Uuid,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<RetrievedContext>>,
    /// Sources that contributed, base answer first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<MergedComponent>,
    /// Explanatory note shown when output is degraded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub processing_time_ms: u64,
}

impl QueryResponse {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            answer: answer.into(),
            thinking: None,
            contexts: None,
            components: Vec::new(),
            note: None,
            processing_time_ms: 0,
        }
    }

    /// Keep only the optional parts the caller asked for
    pub fn with_options(mut self, include_thinking: bool, include_contexts: bool) -> Self {
        if !include_thinking {
            self.thinking = None;
        }
        if !include_contexts {
            self.contexts = None;
        }
        self
    }
}

/// Response to a correction submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub status: String,
    pub correction_id: i64,
}
