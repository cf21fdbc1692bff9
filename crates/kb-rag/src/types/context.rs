//! Retrieved contexts and the uniform strategy result

use serde::{Deserialize, Serialize};
use std::fmt;

/// Retrieval algorithm that produced a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Standard,
    Expansion,
    Hyde,
    Relationship,
    Optimization,
    /// Composite of Standard + Expansion + HyDE
    MultiStrategy,
}

impl StrategyKind {
    /// Stable name used in cache keys and thinking traces
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Standard => "standard",
            StrategyKind::Expansion => "expansion",
            StrategyKind::Hyde => "hyde",
            StrategyKind::Relationship => "relationship",
            StrategyKind::Optimization => "optimization",
            StrategyKind::MultiStrategy => "multi_strategy",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A content chunk returned by a knowledge source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    /// Chunk text
    pub content: String,
    /// Provenance URI reported by the provider
    pub source_uri: String,
    /// Provider-defined relevance score (not normalized, not sorted)
    pub score: f32,
    /// Query text that retrieved this chunk
    pub from_query: String,
    /// Strategy that issued the query
    pub strategy: StrategyKind,
}

impl RetrievedContext {
    pub fn new(
        content: impl Into<String>,
        source_uri: impl Into<String>,
        score: f32,
        from_query: impl Into<String>,
        strategy: StrategyKind,
    ) -> Self {
        Self {
            content: content.into(),
            source_uri: source_uri.into(),
            score,
            from_query: from_query.into(),
            strategy,
        }
    }

    /// Explanatory context used when a knowledge source call fails
    pub fn fallback(source_id: &str, query: &str, reason: &str, strategy: StrategyKind) -> Self {
        Self {
            content: format!(
                "The knowledge source '{}' could not be reached for the query \"{}\": {}",
                source_id, query, reason
            ),
            source_uri: format!("fallback://{}", source_id),
            score: 0.0,
            from_query: query.to_string(),
            strategy,
        }
    }

    /// Whether this is an explanatory fallback rather than provider content
    pub fn is_fallback(&self) -> bool {
        self.source_uri.starts_with("fallback://")
    }
}

/// Uniform output of every strategy executor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyResult {
    /// Ranked, deduplicated contexts
    pub contexts: Vec<RetrievedContext>,
    /// Human-readable account of what the strategy did
    pub thinking: String,
    /// Answer synthesized by the strategy itself (relationship / optimization)
    pub derived_answer: Option<String>,
    /// True when any sub-call failed and was absorbed
    #[serde(default)]
    pub degraded: bool,
}

impl StrategyResult {
    pub fn new(contexts: Vec<RetrievedContext>, thinking: impl Into<String>) -> Self {
        Self {
            contexts,
            thinking: thinking.into(),
            derived_answer: None,
            degraded: false,
        }
    }

    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.derived_answer = Some(answer.into());
        self
    }

    pub fn degraded(mut self) -> Self {
        self.degraded = true;
        self
    }

    /// Contexts that came from a knowledge source (fallbacks excluded)
    pub fn usable_contexts(&self) -> impl Iterator<Item = &RetrievedContext> {
        self.contexts.iter().filter(|c| !c.is_fallback())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_context() {
        let ctx = RetrievedContext::fallback("kb-1", "list tables", "timeout", StrategyKind::Standard);
        assert!(ctx.is_fallback());
        assert_eq!(ctx.score, 0.0);
        assert!(ctx.content.contains("list tables"));

        let result = StrategyResult::new(vec![ctx], "").degraded();
        assert!(result.degraded);
        assert_eq!(result.usable_contexts().count(), 0);
    }
}
