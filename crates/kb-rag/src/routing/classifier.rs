//! Query classification for smart routing

use crate::types::SourceType;

/// Ranks knowledge source types for a query, best first
///
/// Implementations must return every `SourceType` exactly once.
pub trait QueryClassifier: Send + Sync {
    fn rank(&self, text: &str) -> Vec<SourceType>;

    /// Get classifier name for logging
    fn name(&self) -> &str;
}

const DATABASE_KEYWORDS: &[&str] = &[
    "table",
    "column",
    "database",
    "sql",
    "query",
    "schema",
    "index",
    "foreign key",
    "primary key",
    "relationship",
    "join",
];

const SUPPORT_KEYWORDS: &[&str] = &[
    "error",
    "issue",
    "problem",
    "troubleshoot",
    "fix",
    "bug",
    "help",
    "support",
    "ticket",
    "resolve",
];

const DOCUMENTATION_KEYWORDS: &[&str] = &[
    "how to",
    "guide",
    "tutorial",
    "documentation",
    "manual",
    "instruction",
    "feature",
    "functionality",
];

/// Substring keyword counting over the lowercased query
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    fn keywords(source_type: SourceType) -> &'static [&'static str] {
        match source_type {
            SourceType::Database => DATABASE_KEYWORDS,
            SourceType::Support => SUPPORT_KEYWORDS,
            SourceType::Documentation => DOCUMENTATION_KEYWORDS,
        }
    }

    /// Number of keywords of each type found in the text, in priority order
    pub fn scores(&self, text: &str) -> Vec<(SourceType, usize)> {
        let lower = text.to_lowercase();
        SourceType::PRIORITY
            .iter()
            .map(|&t| {
                let hits = Self::keywords(t).iter().filter(|k| lower.contains(*k)).count();
                (t, hits)
            })
            .collect()
    }
}

impl QueryClassifier for KeywordClassifier {
    fn rank(&self, text: &str) -> Vec<SourceType> {
        let mut scores = self.scores(text);
        // stable sort keeps priority order on ties
        scores.sort_by(|a, b| b.1.cmp(&a.1));
        scores.into_iter().map(|(t, _)| t).collect()
    }

    fn name(&self) -> &str {
        "keyword"
    }
}
