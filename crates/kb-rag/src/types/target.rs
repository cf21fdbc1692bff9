//! Knowledge source descriptors, routing targets and query modes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Kind of knowledge a source holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Database,
    Support,
    Documentation,
}

impl SourceType {
    /// Tie-break order used by routing: database > support > documentation
    pub const PRIORITY: [SourceType; 3] = [
        SourceType::Database,
        SourceType::Support,
        SourceType::Documentation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Database => "database",
            SourceType::Support => "support",
            SourceType::Documentation => "documentation",
        }
    }

    /// Capitalized label used in merged answers
    pub fn title(&self) -> &'static str {
        match self {
            SourceType::Database => "Database",
            SourceType::Support => "Support",
            SourceType::Documentation => "Documentation",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "database" => Ok(SourceType::Database),
            "support" => Ok(SourceType::Support),
            "documentation" => Ok(SourceType::Documentation),
            other => Err(Error::Config(format!("Unknown source type: {}", other))),
        }
    }
}

/// Registry entry binding a source type to a knowledge source identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeSourceDescriptor {
    pub source_type: SourceType,
    pub source_id: String,
}

impl KnowledgeSourceDescriptor {
    pub fn new(source_type: SourceType, source_id: impl Into<String>) -> Self {
        Self {
            source_type,
            source_id: source_id.into(),
        }
    }

    /// Find the descriptor for a type, if one is configured
    pub fn find(descriptors: &[Self], source_type: SourceType) -> Option<&Self> {
        descriptors
            .iter()
            .find(|d| d.source_type == source_type && !d.source_id.trim().is_empty())
    }
}

/// A knowledge source the merger should consult
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTarget {
    pub source_type: SourceType,
    pub source_id: String,
    #[serde(default)]
    pub secondary: bool,
}

impl QueryTarget {
    pub fn primary(source_type: SourceType, source_id: impl Into<String>) -> Self {
        Self {
            source_type,
            source_id: source_id.into(),
            secondary: false,
        }
    }

    pub fn secondary(source_type: SourceType, source_id: impl Into<String>) -> Self {
        Self {
            source_type,
            source_id: source_id.into(),
            secondary: true,
        }
    }
}

impl From<&KnowledgeSourceDescriptor> for QueryTarget {
    fn from(descriptor: &KnowledgeSourceDescriptor) -> Self {
        QueryTarget::primary(descriptor.source_type, descriptor.source_id.clone())
    }
}

impl FromStr for QueryTarget {
    type Err = Error;

    /// Parse `type:source_id[:secondary]`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let source_type: SourceType = parts.next().unwrap_or_default().parse()?;
        let source_id = parts
            .next()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::Config(format!("Target '{}' is missing a source id", s)))?;
        let secondary = match parts.next() {
            None => false,
            Some("secondary") => true,
            Some("primary") => false,
            Some(other) => {
                return Err(Error::Config(format!("Unknown target flag: {}", other)));
            }
        };

        Ok(QueryTarget {
            source_type,
            source_id: source_id.to_string(),
            secondary,
        })
    }
}

/// Routing mode requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Keyword classification
    #[default]
    Smart,
    Database,
    Support,
    Documentation,
}

impl QueryMode {
    /// Source type forced by this mode, if any
    pub fn forced_type(&self) -> Option<SourceType> {
        match self {
            QueryMode::Smart => None,
            QueryMode::Database => Some(SourceType::Database),
            QueryMode::Support => Some(SourceType::Support),
            QueryMode::Documentation => Some(SourceType::Documentation),
        }
    }
}

impl FromStr for QueryMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "smart" => Ok(QueryMode::Smart),
            other => other.parse::<SourceType>().map(|t| match t {
                SourceType::Database => QueryMode::Database,
                SourceType::Support => QueryMode::Support,
                SourceType::Documentation => QueryMode::Documentation,
            }),
        }
    }
}
