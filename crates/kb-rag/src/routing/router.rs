//! Target resolution from explicit lists, forced modes or classification

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{KnowledgeSourceDescriptor, QueryMode, QueryTarget, SourceType};

use super::classifier::{KeywordClassifier, QueryClassifier};

/// Resolves which knowledge sources a query should consult
#[derive(Clone)]
pub struct Router {
    classifier: Arc<dyn QueryClassifier>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new(Arc::new(KeywordClassifier))
    }
}

impl Router {
    pub fn new(classifier: Arc<dyn QueryClassifier>) -> Self {
        Self { classifier }
    }

    /// Produce a non-empty target list
    ///
    /// An explicit non-empty list is returned verbatim. Otherwise a single
    /// primary target is chosen from `descriptors`, falling back to the
    /// database source and then to any configured source. Fails with
    /// `NoTargetsAvailable` only when nothing is configured at all.
    pub fn route(
        &self,
        text: &str,
        explicit: Option<&[QueryTarget]>,
        mode: QueryMode,
        descriptors: &[KnowledgeSourceDescriptor],
    ) -> Result<Vec<QueryTarget>> {
        if let Some(targets) = explicit.filter(|t| !t.is_empty()) {
            tracing::debug!("Using {} explicit targets", targets.len());
            return Ok(targets.to_vec());
        }

        let preferred: Vec<SourceType> = match mode.forced_type() {
            Some(forced) => vec![forced],
            None => self.classifier.rank(text),
        };

        let chosen = preferred
            .iter()
            .find_map(|&t| KnowledgeSourceDescriptor::find(descriptors, t))
            .or_else(|| KnowledgeSourceDescriptor::find(descriptors, SourceType::Database))
            .or_else(|| descriptors.iter().find(|d| !d.source_id.trim().is_empty()))
            .ok_or_else(|| {
                Error::NoTargetsAvailable(format!(
                    "no knowledge source configured among {} descriptors",
                    descriptors.len()
                ))
            })?;

        tracing::info!(
            "Routed query to {} source '{}' (mode {:?}, classifier {})",
            chosen.source_type,
            chosen.source_id,
            mode,
            self.classifier.name()
        );
        Ok(vec![QueryTarget::from(chosen)])
    }
}
