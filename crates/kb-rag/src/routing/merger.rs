//! Multi-source fan-out and primary/secondary answer merging

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::retrieval::RetrievalEngine;
use crate::types::{MergedComponent, QueryTarget, RetrievedContext, TargetAnswer};

const RELATED_HEADER: &str = "\n\n**Related Information:**\n";

/// Excerpts shorter than this never end at a sentence boundary
const MIN_SENTENCE_CUT: usize = 100;

/// Merged answer across all answered targets
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub answer: String,
    pub thinking: String,
    pub contexts: Vec<RetrievedContext>,
    /// Base component first, then every appended secondary
    pub components: Vec<MergedComponent>,
    pub degraded: bool,
}

/// Bounded excerpt of `text`
///
/// Text within `max_chars` is returned whole. Longer text is cut at the last
/// sentence end inside the window when one exists past `MIN_SENTENCE_CUT`,
/// otherwise at exactly `max_chars` characters, and gets a trailing "...".
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let window: Vec<char> = text.chars().take(max_chars).collect();
    let sentence_end = (MIN_SENTENCE_CUT.min(max_chars)..window.len())
        .rev()
        .find(|&i| {
            matches!(window[i], '.' | '!' | '?')
                && window.get(i + 1).map_or(true, |c| c.is_whitespace())
        });

    let cut = match sentence_end {
        Some(i) => i + 1,
        None => window.len(),
    };
    let mut out: String = window[..cut].iter().collect();
    out.push_str("...");
    out
}

/// Combine per-target answers into one response
///
/// The base is the first primary answer, or the first answer when every
/// target is secondary. Each other secondary contributes a labeled excerpt.
pub fn merge_answers(results: Vec<TargetAnswer>, excerpt_chars: usize) -> Option<MergeOutcome> {
    let base_idx = results.iter().position(|r| !r.target.secondary).unwrap_or(0);
    let degraded = results.iter().any(|r| r.degraded);

    let mut secondaries = Vec::new();
    let mut base = None;
    for (idx, result) in results.into_iter().enumerate() {
        if idx == base_idx {
            base = Some(result);
        } else if result.target.secondary {
            secondaries.push(result);
        }
    }
    let base = base?;

    let mut answer = base.answer;
    let mut components = vec![MergedComponent::from(&base.target)];

    if !secondaries.is_empty() {
        answer.push_str(RELATED_HEADER);
        for secondary in &secondaries {
            answer.push_str(&format!(
                "\n*From {}:* {}",
                secondary.target.source_type.title(),
                excerpt(&secondary.answer, excerpt_chars)
            ));
            components.push(MergedComponent::from(&secondary.target));
        }
    }

    Some(MergeOutcome {
        answer,
        thinking: base.thinking,
        contexts: base.contexts,
        components,
        degraded,
    })
}

/// Fans a query out to every target and merges the answers
pub struct Merger {
    engine: Arc<RetrievalEngine>,
    target_timeout: Duration,
    excerpt_chars: usize,
}

impl Merger {
    pub fn new(engine: Arc<RetrievalEngine>) -> Self {
        let config = engine.config();
        let target_timeout = config.target_timeout();
        let excerpt_chars = config.excerpt_chars;
        Self {
            engine,
            target_timeout,
            excerpt_chars,
        }
    }

    /// Multi-strategy retrieval plus answer synthesis for one target
    pub async fn answer_target(&self, query: &str, target: &QueryTarget, k: usize) -> Result<TargetAnswer> {
        let result = self
            .engine
            .multi_strategy(&target.source_id, query, k)
            .await?;

        let (answer, synthesis_degraded) = match &result.derived_answer {
            Some(answer) => (answer.clone(), false),
            None => {
                let synthesis = self
                    .engine
                    .synthesize(query, &result.contexts, target.source_type.title())
                    .await;
                (synthesis.answer, synthesis.degraded)
            }
        };

        Ok(TargetAnswer {
            target: target.clone(),
            answer,
            contexts: result.contexts.clone(),
            thinking: result.thinking.clone(),
            degraded: result.degraded || synthesis_degraded,
        })
    }

    /// Answer every target concurrently and merge
    ///
    /// A target fails only when its source cannot be resolved or it runs past
    /// the target timeout. Cancelling `cancel` drops all in-flight work.
    pub async fn merge(
        &self,
        query: &str,
        targets: &[QueryTarget],
        k: usize,
        cancel: &CancellationToken,
    ) -> Result<MergeOutcome> {
        let fan_out = join_all(targets.iter().map(|target| async move {
            match timeout(self.target_timeout, self.answer_target(query, target, k)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::retrieval(
                    target.source_id.clone(),
                    format!("target timed out after {:?}", self.target_timeout),
                )),
            }
        }));

        let outcomes = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!("Query cancelled with {} targets in flight", targets.len());
                return Err(Error::Cancelled);
            }
            outcomes = fan_out => outcomes,
        };

        let mut answered = Vec::with_capacity(outcomes.len());
        for (target, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Ok(answer) => answered.push(answer),
                Err(e) => tracing::error!(
                    "Error querying {} source '{}': {}",
                    target.source_type,
                    target.source_id,
                    e
                ),
            }
        }

        let attempted = targets.len();
        let outcome = merge_answers(answered, self.excerpt_chars)
            .ok_or(Error::AllSourcesUnavailable { attempted })?;

        tracing::info!(
            "Merged {} of {} targets{}",
            outcome.components.len(),
            attempted,
            if outcome.degraded { " (degraded)" } else { "" }
        );
        Ok(outcome)
    }
}
