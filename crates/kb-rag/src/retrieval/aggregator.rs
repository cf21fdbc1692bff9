//! Fingerprint deduplication and score ranking of retrieved contexts

use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::types::RetrievedContext;

/// Lowercase, collapse whitespace runs and trim
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// SHA-256 hex digest of the normalized text
pub fn fingerprint(text: &str) -> String {
    hex::encode(Sha256::digest(normalize(text).as_bytes()))
}

/// SHA-256 hex digest with whitespace collapsed and case kept
pub fn sql_fingerprint(sql: &str) -> String {
    let collapsed = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    hex::encode(Sha256::digest(collapsed.as_bytes()))
}

/// Descending score order with NaN ranked lowest
fn by_score_desc(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Keep the highest-scoring context per fingerprint, preserving first-seen order
pub fn dedup(contexts: Vec<RetrievedContext>) -> Vec<RetrievedContext> {
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(contexts.len());
    let mut unique: Vec<RetrievedContext> = Vec::with_capacity(contexts.len());

    for context in contexts {
        let key = fingerprint(&context.content);
        match slots.get(&key) {
            Some(&idx) => {
                if by_score_desc(context.score, unique[idx].score) == Ordering::Less {
                    unique[idx] = context;
                }
            }
            None => {
                slots.insert(key, unique.len());
                unique.push(context);
            }
        }
    }

    unique
}

/// Deduplicate, rank by score descending and truncate to `k`
pub fn aggregate(contexts: Vec<RetrievedContext>, k: usize) -> Vec<RetrievedContext> {
    let before = contexts.len();
    let mut ranked = dedup(contexts);
    ranked.sort_by(|a, b| by_score_desc(a.score, b.score));
    ranked.truncate(k);

    tracing::debug!("Aggregated {} contexts into {} (k={})", before, ranked.len(), k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StrategyKind;

    fn ctx(content: &str, score: f32, from: &str) -> RetrievedContext {
        RetrievedContext::new(content, "s3://kb/doc", score, from, StrategyKind::Standard)
    }

    #[test]
    fn test_fingerprint_normalizes_case_and_whitespace() {
        assert_eq!(
            fingerprint("  Orders   table\n has ID "),
            fingerprint("orders table has id")
        );
        assert_ne!(fingerprint("orders"), fingerprint("order"));
        assert_eq!(fingerprint("x").len(), 64);
    }

    #[test]
    fn test_sql_fingerprint_keeps_literal_case() {
        assert_eq!(
            sql_fingerprint("SELECT *  FROM users\nWHERE name = 'Bob'"),
            sql_fingerprint("SELECT * FROM users WHERE name = 'Bob'")
        );
        assert_ne!(
            sql_fingerprint("SELECT * FROM users WHERE name = 'Bob'"),
            sql_fingerprint("SELECT * FROM users WHERE name = 'bob'")
        );
    }

    #[test]
    fn test_dedup_keeps_max_score() {
        let out = aggregate(
            vec![
                ctx("Orders table", 0.4, "q1"),
                ctx("orders  TABLE", 0.9, "q2"),
                ctx("customers table", 0.5, "q1"),
            ],
            10,
        );

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].score, 0.9);
        assert_eq!(out[0].from_query, "q2");
        assert_eq!(out[1].content, "customers table");
    }

    #[test]
    fn test_tie_keeps_first_seen() {
        let out = dedup(vec![ctx("same", 0.5, "first"), ctx("SAME", 0.5, "second")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].from_query, "first");
    }

    #[test]
    fn test_sorted_and_truncated() {
        let out = aggregate(
            vec![
                ctx("a", 0.1, "q"),
                ctx("b", f32::NAN, "q"),
                ctx("c", 0.7, "q"),
                ctx("d", 0.3, "q"),
            ],
            3,
        );

        let contents: Vec<_> = out.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["c", "d", "a"]);
    }

    #[test]
    fn test_nan_replaced_by_real_score() {
        let out = dedup(vec![ctx("x", f32::NAN, "q1"), ctx("x", 0.2, "q2")]);
        assert_eq!(out[0].from_query, "q2");
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate(Vec::new(), 5).is_empty());
    }
}
