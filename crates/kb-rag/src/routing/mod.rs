//! Query routing and multi-source merging

pub mod classifier;
pub mod merger;
pub mod router;

pub use classifier::{KeywordClassifier, QueryClassifier};
pub use merger::{excerpt, merge_answers, MergeOutcome, Merger};
pub use router::Router;
