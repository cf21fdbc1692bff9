//! Correction loop: feedback intake, generalization and re-ingestion

pub mod generalize;
pub mod lease;
pub mod processor;
pub mod store;

pub use generalize::generalize_query;
pub use lease::{LeaseGuard, LeaseTable};
pub use processor::CorrectionLoop;
pub use store::CorrectionStore;
