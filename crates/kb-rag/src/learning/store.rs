//! Correction store trait

use crate::error::Result;
use crate::types::{
    CorrectionRecord, ImprovementLog, ImprovementStatus, NewCorrection, NewImprovementLog,
    NewTrainingDatum, TrainingDatum,
};

/// Persistent store for corrections, training data and improvement logs
///
/// Implementations:
/// - `SqliteCorrectionStore`: local SQLite database
///
/// Status changes go through `CorrectionStatus::transition`, so a record can
/// never move back to pending.
pub trait CorrectionStore: Send + Sync {
    /// Persist a validated correction with status pending, returning its id
    fn insert_pending(&self, correction: &NewCorrection) -> Result<i64>;

    fn get_correction(&self, id: i64) -> Result<CorrectionRecord>;

    /// Pending correction-type records for the pair, oldest first
    fn list_pending(&self, source_id: &str, company_id: i64) -> Result<Vec<CorrectionRecord>>;

    fn pending_count(&self, source_id: &str, company_id: i64) -> Result<usize>;

    /// pending -> reviewed, stamping the processed time
    fn mark_reviewed(&self, id: i64) -> Result<()>;

    /// pending|reviewed -> rejected
    fn reject(&self, id: i64) -> Result<()>;

    fn insert_training_datum(&self, datum: &NewTrainingDatum) -> Result<i64>;

    /// Insert the datum and move its correction pending -> reviewed as one unit
    ///
    /// Fails without writing anything when the correction is no longer pending.
    fn record_training_datum(&self, datum: &NewTrainingDatum) -> Result<i64>;

    /// Training data with the given ids, in id order
    fn get_training_data(&self, ids: &[i64]) -> Result<Vec<TrainingDatum>>;

    /// Persist a log with status planned, returning its id
    fn insert_improvement_log(&self, log: &NewImprovementLog) -> Result<i64>;

    fn update_improvement_log_status(
        &self,
        id: i64,
        status: ImprovementStatus,
        ingestion_job_id: Option<&str>,
    ) -> Result<()>;

    fn get_improvement_log(&self, id: i64) -> Result<ImprovementLog>;
}
