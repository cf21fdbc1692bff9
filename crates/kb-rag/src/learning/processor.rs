//! Correction loop: turns reviewed user corrections into ingestible documents

use std::sync::Arc;

use crate::error::Result;
use crate::providers::GatewayResolver;
use crate::types::{
    CorrectedDocument, CorrectionRecord, ImprovementStatus, NewCorrection, NewImprovementLog,
    NewTrainingDatum, ProcessingOutcome, ProcessingStatus,
};

use super::generalize::generalize_query;
use super::lease::LeaseTable;
use super::store::CorrectionStore;

/// Submits corrections and processes pending ones per (source, company)
pub struct CorrectionLoop {
    store: Arc<dyn CorrectionStore>,
    resolver: Arc<dyn GatewayResolver>,
    leases: LeaseTable,
}

impl CorrectionLoop {
    pub fn new(store: Arc<dyn CorrectionStore>, resolver: Arc<dyn GatewayResolver>) -> Self {
        Self {
            store,
            resolver,
            leases: LeaseTable::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn CorrectionStore> {
        &self.store
    }

    /// Validate and persist a correction as pending
    pub fn submit(&self, correction: &NewCorrection) -> Result<i64> {
        correction.validate()?;
        let id = self.store.insert_pending(correction)?;
        tracing::info!(
            "Stored {} feedback {} for '{}' / {}",
            correction.feedback_type.as_str(),
            id,
            correction.source_id,
            correction.company_id
        );
        Ok(id)
    }

    pub fn reject(&self, id: i64) -> Result<()> {
        self.store.reject(id)?;
        tracing::info!("Rejected correction {}", id);
        Ok(())
    }

    pub fn pending_count(&self, source_id: &str, company_id: i64) -> Result<usize> {
        self.store.pending_count(source_id, company_id)
    }

    fn training_datum(record: &CorrectionRecord) -> NewTrainingDatum {
        NewTrainingDatum {
            correction_id: record.id,
            source_id: record.source_id.clone(),
            company_id: record.company_id,
            query_pattern: generalize_query(&record.original_query),
            correct_response: record.corrected_response.clone(),
            incorrect_response: record.original_response.clone(),
            explanation: record.notes.clone(),
        }
    }

    /// Create a training datum for one record and mark it reviewed in one store write
    fn process_record(&self, record: &CorrectionRecord) -> Result<i64> {
        self.store.record_training_datum(&Self::training_datum(record))
    }

    /// Process every pending correction for the pair
    ///
    /// Holds a lease for the whole run; a concurrent caller gets
    /// `ConcurrentProcessing`. Records that fail are logged and left pending.
    pub async fn process_pending(&self, source_id: &str, company_id: i64) -> Result<ProcessingOutcome> {
        let _lease = self.leases.try_acquire(source_id, company_id)?;

        let pending = self.store.list_pending(source_id, company_id)?;
        if pending.is_empty() {
            tracing::info!("No pending feedback for '{}' / {}", source_id, company_id);
            return Ok(ProcessingOutcome::no_pending());
        }

        let mut training_data_ids = Vec::with_capacity(pending.len());
        for record in &pending {
            match self.process_record(record) {
                Ok(datum_id) => training_data_ids.push(datum_id),
                Err(e) => tracing::error!("Error processing feedback {}: {}", record.id, e),
            }
        }

        let mut outcome = ProcessingOutcome {
            status: ProcessingStatus::Success,
            processed_count: training_data_ids.len(),
            training_data_ids,
            improvement_log_id: None,
            ingestion_job_id: None,
        };

        if outcome.training_data_ids.is_empty() {
            return Ok(outcome);
        }

        let log_id = self.store.insert_improvement_log(&NewImprovementLog {
            source_id: source_id.to_string(),
            company_id,
            description: format!("Processed {} user corrections", outcome.processed_count),
            training_data_ids: outcome.training_data_ids.clone(),
        })?;
        outcome.improvement_log_id = Some(log_id);

        let documents: Vec<CorrectedDocument> = self
            .store
            .get_training_data(&outcome.training_data_ids)?
            .iter()
            .map(CorrectedDocument::from_datum)
            .collect();

        let ingested = match self.resolver.resolve(source_id) {
            Ok(gateway) => gateway.ingest_documents(&documents).await,
            Err(e) => Err(e),
        };

        match ingested {
            Ok(job_id) => {
                self.store.update_improvement_log_status(
                    log_id,
                    ImprovementStatus::InProgress,
                    Some(&job_id),
                )?;
                outcome.ingestion_job_id = Some(job_id);
            }
            Err(e) => {
                // the log stays planned so the batch can be resubmitted
                tracing::error!("Ingestion for improvement log {} failed: {}", log_id, e);
            }
        }

        tracing::info!(
            "Processed {} corrections for '{}' / {} (log {})",
            outcome.processed_count,
            source_id,
            company_id,
            log_id
        );
        Ok(outcome)
    }
}
