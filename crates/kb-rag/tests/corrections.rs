mod common;

use std::sync::Arc;

use common::{harness, MemorySource, ScriptedGenerator};
use kb_rag::learning::CorrectionStore;
use kb_rag::types::{CorrectionStatus, ImprovementStatus, ProcessingStatus};
use kb_rag::{Error, KnowledgeSourceDescriptor, NewCorrection, SourceType};

fn correction(query: &str, corrected: &str) -> NewCorrection {
    NewCorrection {
        source_id: "KB-DB".to_string(),
        company_id: 7,
        original_query: query.to_string(),
        original_response: "SELECT * FROM client".to_string(),
        corrected_response: corrected.to_string(),
        notes: "the table is called customers".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_correction_round_trip() {
    let db = Arc::new(MemorySource::new("KB-DB", &[]));
    let h = harness(
        vec![db.clone()],
        vec![KnowledgeSourceDescriptor::new(SourceType::Database, "KB-DB")],
        ScriptedGenerator::new(&[]),
    );

    let submitted = h
        .service
        .submit_correction(&correction("Show all customers for 2024", "SELECT * FROM customers"))
        .unwrap();
    assert_eq!(submitted.status, "success");
    assert_eq!(h.service.pending_corrections("KB-DB", 7).unwrap(), 1);

    let outcome = h.service.process_corrections("KB-DB", 7).await.unwrap();
    assert_eq!(outcome.status, ProcessingStatus::Success);
    assert_eq!(outcome.processed_count, 1);
    assert_eq!(outcome.ingestion_job_id.as_deref(), Some("job-KB-DB"));
    assert_eq!(h.service.pending_corrections("KB-DB", 7).unwrap(), 0);

    let ingested = db.ingested.lock();
    assert_eq!(ingested.len(), 1);
    assert_eq!(ingested[0].query_pattern, "show all [CUSTOMER_ENTITY] for 2024");
    assert_eq!(ingested[0].correct_response, "SELECT * FROM customers");
    assert!(ingested[0].to_text().contains("SELECT * FROM customers"));

    let record = h.store.get_correction(submitted.correction_id).unwrap();
    assert_eq!(record.status, CorrectionStatus::Reviewed);
    let log = h
        .store
        .get_improvement_log(outcome.improvement_log_id.unwrap())
        .unwrap();
    assert_eq!(log.status, ImprovementStatus::InProgress);
    assert_eq!(log.ingestion_job_id.as_deref(), Some("job-KB-DB"));

    let again = h.service.process_corrections("KB-DB", 7).await.unwrap();
    assert_eq!(again.status, ProcessingStatus::NoPendingFeedback);
}

#[tokio::test]
async fn test_corrections_scoped_to_company() {
    let db = Arc::new(MemorySource::new("KB-DB", &[]));
    let h = harness(vec![db.clone()], vec![], ScriptedGenerator::new(&[]));

    h.service
        .submit_correction(&correction("q", "SELECT 1"))
        .unwrap();

    let outcome = h.service.process_corrections("KB-DB", 8).await.unwrap();
    assert_eq!(outcome.status, ProcessingStatus::NoPendingFeedback);
    assert!(db.ingested.lock().is_empty());
    assert_eq!(h.service.pending_corrections("KB-DB", 7).unwrap(), 1);
}

#[test]
fn test_reject_and_validation() {
    let h = harness(vec![], vec![], ScriptedGenerator::new(&[]));

    let id = h
        .service
        .submit_correction(&correction("q", "SELECT 1"))
        .unwrap()
        .correction_id;
    h.service.reject_correction(id).unwrap();
    assert_eq!(h.store.get_correction(id).unwrap().status, CorrectionStatus::Rejected);
    assert_eq!(h.service.pending_corrections("KB-DB", 7).unwrap(), 0);

    assert!(matches!(
        h.service.reject_correction(id),
        Err(Error::InvalidTransition { .. })
    ));

    let err = h.service.submit_correction(&correction("q", "  ")).unwrap_err();
    assert!(matches!(err, Error::CorrectionValidation(_)));
}
