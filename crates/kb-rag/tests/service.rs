mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use common::{harness, MemorySource, ScriptedGenerator};
use kb_rag::{Error, KnowledgeSourceDescriptor, MergedComponent, QueryMode, QueryTarget, SourceType};

const CUSTOMERS_DOC: &str = "Table customers (customer_id, name, email)";
const SYNC_DOC: &str = "Sync troubleshooting: restart the sync service from the admin panel";

const SCHEMA_SQL: &str = "SELECT table_name FROM information_schema.tables;";
const SYNC_ANSWER: &str = "Restart the sync service from the admin panel, then retry the import.";
const DB_SENTENCE: &str = "The customers table stores one row per customer account and is keyed by customer_id, which every order row references.";
const DB_TAIL: &str = " The orders table links customers to line items through order_id and carries status, totals, timestamps and shipping details for fulfillment teams.";

fn descriptors() -> Vec<KnowledgeSourceDescriptor> {
    vec![
        KnowledgeSourceDescriptor::new(SourceType::Database, "KB-DB"),
        KnowledgeSourceDescriptor::new(SourceType::Support, "KB-SUP"),
    ]
}

#[tokio::test]
async fn test_smart_query_routes_to_database() {
    let db = Arc::new(MemorySource::new("KB-DB", &[CUSTOMERS_DOC]));
    let support = Arc::new(MemorySource::new("KB-SUP", &[SYNC_DOC]));
    let h = harness(
        vec![db.clone(), support.clone()],
        descriptors(),
        ScriptedGenerator::new(&[("Table customers", SCHEMA_SQL)]),
    );

    let response = h
        .service
        .query("Show me all tables in the database", QueryMode::Smart)
        .await
        .unwrap();

    assert_eq!(response.answer, SCHEMA_SQL);
    assert_eq!(
        response.components,
        vec![MergedComponent {
            source_type: SourceType::Database,
            source_id: "KB-DB".to_string(),
            is_secondary: false,
        }]
    );
    assert!(response.note.is_none());

    let contexts = response.contexts.unwrap();
    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].content, CUSTOMERS_DOC);
    assert!(response.thinking.unwrap().contains("Multi-strategy retrieval"));

    assert!(!db.queries.lock().is_empty());
    assert!(support.queries.lock().is_empty());
}

#[tokio::test]
async fn test_secondary_answer_appended_as_excerpt() {
    let db_answer = format!("{}{}", DB_SENTENCE, DB_TAIL);
    let db = Arc::new(MemorySource::new("KB-DB", &[CUSTOMERS_DOC]));
    let support = Arc::new(MemorySource::new("KB-SUP", &[SYNC_DOC]));
    let h = harness(
        vec![db, support],
        descriptors(),
        ScriptedGenerator::new(&[("Sync troubleshooting", SYNC_ANSWER), ("Table customers", db_answer.as_str())]),
    );

    let targets = vec![
        QueryTarget::primary(SourceType::Support, "KB-SUP"),
        QueryTarget::secondary(SourceType::Database, "KB-DB"),
    ];
    let response = h
        .service
        .query_multi("sync keeps failing for customers", Some(&targets), &[])
        .await
        .unwrap();

    let expected = format!(
        "{}\n\n**Related Information:**\n\n*From Database:* {}...",
        SYNC_ANSWER, DB_SENTENCE
    );
    assert_eq!(response.answer, expected);
    assert_eq!(response.components.len(), 2);
    assert!(!response.components[0].is_secondary);
    assert!(response.components[1].is_secondary);
    assert_eq!(response.contexts.unwrap()[0].content, SYNC_DOC);
}

#[tokio::test]
async fn test_forced_mode_overrides_classification() {
    let db = Arc::new(MemorySource::new("KB-DB", &[CUSTOMERS_DOC]));
    let support = Arc::new(MemorySource::new("KB-SUP", &[SYNC_DOC]));
    let h = harness(
        vec![db, support.clone()],
        descriptors(),
        ScriptedGenerator::new(&[("Table customers", SCHEMA_SQL)]),
    );

    let response = h
        .service
        .query("how do I fix this login error", QueryMode::Database)
        .await
        .unwrap();

    assert_eq!(response.components[0].source_type, SourceType::Database);
    assert_eq!(response.answer, SCHEMA_SQL);
    assert!(support.queries.lock().is_empty());
}

#[tokio::test]
async fn test_unreachable_source_degrades_with_note() {
    let db = Arc::new(MemorySource::failing("KB-DB"));
    let h = harness(
        vec![db],
        vec![KnowledgeSourceDescriptor::new(SourceType::Database, "KB-DB")],
        ScriptedGenerator::new(&[]),
    );

    let response = h
        .service
        .query("Show me all tables", QueryMode::Smart)
        .await
        .unwrap();

    assert!(response.answer.starts_with("I couldn't find relevant information in the database knowledge base"));
    assert!(response.note.is_some());
    let contexts = response.contexts.unwrap();
    assert_eq!(contexts.len(), 1);
    assert!(contexts[0].is_fallback());
}

#[tokio::test]
async fn test_all_targets_unavailable() {
    let h = harness(vec![], descriptors(), ScriptedGenerator::new(&[]));

    let targets = vec![
        QueryTarget::primary(SourceType::Database, "MISSING-1"),
        QueryTarget::secondary(SourceType::Support, "MISSING-2"),
    ];
    let err = h
        .service
        .query_multi("anything", Some(&targets), &[])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AllSourcesUnavailable { attempted: 2 }));
}

#[tokio::test]
async fn test_no_sources_configured() {
    let h = harness(vec![], vec![], ScriptedGenerator::new(&[]));

    let err = h.service.query("anything", QueryMode::Smart).await.unwrap_err();
    assert!(matches!(err, Error::NoTargetsAvailable(_)));

    let err = h.service.relationships("customers").await.unwrap_err();
    assert!(matches!(err, Error::NoTargetsAvailable(_)));
}

#[tokio::test]
async fn test_cancellation_stops_query() {
    let db = Arc::new(MemorySource::slow("KB-DB", Duration::from_secs(20)));
    let h = harness(
        vec![db],
        vec![KnowledgeSourceDescriptor::new(SourceType::Database, "KB-DB")],
        ScriptedGenerator::new(&[]),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = h
        .service
        .query_multi_cancellable("Show me all tables", None, &descriptors(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_repeated_query_served_from_cache() {
    let db = Arc::new(MemorySource::new("KB-DB", &[CUSTOMERS_DOC]));
    let h = harness(
        vec![db.clone()],
        vec![KnowledgeSourceDescriptor::new(SourceType::Database, "KB-DB")],
        ScriptedGenerator::new(&[("Table customers", SCHEMA_SQL)]),
    );

    h.service.query("list tables", QueryMode::Database).await.unwrap();
    let calls = db.queries.lock().len();
    h.service.query("list tables", QueryMode::Database).await.unwrap();

    assert_eq!(db.queries.lock().len(), calls);
    assert!(h.service.cache_stats().hits >= 1);
}

#[tokio::test]
async fn test_relationships_and_optimize() {
    let db = Arc::new(MemorySource::new("KB-DB", &[CUSTOMERS_DOC]));
    let h = harness(
        vec![db],
        descriptors(),
        ScriptedGenerator::new(&[]),
    );

    let relationships = h.service.relationships("customers").await.unwrap();
    assert_eq!(relationships.answer, "customers.id is referenced by orders.customer_id");
    assert_eq!(relationships.components[0].source_id, "KB-DB");
    assert!(relationships.note.is_none());

    let optimized = h
        .service
        .optimize("SELECT * FROM orders WHERE status = 'open'")
        .await
        .unwrap();
    assert!(optimized.answer.starts_with("SELECT id FROM orders"));
    assert!(h
        .generator
        .prompts
        .lock()
        .iter()
        .any(|p| p.contains("SELECT * FROM orders")));
}
