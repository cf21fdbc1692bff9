//! SQLite correction store
//!
//! Durable storage for user feedback, the training data derived from it and
//! the improvement batches submitted to knowledge sources.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::learning::CorrectionStore;
use crate::types::{
    CorrectionRecord, CorrectionStatus, FeedbackType, ImprovementLog, ImprovementStatus,
    NewCorrection, NewImprovementLog, NewTrainingDatum, TrainingDatum,
};

const CORRECTION_COLUMNS: &str = "id, source_id, company_id, feedback_type, message_id, session_id, \
     rating, original_query, original_response, corrected_response, notes, problem_category, \
     status, created_at, processed_at";

const TRAINING_COLUMNS: &str = "id, correction_id, source_id, company_id, query_pattern, \
     correct_response, incorrect_response, explanation, created_at";

const LOG_COLUMNS: &str = "id, source_id, company_id, description, training_data_ids, status, \
     ingestion_job_id, created_at";

/// SQLite-based correction store
pub struct SqliteCorrectionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCorrectionStore {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::storage(format!("Failed to open database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.migrate()?;
        Ok(store)
    }

    /// Create an in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::storage(format!("Failed to open in-memory database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
        "#,
        )
        .map_err(|e| Error::storage(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(
            r#"
            -- User feedback, never deleted
            CREATE TABLE IF NOT EXISTS query_feedback (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id TEXT NOT NULL,
                company_id INTEGER NOT NULL,
                feedback_type TEXT NOT NULL,
                message_id INTEGER,
                session_id TEXT,
                rating INTEGER,
                original_query TEXT NOT NULL,
                original_response TEXT NOT NULL,
                corrected_response TEXT NOT NULL,
                notes TEXT NOT NULL,
                problem_category TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL,
                processed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_query_feedback_pending
                ON query_feedback(source_id, company_id, status, feedback_type);

            CREATE TABLE IF NOT EXISTS training_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                correction_id INTEGER NOT NULL,
                source_id TEXT NOT NULL,
                company_id INTEGER NOT NULL,
                query_pattern TEXT NOT NULL,
                correct_response TEXT NOT NULL,
                incorrect_response TEXT NOT NULL,
                explanation TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (correction_id) REFERENCES query_feedback(id)
            );

            CREATE INDEX IF NOT EXISTS idx_training_data_source
                ON training_data(source_id, company_id);

            CREATE TABLE IF NOT EXISTS kb_improvement_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id TEXT NOT NULL,
                company_id INTEGER NOT NULL,
                improvement_type TEXT NOT NULL DEFAULT 'content_update',
                description TEXT NOT NULL,
                training_data_ids TEXT NOT NULL,
                implementation_method TEXT NOT NULL DEFAULT 'ingestion_job',
                status TEXT NOT NULL,
                ingestion_job_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        "#,
        )
        .map_err(|e| Error::storage(format!("Failed to run migrations: {}", e)))?;

        tracing::info!("Correction store migrations complete");
        Ok(())
    }

    /// Move a correction to `next`, enforcing the lifecycle
    fn set_status(&self, id: i64, next: CorrectionStatus) -> Result<()> {
        let conn = self.conn.lock();
        update_status(&conn, id, next)
    }

    #[cfg(test)]
    pub(crate) fn row_count(&self, table: &str) -> i64 {
        self.conn
            .lock()
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .unwrap()
    }
}

impl CorrectionStore for SqliteCorrectionStore {
    fn insert_pending(&self, correction: &NewCorrection) -> Result<i64> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT INTO query_feedback (
                source_id, company_id, feedback_type, message_id, session_id, rating,
                original_query, original_response, corrected_response, notes,
                problem_category, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                correction.source_id,
                correction.company_id,
                correction.feedback_type.as_str(),
                correction.message_id,
                correction.session_id,
                correction.rating.map(i64::from),
                correction.original_query,
                correction.original_response,
                correction.corrected_response,
                correction.notes,
                correction.problem_category,
                CorrectionStatus::Pending.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| Error::storage(format!("Failed to insert correction: {}", e)))?;

        Ok(conn.last_insert_rowid())
    }

    fn get_correction(&self, id: i64) -> Result<CorrectionRecord> {
        let conn = self.conn.lock();

        conn.query_row(
            &format!("SELECT {} FROM query_feedback WHERE id = ?1", CORRECTION_COLUMNS),
            params![id],
            row_to_correction,
        )
        .optional()
        .map_err(|e| Error::storage(format!("Failed to get correction: {}", e)))?
        .ok_or_else(|| Error::NotFound(format!("correction {}", id)))
    }

    fn list_pending(&self, source_id: &str, company_id: i64) -> Result<Vec<CorrectionRecord>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM query_feedback \
                 WHERE source_id = ?1 AND company_id = ?2 AND status = 'pending' \
                 AND feedback_type = 'correction' ORDER BY id ASC",
                CORRECTION_COLUMNS
            ))
            .map_err(|e| Error::storage(format!("Failed to prepare query: {}", e)))?;

        let records = stmt
            .query_map(params![source_id, company_id], row_to_correction)
            .map_err(|e| Error::storage(format!("Failed to list pending corrections: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::storage(format!("Failed to read correction row: {}", e)))?;

        Ok(records)
    }

    fn pending_count(&self, source_id: &str, company_id: i64) -> Result<usize> {
        let conn = self.conn.lock();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM query_feedback \
                 WHERE source_id = ?1 AND company_id = ?2 AND status = 'pending' \
                 AND feedback_type = 'correction'",
                params![source_id, company_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::storage(format!("Failed to count pending corrections: {}", e)))?;

        Ok(count as usize)
    }

    fn mark_reviewed(&self, id: i64) -> Result<()> {
        self.set_status(id, CorrectionStatus::Reviewed)
    }

    fn reject(&self, id: i64) -> Result<()> {
        self.set_status(id, CorrectionStatus::Rejected)
    }

    fn insert_training_datum(&self, datum: &NewTrainingDatum) -> Result<i64> {
        let conn = self.conn.lock();
        insert_datum(&conn, datum)
    }

    fn record_training_datum(&self, datum: &NewTrainingDatum) -> Result<i64> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::storage(format!("Failed to begin transaction: {}", e)))?;

        // the status check runs first so a rejected or reviewed record never gets a datum
        update_status(&tx, datum.correction_id, CorrectionStatus::Reviewed)?;
        let id = insert_datum(&tx, datum)?;

        tx.commit()
            .map_err(|e| Error::storage(format!("Failed to commit training data: {}", e)))?;
        Ok(id)
    }

    fn get_training_data(&self, ids: &[i64]) -> Result<Vec<TrainingDatum>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let placeholders = vec!["?"; ids.len()].join(",");

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM training_data WHERE id IN ({}) ORDER BY id ASC",
                TRAINING_COLUMNS, placeholders
            ))
            .map_err(|e| Error::storage(format!("Failed to prepare query: {}", e)))?;

        let data = stmt
            .query_map(params_from_iter(ids.iter()), row_to_training_datum)
            .map_err(|e| Error::storage(format!("Failed to get training data: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::storage(format!("Failed to read training data row: {}", e)))?;

        Ok(data)
    }

    fn insert_improvement_log(&self, log: &NewImprovementLog) -> Result<i64> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO kb_improvement_log (
                source_id, company_id, description, training_data_ids, status,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
            params![
                log.source_id,
                log.company_id,
                log.description,
                serde_json::to_string(&log.training_data_ids)?,
                ImprovementStatus::Planned.as_str(),
                now,
            ],
        )
        .map_err(|e| Error::storage(format!("Failed to insert improvement log: {}", e)))?;

        Ok(conn.last_insert_rowid())
    }

    fn update_improvement_log_status(
        &self,
        id: i64,
        status: ImprovementStatus,
        ingestion_job_id: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock();

        let updated = conn
            .execute(
                "UPDATE kb_improvement_log \
                 SET status = ?1, ingestion_job_id = COALESCE(?2, ingestion_job_id), updated_at = ?3 \
                 WHERE id = ?4",
                params![status.as_str(), ingestion_job_id, Utc::now().to_rfc3339(), id],
            )
            .map_err(|e| Error::storage(format!("Failed to update improvement log: {}", e)))?;

        if updated == 0 {
            return Err(Error::NotFound(format!("improvement log {}", id)));
        }
        Ok(())
    }

    fn get_improvement_log(&self, id: i64) -> Result<ImprovementLog> {
        let conn = self.conn.lock();

        conn.query_row(
            &format!("SELECT {} FROM kb_improvement_log WHERE id = ?1", LOG_COLUMNS),
            params![id],
            row_to_improvement_log,
        )
        .optional()
        .map_err(|e| Error::storage(format!("Failed to get improvement log: {}", e)))?
        .ok_or_else(|| Error::NotFound(format!("improvement log {}", id)))
    }
}

// ==================== Row Mapping ====================

fn update_status(conn: &Connection, id: i64, next: CorrectionStatus) -> Result<()> {
    let current: Option<String> = conn
        .query_row(
            "SELECT status FROM query_feedback WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| Error::storage(format!("Failed to read correction status: {}", e)))?;

    let current = current.ok_or_else(|| Error::NotFound(format!("correction {}", id)))?;
    CorrectionStatus::from_str(&current)?.transition(next)?;

    conn.execute(
        "UPDATE query_feedback SET status = ?1, processed_at = ?2 WHERE id = ?3",
        params![next.as_str(), Utc::now().to_rfc3339(), id],
    )
    .map_err(|e| Error::storage(format!("Failed to update correction status: {}", e)))?;

    Ok(())
}

fn insert_datum(conn: &Connection, datum: &NewTrainingDatum) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO training_data (
            correction_id, source_id, company_id, query_pattern,
            correct_response, incorrect_response, explanation, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            datum.correction_id,
            datum.source_id,
            datum.company_id,
            datum.query_pattern,
            datum.correct_response,
            datum.incorrect_response,
            datum.explanation,
            Utc::now().to_rfc3339(),
        ],
    )
    .map_err(|e| Error::storage(format!("Failed to insert training data: {}", e)))?;

    Ok(conn.last_insert_rowid())
}

fn parse_column<T: FromStr<Err = Error>>(idx: usize, value: &str) -> rusqlite::Result<T> {
    value
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_correction(row: &Row) -> rusqlite::Result<CorrectionRecord> {
    let feedback_type: String = row.get(3)?;
    let rating: Option<i64> = row.get(6)?;
    let status: String = row.get(12)?;
    let created_at: String = row.get(13)?;
    let processed_at: Option<String> = row.get(14)?;

    Ok(CorrectionRecord {
        id: row.get(0)?,
        source_id: row.get(1)?,
        company_id: row.get(2)?,
        feedback_type: parse_column::<FeedbackType>(3, &feedback_type)?,
        message_id: row.get(4)?,
        session_id: row.get(5)?,
        rating: rating.and_then(|r| u8::try_from(r).ok()),
        original_query: row.get(7)?,
        original_response: row.get(8)?,
        corrected_response: row.get(9)?,
        notes: row.get(10)?,
        problem_category: row.get(11)?,
        status: parse_column::<CorrectionStatus>(12, &status)?,
        created_at: parse_timestamp(&created_at),
        processed_at: processed_at.as_deref().map(parse_timestamp),
    })
}

fn row_to_training_datum(row: &Row) -> rusqlite::Result<TrainingDatum> {
    let created_at: String = row.get(8)?;

    Ok(TrainingDatum {
        id: row.get(0)?,
        correction_id: row.get(1)?,
        source_id: row.get(2)?,
        company_id: row.get(3)?,
        query_pattern: row.get(4)?,
        correct_response: row.get(5)?,
        incorrect_response: row.get(6)?,
        explanation: row.get(7)?,
        created_at: parse_timestamp(&created_at),
    })
}

fn row_to_improvement_log(row: &Row) -> rusqlite::Result<ImprovementLog> {
    let ids_json: String = row.get(4)?;
    let status: String = row.get(5)?;
    let created_at: String = row.get(7)?;

    Ok(ImprovementLog {
        id: row.get(0)?,
        source_id: row.get(1)?,
        company_id: row.get(2)?,
        description: row.get(3)?,
        training_data_ids: serde_json::from_str(&ids_json).unwrap_or_default(),
        status: parse_column::<ImprovementStatus>(5, &status)?,
        ingestion_job_id: row.get(6)?,
        created_at: parse_timestamp(&created_at),
    })
}
