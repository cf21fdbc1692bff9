//! Correction lifecycle records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Kind of user feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    /// User supplied a corrected response
    #[default]
    Correction,
    /// User only rated the response
    Rating,
}

impl FeedbackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::Correction => "correction",
            FeedbackType::Rating => "rating",
        }
    }
}

impl FromStr for FeedbackType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "correction" => Ok(FeedbackType::Correction),
            "rating" => Ok(FeedbackType::Rating),
            other => Err(Error::storage(format!("Unknown feedback type: {}", other))),
        }
    }
}

/// Processing status of a correction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionStatus {
    Pending,
    Reviewed,
    Rejected,
}

impl CorrectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionStatus::Pending => "pending",
            CorrectionStatus::Reviewed => "reviewed",
            CorrectionStatus::Rejected => "rejected",
        }
    }

    /// Status only advances: pending -> reviewed, or explicit rejection
    pub fn can_transition_to(&self, next: CorrectionStatus) -> bool {
        matches!(
            (self, next),
            (CorrectionStatus::Pending, CorrectionStatus::Reviewed)
                | (CorrectionStatus::Pending, CorrectionStatus::Rejected)
                | (CorrectionStatus::Reviewed, CorrectionStatus::Rejected)
        )
    }

    /// Validate a transition, returning the new status
    pub fn transition(self, next: CorrectionStatus) -> Result<CorrectionStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(Error::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for CorrectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CorrectionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(CorrectionStatus::Pending),
            "reviewed" => Ok(CorrectionStatus::Reviewed),
            "rejected" => Ok(CorrectionStatus::Rejected),
            other => Err(Error::storage(format!("Unknown correction status: {}", other))),
        }
    }
}

/// A correction as submitted by a user, before persistence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCorrection {
    pub source_id: String,
    pub company_id: i64,
    #[serde(default)]
    pub feedback_type: FeedbackType,
    #[serde(default)]
    pub message_id: Option<i64>,
    #[serde(default)]
    pub session_id: Option<String>,
    /// 1 (worst) to 5 (best)
    #[serde(default)]
    pub rating: Option<u8>,
    pub original_query: String,
    #[serde(default)]
    pub original_response: String,
    #[serde(default)]
    pub corrected_response: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub problem_category: Option<String>,
}

impl NewCorrection {
    /// Reject malformed payloads before they reach the store
    pub fn validate(&self) -> Result<()> {
        if self.source_id.trim().is_empty() {
            return Err(Error::validation("source_id is required"));
        }
        if self.company_id <= 0 {
            return Err(Error::validation("company_id must be positive"));
        }
        if self.original_query.trim().is_empty() {
            return Err(Error::validation("original_query is required"));
        }
        if self.feedback_type == FeedbackType::Correction
            && self.corrected_response.trim().is_empty()
        {
            return Err(Error::validation(
                "corrected_response is required for corrections",
            ));
        }
        if let Some(rating) = self.rating {
            if !(1..=5).contains(&rating) {
                return Err(Error::validation(format!(
                    "rating must be between 1 and 5, got {}",
                    rating
                )));
            }
        }
        if self.feedback_type == FeedbackType::Rating && self.rating.is_none() {
            return Err(Error::validation("rating feedback requires a rating"));
        }
        Ok(())
    }
}

/// A persisted correction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionRecord {
    pub id: i64,
    pub source_id: String,
    pub company_id: i64,
    pub feedback_type: FeedbackType,
    pub message_id: Option<i64>,
    pub session_id: Option<String>,
    pub rating: Option<u8>,
    pub original_query: String,
    pub original_response: String,
    pub corrected_response: String,
    pub notes: String,
    pub problem_category: Option<String>,
    pub status: CorrectionStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// A generalized correction ready to be fed back to a knowledge source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingDatum {
    pub id: i64,
    pub correction_id: i64,
    pub source_id: String,
    pub company_id: i64,
    pub query_pattern: String,
    pub correct_response: String,
    pub incorrect_response: String,
    pub explanation: String,
    pub created_at: DateTime<Utc>,
}

/// Training datum before the store assigns an id
#[derive(Debug, Clone)]
pub struct NewTrainingDatum {
    pub correction_id: i64,
    pub source_id: String,
    pub company_id: i64,
    pub query_pattern: String,
    pub correct_response: String,
    pub incorrect_response: String,
    pub explanation: String,
}

/// Status of an improvement batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImprovementStatus {
    Planned,
    InProgress,
    Complete,
}

impl ImprovementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImprovementStatus::Planned => "planned",
            ImprovementStatus::InProgress => "in_progress",
            ImprovementStatus::Complete => "complete",
        }
    }
}

impl FromStr for ImprovementStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "planned" => Ok(ImprovementStatus::Planned),
            "in_progress" => Ok(ImprovementStatus::InProgress),
            "complete" => Ok(ImprovementStatus::Complete),
            other => Err(Error::storage(format!("Unknown improvement status: {}", other))),
        }
    }
}

/// One correction-processing run that produced ingestible documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImprovementLog {
    pub id: i64,
    pub source_id: String,
    pub company_id: i64,
    pub description: String,
    pub training_data_ids: Vec<i64>,
    pub status: ImprovementStatus,
    pub ingestion_job_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Improvement log before the store assigns an id
#[derive(Debug, Clone)]
pub struct NewImprovementLog {
    pub source_id: String,
    pub company_id: i64,
    pub description: String,
    pub training_data_ids: Vec<i64>,
}

/// Supplementary document sent to a knowledge source for ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectedDocument {
    pub query_pattern: String,
    pub correct_response: String,
    pub explanation: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

impl CorrectedDocument {
    pub const CATEGORY: &'static str = "user_corrections";

    pub fn from_datum(datum: &TrainingDatum) -> Self {
        Self {
            query_pattern: datum.query_pattern.clone(),
            correct_response: datum.correct_response.clone(),
            explanation: format!("Corrected based on user feedback: {}", datum.explanation),
            category: Self::CATEGORY.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Text body indexed by the knowledge source
    pub fn to_text(&self) -> String {
        format!(
            "Query pattern: {}\n\nCorrect response:\n{}\n\n{}\n\nCategory: {}\nCreated: {}",
            self.query_pattern,
            self.correct_response,
            self.explanation,
            self.category,
            self.created_at.to_rfc3339()
        )
    }
}

/// Outcome status of a processing run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Success,
    NoPendingFeedback,
}

/// Result of `process_pending`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    pub status: ProcessingStatus,
    pub processed_count: usize,
    pub training_data_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improvement_log_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingestion_job_id: Option<String>,
}

impl ProcessingOutcome {
    pub fn no_pending() -> Self {
        Self {
            status: ProcessingStatus::NoPendingFeedback,
            processed_count: 0,
            training_data_ids: Vec::new(),
            improvement_log_id: None,
            ingestion_job_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correction() -> NewCorrection {
        NewCorrection {
            source_id: "KB-DB".into(),
            company_id: 1,
            original_query: "Show me all sales orders by payment date".into(),
            original_response: "SELECT * FROM db_salescommissionlog".into(),
            corrected_response: "SELECT * FROM db_order ORDER BY DatePaid".into(),
            notes: "Used wrong table".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_status_transitions() {
        use CorrectionStatus::*;
        assert!(Pending.can_transition_to(Reviewed));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Reviewed.can_transition_to(Rejected));
        assert!(!Reviewed.can_transition_to(Pending));
        assert!(!Rejected.can_transition_to(Reviewed));
        assert!(Reviewed.transition(Pending).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(correction().validate().is_ok());

        let mut missing = correction();
        missing.corrected_response = "  ".into();
        assert!(matches!(missing.validate(), Err(Error::CorrectionValidation(_))));

        let mut bad_rating = correction();
        bad_rating.rating = Some(9);
        assert!(bad_rating.validate().is_err());

        let rating_only = NewCorrection {
            feedback_type: FeedbackType::Rating,
            rating: Some(2),
            corrected_response: String::new(),
            ..correction()
        };
        assert!(rating_only.validate().is_ok());
    }

    #[test]
    fn test_corrected_document() {
        let datum = TrainingDatum {
            id: 7,
            correction_id: 3,
            source_id: "KB-DB".into(),
            company_id: 1,
            query_pattern: "show me all [SALES_ENTITY]".into(),
            correct_response: "SELECT * FROM db_order".into(),
            incorrect_response: "SELECT 1".into(),
            explanation: "Used wrong table".into(),
            created_at: Utc::now(),
        };
        let doc = CorrectedDocument::from_datum(&datum);
        assert_eq!(doc.category, "user_corrections");
        assert_eq!(doc.explanation, "Corrected based on user feedback: Used wrong table");
        assert!(doc.to_text().contains("[SALES_ENTITY]"));
    }
}
