//! Core types for the retrieval and routing engine

pub mod context;
pub mod correction;
pub mod response;
pub mod target;

pub use context::{RetrievedContext, StrategyKind, StrategyResult};
pub use correction::{
    CorrectedDocument, CorrectionRecord, CorrectionStatus, FeedbackType, ImprovementLog,
    ImprovementStatus, NewCorrection, NewImprovementLog, NewTrainingDatum, ProcessingOutcome,
    ProcessingStatus, TrainingDatum,
};
pub use response::{MergedComponent, QueryResponse, SubmissionResponse, TargetAnswer};
pub use target::{KnowledgeSourceDescriptor, QueryMode, QueryTarget, SourceType};
