use serde_json::Value;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::cache::CacheError;
use crate::composition::CompositionError;
use crate::job_service::JobServiceError;
use crate::state_machine::{SlotFill, Stage, Transition};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Unknown machine: {0}")]
    UnknownMachine(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Cannot {attempted} while job is {current}")]
    StageOutOfOrder {
        attempted: Transition,
        current: Stage,
    },

    #[error("Cache is inconsistent ({0}); run `xrfjob reset`")]
    InconsistentCache(SlotFill),

    #[error("No data found for request {request_num}, job {job_num}")]
    NoDataFound { request_num: String, job_num: String },

    #[error("Generated {actual} readings for {items} items, expected {expected}")]
    ReadingCountMismatch {
        items: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Composition error: {0}")]
    Composition(#[from] CompositionError),

    #[error("Job service error: {0}")]
    JobService(#[from] JobServiceError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Upstream accepted the readings but the local archive was not written.
    /// Resubmitting would submit the job twice.
    #[error("Readings for job {job_num} were submitted but not archived: {source}")]
    ArchiveAfterSubmit {
        job_num: String,
        response: Value,
        #[source]
        source: ArchiveError,
    },

    /// Upstream accepted the readings and they were archived, but the cache
    /// still holds the job. Resubmitting would submit the job twice.
    #[error("Readings for job {job_num} were submitted and archived but the cache was not cleared: {source}")]
    ClearAfterSubmit {
        job_num: String,
        response: Value,
        #[source]
        source: CacheError,
    },
}

/// Coarse classification of a [`WorkflowError`] for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    UnknownMachine,
    MissingField,
    InvalidPurity,
    GenerationExhausted,
    ReadingCountMismatch,
    StageOutOfOrder,
    InconsistentCache,
    ExternalServiceError,
    NoDataFound,
    CacheIoError,
    CacheEmptyError,
    CacheDecodeError,
    ArchiveAfterSubmit,
    ClearAfterSubmit,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::UnknownMachine(_) => ErrorKind::UnknownMachine,
            WorkflowError::MissingField(_) => ErrorKind::MissingField,
            WorkflowError::StageOutOfOrder { .. } => ErrorKind::StageOutOfOrder,
            WorkflowError::InconsistentCache(_) => ErrorKind::InconsistentCache,
            WorkflowError::NoDataFound { .. } => ErrorKind::NoDataFound,
            WorkflowError::ReadingCountMismatch { .. } => ErrorKind::ReadingCountMismatch,
            WorkflowError::Composition(CompositionError::InvalidPurity(_)) => {
                ErrorKind::InvalidPurity
            }
            WorkflowError::Composition(CompositionError::Exhausted { .. }) => {
                ErrorKind::GenerationExhausted
            }
            WorkflowError::JobService(JobServiceError::NoDataFound) => ErrorKind::NoDataFound,
            WorkflowError::JobService(_) => ErrorKind::ExternalServiceError,
            WorkflowError::Cache(CacheError::Io { .. } | CacheError::Lock { .. }) => {
                ErrorKind::CacheIoError
            }
            WorkflowError::Cache(CacheError::Empty { .. }) => ErrorKind::CacheEmptyError,
            WorkflowError::Cache(CacheError::Decode { .. }) => ErrorKind::CacheDecodeError,
            WorkflowError::ArchiveAfterSubmit { .. } => ErrorKind::ArchiveAfterSubmit,
            WorkflowError::ClearAfterSubmit { .. } => ErrorKind::ClearAfterSubmit,
        }
    }
}
