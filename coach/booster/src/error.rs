use std::fmt;

use thiserror::Error;

use crate::{
    bulk::BatchReport,
    model::{TaskId, TraineeId},
};

/// Errors surfaced by the booster scheduling core.
#[derive(Debug, Error)]
pub enum BoosterError {
    /// Caller input is incomplete or out of range.
    #[error("validation failed: {0}")]
    Validation(String),
    /// A status change was attempted on a paused task.
    #[error("task {task_id} (week {week}) is frozen; unfreeze it before changing its status")]
    FrozenTask {
        /// Task that was targeted.
        task_id: TaskId,
        /// Its program week.
        week: u8,
    },
    /// A trainee or task does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// `trainee` or `task`.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },
    /// The backing store failed to read or write.
    #[error("persistence failure: {0}")]
    Persistence(String),
    /// Week assignment would create a second task for the same week.
    #[error("week {week} is already assigned to {trainee}")]
    DuplicateWeek {
        /// Trainee that already holds the week.
        trainee: TraineeId,
        /// Conflicting week.
        week: u8,
    },
    /// The notification dispatcher failed.
    #[error("notification failed: {0}")]
    Notification(String),
    /// A bulk run where at least one trainee failed.
    #[error(
        "bulk {} finished with {} failed and {} succeeded",
        .0.operation,
        .0.failed.len(),
        .0.succeeded.len()
    )]
    PartialBatchFailure(Box<BatchReport>),
}

impl BoosterError {
    /// Validation error from any displayable message.
    pub fn validation(message: impl fmt::Display) -> Self {
        Self::Validation(message.to_string())
    }

    /// Persistence error from any displayable cause.
    pub fn persistence(cause: impl fmt::Display) -> Self {
        Self::Persistence(cause.to_string())
    }

    /// Missing trainee.
    pub fn trainee_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "trainee",
            id: id.into(),
        }
    }

    /// Missing task.
    #[must_use]
    pub fn task_not_found(id: TaskId) -> Self {
        Self::NotFound {
            entity: "task",
            id: id.to_string(),
        }
    }

    /// Stable snake-case kind used in reports and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::FrozenTask { .. } => "frozen_task",
            Self::NotFound { .. } => "not_found",
            Self::Persistence(_) => "persistence",
            Self::DuplicateWeek { .. } => "duplicate_week",
            Self::Notification(_) => "notification",
            Self::PartialBatchFailure(_) => "partial_batch_failure",
        }
    }
}

/// Result alias for the booster core.
pub type BoosterResult<T> = Result<T, BoosterError>;
