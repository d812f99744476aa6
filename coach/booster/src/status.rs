use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    error::{BoosterError, BoosterResult},
    model::{TaskId, TaskPatch, TaskStatus, WeeklyTask},
    store::TaskStore,
};

/// Outcome of a status request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusChange {
    /// Task as stored after the request.
    pub task: WeeklyTask,
    /// Status before the request.
    pub previous: TaskStatus,
    /// False when the task already had the requested status.
    pub changed: bool,
}

/// Enforces the allowed task status transitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusGate;

impl StatusGate {
    /// True when `from -> to` is an allowed transition.
    #[must_use]
    pub const fn is_legal(from: TaskStatus, to: TaskStatus) -> bool {
        matches!(
            (from, to),
            (
                TaskStatus::NotStarted | TaskStatus::InProgress,
                TaskStatus::Completed
            ) | (TaskStatus::Completed, TaskStatus::NotStarted)
                | (TaskStatus::NotStarted, TaskStatus::InProgress)
        )
    }

    /// Patch moving `task` to `target` as of `today`, or `None` when it is already there.
    ///
    /// Frozen tasks reject every request, including no-ops.
    pub fn check(
        task: &WeeklyTask,
        target: TaskStatus,
        today: NaiveDate,
    ) -> BoosterResult<Option<TaskPatch>> {
        if task.is_frozen {
            return Err(BoosterError::FrozenTask {
                task_id: task.id,
                week: task.week,
            });
        }
        if task.status == target {
            return Ok(None);
        }
        if !Self::is_legal(task.status, target) {
            return Err(BoosterError::validation(format!(
                "cannot move week {} from {} to {target}",
                task.week, task.status
            )));
        }
        let completion = (target == TaskStatus::Completed).then_some(today);
        Ok(Some(TaskPatch {
            status: Some(target),
            completion_date: Some(completion),
            ..TaskPatch::default()
        }))
    }

    /// Loads `task_id`, checks the transition and persists it.
    pub async fn transition(
        &self,
        tasks: &dyn TaskStore,
        task_id: TaskId,
        target: TaskStatus,
        today: NaiveDate,
    ) -> BoosterResult<StatusChange> {
        let task = tasks.get(task_id).await?;
        let previous = task.status;
        match Self::check(&task, target, today)? {
            Some(patch) => Ok(StatusChange {
                task: tasks.update(task_id, patch).await?,
                previous,
                changed: true,
            }),
            None => Ok(StatusChange {
                task,
                previous,
                changed: false,
            }),
        }
    }

    /// Returns every task of `trainee_id` to a clean `not_started` state.
    ///
    /// Windows are kept; notes, completion, report and pause flags are cleared.
    /// Returns the number of tasks touched.
    pub async fn reset(&self, tasks: &dyn TaskStore, trainee_id: &str) -> BoosterResult<usize> {
        let existing = tasks.list_by_trainee(trainee_id).await?;
        for task in &existing {
            tasks.update(task.id, reset_patch()).await?;
        }
        Ok(existing.len())
    }
}

fn reset_patch() -> TaskPatch {
    TaskPatch {
        status: Some(TaskStatus::NotStarted),
        completion_date: Some(None),
        notes_thread: Some(Vec::new()),
        is_frozen: Some(false),
        is_displayed_in_report: Some(false),
        ..TaskPatch::default()
    }
}
