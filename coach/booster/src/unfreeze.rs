use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
    calendar::{WeekStart, WeekWindow},
    error::BoosterResult,
    model::{TaskId, TaskPatch, TraineeId},
    store::TaskStore,
};

/// Task brought back into the schedule by an unfreeze.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResumedTask {
    /// Task identifier (unchanged by the unfreeze).
    pub task_id: TaskId,
    /// Program week.
    pub week: u8,
    /// Recomputed window.
    pub window: WeekWindow,
}

/// Result of resuming a trainee's schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnfreezeOutcome {
    /// Trainee whose tasks were resumed.
    pub trainee_id: TraineeId,
    /// Tasks unfrozen by this call, in week order.
    pub resumed: Vec<ResumedTask>,
}

impl UnfreezeOutcome {
    /// Number of tasks unfrozen.
    #[must_use]
    pub fn count(&self) -> usize {
        self.resumed.len()
    }

    /// True when nothing was frozen.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.resumed.is_empty()
    }
}

/// Window of `week` when a schedule resumes on `resume`.
///
/// Week 1 starts on the first day of the week containing `resume`; the
/// result depends on nothing but `resume`, `week` and the convention.
#[must_use]
pub fn resumed_window(week_start: WeekStart, resume: NaiveDate, week: u8) -> WeekWindow {
    let anchor = week_start.start_of_week(resume);
    let start = anchor + Duration::weeks(i64::from(week.saturating_sub(1)));
    WeekWindow {
        start,
        end: week_start.end_of_week(start),
    }
}

/// Resumes paused tasks with windows aligned to a new start date.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnfreezeController {
    week_start: WeekStart,
}

impl UnfreezeController {
    /// Controller using `week_start` to align resumed windows.
    #[must_use]
    pub const fn new(week_start: WeekStart) -> Self {
        Self { week_start }
    }

    /// Convention in use.
    #[must_use]
    pub const fn week_start(&self) -> WeekStart {
        self.week_start
    }

    /// Clears `is_frozen` on every frozen task of `trainee_id` and re-dates it.
    ///
    /// Status, completion date and notes are left alone.
    pub async fn unfreeze(
        &self,
        tasks: &dyn TaskStore,
        trainee_id: &str,
        resume: NaiveDate,
    ) -> BoosterResult<UnfreezeOutcome> {
        let mut resumed = Vec::new();
        for task in tasks.list_by_trainee(trainee_id).await? {
            if !task.is_frozen {
                continue;
            }
            let window = resumed_window(self.week_start, resume, task.week);
            let patch = TaskPatch {
                is_frozen: Some(false),
                week_start_date: Some(window.start),
                week_end_date: Some(window.end),
                ..TaskPatch::default()
            };
            tasks.update(task.id, patch).await?;
            resumed.push(ResumedTask {
                task_id: task.id,
                week: task.week,
                window,
            });
        }
        Ok(UnfreezeOutcome {
            trainee_id: trainee_id.to_string(),
            resumed,
        })
    }
}
