use serde::{Deserialize, Serialize};

use crate::{
    error::BoosterResult,
    model::{TaskId, TaskPatch, TraineeId, WeeklyTask},
    store::TaskStore,
};

/// Result of pausing a trainee's schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FreezeOutcome {
    /// Trainee whose tasks were paused.
    pub trainee_id: TraineeId,
    /// Tasks newly frozen by this call.
    pub frozen: Vec<TaskId>,
}

impl FreezeOutcome {
    /// Number of tasks newly frozen.
    #[must_use]
    pub fn count(&self) -> usize {
        self.frozen.len()
    }

    /// True when nothing needed freezing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.frozen.is_empty()
    }
}

/// True for tasks a freeze should pause: open and not already frozen.
#[must_use]
pub fn is_freezable(task: &WeeklyTask) -> bool {
    !task.is_completed() && !task.is_frozen
}

/// Pauses every open task of a trainee.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreezeController;

impl FreezeController {
    /// Sets `is_frozen` on every freezable task; windows, status and notes stay as they are.
    ///
    /// Completed and already-frozen tasks are skipped, so repeating the call is harmless.
    pub async fn freeze(
        &self,
        tasks: &dyn TaskStore,
        trainee_id: &str,
    ) -> BoosterResult<FreezeOutcome> {
        let mut frozen = Vec::new();
        for task in tasks.list_by_trainee(trainee_id).await? {
            if !is_freezable(&task) {
                continue;
            }
            tasks.update(task.id, TaskPatch::frozen(true)).await?;
            frozen.push(task.id);
        }
        Ok(FreezeOutcome {
            trainee_id: trainee_id.to_string(),
            frozen,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{Note, TaskStatus},
        store::{
            test_support::{date, seeded_schedule},
            InMemoryTaskStore,
        },
    };
    use chrono::Utc;

    #[tokio::test]
    async fn freezes_open_tasks_and_skips_completed() {
        let tasks = InMemoryTaskStore::new();
        let schedule = seeded_schedule(&tasks, "ana", date(2024, 1, 7), 7).await;
        for task in &schedule[..2] {
            tasks
                .update(
                    task.id,
                    TaskPatch {
                        status: Some(TaskStatus::Completed),
                        completion_date: Some(Some(date(2024, 1, 20))),
                        ..TaskPatch::default()
                    },
                )
                .await
                .unwrap();
        }
        tasks
            .update(
                schedule[3].id,
                TaskPatch {
                    status: Some(TaskStatus::InProgress),
                    notes_thread: Some(vec![Note {
                        text: "halfway".into(),
                        timestamp: Utc::now(),
                    }]),
                    ..TaskPatch::default()
                },
            )
            .await
            .unwrap();
        let before = tasks.list_by_trainee("ana").await.unwrap();

        let outcome = FreezeController.freeze(&tasks, "ana").await.unwrap();
        assert_eq!(outcome.count(), 5);

        let after = tasks.list_by_trainee("ana").await.unwrap();
        for (old, new) in before.iter().zip(&after) {
            if old.is_completed() {
                assert_eq!(old, new);
            } else {
                assert!(new.is_frozen);
                assert_eq!(old.week_start_date, new.week_start_date);
                assert_eq!(old.status, new.status);
                assert_eq!(old.notes_thread, new.notes_thread);
            }
        }
    }

    #[tokio::test]
    async fn second_freeze_is_a_noop() {
        let tasks = InMemoryTaskStore::new();
        seeded_schedule(&tasks, "ana", date(2024, 1, 7), 12).await;
        assert_eq!(FreezeController.freeze(&tasks, "ana").await.unwrap().count(), 12);
        let again = FreezeController.freeze(&tasks, "ana").await.unwrap();
        assert!(again.is_noop());
    }

    #[tokio::test]
    async fn trainee_without_tasks_freezes_nothing() {
        let tasks = InMemoryTaskStore::new();
        assert!(FreezeController
            .freeze(&tasks, "nobody")
            .await
            .unwrap()
            .is_noop());
    }
}
