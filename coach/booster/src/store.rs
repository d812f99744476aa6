use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::{
    error::{BoosterError, BoosterResult},
    model::{TaskId, TaskPatch, Trainee, TraineeId, TraineePatch, WeeklyTask},
};

/// Persistence boundary for weekly tasks.
///
/// Implementations must make each call atomic per record; the scheduler
/// takes no locks of its own.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Every task owned by `trainee`, ordered by week.
    async fn list_by_trainee(&self, trainee: &str) -> BoosterResult<Vec<WeeklyTask>>;

    /// Single task by id.
    async fn get(&self, id: TaskId) -> BoosterResult<WeeklyTask>;

    /// Inserts one task.
    async fn create(&self, task: WeeklyTask) -> BoosterResult<WeeklyTask>;

    /// Inserts several tasks in one write.
    async fn create_many(&self, tasks: Vec<WeeklyTask>) -> BoosterResult<Vec<WeeklyTask>>;

    /// Applies a field-level update and returns the stored result.
    async fn update(&self, id: TaskId, patch: TaskPatch) -> BoosterResult<WeeklyTask>;

    /// Removes one task.
    async fn delete(&self, id: TaskId) -> BoosterResult<()>;
}

/// Identity store and group directory as seen by the scheduler.
#[async_trait]
pub trait TraineeStore: Send + Sync {
    /// Single trainee by id.
    async fn get(&self, id: &str) -> BoosterResult<Trainee>;

    /// Applies a field-level update and returns the stored result.
    async fn update(&self, id: &str, patch: TraineePatch) -> BoosterResult<Trainee>;

    /// Current members of `group`, in directory order.
    async fn list_by_group(&self, group: &str) -> BoosterResult<Vec<Trainee>>;
}

pub(crate) fn sorted_by_week(mut tasks: Vec<WeeklyTask>) -> Vec<WeeklyTask> {
    tasks.sort_by_key(|task| task.week);
    tasks
}

/// Task store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<IndexMap<TaskId, WeeklyTask>>,
}

impl InMemoryTaskStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tasks across all trainees.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    /// True when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn list_by_trainee(&self, trainee: &str) -> BoosterResult<Vec<WeeklyTask>> {
        let tasks = self
            .tasks
            .read()
            .values()
            .filter(|task| task.trainee_id == trainee)
            .cloned()
            .collect();
        Ok(sorted_by_week(tasks))
    }

    async fn get(&self, id: TaskId) -> BoosterResult<WeeklyTask> {
        self.tasks
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| BoosterError::task_not_found(id))
    }

    async fn create(&self, task: WeeklyTask) -> BoosterResult<WeeklyTask> {
        let mut tasks = self.tasks.write();
        if tasks.contains_key(&task.id) {
            return Err(BoosterError::persistence(format!(
                "task {} already exists",
                task.id
            )));
        }
        tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn create_many(&self, batch: Vec<WeeklyTask>) -> BoosterResult<Vec<WeeklyTask>> {
        let mut tasks = self.tasks.write();
        if let Some(clash) = batch.iter().find(|task| tasks.contains_key(&task.id)) {
            return Err(BoosterError::persistence(format!(
                "task {} already exists",
                clash.id
            )));
        }
        for task in &batch {
            tasks.insert(task.id, task.clone());
        }
        Ok(batch)
    }

    async fn update(&self, id: TaskId, patch: TaskPatch) -> BoosterResult<WeeklyTask> {
        let mut tasks = self.tasks.write();
        let task = tasks
            .get_mut(&id)
            .ok_or_else(|| BoosterError::task_not_found(id))?;
        patch.apply(task);
        Ok(task.clone())
    }

    async fn delete(&self, id: TaskId) -> BoosterResult<()> {
        self.tasks
            .write()
            .shift_remove(&id)
            .map(|_| ())
            .ok_or_else(|| BoosterError::task_not_found(id))
    }
}

/// Trainee store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryTraineeStore {
    trainees: RwLock<IndexMap<TraineeId, Trainee>>,
}

impl InMemoryTraineeStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with `trainees`.
    #[must_use]
    pub fn with_trainees(trainees: impl IntoIterator<Item = Trainee>) -> Self {
        let store = Self::new();
        for trainee in trainees {
            store.upsert(trainee);
        }
        store
    }

    /// Inserts or replaces a trainee record.
    pub fn upsert(&self, trainee: Trainee) {
        self.trainees.write().insert(trainee.id.clone(), trainee);
    }

    /// Every trainee in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Trainee> {
        self.trainees.read().values().cloned().collect()
    }
}

#[async_trait]
impl TraineeStore for InMemoryTraineeStore {
    async fn get(&self, id: &str) -> BoosterResult<Trainee> {
        self.trainees
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| BoosterError::trainee_not_found(id))
    }

    async fn update(&self, id: &str, patch: TraineePatch) -> BoosterResult<Trainee> {
        let mut trainees = self.trainees.write();
        let trainee = trainees
            .get_mut(id)
            .ok_or_else(|| BoosterError::trainee_not_found(id))?;
        patch.apply(trainee);
        Ok(trainee.clone())
    }

    async fn list_by_group(&self, group: &str) -> BoosterResult<Vec<Trainee>> {
        Ok(self
            .trainees
            .read()
            .values()
            .filter(|trainee| trainee.belongs_to(group))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixtures and failure-injecting doubles for the crate's tests.

    use std::collections::HashSet;

    use chrono::NaiveDate;
    use parking_lot::Mutex;
    use uuid::Uuid;

    use super::*;
    use crate::{calendar::WeekWindow, model::TaskStatus};

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Inserts weeks `1..=weeks` for `trainee`, anchored on `start`.
    pub async fn seeded_schedule(
        tasks: &dyn TaskStore,
        trainee: &str,
        start: NaiveDate,
        weeks: u8,
    ) -> Vec<WeeklyTask> {
        let batch = (1..=weeks)
            .map(|week| {
                let window = WeekWindow::for_week(start, week);
                WeeklyTask {
                    id: Uuid::new_v4(),
                    trainee_id: trainee.to_string(),
                    week,
                    title: format!("Week {week}"),
                    mission_text: "mission".into(),
                    tip_text: "tip".into(),
                    booster_text: "boost".into(),
                    week_start_date: window.start,
                    week_end_date: window.end,
                    status: TaskStatus::NotStarted,
                    completion_date: None,
                    notes_thread: Vec::new(),
                    is_frozen: false,
                    is_displayed_in_report: false,
                }
            })
            .collect();
        tasks.create_many(batch).await.unwrap()
    }

    /// Task store that fails every write for selected trainees.
    #[derive(Debug, Default)]
    pub struct FlakyTaskStore {
        pub inner: InMemoryTaskStore,
        failing: Mutex<HashSet<String>>,
    }

    impl FlakyTaskStore {
        pub fn fail_for(&self, trainee: &str) {
            self.failing.lock().insert(trainee.to_string());
        }

        fn check(&self, trainee: &str) -> BoosterResult<()> {
            if self.failing.lock().contains(trainee) {
                Err(BoosterError::persistence(format!(
                    "injected write failure for {trainee}"
                )))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl TaskStore for FlakyTaskStore {
        async fn list_by_trainee(&self, trainee: &str) -> BoosterResult<Vec<WeeklyTask>> {
            self.inner.list_by_trainee(trainee).await
        }

        async fn get(&self, id: TaskId) -> BoosterResult<WeeklyTask> {
            self.inner.get(id).await
        }

        async fn create(&self, task: WeeklyTask) -> BoosterResult<WeeklyTask> {
            self.check(&task.trainee_id)?;
            self.inner.create(task).await
        }

        async fn create_many(&self, tasks: Vec<WeeklyTask>) -> BoosterResult<Vec<WeeklyTask>> {
            if let Some(task) = tasks.first() {
                self.check(&task.trainee_id)?;
            }
            self.inner.create_many(tasks).await
        }

        async fn update(&self, id: TaskId, patch: TaskPatch) -> BoosterResult<WeeklyTask> {
            let task = self.inner.get(id).await?;
            self.check(&task.trainee_id)?;
            self.inner.update(id, patch).await
        }

        async fn delete(&self, id: TaskId) -> BoosterResult<()> {
            let task = self.inner.get(id).await?;
            self.check(&task.trainee_id)?;
            self.inner.delete(id).await
        }
    }
}
