use std::{
    fs,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{
    error::{BoosterError, BoosterResult},
    model::{TaskId, TaskPatch, Trainee, TraineePatch, WeeklyTask},
    store::{sorted_by_week, TaskStore, TraineeStore},
};

/// On-disk document holding trainees and their tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreDocument {
    /// Trainee records.
    #[serde(default)]
    pub trainees: Vec<Trainee>,
    /// Weekly tasks of every trainee.
    #[serde(default)]
    pub tasks: Vec<WeeklyTask>,
}

/// JSON-file backed store implementing both [`TaskStore`] and [`TraineeStore`].
///
/// Every mutation rewrites the whole document through a temporary file; the
/// in-memory copy only changes once the write succeeded.
///
/// Writes are blocking file I/O done under the document lock, so the store
/// suits the single-operator CLI and not a shared async runtime.
#[derive(Debug)]
pub struct FileBoosterStore {
    path: PathBuf,
    document: RwLock<StoreDocument>,
}

impl FileBoosterStore {
    /// Opens `path`, starting from an empty document when it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> BoosterResult<Self> {
        let path = path.into();
        let document = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|err| {
                BoosterError::persistence(format!("reading {}: {err}", path.display()))
            })?;
            serde_json::from_str(&raw).map_err(|err| {
                BoosterError::persistence(format!("parsing {}: {err}", path.display()))
            })?
        } else {
            StoreDocument::default()
        };
        Ok(Self {
            path,
            document: RwLock::new(document),
        })
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current document.
    #[must_use]
    pub fn snapshot(&self) -> StoreDocument {
        self.document.read().clone()
    }

    /// Inserts or replaces a trainee record.
    pub fn upsert_trainee(&self, trainee: Trainee) -> BoosterResult<Trainee> {
        self.mutate(|document| {
            match document.trainees.iter_mut().find(|t| t.id == trainee.id) {
                Some(existing) => *existing = trainee.clone(),
                None => document.trainees.push(trainee.clone()),
            }
            Ok(trainee)
        })
    }

    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut StoreDocument) -> BoosterResult<T>,
    ) -> BoosterResult<T> {
        let mut guard = self.document.write();
        let mut next = guard.clone();
        let output = change(&mut next)?;
        write_document(&self.path, &next)?;
        *guard = next;
        Ok(output)
    }
}

fn write_document(path: &Path, document: &StoreDocument) -> BoosterResult<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(BoosterError::persistence)?;
    }
    let data = serde_json::to_vec_pretty(document).map_err(BoosterError::persistence)?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, data)
        .and_then(|()| fs::rename(&staging, path))
        .map_err(|err| BoosterError::persistence(format!("writing {}: {err}", path.display())))
}

fn task_mut(document: &mut StoreDocument, id: TaskId) -> BoosterResult<&mut WeeklyTask> {
    document
        .tasks
        .iter_mut()
        .find(|task| task.id == id)
        .ok_or_else(|| BoosterError::task_not_found(id))
}

fn ensure_new_ids(document: &StoreDocument, batch: &[WeeklyTask]) -> BoosterResult<()> {
    match batch
        .iter()
        .find(|candidate| document.tasks.iter().any(|task| task.id == candidate.id))
    {
        Some(clash) => Err(BoosterError::persistence(format!(
            "task {} already exists",
            clash.id
        ))),
        None => Ok(()),
    }
}

#[async_trait]
impl TaskStore for FileBoosterStore {
    async fn list_by_trainee(&self, trainee: &str) -> BoosterResult<Vec<WeeklyTask>> {
        let tasks = self
            .document
            .read()
            .tasks
            .iter()
            .filter(|task| task.trainee_id == trainee)
            .cloned()
            .collect();
        Ok(sorted_by_week(tasks))
    }

    async fn get(&self, id: TaskId) -> BoosterResult<WeeklyTask> {
        self.document
            .read()
            .tasks
            .iter()
            .find(|task| task.id == id)
            .cloned()
            .ok_or_else(|| BoosterError::task_not_found(id))
    }

    async fn create(&self, task: WeeklyTask) -> BoosterResult<WeeklyTask> {
        self.mutate(|document| {
            ensure_new_ids(document, std::slice::from_ref(&task))?;
            document.tasks.push(task.clone());
            Ok(task)
        })
    }

    async fn create_many(&self, tasks: Vec<WeeklyTask>) -> BoosterResult<Vec<WeeklyTask>> {
        self.mutate(|document| {
            ensure_new_ids(document, &tasks)?;
            document.tasks.extend(tasks.iter().cloned());
            Ok(tasks)
        })
    }

    async fn update(&self, id: TaskId, patch: TaskPatch) -> BoosterResult<WeeklyTask> {
        self.mutate(|document| {
            let task = task_mut(document, id)?;
            patch.apply(task);
            Ok(task.clone())
        })
    }

    async fn delete(&self, id: TaskId) -> BoosterResult<()> {
        self.mutate(|document| {
            let before = document.tasks.len();
            document.tasks.retain(|task| task.id != id);
            if document.tasks.len() == before {
                Err(BoosterError::task_not_found(id))
            } else {
                Ok(())
            }
        })
    }
}

#[async_trait]
impl TraineeStore for FileBoosterStore {
    async fn get(&self, id: &str) -> BoosterResult<Trainee> {
        self.document
            .read()
            .trainees
            .iter()
            .find(|trainee| trainee.id == id)
            .cloned()
            .ok_or_else(|| BoosterError::trainee_not_found(id))
    }

    async fn update(&self, id: &str, patch: TraineePatch) -> BoosterResult<Trainee> {
        self.mutate(|document| {
            let trainee = document
                .trainees
                .iter_mut()
                .find(|trainee| trainee.id == id)
                .ok_or_else(|| BoosterError::trainee_not_found(id))?;
            patch.apply(trainee);
            Ok(trainee.clone())
        })
    }

    async fn list_by_group(&self, group: &str) -> BoosterResult<Vec<Trainee>> {
        Ok(self
            .document
            .read()
            .trainees
            .iter()
            .filter(|trainee| trainee.belongs_to(group))
            .cloned()
            .collect())
    }
}
