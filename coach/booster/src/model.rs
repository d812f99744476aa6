use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable trainee identifier (usually an email address).
pub type TraineeId = String;

/// Store-assigned weekly task identifier.
pub type TaskId = Uuid;

/// Template content set a trainee receives.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum TemplateVariant {
    /// Content written for female trainees.
    #[default]
    Female,
    /// Content written for male trainees.
    Male,
}

impl TemplateVariant {
    /// Lower-case label used in configuration and logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Female => "female",
            Self::Male => "male",
        }
    }

    /// Picks the variant for a free-form gender attribute.
    ///
    /// Absent or unrecognized values fall back to `fallback`.
    #[must_use]
    pub fn from_gender(gender: Option<&str>, fallback: Self) -> Self {
        gender
            .and_then(|value| value.parse().ok())
            .unwrap_or(fallback)
    }
}

impl fmt::Display for TemplateVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TemplateVariant {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "female" | "f" | "woman" | "women" => Ok(Self::Female),
            "male" | "m" | "man" | "men" => Ok(Self::Male),
            other => Err(format!("unknown template variant `{other}`")),
        }
    }
}

/// Program-level state stored on the trainee record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BoosterStatus {
    /// No schedule has been generated yet.
    #[default]
    NotStarted,
    /// A schedule exists.
    InProgress,
}

/// Status of a single weekly task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Untouched.
    #[default]
    NotStarted,
    /// Opened by the trainee.
    InProgress,
    /// Done; carries a completion date.
    Completed,
}

impl TaskStatus {
    /// Snake-case label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" | "done" => Ok(Self::Completed),
            other => Err(format!("unknown task status `{other}`")),
        }
    }
}

/// Trainee-authored note on a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Note {
    /// Free text.
    pub text: String,
    /// When the note was written.
    pub timestamp: DateTime<Utc>,
}

/// Trainee as seen by the scheduler. Owned by the identity store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Trainee {
    /// Stable identifier.
    pub id: TraineeId,
    /// Free-form gender attribute; selects the template variant.
    #[serde(default)]
    pub gender: Option<String>,
    /// Groups the trainee belongs to.
    #[serde(default)]
    pub groups: Vec<String>,
    /// Whether the booster program is switched on.
    #[serde(default)]
    pub booster_enabled: bool,
    /// Whether the trainee app shows the booster section.
    #[serde(default)]
    pub booster_unlocked: bool,
    /// Program state.
    #[serde(default)]
    pub booster_status: BoosterStatus,
    /// Start date of the current schedule.
    #[serde(default)]
    pub booster_start_date: Option<NaiveDate>,
}

impl Trainee {
    /// New trainee with the booster switched off.
    #[must_use]
    pub fn new(id: impl Into<TraineeId>) -> Self {
        Self {
            id: id.into(),
            gender: None,
            groups: Vec::new(),
            booster_enabled: false,
            booster_unlocked: false,
            booster_status: BoosterStatus::NotStarted,
            booster_start_date: None,
        }
    }

    /// Sets the gender attribute.
    #[must_use]
    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    /// Adds a group membership.
    #[must_use]
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        let group = group.into();
        if !self.belongs_to(&group) {
            self.groups.push(group);
        }
        self
    }

    /// Sets the booster start date.
    #[must_use]
    pub const fn with_start_date(mut self, start: NaiveDate) -> Self {
        self.booster_start_date = Some(start);
        self
    }

    /// True when the trainee is a member of `group`.
    #[must_use]
    pub fn belongs_to(&self, group: &str) -> bool {
        self.groups.iter().any(|candidate| candidate == group)
    }
}

/// One week of a trainee's booster program.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeeklyTask {
    /// Task identifier.
    pub id: TaskId,
    /// Owning trainee.
    pub trainee_id: TraineeId,
    /// Week number, 1..=12.
    pub week: u8,
    /// Mission title.
    pub title: String,
    /// Mission body.
    pub mission_text: String,
    /// Practical tip.
    pub tip_text: String,
    /// Motivational text.
    pub booster_text: String,
    /// First day of the active window.
    pub week_start_date: NaiveDate,
    /// Last day of the active window (start + 6 days).
    pub week_end_date: NaiveDate,
    /// Completion state.
    #[serde(default)]
    pub status: TaskStatus,
    /// Set while `status == completed`.
    #[serde(default)]
    pub completion_date: Option<NaiveDate>,
    /// Append-only trainee notes.
    #[serde(default)]
    pub notes_thread: Vec<Note>,
    /// Paused; the window is stale until unfrozen.
    #[serde(default)]
    pub is_frozen: bool,
    /// Owned by the reporting side.
    #[serde(default)]
    pub is_displayed_in_report: bool,
}

impl WeeklyTask {
    /// True when the task is the trainee's current week on `date`.
    ///
    /// Frozen tasks are never active.
    #[must_use]
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        !self.is_frozen && self.week_start_date <= date && date <= self.week_end_date
    }

    /// True when the task is done.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

/// Field-level update applied to a stored task.
///
/// `None` leaves a field untouched. `completion_date: Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    /// New status.
    pub status: Option<TaskStatus>,
    /// New completion date.
    pub completion_date: Option<Option<NaiveDate>>,
    /// Replacement notes thread.
    pub notes_thread: Option<Vec<Note>>,
    /// New pause flag.
    pub is_frozen: Option<bool>,
    /// New window start.
    pub week_start_date: Option<NaiveDate>,
    /// New window end.
    pub week_end_date: Option<NaiveDate>,
    /// New report flag.
    pub is_displayed_in_report: Option<bool>,
}

impl TaskPatch {
    /// Patch that only toggles the pause flag.
    #[must_use]
    pub fn frozen(is_frozen: bool) -> Self {
        Self {
            is_frozen: Some(is_frozen),
            ..Self::default()
        }
    }

    /// Writes the patch into `task`.
    pub fn apply(&self, task: &mut WeeklyTask) {
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(completion) = self.completion_date {
            task.completion_date = completion;
        }
        if let Some(notes) = &self.notes_thread {
            task.notes_thread.clone_from(notes);
        }
        if let Some(frozen) = self.is_frozen {
            task.is_frozen = frozen;
        }
        if let Some(start) = self.week_start_date {
            task.week_start_date = start;
        }
        if let Some(end) = self.week_end_date {
            task.week_end_date = end;
        }
        if let Some(displayed) = self.is_displayed_in_report {
            task.is_displayed_in_report = displayed;
        }
    }

    /// True when the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Field-level update applied to a trainee record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraineePatch {
    /// New enabled flag.
    pub booster_enabled: Option<bool>,
    /// New unlocked flag.
    pub booster_unlocked: Option<bool>,
    /// New program state.
    pub booster_status: Option<BoosterStatus>,
    /// New start date (`Some(None)` clears it).
    pub booster_start_date: Option<Option<NaiveDate>>,
}

impl TraineePatch {
    /// Writes the patch into `trainee`.
    pub fn apply(&self, trainee: &mut Trainee) {
        if let Some(enabled) = self.booster_enabled {
            trainee.booster_enabled = enabled;
        }
        if let Some(unlocked) = self.booster_unlocked {
            trainee.booster_unlocked = unlocked;
        }
        if let Some(status) = self.booster_status {
            trainee.booster_status = status;
        }
        if let Some(start) = self.booster_start_date {
            trainee.booster_start_date = start;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn task() -> WeeklyTask {
        WeeklyTask {
            id: Uuid::new_v4(),
            trainee_id: "ana@example.com".into(),
            week: 1,
            title: "t".into(),
            mission_text: "m".into(),
            tip_text: "tip".into(),
            booster_text: "b".into(),
            week_start_date: date(2024, 1, 7),
            week_end_date: date(2024, 1, 13),
            status: TaskStatus::NotStarted,
            completion_date: None,
            notes_thread: Vec::new(),
            is_frozen: false,
            is_displayed_in_report: false,
        }
    }

    #[test]
    fn gender_selects_variant_with_fallback() {
        assert_eq!(
            TemplateVariant::from_gender(Some("Male"), TemplateVariant::Female),
            TemplateVariant::Male
        );
        assert_eq!(
            TemplateVariant::from_gender(Some("non-binary"), TemplateVariant::Female),
            TemplateVariant::Female
        );
        assert_eq!(
            TemplateVariant::from_gender(None, TemplateVariant::Male),
            TemplateVariant::Male
        );
        assert_eq!(TemplateVariant::default(), TemplateVariant::Female);
    }

    #[test]
    fn frozen_task_is_never_active() {
        let mut task = task();
        assert!(task.is_active_on(date(2024, 1, 10)));
        assert!(!task.is_active_on(date(2024, 1, 14)));
        task.is_frozen = true;
        assert!(!task.is_active_on(date(2024, 1, 10)));
    }

    #[test]
    fn patch_clears_completion_date() {
        let mut task = task();
        task.status = TaskStatus::Completed;
        task.completion_date = Some(date(2024, 1, 9));
        let patch = TaskPatch {
            status: Some(TaskStatus::NotStarted),
            completion_date: Some(None),
            ..TaskPatch::default()
        };
        patch.apply(&mut task);
        assert_eq!(task.status, TaskStatus::NotStarted);
        assert!(task.completion_date.is_none());
        assert!(TaskPatch::default().is_empty());
    }

    #[test]
    fn task_serializes_dates_as_iso() {
        let json = serde_json::to_value(task()).unwrap();
        assert_eq!(json["week_start_date"], "2024-01-07");
        assert_eq!(json["status"], "not_started");
    }

    #[test]
    fn status_parses_cli_spellings() {
        assert_eq!("in-progress".parse::<TaskStatus>(), Ok(TaskStatus::InProgress));
        assert_eq!("done".parse::<TaskStatus>(), Ok(TaskStatus::Completed));
        assert!("paused".parse::<TaskStatus>().is_err());
    }
}
