use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use uuid::Uuid;

use crate::{
    calendar::{WeekWindow, PROGRAM_WEEKS},
    catalog::TemplateCatalog,
    error::{BoosterError, BoosterResult},
    model::{BoosterStatus, TaskStatus, TemplateVariant, Trainee, TraineePatch, WeeklyTask},
    store::{TaskStore, TraineeStore},
};

/// Builds weekly task sets from the template catalog.
#[derive(Debug, Clone)]
pub struct ScheduleGenerator {
    catalog: Arc<TemplateCatalog>,
    default_variant: TemplateVariant,
}

impl ScheduleGenerator {
    /// Creates a generator; `default_variant` applies when gender is absent or unknown.
    #[must_use]
    pub fn new(catalog: Arc<TemplateCatalog>, default_variant: TemplateVariant) -> Self {
        Self {
            catalog,
            default_variant,
        }
    }

    /// Catalog in use.
    #[must_use]
    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    /// Fresh task for `week` of `trainee` occupying `window`.
    pub fn build_task(
        &self,
        trainee: &Trainee,
        week: u8,
        window: WeekWindow,
    ) -> BoosterResult<WeeklyTask> {
        let variant = TemplateVariant::from_gender(trainee.gender.as_deref(), self.default_variant);
        let template = self.catalog.template(variant, week)?;
        Ok(WeeklyTask {
            id: Uuid::new_v4(),
            trainee_id: trainee.id.clone(),
            week,
            title: template.title.clone(),
            mission_text: template.mission_text.clone(),
            tip_text: template.tip_text.clone(),
            booster_text: template.booster_text.clone(),
            week_start_date: window.start,
            week_end_date: window.end,
            status: TaskStatus::NotStarted,
            completion_date: None,
            notes_thread: Vec::new(),
            is_frozen: false,
            is_displayed_in_report: false,
        })
    }

    /// The full 12-week program for `trainee` starting on `start`, without touching any store.
    pub fn build_schedule(
        &self,
        trainee: &Trainee,
        start: NaiveDate,
    ) -> BoosterResult<Vec<WeeklyTask>> {
        (1..=PROGRAM_WEEKS)
            .map(|week| self.build_task(trainee, week, WeekWindow::for_week(start, week)))
            .collect()
    }

    /// Replaces the trainee's schedule with a fresh 12-week set starting on `start`.
    ///
    /// Destroys status and notes of the previous set. The trainee record is
    /// updated to `in_progress` with the new start date.
    pub async fn generate(
        &self,
        tasks: &dyn TaskStore,
        trainees: &dyn TraineeStore,
        trainee_id: &str,
        start: NaiveDate,
    ) -> BoosterResult<Vec<WeeklyTask>> {
        let trainee = trainees.get(trainee_id).await?;
        let schedule = self.build_schedule(&trainee, start)?;
        for existing in tasks.list_by_trainee(trainee_id).await? {
            tasks.delete(existing.id).await?;
        }
        let created = tasks.create_many(schedule).await?;
        trainees
            .update(
                trainee_id,
                TraineePatch {
                    booster_status: Some(BoosterStatus::InProgress),
                    booster_start_date: Some(Some(start)),
                    ..TraineePatch::default()
                },
            )
            .await?;
        Ok(created)
    }

    /// Adds tasks for the requested `weeks` without removing existing ones.
    ///
    /// Windows are anchored on the trainee's start date (or `today` when it has
    /// none) shifted by `week_offset` weeks. If any requested week already
    /// exists for the trainee nothing is inserted. An offset that leaves the
    /// calendar is a validation error.
    pub async fn assign_weeks(
        &self,
        tasks: &dyn TaskStore,
        trainee: &Trainee,
        weeks: &[u8],
        week_offset: i64,
        today: NaiveDate,
    ) -> BoosterResult<Vec<WeeklyTask>> {
        let existing = tasks.list_by_trainee(&trainee.id).await?;
        if let Some(week) = weeks
            .iter()
            .copied()
            .find(|week| existing.iter().any(|task| task.week == *week))
        {
            return Err(BoosterError::DuplicateWeek {
                trainee: trainee.id.clone(),
                week,
            });
        }
        let base = trainee.booster_start_date.unwrap_or(today);
        let anchor = Duration::try_weeks(week_offset)
            .and_then(|shift| base.checked_add_signed(shift))
            .filter(|anchor| {
                anchor
                    .checked_add_signed(Duration::weeks(i64::from(PROGRAM_WEEKS)))
                    .is_some()
            })
            .ok_or_else(|| {
                BoosterError::validation(format!(
                    "week offset {week_offset} moves {base} out of the calendar"
                ))
            })?;
        let batch = weeks
            .iter()
            .map(|&week| self.build_task(trainee, week, WeekWindow::for_week(anchor, week)))
            .collect::<BoosterResult<Vec<_>>>()?;
        tasks.create_many(batch).await
    }
}
