use chrono::NaiveDate;
use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::{
    calendar::{Clock, SystemClock, PROGRAM_WEEKS},
    error::{BoosterError, BoosterResult},
    freeze::FreezeController,
    generator::ScheduleGenerator,
    model::{Trainee, TraineeId, TraineePatch},
    notify::{DisabledNotifier, NotificationKind, Notifier},
    status::StatusGate,
    store::{TaskStore, TraineeStore},
    targets::{TargetResolver, TargetSpec},
    unfreeze::UnfreezeController,
};

/// Concurrency used when none is configured.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Largest shift, in weeks either way, accepted for assigned weeks.
pub const MAX_WEEK_OFFSET: i64 = 520;

/// Operation applied to every resolved trainee.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum BulkOperation {
    /// Replace the schedule. Without a date the trainee's own start date is used.
    Generate {
        /// Week 1 start.
        #[serde(default)]
        start_date: Option<NaiveDate>,
    },
    /// Switch the program on; generates a schedule when the trainee has none.
    Enable,
    /// Switch the program off. Tasks are kept.
    Disable,
    /// Wipe progress on every task.
    Reset,
    /// Pause open tasks.
    Freeze,
    /// Resume paused tasks from `resume_date`.
    Unfreeze {
        /// Day the schedule picks up again.
        resume_date: NaiveDate,
    },
    /// Add individual weeks without touching existing tasks.
    AssignWeeks {
        /// Weeks to create.
        weeks: Vec<u8>,
        /// Whole weeks to shift the anchor by.
        #[serde(default)]
        week_offset: i64,
    },
}

impl BulkOperation {
    /// Snake-case label used in reports and logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Generate { .. } => "generate",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Reset => "reset",
            Self::Freeze => "freeze",
            Self::Unfreeze { .. } => "unfreeze",
            Self::AssignWeeks { .. } => "assign_weeks",
        }
    }

    /// Notification sent to a trainee after the operation succeeded for them.
    #[must_use]
    pub const fn notification(&self) -> NotificationKind {
        match self {
            Self::Generate { .. } => NotificationKind::ScheduleGenerated,
            Self::Enable => NotificationKind::BoosterEnabled,
            Self::Disable => NotificationKind::BoosterDisabled,
            Self::Reset => NotificationKind::ScheduleReset,
            Self::Freeze => NotificationKind::TasksFrozen,
            Self::Unfreeze { .. } => NotificationKind::TasksResumed,
            Self::AssignWeeks { .. } => NotificationKind::WeeksAssigned,
        }
    }

    /// Checks arguments and returns the operation with assigned weeks sorted and de-duplicated.
    pub fn validate(self) -> BoosterResult<Self> {
        match self {
            Self::AssignWeeks { mut weeks, week_offset } => {
                if weeks.is_empty() {
                    return Err(BoosterError::validation("no weeks selected"));
                }
                if let Some(week) = weeks
                    .iter()
                    .find(|week| !(1..=PROGRAM_WEEKS).contains(*week))
                {
                    return Err(BoosterError::validation(format!(
                        "week {week} is outside 1..={PROGRAM_WEEKS}"
                    )));
                }
                if !(-MAX_WEEK_OFFSET..=MAX_WEEK_OFFSET).contains(&week_offset) {
                    return Err(BoosterError::validation(format!(
                        "week offset {week_offset} is outside -{MAX_WEEK_OFFSET}..={MAX_WEEK_OFFSET}"
                    )));
                }
                weeks.sort_unstable();
                weeks.dedup();
                Ok(Self::AssignWeeks { weeks, week_offset })
            }
            other => Ok(other),
        }
    }
}

/// A target plus the operation to run on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkRequest {
    /// Who to apply the operation to.
    pub target: TargetSpec,
    /// What to do.
    pub operation: BulkOperation,
    /// Notify trainees after success. `enable` always notifies.
    #[serde(default)]
    pub notify: bool,
}

impl BulkRequest {
    /// Request without notifications.
    #[must_use]
    pub const fn new(target: TargetSpec, operation: BulkOperation) -> Self {
        Self {
            target,
            operation,
            notify: false,
        }
    }

    /// Sets the notify flag.
    #[must_use]
    pub const fn with_notify(mut self, notify: bool) -> Self {
        self.notify = notify;
        self
    }

    fn wants_notification(&self) -> bool {
        self.notify || matches!(self.operation, BulkOperation::Enable)
    }
}

/// Trainee the operation succeeded for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TraineeSuccess {
    /// Trainee identifier.
    pub trainee_id: TraineeId,
    /// Tasks created or changed.
    pub tasks_affected: usize,
}

/// Trainee the operation failed for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TraineeFailure {
    /// Trainee identifier.
    pub trainee_id: TraineeId,
    /// Error kind, see [`BoosterError::kind`].
    pub kind: String,
    /// Rendered error.
    pub error: String,
}

/// Per-trainee breakdown of a bulk run, in resolution order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchReport {
    /// Operation label.
    pub operation: String,
    /// Trainees the operation succeeded for.
    pub succeeded: Vec<TraineeSuccess>,
    /// Trainees the operation failed for.
    pub failed: Vec<TraineeFailure>,
    /// Notifications dispatched.
    pub notifications_sent: usize,
    /// Notifications that failed; these never fail the trainee.
    pub notification_failures: usize,
}

impl BatchReport {
    fn empty(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            succeeded: Vec::new(),
            failed: Vec::new(),
            notifications_sent: 0,
            notification_failures: 0,
        }
    }

    /// Trainees processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// True when no trainee failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// `Ok` for a clean report, [`BoosterError::PartialBatchFailure`] otherwise.
    pub fn into_result(self) -> BoosterResult<Self> {
        if self.is_clean() {
            Ok(self)
        } else {
            Err(BoosterError::PartialBatchFailure(Box::new(self)))
        }
    }
}

struct TraineeStep {
    trainee_id: TraineeId,
    result: BoosterResult<usize>,
    notification: Option<BoosterResult<()>>,
}

/// Applies one operation across a resolved trainee set.
///
/// Trainees are independent: a failure is recorded and the run continues.
pub struct BulkEngine<'a> {
    tasks: &'a dyn TaskStore,
    trainees: &'a dyn TraineeStore,
    generator: &'a ScheduleGenerator,
    notifier: &'a dyn Notifier,
    clock: &'a dyn Clock,
    unfreeze: UnfreezeController,
    max_concurrency: usize,
}

impl<'a> BulkEngine<'a> {
    /// Engine with no notifications, the wall clock and default settings.
    #[must_use]
    pub fn new(
        tasks: &'a dyn TaskStore,
        trainees: &'a dyn TraineeStore,
        generator: &'a ScheduleGenerator,
    ) -> Self {
        Self {
            tasks,
            trainees,
            generator,
            notifier: &DisabledNotifier,
            clock: &SystemClock,
            unfreeze: UnfreezeController::default(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Uses `notifier` for trainee notifications.
    #[must_use]
    pub fn with_notifier(mut self, notifier: &'a dyn Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Uses `clock` for "today".
    #[must_use]
    pub fn with_clock(mut self, clock: &'a dyn Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Uses `unfreeze` to re-date resumed tasks.
    #[must_use]
    pub const fn with_unfreeze(mut self, unfreeze: UnfreezeController) -> Self {
        self.unfreeze = unfreeze;
        self
    }

    /// Trainees processed at once; `0` restores the default, `1` is sequential.
    #[must_use]
    pub const fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = if max_concurrency == 0 {
            DEFAULT_MAX_CONCURRENCY
        } else {
            max_concurrency
        };
        self
    }

    /// Resolves the target and applies the operation to every trainee.
    ///
    /// Invalid arguments and unresolvable targets fail before any write. The
    /// returned report may contain failures; see [`BatchReport::into_result`].
    #[instrument(skip_all, fields(operation = request.operation.label()))]
    pub async fn run(&self, request: &BulkRequest) -> BoosterResult<BatchReport> {
        let operation = request.operation.clone().validate()?;
        let targets = TargetResolver::new(self.trainees)
            .resolve(&request.target)
            .await?;
        let notify = request.wants_notification();

        let steps: Vec<TraineeStep> = stream::iter(targets.iter())
            .map(|trainee| self.step(trainee, &operation, notify))
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut report = BatchReport::empty(operation.label());
        for step in steps {
            match step.result {
                Ok(tasks_affected) => report.succeeded.push(TraineeSuccess {
                    trainee_id: step.trainee_id.clone(),
                    tasks_affected,
                }),
                Err(err) => {
                    warn!(trainee = %step.trainee_id, kind = err.kind(), "bulk step failed: {err}");
                    report.failed.push(TraineeFailure {
                        trainee_id: step.trainee_id.clone(),
                        kind: err.kind().to_string(),
                        error: err.to_string(),
                    });
                }
            }
            match step.notification {
                Some(Ok(())) => report.notifications_sent += 1,
                Some(Err(err)) => {
                    warn!(trainee = %step.trainee_id, "notification failed: {err}");
                    report.notification_failures += 1;
                }
                None => {}
            }
        }
        Ok(report)
    }

    async fn step(&self, trainee: &Trainee, operation: &BulkOperation, notify: bool) -> TraineeStep {
        let result = self.apply(trainee, operation).await;
        let notification = if notify && result.is_ok() {
            Some(self.notifier.notify(trainee, operation.notification()).await)
        } else {
            None
        };
        TraineeStep {
            trainee_id: trainee.id.clone(),
            result,
            notification,
        }
    }

    async fn apply(&self, trainee: &Trainee, operation: &BulkOperation) -> BoosterResult<usize> {
        let today = self.clock.today();
        match operation {
            BulkOperation::Generate { start_date } => {
                let start = start_date.or(trainee.booster_start_date).ok_or_else(|| {
                    BoosterError::validation(format!(
                        "{} has no booster start date; pass one explicitly",
                        trainee.id
                    ))
                })?;
                self.generate(trainee, start).await
            }
            BulkOperation::Enable => {
                self.trainees
                    .update(
                        &trainee.id,
                        TraineePatch {
                            booster_enabled: Some(true),
                            booster_unlocked: Some(true),
                            ..TraineePatch::default()
                        },
                    )
                    .await?;
                if self.tasks.list_by_trainee(&trainee.id).await?.is_empty() {
                    self.generate(trainee, trainee.booster_start_date.unwrap_or(today))
                        .await
                } else {
                    Ok(0)
                }
            }
            BulkOperation::Disable => {
                self.trainees
                    .update(
                        &trainee.id,
                        TraineePatch {
                            booster_enabled: Some(false),
                            booster_unlocked: Some(false),
                            ..TraineePatch::default()
                        },
                    )
                    .await?;
                Ok(0)
            }
            BulkOperation::Reset => StatusGate.reset(self.tasks, &trainee.id).await,
            BulkOperation::Freeze => Ok(FreezeController
                .freeze(self.tasks, &trainee.id)
                .await?
                .count()),
            BulkOperation::Unfreeze { resume_date } => Ok(self
                .unfreeze
                .unfreeze(self.tasks, &trainee.id, *resume_date)
                .await?
                .count()),
            BulkOperation::AssignWeeks { weeks, week_offset } => Ok(self
                .generator
                .assign_weeks(self.tasks, trainee, weeks, *week_offset, today)
                .await?
                .len()),
        }
    }

    async fn generate(&self, trainee: &Trainee, start: NaiveDate) -> BoosterResult<usize> {
        Ok(self
            .generator
            .generate(self.tasks, self.trainees, &trainee.id, start)
            .await?
            .len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        calendar::FixedClock,
        catalog::TemplateCatalog,
        model::TemplateVariant,
        notify::test_support::RecordingNotifier,
        store::{
            test_support::{date, seeded_schedule, FlakyTaskStore},
            InMemoryTaskStore, InMemoryTraineeStore,
        },
    };

    fn generator() -> ScheduleGenerator {
        ScheduleGenerator::new(
            Arc::new(TemplateCatalog::embedded().unwrap()),
            TemplateVariant::Female,
        )
    }

    fn spring(count: usize) -> InMemoryTraineeStore {
        InMemoryTraineeStore::with_trainees(
            (0..count).map(|n| Trainee::new(format!("t{n}@example.com")).in_group("spring")),
        )
    }

    #[tokio::test]
    async fn partial_failure_keeps_going() {
        let tasks = FlakyTaskStore::default();
        tasks.fail_for("t1@example.com");
        let trainees = spring(3);
        let generator = generator();
        let engine = BulkEngine::new(&tasks, &trainees, &generator).with_max_concurrency(1);
        let request = BulkRequest::new(
            TargetSpec::group("spring"),
            BulkOperation::Generate {
                start_date: Some(date(2024, 1, 7)),
            },
        );

        let report = engine.run(&request).await.unwrap();
        assert_eq!(report.total(), 3);
        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(report.failed[0].trainee_id, "t1@example.com");
        assert_eq!(report.failed[0].kind, "persistence");
        assert_eq!(tasks.inner.len(), 24);

        match report.into_result().unwrap_err() {
            BoosterError::PartialBatchFailure(report) => assert_eq!(report.failed.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn generate_without_any_start_date_fails_that_trainee() {
        let tasks = InMemoryTaskStore::new();
        let trainees = InMemoryTraineeStore::with_trainees([
            Trainee::new("ana").in_group("g").with_start_date(date(2024, 1, 7)),
            Trainee::new("ben").in_group("g"),
        ]);
        let generator = generator();
        let report = BulkEngine::new(&tasks, &trainees, &generator)
            .run(&BulkRequest::new(
                TargetSpec::group("g"),
                BulkOperation::Generate { start_date: None },
            ))
            .await
            .unwrap();
        assert_eq!(report.succeeded[0].trainee_id, "ana");
        assert_eq!(report.succeeded[0].tasks_affected, 12);
        assert_eq!(report.failed[0].kind, "validation");
    }

    #[tokio::test]
    async fn enable_generates_only_for_trainees_without_tasks() {
        let tasks = InMemoryTaskStore::new();
        let trainees = InMemoryTraineeStore::with_trainees([
            Trainee::new("ana").in_group("g"),
            Trainee::new("ben").in_group("g").with_start_date(date(2024, 1, 7)),
        ]);
        let existing = seeded_schedule(&tasks, "ben", date(2024, 1, 7), 12).await;
        let generator = generator();
        let notifier = RecordingNotifier::default();
        let clock = FixedClock::on(date(2024, 5, 5));

        let report = BulkEngine::new(&tasks, &trainees, &generator)
            .with_notifier(&notifier)
            .with_clock(&clock)
            .run(&BulkRequest::new(TargetSpec::group("g"), BulkOperation::Enable))
            .await
            .unwrap()
            .into_result()
            .unwrap();

        assert_eq!(report.succeeded[0].tasks_affected, 12);
        assert_eq!(report.succeeded[1].tasks_affected, 0);
        let ana = tasks.list_by_trainee("ana").await.unwrap();
        assert_eq!(ana[0].week_start_date, date(2024, 5, 5));
        assert_eq!(tasks.list_by_trainee("ben").await.unwrap(), existing);
        for id in ["ana", "ben"] {
            let trainee = trainees.get(id).await.unwrap();
            assert!(trainee.booster_enabled && trainee.booster_unlocked);
        }
        assert_eq!(report.notifications_sent, 2);
        assert_eq!(notifier.sent.lock().len(), 2);
    }

    #[tokio::test]
    async fn notification_failures_are_counted_not_fatal() {
        let tasks = InMemoryTaskStore::new();
        let trainees = spring(3);
        let generator = generator();
        let notifier = RecordingNotifier::failing_for(&["t2@example.com"]);
        let report = BulkEngine::new(&tasks, &trainees, &generator)
            .with_notifier(&notifier)
            .with_clock(&FixedClock::on(date(2024, 5, 5)))
            .run(&BulkRequest::new(TargetSpec::group("spring"), BulkOperation::Enable))
            .await
            .unwrap();
        assert!(report.is_clean());
        assert_eq!(report.notifications_sent, 2);
        assert_eq!(report.notification_failures, 1);
    }

    #[tokio::test]
    async fn notify_flag_controls_other_operations() {
        let tasks = InMemoryTaskStore::new();
        let trainees = spring(2);
        let generator = generator();
        let notifier = RecordingNotifier::default();
        let engine = BulkEngine::new(&tasks, &trainees, &generator).with_notifier(&notifier);

        let quiet = engine
            .run(&BulkRequest::new(TargetSpec::group("spring"), BulkOperation::Freeze))
            .await
            .unwrap();
        assert_eq!(quiet.notifications_sent, 0);

        let loud = engine
            .run(&BulkRequest::new(TargetSpec::group("spring"), BulkOperation::Reset).with_notify(true))
            .await
            .unwrap();
        assert_eq!(loud.notifications_sent, 2);
        assert!(notifier
            .sent
            .lock()
            .iter()
            .all(|(_, kind)| *kind == NotificationKind::ScheduleReset));
    }

    #[tokio::test]
    async fn assign_weeks_across_group_anchors_missing_start_dates_on_today() {
        let tasks = InMemoryTaskStore::new();
        let trainees = InMemoryTraineeStore::with_trainees((0..10).map(|n| {
            let trainee = Trainee::new(format!("t{n}")).in_group("cohort");
            if n < 2 {
                trainee
            } else {
                trainee.with_start_date(date(2024, 1, 7))
            }
        }));
        let generator = generator();
        let today = date(2024, 5, 1);
        let clock = FixedClock::on(today);
        let report = BulkEngine::new(&tasks, &trainees, &generator)
            .with_clock(&clock)
            .run(&BulkRequest::new(
                TargetSpec::group("cohort"),
                BulkOperation::AssignWeeks {
                    weeks: vec![5, 3, 5],
                    week_offset: 0,
                },
            ))
            .await
            .unwrap();

        assert_eq!(report.succeeded.len(), 10);
        assert!(report.succeeded.iter().all(|s| s.tasks_affected == 2));
        let fresh = tasks.list_by_trainee("t0").await.unwrap();
        assert_eq!(fresh[0].week, 3);
        assert_eq!(fresh[0].week_start_date, date(2024, 5, 15));
        let started = tasks.list_by_trainee("t5").await.unwrap();
        assert_eq!(started[1].week, 5);
        assert_eq!(started[1].week_start_date, date(2024, 2, 4));
    }

    #[tokio::test]
    async fn bad_arguments_fail_before_any_write() {
        let tasks = InMemoryTaskStore::new();
        let trainees = spring(2);
        let generator = generator();
        let engine = BulkEngine::new(&tasks, &trainees, &generator);
        for weeks in [vec![], vec![0], vec![13]] {
            let err = engine
                .run(&BulkRequest::new(
                    TargetSpec::group("spring"),
                    BulkOperation::AssignWeeks { weeks, week_offset: 0 },
                ))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "validation");
        }
        let err = engine
            .run(&BulkRequest::new(TargetSpec::trainee("ghost"), BulkOperation::Freeze))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn empty_target_fails_the_whole_request() {
        let tasks = InMemoryTaskStore::new();
        let trainees = spring(2);
        let generator = generator();
        let engine = BulkEngine::new(&tasks, &trainees, &generator);
        for target in [
            TargetSpec::group("winter"),
            TargetSpec::group_members("spring", ["ghost@example.com"]),
        ] {
            let err = engine
                .run(&BulkRequest::new(target, BulkOperation::Freeze))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "validation");
        }
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn out_of_range_week_offset_is_rejected_up_front() {
        let tasks = InMemoryTaskStore::new();
        let trainees = spring(2);
        let generator = generator();
        let engine = BulkEngine::new(&tasks, &trainees, &generator);
        for week_offset in [MAX_WEEK_OFFSET + 1, -100_000_000, i64::MIN] {
            let err = engine
                .run(&BulkRequest::new(
                    TargetSpec::group("spring"),
                    BulkOperation::AssignWeeks {
                        weeks: vec![3],
                        week_offset,
                    },
                ))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "validation");
        }
        assert!(tasks.is_empty());

        let report = engine
            .run(&BulkRequest::new(
                TargetSpec::group("spring"),
                BulkOperation::AssignWeeks {
                    weeks: vec![3],
                    week_offset: -MAX_WEEK_OFFSET,
                },
            ))
            .await
            .unwrap();
        assert_eq!(report.succeeded.len(), 2);
    }

    #[test]
    fn operation_serializes_with_tag() {
        let op: BulkOperation =
            serde_json::from_str(r#"{"operation":"unfreeze","resume_date":"2024-06-10"}"#).unwrap();
        assert_eq!(
            op,
            BulkOperation::Unfreeze {
                resume_date: date(2024, 6, 10)
            }
        );
        assert_eq!(op.label(), "unfreeze");
    }
}
