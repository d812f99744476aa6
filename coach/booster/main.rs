//! Booster runtime wiring stores, catalog, clock, notifications and telemetry.

use std::{fmt, sync::Arc};

use chrono::NaiveDate;
use serde_json::{json, Value};
use shared_logging::LogLevel;

use crate::{
    bulk::{BatchReport, BulkEngine, BulkRequest, DEFAULT_MAX_CONCURRENCY},
    calendar::{Clock, SystemClock},
    catalog::TemplateCatalog,
    config::BoosterConfig,
    error::BoosterResult,
    freeze::{FreezeController, FreezeOutcome},
    generator::ScheduleGenerator,
    model::{TaskId, TaskStatus, TemplateVariant, Trainee, WeeklyTask},
    notify::{DisabledNotifier, Notifier},
    status::{StatusChange, StatusGate},
    store::{TaskStore, TraineeStore},
    targets::{TargetResolver, TargetSpec},
    telemetry::BoosterTelemetry,
    unfreeze::{UnfreezeController, UnfreezeOutcome},
};

/// Entry point for every booster operation.
pub struct BoosterRuntime {
    tasks: Arc<dyn TaskStore>,
    trainees: Arc<dyn TraineeStore>,
    generator: ScheduleGenerator,
    unfreeze: UnfreezeController,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    max_concurrency: usize,
    telemetry: Option<BoosterTelemetry>,
}

impl fmt::Debug for BoosterRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoosterRuntime")
            .field("catalog_version", &self.generator.catalog().version())
            .field("week_start", &self.unfreeze.week_start())
            .field("max_concurrency", &self.max_concurrency)
            .field("telemetry", &self.telemetry)
            .finish_non_exhaustive()
    }
}

impl BoosterRuntime {
    /// Runtime with default settings, no notifications and the wall clock.
    #[must_use]
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        trainees: Arc<dyn TraineeStore>,
        catalog: Arc<TemplateCatalog>,
    ) -> Self {
        Self {
            tasks,
            trainees,
            generator: ScheduleGenerator::new(catalog, TemplateVariant::default()),
            unfreeze: UnfreezeController::default(),
            notifier: Arc::new(DisabledNotifier),
            clock: Arc::new(SystemClock),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            telemetry: None,
        }
    }

    /// Runtime configured from `config`, loading the catalog it names.
    pub fn from_config(
        config: &BoosterConfig,
        tasks: Arc<dyn TaskStore>,
        trainees: Arc<dyn TraineeStore>,
    ) -> anyhow::Result<Self> {
        let catalog = Arc::new(config.catalog()?);
        let mut runtime = Self::new(tasks, trainees, Arc::clone(&catalog));
        runtime.generator = ScheduleGenerator::new(catalog, config.default_variant);
        runtime.unfreeze = UnfreezeController::new(config.week_start);
        runtime.max_concurrency = config.bulk.max_concurrency.max(1);
        Ok(runtime)
    }

    /// Uses `notifier` for trainee notifications.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Uses `clock` for "today".
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attaches telemetry sinks.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: BoosterTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Sets telemetry after construction.
    pub fn set_telemetry(&mut self, telemetry: BoosterTelemetry) {
        self.telemetry = Some(telemetry);
    }

    /// Returns telemetry handle if configured.
    #[must_use]
    pub const fn telemetry(&self) -> Option<&BoosterTelemetry> {
        self.telemetry.as_ref()
    }

    /// Date the runtime considers "today".
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Replaces the trainee's schedule with 12 fresh weeks starting on `start`.
    pub async fn generate(
        &self,
        trainee_id: &str,
        start: NaiveDate,
    ) -> BoosterResult<Vec<WeeklyTask>> {
        let created = self
            .generator
            .generate(self.tasks.as_ref(), self.trainees.as_ref(), trainee_id, start)
            .await?;
        let payload = json!({
            "trainee_id": trainee_id,
            "start_date": start,
            "weeks": created.len(),
        });
        self.log(trainee_id, LogLevel::Info, "booster.generate", payload.clone());
        self.event("booster.schedule.generated", payload).await;
        Ok(created)
    }

    /// Pauses the trainee's open tasks.
    pub async fn freeze(&self, trainee_id: &str) -> BoosterResult<FreezeOutcome> {
        self.trainees.get(trainee_id).await?;
        let outcome = FreezeController.freeze(self.tasks.as_ref(), trainee_id).await?;
        let payload = json!({ "trainee_id": trainee_id, "frozen": outcome.count() });
        let level = if outcome.is_noop() {
            LogLevel::Debug
        } else {
            LogLevel::Info
        };
        self.log(trainee_id, level, "booster.freeze", payload.clone());
        self.event("booster.tasks.frozen", payload).await;
        Ok(outcome)
    }

    /// Resumes the trainee's paused tasks from `resume`.
    pub async fn unfreeze(
        &self,
        trainee_id: &str,
        resume: NaiveDate,
    ) -> BoosterResult<UnfreezeOutcome> {
        self.trainees.get(trainee_id).await?;
        let outcome = self
            .unfreeze
            .unfreeze(self.tasks.as_ref(), trainee_id, resume)
            .await?;
        let payload = json!({
            "trainee_id": trainee_id,
            "resume_date": resume,
            "unfrozen": outcome.count(),
        });
        self.log(trainee_id, LogLevel::Info, "booster.unfreeze", payload.clone());
        self.event("booster.tasks.unfrozen", payload).await;
        Ok(outcome)
    }

    /// Moves one task to `target`, stamping today's date on completion.
    pub async fn set_status(
        &self,
        task_id: TaskId,
        target: TaskStatus,
    ) -> BoosterResult<StatusChange> {
        let result = StatusGate
            .transition(self.tasks.as_ref(), task_id, target, self.today())
            .await;
        match &result {
            Ok(change) if change.changed => {
                let payload = json!({
                    "task_id": task_id,
                    "week": change.task.week,
                    "from": change.previous,
                    "to": target,
                });
                self.log(&change.task.trainee_id, LogLevel::Info, "booster.status", payload.clone());
                self.event("booster.status.changed", payload).await;
            }
            Ok(_) => {}
            Err(err) => {
                if let Some(tel) = &self.telemetry {
                    let _ = tel.log(
                        LogLevel::Warn,
                        "booster.status.rejected",
                        json!({ "task_id": task_id, "to": target, "error": err.to_string() }),
                    );
                }
            }
        }
        result
    }

    /// Wipes progress on every task of the trainee.
    pub async fn reset(&self, trainee_id: &str) -> BoosterResult<usize> {
        self.trainees.get(trainee_id).await?;
        let count = StatusGate.reset(self.tasks.as_ref(), trainee_id).await?;
        let payload = json!({ "trainee_id": trainee_id, "reset": count });
        self.log(trainee_id, LogLevel::Info, "booster.reset", payload.clone());
        self.event("booster.schedule.reset", payload).await;
        Ok(count)
    }

    /// Expands a target against the current directory.
    pub async fn resolve_targets(&self, target: &TargetSpec) -> BoosterResult<Vec<Trainee>> {
        TargetResolver::new(self.trainees.as_ref()).resolve(target).await
    }

    /// Runs a bulk request and returns its per-trainee report.
    pub async fn run_bulk(&self, request: &BulkRequest) -> BoosterResult<BatchReport> {
        let report = BulkEngine::new(self.tasks.as_ref(), self.trainees.as_ref(), &self.generator)
            .with_notifier(self.notifier.as_ref())
            .with_clock(self.clock.as_ref())
            .with_unfreeze(self.unfreeze)
            .with_max_concurrency(self.max_concurrency)
            .run(request)
            .await?;
        for success in &report.succeeded {
            self.log(
                &success.trainee_id,
                LogLevel::Info,
                "booster.bulk.applied",
                json!({ "operation": report.operation, "tasks_affected": success.tasks_affected }),
            );
        }
        for failure in &report.failed {
            self.log(
                &failure.trainee_id,
                LogLevel::Warn,
                "booster.bulk.failure",
                json!({ "operation": report.operation, "kind": failure.kind, "error": failure.error }),
            );
        }
        let payload = json!({
            "operation": report.operation,
            "succeeded": report.succeeded.len(),
            "failed": report.failed.len(),
            "notifications_sent": report.notifications_sent,
            "notification_failures": report.notification_failures,
        });
        if let Some(tel) = &self.telemetry {
            let _ = tel.log(LogLevel::Info, "booster.bulk.complete", payload.clone());
        }
        self.event("booster.bulk.completed", payload).await;
        Ok(report)
    }

    /// Every task of the trainee in week order.
    pub async fn tasks_for(&self, trainee_id: &str) -> BoosterResult<Vec<WeeklyTask>> {
        self.trainees.get(trainee_id).await?;
        self.tasks.list_by_trainee(trainee_id).await
    }

    /// The trainee's current week, if any task is active today.
    pub async fn active_task(&self, trainee_id: &str) -> BoosterResult<Option<WeeklyTask>> {
        let today = self.today();
        Ok(self
            .tasks_for(trainee_id)
            .await?
            .into_iter()
            .find(|task| task.is_active_on(today)))
    }

    fn log(&self, subject: &str, level: LogLevel, message: &str, metadata: Value) {
        if let Some(tel) = &self.telemetry {
            let _ = tel.log_for(subject, level, message, metadata);
        }
    }

    async fn event(&self, event_type: &str, payload: Value) {
        if let Some(tel) = &self.telemetry {
            let _ = tel.event(event_type, payload).await;
        }
    }
}
