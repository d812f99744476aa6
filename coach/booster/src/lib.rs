#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Booster scheduling core: the 12-week mission program, freeze/unfreeze of
//! paused schedules, status gating and bulk operations across trainee groups.

/// Bulk assignment engine and batch reports.
pub mod bulk;
/// Week boundaries, windows and the injected clock.
pub mod calendar;
/// Versioned mission template catalog.
pub mod catalog;
/// TOML configuration.
pub mod config;
/// Error kinds.
pub mod error;
/// JSON-file backed store.
pub mod file_store;
/// Pausing open tasks.
pub mod freeze;
/// 12-week schedule generation and week assignment.
pub mod generator;
/// Trainees, weekly tasks and patches.
pub mod model;
/// Trainee notifications.
pub mod notify;
/// Task status transitions and full reset.
pub mod status;
/// Store traits and in-memory stores.
pub mod store;
/// Single-trainee and group targets.
pub mod targets;
/// Resuming paused tasks.
pub mod unfreeze;

/// Telemetry helpers for booster operations.
#[path = "../telemetry.rs"]
pub mod telemetry;

#[path = "../main.rs"]
pub mod orchestration_entry;

pub use bulk::{
    BatchReport, BulkEngine, BulkOperation, BulkRequest, TraineeFailure, TraineeSuccess,
    MAX_WEEK_OFFSET,
};
pub use calendar::{Clock, FixedClock, SystemClock, WeekStart, WeekWindow, PROGRAM_WEEKS};
pub use catalog::{MissionTemplate, TemplateCatalog};
pub use config::BoosterConfig;
pub use error::{BoosterError, BoosterResult};
pub use file_store::FileBoosterStore;
pub use freeze::{FreezeController, FreezeOutcome};
pub use generator::ScheduleGenerator;
pub use model::{
    BoosterStatus, Note, TaskId, TaskPatch, TaskStatus, TemplateVariant, Trainee, TraineeId,
    TraineePatch, WeeklyTask,
};
pub use notify::{DisabledNotifier, EventBusNotifier, NotificationKind, Notifier};
pub use orchestration_entry::BoosterRuntime;
pub use status::{StatusChange, StatusGate};
pub use store::{InMemoryTaskStore, InMemoryTraineeStore, TaskStore, TraineeStore};
pub use targets::{TargetResolver, TargetSpec};
pub use telemetry::{BoosterTelemetry, BoosterTelemetryBuilder};
pub use unfreeze::{UnfreezeController, UnfreezeOutcome};
