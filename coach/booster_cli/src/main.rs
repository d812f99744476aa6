use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use coach_booster::{
    BatchReport, BoosterConfig, BoosterRuntime, BoosterTelemetry, BulkOperation, BulkRequest,
    DisabledNotifier, EventBusNotifier, FileBoosterStore, Notifier, TargetSpec, TaskStatus,
    TaskStore, Trainee, TraineeStore,
};
use serde_json::{json, Value};
use shared_event_bus::{EventPublisher, FileEventPublisher};
use shared_logging::read_records;
use tokio::runtime::Runtime;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "booster", version, about = "Booster program administration")]
struct Cli {
    /// Configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// JSON store; overrides `store_path` from the configuration.
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Trainee records.
    #[command(subcommand)]
    Trainee(TraineeCommand),
    /// Replaces schedules with a fresh 12-week set.
    Generate {
        #[command(flatten)]
        target: TargetArgs,
        /// Week 1 start; defaults to each trainee's booster start date.
        #[arg(long)]
        start_date: Option<NaiveDate>,
        #[arg(long)]
        notify: bool,
    },
    /// Switches the program on, generating a schedule where none exists.
    Enable {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Switches the program off.
    Disable {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long)]
        notify: bool,
    },
    /// Pauses open tasks.
    Freeze {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long)]
        notify: bool,
    },
    /// Resumes paused tasks from a new date.
    Unfreeze {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long)]
        resume_date: NaiveDate,
        #[arg(long)]
        notify: bool,
    },
    /// Wipes progress on every task.
    Reset {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long)]
        notify: bool,
    },
    /// Adds individual weeks without touching existing tasks.
    AssignWeeks {
        #[command(flatten)]
        target: TargetArgs,
        /// Week to create (repeatable).
        #[arg(long = "week", required = true)]
        weeks: Vec<u8>,
        /// Whole weeks to shift the anchor by.
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        week_offset: i64,
        #[arg(long)]
        notify: bool,
    },
    /// Changes the status of one task.
    Status {
        #[arg(long)]
        task: Uuid,
        /// `not_started`, `in_progress` or `completed`.
        #[arg(long)]
        to: TaskStatus,
    },
    /// Shows a trainee and their tasks.
    List {
        #[arg(long)]
        trainee: String,
    },
    /// Prints telemetry log records.
    Log {
        #[arg(long)]
        trainee: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Subcommand, Debug)]
enum TraineeCommand {
    /// Adds a trainee or updates gender and groups of an existing one.
    Add {
        id: String,
        #[arg(long)]
        gender: Option<String>,
        /// Group membership (repeatable).
        #[arg(long = "group")]
        groups: Vec<String>,
        #[arg(long)]
        start_date: Option<NaiveDate>,
    },
}

#[derive(Args, Debug, Clone)]
struct TargetArgs {
    /// Single trainee id.
    #[arg(long, conflicts_with = "group", required_unless_present = "group")]
    trainee: Option<String>,
    /// Group name.
    #[arg(long)]
    group: Option<String>,
    /// Narrows the group to this member (repeatable).
    #[arg(long = "member", requires = "group")]
    members: Vec<String>,
}

impl TargetArgs {
    fn into_spec(self) -> TargetSpec {
        match (self.trainee, self.group) {
            (Some(id), _) => TargetSpec::trainee(id),
            (None, Some(name)) => TargetSpec::group_members(name, self.members),
            (None, None) => TargetSpec::trainee(String::new()),
        }
    }
}

/// Printed result plus whether the command should exit non-zero.
struct CommandOutput {
    body: Value,
    failure: Option<String>,
}

impl CommandOutput {
    fn ok(body: Value) -> Self {
        Self {
            body,
            failure: None,
        }
    }

    fn from_report(report: &BatchReport) -> Result<Self> {
        let failure = (report.succeeded.is_empty() && !report.failed.is_empty()).then(|| {
            format!(
                "{} failed for all {} trainees",
                report.operation,
                report.failed.len()
            )
        });
        Ok(Self {
            body: serde_json::to_value(report)?,
            failure,
        })
    }
}

struct Session {
    config: BoosterConfig,
    store: Arc<FileBoosterStore>,
    runtime: BoosterRuntime,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let runtime = Runtime::new()?;
    let output = runtime.block_on(execute(cli))?;
    println!("{}", serde_json::to_string_pretty(&output.body)?);
    if let Some(failure) = output.failure {
        bail!(failure);
    }
    Ok(())
}

async fn execute(cli: Cli) -> Result<CommandOutput> {
    let session = open(cli.config.as_deref(), cli.store)?;
    match cli.command {
        Commands::Trainee(TraineeCommand::Add {
            id,
            gender,
            groups,
            start_date,
        }) => {
            let mut trainee = TraineeStore::get(session.store.as_ref(), &id)
                .await
                .unwrap_or_else(|_| Trainee::new(id.clone()));
            if let Some(gender) = gender {
                trainee = trainee.with_gender(gender);
            }
            for group in groups {
                trainee = trainee.in_group(group);
            }
            if let Some(start) = start_date {
                trainee = trainee.with_start_date(start);
            }
            let saved = session.store.upsert_trainee(trainee)?;
            Ok(CommandOutput::ok(serde_json::to_value(saved)?))
        }
        Commands::Generate {
            target,
            start_date,
            notify,
        } => bulk(&session, target, BulkOperation::Generate { start_date }, notify).await,
        Commands::Enable { target } => bulk(&session, target, BulkOperation::Enable, true).await,
        Commands::Disable { target, notify } => {
            bulk(&session, target, BulkOperation::Disable, notify).await
        }
        Commands::Freeze { target, notify } => {
            bulk(&session, target, BulkOperation::Freeze, notify).await
        }
        Commands::Unfreeze {
            target,
            resume_date,
            notify,
        } => bulk(&session, target, BulkOperation::Unfreeze { resume_date }, notify).await,
        Commands::Reset { target, notify } => {
            bulk(&session, target, BulkOperation::Reset, notify).await
        }
        Commands::AssignWeeks {
            target,
            weeks,
            week_offset,
            notify,
        } => {
            bulk(
                &session,
                target,
                BulkOperation::AssignWeeks { weeks, week_offset },
                notify,
            )
            .await
        }
        Commands::Status { task, to } => {
            let change = session.runtime.set_status(task, to).await?;
            Ok(CommandOutput::ok(serde_json::to_value(change)?))
        }
        Commands::List { trainee } => {
            let record = TraineeStore::get(session.store.as_ref(), &trainee).await?;
            let tasks = session.runtime.tasks_for(&trainee).await?;
            let active = session.runtime.active_task(&trainee).await?.map(|task| task.week);
            Ok(CommandOutput::ok(json!({
                "trainee": record,
                "active_week": active,
                "tasks": tasks,
            })))
        }
        Commands::Log { trainee, limit } => {
            let Some(path) = session.config.telemetry.log_path.as_ref() else {
                bail!("no telemetry.log_path configured");
            };
            let records = read_records(path, trainee.as_deref())?;
            let skip = records.len().saturating_sub(limit);
            Ok(CommandOutput::ok(serde_json::to_value(&records[skip..])?))
        }
    }
}

async fn bulk(
    session: &Session,
    target: TargetArgs,
    operation: BulkOperation,
    notify: bool,
) -> Result<CommandOutput> {
    let request = BulkRequest::new(target.into_spec(), operation).with_notify(notify);
    let report = session.runtime.run_bulk(&request).await?;
    CommandOutput::from_report(&report)
}

fn open(config_path: Option<&Path>, store_override: Option<PathBuf>) -> Result<Session> {
    let mut config = match config_path {
        Some(path) => BoosterConfig::load(path)?,
        None => BoosterConfig::default(),
    };
    if let Some(store) = store_override {
        config.store_path = store;
    }
    let store = Arc::new(
        FileBoosterStore::open(&config.store_path)
            .with_context(|| format!("opening store {}", config.store_path.display()))?,
    );

    let mut telemetry = BoosterTelemetry::builder("booster");
    if let Some(path) = &config.telemetry.log_path {
        telemetry = telemetry.log_path(path);
    }
    let publisher: Option<Arc<dyn EventPublisher>> = match &config.telemetry.event_log_path {
        Some(path) => Some(Arc::new(FileEventPublisher::new(path)?)),
        None => None,
    };
    if let Some(publisher) = &publisher {
        telemetry = telemetry.event_publisher(Arc::clone(publisher));
    }
    let notifier: Arc<dyn Notifier> = match publisher {
        Some(publisher) if config.notifications.enabled => {
            Arc::new(EventBusNotifier::new(publisher))
        }
        _ => Arc::new(DisabledNotifier),
    };

    let tasks: Arc<dyn TaskStore> = store.clone();
    let trainees: Arc<dyn TraineeStore> = store.clone();
    let runtime = BoosterRuntime::from_config(&config, tasks, trainees)?
        .with_notifier(notifier)
        .with_telemetry(telemetry.build()?);
    Ok(Session {
        config,
        store,
        runtime,
    })
}
