use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_event_bus::{EventPublisher, EventRecord};

use crate::{
    error::{BoosterError, BoosterResult},
    model::Trainee,
};

/// Why a trainee is being notified.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// The program was switched on.
    BoosterEnabled,
    /// The program was switched off.
    BoosterDisabled,
    /// A fresh 12-week schedule exists.
    ScheduleGenerated,
    /// Open tasks were paused.
    TasksFrozen,
    /// Paused tasks were resumed with new dates.
    TasksResumed,
    /// Progress was wiped.
    ScheduleReset,
    /// Individual weeks were added.
    WeeksAssigned,
}

impl NotificationKind {
    /// Snake-case label, also the event type suffix.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::BoosterEnabled => "booster_enabled",
            Self::BoosterDisabled => "booster_disabled",
            Self::ScheduleGenerated => "schedule_generated",
            Self::TasksFrozen => "tasks_frozen",
            Self::TasksResumed => "tasks_resumed",
            Self::ScheduleReset => "schedule_reset",
            Self::WeeksAssigned => "weeks_assigned",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Best-effort dispatcher for trainee-facing notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends one notification. Callers count failures instead of propagating them.
    async fn notify(&self, trainee: &Trainee, kind: NotificationKind) -> BoosterResult<()>;
}

/// Notifier that accepts everything and sends nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn notify(&self, _trainee: &Trainee, _kind: NotificationKind) -> BoosterResult<()> {
        Ok(())
    }
}

/// Publishes `booster.notification.<kind>` events for a push/email relay to pick up.
#[derive(Clone)]
pub struct EventBusNotifier {
    publisher: Arc<dyn EventPublisher>,
    source: String,
}

impl fmt::Debug for EventBusNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBusNotifier")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl EventBusNotifier {
    /// Notifier publishing through `publisher` with source `booster`.
    #[must_use]
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            publisher,
            source: "booster".into(),
        }
    }

    /// Overrides the event source name.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

#[async_trait]
impl Notifier for EventBusNotifier {
    async fn notify(&self, trainee: &Trainee, kind: NotificationKind) -> BoosterResult<()> {
        let event = EventRecord::new(
            self.source.clone(),
            format!("booster.notification.{kind}"),
            json!({ "trainee_id": trainee.id, "kind": kind }),
        );
        self.publisher
            .publish(event)
            .await
            .map_err(|err| BoosterError::Notification(format!("{err:#}")))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Notifier doubles.

    use parking_lot::Mutex;

    use super::*;

    /// Records every call and fails for the listed trainees.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<(String, NotificationKind)>>,
        failing: Vec<String>,
    }

    impl RecordingNotifier {
        pub fn failing_for(trainees: &[&str]) -> Self {
            Self {
                sent: Mutex::default(),
                failing: trainees.iter().map(ToString::to_string).collect(),
            }
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, trainee: &Trainee, kind: NotificationKind) -> BoosterResult<()> {
            if self.failing.contains(&trainee.id) {
                return Err(BoosterError::Notification(format!(
                    "push channel rejected {}",
                    trainee.id
                )));
            }
            self.sent.lock().push((trainee.id.clone(), kind));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use shared_event_bus::MemoryEventBus;

    struct BrokenPublisher;

    #[async_trait]
    impl EventPublisher for BrokenPublisher {
        async fn publish(&self, _event: EventRecord) -> anyhow::Result<()> {
            Err(anyhow!("relay offline"))
        }
    }

    #[tokio::test]
    async fn publishes_typed_event() {
        let bus = Arc::new(MemoryEventBus::new(8));
        let notifier = EventBusNotifier::new(bus.clone());
        notifier
            .notify(&Trainee::new("ana"), NotificationKind::BoosterEnabled)
            .await
            .unwrap();
        let events = bus.events_of_type("booster.notification.booster_enabled");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["trainee_id"], "ana");
        assert_eq!(events[0].source, "booster");
    }

    #[tokio::test]
    async fn publisher_failure_becomes_notification_error() {
        let notifier = EventBusNotifier::new(Arc::new(BrokenPublisher));
        let err = notifier
            .notify(&Trainee::new("ana"), NotificationKind::TasksFrozen)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "notification");
        assert!(err.to_string().contains("relay offline"));
    }
}
