use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use shared_event_bus::{EventPublisher, EventRecord};
use shared_logging::{JsonLogger, LogLevel, LogRecord};

/// Builder for booster telemetry sinks.
pub struct BoosterTelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    event_publisher: Option<Arc<dyn EventPublisher>>,
}

impl BoosterTelemetryBuilder {
    /// Creates the builder.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            event_publisher: None,
        }
    }

    /// Sets the log path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Sets the event publisher.
    #[must_use]
    pub fn event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.event_publisher = Some(publisher);
        self
    }

    /// Builds the telemetry handle.
    pub fn build(self) -> Result<BoosterTelemetry> {
        let logger = if let Some(path) = self.log_path {
            Some(JsonLogger::new(path)?)
        } else {
            None
        };
        Ok(BoosterTelemetry {
            inner: Arc::new(TelemetryInner {
                module: self.module,
                logger,
                publisher: self.event_publisher,
            }),
        })
    }
}

/// Telemetry handle shared by the booster runtime and CLI.
#[derive(Clone)]
pub struct BoosterTelemetry {
    inner: Arc<TelemetryInner>,
}

impl fmt::Debug for BoosterTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoosterTelemetry")
            .field("module", &self.inner.module)
            .field("log_path", &self.log_path())
            .finish()
    }
}

struct TelemetryInner {
    module: String,
    logger: Option<JsonLogger>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl BoosterTelemetry {
    /// Returns a builder.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> BoosterTelemetryBuilder {
        BoosterTelemetryBuilder::new(module)
    }

    /// Log file, when one is configured.
    #[must_use]
    pub fn log_path(&self) -> Option<PathBuf> {
        self.inner
            .logger
            .as_ref()
            .map(|logger| logger.path().to_path_buf())
    }

    /// Logs structured metadata.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        self.write(LogRecord::new(&self.inner.module, level, message).with_metadata(metadata))
    }

    /// Logs structured metadata about one trainee.
    pub fn log_for(
        &self,
        subject: &str,
        level: LogLevel,
        message: &str,
        metadata: Value,
    ) -> Result<()> {
        self.write(
            LogRecord::new(&self.inner.module, level, message)
                .with_subject(subject)
                .with_metadata(metadata),
        )
    }

    fn write(&self, record: LogRecord) -> Result<()> {
        if let Some(logger) = &self.inner.logger {
            logger.log(&record)?;
        }
        Ok(())
    }

    /// Emits an event on the bus.
    pub async fn event(&self, event_type: &str, payload: Value) -> Result<()> {
        if let Some(publisher) = &self.inner.publisher {
            publisher
                .publish(EventRecord::new(self.inner.module.clone(), event_type, payload))
                .await?;
        }
        Ok(())
    }
}
