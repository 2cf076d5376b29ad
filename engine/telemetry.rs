use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use wrldbot_feed::{FeedEntry, FeedPublisher};
use wrldbot_logging::{JsonLogger, LogLevel, LogRecord};

/// Builder configuring telemetry for the decision loop.
pub struct AgentTelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    min_level: LogLevel,
    activity: Option<Arc<dyn FeedPublisher>>,
}

impl AgentTelemetryBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            min_level: LogLevel::Warn,
            activity: None,
        }
    }

    /// Sets the JSON log path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Sets the minimum level reaching the log file.
    #[must_use]
    pub const fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Assigns an activity feed for notable agent events.
    #[must_use]
    pub fn activity_feed(mut self, publisher: Arc<dyn FeedPublisher>) -> Self {
        self.activity = Some(publisher);
        self
    }

    /// Finalizes the builder.
    pub fn build(self) -> Result<AgentTelemetry> {
        let logger = match self.log_path {
            Some(path) => Some(JsonLogger::new(path)?.with_min_level(self.min_level)),
            None => None,
        };
        Ok(AgentTelemetry {
            inner: Arc::new(TelemetryInner {
                module: self.module,
                logger,
                activity: self.activity,
            }),
        })
    }
}

/// Telemetry handle shared by the decision loop: a filtered JSON log plus an
/// optional activity feed for notable events (dispatches, restarts).
#[derive(Clone)]
pub struct AgentTelemetry {
    inner: Arc<TelemetryInner>,
}

struct TelemetryInner {
    module: String,
    logger: Option<JsonLogger>,
    activity: Option<Arc<dyn FeedPublisher>>,
}

impl fmt::Debug for AgentTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentTelemetry")
            .field("module", &self.inner.module)
            .finish()
    }
}

impl AgentTelemetry {
    /// Returns a builder for this telemetry handle.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> AgentTelemetryBuilder {
        AgentTelemetryBuilder::new(module)
    }

    /// Logs a structured record.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        if let Some(logger) = &self.inner.logger {
            let record = LogRecord::new(&self.inner.module, level, message).with_fields(&metadata);
            logger.log(&record)?;
        }
        Ok(())
    }

    /// Appends a line to the activity feed.
    pub async fn event(&self, line: impl Into<String>) -> Result<()> {
        if let Some(activity) = &self.inner.activity {
            activity.publish(FeedEntry::new(line)).await?;
        }
        Ok(())
    }
}
