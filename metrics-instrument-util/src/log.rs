use std::time::Duration;

use metrics_instrument::{Sink, SinkError};
use tracing::Level;

macro_rules! emit_at {
    ($level:expr, $($args:tt)+) => {
        let level = $level;
        if level == Level::ERROR {
            tracing::event!(Level::ERROR, $($args)+);
        } else if level == Level::WARN {
            tracing::event!(Level::WARN, $($args)+);
        } else if level == Level::INFO {
            tracing::event!(Level::INFO, $($args)+);
        } else if level == Level::DEBUG {
            tracing::event!(Level::DEBUG, $($args)+);
        } else {
            tracing::event!(Level::TRACE, $($args)+);
        }
    };
}

/// A sink that logs every emission through `tracing` at a configurable level.
///
/// Useful during development, or to see what an instrumentation emits before wiring up a real backend.
#[derive(Clone, Copy, Debug)]
pub struct LogSink {
    level: Level,
}

impl LogSink {
    /// Creates a new `LogSink` that logs at the given level.
    pub fn new(level: Level) -> Self {
        LogSink { level }
    }

    /// Returns the level emissions are logged at.
    pub fn level(&self) -> Level {
        self.level
    }
}

impl Default for LogSink {
    fn default() -> Self {
        LogSink::new(Level::INFO)
    }
}

impl Sink for LogSink {
    fn increment(&self, name: &str, tags: &[String], sample_rate: f64) -> Result<(), SinkError> {
        emit_at!(self.level, metric_name = name, ?tags, sample_rate, "increment");
        Ok(())
    }

    fn measure(
        &self,
        name: &str,
        duration: Duration,
        tags: &[String],
        sample_rate: f64,
    ) -> Result<(), SinkError> {
        emit_at!(self.level, metric_name = name, ?duration, ?tags, sample_rate, "measure");
        Ok(())
    }
}
