use std::time::Duration;

use super::{Sink, SinkError};

/// A no-op sink.
///
/// Used as the default sink when one has not been installed yet.
pub struct NoopSink;

impl Sink for NoopSink {
    fn increment(&self, _name: &str, _tags: &[String], _sample_rate: f64) -> Result<(), SinkError> {
        Ok(())
    }

    fn measure(
        &self,
        _name: &str,
        _duration: Duration,
        _tags: &[String],
        _sample_rate: f64,
    ) -> Result<(), SinkError> {
        Ok(())
    }
}
