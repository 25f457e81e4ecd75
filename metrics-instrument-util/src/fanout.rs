use std::time::Duration;

use metrics_instrument::{Sink, SinkError};

/// Fans out emissions to multiple sinks.
///
/// Every sink sees every emission, even if an earlier sink failed. The first error encountered, if any, is returned once
/// all sinks were called.
pub struct FanoutSink {
    sinks: Vec<Box<dyn Sink + Send + Sync>>,
}

impl FanoutSink {
    fn fan<F>(&self, mut f: F) -> Result<(), SinkError>
    where
        F: FnMut(&dyn Sink) -> Result<(), SinkError>,
    {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = f(sink.as_ref()) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Sink for FanoutSink {
    fn increment(&self, name: &str, tags: &[String], sample_rate: f64) -> Result<(), SinkError> {
        self.fan(|sink| sink.increment(name, tags, sample_rate))
    }

    fn measure(
        &self,
        name: &str,
        duration: Duration,
        tags: &[String],
        sample_rate: f64,
    ) -> Result<(), SinkError> {
        self.fan(|sink| sink.measure(name, duration, tags, sample_rate))
    }
}

/// Builder for [`FanoutSink`].
#[derive(Default)]
pub struct FanoutBuilder {
    sinks: Vec<Box<dyn Sink + Send + Sync>>,
}

impl FanoutBuilder {
    /// Adds a sink to the fanout list.
    #[must_use]
    pub fn add_sink<S>(mut self, sink: S) -> FanoutBuilder
    where
        S: Sink + Send + Sync + 'static,
    {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Builds the `FanoutSink`.
    pub fn build(self) -> FanoutSink {
        FanoutSink { sinks: self.sinks }
    }
}
