use std::{sync::Arc, time::Duration};

use metrics_instrument::{Sink, SinkError};
use parking_lot::Mutex;

/// A single emission captured by [`CaptureSink`].
#[derive(Clone, Debug, PartialEq)]
pub enum Emission {
    /// A counter increment.
    Increment {
        /// Metric name.
        name: String,
        /// Tags, as `key:value` strings.
        tags: Vec<String>,
        /// Sample rate passed by the instrumentation.
        sample_rate: f64,
    },

    /// A timer measurement.
    Measure {
        /// Metric name.
        name: String,
        /// Measured duration.
        duration: Duration,
        /// Tags, as `key:value` strings.
        tags: Vec<String>,
        /// Sample rate passed by the instrumentation.
        sample_rate: f64,
    },
}

impl Emission {
    /// Returns the metric name.
    pub fn name(&self) -> &str {
        match self {
            Emission::Increment { name, .. } | Emission::Measure { name, .. } => name,
        }
    }

    /// Returns the tags.
    pub fn tags(&self) -> &[String] {
        match self {
            Emission::Increment { tags, .. } | Emission::Measure { tags, .. } => tags,
        }
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> f64 {
        match self {
            Emission::Increment { sample_rate, .. } | Emission::Measure { sample_rate, .. } => {
                *sample_rate
            }
        }
    }

    /// Returns the measured duration, if this is a measurement.
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Emission::Increment { .. } => None,
            Emission::Measure { duration, .. } => Some(*duration),
        }
    }

    /// Returns `true` if this is a counter increment.
    pub fn is_increment(&self) -> bool {
        matches!(self, Emission::Increment { .. })
    }
}

/// A sink that captures every emission in memory.
///
/// Clones share the same storage, so a clone can be installed while the original is kept around to inspect what was
/// emitted. Emissions are kept in the order they were made.
#[derive(Clone, Debug, Default)]
pub struct CaptureSink {
    emissions: Arc<Mutex<Vec<Emission>>>,
}

impl CaptureSink {
    /// Creates a new `CaptureSink`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all captured emissions.
    pub fn emissions(&self) -> Vec<Emission> {
        self.emissions.lock().clone()
    }

    /// Returns the names of all captured emissions.
    pub fn names(&self) -> Vec<String> {
        self.emissions.lock().iter().map(|emission| emission.name().to_string()).collect()
    }

    /// Returns the number of captured increments of `name`.
    pub fn increments(&self, name: &str) -> usize {
        let emissions = self.emissions.lock();
        let matches = |emission: &&Emission| emission.is_increment() && emission.name() == name;
        emissions.iter().filter(matches).count()
    }

    /// Returns the durations captured for `name`, in emission order.
    pub fn measurements(&self, name: &str) -> Vec<Duration> {
        self.emissions
            .lock()
            .iter()
            .filter(|emission| emission.name() == name)
            .filter_map(Emission::duration)
            .collect()
    }

    /// Returns the number of captured emissions.
    pub fn len(&self) -> usize {
        self.emissions.lock().len()
    }

    /// Returns `true` if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.emissions.lock().is_empty()
    }

    /// Discards all captured emissions.
    pub fn clear(&self) {
        self.emissions.lock().clear();
    }
}

impl Sink for CaptureSink {
    fn increment(&self, name: &str, tags: &[String], sample_rate: f64) -> Result<(), SinkError> {
        self.emissions.lock().push(Emission::Increment {
            name: name.to_string(),
            tags: tags.to_vec(),
            sample_rate,
        });
        Ok(())
    }

    fn measure(
        &self,
        name: &str,
        duration: Duration,
        tags: &[String],
        sample_rate: f64,
    ) -> Result<(), SinkError> {
        self.emissions.lock().push(Emission::Measure {
            name: name.to_string(),
            duration,
            tags: tags.to_vec(),
            sample_rate,
        });
        Ok(())
    }
}
