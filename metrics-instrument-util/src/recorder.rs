use std::time::Duration;

use metrics::{Key, Label, Level, Metadata};
use metrics_instrument::{Sink, SinkError};
use rand::Rng as _;

/// Default prefix applied to metric names: none.
pub const DEFAULT_PREFIX: Option<&str> = None;

/// Default global tags: none.
pub const DEFAULT_GLOBAL_TAGS: &[&str] = &[];

/// Default for whether the sample rate of an emission is honored.
pub const DEFAULT_SAMPLING_ENABLED: bool = true;

static METADATA: Metadata<'static> =
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

/// Splits a `key:value` tag into a label.
///
/// Only the first `:` separates the key from the value. A tag without `:` becomes a label with an empty value.
fn tag_to_label(tag: &str) -> Label {
    match tag.split_once(':') {
        Some((key, value)) => Label::new(key.to_string(), value.to_string()),
        None => Label::new(tag.to_string(), String::new()),
    }
}

/// A sink that forwards emissions to the `metrics` recorder of the current thread.
///
/// Increments become counter increments and measurements become histogram records, in seconds. Tags become labels.
/// Emissions go to whichever recorder [`metrics::with_recorder`] resolves to at the time of the emission, so a
/// `RecorderSink` can be installed once and follow recorders being swapped out underneath it.
///
/// Since sampling is a sink concern, the sample rate of each emission is honored by randomly dropping emissions, unless
/// sampling is disabled on the builder.
#[derive(Clone, Debug)]
pub struct RecorderSink {
    prefix: Option<String>,
    global_labels: Vec<Label>,
    sampling: bool,
}

impl RecorderSink {
    /// Creates a new `RecorderSink` with the default configuration.
    pub fn new() -> Self {
        RecorderSinkBuilder::default().build()
    }

    fn key(&self, name: &str, tags: &[String]) -> Key {
        let name = match &self.prefix {
            Some(prefix) => format!("{prefix}.{name}"),
            None => name.to_string(),
        };

        let mut labels = tags.iter().map(|tag| tag_to_label(tag)).collect::<Vec<_>>();
        labels.extend(self.global_labels.iter().cloned());
        Key::from_parts(name, labels)
    }

    fn sampled(&self, sample_rate: f64) -> bool {
        if !self.sampling || sample_rate >= 1.0 {
            return true;
        }
        if sample_rate.is_nan() || sample_rate <= 0.0 {
            return false;
        }
        rand::rng().random_bool(sample_rate)
    }
}

impl Default for RecorderSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for RecorderSink {
    fn increment(&self, name: &str, tags: &[String], sample_rate: f64) -> Result<(), SinkError> {
        if self.sampled(sample_rate) {
            let key = self.key(name, tags);
            metrics::with_recorder(|recorder| {
                recorder.register_counter(&key, &METADATA).increment(1);
            });
        }
        Ok(())
    }

    fn measure(
        &self,
        name: &str,
        duration: Duration,
        tags: &[String],
        sample_rate: f64,
    ) -> Result<(), SinkError> {
        if self.sampled(sample_rate) {
            let key = self.key(name, tags);
            metrics::with_recorder(|recorder| {
                recorder.register_histogram(&key, &METADATA).record(duration.as_secs_f64());
            });
        }
        Ok(())
    }
}

/// Builder for [`RecorderSink`].
#[derive(Debug)]
pub struct RecorderSinkBuilder {
    prefix: Option<String>,
    global_tags: Vec<String>,
    sampling: bool,
}

impl RecorderSinkBuilder {
    /// Sets the prefix applied to every metric name.
    ///
    /// The prefix is joined to the name with a `.`.
    ///
    /// Defaults to no prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Sets tags added to every emission, as `key:value` strings.
    ///
    /// Global tags come after the tags of the emission itself.
    ///
    /// Defaults to no global tags.
    #[must_use]
    pub fn with_global_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.global_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets whether the sample rate of each emission is honored.
    ///
    /// When disabled, every emission is forwarded regardless of its sample rate.
    ///
    /// Defaults to `true`.
    #[must_use]
    pub fn with_sampling(mut self, enabled: bool) -> Self {
        self.sampling = enabled;
        self
    }

    /// Builds the `RecorderSink`.
    pub fn build(self) -> RecorderSink {
        RecorderSink {
            prefix: self.prefix,
            global_labels: self.global_tags.iter().map(|tag| tag_to_label(tag)).collect(),
            sampling: self.sampling,
        }
    }
}

impl Default for RecorderSinkBuilder {
    fn default() -> Self {
        RecorderSinkBuilder {
            prefix: DEFAULT_PREFIX.map(str::to_string),
            global_tags: DEFAULT_GLOBAL_TAGS.iter().map(|tag| tag.to_string()).collect(),
            sampling: DEFAULT_SAMPLING_ENABLED,
        }
    }
}
