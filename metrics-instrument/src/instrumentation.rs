use std::{fmt, sync::Arc};

use crate::{ConfigurationError, MethodKey, MetricKind, NameSpec, NameSpecId, TagSpec};

/// Default sample rate: every emission is handed to the sink.
pub const DEFAULT_SAMPLE_RATE: f64 = 1.0;

/// Default suffix appended to the metric name of successful calls.
pub const DEFAULT_SUCCESS_SUFFIX: &str = ".success";

/// Default suffix appended to the metric name of failed calls.
pub const DEFAULT_FAILURE_SUFFIX: &str = ".failure";

/// Default for whether calls that raised are measured.
pub const DEFAULT_MEASURE_ON_ERROR: bool = true;

/// A predicate over the value returned by an instrumented method.
pub type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// A single instrumentation, ready to be registered against a [`Method`][crate::Method].
///
/// Instrumentations are built for one metric kind and then configured with builder methods:
///
/// ```
/// # use metrics_instrument::Instrumentation;
/// # struct Response { success: bool }
/// let instrumentation =
///     Instrumentation::<(), (), Response, ()>::count_success("ActiveMerchant.Gateway.ssl_post")
///         .with_predicate(|response| response.success)
///         .with_sample_rate(0.5)
///         .with_tags([("gateway", "bogus")]);
/// # assert!(instrumentation.validate().is_ok());
/// ```
///
/// Validation happens at registration time, and nothing is installed for an invalid instrumentation.
pub struct Instrumentation<R: ?Sized, A, T, E> {
    kind: MetricKind,
    name: NameSpec<R, A>,
    tags: TagSpec<R, A, T, E>,
    sample_rate: f64,
    predicate: Option<Predicate<T>>,
    success_suffix: String,
    failure_suffix: String,
    measure_on_error: bool,
}

impl<R: ?Sized, A, T, E> Instrumentation<R, A, T, E> {
    fn new(kind: MetricKind, name: NameSpec<R, A>) -> Self {
        Instrumentation {
            kind,
            name,
            tags: TagSpec::None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            predicate: None,
            success_suffix: DEFAULT_SUCCESS_SUFFIX.to_string(),
            failure_suffix: DEFAULT_FAILURE_SUFFIX.to_string(),
            measure_on_error: DEFAULT_MEASURE_ON_ERROR,
        }
    }

    /// Counts every call that returns.
    pub fn count(name: impl Into<NameSpec<R, A>>) -> Self {
        Self::new(MetricKind::Count, name.into())
    }

    /// Counts every call whose returned value satisfies a predicate.
    ///
    /// A predicate must be configured with [`with_predicate`][Self::with_predicate].
    pub fn count_if(name: impl Into<NameSpec<R, A>>) -> Self {
        Self::new(MetricKind::CountIf, name.into())
    }

    /// Counts every call as either a success or a failure.
    ///
    /// Without a predicate, every returned value is a success, and every raised error is a failure.
    pub fn count_success(name: impl Into<NameSpec<R, A>>) -> Self {
        Self::new(MetricKind::CountSuccess, name.into())
    }

    /// Measures the wall-clock duration of every call.
    pub fn measure(name: impl Into<NameSpec<R, A>>) -> Self {
        Self::new(MetricKind::Measure, name.into())
    }

    /// Sets the sample rate passed to the sink.
    ///
    /// The rate must be greater than 0 and at most 1. Whether a given emission is actually transmitted is up to the
    /// sink.
    ///
    /// Defaults to 1.0.
    #[must_use]
    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Sets the tags attached to every emission.
    ///
    /// Defaults to no tags.
    #[must_use]
    pub fn with_tags(mut self, tags: impl Into<TagSpec<R, A, T, E>>) -> Self {
        self.tags = tags.into();
        self
    }

    /// Sets the predicate applied to returned values.
    ///
    /// Only [`count_if`][Self::count_if] and [`count_success`][Self::count_success] instrumentations accept a predicate.
    #[must_use]
    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Sets the suffix appended to the metric name of successful calls.
    ///
    /// Defaults to `.success`.
    #[must_use]
    pub fn with_success_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.success_suffix = suffix.into();
        self
    }

    /// Sets the suffix appended to the metric name of failed calls.
    ///
    /// Defaults to `.failure`.
    #[must_use]
    pub fn with_failure_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.failure_suffix = suffix.into();
        self
    }

    /// Sets whether calls that raised an error are measured.
    ///
    /// Defaults to `true`.
    #[must_use]
    pub fn with_measure_on_error(mut self, measure_on_error: bool) -> Self {
        self.measure_on_error = measure_on_error;
        self
    }

    /// Returns the metric kind.
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Returns the name specification.
    pub fn name(&self) -> &NameSpec<R, A> {
        &self.name
    }

    /// Returns the tag specification.
    pub fn tags(&self) -> &TagSpec<R, A, T, E> {
        &self.tags
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Returns the predicate, if any.
    pub fn predicate(&self) -> Option<&Predicate<T>> {
        self.predicate.as_ref()
    }

    /// Returns the success suffix.
    pub fn success_suffix(&self) -> &str {
        &self.success_suffix
    }

    /// Returns the failure suffix.
    pub fn failure_suffix(&self) -> &str {
        &self.failure_suffix
    }

    /// Returns whether calls that raised an error are measured.
    pub fn measure_on_error(&self) -> bool {
        self.measure_on_error
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// If the sample rate is not within `(0, 1]`, if the predicate requirements of the metric kind are not met, or if
    /// either suffix is empty, an error variant will be returned describing the issue.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let rate = self.sample_rate;
        if rate.is_nan() || rate <= 0.0 || rate > 1.0 {
            return Err(ConfigurationError::InvalidSampleRate { rate: self.sample_rate });
        }

        let kind = self.kind;
        match (self.predicate.is_some(), kind.requires_predicate(), kind.accepts_predicate()) {
            (false, true, _) => return Err(ConfigurationError::MissingPredicate { kind }),
            (true, _, false) => return Err(ConfigurationError::UnexpectedPredicate { kind }),
            _ => {}
        }

        if self.success_suffix.is_empty() {
            return Err(ConfigurationError::EmptySuffix { which: "success" });
        }
        if self.failure_suffix.is_empty() {
            return Err(ConfigurationError::EmptySuffix { which: "failure" });
        }

        Ok(())
    }
}

impl<R: ?Sized, A, T, E> Clone for Instrumentation<R, A, T, E> {
    fn clone(&self) -> Self {
        Instrumentation {
            kind: self.kind,
            name: self.name.clone(),
            tags: self.tags.clone(),
            sample_rate: self.sample_rate,
            predicate: self.predicate.clone(),
            success_suffix: self.success_suffix.clone(),
            failure_suffix: self.failure_suffix.clone(),
            measure_on_error: self.measure_on_error,
        }
    }
}

impl<R: ?Sized, A, T, E> fmt::Debug for Instrumentation<R, A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumentation")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("sample_rate", &self.sample_rate)
            .field("predicate", &self.predicate.is_some())
            .field("success_suffix", &self.success_suffix)
            .field("failure_suffix", &self.failure_suffix)
            .field("measure_on_error", &self.measure_on_error)
            .finish()
    }
}

/// Identifies an installed instrumentation.
///
/// An instrumentation is identified by the method it wraps, its metric kind and the identity of its name
/// specification. At most one instrumentation per key can be installed at a time, and removal matches on the same key.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct InstrumentationKey {
    method: MethodKey,
    kind: MetricKind,
    name: NameSpecId,
}

impl InstrumentationKey {
    /// Creates a new `InstrumentationKey`.
    pub fn new(method: MethodKey, kind: MetricKind, name: impl Into<NameSpecId>) -> Self {
        InstrumentationKey { method, kind, name: name.into() }
    }

    /// Returns the instrumented method.
    pub fn method(&self) -> MethodKey {
        self.method
    }

    /// Returns the metric kind.
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Returns the identity of the name specification.
    pub fn name(&self) -> &NameSpecId {
        &self.name
    }
}

impl fmt::Display for InstrumentationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {} as {}", self.kind, self.method, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::{Instrumentation, InstrumentationKey};
    use crate::{ConfigurationError, MethodKey, MetricKind, NameSpec, Target};

    struct Gateway;

    type GatewayInstrumentation = Instrumentation<Gateway, (), bool, ()>;

    #[test]
    fn defaults() {
        let instrumentation = GatewayInstrumentation::count_success("Gateway.ssl_post");

        assert_eq!(instrumentation.kind(), MetricKind::CountSuccess);
        assert_eq!(instrumentation.sample_rate(), 1.0);
        assert_eq!(instrumentation.success_suffix(), ".success");
        assert_eq!(instrumentation.failure_suffix(), ".failure");
        assert!(instrumentation.measure_on_error());
        assert!(instrumentation.predicate().is_none());
        assert!(instrumentation.validate().is_ok());
    }

    #[test]
    fn sample_rate_bounds() {
        for rate in [0.0, -0.5, 1.01, f64::NAN, f64::INFINITY] {
            let result = GatewayInstrumentation::count("n").with_sample_rate(rate).validate();
            assert!(
                matches!(result, Err(ConfigurationError::InvalidSampleRate { .. })),
                "rate {rate} should be rejected"
            );
        }

        for rate in [1.0, 0.5, 0.3, f64::MIN_POSITIVE] {
            assert!(GatewayInstrumentation::measure("n").with_sample_rate(rate).validate().is_ok());
        }
    }

    #[test]
    fn count_if_requires_predicate() {
        let result = GatewayInstrumentation::count_if("n").validate();
        assert!(matches!(
            result,
            Err(ConfigurationError::MissingPredicate { kind: MetricKind::CountIf })
        ));

        assert!(GatewayInstrumentation::count_if("n").with_predicate(|ok| *ok).validate().is_ok());
    }

    #[test]
    fn predicate_rejected_where_ignored() {
        let count = GatewayInstrumentation::count("n").with_predicate(|ok| *ok).validate();
        let measure = GatewayInstrumentation::measure("n").with_predicate(|ok| *ok).validate();

        assert!(matches!(count, Err(ConfigurationError::UnexpectedPredicate { .. })));
        assert!(matches!(measure, Err(ConfigurationError::UnexpectedPredicate { .. })));
        let message = count.unwrap_err().to_string();
        assert_eq!(message, "count instrumentation does not accept a predicate");
    }

    #[test]
    fn empty_suffixes_rejected() {
        let success = GatewayInstrumentation::count_success("n").with_success_suffix("").validate();
        let failure = GatewayInstrumentation::count_success("n").with_failure_suffix("").validate();

        assert!(matches!(success, Err(ConfigurationError::EmptySuffix { which: "success" })));
        assert!(matches!(failure, Err(ConfigurationError::EmptySuffix { which: "failure" })));
    }

    #[test]
    fn key_identity() {
        let method = MethodKey::new(Target::of::<Gateway>(), "ssl_post");
        let resolver: NameSpec<Gateway, ()> = NameSpec::resolver(|_, _| "dynamic".to_string());

        let a = InstrumentationKey::new(method, MetricKind::Count, "Gateway.ssl_post");
        let b = InstrumentationKey::new(method, MetricKind::Count, "Gateway.ssl_post");
        let c = InstrumentationKey::new(method, MetricKind::Measure, "Gateway.ssl_post");
        let d = InstrumentationKey::new(method, MetricKind::Count, &resolver);
        let e = InstrumentationKey::new(method, MetricKind::Count, &resolver.clone());

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(d, e);
        assert!(a.to_string().starts_with("count on "));
    }
}
