use thiserror::Error;

use crate::{InstrumentationKey, MethodKey, MetricKind};

/// A boxed error, as returned by fallible name and tag resolvers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that could occur while registering an instrumentation.
///
/// Nothing is installed when registration fails.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The metric kind requires a predicate but none was given.
    #[error("{kind} instrumentation requires a predicate")]
    MissingPredicate {
        /// Kind of the rejected instrumentation.
        kind: MetricKind,
    },

    /// A predicate was given for a metric kind that never consults one.
    #[error("{kind} instrumentation does not accept a predicate")]
    UnexpectedPredicate {
        /// Kind of the rejected instrumentation.
        kind: MetricKind,
    },

    /// The sample rate was not within `(0, 1]`.
    #[error("invalid sample rate {rate} (must be greater than 0 and at most 1)")]
    InvalidSampleRate {
        /// The rejected sample rate.
        rate: f64,
    },

    /// A success or failure suffix was empty.
    #[error("{which} suffix must not be empty")]
    EmptySuffix {
        /// Which suffix was empty: `success` or `failure`.
        which: &'static str,
    },

    /// The instrumentation was built for a different metric kind than the one requested.
    #[error("expected {expected} instrumentation, got {actual}")]
    KindMismatch {
        /// Kind requested by the registration shorthand.
        expected: MetricKind,
        /// Kind the instrumentation was built for.
        actual: MetricKind,
    },

    /// Another dispatch point is already registered under the same method key.
    #[error("a different dispatch point is already instrumented as {method}")]
    MethodConflict {
        /// The conflicting method key.
        method: MethodKey,
    },

    /// An identical instrumentation is already installed on the method.
    #[error("instrumentation already registered: {key}")]
    Duplicate {
        /// Key of the existing instrumentation.
        key: InstrumentationKey,
    },
}

/// No installed instrumentation matched the key given for removal.
///
/// The wrapper chain is left untouched.
#[derive(Debug, Error)]
#[error("no instrumentation registered for {key}")]
pub struct NotFoundError {
    key: InstrumentationKey,
}

impl NotFoundError {
    pub(crate) fn new(key: InstrumentationKey) -> Self {
        NotFoundError { key }
    }

    /// Returns the key that was not found.
    pub fn key(&self) -> &InstrumentationKey {
        &self.key
    }
}

/// Errors raised by instrumentation logic during a live call.
///
/// When this is returned from an instrumented method, the underlying method was not invoked for that call.
#[derive(Debug, Error)]
pub enum InstrumentationError {
    /// The metric name resolver failed.
    #[error("failed to resolve {kind} metric name for {method}")]
    NameResolution {
        /// The instrumented method.
        method: MethodKey,
        /// Kind of the failing instrumentation.
        kind: MetricKind,
        /// The resolver's error.
        #[source]
        source: BoxError,
    },

    /// The tag resolver failed.
    #[error("failed to resolve {kind} metric tags for {method}")]
    TagResolution {
        /// The instrumented method.
        method: MethodKey,
        /// Kind of the failing instrumentation.
        kind: MetricKind,
        /// The resolver's error.
        #[source]
        source: BoxError,
    },
}
