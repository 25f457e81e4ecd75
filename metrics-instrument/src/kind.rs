use std::fmt;

/// Kind of metric emitted by an instrumentation.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum MetricKind {
    /// Counts every call that returns.
    Count,
    /// Counts every call whose return value satisfies a predicate.
    CountIf,
    /// Counts each call as either a success or a failure.
    CountSuccess,
    /// Measures the duration of every call.
    Measure,
}

impl MetricKind {
    /// Returns `true` if instrumentations of this kind must be given a predicate.
    pub fn requires_predicate(self) -> bool {
        matches!(self, MetricKind::CountIf)
    }

    /// Returns `true` if instrumentations of this kind consult a predicate, when given one.
    pub fn accepts_predicate(self) -> bool {
        matches!(self, MetricKind::CountIf | MetricKind::CountSuccess)
    }

    /// Returns the name of this kind, as used by the registration shorthands.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Count => "count",
            MetricKind::CountIf => "count_if",
            MetricKind::CountSuccess => "count_success",
            MetricKind::Measure => "measure",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an instrumented call produced.
#[derive(Debug)]
pub enum Outcome<'a, T, E> {
    /// The call returned a value.
    Returned(&'a T),
    /// The call raised an error.
    Raised(&'a E),
}

impl<'a, T, E> Outcome<'a, T, E> {
    /// Borrows the outcome of a call.
    pub fn from_result(result: &'a Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::Returned(value),
            Err(e) => Outcome::Raised(e),
        }
    }

    /// Returns `true` if the call raised an error.
    pub fn is_raised(&self) -> bool {
        matches!(self, Outcome::Raised(_))
    }
}

impl<'a, T, E> Clone for Outcome<'a, T, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T, E> Copy for Outcome<'a, T, E> {}

/// The emission decided for a single call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Emit {
    /// Emit nothing.
    Nothing,
    /// Increment the resolved name.
    Increment,
    /// Increment the resolved name with the success suffix.
    Success,
    /// Increment the resolved name with the failure suffix.
    Failure,
    /// Record the measured duration under the resolved name.
    Duration,
}

/// Decides what a call emits, given its kind and outcome.
///
/// `predicate` is consulted only for returned values of [`MetricKind::CountIf`] and [`MetricKind::CountSuccess`]. A
/// missing predicate counts as "no predicate, every returned value is a success". `measure_errors` controls whether
/// [`MetricKind::Measure`] records calls that raised.
///
/// | kind           | on return                            | on raised error              |
/// |----------------|--------------------------------------|------------------------------|
/// | `Count`        | `Increment`                          | `Nothing`                    |
/// | `CountIf`      | `Increment` if predicate, else `Nothing` | `Nothing`                |
/// | `CountSuccess` | `Success` if predicate, else `Failure` | `Failure`                  |
/// | `Measure`      | `Duration`                           | `Duration` if `measure_errors` |
pub fn classify<T, E, P>(
    kind: MetricKind,
    outcome: Outcome<'_, T, E>,
    predicate: Option<P>,
    measure_errors: bool,
) -> Emit
where
    P: FnOnce(&T) -> bool,
{
    match (kind, outcome) {
        (MetricKind::Count, Outcome::Returned(_)) => Emit::Increment,
        (MetricKind::CountIf, Outcome::Returned(value)) => {
            if predicate.is_some_and(|predicate| predicate(value)) {
                Emit::Increment
            } else {
                Emit::Nothing
            }
        }
        (MetricKind::CountSuccess, Outcome::Returned(value)) => {
            if predicate.map_or(true, |predicate| predicate(value)) {
                Emit::Success
            } else {
                Emit::Failure
            }
        }
        (MetricKind::CountSuccess, Outcome::Raised(_)) => Emit::Failure,
        (MetricKind::Measure, Outcome::Returned(_)) => Emit::Duration,
        (MetricKind::Measure, Outcome::Raised(_)) if measure_errors => Emit::Duration,
        (MetricKind::Count | MetricKind::CountIf | MetricKind::Measure, Outcome::Raised(_)) => {
            Emit::Nothing
        }
    }
}
