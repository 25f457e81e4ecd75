use std::time::Duration;

use quanta::Instant;
use tracing::{error, trace, warn};

use crate::{
    classify, with_sink, Emit, Instrumentation, InstrumentationError, InstrumentationKey,
    MetricKind, Outcome, SinkError,
};

/// Result of a call dispatched through the wrapper chain.
///
/// Instrumentation failures travel in the outer `Err`, past every wrapper above the one that failed, so they are never
/// mistaken for an error raised by the method itself.
pub(crate) type Dispatched<T, E> = Result<Result<T, E>, InstrumentationError>;

/// A single installed instrumentation, intercepting calls on their way to the next implementation in the chain.
pub(crate) struct Wrapper<R: ?Sized, A, T, E> {
    key: InstrumentationKey,
    instrumentation: Instrumentation<R, A, T, E>,
}

impl<R: ?Sized, A, T, E> Wrapper<R, A, T, E> {
    pub(crate) fn new(
        key: InstrumentationKey,
        instrumentation: Instrumentation<R, A, T, E>,
    ) -> Self {
        Wrapper { key, instrumentation }
    }

    pub(crate) fn key(&self) -> &InstrumentationKey {
        &self.key
    }

    /// Runs `next` and emits whatever its outcome calls for.
    ///
    /// The name, and any tags not depending on the outcome, are resolved before `next` runs. If either resolution fails,
    /// `next` is never run. Instrumentation failures coming out of `next` are passed along without emitting anything,
    /// and the result of the call itself is returned as-is.
    pub(crate) fn intercept<F>(&self, receiver: &R, args: &A, next: F) -> Dispatched<T, E>
    where
        F: FnOnce() -> Dispatched<T, E>,
    {
        let instrumentation = &self.instrumentation;
        let kind = instrumentation.kind();
        let method = self.key.method();

        let name = match instrumentation.name().resolve(receiver, args) {
            Ok(name) => name,
            Err(source) => {
                return Err(InstrumentationError::NameResolution { method, kind, source });
            }
        };

        let tag_spec = instrumentation.tags();
        let tags = if tag_spec.needs_outcome() {
            None
        } else {
            match tag_spec.resolve_before(receiver, args) {
                Ok(tags) => Some(tags),
                Err(source) => {
                    return Err(InstrumentationError::TagResolution { method, kind, source });
                }
            }
        };

        let start = (kind == MetricKind::Measure).then(Instant::now);
        let result = next()?;
        let elapsed = start.map(|start| Instant::now().duration_since(start));

        let outcome = Outcome::from_result(&result);
        let predicate = instrumentation.predicate().map(|predicate| &**predicate);
        let emit = classify(kind, outcome, predicate, instrumentation.measure_on_error());
        if emit == Emit::Nothing {
            return Ok(result);
        }

        let tags = match tags {
            Some(tags) => tags,
            None => match tag_spec.resolve_after(receiver, args, outcome) {
                Ok(tags) => tags,
                Err(e) => {
                    error!(
                        instrumentation = %self.key,
                        metric_name = %name,
                        error = %e,
                        "Failed to resolve tags after the call. Dropping emission."
                    );
                    return Ok(result);
                }
            },
        };

        if let Err(e) = self.emit(emit, &name, &tags, elapsed) {
            warn!(
                instrumentation = %self.key,
                metric_name = %name,
                error = %e,
                "Sink rejected emission."
            );
        }

        Ok(result)
    }

    fn emit(
        &self,
        emit: Emit,
        name: &str,
        tags: &[String],
        elapsed: Option<Duration>,
    ) -> Result<(), SinkError> {
        let sample_rate = self.instrumentation.sample_rate();
        trace!(instrumentation = %self.key, metric_name = name, ?emit, sample_rate, "Emitting.");

        with_sink(|sink| match (emit, elapsed) {
            (Emit::Increment, _) => sink.increment(name, tags, sample_rate),
            (Emit::Success, _) => {
                let name = format!("{}{}", name, self.instrumentation.success_suffix());
                sink.increment(&name, tags, sample_rate)
            }
            (Emit::Failure, _) => {
                let name = format!("{}{}", name, self.instrumentation.failure_suffix());
                sink.increment(&name, tags, sample_rate)
            }
            (Emit::Duration, Some(elapsed)) => sink.measure(name, elapsed, tags, sample_rate),
            (Emit::Duration, None) | (Emit::Nothing, _) => Ok(()),
        })
    }
}
