use std::{cell::Cell, marker::PhantomData, ptr::NonNull, time::Duration};

use once_cell::sync::OnceCell;

mod errors;
pub use self::errors::{SetSinkError, SinkError};

mod noop;
pub use self::noop::NoopSink;

static NOOP_SINK: NoopSink = NoopSink;
static GLOBAL_SINK: OnceCell<Box<dyn Sink + Send + Sync>> = OnceCell::new();

thread_local! {
    static LOCAL_SINK: Cell<Option<NonNull<dyn Sink>>> = const { Cell::new(None) };
}

/// A capability for emitting metric events.
///
/// This is the only thing instrumented methods need from a metrics backend. How emissions reach the backend, and
/// whether a given emission is statistically sampled or not, is entirely up to the implementation: the engine passes the
/// configured sample rate through verbatim.
///
/// Sinks are called synchronously from within instrumented calls, and so should not block for long. Errors returned by a
/// sink are logged and otherwise ignored; they never affect the instrumented call.
pub trait Sink {
    /// Increments the counter `name` by one.
    ///
    /// # Errors
    ///
    /// If the emission could not be handed to the backend, an error is returned.
    fn increment(&self, name: &str, tags: &[String], sample_rate: f64) -> Result<(), SinkError>;

    /// Records `duration` for the timer `name`.
    ///
    /// # Errors
    ///
    /// If the emission could not be handed to the backend, an error is returned.
    fn measure(
        &self,
        name: &str,
        duration: Duration,
        tags: &[String],
        sample_rate: f64,
    ) -> Result<(), SinkError>;
}

// Blanket implementations.
macro_rules! impl_sink {
    ($inner_ty:ident, $ptr_ty:ty) => {
        impl<$inner_ty> $crate::Sink for $ptr_ty
        where
            $inner_ty: $crate::Sink + ?Sized,
        {
            fn increment(
                &self,
                name: &str,
                tags: &[String],
                sample_rate: f64,
            ) -> Result<(), $crate::SinkError> {
                std::ops::Deref::deref(self).increment(name, tags, sample_rate)
            }

            fn measure(
                &self,
                name: &str,
                duration: std::time::Duration,
                tags: &[String],
                sample_rate: f64,
            ) -> Result<(), $crate::SinkError> {
                std::ops::Deref::deref(self).measure(name, duration, tags, sample_rate)
            }
        }
    };
}

impl_sink!(T, &T);
impl_sink!(T, &mut T);
impl_sink!(T, std::boxed::Box<T>);
impl_sink!(T, std::sync::Arc<T>);

/// Guard for setting a local sink.
///
/// The guard holds a reference to the sink for as long as it lives, and stores a pointer to it in thread-local storage
/// so that instrumented calls on this thread can reach it. The pointer is cleared, and any previously installed local
/// sink restored, when the guard is dropped, even if the thread is unwinding.
pub struct LocalSinkGuard<'a> {
    prev_sink: Option<NonNull<dyn Sink>>,
    phantom: PhantomData<&'a dyn Sink>,
}

impl<'a> LocalSinkGuard<'a> {
    /// Creates a new `LocalSinkGuard` and sets the thread-local sink.
    fn new(sink: &'a dyn Sink) -> Self {
        // SAFETY: The lifetime erased here is reattached through the guard's `'a`, and the pointer is removed from
        // thread-local storage when the guard drops, so it is never dereferenced after the borrow ends.
        let sink = unsafe { std::mem::transmute::<&'a dyn Sink, &'static dyn Sink>(sink) };
        let sink_ptr = NonNull::from(sink);

        let prev_sink = LOCAL_SINK.with(|local_sink| local_sink.replace(Some(sink_ptr)));

        Self { prev_sink, phantom: PhantomData }
    }
}

impl<'a> Drop for LocalSinkGuard<'a> {
    fn drop(&mut self) {
        LOCAL_SINK.with(|local_sink| local_sink.replace(self.prev_sink.take()));
    }
}

/// Sets the global sink.
///
/// This function may only be called once in the lifetime of a program. Any emissions made before this method is called
/// go to the local sink of the emitting thread, if any, or are discarded.
///
/// # Errors
///
/// An error is returned if a global sink has already been set.
pub fn set_global_sink<S>(sink: S) -> Result<(), SetSinkError>
where
    S: Sink + Send + Sync + 'static,
{
    GLOBAL_SINK.set(Box::new(sink)).map_err(|_| SetSinkError(()))
}

/// Sets the sink as the default for the current thread for the lifetime of the returned [`LocalSinkGuard`].
///
/// Local sinks can be nested: the previous local sink, if any, is captured and restored when the returned guard drops.
/// A local sink always takes precedence over the global sink.
#[must_use]
pub fn set_default_local_sink(sink: &dyn Sink) -> LocalSinkGuard<'_> {
    LocalSinkGuard::new(sink)
}

/// Runs the closure with the given sink as the sink of the current thread.
///
/// This only applies as long as the closure is running, and on the calling thread. Instrumented calls made on other
/// threads during that time do not see the sink.
pub fn with_local_sink<T>(sink: &dyn Sink, f: impl FnOnce() -> T) -> T {
    let _local = LocalSinkGuard::new(sink);
    f()
}

/// Runs the closure with a reference to the current sink.
///
/// If a local sink has been set, it is used. Otherwise, the global sink is used. If neither has been set, a no-op sink
/// is used.
pub fn with_sink<T>(f: impl FnOnce(&dyn Sink) -> T) -> T {
    LOCAL_SINK.with(|local_sink| {
        if let Some(sink) = local_sink.get() {
            // SAFETY: A local sink pointer is only present while the guard that placed it is alive, and that guard
            // borrows the sink, so the sink is valid for the duration of this call.
            unsafe { f(sink.as_ref()) }
        } else if let Some(global_sink) = GLOBAL_SINK.get() {
            f(&**global_sink)
        } else {
            f(&NOOP_SINK)
        }
    })
}
