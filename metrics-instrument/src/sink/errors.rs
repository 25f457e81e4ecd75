use std::io;

use thiserror::Error;

/// The type returned by [`set_global_sink`][crate::set_global_sink] if a global sink has already been installed.
#[derive(Debug, Error)]
#[error("attempted to set a sink after the instrumentation system was already initialized")]
pub struct SetSinkError(pub(crate) ());

/// Errors a sink can report when asked to emit.
///
/// These are observability failures: the instrumented call never sees them.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The backend could not be reached.
    #[error("sink unavailable: {reason}")]
    Unavailable {
        /// Details about why the backend is unavailable.
        reason: String,
    },

    /// Writing the emission failed.
    #[error("failed to write emission: {0}")]
    Io(#[from] io::Error),
}
