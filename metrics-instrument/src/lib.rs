//! Attach metrics to existing methods without touching their call sites, and detach them again.
//!
//! `metrics-instrument` retrofits call counts and latencies onto code paths such as outbound API calls. A type declares the methods it is willing to have instrumented as [`Method`] dispatch
//! points, and an operator can later wrap any of those methods with one or more instrumentations, and remove them
//! again, at runtime.
//!
//! # Declaring instrumentable methods
//!
//! A [`Method`] captures the original implementation of a method as a plain function pointer. The method body on the
//! type forwards to it, so callers keep calling the method exactly as before:
//!
//! ```
//! use metrics_instrument::{InstrumentationError, Method, Target};
//!
//! #[derive(Debug)]
//! pub enum PostError {
//!     Rejected,
//!     Instrumentation(InstrumentationError),
//! }
//!
//! impl From<InstrumentationError> for PostError {
//!     fn from(e: InstrumentationError) -> Self {
//!         PostError::Instrumentation(e)
//!     }
//! }
//!
//! pub struct Gateway;
//!
//! static SSL_POST: Method<Gateway, (bool,), &'static str, PostError> =
//!     Method::new(Target::of::<Gateway>, "ssl_post", |_, (ok,), _| {
//!         if *ok { Ok("OK") } else { Err(PostError::Rejected) }
//!     });
//!
//! impl Gateway {
//!     pub fn ssl_post(&self, ok: bool) -> Result<&'static str, PostError> {
//!         SSL_POST.call(self, &(ok,))
//!     }
//! }
//!
//! # assert_eq!(Gateway.ssl_post(true).unwrap(), "OK");
//! ```
//!
//! # Instrumenting
//!
//! Instrumentations are registered against the process-wide [`Registry`], either directly or through the shorthand
//! methods on [`Method`]:
//!
//! ```ignore
//! SSL_POST.count_success(Instrumentation::count_success("ActiveMerchant.Gateway").with_sample_rate(0.5))?;
//! // ... every call to `Gateway::ssl_post` now emits `ActiveMerchant.Gateway.success` or `.failure` ...
//! SSL_POST.remove_count_success("ActiveMerchant.Gateway")?;
//! ```
//!
//! Several instrumentations can be stacked on the same method and removed in any order. Removing the last one
//! restores the bare original implementation.
//!
//! # Sinks
//!
//! Emissions are handed to a [`Sink`]. A sink can be installed globally with [`set_global_sink`], or scoped to the
//! current thread with [`with_local_sink`] / [`set_default_local_sink`], mirroring how recorders are installed in
//! `metrics`. When no sink is installed, emissions are discarded.
#![deny(missing_docs)]
#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::type_complexity)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod errors;
pub use self::errors::{BoxError, ConfigurationError, InstrumentationError, NotFoundError};

mod instrumentation;
pub use self::instrumentation::{
    Instrumentation, InstrumentationKey, Predicate, DEFAULT_FAILURE_SUFFIX,
    DEFAULT_MEASURE_ON_ERROR, DEFAULT_SAMPLE_RATE, DEFAULT_SUCCESS_SUFFIX,
};

mod interceptor;

mod kind;
pub use self::kind::{classify, Emit, MetricKind, Outcome};

mod method;
pub use self::method::{Block, Method, Original};

mod name;
pub use self::name::{normalize_name, NameSpec, NameSpecId};

mod registry;
pub use self::registry::{registry, Handle, Registry};

mod sink;
pub use self::sink::{
    set_default_local_sink, set_global_sink, with_local_sink, with_sink, LocalSinkGuard, NoopSink,
    SetSinkError, Sink, SinkError,
};

mod tags;
pub use self::tags::TagSpec;

mod target;
pub use self::target::{MethodKey, Scope, Target};
