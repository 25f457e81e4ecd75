//! Helper sinks used alongside `metrics-instrument`.
//!
//! - [`CaptureSink`] keeps every emission in memory, for tests and debugging.
//! - [`FanoutSink`] hands every emission to several sinks.
//! - [`LogSink`] logs every emission through `tracing`.
//! - [`RecorderSink`] bridges emissions into the `metrics` facade, so that instrumented methods report through whichever
//!   `metrics` recorder/exporter is installed.
#![deny(missing_docs)]
#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod capture;
pub use self::capture::{CaptureSink, Emission};

mod fanout;
pub use self::fanout::{FanoutBuilder, FanoutSink};

mod log;
pub use self::log::LogSink;

mod recorder;
pub use self::recorder::{
    RecorderSink, RecorderSinkBuilder, DEFAULT_GLOBAL_TAGS, DEFAULT_PREFIX,
    DEFAULT_SAMPLING_ENABLED,
};
