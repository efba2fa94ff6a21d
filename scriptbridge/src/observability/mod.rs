//! Observability utilities.
//!
//! Everything logs through `tracing`; hosts that do not install their own
//! subscriber can call [`init_tracing`].

mod logging;
mod timing;

pub use logging::{init_tracing, LogFormat, DEFAULT_FILTER};
pub use timing::{InvocationTimings, SpanTimer};
