//! Cooperative cancellation.
//!
//! Loaded modules are never preempted. A long-running entry point polls a
//! [`CancellationToken`] (directly, or through `host.is_interrupted()` in a
//! script) at safe points and returns early once it reports cancellation.

mod token;

pub use token::{CancelCallback, CancellationToken};
