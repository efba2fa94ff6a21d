//! The host bridge boundary.
//!
//! The orchestration host owns sessions, executors and status reporting.
//! This module only declares the surface a loaded module may rely on while a
//! run is attached, plus an in-process implementation for simple hosts and
//! tests.

mod host;
mod local;
mod platform;

pub use host::{HostBridge, SpecificationHandle};
#[cfg(test)]
pub use host::{MockHostBridge, MockSpecificationHandle};
pub use local::{LocalBridge, MAX_STATUSES};
pub use platform::PlatformDescriptor;
