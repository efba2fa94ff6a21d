//! Testing utilities for hosts and modules.
//!
//! This module provides:
//! - Mock bridges and native modules
//! - Script fixtures on disk
//! - Assertions for invocation reports and errors

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_error_kind, assert_output_absent, assert_output_value, assert_result,
};
pub use fixtures::{ScriptFixture, TestHost};
pub use mocks::{FailingModule, InterruptAfterBridge, RecordingModule};
