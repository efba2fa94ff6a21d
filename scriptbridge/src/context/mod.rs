//! Context management for module execution.
//!
//! This module provides:
//! - The host-owned [`ContextState`] with run attach/detach
//! - Structured `params`/`inputs`/`outputs` records
//! - The per-invocation [`ExecutionContext`]

#[cfg(test)]
mod context_tests;
mod execution;
mod fields;
mod state;

pub use execution::ExecutionContext;
pub use fields::{FieldSet, Inputs, Outputs, Params, Record};
pub use state::{ContextSnapshot, ContextState, RunGuard};
