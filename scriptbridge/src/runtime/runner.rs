//! Host-side driver for one invocation.

use super::Executable;
use crate::bridge::HostBridge;
use crate::cancellation::CancellationToken;
use crate::context::{ContextState, ExecutionContext, Inputs, Outputs, Params};
use crate::errors::{Result, ScriptbridgeError};
use crate::observability::{InvocationTimings, SpanTimer};
use crate::specification::{ScriptSpecification, DEFAULT_OUTPUT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// What the host passes into one invocation.
#[derive(Debug, Clone, Default)]
pub struct InvocationRequest {
    /// Named configuration values.
    pub params: Params,
    /// Named input values.
    pub inputs: Inputs,
    /// Empty output slots.
    pub outputs: Outputs,
    /// Token to cancel the invocation with; a fresh one is used if unset.
    pub token: Option<Arc<CancellationToken>>,
}

impl InvocationRequest {
    /// Creates a request with open, empty records.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a request whose records use the fields an executor declares.
    ///
    /// Declared parameter defaults are filled in.
    ///
    /// # Errors
    ///
    /// Returns `UndeclaredField` if a default names an undeclared parameter,
    /// which cannot happen for a consistent specification.
    pub fn for_specification(spec: &ScriptSpecification) -> Result<Self> {
        let mut params = Params::new(spec.parameter_fields());
        for (name, value) in spec.parameter_defaults() {
            params = params.with(name, value.clone())?;
        }
        Ok(Self {
            params,
            inputs: Inputs::new(spec.input_fields()),
            outputs: Outputs::new(spec.output_fields()),
            token: None,
        })
    }

    /// Sets the params record.
    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Sets the inputs record.
    #[must_use]
    pub fn with_inputs(mut self, inputs: Inputs) -> Self {
        self.inputs = inputs;
        self
    }

    /// Sets the outputs record.
    #[must_use]
    pub fn with_outputs(mut self, outputs: Outputs) -> Self {
        self.outputs = outputs;
        self
    }

    /// Uses a host-provided cancellation token.
    #[must_use]
    pub fn with_token(mut self, token: Arc<CancellationToken>) -> Self {
        self.token = Some(token);
        self
    }
}

/// What one invocation produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationReport {
    /// Generated invocation id.
    pub invocation_id: Uuid,
    /// Name of the invoked module.
    pub module: String,
    /// The entry point's return value.
    pub result: Option<Value>,
    /// Output slots the call produced, including the default output.
    pub outputs: BTreeMap<String, Value>,
    /// Whether the invocation token was cancelled by the time the call
    /// returned.
    pub cancelled: bool,
    /// Phase durations.
    pub timings: InvocationTimings,
}

impl InvocationReport {
    /// Returns a produced output slot.
    #[must_use]
    pub fn output(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }
}

/// Runs modules against the shared [`ContextState`].
///
/// For each call the runner attaches the host run, builds a fresh
/// [`ExecutionContext`], invokes the module and detaches again, also when
/// the module fails. A returned value is stored in the `output` slot unless
/// the module already filled it.
#[derive(Debug, Clone)]
pub struct ModuleRunner {
    state: Arc<ContextState>,
}

impl ModuleRunner {
    /// Creates a runner over the given state.
    #[must_use]
    pub fn new(state: Arc<ContextState>) -> Self {
        Self { state }
    }

    /// Returns the shared context state.
    #[must_use]
    pub fn state(&self) -> &Arc<ContextState> {
        &self.state
    }

    /// Runs one invocation on the current thread.
    ///
    /// # Errors
    ///
    /// Returns the module's error unchanged.
    pub fn run(
        &self,
        module: &dyn Executable,
        bridge: Arc<dyn HostBridge>,
        request: InvocationRequest,
    ) -> Result<InvocationReport> {
        let mut timer = SpanTimer::start(module.name());
        let guard = self.state.attach_scoped(bridge);

        let InvocationRequest {
            mut params,
            inputs,
            outputs,
            token,
        } = request;
        if params.context().is_none() {
            params = params.with_context(Arc::clone(&self.state));
        }
        let mut ctx = ExecutionContext::new(params, inputs, outputs).with_state(Arc::clone(&self.state));
        if let Some(token) = token {
            ctx = ctx.with_token(token);
        }
        let prepare_ms = timer.lap();

        let outcome = module.execute(&mut ctx);
        let call_ms = timer.lap();

        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                drop(guard);
                warn!(
                    module = %module.name(),
                    invocation_id = %ctx.invocation_id(),
                    error = %err,
                    "Invocation failed"
                );
                return Err(err);
            }
        };

        if let Some(value) = &result {
            if !ctx.outputs.contains(DEFAULT_OUTPUT)
                && !ctx.outputs.set_if_absent(DEFAULT_OUTPUT, value.clone())
            {
                debug!(module = %module.name(), "Outputs do not accept the default slot");
            }
        }
        let cancelled = ctx.token().is_cancelled();
        let invocation_id = ctx.invocation_id();
        drop(guard);
        let outputs_ms = timer.lap();

        let timings = InvocationTimings {
            prepare_ms,
            call_ms,
            outputs_ms,
        };
        debug!(
            module = %module.name(),
            %invocation_id,
            prepare_ms,
            call_ms,
            outputs_ms,
            cancelled,
            "Invocation finished"
        );

        Ok(InvocationReport {
            invocation_id,
            module: module.name().to_string(),
            result,
            outputs: ctx.outputs.into_values(),
            cancelled,
            timings,
        })
    }

    /// Runs one invocation on tokio's blocking pool.
    ///
    /// # Errors
    ///
    /// As [`ModuleRunner::run`], or `Internal` if the blocking task panics.
    pub async fn run_blocking(
        &self,
        module: Arc<dyn Executable>,
        bridge: Arc<dyn HostBridge>,
        request: InvocationRequest,
    ) -> Result<InvocationReport> {
        let runner = self.clone();
        tokio::task::spawn_blocking(move || runner.run(module.as_ref(), bridge, request))
            .await
            .map_err(|e| ScriptbridgeError::Internal(format!("invocation task failed: {e}")))?
    }
}
