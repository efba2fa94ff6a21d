//! The per-invocation execution context.

use super::{ContextState, Inputs, Outputs, Params};
use crate::cancellation::CancellationToken;
use std::sync::Arc;
use uuid::Uuid;

/// Everything one call of `execute(params, inputs, outputs)` receives.
///
/// Created by the host immediately before a call and discarded after it.
/// `params` and `inputs` are read-only for the callee; `outputs` holds the
/// slots it fills.
pub struct ExecutionContext {
    invocation_id: Uuid,
    /// Named configuration values.
    pub params: Params,
    /// Named input values.
    pub inputs: Inputs,
    /// Output slots populated by the callee.
    pub outputs: Outputs,
    token: Arc<CancellationToken>,
    state: Option<Arc<ContextState>>,
}

impl ExecutionContext {
    /// Creates a context with a fresh cancellation token.
    #[must_use]
    pub fn new(params: Params, inputs: Inputs, outputs: Outputs) -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            params,
            inputs,
            outputs,
            token: Arc::new(CancellationToken::new()),
            state: None,
        }
    }

    /// Uses a host-provided cancellation token.
    #[must_use]
    pub fn with_token(mut self, token: Arc<CancellationToken>) -> Self {
        self.token = token;
        self
    }

    /// Links the context to the host state so the attached bridge is polled
    /// as well.
    #[must_use]
    pub fn with_state(mut self, state: Arc<ContextState>) -> Self {
        self.state = Some(state);
        self
    }

    /// Returns the generated invocation id.
    #[must_use]
    pub fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }

    /// Returns the cancellation token of this invocation.
    #[must_use]
    pub fn token(&self) -> &Arc<CancellationToken> {
        &self.token
    }

    /// Returns the linked host state, if any.
    #[must_use]
    pub fn state(&self) -> Option<&Arc<ContextState>> {
        self.state.as_ref()
    }

    /// Checks whether the callee should stop.
    ///
    /// True when the token is cancelled or the attached bridge reports an
    /// interruption. Callees poll this at safe points and return normally.
    pub fn is_interrupted(&self) -> bool {
        self.token.poll() || self.state.as_ref().is_some_and(|s| s.is_interrupted())
    }

    /// Reports a status line to the attached bridge, if any.
    pub fn show_status(&self, message: &str) {
        if let Some(bridge) = self.state.as_ref().and_then(|s| s.bridge()) {
            bridge.show_status(message);
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(Params::default(), Inputs::default(), Outputs::default())
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("invocation_id", &self.invocation_id)
            .field("params", &self.params)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}
