//! In-process host bridge.

use super::host::{HostBridge, SpecificationHandle};
use crate::cancellation::CancellationToken;
use crate::specification::ScriptSpecification;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Number of status lines a [`LocalBridge`] keeps; older lines are dropped.
pub const MAX_STATUSES: usize = 256;

/// A [`HostBridge`] that lives in the same process as the loader.
///
/// Interruption is driven by a shared [`CancellationToken`]; status lines are
/// logged and the most recent [`MAX_STATUSES`] are kept for inspection.
#[derive(Debug)]
pub struct LocalBridge {
    session_id: String,
    executor_id: String,
    context_path: Option<String>,
    specification: Arc<ScriptSpecification>,
    token: Arc<CancellationToken>,
    statuses: RwLock<VecDeque<String>>,
}

impl LocalBridge {
    /// Creates a bridge for the given executor description.
    ///
    /// The session id is generated; the executor id is taken from the
    /// specification.
    #[must_use]
    pub fn new(specification: Arc<ScriptSpecification>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            executor_id: specification.id.clone(),
            context_path: None,
            specification,
            token: Arc::new(CancellationToken::new()),
            statuses: RwLock::new(VecDeque::new()),
        }
    }

    /// Sets the session id.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Sets the context path.
    #[must_use]
    pub fn with_context_path(mut self, context_path: impl Into<String>) -> Self {
        self.context_path = Some(context_path.into());
        self
    }

    /// Shares an existing cancellation token.
    #[must_use]
    pub fn with_token(mut self, token: Arc<CancellationToken>) -> Self {
        self.token = token;
        self
    }

    /// Asks the running module to stop.
    pub fn interrupt(&self, reason: impl Into<String>) {
        self.token.cancel(reason);
    }

    /// Returns the token backing [`HostBridge::is_interrupted`].
    #[must_use]
    pub fn token(&self) -> &Arc<CancellationToken> {
        &self.token
    }

    /// Returns the retained status lines, oldest first.
    #[must_use]
    pub fn statuses(&self) -> Vec<String> {
        self.statuses.read().iter().cloned().collect()
    }

    /// Removes and returns the retained status lines, oldest first.
    pub fn take_statuses(&self) -> Vec<String> {
        self.statuses.write().drain(..).collect()
    }
}

impl HostBridge for LocalBridge {
    fn is_interrupted(&self) -> bool {
        self.token.poll()
    }

    fn session_id(&self) -> String {
        self.session_id.clone()
    }

    fn context_path(&self) -> Option<String> {
        self.context_path.clone()
    }

    fn show_status(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            executor_id = %self.executor_id,
            "Status: {}", message
        );
        let mut statuses = self.statuses.write();
        if statuses.len() == MAX_STATUSES {
            statuses.pop_front();
        }
        statuses.push_back(message.to_string());
    }

    fn specification(&self) -> Arc<dyn SpecificationHandle> {
        self.specification.clone()
    }

    fn executor_id(&self) -> String {
        self.executor_id.clone()
    }
}
