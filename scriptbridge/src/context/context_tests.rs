//! Tests for context state and execution contexts.

#[cfg(test)]
mod tests {
    use crate::bridge::{HostBridge, LocalBridge, MockHostBridge, PlatformDescriptor};
    use crate::context::{ContextState, ExecutionContext, Inputs, Outputs, Params};
    use crate::specification::ScriptSpecification;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn local_bridge(context_path: &str) -> Arc<LocalBridge> {
        let spec = ScriptSpecification::new("exec-7", "Sleep loop", "sleep.lua");
        Arc::new(
            LocalBridge::new(Arc::new(spec))
                .with_session_id("session-1")
                .with_context_path(context_path),
        )
    }

    #[test]
    fn test_new_state_is_detached() {
        let state = ContextState::new();
        assert!(!state.is_attached());
        assert!(state.bridge().is_none());
        assert!(state.context_path().is_none());
        assert!(state.working_dir().is_none());
        assert!(!state.is_interrupted());
    }

    #[test]
    fn test_attach_copies_context_path() {
        let state = ContextState::new();
        state.attach_run(local_bridge("chain/sub/3"));

        assert!(state.is_attached());
        assert_eq!(state.context_path(), Some("chain/sub/3".to_string()));

        state.detach_run();
        assert!(!state.is_attached());
        assert!(state.context_path().is_none());
    }

    #[test]
    fn test_attach_replaces_previous_run() {
        let state = ContextState::new();
        state.attach_run(local_bridge("first"));
        state.attach_run(local_bridge("second"));

        assert_eq!(state.context_path(), Some("second".to_string()));
    }

    /// A bridge whose identity depends on the state it is attached to.
    #[derive(Debug)]
    struct StateAwareBridge {
        state: Arc<ContextState>,
        spec: Arc<ScriptSpecification>,
    }

    impl HostBridge for StateAwareBridge {
        fn is_interrupted(&self) -> bool {
            false
        }

        fn session_id(&self) -> String {
            format!("attached-{}", self.state.is_attached())
        }

        fn context_path(&self) -> Option<String> {
            self.state.context_path().or_else(|| Some("fresh".to_string()))
        }

        fn show_status(&self, _message: &str) {}

        fn specification(&self) -> Arc<dyn crate::bridge::SpecificationHandle> {
            self.spec.clone()
        }

        fn executor_id(&self) -> String {
            format!("exec-{}", self.state.working_dir().is_some())
        }
    }

    #[test]
    fn test_attach_with_bridge_reading_state() {
        let state = Arc::new(ContextState::new());
        let spec = Arc::new(ScriptSpecification::new("exec-9", "Aware", "aware.lua"));
        let aware = || {
            Arc::new(StateAwareBridge {
                state: Arc::clone(&state),
                spec: Arc::clone(&spec),
            })
        };

        state.attach_run(aware());
        assert_eq!(state.context_path(), Some("fresh".to_string()));

        state.attach_run(aware());
        assert_eq!(state.snapshot().session_id, Some("attached-true".to_string()));

        state.detach_run();
        assert!(!state.is_attached());
    }

    #[test]
    fn test_scoped_attach_detaches_on_drop() {
        let state = Arc::new(ContextState::new());
        {
            let guard = state.attach_scoped(local_bridge("scoped"));
            assert!(guard.state().is_attached());
            assert_eq!(state.context_path(), Some("scoped".to_string()));
        }
        assert!(!state.is_attached());
        assert!(state.context_path().is_none());
    }

    #[test]
    fn test_working_dir_and_platform() {
        let state = ContextState::new()
            .with_working_dir("/work")
            .with_platform(PlatformDescriptor::new("lua-local"));

        assert_eq!(state.working_dir(), Some(PathBuf::from("/work")));
        assert_eq!(state.platform().unwrap().id, "lua-local");

        state.set_working_dir("/other");
        assert_eq!(state.working_dir(), Some(PathBuf::from("/other")));
        state.clear_working_dir();
        assert!(state.working_dir().is_none());
    }

    #[test]
    fn test_snapshot() {
        let state = ContextState::new().with_working_dir("/work");
        state.attach_run(local_bridge("chain/a"));

        let snapshot = state.snapshot();
        assert_eq!(snapshot.working_dir, Some(PathBuf::from("/work")));
        assert_eq!(snapshot.context_path, Some("chain/a".to_string()));
        assert_eq!(snapshot.session_id, Some("session-1".to_string()));
        assert_eq!(snapshot.executor_id, Some("exec-7".to_string()));
        assert!(snapshot.platform_id.is_none());
    }

    #[test]
    fn test_state_interruption_uses_bridge() {
        let mut bridge = MockHostBridge::new();
        bridge.expect_context_path().return_const(None::<String>);
        bridge.expect_session_id().return_const("s".to_string());
        bridge.expect_executor_id().return_const("e".to_string());
        bridge.expect_is_interrupted().times(1).return_const(true);

        let state = ContextState::new();
        state.attach_run(Arc::new(bridge));

        assert!(state.is_interrupted());
    }

    #[test]
    fn test_execution_context_token_interrupts() {
        let ctx = ExecutionContext::default();
        assert!(!ctx.is_interrupted());

        ctx.token().cancel("stop");
        assert!(ctx.is_interrupted());
        assert_eq!(ctx.token().poll_count(), 2);
    }

    #[test]
    fn test_execution_context_polls_attached_bridge() {
        let bridge = local_bridge("chain");
        let state = Arc::new(ContextState::new());
        state.attach_run(bridge.clone());

        let ctx = ExecutionContext::default().with_state(state);
        assert!(!ctx.is_interrupted());

        bridge.interrupt("host stop");
        assert!(ctx.is_interrupted());
    }

    #[test]
    fn test_execution_context_status_reaches_bridge() {
        let bridge = local_bridge("chain");
        let state = Arc::new(ContextState::new());
        state.attach_run(bridge.clone());

        let ctx = ExecutionContext::default().with_state(state);
        ctx.show_status("halfway");

        assert_eq!(bridge.statuses(), vec!["halfway".to_string()]);
    }

    #[test]
    fn test_params_context_back_reference() {
        let state = Arc::new(ContextState::new().with_working_dir("/work"));
        let params = Params::default().with_context(state.clone());

        let ctx = ExecutionContext::new(params, Inputs::default(), Outputs::default());
        let back = ctx.params.context().unwrap();
        assert!(Arc::ptr_eq(back, &state));
        assert_ne!(ctx.invocation_id(), ExecutionContext::default().invocation_id());
    }

    #[test]
    fn test_bridge_debug_does_not_panic() {
        let bridge: Arc<dyn HostBridge> = local_bridge("chain");
        let text = format!("{bridge:?}");
        assert!(text.contains("session-1"));
    }
}
