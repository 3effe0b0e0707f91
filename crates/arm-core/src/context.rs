use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arm_script::{Value, ValueExt};
use parking_lot::Mutex;

use crate::capabilities::Environment;
use crate::config::EngineConfig;
use crate::error::{ErrorBag, Fault};
use crate::log::Logger;
use crate::namespace::Namespace;
use crate::program::Expression;
use crate::status::ExecutionState;
use crate::stop_control::StopControl;

/// Key presses waiting to be picked up by `Keypress` events. Keys are
/// compared case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct KeyPresses(Arc<Mutex<HashSet<String>>>);

impl KeyPresses {
    pub fn press(&self, key: &str) {
        self.0.lock().insert(key.to_lowercase());
    }

    /// Consumes a pending press of `key`.
    pub fn take(&self, key: &str) -> bool {
        self.0.lock().remove(&key.to_lowercase())
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// Everything a run shares with its controller and with nested runs: the
/// capabilities, cancellation, the error bag, pending keys and the log.
#[derive(Clone)]
pub struct RunHandles {
    pub env: Environment,
    pub config: EngineConfig,
    pub stop: StopControl,
    pub state: Arc<ExecutionState>,
    pub errors: Arc<Mutex<ErrorBag>>,
    faulted: Arc<AtomicBool>,
    pub keys: KeyPresses,
    pub logger: Logger,
    pub depth: usize,
}

impl RunHandles {
    #[must_use]
    pub fn new(env: Environment, config: EngineConfig, logger: Logger) -> Self {
        Self {
            env,
            config,
            stop: StopControl::new(),
            state: Arc::new(ExecutionState::new()),
            errors: Arc::new(Mutex::new(ErrorBag::new())),
            faulted: Arc::new(AtomicBool::new(false)),
            keys: KeyPresses::default(),
            logger,
            depth: 0,
        }
    }

    /// Handles for a nested run: same cancellation, errors, keys and log,
    /// its own position counters.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            state: Arc::new(ExecutionState::new()),
            depth: self.depth + 1,
            ..self.clone()
        }
    }

    /// Records a runtime fault and cancels the whole run.
    pub fn record_fault(&self, fault: &Fault, type_name: &str) {
        self.errors.lock().add(fault.kind.as_str(), type_name);
        self.logger.error(type_name, fault.to_string());
        self.abort();
    }

    /// Cancels the run and marks it as faulted.
    pub(crate) fn abort(&self) {
        self.faulted.store(true, Ordering::Release);
        self.stop.request_stop();
    }

    /// True once any run sharing these handles hit a fault.
    #[must_use]
    pub fn faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    /// Clears cancellation, the fault flag and pending keys for a fresh run.
    pub(crate) fn rearm(&self) {
        self.stop.reset();
        self.faulted.store(false, Ordering::Release);
        self.keys.clear();
    }

    pub fn record_errors(&self, bag: &ErrorBag) {
        self.errors.lock().merge(bag);
    }

    #[must_use]
    pub fn cancelled(&self) -> bool {
        self.stop.is_stopped()
    }
}

pub struct RunContext<'a> {
    pub namespace: &'a mut Namespace,
    pub handles: &'a RunHandles,
}

impl RunContext<'_> {
    #[must_use]
    pub fn cancelled(&self) -> bool {
        self.handles.cancelled()
    }

    #[must_use]
    pub const fn poll(&self) -> Duration {
        self.handles.config.poll_interval()
    }

    /// Interruptible sleep. Returns `false` if the run was cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        self.handles.stop.sleep_interruptible(duration, self.poll())
    }

    pub fn evaluate(&mut self, expression: &Expression) -> Result<Value, Fault> {
        Ok(self.namespace.evaluate_expression(expression.as_str())?)
    }

    pub fn evaluate_number(&mut self, expression: &Expression) -> Result<f64, Fault> {
        Ok(self.evaluate(expression)?.to_number()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_case_insensitive_and_consumed() {
        let keys = KeyPresses::default();
        keys.press("Space");
        assert!(keys.take("space"));
        assert!(!keys.take("space"));
    }

    #[test]
    fn test_child_shares_stop_and_errors() {
        let parent = RunHandles::new(
            Environment::new(),
            EngineConfig::default(),
            Logger::new("test"),
        );
        let child = parent.child();
        assert_eq!(child.depth, 1);

        child.record_fault(&Fault::new("NameError", "name 'y' is not defined"), "SetVariable");
        assert!(parent.cancelled());
        assert!(parent.faulted());
        assert_eq!(
            parent.errors.lock().get("NameError").unwrap(),
            ["SetVariable".to_string()]
        );

        child.state.set_event(1);
        assert!(parent.state.snapshot().is_idle());
    }
}
