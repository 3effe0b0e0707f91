use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use arm_script::Value;
use indexmap::IndexMap;
use nanoid::nanoid;
use parking_lot::Mutex;

use crate::capabilities::Environment;
use crate::config::EngineConfig;
use crate::constants::CoreConstants;
use crate::context::RunHandles;
use crate::error::{EngineError, ErrorBag, Result};
use crate::events::FinishReason;
use crate::log::{Logger, SharedLogOutput};
use crate::program::{EventRecord, Program, ProgramFile};
use crate::scheduler::Scheduler;
use crate::status::Status;
use crate::stop_control::StopControl;

/// Owns a built program and the worker that runs it.
///
/// The controller is the only place that starts runs. Everything a run needs
/// to talk back (status, errors, cancellation, log) lives in shared handles,
/// so the caller thread can poll and cancel while the worker ticks.
pub struct Engine {
    handles: RunHandles,
    program: Option<Program>,
    variables: IndexMap<String, Value>,
    last_variables: Arc<Mutex<IndexMap<String, Value>>>,
    finish: Arc<Mutex<Option<FinishReason>>>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Engine {
    #[must_use]
    pub fn new(env: Environment, config: EngineConfig) -> Self {
        let length = CoreConstants::RUN_ID_LENGTH;
        let run_id = nanoid!(length);
        Self::from_handles(RunHandles::new(env, config, Logger::new(run_id)))
    }

    fn from_handles(handles: RunHandles) -> Self {
        Self {
            handles,
            program: None,
            variables: IndexMap::new(),
            last_variables: Arc::new(Mutex::new(IndexMap::new())),
            finish: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    #[must_use]
    pub fn with_log_output(mut self, output: SharedLogOutput) -> Self {
        self.handles.logger = self.handles.logger.clone().with_output(output);
        self
    }

    /// Variables the namespace is seeded with at the start of every run.
    #[must_use]
    pub fn with_variables(mut self, variables: IndexMap<String, Value>) -> Self {
        self.variables = variables;
        self
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        self.handles.logger.run_id()
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.handles.config
    }

    #[must_use]
    pub const fn env(&self) -> &Environment {
        &self.handles.env
    }

    /// Nesting level: 0 for an engine created with [`Engine::new`].
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.handles.depth
    }

    #[must_use]
    pub const fn program(&self) -> Option<&Program> {
        self.program.as_ref()
    }

    /// Builds the program to run next and returns its compile errors. The
    /// program is kept even when errors were found; broken commands and
    /// events simply refuse to do anything.
    pub fn build_program(&mut self, records: &[EventRecord]) -> ErrorBag {
        let (program, errors) = Program::build(records, &self.handles.env);
        for (message, names) in errors.iter() {
            self.handles.logger.warn(
                CoreConstants::SYSTEM_ACTIVITY,
                format!("{message}: {}", names.join(", ")),
            );
        }
        self.handles.record_errors(&errors);
        log::debug!(
            "[{}] built {} events, {} compile errors",
            self.run_id(),
            program.len(),
            errors.len()
        );
        self.program = Some(program);
        errors
    }

    /// Parses a serialized program and builds it.
    pub fn build_from_json(&mut self, json: &str) -> Result<ErrorBag> {
        let file = ProgramFile::from_json(json)?;
        Ok(self.build_program(&file.events))
    }

    /// Runs the built program, on a worker thread when `threaded`, otherwise
    /// on the calling thread until the run ends.
    pub fn run(&mut self, threaded: bool) -> Result<()> {
        if self.is_running() {
            return Err(EngineError::AlreadyRunning);
        }
        self.join()?;

        let mut program = self.program.clone().ok_or(EngineError::NotBuilt)?;
        program.reset_triggers();
        if self.handles.depth == 0 {
            self.handles.rearm();
        }
        *self.finish.lock() = None;
        self.running.store(true, Ordering::Release);

        let job = RunJob {
            program,
            handles: self.handles.clone(),
            variables: self.variables.clone(),
            last_variables: Arc::clone(&self.last_variables),
            finish: Arc::clone(&self.finish),
            running: RunningGuard(Arc::clone(&self.running)),
        };

        if !threaded {
            job.execute();
            return Ok(());
        }

        let spawned = thread::Builder::new()
            .name(CoreConstants::ENGINE_THREAD_NAME.to_string())
            .spawn(move || job.execute());
        match spawned {
            Ok(worker) => {
                self.worker = Some(worker);
                Ok(())
            }
            Err(err) => {
                self.running.store(false, Ordering::Release);
                Err(err.into())
            }
        }
    }

    /// Asks the current run, and every nested run, to stop. Safe to call
    /// from any thread and any number of times.
    pub fn request_cancel(&self) {
        if self.is_running() && !self.handles.cancelled() {
            self.handles
                .logger
                .info(CoreConstants::SYSTEM_ACTIVITY, "Cancel requested");
        }
        self.handles.stop.request_stop();
    }

    /// A handle another thread can use to cancel the run.
    #[must_use]
    pub fn cancel_handle(&self) -> StopControl {
        self.handles.stop.clone()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.handles.state.snapshot()
    }

    /// Returns the accumulated errors and clears them.
    #[must_use]
    pub fn last_errors(&self) -> ErrorBag {
        self.handles.errors.lock().take()
    }

    /// Queues a key press for `Keypress` events.
    pub fn press_key(&self, key: &str) {
        self.handles.keys.press(key);
    }

    /// Namespace contents at the end of the last finished run.
    #[must_use]
    pub fn variables(&self) -> IndexMap<String, Value> {
        self.last_variables.lock().clone()
    }

    #[must_use]
    pub fn finish_reason(&self) -> Option<FinishReason> {
        *self.finish.lock()
    }

    /// Waits for a threaded run to end.
    pub fn join(&mut self) -> Result<()> {
        if let Some(worker) = self.worker.take() {
            worker.join().map_err(|_| EngineError::WorkerPanicked)?;
        }
        Ok(())
    }

    /// Builds `file` in a child engine that shares this engine's capabilities,
    /// cancellation, errors and log. On compile errors the child is dropped,
    /// this engine is cancelled and the errors are returned.
    pub fn spawn_child(&self, file: &ProgramFile) -> std::result::Result<Self, ErrorBag> {
        Self::nested(&self.handles, file)
    }

    pub(crate) fn nested(
        parent: &RunHandles,
        file: &ProgramFile,
    ) -> std::result::Result<Self, ErrorBag> {
        let mut child = Self::from_handles(parent.child());
        let errors = child.build_program(&file.events);
        if errors.is_empty() {
            return Ok(child);
        }

        parent.logger.error(
            CoreConstants::SYSTEM_ACTIVITY,
            format!("Program '{}' failed to build", file.name),
        );
        parent.abort();
        Err(errors)
    }

    /// Runs a child synchronously and reports how it ended.
    pub(crate) fn run_nested(&mut self) -> Result<FinishReason> {
        self.run(false)?;
        Ok(self.finish_reason().unwrap_or(FinishReason::Cancelled))
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.handles.stop.request_stop();
            let _ = worker.join();
        }
    }
}

/// Clears the running flag even if the worker panics.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct RunJob {
    program: Program,
    handles: RunHandles,
    variables: IndexMap<String, Value>,
    last_variables: Arc<Mutex<IndexMap<String, Value>>>,
    finish: Arc<Mutex<Option<FinishReason>>>,
    running: RunningGuard,
}

impl RunJob {
    fn execute(self) {
        let Self {
            program,
            handles,
            variables,
            last_variables,
            finish,
            running,
        } = self;
        let root = handles.depth == 0;

        handles.logger.info(
            CoreConstants::SYSTEM_ACTIVITY,
            format!("Run started ({} events)", program.len()),
        );
        program.start_tracking(&handles.env, &handles.logger);

        let mut scheduler = Scheduler::new(program, handles.clone(), variables);
        let reason = scheduler.run();

        if root && let Ok(vision) = handles.env.vision() {
            vision.end_all_tracking();
        }
        *last_variables.lock() = scheduler.namespace().snapshot();
        handles.state.reset();
        handles.logger.info(
            CoreConstants::SYSTEM_ACTIVITY,
            format!("Run finished: {reason:?} after {} ticks", scheduler.ticks()),
        );
        *finish.lock() = Some(reason);
        drop(running);

        if root {
            let errors = handles.errors.lock().clone();
            handles.logger.finished(reason, &errors);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::LogEntry;
    use crate::sim::{InMemoryObjects, SimulatedVision};
    use std::time::{Duration, Instant};

    fn engine(env: Environment) -> (Engine, Arc<Mutex<Vec<LogEntry>>>) {
        let logs = Arc::new(Mutex::new(Vec::new()));
        let engine = Engine::new(env, EngineConfig::default()).with_log_output(logs.clone());
        (engine, logs)
    }

    #[test]
    fn test_run_before_build_fails() {
        let (mut engine, _) = engine(Environment::new());
        assert!(matches!(engine.run(false), Err(EngineError::NotBuilt)));
    }

    #[test]
    fn test_sync_run_keeps_variables() {
        let (mut engine, _) = engine(Environment::new());
        let errors = engine
            .build_from_json(
                r#"[{"type": "Init", "commandList": [
                    {"type": "SetVariable", "parameters": {"variable": "x", "expression": "seed * 2"}}
                ]}]"#,
            )
            .unwrap();
        assert!(errors.is_empty());
        engine.set_variable("seed", Value::Number(21.0));

        engine.run(false).unwrap();
        assert!(!engine.is_running());
        assert_eq!(engine.finish_reason(), Some(FinishReason::Completed));
        assert_eq!(engine.variables().get("x"), Some(&Value::Number(42.0)));
        assert!(engine.status().is_idle());
    }

    #[test]
    fn test_threaded_run_cancels_quickly() {
        let (mut engine, _) = engine(Environment::new());
        engine
            .build_from_json(
                r#"[{"type": "Init", "commandList": [{"type": "Wait", "parameters": {"seconds": 30}}]}]"#,
            )
            .unwrap();
        engine.run(true).unwrap();
        assert!(matches!(engine.run(true), Err(EngineError::AlreadyRunning)));

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(engine.status().event_index, 0);

        let cancelled = Instant::now();
        engine.request_cancel();
        engine.request_cancel();
        engine.join().unwrap();
        assert!(cancelled.elapsed() < Duration::from_millis(500));
        assert!(!engine.is_running());
        assert_eq!(engine.finish_reason(), Some(FinishReason::Cancelled));
    }

    #[test]
    fn test_rerun_after_cancel() {
        let (mut engine, _) = engine(Environment::new());
        engine
            .build_from_json(r#"[{"type": "Init", "commandList": [{"type": "ExitProgram"}]}]"#)
            .unwrap();
        engine.request_cancel();
        engine.run(false).unwrap();
        assert_eq!(engine.finish_reason(), Some(FinishReason::Exited));
    }

    #[test]
    fn test_last_errors_is_consumed() {
        let (mut engine, _) = engine(Environment::new());
        let errors = engine
            .build_from_json(r#"[{"type": "Init", "commandList": [{"type": "MoveXYZ", "parameters": {"x": 1, "y": 2, "z": 3}}]}]"#)
            .unwrap();
        assert_eq!(errors.get("Robot is not connected").unwrap(), ["MoveXYZ".to_string()]);

        assert!(!engine.last_errors().is_empty());
        assert!(engine.last_errors().is_empty());
    }

    #[test]
    fn test_child_build_failure_cancels_parent() {
        let (engine, _) = engine(Environment::new());
        let child = ProgramFile::from_json(
            r#"{"name": "child", "events": [{"type": "Tip"}]}"#,
        )
        .unwrap();
        let errors = engine.spawn_child(&child).err().unwrap();
        assert!(errors.contains("Robot is not connected"));
        assert!(engine.cancel_handle().is_stopped());
        assert!(engine.last_errors().contains("Robot is not connected"));
    }

    #[test]
    fn test_root_ends_tracking() {
        let vision = Arc::new(SimulatedVision::new());
        let env = Environment::new()
            .with_vision(vision.clone())
            .with_objects(Arc::new(InMemoryObjects::new().with_trackable("cup")));
        let (mut engine, _) = engine(env);
        engine
            .build_from_json(
                r#"[{"type": "RecognizeObject", "parameters": {"object": "cup"}},
                    {"type": "Init", "commandList": [{"type": "ExitProgram"}]}]"#,
            )
            .unwrap();
        engine.run(false).unwrap();
        assert!(vision.tracked().is_empty());
    }
}
