use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::time::SystemTime;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::ErrorBag;
use crate::events::{ExecutionEvent, FinishReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Debug,
}

impl LogLevel {
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
            Self::Debug => "DEBUG",
        }
    }

    const fn as_log_level(self) -> log::Level {
        match self {
            Self::Info => log::Level::Info,
            Self::Warning => log::Level::Warn,
            Self::Error => log::Level::Error,
            Self::Debug => log::Level::Debug,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub activity: String,
    pub message: String,
}

pub trait LogOutput {
    fn log(&mut self, entry: LogEntry);

    fn finished(&mut self, _reason: FinishReason, _errors: &ErrorBag) {}
}

impl LogOutput for Vec<LogEntry> {
    fn log(&mut self, entry: LogEntry) {
        self.push(entry);
    }
}

impl LogOutput for Sender<ExecutionEvent> {
    fn log(&mut self, entry: LogEntry) {
        let _ = self.send(ExecutionEvent::Log(entry));
    }

    fn finished(&mut self, reason: FinishReason, errors: &ErrorBag) {
        let _ = self.send(ExecutionEvent::Finished {
            reason,
            errors: errors.clone(),
        });
    }
}

pub type SharedLogOutput = Arc<Mutex<dyn LogOutput + Send>>;

#[must_use]
pub fn get_timestamp(start_time: SystemTime) -> String {
    let elapsed = start_time.elapsed().unwrap_or_default();
    format!(
        "[{:02}:{:02}.{:03}]",
        elapsed.as_secs() / 60,
        elapsed.as_secs() % 60,
        elapsed.subsec_millis()
    )
}

/// Writes engine log lines to the `log` facade and, when attached, to a
/// caller-provided output. Clones share the output and the start time.
#[derive(Clone)]
pub struct Logger {
    start_time: SystemTime,
    run_id: String,
    output: Option<SharedLogOutput>,
}

impl Logger {
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            start_time: SystemTime::now(),
            run_id: run_id.into(),
            output: None,
        }
    }

    #[must_use]
    pub fn with_output(mut self, output: SharedLogOutput) -> Self {
        self.output = Some(output);
        self
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn restart_clock(&mut self) {
        self.start_time = SystemTime::now();
    }

    pub fn log(&self, level: LogLevel, activity: &str, message: impl Into<String>) {
        let message = message.into();
        log::log!(
            target: "arm_core::engine",
            level.as_log_level(),
            "[{}] {activity}: {message}",
            self.run_id
        );

        if let Some(output) = &self.output {
            output.lock().log(LogEntry {
                timestamp: get_timestamp(self.start_time),
                level,
                activity: activity.to_string(),
                message,
            });
        }
    }

    pub fn info(&self, activity: &str, message: impl Into<String>) {
        self.log(LogLevel::Info, activity, message);
    }

    pub fn warn(&self, activity: &str, message: impl Into<String>) {
        self.log(LogLevel::Warning, activity, message);
    }

    pub fn error(&self, activity: &str, message: impl Into<String>) {
        self.log(LogLevel::Error, activity, message);
    }

    pub fn finished(&self, reason: FinishReason, errors: &ErrorBag) {
        log::debug!(target: "arm_core::engine", "[{}] finished: {reason:?}", self.run_id);
        if let Some(output) = &self.output {
            output.lock().finished(reason, errors);
        }
    }
}
