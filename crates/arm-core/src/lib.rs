pub mod bindings;
pub mod capabilities;
pub mod config;
pub mod constants;
pub mod context;
pub mod engine;
pub mod error;
pub mod evaluator_adapter;
pub mod events;
pub mod interpreter;
pub mod log;
pub mod namespace;
pub mod program;
pub mod scheduler;
pub mod sim;
pub mod status;
pub mod stop_control;
pub mod utils;
pub mod validation;

pub use capabilities::{
    CapabilityError, Coords, Environment, ObjectManager, Recognition, Recording, RecordingFrame,
    Robot, ServoAngles, Settings, Vision,
};
pub use config::EngineConfig;
pub use constants::{CommandDefaults, CompileMessages, CoreConstants};
pub use engine::Engine;
pub use error::{EngineError, ErrorBag, Fault, Result};
pub use events::{ExecutionEvent, FinishReason};
pub use interpreter::{ListOutcome, Signal};
pub use log::{LogEntry, LogLevel, LogOutput, SharedLogOutput, get_timestamp};
pub use namespace::Namespace;
pub use program::{
    Command, CommandKind, CommandRecord, Event, EventKind, EventRecord, Program, ProgramFile,
};
pub use scheduler::{Scheduler, TickOutcome};
pub use status::Status;
pub use stop_control::StopControl;
pub use validation::{ProgramValidator, ValidationIssue, ValidationLevel, ValidationResult};
