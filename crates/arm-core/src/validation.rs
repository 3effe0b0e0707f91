use thiserror::Error;

use crate::constants::CoreConstants;
use crate::log::Logger;
use crate::program::{Command, CommandKind, Program};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockError {
    #[error("EndBlock at position {0} has no matching StartBlock")]
    UnmatchedEnd(usize),

    #[error("StartBlock at position {0} is never closed")]
    Unclosed(usize),

    #[error("Else at position {0} must follow an EndBlock and precede a StartBlock")]
    DanglingElse(usize),
}

/// Depth of every command in the list: the number of open blocks enclosing
/// it. A block's own `StartBlock` and `EndBlock` sit at the outer depth.
pub fn block_depths(commands: &[Command]) -> Result<Vec<usize>, BlockError> {
    let mut depths = Vec::with_capacity(commands.len());
    let mut open: Vec<usize> = Vec::new();

    for (index, command) in commands.iter().enumerate() {
        if command.is_block_start() {
            depths.push(open.len());
            open.push(index);
        } else if command.is_block_end() {
            if open.pop().is_none() {
                return Err(BlockError::UnmatchedEnd(index));
            }
            depths.push(open.len());
        } else {
            if command.is_else() {
                let after_end = index > 0 && commands[index - 1].is_block_end();
                let before_start = commands.get(index + 1).is_some_and(Command::is_block_start);
                if !after_end || !before_start {
                    return Err(BlockError::DanglingElse(index));
                }
            }
            depths.push(open.len());
        }
    }

    match open.first() {
        Some(&index) => Err(BlockError::Unclosed(index)),
        None => Ok(depths),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub level: ValidationLevel,
    pub event_index: usize,
    pub command_index: Option<usize>,
    pub message: String,
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn log_to(&self, logger: &Logger) {
        if self.errors.is_empty() && self.warnings.is_empty() {
            return;
        }

        let error_count = self.errors.len();
        let warning_count = self.warnings.len();
        let summary = format!(
            "Validation: {} error{}, {} warning{}",
            error_count,
            if error_count == 1 { "" } else { "s" },
            warning_count,
            if warning_count == 1 { "" } else { "s" }
        );
        if error_count > 0 {
            logger.error(CoreConstants::SYSTEM_ACTIVITY, summary);
        } else {
            logger.warn(CoreConstants::SYSTEM_ACTIVITY, summary);
        }

        for error in &self.errors {
            logger.error(
                CoreConstants::SYSTEM_ACTIVITY,
                format!("[{}] {}", error.code, error.message),
            );
        }
        for warning in &self.warnings {
            logger.warn(
                CoreConstants::SYSTEM_ACTIVITY,
                format!("[{}] {}", warning.code, warning.message),
            );
        }
    }
}

/// Static checks over a built program. Errors mirror what the build already
/// rejected; warnings point at things that will fail or misbehave at run time.
pub struct ProgramValidator<'a> {
    program: &'a Program,
}

impl<'a> ProgramValidator<'a> {
    #[must_use]
    pub const fn new(program: &'a Program) -> Self {
        Self { program }
    }

    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        for (event_index, event) in self.program.events().iter().enumerate() {
            for message in event.errors() {
                result.errors.push(issue(
                    ValidationLevel::Error,
                    event_index,
                    None,
                    "E001",
                    format!("{} event: {message}", event.type_name()),
                ));
            }
            if let Some(reason) = event.disabled_reason() {
                result.errors.push(issue(
                    ValidationLevel::Error,
                    event_index,
                    None,
                    "E002",
                    format!("{} event disabled: {reason}", event.type_name()),
                ));
            }

            let commands = event.commands();
            for (command_index, command) in commands.iter().enumerate() {
                for message in command.errors() {
                    result.errors.push(issue(
                        ValidationLevel::Error,
                        event_index,
                        Some(command_index),
                        "E003",
                        format!("{}: {message}", command.type_name()),
                    ));
                }

                if let Err(message) = check_syntax(command.kind()) {
                    result.warnings.push(issue(
                        ValidationLevel::Warning,
                        event_index,
                        Some(command_index),
                        "W001",
                        format!("{}: {message}", command.type_name()),
                    ));
                }

                let followed_by_block = commands
                    .get(command_index + 1)
                    .is_some_and(Command::is_block_start);
                if command.kind().is_test() && !followed_by_block {
                    result.warnings.push(issue(
                        ValidationLevel::Warning,
                        event_index,
                        Some(command_index),
                        "W002",
                        format!(
                            "{} result is unused: no StartBlock follows it",
                            command.type_name()
                        ),
                    ));
                }
            }
        }

        result
    }
}

fn issue(
    level: ValidationLevel,
    event_index: usize,
    command_index: Option<usize>,
    code: &str,
    message: String,
) -> ValidationIssue {
    ValidationIssue {
        level,
        event_index,
        command_index,
        message,
        code: code.to_string(),
    }
}

fn check_syntax(kind: &CommandKind) -> Result<(), String> {
    let expressions = match kind {
        CommandKind::SetVariable { expression, .. }
        | CommandKind::TestVariable { expression, .. } => vec![expression],
        CommandKind::Wait { seconds } => vec![seconds],
        CommandKind::MoveXyz { x, y, z, .. } => vec![x, y, z],
        CommandKind::MoveWrist { angle, .. } => vec![angle],
        CommandKind::Speed { speed } => vec![speed],
        CommandKind::Buzzer {
            frequency,
            duration,
        } => vec![frequency, duration],
        CommandKind::TestCoordinate { value, .. } => vec![value],
        CommandKind::Script { code } => {
            return arm_script::parse_script(code)
                .map(|_| ())
                .map_err(|err| err.to_string());
        }
        CommandKind::Log { message } => {
            return arm_script::parse_template(message)
                .map(|_| ())
                .map_err(|err| err.to_string());
        }
        _ => Vec::new(),
    };

    for expression in expressions {
        arm_script::parse_expr(expression.as_str())
            .map_err(|err| format!("'{expression}': {err}"))?;
    }
    Ok(())
}
