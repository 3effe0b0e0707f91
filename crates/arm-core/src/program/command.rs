use std::fmt;
use std::time::Duration;

use arm_script::{ScriptError, Value, ValueExt, values_equal};
use serde::{Deserialize, Serialize};

use crate::capabilities::{CapabilityError, Coords, Environment, ObjectManager};
use crate::constants::{CommandDefaults, CompileMessages};
use crate::context::RunContext;
use crate::engine::Engine;
use crate::error::Fault;
use crate::events::FinishReason;
use crate::interpreter::Signal;
use crate::namespace::Namespace;
use crate::program::CommandRecord;
use crate::utils::{WaitOutcome, wait_until};

/// Source text of an expression. Plain JSON numbers and booleans are
/// accepted and kept as their literal text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ExpressionRepr", into = "String")]
pub struct Expression(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum ExpressionRepr {
    Text(String),
    Number(serde_json::Number),
    Boolean(bool),
}

impl From<ExpressionRepr> for Expression {
    fn from(repr: ExpressionRepr) -> Self {
        match repr {
            ExpressionRepr::Text(text) => Self(text),
            ExpressionRepr::Number(number) => Self(number.to_string()),
            ExpressionRepr::Boolean(flag) => Self(flag.to_string()),
        }
    }
}

impl From<Expression> for String {
    fn from(expression: Expression) -> Self {
        expression.0
    }
}

impl From<&str> for Expression {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl Expression {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[default]
    #[serde(alias = "==")]
    Equal,
    #[serde(alias = "!=")]
    NotEqual,
    #[serde(alias = ">")]
    Greater,
    #[serde(alias = ">=")]
    GreaterEqual,
    #[serde(alias = "<")]
    Less,
    #[serde(alias = "<=")]
    LessEqual,
}

impl Comparison {
    pub fn evaluate(self, lhs: &Value, rhs: &Value) -> Result<bool, ScriptError> {
        match self {
            Self::Equal => values_equal(lhs, rhs, "=="),
            Self::NotEqual => values_equal(lhs, rhs, "!=").map(|equal| !equal),
            Self::Greater => Ok(lhs.to_number()? > rhs.to_number()?),
            Self::GreaterEqual => Ok(lhs.to_number()? >= rhs.to_number()?),
            Self::Less => Ok(lhs.to_number()? < rhs.to_number()?),
            Self::LessEqual => Ok(lhs.to_number()? <= rhs.to_number()?),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    #[serde(alias = "x")]
    X,
    #[serde(alias = "y")]
    Y,
    #[serde(alias = "z")]
    Z,
}

impl Axis {
    #[must_use]
    pub const fn of(self, coords: Coords) -> f64 {
        match self {
            Self::X => coords.x,
            Self::Y => coords.y,
            Self::Z => coords.z,
        }
    }
}

const fn default_move_wait() -> bool {
    CommandDefaults::MOVE_WAIT
}

const fn default_recording_speed() -> f64 {
    CommandDefaults::RECORDING_SPEED
}

const fn default_max_age() -> f64 {
    CommandDefaults::OBJECT_MAX_AGE_SECS
}

const fn default_frames() -> u32 {
    CommandDefaults::FRAMES
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "parameters")]
pub enum CommandKind {
    StartBlock {},
    EndBlock {},
    Else {},
    ExitProgram {},
    EndEvent {},
    SetVariable {
        variable: String,
        expression: Expression,
    },
    TestVariable {
        variable: String,
        #[serde(default)]
        comparison: Comparison,
        expression: Expression,
        #[serde(default)]
        negate: bool,
    },
    Script {
        code: String,
    },
    Log {
        message: String,
    },
    Wait {
        seconds: Expression,
    },
    #[serde(rename = "MoveXYZ")]
    MoveXyz {
        x: Expression,
        y: Expression,
        z: Expression,
        #[serde(default)]
        relative: bool,
        #[serde(default = "default_move_wait")]
        wait: bool,
    },
    MoveWrist {
        angle: Expression,
        #[serde(default)]
        relative: bool,
    },
    Speed {
        speed: Expression,
    },
    Gripper {
        closed: bool,
    },
    Buzzer {
        frequency: Expression,
        duration: Expression,
    },
    TestCoordinate {
        axis: Axis,
        #[serde(default)]
        comparison: Comparison,
        value: Expression,
        #[serde(default)]
        negate: bool,
    },
    MotionRecording {
        recording: String,
        #[serde(default = "default_recording_speed")]
        speed: f64,
        #[serde(default)]
        reversed: bool,
    },
    TestObjectSeen {
        object: String,
        #[serde(rename = "maxAge", default = "default_max_age")]
        max_age: f64,
        #[serde(default)]
        negate: bool,
    },
    WaitForFrame {
        #[serde(default = "default_frames")]
        frames: u32,
    },
    RunProgram {
        program: String,
    },
    /// A record that could not be built. It keeps its slot in the list so a
    /// block after it stays guarded, and it always fails when run.
    #[serde(skip)]
    Invalid {
        record: CommandRecord,
    },
}

impl CommandKind {
    pub const TYPE_NAMES: &'static [&'static str] = &[
        "StartBlock",
        "EndBlock",
        "Else",
        "ExitProgram",
        "EndEvent",
        "SetVariable",
        "TestVariable",
        "Script",
        "Log",
        "Wait",
        "MoveXYZ",
        "MoveWrist",
        "Speed",
        "Gripper",
        "Buzzer",
        "TestCoordinate",
        "MotionRecording",
        "TestObjectSeen",
        "WaitForFrame",
        "RunProgram",
    ];

    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::StartBlock {} => "StartBlock",
            Self::EndBlock {} => "EndBlock",
            Self::Else {} => "Else",
            Self::ExitProgram {} => "ExitProgram",
            Self::EndEvent {} => "EndEvent",
            Self::SetVariable { .. } => "SetVariable",
            Self::TestVariable { .. } => "TestVariable",
            Self::Script { .. } => "Script",
            Self::Log { .. } => "Log",
            Self::Wait { .. } => "Wait",
            Self::MoveXyz { .. } => "MoveXYZ",
            Self::MoveWrist { .. } => "MoveWrist",
            Self::Speed { .. } => "Speed",
            Self::Gripper { .. } => "Gripper",
            Self::Buzzer { .. } => "Buzzer",
            Self::TestCoordinate { .. } => "TestCoordinate",
            Self::MotionRecording { .. } => "MotionRecording",
            Self::TestObjectSeen { .. } => "TestObjectSeen",
            Self::WaitForFrame { .. } => "WaitForFrame",
            Self::RunProgram { .. } => "RunProgram",
            Self::Invalid { record } => record.kind.as_str(),
        }
    }

    /// Commands whose result picks the branch of a following block.
    #[must_use]
    pub const fn is_test(&self) -> bool {
        matches!(
            self,
            Self::TestVariable { .. } | Self::TestCoordinate { .. } | Self::TestObjectSeen { .. }
        )
    }

    const fn needs_robot(&self) -> bool {
        matches!(
            self,
            Self::MoveXyz { .. }
                | Self::MoveWrist { .. }
                | Self::Speed { .. }
                | Self::Gripper { .. }
                | Self::Buzzer { .. }
                | Self::TestCoordinate { .. }
                | Self::MotionRecording { .. }
        )
    }

    const fn needs_vision(&self) -> bool {
        matches!(self, Self::TestObjectSeen { .. } | Self::WaitForFrame { .. })
    }

    /// Missing devices and resources, as compile error messages.
    fn requirements(&self, env: &Environment) -> Vec<String> {
        let mut errors = Vec::new();
        if self.needs_robot() {
            errors.extend(env.robot().err().map(|err| err.to_string()));
        }
        if self.needs_vision() {
            errors.extend(env.vision().err().map(|err| err.to_string()));
        }

        let missing = match self {
            Self::SetVariable { variable, .. } | Self::TestVariable { variable, .. } => {
                (!Namespace::is_valid_name(variable) || Namespace::is_reserved(variable))
                    .then(|| format!("{}: {variable}", CompileMessages::INVALID_VARIABLE))
            }
            Self::MotionRecording { recording, .. } => {
                missing_resource(env, recording, |objects| {
                    objects.recording(recording).is_some()
                })
            }
            Self::TestObjectSeen { object, .. } => {
                missing_resource(env, object, |objects| objects.is_trackable(object))
            }
            Self::RunProgram { program } => {
                missing_resource(env, program, |objects| objects.program(program).is_some())
            }
            _ => None,
        };
        errors.extend(missing);
        errors
    }

    fn execute(&self, ctx: &mut RunContext<'_>) -> Result<Signal, Fault> {
        let handles = ctx.handles;
        let env = &handles.env;

        match self {
            Self::StartBlock {} | Self::EndBlock {} | Self::Else {} => Ok(Signal::Continue(true)),
            Self::ExitProgram {} => Ok(Signal::ExitProgram),
            Self::EndEvent {} => Ok(Signal::ExitEvent),
            Self::Invalid { .. } => Ok(Signal::Continue(false)),

            Self::SetVariable {
                variable,
                expression,
            } => {
                let value = ctx.evaluate(expression)?;
                ctx.namespace.set(variable, value)?;
                Ok(Signal::Continue(true))
            }

            Self::TestVariable {
                variable,
                comparison,
                expression,
                negate,
            } => {
                let current = ctx
                    .namespace
                    .get(variable)
                    .cloned()
                    .ok_or_else(|| ScriptError::Name(variable.clone()))?;
                let expected = ctx.evaluate(expression)?;
                let result = comparison.evaluate(&current, &expected)?;
                Ok(Signal::Continue(result != *negate))
            }

            Self::Script { code } => {
                ctx.namespace.evaluate_script(code)?;
                Ok(Signal::Continue(true))
            }

            Self::Log { message } => {
                let text = ctx.namespace.render(message)?;
                handles.logger.info(self.type_name(), text);
                Ok(Signal::Continue(true))
            }

            Self::Wait { seconds } => {
                let seconds = ctx.evaluate_number(seconds)?;
                let duration = duration_from_secs(seconds)?;
                Ok(Signal::Continue(ctx.sleep(duration)))
            }

            Self::MoveXyz {
                x,
                y,
                z,
                relative,
                wait,
            } => {
                let robot = env.robot()?;
                let mut target = Coords::new(
                    ctx.evaluate_number(x)?,
                    ctx.evaluate_number(y)?,
                    ctx.evaluate_number(z)?,
                );
                if *relative {
                    let current = robot.coords();
                    target.x += current.x;
                    target.y += current.y;
                    target.z += current.z;
                }
                robot.set_coords(target)?;

                if *wait {
                    let outcome = wait_until(&handles.stop, None, ctx.poll(), || {
                        !robot.is_moving()
                    });
                    return Ok(Signal::Continue(outcome == WaitOutcome::Satisfied));
                }
                Ok(Signal::Continue(true))
            }

            Self::MoveWrist { angle, relative } => {
                let robot = env.robot()?;
                let mut angle = ctx.evaluate_number(angle)?;
                if *relative {
                    angle += robot.wrist();
                }
                robot.set_wrist(angle)?;
                Ok(Signal::Continue(true))
            }

            Self::Speed { speed } => {
                let robot = env.robot()?;
                robot.set_speed(ctx.evaluate_number(speed)?)?;
                Ok(Signal::Continue(true))
            }

            Self::Gripper { closed } => {
                env.robot()?.set_gripper(*closed)?;
                Ok(Signal::Continue(true))
            }

            Self::Buzzer {
                frequency,
                duration,
            } => {
                let robot = env.robot()?;
                let frequency = ctx.evaluate_number(frequency)?;
                let duration = ctx.evaluate_number(duration)?;
                robot.buzz(frequency, duration)?;
                Ok(Signal::Continue(true))
            }

            Self::TestCoordinate {
                axis,
                comparison,
                value,
                negate,
            } => {
                let current = axis.of(env.robot()?.coords());
                let expected = ctx.evaluate(value)?;
                let result = comparison.evaluate(&Value::Number(current), &expected)?;
                Ok(Signal::Continue(result != *negate))
            }

            Self::MotionRecording {
                recording,
                speed,
                reversed,
            } => {
                let robot = env.robot()?;
                let recording = env
                    .objects()?
                    .recording(recording)
                    .ok_or_else(|| CapabilityError::ResourceNotFound(recording.clone()))?;
                if !speed.is_finite() || *speed <= 0.0 {
                    return Err(Fault::new(
                        "ValueError",
                        format!("playback speed must be positive, got {speed}"),
                    ));
                }

                #[allow(clippy::cast_precision_loss)]
                let interval = duration_from_secs(recording.frame_interval_ms as f64 / 1000.0 / speed)?;
                let mut frames: Vec<_> = recording.frames.iter().collect();
                if *reversed {
                    frames.reverse();
                }

                let mut gripper = robot.gripper_closed();
                for frame in frames {
                    if ctx.cancelled() {
                        return Ok(Signal::Continue(false));
                    }
                    robot.set_servo_angles(frame.servos)?;
                    if frame.gripper != gripper {
                        robot.set_gripper(frame.gripper)?;
                        gripper = frame.gripper;
                    }
                    if !ctx.sleep(interval) {
                        return Ok(Signal::Continue(false));
                    }
                }
                Ok(Signal::Continue(true))
            }

            Self::TestObjectSeen {
                object,
                max_age,
                negate,
            } => {
                let seen = env
                    .vision()?
                    .recognition(object)
                    .is_some_and(|r| r.age.as_secs_f64() <= *max_age);
                Ok(Signal::Continue(seen != *negate))
            }

            Self::WaitForFrame { frames } => {
                let vision = env.vision()?;
                for _ in 0..*frames {
                    let start = vision.frame_count();
                    let outcome = wait_until(
                        &handles.stop,
                        Some(handles.config.frame_timeout()),
                        ctx.poll(),
                        || vision.frame_count() > start,
                    );
                    if outcome != WaitOutcome::Satisfied {
                        return Ok(Signal::Continue(false));
                    }
                }
                Ok(Signal::Continue(true))
            }

            Self::RunProgram { program } => {
                if handles.depth >= handles.config.max_call_depth {
                    return Err(Fault::recursion(handles.config.max_call_depth));
                }
                let file = env
                    .objects()?
                    .program(program)
                    .ok_or_else(|| CapabilityError::ResourceNotFound(program.clone()))?;

                let Ok(mut child) = Engine::nested(handles, &file) else {
                    return Ok(Signal::Continue(false));
                };
                handles
                    .logger
                    .info(self.type_name(), format!("Running program '{program}'"));
                let reason = child.run_nested().map_err(|err| {
                    Fault::new("EngineError", err.to_string())
                })?;
                Ok(Signal::Continue(matches!(
                    reason,
                    FinishReason::Completed | FinishReason::Exited
                )))
            }
        }
    }
}

fn missing_resource(
    env: &Environment,
    name: &str,
    present: impl Fn(&dyn ObjectManager) -> bool,
) -> Option<String> {
    match env.objects() {
        Ok(objects) if present(objects) => None,
        Ok(_) => Some(CapabilityError::ResourceNotFound(name.to_string()).to_string()),
        Err(err) => Some(err.to_string()),
    }
}

fn duration_from_secs(seconds: f64) -> Result<Duration, Fault> {
    Duration::try_from_secs_f64(seconds).map_err(|_| {
        Fault::new(
            "ValueError",
            format!("duration must be a non-negative number of seconds, got {seconds}"),
        )
    })
}

/// One command of an event's list, with its block depth and the compile
/// errors found when it was built.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    kind: CommandKind,
    indent: usize,
    errors: Vec<String>,
}

impl Command {
    #[must_use]
    pub fn new(kind: CommandKind, env: &Environment) -> Self {
        let errors = kind.requirements(env);
        Self {
            kind,
            indent: 0,
            errors,
        }
    }

    /// Placeholder for a record that failed to build, carrying `message` as
    /// its compile error.
    #[must_use]
    pub fn invalid(record: CommandRecord, message: &str) -> Self {
        Self {
            kind: CommandKind::Invalid { record },
            indent: 0,
            errors: vec![message.to_string()],
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &CommandKind {
        &self.kind
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        self.kind.type_name()
    }

    #[must_use]
    pub const fn indent(&self) -> usize {
        self.indent
    }

    pub(crate) const fn set_indent(&mut self, indent: usize) {
        self.indent = indent;
    }

    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    #[must_use]
    pub const fn is_block_start(&self) -> bool {
        matches!(self.kind, CommandKind::StartBlock {})
    }

    #[must_use]
    pub const fn is_block_end(&self) -> bool {
        matches!(self.kind, CommandKind::EndBlock {})
    }

    #[must_use]
    pub const fn is_else(&self) -> bool {
        matches!(self.kind, CommandKind::Else {})
    }

    /// Runs the command. A command with compile errors does nothing and
    /// reports failure.
    pub fn run(&self, ctx: &mut RunContext<'_>) -> Signal {
        if !self.errors.is_empty() {
            return Signal::Continue(false);
        }
        match self.kind.execute(ctx) {
            Ok(signal) => signal,
            Err(fault) if fault.is_interruption() => Signal::Continue(false),
            Err(fault) => Signal::Fault(fault),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunHandles;
    use crate::log::Logger;
    use crate::sim::{InMemoryObjects, SimulatedRobot, SimulatedVision};
    use crate::capabilities::{Recording, RecordingFrame};
    use crate::config::EngineConfig;
    use crate::sim::RobotCall;
    use std::sync::Arc;
    use std::time::Instant;

    fn kind(json: &str) -> CommandKind {
        serde_json::from_str(json).unwrap()
    }

    fn handles(env: Environment) -> RunHandles {
        RunHandles::new(env, EngineConfig::default(), Logger::new("test"))
    }

    fn run(kind: CommandKind, handles: &RunHandles, ns: &mut Namespace) -> Signal {
        let command = Command::new(kind, &handles.env);
        let mut ctx = RunContext {
            namespace: ns,
            handles,
        };
        command.run(&mut ctx)
    }

    fn namespace(handles: &RunHandles) -> Namespace {
        Namespace::new(handles.env.clone(), handles.stop.clone(), &handles.config)
    }

    #[test]
    fn test_parameters_accept_numbers_and_symbols() {
        let command = kind(
            r#"{"type": "TestVariable", "parameters": {"variable": "x", "comparison": ">=", "expression": 3}}"#,
        );
        assert_eq!(
            command,
            CommandKind::TestVariable {
                variable: "x".to_string(),
                comparison: Comparison::GreaterEqual,
                expression: Expression::from("3"),
                negate: false,
            }
        );
        assert_eq!(command.type_name(), "TestVariable");
        assert!(command.is_test());
    }

    #[test]
    fn test_move_xyz_type_name_round_trips() {
        let command = kind(r#"{"type": "MoveXYZ", "parameters": {"x": 1, "y": 2, "z": "3 + 1"}}"#);
        let CommandKind::MoveXyz { wait, relative, .. } = &command else {
            panic!("expected MoveXYZ");
        };
        assert!(*wait);
        assert!(!*relative);
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json["type"], "MoveXYZ");
        assert_eq!(json["parameters"]["z"], "3 + 1");
    }

    #[test]
    fn test_type_names_cover_every_kind() {
        for name in CommandKind::TYPE_NAMES {
            let json = format!(r#"{{"type": "{name}", "parameters": {{}}}}"#);
            if let Ok(command) = serde_json::from_str::<CommandKind>(&json) {
                assert_eq!(command.type_name(), *name);
            }
        }
    }

    #[test]
    fn test_missing_robot_is_compile_error() {
        let command = Command::new(
            CommandKind::Gripper { closed: true },
            &Environment::new(),
        );
        assert_eq!(command.errors(), ["Robot is not connected".to_string()]);

        let handles = handles(Environment::new());
        let mut ns = namespace(&handles);
        assert_eq!(
            run(CommandKind::Gripper { closed: true }, &handles, &mut ns),
            Signal::Continue(false)
        );
    }

    #[test]
    fn test_missing_resource_is_compile_error() {
        let env = Environment::new()
            .with_vision(Arc::new(SimulatedVision::new()))
            .with_objects(Arc::new(InMemoryObjects::new().with_trackable("cup")));
        let seen = Command::new(
            CommandKind::TestObjectSeen {
                object: "ball".to_string(),
                max_age: 1.0,
                negate: false,
            },
            &env,
        );
        assert_eq!(seen.errors(), ["Resource not found: ball".to_string()]);

        let reserved = Command::new(
            CommandKind::SetVariable {
                variable: "robot".to_string(),
                expression: Expression::from("1"),
            },
            &env,
        );
        assert_eq!(reserved.errors(), ["Invalid variable name: robot".to_string()]);
    }

    #[test]
    fn test_set_and_test_variable() {
        let handles = handles(Environment::new());
        let mut ns = namespace(&handles);

        let set = CommandKind::SetVariable {
            variable: "count".to_string(),
            expression: Expression::from("2 * 3"),
        };
        assert_eq!(run(set, &handles, &mut ns), Signal::Continue(true));
        assert_eq!(ns.get("count"), Some(&Value::Number(6.0)));

        let test = |comparison, negate| CommandKind::TestVariable {
            variable: "count".to_string(),
            comparison,
            expression: Expression::from("5"),
            negate,
        };
        assert_eq!(
            run(test(Comparison::Greater, false), &handles, &mut ns),
            Signal::Continue(true)
        );
        assert_eq!(
            run(test(Comparison::Greater, true), &handles, &mut ns),
            Signal::Continue(false)
        );
        assert_eq!(
            run(test(Comparison::Equal, false), &handles, &mut ns),
            Signal::Continue(false)
        );
    }

    #[test]
    fn test_runtime_error_becomes_fault() {
        let handles = handles(Environment::new());
        let mut ns = namespace(&handles);
        let signal = run(
            CommandKind::SetVariable {
                variable: "x".to_string(),
                expression: Expression::from("1 / 0"),
            },
            &handles,
            &mut ns,
        );
        let Signal::Fault(fault) = signal else {
            panic!("expected fault, got {signal:?}");
        };
        assert_eq!(fault.kind, "ZeroDivisionError");
        assert!(!ns.contains("x"));
    }

    #[test]
    fn test_relative_move_adds_current_position() {
        let robot = Arc::new(SimulatedRobot::new());
        let handles = handles(Environment::new().with_robot(robot.clone()));
        let mut ns = namespace(&handles);

        let signal = run(
            kind(r#"{"type": "MoveXYZ", "parameters": {"x": 10, "y": 0, "z": -50, "relative": true}}"#),
            &handles,
            &mut ns,
        );
        assert_eq!(signal, Signal::Continue(true));
        assert_eq!(
            robot.calls(),
            [RobotCall::MoveTo(Coords::new(10.0, 150.0, 100.0))]
        );
    }

    #[test]
    fn test_coordinate_test_reads_axis() {
        let robot = Arc::new(SimulatedRobot::new());
        let handles = handles(Environment::new().with_robot(robot));
        let mut ns = namespace(&handles);
        let signal = run(
            kind(r#"{"type": "TestCoordinate", "parameters": {"axis": "y", "comparison": "==", "value": 150}}"#),
            &handles,
            &mut ns,
        );
        assert_eq!(signal, Signal::Continue(true));
    }

    #[test]
    fn test_motion_recording_plays_reversed() {
        let robot = Arc::new(SimulatedRobot::new());
        let recording = Recording {
            frame_interval_ms: 1,
            frames: vec![
                RecordingFrame {
                    servos: [0.0, 10.0, 20.0, 0.0],
                    gripper: false,
                },
                RecordingFrame {
                    servos: [5.0, 15.0, 25.0, 0.0],
                    gripper: true,
                },
            ],
        };
        let env = Environment::new()
            .with_robot(robot.clone())
            .with_objects(Arc::new(
                InMemoryObjects::new().with_recording("wave", recording),
            ));
        let handles = handles(env);
        let mut ns = namespace(&handles);

        let signal = run(
            kind(r#"{"type": "MotionRecording", "parameters": {"recording": "wave", "speed": 2, "reversed": true}}"#),
            &handles,
            &mut ns,
        );
        assert_eq!(signal, Signal::Continue(true));
        assert_eq!(
            robot.calls(),
            [
                RobotCall::Servos([5.0, 15.0, 25.0, 0.0]),
                RobotCall::Gripper(true),
                RobotCall::Servos([0.0, 10.0, 20.0, 0.0]),
                RobotCall::Gripper(false),
            ]
        );
    }

    #[test]
    fn test_wait_rejects_negative_and_stops_on_cancel() {
        let handles = handles(Environment::new());
        let mut ns = namespace(&handles);

        let signal = run(
            CommandKind::Wait {
                seconds: Expression::from("-1"),
            },
            &handles,
            &mut ns,
        );
        assert!(matches!(signal, Signal::Fault(fault) if fault.kind == "ValueError"));

        handles.stop.request_stop();
        let started = Instant::now();
        let signal = run(
            CommandKind::Wait {
                seconds: Expression::from("30"),
            },
            &handles,
            &mut ns,
        );
        assert_eq!(signal, Signal::Continue(false));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_object_seen_respects_max_age() {
        let vision = Arc::new(SimulatedVision::new());
        vision.mark_seen("cup", (10.0, 10.0));
        let env = Environment::new()
            .with_vision(vision)
            .with_objects(Arc::new(InMemoryObjects::new().with_trackable("cup")));
        let handles = handles(env);
        let mut ns = namespace(&handles);

        let seen = |negate| CommandKind::TestObjectSeen {
            object: "cup".to_string(),
            max_age: 5.0,
            negate,
        };
        assert_eq!(run(seen(false), &handles, &mut ns), Signal::Continue(true));
        assert_eq!(run(seen(true), &handles, &mut ns), Signal::Continue(false));
    }

    #[test]
    fn test_exit_signals() {
        let handles = handles(Environment::new());
        let mut ns = namespace(&handles);
        assert_eq!(
            run(CommandKind::ExitProgram {}, &handles, &mut ns),
            Signal::ExitProgram
        );
        assert_eq!(
            run(CommandKind::EndEvent {}, &handles, &mut ns),
            Signal::ExitEvent
        );
    }
}
