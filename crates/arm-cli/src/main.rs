use arm_core::sim::{InMemoryObjects, SettingsSnapshot, SimulatedRobot, SimulatedVision};
use arm_core::{
    Engine, EngineConfig, Environment, ErrorBag, FinishReason, LogEntry, LogLevel, LogOutput,
    ProgramFile, ProgramValidator, Recording, ValidationResult,
};
use arm_script::Value;
use clap::Parser;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

const TIMEOUT_POLL: Duration = Duration::from_millis(20);

#[derive(Parser)]
#[command(name = "arm-cli")]
#[command(about = "Run robot-arm event programs against simulated hardware", long_about = None)]
struct Cli {
    #[arg(value_name = "FILE", help = "Path to the program JSON file")]
    program_file: PathBuf,

    #[arg(short, long, value_name = "FILE", help = "Engine configuration JSON file")]
    config: Option<PathBuf>,

    #[arg(
        long,
        help = "Set variable in format NAME=VALUE",
        value_name = "VAR=VAL"
    )]
    var: Vec<String>,

    #[arg(
        long = "program",
        help = "Make a program callable by RunProgram, as NAME=FILE",
        value_name = "NAME=FILE"
    )]
    programs: Vec<String>,

    #[arg(
        long = "recording",
        help = "Make a motion recording available, as NAME=FILE",
        value_name = "NAME=FILE"
    )]
    recordings: Vec<String>,

    #[arg(
        long = "object",
        help = "Register a trackable object name",
        value_name = "NAME"
    )]
    objects: Vec<String>,

    #[arg(long, value_name = "FILE", help = "Settings JSON object")]
    settings: Option<PathBuf>,

    #[arg(long, value_name = "SECONDS", help = "Cancel the run after this many seconds")]
    timeout: Option<f64>,

    #[arg(long, help = "Build and validate the program without running it")]
    check: bool,

    #[arg(long, help = "Run without a robot")]
    no_robot: bool,

    #[arg(long, help = "Run without a camera")]
    no_camera: bool,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

struct CliLogOutput {
    verbose: bool,
    entries: Vec<LogEntry>,
}

impl LogOutput for CliLogOutput {
    fn log(&mut self, entry: LogEntry) {
        if self.verbose || entry.level != LogLevel::Info || entry.activity == "Log" {
            println!(
                "{} [{}] {}: {}",
                entry.timestamp,
                entry.level.as_str(),
                entry.activity.as_str(),
                entry.message
            );
        }
        self.entries.push(entry);
    }
}

struct Report {
    errors: ErrorBag,
    validation: ValidationResult,
    finish: Option<FinishReason>,
    variables: IndexMap<String, Value>,
    entries: Vec<LogEntry>,
    timed_out: bool,
}

impl Report {
    fn failed(&self) -> bool {
        !self.errors.is_empty()
            || !self.validation.is_valid()
            || matches!(self.finish, Some(FinishReason::Faulted))
            || self.timed_out
    }

    fn count(&self, level: LogLevel) -> usize {
        self.entries.iter().filter(|e| e.level == level).count()
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if !cli.program_file.exists() {
        eprintln!("Error: File not found: {}", cli.program_file.display());
        std::process::exit(1);
    }

    let report = match execute(&cli) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    print_report(&cli, &report);

    if report.failed() {
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

fn execute(cli: &Cli) -> Result<Report, String> {
    let program = ProgramFile::load(&cli.program_file)
        .map_err(|e| format!("Failed to load program: {e}"))?;
    let config = match &cli.config {
        Some(path) => {
            EngineConfig::load(path).map_err(|e| format!("Failed to load config: {e}"))?
        }
        None => EngineConfig::default(),
    };
    let env = build_environment(cli)?;
    let variables = parse_variables(&cli.var);

    let output = Arc::new(Mutex::new(CliLogOutput {
        verbose: cli.verbose > 0,
        entries: Vec::new(),
    }));
    let mut engine = Engine::new(env, config)
        .with_log_output(output.clone())
        .with_variables(variables);

    log::info!(
        "Program '{}' with {} events, run {}",
        program.name,
        program.events.len(),
        engine.run_id()
    );

    let mut errors = engine.build_program(&program.events);
    let validation = engine
        .program()
        .map(|built| ProgramValidator::new(built).validate())
        .unwrap_or_default();

    let mut timed_out = false;
    if !cli.check && errors.is_empty() && validation.is_valid() {
        timed_out = run_engine(&mut engine, cli.timeout)?;
    }
    errors.merge(&engine.last_errors());

    let finish = engine.finish_reason();
    let variables = engine.variables();
    drop(engine);

    let entries = std::mem::take(&mut output.lock().entries);
    Ok(Report {
        errors,
        validation,
        finish,
        variables,
        entries,
        timed_out,
    })
}

/// Runs to completion, or cancels after `timeout` seconds. Returns whether
/// the timeout fired.
fn run_engine(engine: &mut Engine, timeout: Option<f64>) -> Result<bool, String> {
    let Some(seconds) = timeout else {
        engine.run(false).map_err(|e| e.to_string())?;
        return Ok(false);
    };
    let limit = Duration::try_from_secs_f64(seconds)
        .map_err(|_| format!("Invalid timeout: {seconds}"))?;

    engine.run(true).map_err(|e| e.to_string())?;
    let deadline = Instant::now() + limit;
    let mut timed_out = false;
    while engine.is_running() {
        if Instant::now() >= deadline {
            log::warn!("Timeout of {seconds}s reached, cancelling");
            engine.request_cancel();
            timed_out = true;
            break;
        }
        std::thread::sleep(TIMEOUT_POLL);
    }
    engine.join().map_err(|e| e.to_string())?;
    Ok(timed_out)
}

fn build_environment(cli: &Cli) -> Result<Environment, String> {
    let mut objects = InMemoryObjects::new();
    for name in &cli.objects {
        objects = objects.with_trackable(name);
    }
    for (name, path) in parse_pairs(&cli.programs)? {
        let file = ProgramFile::load(Path::new(&path))
            .map_err(|e| format!("Failed to load program '{name}': {e}"))?;
        objects = objects.with_program(&name, file);
    }
    for (name, path) in parse_pairs(&cli.recordings)? {
        let recording = load_recording(Path::new(&path))
            .map_err(|e| format!("Failed to load recording '{name}': {e}"))?;
        objects = objects.with_recording(&name, recording);
    }

    let mut env = Environment::new().with_objects(Arc::new(objects));
    if !cli.no_robot {
        env = env.with_robot(Arc::new(SimulatedRobot::new()));
    }
    if !cli.no_camera {
        env = env.with_vision(Arc::new(SimulatedVision::new()));
    }
    if let Some(path) = &cli.settings {
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read settings: {e}"))?;
        let settings = SettingsSnapshot::from_json(&json)
            .map_err(|e| format!("Failed to parse settings: {e}"))?;
        env = env.with_settings(Arc::new(settings));
    }
    Ok(env)
}

fn load_recording(path: &Path) -> Result<Recording, String> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read file: {e}"))?;
    serde_json::from_str(&contents).map_err(|e| format!("Failed to parse recording: {e}"))
}

fn parse_pairs(args: &[String]) -> Result<Vec<(String, String)>, String> {
    args.iter()
        .map(|arg| {
            arg.split_once('=')
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .ok_or_else(|| format!("Invalid format '{arg}', expected NAME=VALUE"))
        })
        .collect()
}

fn parse_variables(var_args: &[String]) -> IndexMap<String, Value> {
    let mut vars = IndexMap::new();

    for arg in var_args {
        let Some((name, text)) = arg.split_once('=') else {
            eprintln!("Warning: Invalid variable format '{arg}', expected NAME=VALUE");
            continue;
        };
        let var_type = Value::infer_type_from_string(text);
        match Value::from_string(text, &var_type) {
            Ok(value) => {
                vars.insert(name.to_string(), value);
            }
            Err(e) => eprintln!("Warning: Invalid value for '{name}': {e}"),
        }
    }

    vars
}

fn print_report(cli: &Cli, report: &Report) {
    for issue in &report.validation.errors {
        eprintln!("  ERROR [{}] {}", issue.code, issue.message);
    }
    if cli.verbose > 0 || cli.check {
        for issue in &report.validation.warnings {
            eprintln!("  WARN  [{}] {}", issue.code, issue.message);
        }
    }

    if !report.errors.is_empty() {
        println!();
        println!("Errors:");
        println!("=======");
        for line in report.errors.to_string().lines() {
            println!("  {line}");
        }
    }

    if !report.variables.is_empty() {
        println!();
        println!("Final Variables:");
        println!("================");

        let max_name_len = report.variables.keys().map(String::len).max().unwrap_or(10);

        for (name, value) in &report.variables {
            println!(
                "  {:width$}  [{:7}]  {}",
                name,
                value.get_type().as_str(),
                value,
                width = max_name_len
            );
        }
    }

    println!();
    println!("Execution Summary:");
    println!("==================");
    match report.finish {
        Some(reason) => println!("  Finished: {reason:?}"),
        None if cli.check => println!("  Finished: not run (--check)"),
        None => println!("  Finished: not run"),
    }
    if report.timed_out {
        println!("  Timed out");
    }
    println!("  Info:     {}", report.count(LogLevel::Info));
    println!("  Warnings: {}", report.count(LogLevel::Warning));
    println!("  Errors:   {}", report.count(LogLevel::Error));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn program_file(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("arm-cli").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_variables_infers_types() {
        let vars = parse_variables(&[
            "count=3".to_string(),
            "enabled=TRUE".to_string(),
            "label=left".to_string(),
            "broken".to_string(),
        ]);
        assert_eq!(vars.len(), 3);
        assert_eq!(vars["count"], Value::Number(3.0));
        assert_eq!(vars["enabled"], Value::Boolean(true));
        assert_eq!(vars["label"], Value::String("left".to_string()));
    }

    #[test]
    fn test_parse_pairs_rejects_missing_separator() {
        assert!(parse_pairs(&["sub=a.json".to_string()]).is_ok());
        assert!(parse_pairs(&["sub".to_string()]).is_err());
    }

    #[test]
    fn test_execute_runs_program_with_seed_variables() {
        let file = program_file(
            r#"{"name": "demo", "events": [{"type": "Init", "commandList": [
                {"type": "SetVariable", "parameters": {"variable": "doubled", "expression": "count * 2"}},
                {"type": "MoveXYZ", "parameters": {"x": 0, "y": 150, "z": 120}}
            ]}]}"#,
        );
        let path = file.path().to_string_lossy().into_owned();
        let report = execute(&cli(&[&path, "--var", "count=4"])).unwrap();

        assert!(!report.failed());
        assert_eq!(report.finish, Some(FinishReason::Completed));
        assert_eq!(report.variables["doubled"], Value::Number(8.0));
    }

    #[test]
    fn test_check_reports_compile_errors_without_running() {
        let file = program_file(
            r#"[{"type": "Init", "commandList": [
                {"type": "Gripper", "parameters": {"closed": false}},
                {"type": "SetVariable", "parameters": {"variable": "x", "expression": "1"}}
            ]}]"#,
        );
        let path = file.path().to_string_lossy().into_owned();
        let report = execute(&cli(&[&path, "--check", "--no-robot"])).unwrap();

        assert!(report.failed());
        assert!(report.finish.is_none());
        assert!(report.errors.contains("Robot is not connected"));
        assert!(report.variables.is_empty());
    }

    #[test]
    fn test_timeout_cancels_endless_program() {
        let file = program_file(r#"[{"type": "Step"}]"#);
        let path = file.path().to_string_lossy().into_owned();
        let report = execute(&cli(&[&path, "--timeout", "0.2"])).unwrap();

        assert!(report.timed_out);
        assert_eq!(report.finish, Some(FinishReason::Cancelled));
    }

    #[test]
    fn test_sub_program_from_file() {
        let sub = program_file(
            r#"[{"type": "Init", "commandList": [{"type": "Log", "parameters": {"message": "from sub"}}]}]"#,
        );
        let main = program_file(
            r#"[{"type": "Init", "commandList": [{"type": "RunProgram", "parameters": {"program": "sub"}}]}]"#,
        );
        let main_path = main.path().to_string_lossy().into_owned();
        let program = format!("sub={}", sub.path().display());
        let report = execute(&cli(&[&main_path, "--program", &program])).unwrap();

        assert!(!report.failed());
        assert!(report.entries.iter().any(|e| e.message == "from sub"));
    }
}
