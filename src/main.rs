mod debug_report;

use parley::{
    ActionRunner, DialogueEngine, DialogueOptions, Hardware, RecordingHardware, RunnerOptions, Session,
    SimulatedHardware,
};
use std::io::{self, BufRead, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// How long to let queued actions finish before exiting.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    init_tracing();
    std::process::exit(run(config));
}

struct CliConfig {
    script: PathBuf,
    input: Option<String>,
    seed: Option<u64>,
    check: bool,
    json: bool,
    color: bool,
    dry_run: bool,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("parley=info")))
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

fn run(config: CliConfig) -> i32 {
    let options = DialogueOptions { seed: config.seed, ..DialogueOptions::default() };
    let dialogue = match DialogueEngine::from_file(&config.script, options) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("error: {err}");
            return 1;
        }
    };

    if config.check {
        debug_report::print_check(&dialogue, config.color);
        return if dialogue.has_fatal_errors() { 1 } else { 0 };
    }
    if dialogue.has_fatal_errors() {
        debug_report::print_boot_failure(&dialogue, config.color);
        return 1;
    }

    let recorder = Arc::new(RecordingHardware::new());
    let hardware: Arc<dyn Hardware> =
        if config.dry_run { recorder.clone() } else { Arc::new(SimulatedHardware::new()) };
    let runner = match ActionRunner::with_observer(hardware, RunnerOptions::from_env(), |state| {
        debug!(state = %state, "runner state");
    }) {
        Ok(runner) => runner,
        Err(err) => {
            eprintln!("error: failed to start action worker: {err}");
            return 1;
        }
    };
    let mut session = Session::new(dialogue, runner);

    let mut turn = |line: &str| {
        let result = session.handle_input(line);
        if config.json {
            match serde_json::to_string(&result) {
                Ok(json) => println!("{json}"),
                Err(err) => eprintln!("error: failed to encode turn: {err}"),
            }
        } else {
            debug_report::print_turn(line, &result, config.color);
        }
    };

    match &config.input {
        Some(input) => turn(input),
        None => {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) if line.trim().is_empty() => continue,
                    Ok(line) => turn(&line),
                    Err(err) => {
                        eprintln!("error: failed to read stdin: {err}");
                        break;
                    }
                }
            }
        }
    }

    if !session.runner().wait_idle(DRAIN_TIMEOUT) {
        eprintln!("warning: actions still running after {DRAIN_TIMEOUT:?}, interrupting");
        session.runner().interrupt();
    }
    if config.dry_run && !config.json {
        debug_report::print_calls(&recorder.calls(), config.color);
    }
    0
}

fn parse_args() -> Result<CliConfig, String> {
    let mut script: Option<PathBuf> = None;
    let mut input: Option<String> = None;
    let mut seed: Option<u64> = None;
    let mut check = false;
    let mut json = false;
    let mut dry_run = false;
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("parley {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--check" => check = true,
            "--json" => json = true,
            "--dry-run" => dry_run = true,
            "--script" | "-s" => {
                let value = args.next().ok_or_else(|| "error: --script expects a value".to_string())?;
                script = Some(PathBuf::from(value));
            }
            "--seed" => {
                let value = args.next().ok_or_else(|| "error: --seed expects a value".to_string())?;
                seed = Some(parse_seed(&value)?);
            }
            "--" => {
                let rest = args.by_ref().collect::<Vec<_>>().join(" ");
                if !rest.trim().is_empty() {
                    input = Some(rest);
                }
                break;
            }
            _ if arg.starts_with("--script=") => {
                script = Some(PathBuf::from(arg.trim_start_matches("--script=")));
            }
            _ if arg.starts_with("--seed=") => {
                seed = Some(parse_seed(arg.trim_start_matches("--seed="))?);
            }
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => {
                let rest = std::iter::once(arg).chain(args.by_ref()).collect::<Vec<_>>().join(" ");
                input = Some(rest);
                break;
            }
        }
    }

    let script = script.ok_or_else(|| format!("error: --script is required\n\n{}", help_text()))?;
    if check && input.is_some() {
        return Err("error: --check does not take input".to_string());
    }

    Ok(CliConfig { script, input, seed, check, json, color, dry_run })
}

fn parse_seed(value: &str) -> Result<u64, String> {
    value.parse::<u64>().map_err(|_| format!("error: invalid --seed '{value}' (expected an unsigned integer)"))
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "parley {version}

Rule-script dialogue engine with a robot action runner.

Usage:
  parley --script <file> [OPTIONS] [--] <input...>
  parley --script <file> [OPTIONS] < turns.txt
  parley --script <file> --check

Options:
  -s, --script <file>        Dialogue script to load (required).
  --seed <n>                 Seed output randomization for reproducible runs.
  --check                    Print diagnostics and the compiled rule tree, then exit.
  --json                     Print one JSON turn result per line.
  --dry-run                  Record hardware calls instead of simulating them,
                             and list them at the end.
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Input is one turn from the remaining arguments, or one turn per stdin line.

Environment:
  RUST_LOG                   Log filter (default: parley=info).
  PARLEY_POLL_MS             Cancellation poll interval in milliseconds (default: 30).

Exit codes:
  0  Success.
  1  Script unreadable or has fatal errors.
  2  Invalid arguments.
",
        version = env!("CARGO_PKG_VERSION"),
    )
}
