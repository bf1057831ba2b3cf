mod debug_report;

use reftrace::{Breakpoint, Options, analyze_verbose_with, read_events};
use std::fs::File;
use std::io::{self, BufReader, IsTerminal};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "REFTRACE_LOG";

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };
    init_logging(config.verbose);

    let events = match &config.trace {
        Some(path) => File::open(path).map_err(reftrace::Error::from).and_then(|f| read_events(BufReader::new(f))),
        None => read_events(io::stdin().lock()),
    };
    let events = match events {
        Ok(events) => events,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };

    let opts = Options { breakpoints: config.breakpoints, record_frames: true };
    let res = analyze_verbose_with(&events, &opts);
    debug_report::print_run(config.trace.as_deref().unwrap_or("<stdin>"), &res, config.color);
}

struct CliConfig {
    trace: Option<String>,
    breakpoints: Vec<Breakpoint>,
    verbose: bool,
    color: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn parse_args() -> Result<CliConfig, String> {
    let mut trace: Option<String> = None;
    let mut breakpoints = Vec::new();
    let mut verbose = false;
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("reftrace {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "-v" | "--verbose" => verbose = true,
            "--breakpoint" | "-b" => {
                let value = args.next().ok_or_else(|| "error: --breakpoint expects FILE:ROW".to_string())?;
                breakpoints.push(parse_breakpoint(&value)?);
            }
            "--trace" | "-t" => {
                let value = args.next().ok_or_else(|| "error: --trace expects a path".to_string())?;
                set_trace(&mut trace, value)?;
            }
            _ if arg.starts_with("--breakpoint=") => {
                breakpoints.push(parse_breakpoint(arg.trim_start_matches("--breakpoint="))?);
            }
            _ if arg.starts_with("--trace=") => {
                set_trace(&mut trace, arg.trim_start_matches("--trace=").to_string())?;
            }
            "-" => {}
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => set_trace(&mut trace, arg)?,
        }
    }

    if trace.is_none() && io::stdin().is_terminal() {
        return Err(format!("error: no trace provided\n\n{}", help_text()));
    }

    Ok(CliConfig { trace, breakpoints, verbose, color })
}

fn set_trace(trace: &mut Option<String>, value: String) -> Result<(), String> {
    if trace.is_some() {
        return Err("error: trace provided multiple times".to_string());
    }
    *trace = Some(value);
    Ok(())
}

fn parse_breakpoint(value: &str) -> Result<Breakpoint, String> {
    value.parse().map_err(|err| format!("error: {err}"))
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "reftrace {version}

Reports which input document paths a policy evaluation read.

Usage:
  reftrace [OPTIONS] [<trace.json>]
  reftrace [OPTIONS] < trace.json

The trace is a JSON array of events or one event object per line.

Options:
  -t, --trace <path>         Trace file to read. Reads stdin when omitted.
  -b, --breakpoint <f:row>   Log and count events at FILE:ROW (repeatable).
  -v, --verbose              Debug-level logging (overridden by {log_env}).
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Exit codes:
  0  Success.
  1  The trace could not be read.
  2  Invalid arguments or missing trace.
",
        version = env!("CARGO_PKG_VERSION"),
        log_env = LOG_ENV
    )
}
