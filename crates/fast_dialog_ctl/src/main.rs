use std::env;
use std::io;
use std::process::ExitCode;

use fast_dialog_ctl::{
    run, ClientOptions, Request, DEFAULT_PORT, DEFAULT_RETRY_MS, DEFAULT_TIMEOUT_MS,
};

fn main() -> ExitCode {
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::from(1)
        }
    }
}

fn run_cli() -> Result<(), String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        return Err(usage_text());
    }
    if args[0] == "-h" || args[0] == "--help" {
        println!("{}", usage_text());
        return Ok(());
    }

    let mut options = ClientOptions::default();
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "--port" => {
                options.port = parse_flag_value(&args, index, "--port")?;
                index += 2;
            }
            "--timeout-ms" => {
                options.timeout_ms = parse_flag_value(&args, index, "--timeout-ms")?;
                index += 2;
            }
            "--retry-ms" => {
                options.retry_ms = parse_flag_value(&args, index, "--retry-ms")?;
                index += 2;
            }
            "--events" => {
                options.show_events = true;
                index += 1;
            }
            _ => break,
        }
    }

    let subcommand = args
        .get(index)
        .ok_or_else(|| "missing subcommand".to_string())?;
    let rest = &args[(index + 1)..];
    let request = match subcommand.as_str() {
        "wait-ready" if rest.is_empty() => Request::WaitReady,
        "wait-ready" => return Err("wait-ready takes no arguments".to_string()),
        "send" if rest.is_empty() => return Err("send requires a command".to_string()),
        "send" => Request::Send {
            command: rest.join(" "),
        },
        "script" => match rest {
            [path] => Request::Script { path: path.clone() },
            _ => return Err("script requires exactly one file path".to_string()),
        },
        other => return Err(format!("unknown subcommand '{other}'")),
    };

    run(request, options, &mut io::stdout()).map_err(|error| error.to_string())
}

fn parse_flag_value<T: std::str::FromStr>(
    args: &[String],
    index: usize,
    flag: &str,
) -> Result<T, String> {
    let value = args
        .get(index + 1)
        .ok_or_else(|| format!("missing value for {flag}"))?;
    value
        .parse::<T>()
        .map_err(|_| format!("invalid {flag} value '{value}'"))
}

fn usage_text() -> String {
    [
        "fast_dialog_ctl - control client for a running fast_dialog".to_string(),
        String::new(),
        "Usage:".to_string(),
        "  fast_dialog_ctl [--port <u16>] [--timeout-ms <u64>] [--retry-ms <u64>] [--events] wait-ready".to_string(),
        "  fast_dialog_ctl [--port <u16>] [--timeout-ms <u64>] [--retry-ms <u64>] [--events] send <command...>".to_string(),
        "  fast_dialog_ctl [--port <u16>] [--timeout-ms <u64>] [--retry-ms <u64>] [--events] script <file>".to_string(),
        String::new(),
        "Commands: start, stop, scan, status, help, quit".to_string(),
        String::new(),
        "Defaults:".to_string(),
        format!("  --port {DEFAULT_PORT}"),
        format!("  --timeout-ms {DEFAULT_TIMEOUT_MS}"),
        format!("  --retry-ms {DEFAULT_RETRY_MS}"),
    ]
    .join("\n")
}
