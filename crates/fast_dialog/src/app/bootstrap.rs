use std::path::PathBuf;

use dialogue_core::{AdvanceInput, ConfigError, DialogueConfig};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::control_port::ControlPortConfig;

const CONFIG_ENV_VAR: &str = "FAST_DIALOG_CONFIG";
const POLL_INTERVAL_ENV_VAR: &str = "FAST_DIALOG_POLL_INTERVAL_MS";

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct CliOptions {
    pub(crate) scene_path: Option<PathBuf>,
    pub(crate) config_path: Option<PathBuf>,
    pub(crate) autostart: bool,
    pub(crate) input: AdvanceInput,
    pub(crate) show_help: bool,
}

pub(crate) struct AppWiring {
    pub(crate) config: DialogueConfig,
    pub(crate) scene_path: PathBuf,
    pub(crate) autostart: bool,
    pub(crate) input: AdvanceInput,
    pub(crate) control: ControlPortConfig,
}

/// `Ok(None)` means help was printed and there is nothing to run.
pub(crate) fn build_app() -> Result<Option<AppWiring>, AppError> {
    init_tracing();
    info!("=== fast_dialog startup ===");

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let options = parse_cli_options(&args)?;
    if options.show_help {
        println!("{}", usage_text());
        return Ok(None);
    }
    let scene_path = options
        .scene_path
        .clone()
        .ok_or_else(|| AppError::Usage(format!("missing --scene <path>\n\n{}", usage_text())))?;

    let config_path = options
        .config_path
        .clone()
        .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));
    let mut config = match &config_path {
        Some(path) => DialogueConfig::load(path)?,
        None => DialogueConfig::default(),
    };
    if let Some(interval_ms) =
        parse_interval_override(std::env::var(POLL_INTERVAL_ENV_VAR).ok().as_deref())
    {
        config.poll.interval_ms = interval_ms;
    }

    let control = ControlPortConfig::from_env();
    // Without a control surface nothing could ever start polling.
    let autostart = options.autostart || !control.enabled;

    info!(
        scene = %scene_path.display(),
        config = ?config_path,
        interval_ms = config.poll.interval().as_millis() as u64,
        input = %options.input,
        autostart,
        control_enabled = control.enabled,
        "app_configured"
    );

    Ok(Some(AppWiring {
        config,
        scene_path,
        autostart,
        input: options.input,
        control,
    }))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

pub(crate) fn parse_cli_options(args: &[String]) -> Result<CliOptions, AppError> {
    let mut options = CliOptions::default();
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "-h" | "--help" => {
                options.show_help = true;
                index += 1;
            }
            "--scene" => {
                options.scene_path = Some(PathBuf::from(flag_value(args, index, "--scene")?));
                index += 2;
            }
            "--config" => {
                options.config_path = Some(PathBuf::from(flag_value(args, index, "--config")?));
                index += 2;
            }
            "--autostart" => {
                options.autostart = true;
                index += 1;
            }
            "--input" => {
                options.input = flag_value(args, index, "--input")?
                    .parse::<AdvanceInput>()
                    .map_err(AppError::Usage)?;
                index += 2;
            }
            other => return Err(AppError::Usage(format!("unknown argument '{other}'"))),
        }
    }
    Ok(options)
}

fn flag_value<'a>(args: &'a [String], index: usize, flag: &str) -> Result<&'a str, AppError> {
    args.get(index + 1)
        .map(String::as_str)
        .ok_or_else(|| AppError::Usage(format!("missing value for {flag}")))
}

fn parse_interval_override(raw: Option<&str>) -> Option<u64> {
    let value = raw?;
    match value.trim().parse::<u64>() {
        Ok(0) | Err(_) => {
            warn!(
                env_var = POLL_INTERVAL_ENV_VAR,
                value, "invalid poll interval env var value; keeping config"
            );
            None
        }
        Ok(interval_ms) => Some(interval_ms),
    }
}

fn usage_text() -> String {
    [
        "fast_dialog - auto-advance dialogue in a live scene",
        "",
        "Usage:",
        "  fast_dialog --scene <scene.json> [--config <config.json>] [--autostart] [--input click|space|enter]",
        "",
        "Environment:",
        "  FAST_DIALOG_CONFIG            config file when --config is absent",
        "  FAST_DIALOG_POLL_INTERVAL_MS  override poll.interval_ms",
        "  FAST_DIALOG_CONTROL=1         enable the localhost control port",
        "  FAST_DIALOG_CONTROL_PORT      control port (default 46011)",
        "  RUST_LOG                      log filter (default info)",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn parses_all_flags() {
        let options = parse_cli_options(&args(&[
            "--scene",
            "scene.json",
            "--config",
            "fast.json",
            "--autostart",
            "--input",
            "space",
        ]))
        .expect("options");

        assert_eq!(
            options,
            CliOptions {
                scene_path: Some(PathBuf::from("scene.json")),
                config_path: Some(PathBuf::from("fast.json")),
                autostart: true,
                input: AdvanceInput::Space,
                show_help: false,
            }
        );
    }

    #[test]
    fn defaults_to_primary_click_without_autostart() {
        let options = parse_cli_options(&args(&["--scene", "scene.json"])).expect("options");
        assert_eq!(options.input, AdvanceInput::PrimaryClick);
        assert!(!options.autostart);
        assert_eq!(options.config_path, None);
    }

    #[test]
    fn rejects_unknown_input_and_flags() {
        let error = parse_cli_options(&args(&["--input", "tab"])).expect_err("bad input");
        assert_eq!(
            error.to_string(),
            "unknown advance input 'tab' (expected click|space|enter)"
        );

        let error = parse_cli_options(&args(&["--verbose"])).expect_err("bad flag");
        assert_eq!(error.to_string(), "unknown argument '--verbose'");
    }

    #[test]
    fn missing_flag_value_is_reported() {
        let error = parse_cli_options(&args(&["--scene"])).expect_err("missing value");
        assert_eq!(error.to_string(), "missing value for --scene");
    }

    #[test]
    fn help_flag_is_recognized() {
        assert!(parse_cli_options(&args(&["-h"])).expect("options").show_help);
    }

    #[test]
    fn interval_override_accepts_positive_values_only() {
        assert_eq!(parse_interval_override(Some("250")), Some(250));
        assert_eq!(parse_interval_override(Some(" 750 ")), Some(750));
        assert_eq!(parse_interval_override(Some("0")), None);
        assert_eq!(parse_interval_override(Some("fast")), None);
        assert_eq!(parse_interval_override(None), None);
    }
}
