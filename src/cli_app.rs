//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use drive_space_helper::core::config::Config;
use drive_space_helper::core::errors::DshError;
use drive_space_helper::logger::jsonl::{EventType, JsonlLogger, LogEntry, Severity};
use drive_space_helper::platform::pal::{Platform, detect_platform};
use drive_space_helper::volumes::enumerate::{VolumeEnumerator, VolumeList};
use drive_space_helper::volumes::select::{CapacitySelector, SelectionResult};
use drive_space_helper::volumes::store::{PayloadStore, StoreOutcome, select_and_store};

/// Drive Space Helper — enumerates volumes, picks the roomiest, stores a payload.
#[derive(Debug, Parser)]
#[command(
    name = "dsh",
    author,
    version,
    about = "Drive Space Helper - find the volume with the most free space",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only, no activity log).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// List mounted volumes, one per line, in discovery order.
    List(ListArgs),
    /// Pick the volume with the most free space.
    Pick(PickArgs),
    /// Store a payload on the volume with the most free space.
    Store(StoreArgs),
    /// View configuration state.
    Config(ConfigArgs),
    /// Show version information.
    Version,
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct ListArgs {}

#[derive(Debug, Clone, Args, Default)]
struct PickArgs {}

#[derive(Debug, Clone, Args, Default)]
struct StoreArgs {
    /// Payload string to store.
    #[arg(long, value_name = "STRING", conflicts_with = "file")]
    data: Option<String>,
    /// File whose contents become the payload.
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,
    /// File name to write at the volume root (default from config).
    #[arg(long, value_name = "NAME")]
    filename: Option<String>,
    /// Skip selection and store on this volume.
    #[arg(long, value_name = "PATH")]
    volume: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigAction {
    /// Print the effective configuration.
    Show,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::List(args) => run_list(cli, args),
        Command::Pick(args) => run_pick(cli, args),
        Command::Store(args) => run_store(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Version => emit_version(cli),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn run_list(cli: &Cli, _args: &ListArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let mut logger = open_logger(cli, &config);
    let (platform, volumes) = enumerate_volumes(&config, &mut logger);

    let mut entry = LogEntry::new(EventType::EnumerationComplete, Severity::Info);
    entry.candidate_count = Some(volumes.len());
    logger.log(&entry);

    match output_mode(cli) {
        OutputMode::Human => {
            if cli.verbose {
                println!(
                    "  {:<28}  {:>10}  {:>10}  {:<8}",
                    "Volume", "Total", "Free", "Type"
                );
                println!("  {}", "-".repeat(62));
                for volume in &volumes {
                    match platform.as_ref().and_then(|p| p.fs_stats(volume).ok()) {
                        Some(stats) => println!(
                            "  {:<28}  {:>10}  {:>10}  {:<8}",
                            volume.display().to_string(),
                            format_bytes(stats.total_bytes),
                            format_bytes(stats.free_bytes),
                            stats.fs_type,
                        ),
                        None => println!("  {:<28}  {:>10}  {:>10}", volume.display(), "?", "?"),
                    }
                }
            } else {
                for volume in &volumes {
                    println!("{}", volume.display());
                }
            }
        }
        OutputMode::Json => {
            let items: Vec<Value> = volumes
                .iter()
                .map(|volume| {
                    let mut item = json!({ "path": volume.display().to_string() });
                    if let Some(stats) = platform.as_ref().and_then(|p| p.fs_stats(volume).ok()) {
                        item["total_bytes"] = json!(stats.total_bytes);
                        item["free_bytes"] = json!(stats.free_bytes);
                        item["fs_type"] = json!(stats.fs_type);
                    }
                    item
                })
                .collect();
            write_json_line(&Value::Array(items))?;
        }
    }
    Ok(())
}

fn run_pick(cli: &Cli, _args: &PickArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let mut logger = open_logger(cli, &config);
    let (platform, volumes) = enumerate_volumes(&config, &mut logger);

    let result = match platform {
        Some(platform) => CapacitySelector::new(platform).select_max_free_space(&volumes),
        None => SelectionResult::NoVolumeFound,
    };

    match &result {
        SelectionResult::Selected { path, free_bytes } => {
            let mut entry = LogEntry::new(EventType::SelectionComplete, Severity::Info);
            entry.volume = Some(path.display().to_string());
            entry.free_bytes = Some(*free_bytes);
            entry.candidate_count = Some(volumes.len());
            logger.log(&entry);

            match output_mode(cli) {
                OutputMode::Human => {
                    println!(
                        "{}  ({} free)",
                        path.display().to_string().green().bold(),
                        format_bytes(*free_bytes)
                    );
                }
                OutputMode::Json => {
                    write_json_line(&serde_json::to_value(&result)?)?;
                }
            }
            Ok(())
        }
        SelectionResult::NoVolumeFound => {
            let mut entry = LogEntry::new(EventType::SelectionEmpty, Severity::Warning);
            entry.candidate_count = Some(volumes.len());
            logger.log(&entry);

            if output_mode(cli) == OutputMode::Json {
                write_json_line(&serde_json::to_value(&result)?)?;
            }
            Err(CliError::User("no volume found".to_string()))
        }
    }
}

fn run_store(cli: &Cli, args: &StoreArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let mut logger = open_logger(cli, &config);
    let payload = read_payload(args)?;

    let store = PayloadStore::new(config.store.clone());
    let stored = match &args.volume {
        Some(volume) => store.store(volume, args.filename.as_deref(), &payload),
        None => {
            let (platform, volumes) = enumerate_volumes(&config, &mut logger);
            let outcome = match platform {
                Some(platform) => select_and_store(
                    platform,
                    &volumes,
                    &store,
                    args.filename.as_deref(),
                    &payload,
                ),
                None => Ok(StoreOutcome::NoVolumeFound),
            };
            match outcome {
                Ok(StoreOutcome::Stored(written)) => Ok(written),
                Ok(StoreOutcome::NoVolumeFound) => {
                    let mut entry = LogEntry::new(EventType::SelectionEmpty, Severity::Warning);
                    entry.candidate_count = Some(volumes.len());
                    logger.log(&entry);
                    return Err(CliError::User(
                        "no volume found, nothing stored".to_string(),
                    ));
                }
                Err(error) => Err(error),
            }
        }
    };

    match stored {
        Ok(written) => {
            let mut entry = LogEntry::new(EventType::StoreComplete, Severity::Info);
            entry.volume = written.parent().map(|volume| volume.display().to_string());
            entry.payload_bytes = Some(payload.len() as u64);
            entry.ok = Some(true);
            logger.log(&entry);

            match output_mode(cli) {
                OutputMode::Human => {
                    println!(
                        "stored {} to {}",
                        format_bytes(payload.len() as u64),
                        written.display().to_string().green()
                    );
                }
                OutputMode::Json => {
                    write_json_line(&json!({
                        "ok": true,
                        "path": written.display().to_string(),
                        "payload_bytes": payload.len(),
                    }))?;
                }
            }
            Ok(())
        }
        Err(error) => {
            let mut entry = LogEntry::new(EventType::StoreComplete, Severity::Critical);
            entry.volume = args.volume.as_ref().map(|volume| volume.display().to_string());
            entry.ok = Some(false);
            entry.error_code = Some(error.code().to_string());
            entry.error_message = Some(error.to_string());
            logger.log(&entry);

            if output_mode(cli) == OutputMode::Json {
                write_json_line(&json!({ "ok": false, "error": error.to_string() }))?;
            }
            Err(CliError::Runtime(error.to_string()))
        }
    }
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    let ConfigAction::Show = &args.action;
    let config = load_config(cli)?;
    match output_mode(cli) {
        OutputMode::Human => {
            let rendered = toml::to_string_pretty(&config)
                .map_err(|error| CliError::Runtime(error.to_string()))?;
            print!("{rendered}");
        }
        OutputMode::Json => {
            write_json_line(&serde_json::to_value(&config)?)?;
        }
    }
    Ok(())
}

fn emit_version(cli: &Cli) -> Result<(), CliError> {
    let version = env!("CARGO_PKG_VERSION");
    match output_mode(cli) {
        OutputMode::Human => println!("dsh {version}"),
        OutputMode::Json => {
            write_json_line(&json!({ "name": "dsh", "version": version }))?;
        }
    }
    Ok(())
}

/// Detect the platform and enumerate volumes, degrading to an empty list
/// (with a logged `enumeration_degraded` event) when the host is
/// unsupported or the mount query fails.
fn enumerate_volumes(
    config: &Config,
    logger: &mut JsonlLogger,
) -> (Option<Arc<dyn Platform>>, VolumeList) {
    let ttl = Duration::from_millis(config.telemetry.mount_cache_ttl_ms);
    match detect_platform(ttl) {
        Ok(platform) => {
            let enumerator =
                VolumeEnumerator::new(platform.clone(), config.enumeration.clone());
            let outcome = enumerator.enumerate_checked();
            if let Some(error) = &outcome.degraded {
                log_enumeration_degraded(logger, error);
            }
            (Some(platform), outcome.volumes)
        }
        Err(error) => {
            log_enumeration_degraded(logger, &error);
            (None, Vec::new())
        }
    }
}

fn log_enumeration_degraded(logger: &mut JsonlLogger, error: &DshError) {
    let mut entry = LogEntry::new(EventType::EnumerationDegraded, Severity::Warning);
    entry.error_code = Some(error.code().to_string());
    entry.error_message = Some(error.to_string());
    logger.log(&entry);
}

fn read_payload(args: &StoreArgs) -> Result<Vec<u8>, CliError> {
    if let Some(data) = &args.data {
        return Ok(data.clone().into_bytes());
    }
    if let Some(file) = &args.file {
        return std::fs::read(file)
            .map_err(|error| CliError::User(format!("cannot read {}: {error}", file.display())));
    }
    let mut payload = Vec::new();
    io::stdin()
        .read_to_end(&mut payload)
        .map_err(|error| CliError::User(format!("cannot read payload from stdin: {error}")))?;
    Ok(payload)
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Config::load(cli.config.as_deref()).map_err(|error| CliError::Runtime(error.to_string()))
}

fn open_logger(cli: &Cli, config: &Config) -> JsonlLogger {
    if cli.quiet {
        JsonlLogger::disabled()
    } else {
        JsonlLogger::open(&config.paths.jsonl_log)
    }
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("DSH_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }
    match env_mode {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => {
            if is_tty {
                OutputMode::Human
            } else {
                OutputMode::Json
            }
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;
    const TIB: u64 = 1024 * GIB;

    if bytes >= TIB {
        format!("{:.1} TB", bytes as f64 / TIB as f64)
    } else if bytes >= GIB {
        format!("{:.1} GB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}
