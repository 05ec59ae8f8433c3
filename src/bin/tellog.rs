//! Demonstration recorder for the tellog telemetry logger.
//!
//! Loads configuration from (in precedence order): defaults, config file, environment variables
//! (`TELLOG_*`), and CLI flags. Declares a couple of series, logs values before any sink is
//! attached, then attaches the configured sinks so the buffered values are replayed into them.

use std::path::PathBuf;

use clap::Parser;
use config::{Config, Environment, File};
use tellog::telemetry::{logger_metrics, tracing_event_listener};
use tellog::{ClearPolicy, LoggerConfig, OutputMode, TelemetryLogger, ValueKind};
use tracing_subscriber::EnvFilter;

const DEFAULT_OUTPUT: &str = "telemetry.rrd";

// ---------- CLI ----------

/// tellog demonstration recorder.
#[derive(Parser, Debug)]
#[command(name = "tellog", version, about)]
pub struct Cli {
    /// Path to config file (TOML). If omitted, `tellog.toml` is loaded when it exists.
    #[arg(long, env = "TELLOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Do not load any config file; use defaults + env + CLI only.
    #[arg(long, default_value_t = false)]
    pub no_config: bool,

    /// Load and validate config (file + env + CLI), print the effective settings, then exit.
    #[arg(long, default_value_t = false)]
    pub validate_config: bool,

    /// File to record into (truncated).
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Do not record into a file.
    #[arg(long, default_value_t = false)]
    pub no_file: bool,

    /// Write the file as readable lines instead of binary records.
    #[arg(long, default_value_t = false)]
    pub readable: bool,

    /// Mirror records to stdout as readable lines.
    #[arg(long, default_value_t = false)]
    pub console: bool,

    /// Mirror records to stdout as binary records.
    #[arg(long, default_value_t = false, conflicts_with = "console")]
    pub console_binary: bool,
}

// ---------- File/env config (all optional for partial config) ----------

/// Top-level config as read from file + env. Every field optional for layering.
#[derive(Debug, Default, serde::Deserialize)]
pub struct RecorderFileConfig {
    pub record_name: Option<String>,
    pub output: Option<String>,
    /// `"readable"` or `"binary"`.
    pub file_mode: Option<OutputMode>,
    pub file_enabled: Option<bool>,
    /// Console mirroring; absent means no console sink.
    pub console_mode: Option<OutputMode>,
    pub clear_policy: Option<ClearPolicy>,
    /// `tracing` filter directive for diagnostics on stderr (e.g. `"debug"`).
    pub log_filter: Option<String>,
}

/// Effective recorder settings derived from config + env + CLI.
#[derive(Debug)]
pub struct RecorderOptions {
    pub logger: LoggerConfig,
    pub output: Option<PathBuf>,
    pub file_mode: OutputMode,
    pub console_mode: Option<OutputMode>,
    pub log_filter: String,
}

/// Load merged config. CLI overrides file/env.
fn load_recorder_config(cli: &Cli) -> Result<RecorderOptions, String> {
    let mut builder = Config::builder();

    if !cli.no_config {
        if let Some(ref path) = cli.config {
            if !path.exists() {
                return Err(format!("config file not found: {}", path.display()));
            }
            builder = builder.add_source(File::from(path.as_path()).required(false));
        } else {
            let default_path = PathBuf::from("tellog.toml");
            if default_path.exists() {
                builder = builder.add_source(File::from(default_path.as_path()).required(false));
            }
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("TELLOG")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .ignore_empty(true),
    );

    let merged = builder.build().map_err(|e| e.to_string())?;
    let partial: RecorderFileConfig = merged.try_deserialize().map_err(|e| e.to_string())?;

    let mut logger = LoggerConfig {
        event_listener: tracing_event_listener(),
        ..LoggerConfig::default()
    };
    if let Some(ref name) = partial.record_name {
        logger.record_name = name.clone();
    }
    if let Some(policy) = partial.clear_policy {
        logger.clear_policy = policy;
    }

    let file_enabled = !cli.no_file && partial.file_enabled.unwrap_or(true);
    let output = if file_enabled {
        let path = cli
            .output
            .clone()
            .or_else(|| partial.output.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
        Some(path)
    } else {
        None
    };

    let file_mode = if cli.readable {
        OutputMode::Readable
    } else {
        partial.file_mode.unwrap_or(OutputMode::Binary)
    };

    let console_mode = if cli.console {
        Some(OutputMode::Readable)
    } else if cli.console_binary {
        Some(OutputMode::Binary)
    } else {
        partial.console_mode
    };

    Ok(RecorderOptions {
        logger,
        output,
        file_mode,
        console_mode,
        log_filter: partial.log_filter.unwrap_or_else(|| "warn".to_string()),
    })
}

fn mode_name(mode: OutputMode) -> &'static str {
    match mode {
        OutputMode::Readable => "readable",
        OutputMode::Binary => "binary",
    }
}

/// Logs a short demonstration session, then attaches the configured sinks.
fn record_demo(options: RecorderOptions) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut logger = TelemetryLogger::with_config(options.logger);

    logger.declare("battery_level", "V", ValueKind::Numeric)?;
    logger.declare("status", "", ValueKind::Text)?;

    logger.log_static("battery_level", 0.0)?;
    logger.log("battery_level", 29.5)?;
    logger.log("battery_level", 28.9)?;
    logger.log("status", "OK")?;
    logger.log("status", "WARNING")?;

    if let Some(path) = &options.output {
        logger.attach_file(path, options.file_mode)?;
    }
    if let Some(mode) = options.console_mode {
        logger.attach_console(mode)?;
    }

    // Once a sink is attached, values skip the buffer.
    logger.log("battery_level", 28.4)?;

    if logger.buffered_len() > 0 {
        tracing::warn!(
            buffered = logger.buffered_len(),
            "no sink configured, values were not written anywhere"
        );
    }
    Ok(())
}

// ---------- Main ----------

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let options = load_recorder_config(&cli).map_err(|e| {
        eprintln!("config error: {}", e);
        e
    })?;

    if cli.validate_config {
        println!("record_name={}", options.logger.record_name);
        match &options.output {
            Some(path) => println!("output={}", path.display()),
            None => println!("output=none"),
        }
        println!("file_mode={}", mode_name(options.file_mode));
        println!(
            "console_mode={}",
            options.console_mode.map(mode_name).unwrap_or("none")
        );
        println!("clear_discard_buffer={}", options.logger.clear_policy.discard_buffer);
        println!("clear_detach_sinks={}", options.logger.clear_policy.detach_sinks);
        return Ok(());
    }

    let filter = EnvFilter::try_from_env("TELLOG_LOG")
        .unwrap_or_else(|_| EnvFilter::new(&options.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    logger_metrics::describe_all();

    record_demo(options).map_err(|e| {
        eprintln!("recording failed: {}", e);
        e
    })
}
