//! ttyscan CLI - List serial devices and the USB devices behind them.
//!
//! ## Features
//!
//! - Table or JSON output
//! - USB-only and vendor ID filters
//! - Registry snapshot replay
//! - Shell completion generation
//! - Configuration file and environment variable support

use {
    anyhow::Result,
    clap::{Parser, Subcommand},
    clap_complete::Shell,
    commands::{DeviceFilter, ListOptions, cmd_completions, cmd_list},
    config::{Config, OutputFormat},
    env_logger::Env,
    log::debug,
    std::{env, path::PathBuf},
};

mod commands;
mod config;
mod snapshot;

/// ttyscan - List serial devices with their USB vendor, product, and location.
///
/// Environment variables:
///   TTYSCAN_FORMAT     - Default output format (table, json)
///   TTYSCAN_SNAPSHOT   - Registry snapshot to replay instead of the host
#[derive(Parser)]
#[command(name = "ttyscan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (only warnings and errors are logged).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    /// Replay a registry snapshot (TOML) instead of querying the host.
    #[arg(long, global = true, value_name = "PATH", env = "TTYSCAN_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List serial devices.
    List {
        /// Output as JSON (overrides --format).
        #[arg(long)]
        json: bool,

        /// Output format.
        #[arg(long, value_enum, env = "TTYSCAN_FORMAT")]
        format: Option<OutputFormat>,

        /// Only list devices behind a USB controller.
        #[arg(long)]
        usb_only: bool,

        /// Only list devices with this USB vendor ID (hex, repeatable).
        #[arg(long = "vendor", value_name = "HEX", value_parser = commands::list::parse_vendor_id)]
        vendors: Vec<String>,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type.
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(cli: &Cli) {
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();
}

fn main() -> Result<()> {
    if env::var("NO_COLOR").is_ok() {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();
    init_logging(&cli);

    debug!(
        "ttyscan v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    match &cli.command {
        Commands::List {
            json,
            format,
            usb_only,
            vendors,
        } => {
            let format = if *json {
                OutputFormat::Json
            } else {
                format
                    .or(config.output.format)
                    .unwrap_or_default()
            };
            let options = ListOptions {
                format,
                filter: DeviceFilter::resolve(*usb_only, vendors, &config.filter),
            };

            let enumerator = match &cli.snapshot {
                Some(path) => snapshot::snapshot_enumerator(path)?,
                None => ttyscan::default_enumerator(),
            };
            if !cmd_list(enumerator, &options)? {
                std::process::exit(1);
            }
        },
        Commands::Completions { shell } => {
            cmd_completions(*shell);
        },
    }

    Ok(())
}
