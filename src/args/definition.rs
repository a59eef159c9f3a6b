//! Command-line argument definition and processing.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use transwatch::app::{App, AppOptions};
use transwatch::host::{LogStatusBar, TerminalNotifier};
use transwatch::logging::LogHandle;

use crate::Result;
use crate::args::{convert, oneshot};

/// transwatch - keeps PO files, JSON resources and translation keys in sync
#[derive(Parser, Debug)]
#[command(name = "transwatch")]
#[command(version)]
#[command(
    about = "Keeps gettext PO files, i18next JSON resources and source-code translation keys in sync",
    long_about = None
)]
pub struct Args {
    /// Workspace root to watch
    #[arg(short, long, default_value = ".")]
    pub workspace: PathBuf,

    /// Settings file (default: <workspace>/.transwatch/settings.conf, then
    /// ~/.config/transwatch/settings.conf)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output (debug logging)
    #[arg(short, long)]
    pub verbose: bool,

    /// What to do (default: watch)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Watch the workspace and keep files in sync (stdin: lock, po, json, scan, quit)
    Watch {
        /// Start with the master lock enabled
        #[arg(long)]
        locked: bool,
    },
    /// Regenerate every PO file from its JSON file and exit
    GeneratePo,
    /// Regenerate every JSON file from its PO file and exit
    GenerateJson,
    /// Run the source scanner once and exit
    Scan,
    /// Convert one locale file between PO and JSON (direction from the source extension)
    Convert {
        /// Locale written into the PO header
        #[arg(long)]
        locale: String,
        /// File to read
        #[arg(long)]
        source: PathBuf,
        /// File to write
        #[arg(long)]
        target: PathBuf,
    },
}

/// What: Binary to run for the built-in conversion command.
///
/// Details:
/// - The running executable, falling back to `transwatch` on `PATH`.
fn converter_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .or_else(|| which::which("transwatch").ok())
        .unwrap_or_else(|| PathBuf::from("transwatch"))
}

/// What: Run the requested subcommand.
///
/// Inputs:
/// - `args`: Parsed command-line arguments
/// - `log_handle`: Verbosity switch of the installed subscriber
///
/// Output:
/// - Process exit code.
///
/// # Errors
/// - Settings or watcher failures during startup.
///
/// Details:
/// - `convert` never builds the service graph; every other subcommand does.
pub async fn process_args(args: Args, log_handle: LogHandle) -> Result<ExitCode> {
    let command = args.command.unwrap_or(Command::Watch { locked: false });
    if let Command::Convert {
        locale,
        source,
        target,
    } = &command
    {
        return Ok(convert::handle_convert(locale, source, target));
    }

    let app = App::build(AppOptions {
        workspace_root: std::path::absolute(&args.workspace)?,
        config: args.config,
        converter: converter_path(),
        status: Arc::new(LogStatusBar::new()),
        notifier: Arc::new(TerminalNotifier),
        log_handle: Some(log_handle),
    })?;

    match command {
        Command::Watch { locked } => {
            Arc::new(app).watch(locked).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::GeneratePo => Ok(oneshot::handle_generate_po(&app).await),
        Command::GenerateJson => Ok(oneshot::handle_generate_json(&app).await),
        Command::Scan => Ok(oneshot::handle_scan(&app).await),
        Command::Convert { .. } => Ok(ExitCode::SUCCESS),
    }
}
