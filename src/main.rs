//! transwatch binary entrypoint kept minimal. The runtime lives in the library.

mod args;

use std::process::ExitCode;

use clap::Parser;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> ExitCode {
    let args = args::Args::parse();
    // Logs go to ~/.config/transwatch/logs/transwatch.log
    let log_handle = transwatch::logging::init(&transwatch::settings::logs_dir(), args.verbose);
    tracing::info!(command = ?args.command, "transwatch starting");
    let code = match args::process_args(args, log_handle).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = ?err, "Application error");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    };
    tracing::info!("transwatch exited");
    code
}
