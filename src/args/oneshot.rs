//! One-shot regeneration and scan subcommands.

use std::path::PathBuf;
use std::process::ExitCode;

use transwatch::app::App;
use transwatch::handlers::HandlerOutcome;

/// What: Print one line for an outcome and say whether it counts as failure.
fn print_outcome(subject: &str, outcome: &HandlerOutcome) -> bool {
    match outcome {
        HandlerOutcome::Completed => {
            println!("{subject}: done");
            false
        }
        HandlerOutcome::Skipped(reason) => {
            println!("{subject}: skipped ({reason})");
            false
        }
        HandlerOutcome::Canceled => {
            println!("{subject}: canceled");
            false
        }
        HandlerOutcome::Failed(message) => {
            eprintln!("{subject}: failed: {message}");
            true
        }
    }
}

/// Exit code for a batch of regeneration results.
fn report(results: &[(PathBuf, HandlerOutcome)]) -> ExitCode {
    if results.is_empty() {
        println!("No locale files found.");
    }
    let failed = results
        .iter()
        .filter(|(path, outcome)| print_outcome(&path.display().to_string(), outcome))
        .count();
    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// What: `transwatch generate-po`.
pub async fn handle_generate_po(app: &App) -> ExitCode {
    report(&app.generate_po().await)
}

/// What: `transwatch generate-json`.
pub async fn handle_generate_json(app: &App) -> ExitCode {
    report(&app.generate_json().await)
}

/// What: `transwatch scan`.
pub async fn handle_scan(app: &App) -> ExitCode {
    if print_outcome("scan", &app.scan().await) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
