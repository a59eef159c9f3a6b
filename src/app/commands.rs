//! Host commands: master lock toggle, bulk regeneration and forced scans.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::App;
use crate::handlers::HandlerOutcome;
use crate::layout::FileKind;

/// What: Commands the host can issue while watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// Flip the master lock.
    ToggleLock,
    /// Regenerate every PO file from its JSON file.
    GeneratePo,
    /// Regenerate every JSON file from its PO file.
    GenerateJson,
    /// Run the source scanner.
    Scan,
    /// Stop watching.
    Quit,
}

/// What: Unknown command text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown command `{}` (expected lock, po, json, scan or quit)",
            self.0
        )
    }
}

impl std::error::Error for UnknownCommand {}

impl FromStr for HostCommand {
    type Err = UnknownCommand;

    /// What: Parse one stdin line; surrounding whitespace and case are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lock" | "toggle-lock" => Ok(Self::ToggleLock),
            "po" | "generate-po" => Ok(Self::GeneratePo),
            "json" | "generate-json" => Ok(Self::GenerateJson),
            "scan" => Ok(Self::Scan),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

impl App {
    /// What: Flip the master lock and tell the user its new state.
    ///
    /// Output:
    /// - `true` when the lock is now enabled.
    pub fn toggle_lock(&self) -> bool {
        let ctx = self.context();
        let enabled = ctx.locks.toggle_master_lock();
        let state = if enabled { "enabled" } else { "disabled" };
        ctx.notifier.info(&format!("Masterlock: {state}"));
        enabled
    }

    /// What: Regenerate all PO files from their JSON counterparts.
    pub async fn generate_po(&self) -> Vec<(PathBuf, HandlerOutcome)> {
        self.context().notifier.info("Generating PO files.");
        self.dispatcher().regenerate_all(FileKind::Po).await
    }

    /// What: Regenerate all JSON files from their PO counterparts.
    pub async fn generate_json(&self) -> Vec<(PathBuf, HandlerOutcome)> {
        self.context().notifier.info("Generating JSON files.");
        self.dispatcher().regenerate_all(FileKind::Json).await
    }

    /// What: Run the source scanner now.
    pub async fn scan(&self) -> HandlerOutcome {
        self.dispatcher().force_scan().await
    }

    /// What: Execute one host command.
    ///
    /// Output:
    /// - `false` when the command asks to stop watching.
    pub async fn execute(&self, command: HostCommand) -> bool {
        tracing::debug!("[Command] {command:?}");
        match command {
            HostCommand::ToggleLock => {
                self.toggle_lock();
            }
            HostCommand::GeneratePo => {
                summarize(&self.generate_po().await);
            }
            HostCommand::GenerateJson => {
                summarize(&self.generate_json().await);
            }
            HostCommand::Scan => {
                self.scan().await;
            }
            HostCommand::Quit => return false,
        }
        true
    }
}

/// Log how many regenerations completed.
fn summarize(results: &[(PathBuf, HandlerOutcome)]) {
    let completed = results
        .iter()
        .filter(|(_, o)| *o == HandlerOutcome::Completed)
        .count();
    tracing::info!("[Command] {completed}/{} files regenerated", results.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// What: Stdin lines map to commands regardless of case and padding.
    fn parses_host_commands() {
        assert_eq!(" LOCK \n".parse(), Ok(HostCommand::ToggleLock));
        assert_eq!("po".parse(), Ok(HostCommand::GeneratePo));
        assert_eq!("generate-json".parse(), Ok(HostCommand::GenerateJson));
        assert_eq!("scan".parse(), Ok(HostCommand::Scan));
        assert_eq!("q".parse(), Ok(HostCommand::Quit));
        let err = "rebuild".parse::<HostCommand>().expect_err("unknown");
        assert_eq!(err, UnknownCommand("rebuild".to_string()));
    }
}
