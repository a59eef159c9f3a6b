//! Host-facing collaborators: status indicators and user notifications.
//!
//! Handlers only talk to the [`StatusBar`] and [`Notifier`] traits. The
//! binary uses the terminal-backed implementations below; tests use the
//! recording fakes in `test_utils`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::layout::FileKind;

/// What: One status indicator per file kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusSlot {
    /// PO generation (driven by JSON changes).
    Po,
    /// JSON generation (driven by PO changes).
    Json,
    /// Source scanning.
    Code,
}

impl StatusSlot {
    /// What: Every slot in display order.
    pub const ALL: [Self; 3] = [Self::Po, Self::Json, Self::Code];

    /// What: Short label shown next to the icon.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Po => "PO",
            Self::Json => "JSON",
            Self::Code => "Code",
        }
    }
}

impl From<FileKind> for StatusSlot {
    fn from(kind: FileKind) -> Self {
        match kind {
            FileKind::Po => Self::Po,
            FileKind::Json => Self::Json,
            FileKind::Code => Self::Code,
        }
    }
}

impl fmt::Display for StatusSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What: State shown by a status slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotState {
    /// Watching, nothing running.
    #[default]
    Idle,
    /// A conversion is debouncing or running.
    Converting,
    /// A source scan is debouncing or running.
    Scanning,
    /// The slot's feature is turned off.
    Disabled,
}

impl SlotState {
    /// What: Icon code for the state.
    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Idle => "$(eye)",
            Self::Converting => "$(sync~spin)",
            Self::Scanning => "$(search)",
            Self::Disabled => "$(eye-closed)",
        }
    }

    /// What: Tooltip text for `slot` in this state.
    #[must_use]
    pub fn tooltip(self, slot: StatusSlot) -> String {
        match (self, slot) {
            (Self::Idle, StatusSlot::Code) => {
                "Watching source files for translation keys".to_string()
            }
            (Self::Idle, _) => format!("Watching for changes; click to regenerate {slot} files"),
            (Self::Converting, _) => format!("Generating {slot} files"),
            (Self::Scanning, _) => "Scanning source files for translation keys".to_string(),
            (Self::Disabled, StatusSlot::Po) => "PO generation is disabled".to_string(),
            (Self::Disabled, _) => format!("{slot} watcher disabled"),
        }
    }
}

/// What: Sink for status indicator updates.
pub trait StatusBar: Send + Sync {
    /// What: Show `state` in `slot`.
    fn set_state(&self, slot: StatusSlot, state: SlotState);
}

/// What: Sink for user-facing notifications.
pub trait Notifier: Send + Sync {
    /// What: Informational message.
    fn info(&self, message: &str);
    /// What: Error message.
    fn error(&self, message: &str);
}

/// What: Status bar that logs transitions and remembers the current states.
#[derive(Debug, Default)]
pub struct LogStatusBar {
    states: Mutex<HashMap<StatusSlot, SlotState>>,
}

impl LogStatusBar {
    /// What: Status bar with every slot idle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// What: Current state of `slot`.
    #[must_use]
    pub fn state(&self, slot: StatusSlot) -> SlotState {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&slot)
            .copied()
            .unwrap_or_default()
    }
}

impl StatusBar for LogStatusBar {
    fn set_state(&self, slot: StatusSlot, state: SlotState) {
        let previous = self
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(slot, state);
        if previous != Some(state) {
            tracing::info!(
                "[Status] {} {}: {}",
                state.icon(),
                slot.label(),
                state.tooltip(slot)
            );
        }
    }
}

/// What: Notifier printing to stderr and mirroring into the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn info(&self, message: &str) {
        tracing::info!("[Notify] {message}");
        eprintln!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("[Notify] {message}");
        eprintln!("error: {message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// What: Slots default to idle and remember the last state set.
    fn log_status_bar_tracks_state() {
        let bar = LogStatusBar::new();
        assert_eq!(bar.state(StatusSlot::Po), SlotState::Idle);
        bar.set_state(StatusSlot::Po, SlotState::Converting);
        bar.set_state(StatusSlot::Code, SlotState::Scanning);
        assert_eq!(bar.state(StatusSlot::Po), SlotState::Converting);
        assert_eq!(bar.state(StatusSlot::Code), SlotState::Scanning);
        assert_eq!(bar.state(StatusSlot::Json), SlotState::Idle);
    }

    #[test]
    /// What: Icons match the host's codicon names.
    fn icons_per_state() {
        assert_eq!(SlotState::Idle.icon(), "$(eye)");
        assert_eq!(SlotState::Converting.icon(), "$(sync~spin)");
        assert_eq!(SlotState::Scanning.icon(), "$(search)");
        assert_eq!(SlotState::Disabled.icon(), "$(eye-closed)");
        assert_eq!(StatusSlot::from(FileKind::Json), StatusSlot::Json);
    }
}
