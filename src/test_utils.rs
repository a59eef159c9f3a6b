//! Test utilities for common test setup.
//!
//! Recording implementations of the host traits, shared by unit tests and
//! the integration tests under `tests/`. Built only for tests and with the
//! `test-utils` feature.

use std::sync::{Mutex, PoisonError};

use crate::host::{Notifier, SlotState, StatusBar, StatusSlot};

/// What: Status bar that remembers every state change.
#[derive(Debug, Default)]
pub struct RecordingStatusBar {
    changes: Mutex<Vec<(StatusSlot, SlotState)>>,
}

impl RecordingStatusBar {
    /// What: All recorded changes in order.
    #[must_use]
    pub fn changes(&self) -> Vec<(StatusSlot, SlotState)> {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// What: Latest state of `slot` (`Idle` when never set).
    #[must_use]
    pub fn last(&self, slot: StatusSlot) -> SlotState {
        self.changes()
            .into_iter()
            .rev()
            .find(|(s, _)| *s == slot)
            .map_or(SlotState::Idle, |(_, state)| state)
    }
}

impl StatusBar for RecordingStatusBar {
    fn set_state(&self, slot: StatusSlot, state: SlotState) {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((slot, state));
    }
}

/// What: Notifier that keeps messages instead of showing them.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    infos: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    /// What: Informational messages in order.
    #[must_use]
    pub fn infos(&self) -> Vec<String> {
        self.infos
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// What: Error messages in order.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn info(&self, message: &str) {
        self.infos
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}
