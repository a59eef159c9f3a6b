//! PO -> JSON regeneration.

use std::path::Path;
use std::sync::Arc;

use super::command::conversion_request;
use super::{ChangeEvent, HandlerContext, HandlerOutcome, SkipReason};
use crate::convert::{SUCCESS_MARKER, read_json_file, to_canonical_string, write_if_changed};
use crate::host::{SlotState, StatusSlot};
use crate::layout::FileKind;

/// What: Handler regenerating a locale's JSON file when its PO file changes.
#[derive(Debug)]
pub struct PoHandler<'a> {
    ctx: &'a HandlerContext,
}

impl<'a> PoHandler<'a> {
    /// What: Handler over the shared services.
    #[must_use]
    pub const fn new(ctx: &'a HandlerContext) -> Self {
        Self { ctx }
    }

    /// What: Run one PO change cycle.
    ///
    /// Inputs:
    /// - `event`: PO change with its resource id
    ///
    /// Output:
    /// - `Skipped` when a guard fails (master lock, locale locked, manual
    ///   mode for a watcher event, merge conflict or merge in progress).
    /// - `Completed` after the converter exited with 0 and the JSON output
    ///   was rewritten in canonical form.
    ///
    /// Details:
    /// - The JSON status slot shows "converting" until the converter reports
    ///   the success marker or the job ends. A superseded job leaves the
    ///   slot busy for the job that replaced it.
    pub async fn handle_change(&self, event: &ChangeEvent) -> HandlerOutcome {
        let ctx = self.ctx;
        if let Some(reason) = ctx.check_master_lock() {
            return HandlerOutcome::Skipped(reason);
        }
        let Some(resource) = event.resource.as_ref() else {
            return HandlerOutcome::Skipped(SkipReason::NotALocaleFile);
        };
        let lock_key = resource.lock_key();
        if ctx.locks.is_locked(&lock_key) {
            tracing::debug!("PO file {resource} locked. Skipping.");
            return HandlerOutcome::Skipped(SkipReason::Locked(lock_key));
        }
        let settings = ctx.settings();
        if let Some(reason) = ctx.check_file_mode(&settings, FileKind::Po, event) {
            return HandlerOutcome::Skipped(reason);
        }
        let Some(json_path) = ctx.layout.path_for(resource, FileKind::Json) else {
            return HandlerOutcome::Skipped(SkipReason::NotALocaleFile);
        };
        if let Some(reason) = ctx.check_merge_state(&[event.path.as_path(), json_path.as_path()]) {
            tracing::info!("Skipping {}: {reason}", event.path.display());
            return HandlerOutcome::Skipped(reason);
        }

        tracing::debug!("PO file changed: {}", event.path.display());
        let Some(request) = conversion_request(
            settings.po_to_json_command.as_deref(),
            &ctx.converter,
            &resource.locale,
            &event.path,
            &json_path,
        ) else {
            return HandlerOutcome::Skipped(SkipReason::NoCommand);
        };
        ctx.status.set_state(StatusSlot::Json, SlotState::Converting);
        let status = Arc::clone(&ctx.status);
        let request = request.with_success_marker(SUCCESS_MARKER, move |_| {
            status.set_state(StatusSlot::Json, SlotState::Idle);
        });

        let outcome = match ctx.executor.run(request).await {
            Ok(output) if output.success() => match canonicalize_json(&json_path) {
                Ok(()) => HandlerOutcome::Completed,
                Err(message) => HandlerOutcome::Failed(message),
            },
            Ok(output) => HandlerOutcome::Failed(format!(
                "PO to JSON conversion exited with code {}: {}",
                output.exit_code,
                output.stderr.trim()
            )),
            Err(e) if e.is_canceled() => return HandlerOutcome::Canceled,
            Err(e) => HandlerOutcome::Failed(e.to_string()),
        };
        ctx.status.set_state(StatusSlot::Json, SlotState::Idle);
        outcome
    }
}

/// What: Rewrite a generated JSON file with sorted keys and 4-space indentation.
///
/// # Errors
/// - Returns a message when the file cannot be read, parsed or written.
fn canonicalize_json(path: &Path) -> Result<(), String> {
    let value = read_json_file(path).map_err(|e| e.to_string())?;
    let text = to_canonical_string(&value).map_err(|e| e.to_string())?;
    if write_if_changed(path, &text).map_err(|e| format!("{}: {e}", path.display()))? {
        tracing::debug!("Sorted {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// What: Canonicalisation sorts keys and is a no-op on sorted files.
    fn canonicalize_sorts_in_place() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("common.json");
        std::fs::write(&path, r#"{"b":"2","a":{"d":"","c":"1"}}"#).expect("write");
        canonicalize_json(&path).expect("sorted");
        let sorted = std::fs::read_to_string(&path).expect("read");
        assert_eq!(
            sorted,
            "{\n    \"a\": {\n        \"c\": \"1\",\n        \"d\": \"\"\n    },\n    \"b\": \"2\"\n}\n"
        );
        canonicalize_json(&path).expect("still sorted");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), sorted);
    }

    #[test]
    /// What: Broken JSON output is reported as a failure message.
    fn canonicalize_reports_parse_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("common.json");
        std::fs::write(&path, "{not json").expect("write");
        assert!(canonicalize_json(&path).is_err());
    }
}
