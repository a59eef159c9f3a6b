//! JSON -> PO regeneration, with optional backfilling of sibling locales.

use std::sync::Arc;

use super::command::conversion_request;
use super::{ChangeEvent, HandlerContext, HandlerOutcome, SkipReason};
use crate::convert::{SUCCESS_MARKER, read_json_file};
use crate::host::{SlotState, StatusSlot};
use crate::layout::{FileKind, ResourceId};

/// What: Handler regenerating a locale's PO file when its JSON file changes.
#[derive(Debug)]
pub struct JsonHandler<'a> {
    ctx: &'a HandlerContext,
}

impl<'a> JsonHandler<'a> {
    /// What: Handler over the shared services.
    #[must_use]
    pub const fn new(ctx: &'a HandlerContext) -> Self {
        Self { ctx }
    }

    /// What: Run one JSON change cycle.
    ///
    /// Inputs:
    /// - `event`: JSON change with its resource id
    ///
    /// Output:
    /// - `Skipped` when the master lock is on, PO generation is disabled,
    ///   manual mode applies, or a merge is unresolved.
    /// - `Completed` after the converter exited with 0.
    ///
    /// Details:
    /// - The locale lock is taken before the job is submitted so the PO
    ///   change caused by the write is skipped by the PO handler. It is
    ///   released when the job ends, or by the cancel hook when the job is
    ///   superseded.
    /// - Auto-translation of sibling locales is started before conversion
    ///   and runs detached; its failures never affect this cycle.
    pub async fn handle_change(&self, event: &ChangeEvent) -> HandlerOutcome {
        let ctx = self.ctx;
        if let Some(reason) = ctx.check_master_lock() {
            return HandlerOutcome::Skipped(reason);
        }
        let Some(resource) = event.resource.as_ref() else {
            return HandlerOutcome::Skipped(SkipReason::NotALocaleFile);
        };
        tracing::debug!("JSON file changed: {}", event.path.display());
        let settings = ctx.settings();
        if !settings.generate_po {
            return HandlerOutcome::Skipped(SkipReason::GenerationDisabled);
        }
        if let Some(reason) = ctx.check_file_mode(&settings, FileKind::Json, event) {
            return HandlerOutcome::Skipped(reason);
        }
        let Some(po_path) = ctx.layout.path_for(resource, FileKind::Po) else {
            return HandlerOutcome::Skipped(SkipReason::NotALocaleFile);
        };
        if let Some(reason) = ctx.check_merge_state(&[event.path.as_path(), po_path.as_path()]) {
            tracing::info!("Skipping {}: {reason}", event.path.display());
            return HandlerOutcome::Skipped(reason);
        }

        self.start_auto_translation(event, resource);

        let Some(request) = conversion_request(
            settings.json_to_po_command.as_deref(),
            &ctx.converter,
            &resource.locale,
            &event.path,
            &po_path,
        ) else {
            return HandlerOutcome::Skipped(SkipReason::NoCommand);
        };

        ctx.status.set_state(StatusSlot::Po, SlotState::Converting);
        let lock_key = resource.lock_key();
        ctx.locks.add_lock(&lock_key);

        let status = Arc::clone(&ctx.status);
        let locks = Arc::clone(&ctx.locks);
        let cancel_key = lock_key.clone();
        let request = request
            .with_success_marker(SUCCESS_MARKER, move |_| {
                status.set_state(StatusSlot::Po, SlotState::Idle);
            })
            .with_on_cancel(move || {
                tracing::debug!("Removing lock on {cancel_key} because the job was canceled.");
                locks.remove_lock(&cancel_key);
            });

        let outcome = match ctx.executor.run(request).await {
            Ok(output) if output.success() => {
                tracing::debug!("{}", output.stdout.trim());
                HandlerOutcome::Completed
            }
            Ok(output) => HandlerOutcome::Failed(format!(
                "JSON to PO conversion exited with code {}: {}",
                output.exit_code,
                output.stderr.trim()
            )),
            Err(e) if e.is_canceled() => return HandlerOutcome::Canceled,
            Err(e) => HandlerOutcome::Failed(e.to_string()),
        };
        ctx.locks.remove_lock(&lock_key);
        ctx.status.set_state(StatusSlot::Po, SlotState::Idle);
        outcome
    }

    /// Kick off sibling backfilling when auto-translation is enabled.
    fn start_auto_translation(&self, event: &ChangeEvent, resource: &ResourceId) {
        let Some(service) = self.ctx.translation() else {
            return;
        };
        match read_json_file(&event.path) {
            Ok(changed) => {
                let tasks = service.spawn_backfill(&self.ctx.layout, resource, &changed);
                tracing::debug!(siblings = tasks.len(), "Started auto-translation for {resource}");
            }
            Err(e) => tracing::warn!("Auto-translation skipped for {resource}: {e}"),
        }
    }
}
