//! Source scanning when code changes translation key usage.

use super::command::scanner_request;
use super::{ChangeEvent, HandlerContext, HandlerOutcome, SkipReason};
use crate::host::{SlotState, StatusSlot};
use crate::layout::FileKind;

/// What: Handler running the project-wide scanner for relevant code edits.
#[derive(Debug)]
pub struct CodeHandler<'a> {
    ctx: &'a HandlerContext,
}

impl<'a> CodeHandler<'a> {
    /// What: Handler over the shared services.
    #[must_use]
    pub const fn new(ctx: &'a HandlerContext) -> Self {
        Self { ctx }
    }

    /// What: Run one code change cycle.
    ///
    /// Output:
    /// - `Skipped(NoTranslationKeys)` when the changed lines contain no
    ///   `t(...)` / `I18nKey(...)` literal call.
    /// - Otherwise the scanner's outcome.
    ///
    /// Details:
    /// - The file's snapshot is committed once the diff has been inspected,
    ///   whatever the scanner outcome.
    pub async fn handle_change(&self, event: &ChangeEvent) -> HandlerOutcome {
        let ctx = self.ctx;
        if let Some(reason) = ctx.check_master_lock() {
            return HandlerOutcome::Skipped(reason);
        }
        let settings = ctx.settings();
        if let Some(reason) = ctx.check_file_mode(&settings, FileKind::Code, event) {
            return HandlerOutcome::Skipped(reason);
        }
        if let Some(reason) = ctx.check_merge_state(&[]) {
            return HandlerOutcome::Skipped(reason);
        }

        tracing::debug!("Code file changed: {}", event.path.display());
        if let Err(e) = ctx.content.update_current(&event.path) {
            return HandlerOutcome::Failed(format!(
                "failed to read {}: {e}",
                event.path.display()
            ));
        }
        let outcome = if ctx.content.contains_translation_key_usage(&event.path) {
            self.scan(&settings.scanner_command, &settings.scanner_config_relative_path)
                .await
        } else {
            HandlerOutcome::Skipped(SkipReason::NoTranslationKeys)
        };
        ctx.content.commit(&event.path);
        outcome
    }

    /// What: Run the scanner without looking at any file diff.
    ///
    /// Details:
    /// - Still honours the master lock and an in-progress merge.
    pub async fn force_scan(&self) -> HandlerOutcome {
        let ctx = self.ctx;
        if let Some(reason) = ctx.check_master_lock() {
            return HandlerOutcome::Skipped(reason);
        }
        if let Some(reason) = ctx.check_merge_state(&[]) {
            return HandlerOutcome::Skipped(reason);
        }
        tracing::debug!("Manual code scan requested.");
        let settings = ctx.settings();
        self.scan(&settings.scanner_command, &settings.scanner_config_relative_path)
            .await
    }

    /// Run the scanner with busy indicators; a superseded run leaves them busy.
    async fn scan(&self, template: &str, config: &str) -> HandlerOutcome {
        let ctx = self.ctx;
        let Some(request) = scanner_request(template, config) else {
            return HandlerOutcome::Skipped(SkipReason::NoCommand);
        };
        ctx.status.set_state(StatusSlot::Json, SlotState::Converting);
        ctx.status.set_state(StatusSlot::Code, SlotState::Scanning);

        let outcome = match ctx.executor.run(request).await {
            Ok(output) if output.success() => HandlerOutcome::Completed,
            Ok(output) => HandlerOutcome::Failed(format!(
                "source scan exited with code {}: {}",
                output.exit_code,
                output.stderr.trim()
            )),
            Err(e) if e.is_canceled() => return HandlerOutcome::Canceled,
            Err(e) => HandlerOutcome::Failed(e.to_string()),
        };
        ctx.status.set_state(StatusSlot::Json, SlotState::Idle);
        ctx.status.set_state(StatusSlot::Code, SlotState::Idle);
        outcome
    }
}
