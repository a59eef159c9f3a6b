//! Change dispatch and the PO, JSON and code handlers.
//!
//! Every handler runs a fixed guard sequence and then, at most, one executor
//! job. Handlers never return errors: the result of a cycle is a
//! [`HandlerOutcome`] that the dispatcher logs (and reports to the user for
//! manually triggered work).

pub mod command;
mod code;
pub mod guards;
mod json;
mod po;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::join_all;

pub use code::CodeHandler;
pub use json::JsonHandler;
pub use po::PoHandler;

use crate::content_store::ContentStore;
use crate::executor::ProcessExecutor;
use crate::host::{Notifier, StatusBar};
use crate::layout::{FileKind, LocaleLayout, ResourceId};
use crate::locks::{LockRegistry, ResourceKey};
use crate::settings::{FileMode, Settings, SettingsStore};
use crate::translate::TranslationService;

/// What: Where a change event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Live filesystem watcher.
    Watcher,
    /// Host command or bulk regeneration.
    Manual,
}

/// What: One change to handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Changed file.
    pub path: PathBuf,
    /// Kind derived from the extension.
    pub kind: FileKind,
    /// Locale and namespace for locale files, derived where the event entered.
    pub resource: Option<ResourceId>,
    /// Origin of the event.
    pub trigger: Trigger,
}

impl ChangeEvent {
    /// What: Classify `path` and derive its resource identity from `layout`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, layout: &LocaleLayout, trigger: Trigger) -> Self {
        let path = path.into();
        let kind = FileKind::classify(&path);
        let resource = match kind {
            FileKind::Code => None,
            FileKind::Po | FileKind::Json => layout.resource_for(&path),
        };
        Self {
            path,
            kind,
            resource,
            trigger,
        }
    }

    /// What: Whether the event came from the filesystem watcher.
    #[must_use]
    pub fn from_watcher(&self) -> bool {
        self.trigger == Trigger::Watcher
    }
}

/// What: Why a handler stopped before doing any work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The master lock is enabled.
    MasterLock,
    /// The counterpart is being generated by another handler.
    Locked(ResourceKey),
    /// Manual mode is set for this kind and the event came from the watcher.
    ManualMode(FileKind),
    /// PO generation is turned off.
    GenerationDisabled,
    /// A file involved contains conflict markers.
    MergeConflict(PathBuf),
    /// The repository is in the middle of a merge.
    MergeInProgress,
    /// The code change does not touch any translation key call.
    NoTranslationKeys,
    /// The file is not `<locales>/<locale>/<namespace>.<ext>`.
    NotALocaleFile,
    /// The configured command template is empty.
    NoCommand,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MasterLock => f.write_str("master lock enabled"),
            Self::Locked(key) => write!(f, "locked ({key})"),
            Self::ManualMode(kind) => write!(f, "manual mode enabled for {kind} files"),
            Self::GenerationDisabled => f.write_str("PO generation disabled"),
            Self::MergeConflict(path) => {
                write!(f, "merge conflict markers in {}", path.display())
            }
            Self::MergeInProgress => f.write_str("merge in progress"),
            Self::NoTranslationKeys => f.write_str("no translation key usage changed"),
            Self::NotALocaleFile => f.write_str("not a locale file"),
            Self::NoCommand => f.write_str("no command configured"),
        }
    }
}

/// What: Result of one handler cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The external job ran and exited successfully.
    Completed,
    /// A guard stopped the cycle.
    Skipped(SkipReason),
    /// The job failed; the message describes why.
    Failed(String),
    /// The job was superseded by a newer one or canceled.
    Canceled,
}

impl HandlerOutcome {
    /// What: Whether the cycle was stopped by a guard.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

/// What: Services shared by every handler.
///
/// Details:
/// - Constructed once at startup and shared behind an `Arc`; handlers hold
///   only a borrow for the duration of one cycle.
pub struct HandlerContext {
    /// Master and per-locale locks.
    pub locks: Arc<LockRegistry>,
    /// Debounced process runner.
    pub executor: Arc<ProcessExecutor>,
    /// Source file snapshots.
    pub content: Arc<ContentStore>,
    /// Live settings.
    pub settings: Arc<SettingsStore>,
    /// Status indicators.
    pub status: Arc<dyn StatusBar>,
    /// User notifications.
    pub notifier: Arc<dyn Notifier>,
    /// Locales tree.
    pub layout: LocaleLayout,
    /// Workspace root (used for merge detection).
    pub workspace_root: PathBuf,
    /// Binary providing the built-in `convert` subcommand.
    pub converter: PathBuf,
    translation: RwLock<Option<TranslationService>>,
}

impl fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerContext")
            .field("layout", &self.layout)
            .field("workspace_root", &self.workspace_root)
            .field("converter", &self.converter)
            .finish_non_exhaustive()
    }
}

impl HandlerContext {
    /// What: Bundle the shared services.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        locks: Arc<LockRegistry>,
        executor: Arc<ProcessExecutor>,
        content: Arc<ContentStore>,
        settings: Arc<SettingsStore>,
        status: Arc<dyn StatusBar>,
        notifier: Arc<dyn Notifier>,
        layout: LocaleLayout,
        workspace_root: PathBuf,
        converter: PathBuf,
    ) -> Self {
        Self {
            locks,
            executor,
            content,
            settings,
            status,
            notifier,
            layout,
            workspace_root,
            converter,
            translation: RwLock::new(None),
        }
    }

    /// What: Replace the auto-translation service (`None` disables it).
    pub fn set_translation(&self, service: Option<TranslationService>) {
        *self
            .translation
            .write()
            .unwrap_or_else(PoisonError::into_inner) = service;
    }

    /// What: Current auto-translation service, if enabled.
    #[must_use]
    pub fn translation(&self) -> Option<TranslationService> {
        self.translation
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// What: Snapshot of the current settings.
    #[must_use]
    pub fn settings(&self) -> Settings {
        self.settings.get()
    }

    /// What: Guard shared by all handlers: the master lock stops everything.
    #[must_use]
    pub fn check_master_lock(&self) -> Option<SkipReason> {
        self.locks
            .is_master_locked()
            .then_some(SkipReason::MasterLock)
    }

    /// What: Guard: manual mode ignores watcher events.
    #[must_use]
    pub fn check_file_mode(
        &self,
        settings: &Settings,
        kind: FileKind,
        event: &ChangeEvent,
    ) -> Option<SkipReason> {
        (settings.file_mode(kind) == FileMode::Manual && event.from_watcher())
            .then_some(SkipReason::ManualMode(kind))
    }

    /// What: Guard: conflict markers in any of `files`, or a merge in progress.
    #[must_use]
    pub fn check_merge_state(&self, files: &[&Path]) -> Option<SkipReason> {
        if let Some(path) = files.iter().find(|p| guards::has_merge_markers(p)) {
            return Some(SkipReason::MergeConflict(path.to_path_buf()));
        }
        guards::merge_in_progress(&self.workspace_root).then_some(SkipReason::MergeInProgress)
    }
}

/// What: Routes change events to the handler for their file kind.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    ctx: Arc<HandlerContext>,
}

impl Dispatcher {
    /// What: Dispatcher over the shared services.
    #[must_use]
    pub const fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }

    /// What: Shared services.
    #[must_use]
    pub fn context(&self) -> &Arc<HandlerContext> {
        &self.ctx
    }

    /// What: Build the event for `path` and handle it.
    pub async fn dispatch_path(&self, path: &Path, trigger: Trigger) -> HandlerOutcome {
        let event = ChangeEvent::new(path, &self.ctx.layout, trigger);
        self.dispatch(&event).await
    }

    /// What: Run the handler matching `event.kind`.
    ///
    /// Details:
    /// - Skips are logged at debug level, failures at warn level. Failures
    ///   of manually triggered work are also shown to the user; watcher
    ///   failures only go to the log.
    pub async fn dispatch(&self, event: &ChangeEvent) -> HandlerOutcome {
        let outcome = match event.kind {
            FileKind::Po => PoHandler::new(&self.ctx).handle_change(event).await,
            FileKind::Json => JsonHandler::new(&self.ctx).handle_change(event).await,
            FileKind::Code => CodeHandler::new(&self.ctx).handle_change(event).await,
        };
        self.report(event.kind, Some(&event.path), event.trigger, &outcome);
        outcome
    }

    /// What: Run the source scanner regardless of what changed.
    pub async fn force_scan(&self) -> HandlerOutcome {
        let outcome = CodeHandler::new(&self.ctx).force_scan().await;
        self.report(FileKind::Code, None, Trigger::Manual, &outcome);
        outcome
    }

    /// What: Regenerate every file of `target` kind from its counterpart.
    ///
    /// Inputs:
    /// - `target`: `FileKind::Po` runs the JSON handler on every JSON file,
    ///   `FileKind::Json` the PO handler on every PO file
    ///
    /// Output:
    /// - One outcome per source file, in path order.
    pub async fn regenerate_all(&self, target: FileKind) -> Vec<(PathBuf, HandlerOutcome)> {
        let Some(source_kind) = target.counterpart() else {
            return Vec::new();
        };
        let files = self.ctx.layout.files_of_kind(source_kind);
        tracing::info!(count = files.len(), "Regenerating {target} files");
        let runs = files.into_iter().map(|(path, resource)| async move {
            let event = ChangeEvent {
                path: path.clone(),
                kind: source_kind,
                resource: Some(resource),
                trigger: Trigger::Manual,
            };
            let outcome = self.dispatch(&event).await;
            (path, outcome)
        });
        join_all(runs).await
    }

    /// Log an outcome; surface manual failures to the user.
    fn report(
        &self,
        kind: FileKind,
        path: Option<&Path>,
        trigger: Trigger,
        outcome: &HandlerOutcome,
    ) {
        let subject = path.map_or_else(
            || "manual trigger".to_string(),
            |p| p.display().to_string(),
        );
        match outcome {
            HandlerOutcome::Completed => {
                tracing::info!("{kind} change handled: {subject}");
            }
            HandlerOutcome::Skipped(reason) => {
                tracing::debug!("{kind} change skipped ({reason}): {subject}");
            }
            HandlerOutcome::Canceled => {
                tracing::debug!("{kind} change superseded: {subject}");
            }
            HandlerOutcome::Failed(message) => {
                tracing::warn!("{kind} change failed for {subject}: {message}");
                if trigger == Trigger::Manual {
                    self.ctx.notifier.error(message);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// What: Events carry the resource id only for conforming locale files.
    fn change_event_derives_resource() {
        let layout = LocaleLayout::new("/ws/public/locales");
        let po = ChangeEvent::new("/ws/public/locales/de/common.po", &layout, Trigger::Watcher);
        assert_eq!(po.kind, FileKind::Po);
        assert_eq!(po.resource, Some(ResourceId::new("de", "common")));
        assert!(po.from_watcher());

        let code = ChangeEvent::new("/ws/apps/web/App.tsx", &layout, Trigger::Manual);
        assert_eq!(code.kind, FileKind::Code);
        assert_eq!(code.resource, None);

        let stray = ChangeEvent::new("/ws/package.json", &layout, Trigger::Watcher);
        assert_eq!(stray.kind, FileKind::Json);
        assert_eq!(stray.resource, None);
    }

    #[test]
    /// What: Skip reasons render the text used in logs.
    fn skip_reason_display() {
        assert_eq!(SkipReason::Locked(ResourceKey::new("de")).to_string(), "locked (de)");
        assert_eq!(
            SkipReason::ManualMode(FileKind::Po).to_string(),
            "manual mode enabled for PO files"
        );
    }
}
