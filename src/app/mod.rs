//! Service wiring, host commands and the watch loop.

mod commands;
mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub use commands::{HostCommand, UnknownCommand};
pub use watch::PathAction;

use crate::content_store::ContentStore;
use crate::executor::ProcessExecutor;
use crate::handlers::{Dispatcher, HandlerContext};
use crate::host::{Notifier, SlotState, StatusBar, StatusSlot};
use crate::layout::LocaleLayout;
use crate::locks::LockRegistry;
use crate::logging::LogHandle;
use crate::settings::{SettingsChange, SettingsStore, find_project_root, resolve_settings_path};
use crate::translate::TranslationService;
use crate::watcher::{ContentHashFilter, WatchFilter};

/// Result type used by the application layer.
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// What: Inputs needed to assemble the application.
pub struct AppOptions {
    /// Workspace root directory.
    pub workspace_root: PathBuf,
    /// Explicit settings file (`--config`).
    pub config: Option<PathBuf>,
    /// Binary providing the built-in `convert` subcommand.
    pub converter: PathBuf,
    /// Status indicator sink.
    pub status: Arc<dyn StatusBar>,
    /// Notification sink.
    pub notifier: Arc<dyn Notifier>,
    /// Verbosity switch, when logging was initialised by the caller.
    pub log_handle: Option<LogHandle>,
}

/// What: The assembled services plus watch-time state.
pub struct App {
    dispatcher: Dispatcher,
    filter: WatchFilter,
    hashes: ContentHashFilter,
    log_handle: Option<LogHandle>,
}

impl App {
    /// What: Resolve roots, load settings and construct every service.
    ///
    /// # Errors
    /// - Missing explicit settings file, unreadable settings or invalid code globs.
    ///
    /// Details:
    /// - The project root (where external commands run) is the directory of
    ///   `package.json`; the workspace root is used when none is found.
    /// - Enabling auto-translation without an API key is reported once and
    ///   leaves translation disabled.
    pub fn build(options: AppOptions) -> Result<Self> {
        let workspace_root = options.workspace_root;
        let settings_path = resolve_settings_path(options.config.as_deref(), &workspace_root)?;
        let settings = Arc::new(SettingsStore::open(settings_path)?);
        let current = settings.get();
        if let Some(handle) = &options.log_handle
            && current.enable_verbose_logging
        {
            handle.set_verbose(true);
        }

        let project_root = find_project_root(&workspace_root, &current).unwrap_or_else(|| {
            tracing::warn!(
                "No package.json found; running commands in {}",
                workspace_root.display()
            );
            workspace_root.clone()
        });
        let layout = LocaleLayout::new(current.locales_dir(&workspace_root));
        let filter = WatchFilter::new(&workspace_root, layout.clone(), &current.code_globs)?;

        let ctx = HandlerContext::new(
            Arc::new(LockRegistry::new()),
            Arc::new(ProcessExecutor::new(
                project_root,
                Duration::from_millis(current.debounce_ms),
            )),
            Arc::new(ContentStore::new()),
            settings,
            options.status,
            options.notifier,
            layout,
            workspace_root,
            options.converter,
        );
        let app = Self {
            dispatcher: Dispatcher::new(Arc::new(ctx)),
            filter,
            hashes: ContentHashFilter::new(),
            log_handle: options.log_handle,
        };
        app.configure_translation();
        Ok(app)
    }

    /// What: Shared services.
    #[must_use]
    pub fn context(&self) -> &Arc<HandlerContext> {
        self.dispatcher.context()
    }

    /// What: Change dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// What: Path filter used by the watch loop.
    #[must_use]
    pub const fn filter(&self) -> &WatchFilter {
        &self.filter
    }

    /// What: Show the initial status of every slot.
    pub fn init_status(&self) {
        let ctx = self.context();
        let generate_po = ctx.settings().generate_po;
        for slot in StatusSlot::ALL {
            let state = if slot == StatusSlot::Po && !generate_po {
                SlotState::Disabled
            } else {
                SlotState::Idle
            };
            ctx.status.set_state(slot, state);
        }
    }

    /// What: Cache the content of every watched code file.
    ///
    /// Output:
    /// - Number of files seeded.
    pub fn seed_content(&self) -> usize {
        let files = self.filter.code_files();
        self.context().content.seed_initial(&files)
    }

    /// (Re)build the translation service from the current settings.
    fn configure_translation(&self) {
        let ctx = self.context();
        match TranslationService::from_settings(&ctx.settings()) {
            Ok(service) => {
                if service.is_some() {
                    tracing::info!("Auto-translation enabled");
                }
                ctx.set_translation(service);
            }
            Err(e) => {
                tracing::error!("{e}");
                ctx.notifier.error(&e.to_string());
                ctx.set_translation(None);
            }
        }
    }

    /// What: React to settings changes reported by a reload.
    pub fn apply_settings_changes(&self, changes: &[SettingsChange]) {
        let ctx = self.context();
        for change in changes {
            match change {
                SettingsChange::OverallFileMode(mode) => {
                    tracing::info!("File mode for all kinds set to {mode}");
                }
                SettingsChange::FileMode(kind, mode) => {
                    tracing::info!("File mode for {kind} files set to {mode}");
                }
                SettingsChange::VerboseLogging(verbose) => {
                    if let Some(handle) = &self.log_handle {
                        handle.set_verbose(*verbose);
                    }
                }
                SettingsChange::GeneratePo(enabled) => {
                    let state = if *enabled {
                        SlotState::Idle
                    } else {
                        SlotState::Disabled
                    };
                    ctx.status.set_state(StatusSlot::Po, state);
                }
                SettingsChange::Translation => self.configure_translation(),
                SettingsChange::RequiresRestart(key) => {
                    tracing::warn!("Setting `{key}` changed; restart to apply it");
                }
            }
        }
    }

    /// What: Whether `path` is the settings file in use.
    #[must_use]
    pub fn is_settings_file(&self, path: &Path) -> bool {
        self.context()
            .settings
            .path()
            .is_some_and(|settings| settings == path)
    }
}
