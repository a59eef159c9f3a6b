//! The watch loop: filesystem events, stdin commands and shutdown.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::RecursiveMode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::select;

use super::{App, HostCommand, Result};
use crate::handlers::Trigger;
use crate::watcher::spawn_watcher;

/// What: What the loop should do with one changed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathAction {
    /// The settings file changed.
    ReloadSettings,
    /// Hand the path to the dispatcher.
    Dispatch(PathBuf),
    /// Drop the event.
    Ignore,
}

impl App {
    /// What: Decide how to treat a path reported by the watcher.
    ///
    /// Details:
    /// - Paths that are neither locale files nor matched code files are
    ///   ignored, as is everything while the master lock is enabled.
    /// - Events whose file content is identical to the last dispatched
    ///   content are dropped; this stops writes by the converters from
    ///   bouncing back and forth.
    #[must_use]
    pub fn route(&self, path: &Path) -> PathAction {
        if self.is_settings_file(path) {
            return PathAction::ReloadSettings;
        }
        let Some(kind) = self.filter.classify(path) else {
            return PathAction::Ignore;
        };
        if self.context().locks.is_master_locked() {
            tracing::debug!(
                "[Watch] master lock enabled, ignoring {kind} change {}",
                path.display()
            );
            return PathAction::Ignore;
        }
        if !self.hashes.content_changed(path) {
            tracing::debug!("[Watch] content unchanged: {}", path.display());
            return PathAction::Ignore;
        }
        PathAction::Dispatch(path.to_path_buf())
    }

    /// What: Reload settings and apply whatever changed.
    pub fn reload_settings(&self) {
        match self.context().settings.reload() {
            Ok(changes) => {
                tracing::info!("[Watch] settings reloaded ({} changes)", changes.len());
                self.apply_settings_changes(&changes);
            }
            Err(e) => {
                tracing::error!("[Watch] failed to reload settings: {e}");
                self.context().notifier.error(&e.to_string());
            }
        }
    }

    /// Directories to watch: the workspace, plus the settings file's directory
    /// when it lives elsewhere.
    fn watch_roots(&self) -> Vec<(PathBuf, RecursiveMode)> {
        let ctx = self.context();
        let mut roots = vec![(ctx.workspace_root.clone(), RecursiveMode::Recursive)];
        if let Some(dir) = ctx.settings.path().and_then(Path::parent)
            && !dir.starts_with(&ctx.workspace_root)
        {
            roots.push((dir.to_path_buf(), RecursiveMode::NonRecursive));
        }
        roots
    }

    /// What: Watch the workspace until `quit` or Ctrl-C.
    ///
    /// Inputs:
    /// - `start_locked`: Enable the master lock before the first event
    ///
    /// # Errors
    /// - The filesystem watcher cannot be started.
    ///
    /// Details:
    /// - Each dispatched change runs on its own task; the executor's
    ///   debounce and preemption decide which of them reach a process.
    /// - Stdin lines are parsed as [`HostCommand`]s. When stdin closes the
    ///   loop keeps watching until Ctrl-C.
    /// - Running jobs are canceled on exit.
    pub async fn watch(self: Arc<Self>, start_locked: bool) -> Result<()> {
        if start_locked {
            self.context().locks.set_master_lock(true);
        }
        self.init_status();
        let seeded = self.seed_content();
        tracing::info!("[Watch] cached {seeded} code files");

        let (_watcher, mut paths) = spawn_watcher(&self.watch_roots())?;
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;

        loop {
            select! {
                Some(path) = paths.recv() => {
                    match self.route(&path) {
                        PathAction::ReloadSettings => self.reload_settings(),
                        PathAction::Dispatch(path) => {
                            let dispatcher = self.dispatcher.clone();
                            tokio::spawn(async move {
                                dispatcher.dispatch_path(&path, Trigger::Watcher).await;
                            });
                        }
                        PathAction::Ignore => {}
                    }
                }
                line = lines.next_line(), if stdin_open => {
                    match line {
                        Ok(Some(line)) if line.trim().is_empty() => {}
                        Ok(Some(line)) => match line.parse::<HostCommand>() {
                            Ok(command) => {
                                if !self.execute(command).await {
                                    break;
                                }
                            }
                            Err(e) => eprintln!("{e}"),
                        },
                        Ok(None) => {
                            tracing::debug!("[Watch] stdin closed");
                            stdin_open = false;
                        }
                        Err(e) => {
                            tracing::warn!("[Watch] failed to read stdin: {e}");
                            stdin_open = false;
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("[Watch] interrupted");
                    break;
                }
            }
        }

        self.context().executor.cancel_all();
        tracing::info!("[Watch] stopped");
        Ok(())
    }
}
