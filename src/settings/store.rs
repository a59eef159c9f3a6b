//! Live settings with reload and change reporting.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use super::{FileMode, Settings, SettingsError, parse_settings};
use crate::layout::FileKind;

/// What: A setting change that running services must react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsChange {
    /// `overall_file_mode` changed; every per-kind mode now follows it.
    OverallFileMode(FileMode),
    /// A per-kind mode changed.
    FileMode(FileKind, FileMode),
    /// `enable_verbose_logging` changed.
    VerboseLogging(bool),
    /// `generate_po` changed.
    GeneratePo(bool),
    /// Any translation setting changed.
    Translation,
    /// A setting only read at startup changed (paths, globs, commands, debounce).
    RequiresRestart(&'static str),
}

/// What: Current settings plus the file they were loaded from.
///
/// Details:
/// - Readers take cheap snapshots with [`SettingsStore::get`]; the watch loop
///   calls [`SettingsStore::reload`] when the file changes.
/// - An `overall_file_mode` change made while running forces every per-kind
///   mode, and keeps forcing them on later reloads until the overall mode
///   changes again.
#[derive(Debug)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    current: RwLock<Current>,
}

/// Settings in effect plus the overall mode forced by the last reload.
#[derive(Debug)]
struct Current {
    /// Settings in effect.
    settings: Settings,
    /// Overall mode applied to every kind on each replace.
    forced_mode: Option<FileMode>,
}

impl Current {
    /// Freshly loaded settings; nothing forced yet.
    const fn new(settings: Settings) -> Self {
        Self {
            settings,
            forced_mode: None,
        }
    }
}

/// Read and parse `path` on top of the defaults.
fn load(path: Option<&Path>) -> Result<Settings, SettingsError> {
    let mut settings = Settings::default();
    if let Some(path) = path {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        parse_settings(&content, &mut settings);
    }
    Ok(settings)
}

impl SettingsStore {
    /// What: Load settings from `path` (defaults when `None`).
    ///
    /// # Errors
    /// - `SettingsError::Io` when the file exists but cannot be read.
    pub fn open(path: Option<PathBuf>) -> Result<Self, SettingsError> {
        let settings = load(path.as_deref())?;
        if let Some(p) = &path {
            tracing::info!(path = %p.display(), "loaded settings");
        } else {
            tracing::info!("no settings file found, using defaults");
        }
        Ok(Self {
            path,
            current: RwLock::new(Current::new(settings)),
        })
    }

    /// What: Store holding `settings` with no backing file.
    #[must_use]
    pub fn from_settings(settings: Settings) -> Self {
        Self {
            path: None,
            current: RwLock::new(Current::new(settings)),
        }
    }

    /// What: File the settings were loaded from.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// What: Snapshot of the current settings.
    #[must_use]
    pub fn get(&self) -> Settings {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .settings
            .clone()
    }

    /// What: Replace the current settings and report what changed.
    ///
    /// Details:
    /// - A changed `overall_file_mode` becomes the forced mode (cleared when
    ///   it is removed); a forced mode overrides every per-kind mode of `next`.
    pub fn replace(&self, mut next: Settings) -> Vec<SettingsChange> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if next.overall_file_mode != current.settings.overall_file_mode {
            current.forced_mode = next.overall_file_mode;
        }
        if let Some(mode) = current.forced_mode {
            next.apply_overall_mode(mode);
        }
        let changes = diff(&current.settings, &next);
        current.settings = next;
        changes
    }

    /// What: Re-read the backing file and apply it.
    ///
    /// Output:
    /// - Changes relative to the previous settings (empty when nothing changed).
    ///
    /// # Errors
    /// - `SettingsError::Io` when the file cannot be read; current settings stay.
    pub fn reload(&self) -> Result<Vec<SettingsChange>, SettingsError> {
        let next = load(self.path.as_deref())?;
        let changes = self.replace(next);
        if !changes.is_empty() {
            tracing::info!(count = changes.len(), "settings reloaded");
        }
        Ok(changes)
    }
}

/// Changes between two settings values, in a stable order.
fn diff(old: &Settings, new: &Settings) -> Vec<SettingsChange> {
    let mut changes = Vec::new();
    if old.overall_file_mode != new.overall_file_mode
        && let Some(mode) = new.overall_file_mode
    {
        changes.push(SettingsChange::OverallFileMode(mode));
    }
    for kind in [FileKind::Po, FileKind::Json, FileKind::Code] {
        if old.file_mode(kind) != new.file_mode(kind) {
            changes.push(SettingsChange::FileMode(kind, new.file_mode(kind)));
        }
    }
    if old.enable_verbose_logging != new.enable_verbose_logging {
        changes.push(SettingsChange::VerboseLogging(new.enable_verbose_logging));
    }
    if old.generate_po != new.generate_po {
        changes.push(SettingsChange::GeneratePo(new.generate_po));
    }
    if old.enable_auto_translate != new.enable_auto_translate
        || old.deepl_api_key != new.deepl_api_key
        || old.deepl_api_url != new.deepl_api_url
        || old.translation_formality != new.translation_formality
        || old.translation_preserve_formatting != new.translation_preserve_formatting
    {
        changes.push(SettingsChange::Translation);
    }
    let restart_only = [
        (
            old.locales_relative_path != new.locales_relative_path,
            "locales_relative_path",
        ),
        (
            old.package_json_relative_path != new.package_json_relative_path,
            "package_json_relative_path",
        ),
        (old.code_globs != new.code_globs, "code_globs"),
        (old.debounce_ms != new.debounce_ms, "debounce_ms"),
    ];
    for (changed, key) in restart_only {
        if changed {
            changes.push(SettingsChange::RequiresRestart(key));
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// What: Reload reports exactly the settings that changed on disk.
    ///
    /// Inputs:
    /// - Settings file rewritten to flip verbose logging, generate_po and debounce
    ///
    /// Output:
    /// - Matching `SettingsChange`s; the new values are visible via `get`.
    fn reload_reports_changes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.conf");
        std::fs::write(&path, "generate_po = true\n").expect("write");
        let store = SettingsStore::open(Some(path.clone())).expect("open");
        assert!(store.reload().expect("reload").is_empty());

        std::fs::write(
            &path,
            "generate_po = false\nenable_verbose_logging = on\ndebounce_ms = 100\n",
        )
        .expect("rewrite");
        let changes = store.reload().expect("reload");
        assert_eq!(
            changes,
            vec![
                SettingsChange::VerboseLogging(true),
                SettingsChange::GeneratePo(false),
                SettingsChange::RequiresRestart("debounce_ms"),
            ]
        );
        assert!(!store.get().generate_po);
    }

    #[test]
    /// What: Changing the overall mode synchronises all per-kind modes.
    fn overall_mode_change_overrides_kinds() {
        let store = SettingsStore::from_settings(Settings {
            code_file_mode: FileMode::Manual,
            ..Settings::default()
        });
        let next = Settings {
            overall_file_mode: Some(FileMode::Automatic),
            code_file_mode: FileMode::Manual,
            ..Settings::default()
        };
        let changes = store.replace(next);
        assert_eq!(
            changes,
            vec![
                SettingsChange::OverallFileMode(FileMode::Automatic),
                SettingsChange::FileMode(FileKind::Code, FileMode::Automatic),
            ]
        );
        assert_eq!(store.get().code_file_mode, FileMode::Automatic);
    }

    #[test]
    /// What: A forced overall mode survives reloads that leave it unchanged.
    ///
    /// Inputs:
    /// - File with an explicit `code_file_mode = manual`, then the overall
    ///   mode added, then an unrelated edit, then the overall mode removed
    ///
    /// Output:
    /// - The code mode follows the overall mode until it is removed.
    fn forced_overall_mode_survives_unrelated_reloads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.conf");
        std::fs::write(&path, "code_file_mode = manual\n").expect("write");
        let store = SettingsStore::open(Some(path.clone())).expect("open");
        assert_eq!(store.get().code_file_mode, FileMode::Manual);

        std::fs::write(&path, "overall_file_mode = automatic\ncode_file_mode = manual\n")
            .expect("rewrite");
        assert_eq!(
            store.reload().expect("reload"),
            vec![
                SettingsChange::OverallFileMode(FileMode::Automatic),
                SettingsChange::FileMode(FileKind::Code, FileMode::Automatic),
            ]
        );

        std::fs::write(
            &path,
            "overall_file_mode = automatic\ncode_file_mode = manual\ngenerate_po = false\n",
        )
        .expect("rewrite");
        assert_eq!(
            store.reload().expect("reload"),
            vec![SettingsChange::GeneratePo(false)]
        );
        assert!(store.reload().expect("unchanged reload").is_empty());
        assert_eq!(store.get().code_file_mode, FileMode::Automatic);

        std::fs::write(&path, "code_file_mode = manual\ngenerate_po = false\n").expect("rewrite");
        assert_eq!(
            store.reload().expect("reload"),
            vec![SettingsChange::FileMode(FileKind::Code, FileMode::Manual)]
        );
    }
}
