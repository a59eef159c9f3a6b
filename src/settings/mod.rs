//! Watcher settings: types, `settings.conf` parsing, path resolution and the live store.

mod parse;
mod paths;
mod store;

use std::fmt;
use std::path::PathBuf;

pub use parse::parse_settings;
pub use paths::{config_dir, find_project_root, logs_dir, resolve_settings_path};
pub use store::{SettingsChange, SettingsStore};

use crate::layout::FileKind;

/// Default location of the locales tree, relative to the workspace root.
pub const DEFAULT_LOCALES_PATH: &str = "public/locales";
/// Default scanner configuration file, relative to the project root.
pub const DEFAULT_SCANNER_CONFIG: &str = "i18next-scanner.config.js";
/// Default scanner command template.
pub const DEFAULT_SCANNER_COMMAND: &str = "npx i18next-scanner --config {config}";
/// Default DeepL endpoint (free tier).
pub const DEFAULT_DEEPL_API_URL: &str = "https://api-free.deepl.com/v2/translate";

/// What: Whether watcher events for a file kind are acted upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileMode {
    /// Only host commands trigger the handler.
    Manual,
    /// Watcher events trigger the handler too.
    #[default]
    Automatic,
}

impl FileMode {
    /// What: Parse `manual` / `automatic` (case-insensitive).
    #[must_use]
    pub fn from_config_key(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "manual" => Some(Self::Manual),
            "automatic" | "auto" => Some(Self::Automatic),
            _ => None,
        }
    }

    /// What: Config spelling of the mode.
    #[must_use]
    pub const fn as_config_key(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Automatic => "automatic",
        }
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_config_key())
    }
}

/// What: Every setting the engine reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Mode applied to all three file kinds when it changes.
    pub overall_file_mode: Option<FileMode>,
    /// Mode for PO changes.
    pub po_file_mode: FileMode,
    /// Mode for JSON changes.
    pub json_file_mode: FileMode,
    /// Mode for code changes.
    pub code_file_mode: FileMode,
    /// Whether JSON changes regenerate PO files at all.
    pub generate_po: bool,
    /// Debug-level logging.
    pub enable_verbose_logging: bool,
    /// Locales tree, relative to the workspace root.
    pub locales_relative_path: String,
    /// `package.json` location, relative to the workspace root.
    pub package_json_relative_path: Option<String>,
    /// Scanner configuration file, relative to the project root.
    pub scanner_config_relative_path: String,
    /// Glob patterns selecting watched source files.
    pub code_globs: Vec<String>,
    /// External PO -> JSON command template; `None` uses the built-in converter.
    pub po_to_json_command: Option<String>,
    /// External JSON -> PO command template; `None` uses the built-in converter.
    pub json_to_po_command: Option<String>,
    /// Source scanner command template.
    pub scanner_command: String,
    /// Executor debounce window in milliseconds.
    pub debounce_ms: u64,
    /// Backfill missing sibling translations.
    pub enable_auto_translate: bool,
    /// DeepL authentication key.
    pub deepl_api_key: String,
    /// DeepL translate endpoint.
    pub deepl_api_url: String,
    /// DeepL `formality` parameter.
    pub translation_formality: String,
    /// DeepL `preserve_formatting` parameter.
    pub translation_preserve_formatting: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            overall_file_mode: None,
            po_file_mode: FileMode::Automatic,
            json_file_mode: FileMode::Automatic,
            code_file_mode: FileMode::Automatic,
            generate_po: true,
            enable_verbose_logging: false,
            locales_relative_path: DEFAULT_LOCALES_PATH.to_string(),
            package_json_relative_path: None,
            scanner_config_relative_path: DEFAULT_SCANNER_CONFIG.to_string(),
            code_globs: default_code_globs(),
            po_to_json_command: None,
            json_to_po_command: None,
            scanner_command: DEFAULT_SCANNER_COMMAND.to_string(),
            debounce_ms: 500,
            enable_auto_translate: false,
            deepl_api_key: String::new(),
            deepl_api_url: DEFAULT_DEEPL_API_URL.to_string(),
            translation_formality: "default".to_string(),
            translation_preserve_formatting: true,
        }
    }
}

impl Settings {
    /// What: Configured mode for `kind`.
    #[must_use]
    pub const fn file_mode(&self, kind: FileKind) -> FileMode {
        match kind {
            FileKind::Po => self.po_file_mode,
            FileKind::Json => self.json_file_mode,
            FileKind::Code => self.code_file_mode,
        }
    }

    /// What: Set every per-kind mode to `mode`.
    pub const fn apply_overall_mode(&mut self, mode: FileMode) {
        self.po_file_mode = mode;
        self.json_file_mode = mode;
        self.code_file_mode = mode;
    }

    /// What: Absolute locales directory under `workspace_root`.
    #[must_use]
    pub fn locales_dir(&self, workspace_root: &std::path::Path) -> PathBuf {
        workspace_root.join(&self.locales_relative_path)
    }
}

/// Source globs watched when `code_globs` is not configured.
fn default_code_globs() -> Vec<String> {
    ["apps/**/*.ts", "apps/**/*.tsx", "libs/**/*.ts", "libs/**/*.tsx"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// What: Errors raised while loading or validating settings.
#[derive(Debug)]
pub enum SettingsError {
    /// An explicitly requested settings file does not exist.
    NotFound(PathBuf),
    /// The settings file could not be read.
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// A feature is enabled but a setting it requires is empty.
    ConfigurationMissing {
        /// Setting that must be filled in.
        setting: &'static str,
        /// Feature that needs it.
        feature: &'static str,
    },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "settings file {} not found", path.display()),
            Self::Io { path, source } => {
                write!(f, "failed to read settings file {}: {source}", path.display())
            }
            Self::ConfigurationMissing { setting, feature } => {
                write!(f, "{feature} is enabled but `{setting}` is not set")
            }
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::NotFound(_) | Self::ConfigurationMissing { .. } => None,
        }
    }
}
