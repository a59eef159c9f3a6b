//! Settings file lookup, per-user directories and the project root search.

use std::env;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use super::{Settings, SettingsError};

/// Directories never searched for `package.json`.
const SKIPPED_DIRS: &[&str] = &["node_modules", ".git"];
/// How deep below the workspace root `package.json` is searched for.
const PROJECT_SEARCH_DEPTH: usize = 4;

/// Candidate settings files in priority order (explicit path excluded).
fn settings_candidates(workspace: &Path, home: Option<&str>, xdg: Option<&str>) -> Vec<PathBuf> {
    let mut candidates = vec![workspace.join(".transwatch").join("settings.conf")];
    if let Some(h) = home {
        candidates.push(
            Path::new(h)
                .join(".config")
                .join("transwatch")
                .join("settings.conf"),
        );
    }
    if let Some(x) = xdg.filter(|x| !x.trim().is_empty()) {
        candidates.push(Path::new(x).join("transwatch").join("settings.conf"));
    }
    candidates
}

/// What: Locate the settings file to load.
///
/// Inputs:
/// - `explicit`: Path passed with `--config`, if any
/// - `workspace`: Workspace root
///
/// Output:
/// - `Ok(Some(path))` for the first existing candidate, `Ok(None)` when no
///   file exists (defaults apply).
///
/// # Errors
/// - `SettingsError::NotFound` when `explicit` is given but is not a file.
///
/// Details:
/// - Search order: `explicit`, `<workspace>/.transwatch/settings.conf`,
///   `$HOME/.config/transwatch/settings.conf`,
///   `$XDG_CONFIG_HOME/transwatch/settings.conf`.
pub fn resolve_settings_path(
    explicit: Option<&Path>,
    workspace: &Path,
) -> Result<Option<PathBuf>, SettingsError> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(SettingsError::NotFound(path.to_path_buf()));
    }
    let home = env::var("HOME").ok();
    let xdg = env::var("XDG_CONFIG_HOME").ok();
    Ok(settings_candidates(workspace, home.as_deref(), xdg.as_deref())
        .into_iter()
        .find(|p| p.is_file()))
}

/// What: Per-user configuration directory, created on demand.
///
/// Output:
/// - `$HOME/.config/transwatch` when `HOME` is set, else
///   `$XDG_CONFIG_HOME/transwatch`, else `./.transwatch`.
#[must_use]
pub fn config_dir() -> PathBuf {
    let base = env::var("HOME")
        .ok()
        .map(|h| Path::new(&h).join(".config"))
        .or_else(|| {
            env::var("XDG_CONFIG_HOME")
                .ok()
                .filter(|x| !x.trim().is_empty())
                .map(PathBuf::from)
        });
    let dir = base.map_or_else(|| PathBuf::from(".transwatch"), |b| b.join("transwatch"));
    let _ = std::fs::create_dir_all(&dir);
    dir
}

/// What: Log directory under [`config_dir`], created on demand.
#[must_use]
pub fn logs_dir() -> PathBuf {
    let dir = config_dir().join("logs");
    let _ = std::fs::create_dir_all(&dir);
    dir
}

/// What: Directory external commands run in.
///
/// Inputs:
/// - `workspace`: Workspace root
/// - `settings`: Provides `package_json_relative_path`
///
/// Output:
/// - Directory of the configured `package.json`; else of the shallowest
///   `package.json` found below the workspace; else `None`.
///
/// Details:
/// - A configured path that does not exist yields `None` rather than
///   falling back to the search.
/// - The search goes [`PROJECT_SEARCH_DEPTH`] directories deep and never
///   enters `node_modules` or `.git`; ties at one depth go to the first
///   path in file-name order.
#[must_use]
pub fn find_project_root(workspace: &Path, settings: &Settings) -> Option<PathBuf> {
    if let Some(relative) = settings.package_json_relative_path.as_deref() {
        let path = workspace.join(relative);
        return path
            .is_file()
            .then(|| path.parent().map(Path::to_path_buf))
            .flatten();
    }
    WalkDir::new(workspace)
        .max_depth(PROJECT_SEARCH_DEPTH + 1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry))
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == "package.json")
        .min_by_key(DirEntry::depth)
        .and_then(|entry| entry.path().parent().map(Path::to_path_buf))
}

/// Whether the walk must not descend into `entry`.
fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// What: Workspace-local settings come first, then HOME, then XDG.
    fn candidates_follow_priority_order() {
        let ws = Path::new("/ws");
        let candidates = settings_candidates(ws, Some("/home/u"), Some("/xdg"));
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/ws/.transwatch/settings.conf"),
                PathBuf::from("/home/u/.config/transwatch/settings.conf"),
                PathBuf::from("/xdg/transwatch/settings.conf"),
            ]
        );
        assert_eq!(settings_candidates(ws, None, Some("  ")).len(), 1);
    }

    #[test]
    /// What: A missing explicit settings file is an error.
    fn explicit_missing_path_is_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.conf");
        assert!(matches!(
            resolve_settings_path(Some(&missing), dir.path()),
            Err(SettingsError::NotFound(_))
        ));
        let present = dir.path().join("settings.conf");
        std::fs::write(&present, "").expect("write");
        assert_eq!(
            resolve_settings_path(Some(&present), dir.path()).expect("found"),
            Some(present)
        );
    }

    #[test]
    /// What: The shallowest `package.json` wins and `node_modules` is never searched.
    fn project_root_search_skips_node_modules() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nm = dir.path().join("node_modules").join("dep");
        std::fs::create_dir_all(&nm).expect("mkdir");
        std::fs::write(nm.join("package.json"), "{}").expect("write");
        let settings = Settings::default();
        assert_eq!(find_project_root(dir.path(), &settings), None);

        let app = dir.path().join("web");
        std::fs::create_dir_all(&app).expect("mkdir");
        std::fs::write(app.join("package.json"), "{}").expect("write");
        assert_eq!(find_project_root(dir.path(), &settings), Some(app.clone()));

        let configured = Settings {
            package_json_relative_path: Some("web/package.json".to_string()),
            ..Settings::default()
        };
        assert_eq!(find_project_root(dir.path(), &configured), Some(app));
        let wrong = Settings {
            package_json_relative_path: Some("missing/package.json".to_string()),
            ..Settings::default()
        };
        assert_eq!(find_project_root(dir.path(), &wrong), None);
    }

    #[test]
    /// What: Depth wins over name order, names break ties, the depth limit holds.
    fn project_root_search_prefers_shallow_then_sorted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = Settings::default();
        let too_deep = dir.path().join("a/b/c/d/e");
        std::fs::create_dir_all(&too_deep).expect("mkdir");
        std::fs::write(too_deep.join("package.json"), "{}").expect("write");
        assert_eq!(find_project_root(dir.path(), &settings), None);

        let deepest_allowed = dir.path().join("a/b/c/d");
        std::fs::write(deepest_allowed.join("package.json"), "{}").expect("write");
        assert_eq!(find_project_root(dir.path(), &settings), Some(deepest_allowed));

        for name in ["zeta", "beta"] {
            let app = dir.path().join("apps").join(name);
            std::fs::create_dir_all(&app).expect("mkdir");
            std::fs::write(app.join("package.json"), "{}").expect("write");
        }
        assert_eq!(
            find_project_root(dir.path(), &settings),
            Some(dir.path().join("apps").join("beta"))
        );

        std::fs::write(dir.path().join("package.json"), "{}").expect("write");
        assert_eq!(find_project_root(dir.path(), &settings), Some(dir.path().to_path_buf()));
    }
}
