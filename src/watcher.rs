//! Filesystem watching and the filters applied before dispatch.
//!
//! `notify` reports raw paths; [`WatchFilter`] decides which of them are
//! locale or code files, and [`ContentHashFilter`] drops events for files
//! whose content did not actually change since the last dispatch.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use walkdir::WalkDir;

use crate::layout::{FileKind, LocaleLayout};

/// Directory names whose contents are never watched.
const IGNORED_DIRS: &[&str] = &["node_modules", ".git"];

/// What: Whether any component of `path` is an ignored directory.
fn in_ignored_dir(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => name.to_str().is_some_and(|n| IGNORED_DIRS.contains(&n)),
        _ => false,
    })
}

/// What: Decides which changed paths the handlers care about.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    workspace_root: PathBuf,
    layout: LocaleLayout,
    code: GlobSet,
}

impl WatchFilter {
    /// What: Filter for `workspace_root` with the given code globs.
    ///
    /// Inputs:
    /// - `code_globs`: Patterns relative to the workspace root
    ///
    /// # Errors
    /// - Returns the `globset` error for an invalid pattern.
    pub fn new(
        workspace_root: impl Into<PathBuf>,
        layout: LocaleLayout,
        code_globs: &[String],
    ) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in code_globs {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Self {
            workspace_root: workspace_root.into(),
            layout,
            code: builder.build()?,
        })
    }

    /// What: Kind of a relevant path, or `None` for paths to ignore.
    ///
    /// Details:
    /// - PO and JSON files count only inside the locales tree
    ///   (`<locales>/<locale>/<namespace>.<ext>`).
    /// - Other files count when a code glob matches their path relative to
    ///   the workspace root.
    #[must_use]
    pub fn classify(&self, path: &Path) -> Option<FileKind> {
        let relative = path.strip_prefix(&self.workspace_root).ok()?;
        if in_ignored_dir(relative) {
            return None;
        }
        match FileKind::classify(path) {
            kind @ (FileKind::Po | FileKind::Json) => {
                self.layout.resource_for(path).map(|_| kind)
            }
            FileKind::Code => self.code.is_match(relative).then_some(FileKind::Code),
        }
    }

    /// What: Every existing file matched by the code globs.
    #[must_use]
    pub fn code_files(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.workspace_root)
            .into_iter()
            .filter_entry(|e| {
                e.file_name()
                    .to_str()
                    .is_none_or(|name| !IGNORED_DIRS.contains(&name))
            })
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|p| self.classify(p) == Some(FileKind::Code))
            .collect()
    }
}

/// What: Remembers the content hash last dispatched per path.
#[derive(Debug, Default)]
pub struct ContentHashFilter {
    seen: Mutex<HashMap<PathBuf, u64>>,
}

impl ContentHashFilter {
    /// What: Empty filter; the first event for every path passes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// What: Record the file's current hash and report whether it is new.
    ///
    /// Output:
    /// - `true` when the content differs from the last recorded one.
    /// - `false` when it is identical, or the file cannot be read (removed).
    pub fn content_changed(&self, path: &Path) -> bool {
        let Ok(bytes) = std::fs::read(path) else {
            return false;
        };
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        let hash = hasher.finish();
        let previous = self
            .seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), hash);
        previous != Some(hash)
    }
}

/// What: Start a recursive watcher on every directory in `roots`.
///
/// Output:
/// - The watcher (dropping it stops watching) and a channel of changed paths.
///
/// # Errors
/// - Watcher creation or registration failures.
///
/// Details:
/// - Only create and modify events are forwarded; each path of an event is
///   sent separately.
/// - Directories that do not exist are skipped with a warning.
pub fn spawn_watcher(
    roots: &[(PathBuf, RecursiveMode)],
) -> notify::Result<(RecommendedWatcher, mpsc::UnboundedReceiver<PathBuf>)> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    return;
                }
                for path in event.paths {
                    if tx.send(path).is_err() {
                        return;
                    }
                }
            }
            Err(e) => tracing::error!("Watch error: {e}"),
        },
        Config::default(),
    )?;
    for (root, mode) in roots {
        if !root.exists() {
            tracing::warn!("Not watching missing path {}", root.display());
            continue;
        }
        watcher.watch(root, *mode)?;
        tracing::info!("Watching path: {}", root.display());
    }
    Ok((watcher, rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(root: &Path) -> WatchFilter {
        WatchFilter::new(
            root,
            LocaleLayout::new(root.join("public").join("locales")),
            &["apps/**/*.tsx".to_string(), "libs/**/*.ts".to_string()],
        )
        .expect("valid globs")
    }

    #[test]
    /// What: Locale files, code globs and ignored directories are told apart.
    fn classifies_watched_paths() {
        let root = Path::new("/ws");
        let f = filter(root);
        assert_eq!(f.classify(Path::new("/ws/public/locales/de/common.po")), Some(FileKind::Po));
        assert_eq!(
            f.classify(Path::new("/ws/public/locales/de/common.json")),
            Some(FileKind::Json)
        );
        assert_eq!(f.classify(Path::new("/ws/package.json")), None);
        assert_eq!(f.classify(Path::new("/ws/apps/web/src/App.tsx")), Some(FileKind::Code));
        assert_eq!(f.classify(Path::new("/ws/apps/web/src/util.ts")), None);
        assert_eq!(f.classify(Path::new("/ws/libs/ui/button.ts")), Some(FileKind::Code));
        assert_eq!(
            f.classify(Path::new("/ws/apps/node_modules/x/index.tsx")),
            None
        );
        assert_eq!(f.classify(Path::new("/elsewhere/apps/a.tsx")), None);
    }

    #[test]
    /// What: Seeding lists matching code files only.
    fn code_files_walks_workspace() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = dir.path().join("apps").join("web");
        std::fs::create_dir_all(app.join("node_modules")).expect("mkdir");
        std::fs::write(app.join("App.tsx"), "t('a')").expect("write");
        std::fs::write(app.join("node_modules").join("Dep.tsx"), "").expect("write");
        std::fs::write(app.join("README.md"), "").expect("write");
        let files = filter(dir.path()).code_files();
        assert_eq!(files, vec![app.join("App.tsx")]);
    }

    #[test]
    /// What: Rewriting identical content is filtered out.
    fn hash_filter_drops_identical_rewrites() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("common.po");
        std::fs::write(&path, "a").expect("write");
        let f = ContentHashFilter::new();
        assert!(f.content_changed(&path));
        assert!(!f.content_changed(&path));
        std::fs::write(&path, "b").expect("write");
        assert!(f.content_changed(&path));
        assert!(!f.content_changed(&dir.path().join("gone.po")));
    }
}
