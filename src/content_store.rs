//! Last-known content of watched source files and line-level change detection.
//!
//! A change cycle for a file is: [`ContentStore::update_current`], then any
//! number of [`ContentStore::changed_lines`] / translation-key checks, then
//! [`ContentStore::commit`]. Committing before diffing makes the diff empty.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use regex::Regex;

/// Matches `t('key')` / `I18nKey("key")` calls with a quoted literal argument.
fn translation_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\b(?:I18nKey|t)\(\s*['"`]([^'"`]*)['"`]\s*\)"#)
            .unwrap_or_else(|e| unreachable!("translation key pattern is valid: {e}"))
    })
}

/// What: Cached content of one watched file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSnapshot {
    /// Content read during the current change cycle.
    pub current: Option<String>,
    /// Content as of the last committed cycle (or the startup seed).
    pub previous: Option<String>,
}

/// What: Per-path content cache shared by code handler tasks.
///
/// Details:
/// - Entries are never evicted for the lifetime of the process.
#[derive(Debug, Default)]
pub struct ContentStore {
    snapshots: Mutex<HashMap<PathBuf, FileSnapshot>>,
}

impl ContentStore {
    /// What: Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the snapshot map, recovering from poisoning.
    fn snapshots(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, FileSnapshot>> {
        self.snapshots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// What: Seed `previous` content for the initial file set.
    ///
    /// Inputs:
    /// - `paths`: Files matched by the code watch patterns at startup
    ///
    /// Output:
    /// - Number of files successfully read.
    ///
    /// Details:
    /// - Unreadable files are logged and skipped.
    pub fn seed_initial<P: AsRef<Path>>(&self, paths: &[P]) -> usize {
        let mut seeded = 0;
        for path in paths {
            let path = path.as_ref();
            match std::fs::read_to_string(path) {
                Ok(content) => {
                    self.snapshots()
                        .entry(path.to_path_buf())
                        .or_default()
                        .previous = Some(content);
                    seeded += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to seed file content"
                    );
                }
            }
        }
        tracing::info!("Initialized content cache for {seeded} files");
        seeded
    }

    /// What: Read the file's content on disk into `current`.
    ///
    /// # Errors
    /// - Returns the I/O error when the file cannot be read; the snapshot is left untouched.
    pub fn update_current(&self, path: &Path) -> std::io::Result<()> {
        let content = std::fs::read_to_string(path)?;
        self.snapshots()
            .entry(path.to_path_buf())
            .or_default()
            .current = Some(content);
        Ok(())
    }

    /// What: Lines that differ between current and previous content.
    ///
    /// Output:
    /// - Lines of current content whose trimmed form is absent from previous,
    ///   followed by lines of previous content whose trimmed form is absent
    ///   from current, each in original order.
    ///
    /// Details:
    /// - A file with no previous content reports every current line.
    #[must_use]
    pub fn changed_lines(&self, path: &Path) -> Vec<String> {
        let snapshots = self.snapshots();
        let Some(snapshot) = snapshots.get(path) else {
            return Vec::new();
        };
        diff_lines(
            snapshot.current.as_deref().unwrap_or_default(),
            snapshot.previous.as_deref().unwrap_or_default(),
        )
    }

    /// What: Whether the pending change adds or removes a translation-key call.
    #[must_use]
    pub fn contains_translation_key_usage(&self, path: &Path) -> bool {
        !translation_keys(&self.changed_lines(path)).is_empty()
    }

    /// What: Finish the change cycle by promoting `current` to `previous`.
    pub fn commit(&self, path: &Path) {
        if let Some(snapshot) = self.snapshots().get_mut(path)
            && snapshot.current.is_some()
            && snapshot.current != snapshot.previous
        {
            snapshot.previous.clone_from(&snapshot.current);
        }
    }

    /// What: Copy of the cached snapshot for `path`.
    #[must_use]
    pub fn snapshot(&self, path: &Path) -> Option<FileSnapshot> {
        self.snapshots().get(path).cloned()
    }

    /// What: Number of cached files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots().len()
    }

    /// What: Whether nothing has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots().is_empty()
    }
}

/// Symmetric line difference on trimmed lines; see [`ContentStore::changed_lines`].
fn diff_lines(current: &str, previous: &str) -> Vec<String> {
    let current_set: HashSet<&str> = current.lines().map(str::trim).collect();
    let previous_set: HashSet<&str> = previous.lines().map(str::trim).collect();

    let added = current
        .lines()
        .filter(|line| !previous_set.contains(line.trim()));
    let removed = previous
        .lines()
        .filter(|line| !current_set.contains(line.trim()));
    added.chain(removed).map(str::to_string).collect()
}

/// What: Extract the literal keys of `t(...)` / `I18nKey(...)` calls in `lines`.
#[must_use]
pub fn translation_keys(lines: &[String]) -> Vec<String> {
    let re = translation_key_regex();
    lines
        .iter()
        .flat_map(|line| re.captures_iter(line))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(previous: &str, current: &str) -> (tempfile::TempDir, PathBuf, ContentStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("Component.tsx");
        std::fs::write(&path, previous).expect("write previous");
        let store = ContentStore::new();
        assert_eq!(store.seed_initial(&[&path]), 1);
        std::fs::write(&path, current).expect("write current");
        store.update_current(&path).expect("read current");
        (dir, path, store)
    }

    #[test]
    /// What: Changed lines list additions first, then removals, in file order.
    fn changed_lines_orders_added_then_removed() {
        let (_dir, path, store) = store_with("a\nb\nc\n", "a\nx\nc\ny\n");
        assert_eq!(store.changed_lines(&path), vec!["x", "y", "b"]);
    }

    #[test]
    /// What: Indentation-only edits do not count as changes.
    ///
    /// Inputs:
    /// - Previous and current content differing only in leading whitespace
    ///
    /// Output:
    /// - No changed lines and no translation-key usage.
    fn whitespace_only_change_has_no_key_usage() {
        let (_dir, path, store) = store_with(
            "const a = t('home.title');\n",
            "    const a = t('home.title');   \n",
        );
        assert!(store.changed_lines(&path).is_empty());
        assert!(!store.contains_translation_key_usage(&path));
    }

    #[test]
    /// What: Adding a `t()` call is detected; other calls are not.
    fn detects_added_translation_call() {
        let (_dir, path, store) = store_with(
            "const x = 1;\n",
            "const x = 1;\nconst label = t(\"nav.home\");\nset('value');\n",
        );
        assert!(store.contains_translation_key_usage(&path));
        assert_eq!(
            translation_keys(&store.changed_lines(&path)),
            vec!["nav.home".to_string()]
        );
    }

    #[test]
    /// What: Commit finalizes the window so the same content diffs as empty.
    fn commit_promotes_current_content() {
        let (_dir, path, store) = store_with("a\n", "a\nI18nKey('k')\n");
        assert!(store.contains_translation_key_usage(&path));
        store.commit(&path);
        let snapshot = store.snapshot(&path).expect("snapshot");
        assert_eq!(snapshot.previous, snapshot.current);
        assert!(store.changed_lines(&path).is_empty());
    }

    #[test]
    /// What: Key extraction handles all quote styles and several calls per line.
    fn translation_keys_extracts_every_literal_call() {
        let lines = vec![
            "t('a') + t(\"b\") + t(`c`)".to_string(),
            "I18nKey( 'd' )".to_string(),
            "t(variable)".to_string(),
        ];
        assert_eq!(translation_keys(&lines), vec!["a", "b", "c", "d"]);
    }
}
