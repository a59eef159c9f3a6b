//! Merge-state checks shared by all handlers.

use std::io::{BufRead, BufReader};
use std::path::Path;

/// What: Whether `path` contains unresolved git conflict markers.
///
/// Output:
/// - `true` when any line starts with `<<<<<<<` or `>>>>>>>`, or is exactly
///   `=======`; `false` for missing or unreadable files.
#[must_use]
pub fn has_merge_markers(path: &Path) -> bool {
    let Ok(file) = std::fs::File::open(path) else {
        return false;
    };
    BufReader::new(file).lines().map_while(Result::ok).any(|line| {
        let line = line.trim_end_matches('\r');
        line.starts_with("<<<<<<<") || line.starts_with(">>>>>>>") || line == "======="
    })
}

/// What: Whether a git merge is in progress for the repository containing `dir`.
///
/// Details:
/// - Looks for `.git/MERGE_HEAD` in `dir` and each of its ancestors.
#[must_use]
pub fn merge_in_progress(dir: &Path) -> bool {
    dir.ancestors()
        .any(|d| d.join(".git").join("MERGE_HEAD").is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// What: Conflict markers are only recognised at line start.
    fn detects_conflict_markers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conflicted = dir.path().join("de.po");
        std::fs::write(
            &conflicted,
            "msgid \"a\"\n<<<<<<< HEAD\nmsgstr \"x\"\n=======\nmsgstr \"y\"\n>>>>>>> feature\n",
        )
        .expect("write");
        assert!(has_merge_markers(&conflicted));

        let clean = dir.path().join("en.po");
        std::fs::write(&clean, "msgid \"a\"\nmsgstr \"text with ======= inside\"\n")
            .expect("write");
        assert!(!has_merge_markers(&clean));
        assert!(!has_merge_markers(&dir.path().join("missing.po")));
    }

    #[test]
    /// What: MERGE_HEAD in an ancestor repository marks a merge in progress.
    fn merge_head_in_ancestor() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("web").join("public");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::create_dir_all(dir.path().join(".git")).expect("mkdir");
        assert!(!merge_in_progress(&nested));
        std::fs::write(dir.path().join(".git").join("MERGE_HEAD"), "abc\n").expect("write");
        assert!(merge_in_progress(&nested));
    }
}
