//! File classification and the `locales/<locale>/<namespace>.<ext>` convention.
//!
//! Locale and namespace are derived once, where a path enters the system
//! (watch registration or bulk commands), and travel with the path as a
//! [`ResourceId`] from then on.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::locks::ResourceKey;

/// What: Kind of file a change event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// gettext PO file.
    Po,
    /// i18next JSON resource.
    Json,
    /// Any other file, treated as source code.
    Code,
}

impl FileKind {
    /// What: Classify `path` by extension (`.po`, `.json`, anything else).
    #[must_use]
    pub fn classify(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("po") => Self::Po,
            Some("json") => Self::Json,
            _ => Self::Code,
        }
    }

    /// What: Extension used for locale files of this kind.
    #[must_use]
    pub const fn extension(self) -> Option<&'static str> {
        match self {
            Self::Po => Some("po"),
            Self::Json => Some("json"),
            Self::Code => None,
        }
    }

    /// What: The paired locale file kind (PO <-> JSON).
    #[must_use]
    pub const fn counterpart(self) -> Option<Self> {
        match self {
            Self::Po => Some(Self::Json),
            Self::Json => Some(Self::Po),
            Self::Code => None,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Po => "PO",
            Self::Json => "JSON",
            Self::Code => "code",
        })
    }
}

/// What: Explicit identity of one translation resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    /// Locale directory name, e.g. `de`.
    pub locale: String,
    /// File stem, e.g. `common`.
    pub namespace: String,
}

impl ResourceId {
    /// What: Build an identifier from its parts.
    pub fn new(locale: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            namespace: namespace.into(),
        }
    }

    /// What: Lock key covering every file of this locale.
    #[must_use]
    pub fn lock_key(&self) -> ResourceKey {
        ResourceKey::new(self.locale.clone())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.locale, self.namespace)
    }
}

/// What: Location of the locales tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleLayout {
    root: PathBuf,
}

impl LocaleLayout {
    /// What: Layout rooted at `locales_dir` (the directory containing locale folders).
    pub fn new(locales_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: locales_dir.into(),
        }
    }

    /// What: The locales directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// What: Derive the resource identity of a locale file.
    ///
    /// Inputs:
    /// - `path`: Candidate file path
    ///
    /// Output:
    /// - `Some(ResourceId)` for `<root>/<locale>/<namespace>.(po|json)`; `None` otherwise.
    #[must_use]
    pub fn resource_for(&self, path: &Path) -> Option<ResourceId> {
        FileKind::classify(path).extension()?;
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut components = relative.components();
        let locale = components.next()?.as_os_str().to_str()?;
        let file = components.next()?;
        if components.next().is_some() {
            return None;
        }
        let namespace = Path::new(file.as_os_str()).file_stem()?.to_str()?;
        Some(ResourceId::new(locale, namespace))
    }

    /// What: Path of `resource` stored as `kind`.
    ///
    /// Output:
    /// - `None` for [`FileKind::Code`].
    #[must_use]
    pub fn path_for(&self, resource: &ResourceId, kind: FileKind) -> Option<PathBuf> {
        let ext = kind.extension()?;
        Some(
            self.root
                .join(&resource.locale)
                .join(format!("{}.{ext}", resource.namespace)),
        )
    }

    /// What: Locale directory names found under the root, sorted.
    #[must_use]
    pub fn locales(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut locales: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect();
        locales.sort();
        locales
    }

    /// What: Every existing locale file of `kind`, paired with its identity.
    #[must_use]
    pub fn files_of_kind(&self, kind: FileKind) -> Vec<(PathBuf, ResourceId)> {
        let Some(ext) = kind.extension() else {
            return Vec::new();
        };
        let mut files = Vec::new();
        for locale in self.locales() {
            let Ok(entries) = std::fs::read_dir(self.root.join(&locale)) else {
                continue;
            };
            for entry in entries.filter_map(Result::ok) {
                let path = entry.path();
                if path.is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some(ext)
                    && let Some(resource) = self.resource_for(&path)
                {
                    files.push((path, resource));
                }
            }
        }
        files.sort();
        files
    }

    /// What: JSON files of the same namespace in every other locale.
    #[must_use]
    pub fn sibling_json_files(&self, resource: &ResourceId) -> Vec<(PathBuf, ResourceId)> {
        self.locales()
            .into_iter()
            .filter(|locale| *locale != resource.locale)
            .map(|locale| ResourceId::new(locale, resource.namespace.clone()))
            .filter_map(|sibling| {
                let path = self.path_for(&sibling, FileKind::Json)?;
                path.is_file().then_some((path, sibling))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// What: Classification is by extension only.
    fn classify_by_extension() {
        assert_eq!(FileKind::classify(Path::new("a/locales/de/common.po")), FileKind::Po);
        assert_eq!(FileKind::classify(Path::new("x.json")), FileKind::Json);
        assert_eq!(FileKind::classify(Path::new("src/App.tsx")), FileKind::Code);
        assert_eq!(FileKind::classify(Path::new("Makefile")), FileKind::Code);
    }

    #[test]
    /// What: Locale files map to a resource id and back to their counterpart path.
    fn resource_round_trips_to_counterpart_path() {
        let layout = LocaleLayout::new("/repo/public/locales");
        let po = Path::new("/repo/public/locales/de/common.po");
        let resource = layout.resource_for(po).expect("locale file");
        assert_eq!(resource, ResourceId::new("de", "common"));
        assert_eq!(resource.lock_key().as_str(), "de");
        assert_eq!(
            layout.path_for(&resource, FileKind::Json),
            Some(PathBuf::from("/repo/public/locales/de/common.json"))
        );
        assert_eq!(layout.path_for(&resource, FileKind::Code), None);
    }

    #[test]
    /// What: Paths outside the convention have no resource id.
    fn non_conforming_paths_are_rejected() {
        let layout = LocaleLayout::new("/repo/public/locales");
        assert!(layout.resource_for(Path::new("/repo/package.json")).is_none());
        assert!(layout.resource_for(Path::new("/repo/public/locales/de.json")).is_none());
        assert!(
            layout
                .resource_for(Path::new("/repo/public/locales/de/nested/common.json"))
                .is_none()
        );
        assert!(layout.resource_for(Path::new("/repo/public/locales/de/App.tsx")).is_none());
    }

    #[test]
    /// What: Sibling discovery lists the same namespace in other locales only.
    fn sibling_json_files_excludes_own_locale() {
        let dir = tempfile::tempdir().expect("tempdir");
        for locale in ["de", "en", "nl"] {
            std::fs::create_dir_all(dir.path().join(locale)).expect("mkdir");
            std::fs::write(dir.path().join(locale).join("common.json"), "{}").expect("write");
        }
        std::fs::write(dir.path().join("en").join("other.json"), "{}").expect("write");
        let layout = LocaleLayout::new(dir.path());

        let siblings: Vec<String> = layout
            .sibling_json_files(&ResourceId::new("de", "common"))
            .into_iter()
            .map(|(_, id)| id.locale)
            .collect();
        assert_eq!(siblings, vec!["en", "nl"]);
        assert_eq!(layout.files_of_kind(FileKind::Json).len(), 4);
        assert!(layout.files_of_kind(FileKind::Po).is_empty());
    }
}
