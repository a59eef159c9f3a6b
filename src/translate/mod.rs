//! Backfilling translations that sibling locales are missing.
//!
//! When a JSON resource changes, every other locale's file of the same
//! namespace is compared against it. Keys that now have text in the changed
//! file but are still `""` in a sibling are sent to the translation backend
//! and written into that sibling.

mod deepl;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::{BoxFuture, join_all};
use serde_json::{Map, Value};

pub use deepl::{DeepLBackend, target_language};

use crate::convert::{read_json_file, to_canonical_string, write_if_changed};
use crate::layout::{LocaleLayout, ResourceId};
use crate::settings::{Settings, SettingsError};

/// What: Failures talking to the translation backend.
#[derive(Debug)]
pub enum TranslateError {
    /// Transport or decoding failure.
    Http(reqwest::Error),
    /// The API answered with a non-success status.
    Status {
        /// HTTP status code.
        status: u16,
        /// Start of the response body.
        body: String,
    },
    /// The API answered without any translation.
    EmptyResponse,
}

impl fmt::Display for TranslateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "translation request failed: {e}"),
            Self::Status { status, body } => {
                write!(f, "translation API returned status {status}: {body}")
            }
            Self::EmptyResponse => f.write_str("translation API returned no translations"),
        }
    }
}

impl std::error::Error for TranslateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            Self::Status { .. } | Self::EmptyResponse => None,
        }
    }
}

impl From<reqwest::Error> for TranslateError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

/// What: Something that can translate one text into a target locale.
pub trait TranslationBackend: Send + Sync {
    /// What: Translate `text` into `target_locale` (a locale directory name).
    fn translate<'a>(
        &'a self,
        text: &'a str,
        target_locale: &'a str,
    ) -> BoxFuture<'a, Result<String, TranslateError>>;
}

/// What: A key a sibling locale has not translated yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTranslation {
    /// Dotted key path.
    pub key: String,
    /// Text in the changed locale.
    pub text: String,
}

/// What: Keys with text in `changed` that are empty strings in `existing`.
///
/// Details:
/// - Recurses where both sides hold objects at the same key.
/// - Keys absent from `existing` are not reported; only explicit `""` counts.
#[must_use]
pub fn missing_translations(changed: &Value, existing: &Value) -> Vec<MissingTranslation> {
    fn walk(prefix: &str, changed: &Value, existing: &Value, out: &mut Vec<MissingTranslation>) {
        let (Value::Object(changed), Value::Object(existing)) = (changed, existing) else {
            return;
        };
        for (key, changed_value) in changed {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            match (changed_value, existing.get(key)) {
                (Value::Object(_), Some(existing_value @ Value::Object(_))) => {
                    walk(&path, changed_value, existing_value, out);
                }
                (Value::String(text), Some(Value::String(current)))
                    if !text.is_empty() && current.is_empty() =>
                {
                    out.push(MissingTranslation {
                        key: path,
                        text: text.clone(),
                    });
                }
                _ => {}
            }
        }
    }
    let mut out = Vec::new();
    walk("", changed, existing, &mut out);
    out
}

/// What: Set `text` at dotted `key` inside `value`, creating objects on the way.
///
/// Details:
/// - A non-object value in the way is replaced by an object.
pub fn set_translation(value: &mut Value, key: &str, text: String) {
    let mut current = value;
    let mut segments = key.split('.').peekable();
    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), Value::String(text));
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// What: Outcome of backfilling one sibling file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillReport {
    /// Sibling file.
    pub path: PathBuf,
    /// Keys translated and written.
    pub translated: usize,
    /// Keys whose translation failed.
    pub failed: usize,
    /// Whether the file was rewritten.
    pub written: bool,
}

/// What: Auto-translation over a pluggable backend.
#[derive(Clone)]
pub struct TranslationService {
    backend: Arc<dyn TranslationBackend>,
}

impl fmt::Debug for TranslationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationService").finish_non_exhaustive()
    }
}

impl TranslationService {
    /// What: Service using `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn TranslationBackend>) -> Self {
        Self { backend }
    }

    /// What: Build the DeepL-backed service described by `settings`.
    ///
    /// Output:
    /// - `Ok(None)` when auto-translation is disabled.
    ///
    /// # Errors
    /// - `SettingsError::ConfigurationMissing` when it is enabled without an API key.
    pub fn from_settings(settings: &Settings) -> Result<Option<Self>, SettingsError> {
        if !settings.enable_auto_translate {
            return Ok(None);
        }
        if settings.deepl_api_key.trim().is_empty() {
            return Err(SettingsError::ConfigurationMissing {
                setting: "deepl_api_key",
                feature: "Auto-translation",
            });
        }
        let backend = DeepLBackend::new(
            settings.deepl_api_url.clone(),
            settings.deepl_api_key.trim(),
            settings.translation_formality.clone(),
            settings.translation_preserve_formatting,
        );
        Ok(Some(Self::new(Arc::new(backend))))
    }

    /// What: Fill in `sibling`'s missing keys from `changed`.
    ///
    /// Inputs:
    /// - `changed`: Content of the file that changed
    /// - `sibling_path`: Same namespace in another locale
    /// - `sibling_locale`: Target locale for the backend
    ///
    /// Output:
    /// - Counts of translated and failed keys.
    ///
    /// # Errors
    /// - Reading, parsing or writing the sibling file. Backend errors are
    ///   logged per key and counted instead.
    pub async fn backfill_sibling(
        &self,
        changed: &Value,
        sibling_path: &Path,
        sibling_locale: &str,
    ) -> Result<BackfillReport, crate::convert::ConvertError> {
        let existing = read_json_file(sibling_path)?;
        let missing = missing_translations(changed, &existing);
        let mut report = BackfillReport {
            path: sibling_path.to_path_buf(),
            translated: 0,
            failed: 0,
            written: false,
        };
        if missing.is_empty() {
            return Ok(report);
        }
        tracing::info!(
            path = %sibling_path.display(),
            count = missing.len(),
            "translating missing keys"
        );

        let results = join_all(missing.iter().map(|m| async move {
            (m, self.backend.translate(&m.text, sibling_locale).await)
        }))
        .await;

        // Re-read so edits made while requests were in flight are kept.
        let mut updated = read_json_file(sibling_path)?;
        for (missing, result) in results {
            match result {
                Ok(text) => {
                    tracing::debug!(key = %missing.key, locale = sibling_locale, "translated");
                    set_translation(&mut updated, &missing.key, text);
                    report.translated += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        key = %missing.key,
                        locale = sibling_locale,
                        error = %e,
                        "translation failed"
                    );
                    report.failed += 1;
                }
            }
        }
        if report.translated > 0 {
            let text = to_canonical_string(&updated).map_err(|source| {
                crate::convert::ConvertError::Json {
                    path: sibling_path.to_path_buf(),
                    source,
                }
            })?;
            report.written = write_if_changed(sibling_path, &text).map_err(|source| {
                crate::convert::ConvertError::Io {
                    path: sibling_path.to_path_buf(),
                    source,
                }
            })?;
        }
        Ok(report)
    }

    /// What: Start one detached backfill task per sibling of `resource`.
    ///
    /// Output:
    /// - Join handles, one per sibling; callers may drop them.
    ///
    /// Details:
    /// - Failures are logged inside the task and never reach the caller's
    ///   handler cycle.
    pub fn spawn_backfill(
        &self,
        layout: &LocaleLayout,
        resource: &ResourceId,
        changed: &Value,
    ) -> Vec<tokio::task::JoinHandle<Option<BackfillReport>>> {
        let changed = Arc::new(changed.clone());
        layout
            .sibling_json_files(resource)
            .into_iter()
            .map(|(path, sibling)| {
                let service = self.clone();
                let changed = Arc::clone(&changed);
                tokio::spawn(async move {
                    match service
                        .backfill_sibling(&changed, &path, &sibling.locale)
                        .await
                    {
                        Ok(report) => Some(report),
                        Err(e) => {
                            tracing::warn!(
                                sibling = %sibling,
                                error = %e,
                                "auto-translation skipped"
                            );
                            None
                        }
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Backend that prefixes the locale, failing for texts containing "fail".
    struct PrefixBackend;

    impl TranslationBackend for PrefixBackend {
        fn translate<'a>(
            &'a self,
            text: &'a str,
            target_locale: &'a str,
        ) -> BoxFuture<'a, Result<String, TranslateError>> {
            Box::pin(async move {
                if text.contains("fail") {
                    Err(TranslateError::EmptyResponse)
                } else {
                    Ok(format!("[{target_locale}] {text}"))
                }
            })
        }
    }

    #[test]
    /// What: Only keys that are explicitly empty in the sibling are missing.
    fn finds_missing_keys_recursively() {
        let changed = json!({"a": "x", "b": "y", "c": "", "nav": {"home": "Home"}, "d": "z"});
        let existing = json!({"a": "", "b": "schon", "c": "", "nav": {"home": ""}});
        assert_eq!(
            missing_translations(&changed, &existing),
            vec![
                MissingTranslation {
                    key: "a".to_string(),
                    text: "x".to_string()
                },
                MissingTranslation {
                    key: "nav.home".to_string(),
                    text: "Home".to_string()
                },
            ]
        );
    }

    #[test]
    /// What: Dotted keys create intermediate objects.
    fn set_translation_creates_path() {
        let mut value = json!({"nav": "flat"});
        set_translation(&mut value, "nav.home", "Start".to_string());
        set_translation(&mut value, "title", "T".to_string());
        assert_eq!(value, json!({"nav": {"home": "Start"}, "title": "T"}));
    }

    #[tokio::test]
    /// What: Successful keys are written in canonical form; failures are isolated.
    ///
    /// Inputs:
    /// - Sibling with two empty keys, one of which the backend fails on
    ///
    /// Output:
    /// - One key written, one counted as failed, file sorted with 4-space indent.
    async fn backfill_isolates_per_key_failures() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sibling = dir.path().join("common.json");
        std::fs::write(&sibling, r#"{"z": "", "a": "", "keep": "da"}"#).expect("write");
        let service = TranslationService::new(Arc::new(PrefixBackend));
        let changed = json!({"z": "Zebra", "a": "please fail", "keep": "here"});

        let report = service
            .backfill_sibling(&changed, &sibling, "nl")
            .await
            .expect("backfill");
        assert_eq!(report.translated, 1);
        assert_eq!(report.failed, 1);
        assert!(report.written);
        assert_eq!(
            std::fs::read_to_string(&sibling).expect("read"),
            "{\n    \"a\": \"\",\n    \"keep\": \"da\",\n    \"z\": \"[nl] Zebra\"\n}\n"
        );
    }

    #[test]
    /// What: Enabling translation without a key is a configuration error.
    fn missing_api_key_is_configuration_error() {
        let settings = Settings {
            enable_auto_translate: true,
            ..Settings::default()
        };
        assert!(matches!(
            TranslationService::from_settings(&settings),
            Err(SettingsError::ConfigurationMissing { .. })
        ));
        assert!(
            TranslationService::from_settings(&Settings::default())
                .expect("disabled is fine")
                .is_none()
        );
    }
}
