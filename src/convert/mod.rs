//! Built-in PO <-> i18next JSON conversion.
//!
//! PO parsing and writing is delegated to `polib`, JSON to `serde_json`.
//! The mapping is i18next v3 style: a message's `msgid` is the dotted key
//! path and its `msgstr` the value; nested JSON objects flatten to dotted
//! keys and back. Plural messages map to `key`/`key_plural` or to indexed
//! `key_0`, `key_1`, ... keys.

mod header;
mod sort;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use polib::catalog::Catalog;
use polib::message::{Message, MessageView};
use polib::metadata::CatalogMetadata;
use polib::po_file;
use serde_json::{Map, Value};

pub use sort::{sort_json, to_canonical_string};

/// Line printed by the `convert` command after it wrote its target.
pub const SUCCESS_MARKER: &str = "file written";

/// Separator between nested key segments.
const KEY_SEPARATOR: char = '.';

/// Separator between a key and its plural form index (`key_0`).
const PLURAL_SEPARATOR: char = '_';

/// Suffix of the second form of a two-form plural (`key_plural`).
const PLURAL_SUFFIX: &str = "_plural";

/// What: Errors raised while converting between PO and JSON.
#[derive(Debug)]
pub enum ConvertError {
    /// Reading or writing a file failed.
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The PO file could not be parsed.
    PoParse {
        /// File involved.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
    /// The JSON file could not be parsed.
    Json {
        /// File involved.
        path: PathBuf,
        /// Underlying parser error.
        source: serde_json::Error,
    },
    /// The JSON document is not an object at the top level.
    NotAnObject {
        /// File involved.
        path: PathBuf,
    },
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "I/O error on {}: {source}", path.display()),
            Self::PoParse { path, message } => {
                write!(f, "failed to parse PO file {}: {message}", path.display())
            }
            Self::Json { path, source } => {
                write!(f, "failed to parse JSON file {}: {source}", path.display())
            }
            Self::NotAnObject { path } => {
                write!(f, "JSON file {} must contain an object", path.display())
            }
        }
    }
}

impl std::error::Error for ConvertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::PoParse { .. } | Self::NotAnObject { .. } => None,
        }
    }
}

/// What: Convert a parsed catalog to a nested i18next JSON object.
///
/// Output:
/// - Object keyed by `msgid` segments; untranslated entries map to `""`.
///
/// Details:
/// - The header entry has an empty `msgid` and is skipped.
/// - Plural messages follow i18next v3: two forms become `key` and
///   `key_plural`, any other count becomes `key_0`, `key_1`, ...
/// - A key that extends another key (`title.sub` next to `title`) is stored
///   flat under its dotted name, whatever the message order.
#[must_use]
pub fn catalog_to_json(catalog: &Catalog) -> Value {
    let mut entries = Vec::new();
    for message in catalog.messages() {
        let key = message.msgid();
        if key.is_empty() {
            continue;
        }
        if message.is_plural() {
            let forms = message.msgstr_plural().map(Vec::as_slice).unwrap_or_default();
            entries.extend(plural_keys(key, forms));
        } else {
            let value = message.msgstr().unwrap_or_default().to_string();
            entries.push((key.to_string(), value));
        }
    }
    nest_entries(&entries)
}

/// Expand the forms of plural message `key` into i18next keys.
fn plural_keys(key: &str, forms: &[String]) -> Vec<(String, String)> {
    if let [singular, plural] = forms {
        return vec![
            (key.to_string(), singular.clone()),
            (format!("{key}{PLURAL_SUFFIX}"), plural.clone()),
        ];
    }
    forms
        .iter()
        .enumerate()
        .map(|(index, form)| (format!("{key}{PLURAL_SEPARATOR}{index}"), form.clone()))
        .collect()
}

/// Build the nested object for flat `(dotted key, text)` entries.
fn nest_entries(entries: &[(String, String)]) -> Value {
    let keys: HashSet<&str> = entries.iter().map(|(key, _)| key.as_str()).collect();
    let mut root = Map::new();
    for (key, text) in entries {
        let value = Value::String(text.clone());
        let extends_other_key = key
            .match_indices(KEY_SEPARATOR)
            .any(|(index, _)| keys.contains(&key[..index]));
        if extends_other_key {
            root.insert(key.clone(), value);
        } else {
            let parts: Vec<&str> = key.split(KEY_SEPARATOR).collect();
            insert_path(&mut root, &parts, value);
        }
    }
    Value::Object(root)
}

/// Insert `value` at the nested `parts` path, falling back to a flat dotted key
/// when a non-object value already occupies an intermediate segment.
fn insert_path(map: &mut Map<String, Value>, parts: &[&str], value: Value) {
    let [head, rest @ ..] = parts else {
        return;
    };
    if rest.is_empty() {
        map.insert((*head).to_string(), value);
        return;
    }
    let entry = map
        .entry((*head).to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(child) = entry {
        insert_path(child, rest, value);
    } else {
        map.insert(parts.join(&KEY_SEPARATOR.to_string()), value);
    }
}

/// What: Flatten a JSON object into `(dotted key, text)` pairs in document order.
///
/// Details:
/// - Strings are taken verbatim, `null` becomes `""`, other scalars and
///   arrays are rendered as JSON text.
#[must_use]
pub fn flatten_json(value: &Value) -> Vec<(String, String)> {
    fn walk(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}{KEY_SEPARATOR}{key}")
                    };
                    walk(&path, child, out);
                }
            }
            Value::String(s) => out.push((prefix.to_string(), s.clone())),
            Value::Null => out.push((prefix.to_string(), String::new())),
            other => out.push((prefix.to_string(), other.to_string())),
        }
    }
    let mut out = Vec::new();
    walk("", value, &mut out);
    out
}

/// A PO message about to be written.
#[derive(Debug, PartialEq, Eq)]
enum Entry {
    /// `msgid` with one `msgstr`.
    Singular(String, String),
    /// `msgid` with its plural forms in order.
    Plural(String, Vec<String>),
}

/// What: Group flattened i18next keys into singular and plural messages.
///
/// Inputs:
/// - `flat`: Output of [`flatten_json`]
/// - `min_forms`: Smallest `key_0`, `key_1`, ... run read as a plural
///
/// Details:
/// - `key` with a sibling `key_plural` is a two-form plural.
/// - `key_0` with consecutive `key_1`, ... siblings is a plural with one form
///   per index, when there are at least `min_forms` of them.
/// - Messages keep the order of their first key in `flat`.
fn group_plurals(flat: &[(String, String)], min_forms: usize) -> Vec<Entry> {
    let texts: HashMap<&str, &str> = flat
        .iter()
        .map(|(key, text)| (key.as_str(), text.as_str()))
        .collect();
    let mut plurals: HashMap<&str, Entry> = HashMap::new();
    let mut members: HashSet<String> = HashSet::new();
    for (key, text) in flat {
        let plural_key = format!("{key}{PLURAL_SUFFIX}");
        if let Some(plural) = texts.get(plural_key.as_str()) {
            let forms = vec![text.clone(), (*plural).to_string()];
            plurals.insert(key.as_str(), Entry::Plural(key.clone(), forms));
            members.insert(plural_key);
            continue;
        }
        let Some(base) = key.strip_suffix(&format!("{PLURAL_SEPARATOR}0")) else {
            continue;
        };
        let forms: Vec<String> = (0..)
            .map_while(|index| texts.get(format!("{base}{PLURAL_SEPARATOR}{index}").as_str()))
            .map(|form| (*form).to_string())
            .collect();
        if forms.len() >= min_forms.max(1) {
            for index in 1..forms.len() {
                members.insert(format!("{base}{PLURAL_SEPARATOR}{index}"));
            }
            plurals.insert(key.as_str(), Entry::Plural(base.to_string(), forms));
        }
    }

    let mut entries = Vec::with_capacity(flat.len());
    for (key, text) in flat {
        if members.contains(key.as_str()) {
            continue;
        }
        match plurals.remove(key.as_str()) {
            Some(entry) => entries.push(entry),
            None => entries.push(Entry::Singular(key.clone(), text.clone())),
        }
    }
    entries
}

/// What: Build a PO catalog for `locale` from an i18next JSON object.
///
/// Inputs:
/// - `locale`: Target language
/// - `json`: i18next JSON object
/// - `existing`: Header of the PO file being replaced, when there is one
///
/// Details:
/// - The existing header is kept so plural rules and translator details
///   survive regeneration; a new one is built otherwise.
/// - Plural keys are grouped by [`group_plurals`]; single-form `key_0` runs
///   only count when the existing header declares one plural form.
#[must_use]
pub fn json_to_catalog(locale: &str, json: &Value, existing: Option<CatalogMetadata>) -> Catalog {
    let single_form = existing
        .as_ref()
        .is_some_and(|metadata| metadata.plural_rules.nplurals == 1);
    let entries = group_plurals(&flatten_json(json), if single_form { 1 } else { 2 });
    let mut metadata = existing.unwrap_or_else(|| {
        let forms = entries.iter().find_map(|entry| match entry {
            Entry::Plural(_, forms) => Some(forms.len()),
            Entry::Singular(..) => None,
        });
        header::new_metadata(locale, forms.unwrap_or(0))
    });
    if metadata.language.is_empty() {
        metadata.language = locale.to_string();
    }

    let mut catalog = Catalog::new(metadata);
    for entry in entries {
        let message = match entry {
            Entry::Singular(key, text) => Message::build_singular()
                .with_msgid(key)
                .with_msgstr(text)
                .done(),
            Entry::Plural(key, forms) => Message::build_plural()
                .with_msgid_plural(format!("{key}{PLURAL_SUFFIX}"))
                .with_msgid(key)
                .with_msgstr_plural(forms)
                .done(),
        };
        catalog.append_or_update(message);
    }
    catalog
}

/// What: Parse PO text with `polib` after repairing its header.
///
/// Inputs:
/// - `text`: PO file content
/// - `origin`: File the text came from, for error messages
///
/// # Errors
/// - `ConvertError::PoParse` for malformed lines or a `polib` rejection.
/// - `ConvertError::Io` when the scratch file cannot be written.
///
/// Details:
/// - `polib` only parses files, so the repaired text goes through a
///   temporary file outside the watched tree.
pub fn parse_po_text(text: &str, origin: &Path) -> Result<Catalog, ConvertError> {
    let parse_err = |message: String| ConvertError::PoParse {
        path: origin.to_path_buf(),
        message,
    };
    let prepared = header::prepare(text).map_err(parse_err)?;
    let mut scratch = tempfile::Builder::new()
        .prefix("transwatch-")
        .suffix(".po")
        .tempfile()
        .map_err(|source| ConvertError::Io {
            path: std::env::temp_dir(),
            source,
        })?;
    scratch
        .write_all(prepared.as_bytes())
        .and_then(|()| scratch.flush())
        .map_err(|source| ConvertError::Io {
            path: scratch.path().to_path_buf(),
            source,
        })?;
    po_file::parse(scratch.path()).map_err(|e| parse_err(e.to_string()))
}

/// What: Read and parse a PO file.
///
/// # Errors
/// - I/O failures and everything [`parse_po_text`] rejects.
pub fn read_po_file(source: &Path) -> Result<Catalog, ConvertError> {
    let text = std::fs::read_to_string(source).map_err(|e| ConvertError::Io {
        path: source.to_path_buf(),
        source: e,
    })?;
    parse_po_text(&text, source)
}

/// What: Parse a PO file into nested i18next JSON.
///
/// # Errors
/// - See [`read_po_file`].
pub fn po_file_to_json(source: &Path) -> Result<Value, ConvertError> {
    Ok(catalog_to_json(&read_po_file(source)?))
}

/// What: Read a JSON resource file.
///
/// # Errors
/// - I/O failure, invalid JSON, or a non-object top level.
pub fn read_json_file(source: &Path) -> Result<Value, ConvertError> {
    let text = std::fs::read_to_string(source).map_err(|e| ConvertError::Io {
        path: source.to_path_buf(),
        source: e,
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|e| ConvertError::Json {
        path: source.to_path_buf(),
        source: e,
    })?;
    if !value.is_object() {
        return Err(ConvertError::NotAnObject {
            path: source.to_path_buf(),
        });
    }
    Ok(value)
}

/// What: Write `content` to `path` unless the file already holds exactly that text.
///
/// Output:
/// - `Ok(true)` when the file was written, `Ok(false)` when it was already current.
///
/// # Errors
/// - Propagates write failures.
pub fn write_if_changed(path: &Path, content: &str) -> std::io::Result<bool> {
    if std::fs::read_to_string(path).is_ok_and(|existing| existing == content) {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(true)
}

/// What: Convert a PO file into a canonical JSON file.
///
/// Output:
/// - `Ok(true)` when `target` changed.
///
/// # Errors
/// - Parse or I/O failures.
pub fn convert_po_to_json(source: &Path, target: &Path) -> Result<bool, ConvertError> {
    let json = po_file_to_json(source)?;
    let text = to_canonical_string(&json).map_err(|e| ConvertError::Json {
        path: target.to_path_buf(),
        source: e,
    })?;
    write_if_changed(target, &text).map_err(|e| ConvertError::Io {
        path: target.to_path_buf(),
        source: e,
    })
}

/// What: Convert a JSON resource into a PO file for `locale`.
///
/// Output:
/// - `Ok(true)` when `target` changed.
///
/// # Errors
/// - Parse or I/O failures.
///
/// Details:
/// - The header of an existing, parseable `target` is reused.
/// - The catalog is rendered to a scratch file first so an unchanged result
///   leaves `target` untouched.
pub fn convert_json_to_po(
    locale: &str,
    source: &Path,
    target: &Path,
) -> Result<bool, ConvertError> {
    let json = read_json_file(source)?;
    let existing = if target.exists() {
        match read_po_file(target) {
            Ok(catalog) => Some(catalog.metadata),
            Err(e) => {
                tracing::debug!("Not reusing the header of {}: {e}", target.display());
                None
            }
        }
    } else {
        None
    };
    let catalog = json_to_catalog(locale, &json, existing);

    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ConvertError::Io { path, source }
    };
    let scratch = tempfile::Builder::new()
        .prefix("transwatch-")
        .suffix(".po")
        .tempfile()
        .map_err(io_err(&std::env::temp_dir()))?;
    po_file::write(&catalog, scratch.path()).map_err(io_err(scratch.path()))?;
    let rendered = std::fs::read_to_string(scratch.path()).map_err(io_err(scratch.path()))?;
    write_if_changed(target, &rendered).map_err(io_err(target))
}
