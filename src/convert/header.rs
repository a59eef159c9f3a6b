//! PO header repair ahead of `polib` parsing.
//!
//! `polib` expects the first entry to be a header carrying every standard
//! field and panics when one is missing. Headerless files and headers written
//! by other tools (lowercase keys, no dates) are rewritten into that shape
//! here; message entries pass through untouched.

use polib::metadata::CatalogMetadata;

/// Plural rule used when a header has none or an unreadable one.
pub const DEFAULT_PLURAL_FORMS: &str = "nplurals=2; plural=(n != 1);";

/// Header fields `polib` requires, with the value used when a file lacks one.
const REQUIRED_FIELDS: [(&str, &str); 10] = [
    ("Project-Id-Version", ""),
    ("POT-Creation-Date", ""),
    ("PO-Revision-Date", ""),
    ("Last-Translator", ""),
    ("Language-Team", ""),
    ("MIME-Version", "1.0"),
    ("Content-Type", "text/plain; charset=UTF-8"),
    ("Content-Transfer-Encoding", "8bit"),
    ("Language", ""),
    ("Plural-Forms", DEFAULT_PLURAL_FORMS),
];

/// Keywords whose argument `polib` slices as a quoted string.
const QUOTED_KEYWORDS: [&str; 14] = [
    "msgctxt",
    "msgid",
    "msgid_plural",
    "msgstr",
    "msgstr[0]",
    "msgstr[1]",
    "msgstr[2]",
    "msgstr[3]",
    "msgstr[4]",
    "msgstr[5]",
    "msgstr[6]",
    "msgstr[7]",
    "msgstr[8]",
    "msgstr[9]",
];

/// Location and content of the header entry found in a PO text.
struct HeaderSpan {
    /// Comment lines attached to the header.
    comments: Vec<usize>,
    /// First line after the header entry.
    end: usize,
    /// Raw (still escaped) `msgstr` of the header.
    raw: String,
}

/// What: Rewrite PO `text` so `polib` can parse it without panicking.
///
/// Inputs:
/// - `text`: Full PO file content
///
/// Output:
/// - `Ok(text)` with a complete header entry first and trailing whitespace
///   trimmed from every line; `Err(reason)` for lines `polib` cannot slice.
///
/// Details:
/// - Header keys are matched case-insensitively and rewritten in their
///   canonical spelling; unknown keys are kept.
/// - Missing fields get neutral defaults; an invalid `Plural-Forms` is
///   replaced by [`DEFAULT_PLURAL_FORMS`].
/// - A file without a header gets one prepended.
pub fn prepare(text: &str) -> Result<String, String> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    for (index, line) in lines.iter().enumerate() {
        check_line(line).map_err(|reason| format!("line {}: {reason}", index + 1))?;
    }

    let mut out = String::with_capacity(text.len() + 512);
    let rest = match find_header(&lines) {
        Some(span) => {
            for index in span.comments {
                out.push_str(lines[index]);
                out.push('\n');
            }
            push_header(&mut out, &header_fields(&span.raw));
            &lines[span.end..]
        }
        None => {
            push_header(&mut out, &[]);
            &lines[..]
        }
    };
    out.push('\n');
    for line in rest {
        out.push_str(line);
        out.push('\n');
    }
    Ok(out)
}

/// What: Metadata for a catalog written from scratch.
///
/// Inputs:
/// - `locale`: Value of the `Language` field
/// - `plural_forms`: Number of plural forms used by the catalog's messages
///
/// Details:
/// - Two forms get the usual `(n != 1)` rule; other counts get a rule that
///   maps `n` onto the available forms, to be refined by hand in the file.
#[must_use]
pub fn new_metadata(locale: &str, plural_forms: usize) -> CatalogMetadata {
    let rule = match plural_forms {
        0 | 2 => DEFAULT_PLURAL_FORMS.to_string(),
        1 => "nplurals=1; plural=0;".to_string(),
        n => format!("nplurals={n}; plural=(n < {last} ? n : {last});", last = n - 1),
    };
    let fields = [("Language", locale), ("Plural-Forms", rule.as_str())];
    CatalogMetadata::parse(&metadata_text(&fields)).unwrap_or_default()
}

/// Reject lines whose quoted argument `polib` would slice out of bounds.
fn check_line(line: &str) -> Result<(), String> {
    if line.starts_with('"') {
        return if is_quoted(line) {
            Ok(())
        } else {
            Err("unterminated string".to_string())
        };
    }
    if let Some((keyword, argument)) = line.split_once(' ')
        && QUOTED_KEYWORDS.contains(&keyword)
        && !is_quoted(argument)
    {
        return Err(format!("`{keyword}` needs a quoted string"));
    }
    Ok(())
}

/// Whether `s` is a complete double-quoted string.
fn is_quoted(s: &str) -> bool {
    s.len() >= 2 && s.starts_with('"') && s.ends_with('"')
}

/// Strip the surrounding quotes of a checked line or argument.
fn unquote(s: &str) -> &str {
    s.get(1..s.len().saturating_sub(1)).unwrap_or_default()
}

/// Locate the header entry: the first entry, with an empty `msgid`.
fn find_header(lines: &[&str]) -> Option<HeaderSpan> {
    let mut comments = Vec::new();
    let mut index = 0;
    while let Some(line) = lines.get(index)
        && (line.is_empty() || line.starts_with('#'))
    {
        if !line.is_empty() {
            comments.push(index);
        }
        index += 1;
    }

    if lines.get(index).copied() != Some("msgid \"\"") {
        return None;
    }
    index += 1;
    while let Some(line) = lines.get(index)
        && line.starts_with('"')
    {
        if *line != "\"\"" {
            return None;
        }
        index += 1;
    }

    let argument = lines.get(index)?.strip_prefix("msgstr ")?;
    let mut raw = unquote(argument).to_string();
    index += 1;
    while let Some(line) = lines.get(index)
        && line.starts_with('"')
    {
        raw.push_str(unquote(line));
        index += 1;
    }
    Some(HeaderSpan {
        comments,
        end: index,
        raw,
    })
}

/// Split a raw header into `(key, value)` pairs with canonical key spelling.
fn header_fields(raw: &str) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();
    for entry in raw.split("\\n") {
        let Some((key, value)) = entry.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let key = REQUIRED_FIELDS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map_or(key, |&(name, _)| name);
        let value = value.trim().to_string();
        match fields.iter().position(|(existing, _)| existing == key) {
            Some(index) => fields[index].1 = value,
            None => fields.push((key.to_string(), value)),
        }
    }
    fields
}

/// Append a complete header entry built from `fields` plus defaults.
fn push_header(out: &mut String, fields: &[(String, String)]) {
    let mut merged: Vec<(&str, &str)> = fields
        .iter()
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();
    for (name, default) in REQUIRED_FIELDS {
        if !merged.iter().any(|(key, _)| *key == name) {
            merged.push((name, default));
        }
    }
    for field in &mut merged {
        if field.0 == "Plural-Forms" && !plural_forms_valid(field.1) {
            tracing::debug!("Replacing unreadable Plural-Forms {:?}", field.1);
            field.1 = DEFAULT_PLURAL_FORMS;
        }
    }

    out.push_str("msgid \"\"\nmsgstr \"\"\n");
    for (key, value) in merged {
        out.push('"');
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push_str("\\n\"\n");
    }
}

/// Whether `polib` accepts `rule` as a `Plural-Forms` value.
fn plural_forms_valid(rule: &str) -> bool {
    CatalogMetadata::parse(&metadata_text(&[("Plural-Forms", rule)])).is_ok()
}

/// Unescaped header text with every required field, `overrides` winning.
fn metadata_text(overrides: &[(&str, &str)]) -> String {
    let mut text = String::new();
    for (name, default) in REQUIRED_FIELDS {
        let value = overrides
            .iter()
            .find(|(key, _)| *key == name)
            .map_or(default, |&(_, value)| value);
        text.push_str(name);
        text.push_str(": ");
        text.push_str(value);
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// What: A file without a header gets a complete one prepended.
    fn prepends_header_when_missing() {
        let text = "msgid \"greeting\"\nmsgstr \"Hallo\"\n";
        let prepared = prepare(text).expect("prepare");
        assert!(prepared.starts_with("msgid \"\"\nmsgstr \"\"\n\"Project-Id-Version: \\n\""));
        assert!(prepared.contains("\"Plural-Forms: nplurals=2; plural=(n != 1);\\n\"\n"));
        assert!(prepared.ends_with("\nmsgid \"greeting\"\nmsgstr \"Hallo\"\n"));
    }

    #[test]
    /// What: Lowercase keys are canonicalised, unknown keys kept, gaps filled.
    fn canonicalises_foreign_header() {
        let text = concat!(
            "# Translation for de\n",
            "msgid \"\"\n",
            "msgstr \"\"\n",
            "\"mime-version: 1.0\\n\"\n",
            "\"content-type: text/plain; charset=utf-8\\n\"\n",
            "\"plural-forms: nplurals=2; plural=(n != 1)\\n\"\n",
            "\"X-Generator: i18next-conv\\n\"\n",
            "\"language: de\\n\"\n",
            "\n",
            "msgid \"a\"\n",
            "msgstr \"b\"\n",
        );
        let prepared = prepare(text).expect("prepare");
        assert!(prepared.starts_with("# Translation for de\nmsgid \"\"\nmsgstr \"\"\n"));
        assert!(prepared.contains("\"MIME-Version: 1.0\\n\""));
        assert!(prepared.contains("\"Content-Type: text/plain; charset=utf-8\\n\""));
        assert!(prepared.contains("\"Language: de\\n\""));
        assert!(prepared.contains("\"X-Generator: i18next-conv\\n\""));
        assert!(prepared.contains("\"POT-Creation-Date: \\n\""));
        assert!(prepared.contains("\"Content-Transfer-Encoding: 8bit\\n\""));
        assert_eq!(prepared.matches("msgid \"\"").count(), 1);
        assert!(prepared.ends_with("msgid \"a\"\nmsgstr \"b\"\n"));
    }

    #[test]
    /// What: A multi-line first `msgid` is a message, not a header.
    fn continued_msgid_is_not_a_header() {
        let text = "msgid \"\"\n\"long key\"\nmsgstr \"value\"\n";
        let prepared = prepare(text).expect("prepare");
        assert_eq!(prepared.matches("msgid \"\"").count(), 2);
        assert!(prepared.ends_with("msgid \"\"\n\"long key\"\nmsgstr \"value\"\n"));
    }

    #[test]
    /// What: An unreadable plural rule is replaced by the default one.
    fn replaces_invalid_plural_forms() {
        let text = "msgid \"\"\nmsgstr \"Plural-Forms: nplurals = two\\n\"\n";
        let prepared = prepare(text).expect("prepare");
        assert!(prepared.contains(DEFAULT_PLURAL_FORMS));
        assert!(!prepared.contains("two"));
    }

    #[test]
    /// What: Lines `polib` would slice out of bounds are rejected with a line number.
    fn rejects_unquoted_arguments() {
        let err = prepare("msgid \"a\"\nmsgstr\nmsgstr x\n").expect_err("invalid");
        assert_eq!(err, "line 3: `msgstr` needs a quoted string");
        assert!(prepare("msgid \"a\"\n\"\n").is_err());
    }

    #[test]
    /// What: Scratch metadata carries the locale and a rule per form count.
    fn new_metadata_per_form_count() {
        let two = new_metadata("de", 2);
        assert_eq!(two.language, "de");
        assert_eq!(two.plural_rules.nplurals, 2);
        assert_eq!(two.mime_version, "1.0");
        assert_eq!(new_metadata("ja", 1).plural_rules.nplurals, 1);
        let three = new_metadata("ru", 3);
        assert_eq!(three.plural_rules.nplurals, 3);
        assert_eq!(three.plural_rules.expr, "(n < 2 ? n : 2)");
    }
}
