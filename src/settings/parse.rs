//! `settings.conf` parsing: `key = value` lines onto [`Settings`] defaults.

use super::{FileMode, Settings};

/// What: Interpret a boolean setting value.
///
/// Details:
/// - `true`, `1`, `yes` and `on` (any case) are true; everything else is false.
fn parse_bool(value: &str) -> bool {
    let lv = value.to_ascii_lowercase();
    lv == "true" || lv == "1" || lv == "yes" || lv == "on"
}

/// What: Drop a trailing `# ...` or `// ...` comment from a value.
///
/// Details:
/// - A comment marker only counts when preceded by whitespace, so values
///   such as `https://...` survive.
fn strip_inline_comment(value: &str) -> &str {
    let mut end = value.len();
    for marker in [" #", "\t#", " //", "\t//"] {
        if let Some(i) = value.find(marker) {
            end = end.min(i);
        }
    }
    value[..end].trim()
}

/// Empty values disable optional command templates.
fn optional(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// What: Parse `settings.conf` content on top of `settings`.
///
/// Inputs:
/// - `content`: File content, one `key = value` per line
/// - `settings`: Settings to update in place (usually the defaults)
///
/// Output:
/// - None (modifies `settings` in place).
///
/// Details:
/// - Keys are case-insensitive and `.`, `-` and spaces are read as `_`, so
///   `PO-File-Mode` and `po_file_mode` are the same key.
/// - Lines starting with `#`, `//` or `;` are comments.
/// - Unknown keys and unparsable values are logged and ignored.
/// - `overall_file_mode` only seeds per-kind modes that are not set
///   explicitly elsewhere in the file.
pub fn parse_settings(content: &str, settings: &mut Settings) {
    let mut explicit_modes = [false; 3];
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || trimmed.starts_with("//")
            || trimmed.starts_with(';')
        {
            continue;
        }
        let Some((raw_key, raw_val)) = trimmed.split_once('=') else {
            continue;
        };
        let key = raw_key.trim().to_lowercase().replace(['.', '-', ' '], "_");
        let val = strip_inline_comment(raw_val.trim());
        match key.as_str() {
            "overall_file_mode" | "filemodes_overallfilemode" => {
                settings.overall_file_mode = FileMode::from_config_key(val);
            }
            "po_file_mode" | "filemodes_pofilemode" => {
                if let Some(mode) = FileMode::from_config_key(val) {
                    settings.po_file_mode = mode;
                    explicit_modes[0] = true;
                }
            }
            "json_file_mode" | "filemodes_jsonfilemode" => {
                if let Some(mode) = FileMode::from_config_key(val) {
                    settings.json_file_mode = mode;
                    explicit_modes[1] = true;
                }
            }
            "code_file_mode" | "filemodes_codefilemode" => {
                if let Some(mode) = FileMode::from_config_key(val) {
                    settings.code_file_mode = mode;
                    explicit_modes[2] = true;
                }
            }
            "generate_po" | "filegeneration_generatepo" => {
                settings.generate_po = parse_bool(val);
            }
            "enable_verbose_logging" | "logging_enableverboselogging" => {
                settings.enable_verbose_logging = parse_bool(val);
            }
            "locales_relative_path" | "filepaths_localesrelativepath" => {
                if !val.is_empty() {
                    settings.locales_relative_path = val.to_string();
                }
            }
            "package_json_relative_path" | "filepaths_packagejsonrelativepath" => {
                settings.package_json_relative_path = optional(val);
            }
            "scanner_config_relative_path" | "i18nscannerconfigrelativepath" => {
                if !val.is_empty() {
                    settings.scanner_config_relative_path = val.to_string();
                }
            }
            "code_globs" => {
                let globs: Vec<String> = val
                    .split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(str::to_string)
                    .collect();
                if !globs.is_empty() {
                    settings.code_globs = globs;
                }
            }
            "po_to_json_command" => settings.po_to_json_command = optional(val),
            "json_to_po_command" => settings.json_to_po_command = optional(val),
            "scanner_command" => {
                if !val.is_empty() {
                    settings.scanner_command = val.to_string();
                }
            }
            "debounce_ms" => match val.parse::<u64>() {
                Ok(ms) => settings.debounce_ms = ms,
                Err(_) => tracing::warn!(value = val, "ignoring invalid debounce_ms"),
            },
            "enable_auto_translate" => settings.enable_auto_translate = parse_bool(val),
            "deepl_api_key" => settings.deepl_api_key = val.to_string(),
            "deepl_api_url" => {
                if !val.is_empty() {
                    settings.deepl_api_url = val.to_string();
                }
            }
            "translation_formality" => {
                if !val.is_empty() {
                    settings.translation_formality = val.to_string();
                }
            }
            "translation_preserve_formatting" => {
                settings.translation_preserve_formatting = parse_bool(val);
            }
            _ => tracing::debug!(key = %key, "ignoring unknown settings key"),
        }
    }
    if let Some(mode) = settings.overall_file_mode {
        let modes = [
            &mut settings.po_file_mode,
            &mut settings.json_file_mode,
            &mut settings.code_file_mode,
        ];
        for (slot, explicit) in modes.into_iter().zip(explicit_modes) {
            if !explicit {
                *slot = mode;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// What: Keys are normalised and values parsed per type.
    ///
    /// Inputs:
    /// - Config mixing legacy dotted names, snake case, comments and a URL value
    ///
    /// Output:
    /// - Every recognised key lands in `Settings`; the URL keeps its `//`.
    fn parses_known_keys_and_normalises_names() {
        let content = "\
# transwatch settings
fileGeneration.generatePo = off
logging.enableVerboseLogging = YES
locales_relative_path = web/locales   # inline comment
code_globs = src/**/*.ts, , src/**/*.tsx
po_to_json_command = npx i18next-conv -l {locale} -s {source} -t {target}
debounce_ms = 250
deepl_api_url = https://api.deepl.com/v2/translate
; legacy comment
";
        let mut settings = Settings::default();
        parse_settings(content, &mut settings);
        assert!(!settings.generate_po);
        assert!(settings.enable_verbose_logging);
        assert_eq!(settings.locales_relative_path, "web/locales");
        assert_eq!(settings.code_globs, vec!["src/**/*.ts", "src/**/*.tsx"]);
        assert_eq!(
            settings.po_to_json_command.as_deref(),
            Some("npx i18next-conv -l {locale} -s {source} -t {target}")
        );
        assert_eq!(settings.json_to_po_command, None);
        assert_eq!(settings.debounce_ms, 250);
        assert_eq!(settings.deepl_api_url, "https://api.deepl.com/v2/translate");
    }

    #[test]
    /// What: The overall mode fills in per-kind modes not set explicitly.
    fn overall_mode_defaults_unset_kinds() {
        let mut settings = Settings::default();
        parse_settings(
            "overall_file_mode = manual\ncode_file_mode = automatic\n",
            &mut settings,
        );
        assert_eq!(settings.overall_file_mode, Some(FileMode::Manual));
        assert_eq!(settings.po_file_mode, FileMode::Manual);
        assert_eq!(settings.json_file_mode, FileMode::Manual);
        assert_eq!(settings.code_file_mode, FileMode::Automatic);
    }

    #[test]
    /// What: Invalid values leave defaults in place.
    fn invalid_values_keep_defaults() {
        let mut settings = Settings::default();
        parse_settings(
            "debounce_ms = soon\npo_file_mode = sometimes\nno equals sign\n",
            &mut settings,
        );
        assert_eq!(settings, Settings::default());
    }
}
