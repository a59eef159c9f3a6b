//! Building executor requests for conversions and scans.

use std::path::Path;

use crate::executor::JobRequest;

/// What: Split a command template into words and substitute `{name}` placeholders.
///
/// Inputs:
/// - `template`: e.g. `npx i18next-conv -l {locale} -s {source} -t {target}`
/// - `vars`: Placeholder names and their values
///
/// Output:
/// - `Some((program, args))`, or `None` for a blank template.
///
/// Details:
/// - Words are split on whitespace; single or double quotes group words.
///   Substituted values are never split again, so paths with spaces stay
///   one argument.
#[must_use]
pub fn expand_template(template: &str, vars: &[(&str, &str)]) -> Option<(String, Vec<String>)> {
    let mut words = split_words(template).into_iter().map(|word| {
        vars.iter().fold(word, |acc, (name, value)| {
            acc.replace(&format!("{{{name}}}"), value)
        })
    });
    let program = words.next()?;
    Some((program, words.collect()))
}

/// Whitespace split honouring simple single/double quoting.
fn split_words(template: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;
    for c in template.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

/// What: Request converting `source` into `target` for `locale`.
///
/// Inputs:
/// - `template`: Configured external command, or `None` for the built-in converter
/// - `converter`: Path of the binary providing the `convert` subcommand
///
/// Output:
/// - `None` when the configured template is blank.
#[must_use]
pub fn conversion_request(
    template: Option<&str>,
    converter: &Path,
    locale: &str,
    source: &Path,
    target: &Path,
) -> Option<JobRequest> {
    let source = source.to_string_lossy();
    let target = target.to_string_lossy();
    if let Some(template) = template {
        let (program, args) = expand_template(
            template,
            &[("locale", locale), ("source", &source), ("target", &target)],
        )?;
        return Some(JobRequest::new(program, args));
    }
    Some(JobRequest::new(
        converter.to_string_lossy(),
        vec![
            "convert".to_string(),
            "--locale".to_string(),
            locale.to_string(),
            "--source".to_string(),
            source.into_owned(),
            "--target".to_string(),
            target.into_owned(),
        ],
    ))
}

/// What: Request running the project-wide source scanner.
#[must_use]
pub fn scanner_request(template: &str, config: &str) -> Option<JobRequest> {
    let (program, args) = expand_template(template, &[("config", config)])?;
    Some(JobRequest::new(program, args))
}
