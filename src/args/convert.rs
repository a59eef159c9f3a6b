//! Built-in PO <-> JSON conversion (`transwatch convert`).

use std::path::Path;
use std::process::ExitCode;

use transwatch::convert::{SUCCESS_MARKER, convert_json_to_po, convert_po_to_json};
use transwatch::layout::FileKind;

/// What: Convert `source` into `target`, picking the direction from the
/// source extension.
///
/// Output:
/// - `ExitCode::SUCCESS` after printing `file written` or `file unchanged`.
/// - `ExitCode::FAILURE` on any error, which is printed to stderr.
pub fn handle_convert(locale: &str, source: &Path, target: &Path) -> ExitCode {
    tracing::debug!(locale, source = %source.display(), target = %target.display(), "convert");
    let result = match FileKind::classify(source) {
        FileKind::Po => convert_po_to_json(source, target),
        FileKind::Json => convert_json_to_po(locale, source, target),
        FileKind::Code => {
            eprintln!(
                "cannot convert {}: expected a .po or .json file",
                source.display()
            );
            return ExitCode::FAILURE;
        }
    };
    match result {
        Ok(true) => {
            println!("{SUCCESS_MARKER}: {}", target.display());
            ExitCode::SUCCESS
        }
        Ok(false) => {
            println!("file unchanged: {}", target.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("conversion failed: {e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
