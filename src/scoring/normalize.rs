//! Canonicalize text before comparing it.

use std::sync::LazyLock;

use regex::Regex;

/// Runs of newlines.
static NEWLINES_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n+").expect("failed to compile regex"));

/// Runs of horizontal whitespace.
static BLANKS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("failed to compile regex"));

/// Normalize OCR output or a reference transcript.
///
/// Line endings are unified, quote characters are dropped, runs of newlines
/// and of spaces/tabs are collapsed, and the result is trimmed. Empty input is
/// returned as-is. Applying this twice gives the same result as applying it
/// once.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let cleaned = text.replace('\r', "\n");
    let cleaned = cleaned.replace(['"', '\''], "");
    let cleaned = NEWLINES_REGEX.replace_all(&cleaned, "\n");
    let cleaned = BLANKS_REGEX.replace_all(&cleaned, " ");
    cleaned.trim().to_owned()
}
