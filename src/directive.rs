//! EXECUTE directive extraction.
//!
//! A reply requests a shell command by embedding `EXECUTE: <command>`. Only the
//! first directive in a reply is honored, and the command runs to the end of
//! its line.

use lazy_static::lazy_static;
use regex::Regex;

/// The literal marker the model uses to request a command.
pub const EXECUTE_MARKER: &str = "EXECUTE:";

lazy_static! {
    // `\s*` may cross a newline; `.` stops at the next one.
    static ref EXECUTE_RE: Regex =
        Regex::new(r"EXECUTE:\s*(.+)").expect("Failed to compile EXECUTE directive regex");
}

/// Returns the command requested by `content`, if any.
///
/// A marker with nothing after it but whitespace does not count as a request.
pub fn extract_command(content: &str) -> Option<String> {
    if !content.contains(EXECUTE_MARKER) {
        return None;
    }

    let command = EXECUTE_RE.captures(content)?.get(1)?.as_str().trim();
    if command.is_empty() {
        None
    } else {
        Some(command.to_string())
    }
}
