//! ABOUTME: Parsing of the duration literals used in `timeout:`/`retry:` fields
//! ABOUTME: Accepts the "30s" / "5m" / "2h30m15s" style the document format uses

use std::time::Duration;

/// Parse a duration literal such as `"30s"`, `"5m"`, or `"2h30m15s"`.
///
/// Delegates to [`humantime::parse_duration`], which already accepts this
/// exact compound form, and maps its error into a plain `String` reason so
/// callers can attach the offending literal and source path themselves.
pub fn parse_duration(literal: &str) -> Result<Duration, String> {
    humantime::parse_duration(literal.trim()).map_err(|e| e.to_string())
}
