//! Inbound line decoding.
//!
//! The firmware's output is not otherwise specified, so decoding is lenient:
//! undecodable bytes become U+FFFD instead of failing, and the `Ready`
//! marker is a plain substring match anywhere in the line.

/// Substring the firmware prints once it has finished booting.
pub const READY_MARKER: &str = "Ready";

/// Lossy UTF-8 decode followed by a whitespace trim (drops `\r\n`).
pub fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim().to_string()
}

/// Returns `true` if `line` announces that the firmware is ready.
pub fn is_ready_line(line: &str) -> bool {
    line.contains(READY_MARKER)
}
