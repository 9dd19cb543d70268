//! Outbound command encoding.

use std::fmt;

/// Appends the line terminator the firmware expects.
///
/// The text is forwarded verbatim; no escaping is applied.
pub fn encode_command(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len() + 1);
    bytes.extend_from_slice(text.as_bytes());
    bytes.push(b'\n');
    bytes
}

/// A "print this text at (column, row)" directive.
///
/// Renders as `x=<col>&y=<row>&message=<text>`.  The bridge sends two of
/// these after every successful handshake: the device's short name on row 0
/// and the TCP port on row 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayCommand {
    pub column: u8,
    pub row: u8,
    pub message: String,
}

impl DisplayCommand {
    pub fn new(column: u8, row: u8, message: impl Into<String>) -> Self {
        Self {
            column,
            row,
            message: message.into(),
        }
    }

    /// Row 0: the short identifier of the device node, e.g. `ttyACM0`.
    pub fn device_label(label: impl Into<String>) -> Self {
        Self::new(0, 0, label)
    }

    /// Row 1: the TCP port clients should connect to.
    pub fn service_port(port: u16) -> Self {
        Self::new(0, 1, format!("TCP {port}"))
    }

    /// Wire bytes, newline included.
    pub fn encode(&self) -> Vec<u8> {
        encode_command(&self.to_string())
    }
}

impl fmt::Display for DisplayCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x={}&y={}&message={}",
            self.column, self.row, self.message
        )
    }
}
