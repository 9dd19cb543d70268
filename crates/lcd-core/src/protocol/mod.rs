//! Serial line protocol spoken by the display firmware.
//!
//! The firmware reads ASCII commands terminated by `\n` and prints diagnostic
//! lines of its own.  There is no framing beyond the newline and no
//! acknowledgement.
//!
//! - **`command`** – Encoding outbound commands, including the
//!   `x=<col>&y=<row>&message=<text>` display directive.
//! - **`line`** – Decoding inbound lines and spotting the `Ready` marker.

pub mod command;
pub mod line;
