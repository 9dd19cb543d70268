//! # lcd-core
//!
//! Shared library for the LCD serial bridge containing the domain entities
//! and the line-oriented serial protocol spoken by the display firmware.
//!
//! This crate has zero dependencies on OS APIs, serial drivers, or network
//! sockets.  Everything here can be unit-tested on any machine without a
//! device plugged in.
//!
//! # Architecture overview (for beginners)
//!
//! The bridge accepts short text commands over TCP and forwards them to an
//! LCD controlled by a microcontroller on a USB serial line.  This crate
//! defines:
//!
//! - **`domain`** – What a device is (`UsbId`), what state its link is in
//!   (`LinkState`), and what a client request looks like (`ClientRequest`).
//!
//! - **`protocol`** – How bytes travel on the serial line: newline-terminated
//!   ASCII commands, the `x=<col>&y=<row>&message=<text>` display directive,
//!   and the `Ready` marker the firmware prints after a reset.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `lcd_core::UsbId` instead of `lcd_core::domain::device::UsbId`.
pub use domain::device::{ConnectionAttempt, DeviceIdError, LinkState, StateError, UsbId};
pub use domain::request::{ClientRequest, RequestError, MAX_REQUEST_BYTES};
pub use protocol::command::{encode_command, DisplayCommand};
pub use protocol::line::{decode_line, is_ready_line, READY_MARKER};
