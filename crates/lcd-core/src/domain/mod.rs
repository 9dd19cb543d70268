//! Domain entities for the LCD serial bridge.
//!
//! This module contains pure business logic with no infrastructure
//! dependencies: no serial ports, no sockets, no clocks.
//!
//! # What lives here?
//!
//! - **`device`** – USB vendor/product identifiers, the link state machine,
//!   and the descriptor that drives one connect cycle.
//! - **`request`** – One TCP client's payload, decoded and trimmed into the
//!   command that is forwarded to the display.

pub mod device;
pub mod request;
