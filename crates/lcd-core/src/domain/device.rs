//! Device identity and link lifecycle types.
//!
//! # Link lifecycle (for beginners)
//!
//! A serial link to the display moves through three states:
//!
//! ```text
//! Closed  ──►  Opening  ──►  Ready
//!   ▲             │            │
//!   └─────────────┴────────────┘
//! ```
//!
//! - `Closed`: no OS handle is held (initial and terminal state).
//! - `Opening`: the port is open and the reset handshake is running.
//! - `Ready`: the handle has been published and may carry client commands.
//!
//! `Opening → Closed` exists so that a handle abandoned mid-handshake can be
//! released; it never yields a `Ready` handle.  Every other edge (for example
//! `Closed → Ready`) is rejected by [`LinkState::transition`].

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error returned when a vendor or product identifier cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceIdError {
    #[error("empty {field} identifier")]
    Empty { field: &'static str },
    #[error("{field} identifier '{value}' is longer than 4 hex digits")]
    TooLong { field: &'static str, value: String },
    #[error("{field} identifier '{value}' is not hexadecimal")]
    NotHex { field: &'static str, value: String },
}

/// A USB vendor/product identifier pair, e.g. `2341:0043` for an Arduino Uno.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UsbId {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl UsbId {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    /// Builds a `UsbId` from the hex strings used on the command line
    /// (`"2341"`, `"0043"`).  An optional `0x` prefix is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceIdError`] when either string is empty, longer than four
    /// hex digits, or contains non-hex characters.
    pub fn from_hex(vendor: &str, product: &str) -> Result<Self, DeviceIdError> {
        Ok(Self {
            vendor_id: parse_hex_id(vendor, "vendor")?,
            product_id: parse_hex_id(product, "product")?,
        })
    }
}

impl fmt::Display for UsbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

impl FromStr for UsbId {
    type Err = DeviceIdError;

    /// Parses the `vvvv:pppp` form produced by [`fmt::Display`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (vendor, product) = s.split_once(':').unwrap_or((s, ""));
        Self::from_hex(vendor, product)
    }
}

fn parse_hex_id(raw: &str, field: &'static str) -> Result<u16, DeviceIdError> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.is_empty() {
        return Err(DeviceIdError::Empty { field });
    }
    if digits.len() > 4 {
        return Err(DeviceIdError::TooLong {
            field,
            value: raw.to_string(),
        });
    }
    u16::from_str_radix(digits, 16).map_err(|_| DeviceIdError::NotHex {
        field,
        value: raw.to_string(),
    })
}

// ── Link state machine ────────────────────────────────────────────────────────

/// Error returned for an edge the link lifecycle does not allow.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid link transition {from:?} -> {to:?}")]
pub struct StateError {
    pub from: LinkState,
    pub to: LinkState,
}

/// Lifecycle state of a device handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LinkState {
    #[default]
    Closed,
    Opening,
    Ready,
}

impl LinkState {
    /// Returns `true` if `self → next` is a legal edge.
    pub fn can_transition(self, next: LinkState) -> bool {
        matches!(
            (self, next),
            (LinkState::Closed, LinkState::Opening)
                | (LinkState::Opening, LinkState::Ready)
                | (LinkState::Opening, LinkState::Closed)
                | (LinkState::Ready, LinkState::Closed)
        )
    }

    /// Moves to `next`, or reports the illegal edge.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] for any transition outside the lifecycle
    /// diagram in the module docs.
    pub fn transition(self, next: LinkState) -> Result<LinkState, StateError> {
        if self.can_transition(next) {
            Ok(next)
        } else {
            Err(StateError {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_open(self) -> bool {
        !matches!(self, LinkState::Closed)
    }
}

/// Descriptor for one connect cycle: which device to look for and how fast
/// to talk to it.  Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionAttempt {
    pub device: UsbId,
    pub baud_rate: u32,
}

impl ConnectionAttempt {
    pub fn new(device: UsbId, baud_rate: u32) -> Self {
        Self { device, baud_rate }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
