//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! It is built once at startup from CLI arguments, environment variables and
//! an optional TOML file, and never changes afterwards.
//!
//! [`LinkTimings`] groups every delay and interval of the serial-link
//! lifecycle.  Production code always uses [`LinkTimings::default`]; tests
//! shrink the values so a full reconnect cycle runs in milliseconds.

use std::net::SocketAddr;
use std::time::Duration;

use lcd_core::{ConnectionAttempt, UsbId};

/// All runtime configuration for the bridge.
///
/// # Example
///
/// ```rust
/// use lcd_bridge::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.listen_addr.port(), 9999);
/// assert_eq!(cfg.baud_rate, 9600);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// USB vendor/product pair of the display's microcontroller.
    pub device: UsbId,

    /// Serial line speed.  Must match the firmware's `Serial.begin()`.
    pub baud_rate: u32,

    /// Address the TCP gateway binds to once the device link is up.
    pub listen_addr: SocketAddr,

    /// Fallback `tracing` filter used when `RUST_LOG` is not set.
    pub log_level: String,

    /// Delays and intervals of the link lifecycle.
    pub timings: LinkTimings,
}

impl BridgeConfig {
    /// The descriptor handed to the connection manager on every cycle.
    pub fn attempt(&self) -> ConnectionAttempt {
        ConnectionAttempt::new(self.device, self.baud_rate)
    }
}

impl Default for BridgeConfig {
    /// | Field        | Default                       |
    /// |--------------|-------------------------------|
    /// | device       | `2341:0043` (Arduino Uno)     |
    /// | baud_rate    | 9600                          |
    /// | listen_addr  | `0.0.0.0:9999`                |
    /// | log_level    | `info`                        |
    fn default() -> Self {
        Self {
            device: UsbId::new(0x2341, 0x0043),
            baud_rate: 9600,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 9999)),
            log_level: "info".to_string(),
            timings: LinkTimings::default(),
        }
    }
}

/// Backoffs, intervals and timeouts of the serial-link lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTimings {
    /// Wait before re-scanning when no matching device is attached.
    pub not_found_retry: Duration,
    /// Wait before re-scanning after the port failed to open.
    pub open_retry: Duration,
    /// Period of the reconnect supervisor's health check.
    pub supervisor_interval: Duration,
    /// Poll period of the health monitor.
    pub monitor_interval: Duration,
    /// Poll period of the gateway's "wait for first link" gate.
    pub gateway_poll: Duration,
    /// How long to wait for the `Ready` marker after a reset.
    pub handshake_timeout: Duration,
    /// Time the reset line is held deasserted.
    pub reset_settle: Duration,
    /// Pause between the two init directives.
    pub init_gap: Duration,
    /// Serial read timeout applied when the port is opened.
    pub read_timeout: Duration,
}

impl Default for LinkTimings {
    fn default() -> Self {
        Self {
            not_found_retry: Duration::from_secs(2),
            open_retry: Duration::from_secs(5),
            supervisor_interval: Duration::from_secs(10),
            monitor_interval: Duration::from_millis(100),
            gateway_poll: Duration::from_millis(500),
            handshake_timeout: Duration::from_secs(5),
            reset_settle: Duration::from_millis(100),
            init_gap: Duration::from_millis(100),
            read_timeout: Duration::from_secs(1),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
