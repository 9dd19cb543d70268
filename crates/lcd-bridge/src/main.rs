//! LCD bridge: entry point.
//!
//! This binary finds a USB-attached LCD controller by vendor/product id,
//! keeps a serial link to it alive across unplugs and resets, and forwards
//! one-line text commands received over TCP to it.
//!
//! # Usage
//!
//! ```text
//! lcd-bridge [OPTIONS]
//!
//! Options:
//!   --baud      <BAUD>  Serial line speed [default: 9600]
//!   --tcp       <PORT>  TCP listen port [default: 9999]
//!   --vid       <HEX>   USB vendor id [default: 2341]
//!   --pid       <HEX>   USB product id [default: 0043]
//!   --bind      <IP>    TCP bind address [default: 0.0.0.0]
//!   --config    <PATH>  Optional TOML configuration file
//!   --log-level <LVL>   Log level when RUST_LOG is unset [default: info]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable       | Flag          |
//! |----------------|---------------|
//! | `LCD_BAUD`     | `--baud`      |
//! | `LCD_TCP_PORT` | `--tcp`       |
//! | `LCD_VID`      | `--vid`       |
//! | `LCD_PID`      | `--pid`       |
//! | `LCD_BIND`     | `--bind`      |
//! | `LCD_CONFIG`   | `--config`    |
//! | `LCD_LOG`      | `--log-level` |
//!
//! Flags and environment variables win over the config file, which wins
//! over the built-in defaults.
//!
//! # Architecture overview
//!
//! ```text
//! TCP clients  ("x=1&y=1&message=Hi")
//!       ↓
//! lcd-bridge  ← this process
//!   domain/          BridgeConfig, LinkTimings
//!   application/     SharedLink, ConnectionManager, ReconnectSupervisor,
//!                    HealthMonitor, forward_request
//!   infrastructure/
//!     gateway        TCP accept loop
//!     locator        USB enumeration
//!     serial         serialport adapter
//!     storage        TOML config file
//!       ↓
//! LCD firmware  (newline-terminated ASCII over USB serial)
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lcd_bridge::application::{
    ConnectionManager, HealthMonitor, ReconnectSupervisor, SharedLink,
};
use lcd_bridge::domain::BridgeConfig;
use lcd_bridge::infrastructure::gateway::run_gateway;
use lcd_bridge::infrastructure::locator::UsbPortLocator;
use lcd_bridge::infrastructure::serial::NativeOpener;
use lcd_bridge::infrastructure::storage::config::{load_config, FileConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// TCP-to-serial bridge for a USB-attached LCD display.
///
/// Every option is optional so that values from `--config` show through
/// when a flag is not given.
#[derive(Debug, Parser)]
#[command(
    name = "lcd-bridge",
    about = "Forwards TCP text commands to a USB serial LCD",
    version
)]
struct Cli {
    /// Serial line speed.  Must match the firmware.
    #[arg(long, env = "LCD_BAUD")]
    baud: Option<u32>,

    /// TCP port to accept display commands on.
    #[arg(long = "tcp", env = "LCD_TCP_PORT")]
    tcp_port: Option<u16>,

    /// USB vendor id of the display controller, in hex (e.g. `2341`).
    #[arg(long, env = "LCD_VID")]
    vid: Option<String>,

    /// USB product id of the display controller, in hex (e.g. `0043`).
    #[arg(long, env = "LCD_PID")]
    pid: Option<String>,

    /// IP address to bind the TCP listener to.
    #[arg(long, env = "LCD_BIND")]
    bind: Option<String>,

    /// Optional TOML configuration file.
    #[arg(long, env = "LCD_CONFIG")]
    config: Option<PathBuf>,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, env = "LCD_LOG")]
    log_level: Option<String>,
}

impl Cli {
    /// Overlays the flags that were given onto `file`.
    fn merge_into(self, mut file: FileConfig) -> FileConfig {
        if let Some(baud) = self.baud {
            file.device.baud = baud;
        }
        if let Some(vid) = self.vid {
            file.device.vid = vid;
        }
        if let Some(pid) = self.pid {
            file.device.pid = pid;
        }
        if let Some(port) = self.tcp_port {
            file.server.tcp_port = port;
        }
        if let Some(bind) = self.bind {
            file.server.bind_address = bind;
        }
        if let Some(level) = self.log_level {
            file.logging.level = level;
        }
        file
    }

    /// Loads the config file (if any), applies the flags, and validates.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if
    /// the merged ids or bind address are invalid.
    fn into_bridge_config(self) -> anyhow::Result<BridgeConfig> {
        let file = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => FileConfig::default(),
        };
        self.merge_into(file)
            .into_bridge_config()
            .context("invalid configuration")
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. CLI arguments and the optional config file are merged into a
///    [`BridgeConfig`].
/// 2. `tracing_subscriber` is initialised.  `RUST_LOG` wins; otherwise the
///    configured level is used.
/// 3. The reconnect supervisor is spawned.  Its first tick connects to the
///    device.
/// 4. The health monitor is spawned.
/// 5. A Ctrl+C handler is spawned; it clears a shared `AtomicBool`.
/// 6. [`run_gateway`] waits for the first link, binds, and serves clients
///    until the shutdown flag is cleared.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_bridge_config()?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "lcd-bridge starting: device={}, baud={}, listen={}",
        config.device, config.baud_rate, config.listen_addr
    );

    // ── Link lifecycle ────────────────────────────────────────────────────────
    let timings = config.timings;
    let link = Arc::new(SharedLink::new());
    let manager = Arc::new(ConnectionManager::new(
        Arc::new(UsbPortLocator),
        Arc::new(NativeOpener::new(timings.read_timeout)),
        Arc::clone(&link),
        timings,
        config.listen_addr.port(),
    ));

    ReconnectSupervisor::new(manager, config.attempt(), timings.supervisor_interval).spawn();
    HealthMonitor::new(Arc::clone(&link), timings.monitor_interval).spawn();

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    // ── Request gateway ───────────────────────────────────────────────────────
    run_gateway(config.listen_addr, link, timings.gateway_poll, running).await?;

    info!("lcd-bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use lcd_core::UsbId;
    use std::io::Write;

    #[test]
    fn test_cli_without_flags_yields_defaults() {
        // Arrange: parse with no arguments
        let cli = Cli::parse_from(["lcd-bridge"]);

        // Act
        let config = cli.into_bridge_config().unwrap();

        // Assert
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_cli_tcp_override() {
        let cli = Cli::parse_from(["lcd-bridge", "--tcp", "7777"]);
        let config = cli.into_bridge_config().unwrap();
        assert_eq!(config.listen_addr.port(), 7777);
    }

    #[test]
    fn test_cli_device_override() {
        let cli = Cli::parse_from(["lcd-bridge", "--vid", "1a86", "--pid", "7523", "--baud", "115200"]);

        let config = cli.into_bridge_config().unwrap();

        assert_eq!(config.device, UsbId::new(0x1a86, 0x7523));
        assert_eq!(config.baud_rate, 115_200);
    }

    #[test]
    fn test_cli_bind_override() {
        let cli = Cli::parse_from(["lcd-bridge", "--bind", "127.0.0.1"]);
        let config = cli.into_bridge_config().unwrap();
        assert_eq!(config.listen_addr.to_string(), "127.0.0.1:9999");
    }

    #[test]
    fn test_cli_invalid_vid_returns_error() {
        let cli = Cli::parse_from(["lcd-bridge", "--vid", "arduino"]);
        assert!(cli.into_bridge_config().is_err());
    }

    #[test]
    fn test_cli_invalid_bind_returns_error() {
        let cli = Cli::parse_from(["lcd-bridge", "--bind", "not.an.ip"]);
        assert!(cli.into_bridge_config().is_err());
    }

    #[test]
    fn test_flags_win_over_config_file() {
        // Arrange: file sets port and baud, flag overrides the port only
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\ntcp_port = 8000\n[device]\nbaud = 57600").unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let cli = Cli::parse_from(["lcd-bridge", "--config", path.as_str(), "--tcp", "8001"]);

        // Act
        let config = cli.into_bridge_config().unwrap();

        // Assert
        assert_eq!(config.listen_addr.port(), 8001);
        assert_eq!(config.baud_rate, 57600);
    }

    #[test]
    fn test_missing_config_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let cli = Cli::parse_from(["lcd-bridge", "--config", path.to_str().unwrap()]);

        let config = cli.into_bridge_config().unwrap();

        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_log_level_flag() {
        let cli = Cli::parse_from(["lcd-bridge", "--log-level", "debug"]);
        let config = cli.into_bridge_config().unwrap();
        assert_eq!(config.log_level, "debug");
    }
}
