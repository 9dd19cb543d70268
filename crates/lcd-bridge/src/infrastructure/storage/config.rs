//! TOML configuration file for the bridge.
//!
//! The file is optional.  Every field has a default, so a partial file (or
//! none at all) is fine:
//!
//! ```toml
//! [device]
//! vid = "2341"
//! pid = "0043"
//! baud = 9600
//!
//! [server]
//! tcp_port = 9999
//! bind_address = "0.0.0.0"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Command-line flags and `LCD_*` environment variables are applied on top
//! of this file in `main.rs`; [`FileConfig::into_bridge_config`] then
//! validates the merged values.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use lcd_core::{DeviceIdError, UsbId};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::domain::{BridgeConfig, LinkTimings};

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error other than "not found".
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid device id: {0}")]
    Device(#[from] DeviceIdError),

    #[error("invalid bind address {value:?}")]
    BindAddress { value: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Which device to look for and how to talk to it.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// USB vendor id, four hex digits.
    #[serde(default = "default_vid")]
    pub vid: String,
    /// USB product id, four hex digits.
    #[serde(default = "default_pid")]
    pub pid: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,
    /// `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingSection {
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_vid() -> String {
    "2341".to_string()
}
fn default_pid() -> String {
    "0043".to_string()
}
fn default_baud() -> u32 {
    9600
}
fn default_tcp_port() -> u16 {
    9999
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            vid: default_vid(),
            pid: default_pid(),
            baud: default_baud(),
        }
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            tcp_port: default_tcp_port(),
            bind_address: default_bind_address(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl FileConfig {
    /// Validates the ids and bind address and produces the runtime config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Device`] for a malformed vid/pid and
    /// [`ConfigError::BindAddress`] for an unparsable bind address.
    pub fn into_bridge_config(self) -> Result<BridgeConfig, ConfigError> {
        let device = UsbId::from_hex(&self.device.vid, &self.device.pid)?;
        let ip: IpAddr = self
            .server
            .bind_address
            .parse()
            .map_err(|_| ConfigError::BindAddress {
                value: self.server.bind_address.clone(),
            })?;

        Ok(BridgeConfig {
            device,
            baud_rate: self.device.baud,
            listen_addr: SocketAddr::new(ip, self.server.tcp_port),
            log_level: self.logging.level,
            timings: LinkTimings::default(),
        })
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Loads `path`, returning [`FileConfig::default`] if it does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("no config file at {}; using defaults", path.display());
            Ok(FileConfig::default())
        }
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
