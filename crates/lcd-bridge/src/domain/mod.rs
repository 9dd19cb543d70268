//! Domain layer for lcd-bridge.
//!
//! Pure configuration types with no I/O.  The infrastructure layer fills
//! them in from the command line and the optional TOML file; the application
//! layer only ever reads them.

pub mod config;

pub use config::{BridgeConfig, LinkTimings};
