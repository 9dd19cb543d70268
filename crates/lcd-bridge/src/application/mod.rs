//! Application layer for lcd-bridge.
//!
//! The link lifecycle lives here, written against the traits in [`device`]
//! so none of it needs a real serial port to run:
//!
//! - **`shared_link`** – The single slot holding the active device handle.
//!   Everything else reads or replaces it through short lock sections.
//!
//! - **`connect`** – Locate, open, reset-handshake, publish, announce.
//!   Retries forever; never returns an error.
//!
//! - **`supervisor`** – Periodic health check that evicts stale handles and
//!   reconnects.
//!
//! - **`health`** – Logs whatever the firmware prints.  Read-only.
//!
//! - **`forward`** – Writes one client command to the current device.

pub mod connect;
pub mod device;
pub mod forward;
pub mod health;
pub mod shared_link;
pub mod supervisor;

pub use connect::{ConnectOutcome, ConnectionManager, HandshakeOutcome};
pub use device::{DeviceHandle, DeviceLocator, DeviceOpener, LinkError};
pub use forward::{forward_request, ForwardOutcome};
pub use health::HealthMonitor;
pub use shared_link::{LinkHealth, SharedLink};
pub use supervisor::ReconnectSupervisor;
