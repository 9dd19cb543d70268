//! Infrastructure layer for lcd-bridge.
//!
//! Contains OS-facing adapters: serial ports, USB enumeration, the TCP
//! gateway, and the configuration file.
//!
//! **Dependency rule**: this layer may depend on `application`, `domain` and
//! `lcd_core`, but MUST NOT be imported by the `application` or `domain`
//! layers outside of tests.

pub mod gateway;
pub mod locator;
pub mod serial;
pub mod storage;
