//! Storage infrastructure: the optional, read-only configuration file.
//!
//! The bridge never writes anything to disk.  The `config` sub-module reads
//! a TOML file if one is given and falls back to defaults when it is absent.

pub mod config;
