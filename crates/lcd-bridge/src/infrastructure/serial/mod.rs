//! Serial port adapters.
//!
//! - **`native`** – Real ports through the `serialport` crate.
//! - **`mock`**   – In-memory device for unit and integration tests.

pub mod mock;
pub mod native;

pub use native::NativeOpener;
