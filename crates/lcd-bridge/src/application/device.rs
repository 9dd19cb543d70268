//! Device handle and the ports the application layer needs from the OS.
//!
//! The application layer never talks to `serialport` directly.  It depends
//! on three small traits whose implementations live in the infrastructure
//! layer:
//!
//! - [`DeviceLocator`] – "which path is the device with this USB id?"
//! - [`DeviceOpener`] – "open this path at this baud rate".
//! - [`SerialReader`] / [`SerialWriter`] – the two halves of an open port.
//!
//! # Why two halves?
//!
//! The health monitor reads from the device while TCP clients write to it.
//! Keeping the read half and the write half behind separate locks means a
//! slow read (bounded by the port's read timeout) never delays a client
//! command, and two client commands can never interleave their bytes.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::Duration;

use lcd_core::{LinkState, StateError, UsbId};
use thiserror::Error;
use tracing::debug;

/// Error type for everything that can go wrong on the serial link.
///
/// Every variant is recoverable: the connection manager retries, the
/// supervisor reconnects, and the request path drops the message.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("no device matching {device} is attached")]
    NotFound { device: UsbId },

    #[error("could not open serial port {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("serial I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("device handle is closed")]
    Closed,

    #[error("no ready marker within {waited:?}")]
    HandshakeTimeout { waited: Duration },

    #[error(transparent)]
    State(#[from] StateError),

    #[error("blocking serial task failed: {0}")]
    Blocking(String),
}

impl LinkError {
    /// Whether the condition can be retried.  Always `true`: the bridge has
    /// no terminal link errors and runs unattended.
    pub fn is_retryable(&self) -> bool {
        true
    }
}

/// Read half of an open serial port.
pub trait SerialReader: Send {
    /// Number of bytes that can be read without blocking.
    fn bytes_waiting(&mut self) -> io::Result<u32>;

    /// Reads up to and including the next `\n`.
    ///
    /// When the port's read timeout expires first, returns whatever arrived
    /// so far (possibly nothing) instead of an error.
    fn read_line(&mut self) -> io::Result<Vec<u8>>;
}

/// Write half of an open serial port, including its modem control lines.
pub trait SerialWriter: Send {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Drives the data-terminal-ready line, which resets most Arduino-class
    /// boards on a falling-then-rising edge.
    fn set_reset_line(&mut self, asserted: bool) -> io::Result<()>;
}

/// Both halves of a freshly opened port.
pub struct SerialChannels {
    pub reader: Box<dyn SerialReader>,
    pub writer: Box<dyn SerialWriter>,
}

/// Finds the device node for a USB vendor/product pair.
///
/// One scan per call, no caching, no retry.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceLocator: Send + Sync {
    fn locate(&self, device: UsbId) -> Option<PathBuf>;
}

/// Opens a serial port.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceOpener: Send + Sync {
    /// # Errors
    ///
    /// Returns [`LinkError::OpenFailed`] if the OS refuses the open.
    fn open(&self, path: &Path, baud_rate: u32) -> Result<SerialChannels, LinkError>;
}

// ── Device handle ─────────────────────────────────────────────────────────────

/// An open serial connection to the display.
///
/// The handle is shared as `Arc<DeviceHandle>` between the shared link, the
/// health monitor and client tasks.  All methods take `&self` and block, so
/// async callers go through [`run_blocking`].
///
/// Closing never waits for I/O in progress.  Idle halves are dropped at
/// once; a half that is busy is dropped by the call using it as soon as that
/// call returns.  Every later I/O call returns [`LinkError::Closed`].
pub struct DeviceHandle {
    path: PathBuf,
    baud_rate: u32,
    state: Mutex<LinkState>,
    reader: Mutex<Option<Box<dyn SerialReader>>>,
    writer: Mutex<Option<Box<dyn SerialWriter>>>,
}

impl DeviceHandle {
    /// Opens `path` through `opener`.  The new handle is in
    /// [`LinkState::Opening`] until [`DeviceHandle::mark_ready`] is called.
    ///
    /// # Errors
    ///
    /// Propagates the opener's [`LinkError`].
    pub fn open(
        opener: &dyn DeviceOpener,
        path: &Path,
        baud_rate: u32,
    ) -> Result<Self, LinkError> {
        let channels = opener.open(path, baud_rate)?;
        let state = LinkState::Closed.transition(LinkState::Opening)?;
        Ok(Self {
            path: path.to_path_buf(),
            baud_rate,
            state: Mutex::new(state),
            reader: Mutex::new(Some(channels.reader)),
            writer: Mutex::new(Some(channels.writer)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn state(&self) -> LinkState {
        *lock(&self.state)
    }

    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// Opening → Ready.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the handle is not in `Opening`.
    pub fn mark_ready(&self) -> Result<(), StateError> {
        let mut state = lock(&self.state);
        *state = state.transition(LinkState::Ready)?;
        Ok(())
    }

    /// Marks the handle closed and releases whichever halves are idle.
    /// Idempotent and non-blocking.
    pub fn close(&self) {
        {
            let mut state = lock(&self.state);
            if *state == LinkState::Closed {
                return;
            }
            *state = LinkState::Closed;
        }

        release_if_idle(&self.writer);
        release_if_idle(&self.reader);
        debug!("closed serial port {}", self.path.display());
    }

    /// Pulses the reset line low for `settle`, then high again.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Io`] if a control line cannot be driven.
    pub fn pulse_reset(&self, settle: Duration) -> Result<(), LinkError> {
        self.with_writer(|w| w.set_reset_line(false))?;
        std::thread::sleep(settle);
        self.with_writer(|w| w.set_reset_line(true))
    }

    /// Writes `bytes` in full.  Concurrent writers are serialized.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Closed`] after [`close`](Self::close) and
    /// [`LinkError::Io`] for OS write failures.
    pub fn write_all(&self, bytes: &[u8]) -> Result<(), LinkError> {
        self.with_writer(|w| w.write_all(bytes))
    }

    /// Reads one line if the device has output pending, `None` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Closed`] after [`close`](Self::close) and
    /// [`LinkError::Io`] for OS read failures.
    pub fn read_line_if_waiting(&self) -> Result<Option<Vec<u8>>, LinkError> {
        let result = self.with_half(&self.reader, |reader| {
            if reader.bytes_waiting()? == 0 {
                return Ok(None);
            }
            reader.read_line().map(Some)
        });
        self.release_if_closed(&self.reader);
        result
    }

    fn with_writer(
        &self,
        f: impl FnOnce(&mut dyn SerialWriter) -> io::Result<()>,
    ) -> Result<(), LinkError> {
        let result = self.with_half(&self.writer, |writer| f(writer.as_mut()));
        self.release_if_closed(&self.writer);
        result
    }

    /// Runs `f` on the half in `slot`, or fails with [`LinkError::Closed`]
    /// once the handle has been closed.
    fn with_half<H, T>(
        &self,
        slot: &Mutex<Option<H>>,
        f: impl FnOnce(&mut H) -> io::Result<T>,
    ) -> Result<T, LinkError> {
        let mut guard = lock(slot);
        if !self.is_open() {
            guard.take();
            return Err(LinkError::Closed);
        }
        let half = guard.as_mut().ok_or(LinkError::Closed)?;
        f(half).map_err(LinkError::from)
    }

    /// Drops a half that [`close`](Self::close) found busy.
    fn release_if_closed<H>(&self, slot: &Mutex<Option<H>>) {
        if !self.is_open() {
            release_if_idle(slot);
        }
    }
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("path", &self.path)
            .field("baud_rate", &self.baud_rate)
            .field("state", &self.state())
            .finish()
    }
}

/// Runs a blocking closure against `handle` on Tokio's blocking pool.
///
/// # Errors
///
/// Returns the closure's error, or [`LinkError::Blocking`] if the blocking
/// task panicked.
pub async fn run_blocking<T, F>(handle: &Arc<DeviceHandle>, f: F) -> Result<T, LinkError>
where
    T: Send + 'static,
    F: FnOnce(&DeviceHandle) -> Result<T, LinkError> + Send + 'static,
{
    let handle = Arc::clone(handle);
    tokio::task::spawn_blocking(move || f(&handle))
        .await
        .map_err(|e| LinkError::Blocking(e.to_string()))?
}

/// Locks `m`, recovering the data if a previous holder panicked.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Empties `slot` unless another call is using it right now.
fn release_if_idle<H>(slot: &Mutex<Option<H>>) {
    match slot.try_lock() {
        Ok(mut guard) => drop(guard.take()),
        Err(TryLockError::Poisoned(poisoned)) => drop(poisoned.into_inner().take()),
        Err(TryLockError::WouldBlock) => {}
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
