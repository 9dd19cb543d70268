//! In-memory serial device for tests.
//!
//! [`MockSerialDevice`] stands in for the display's microcontroller: it
//! records every write and reset-line change, replays scripted output lines,
//! and can be told to fail reads or writes.  Clones share the same state, so
//! a test keeps one clone for assertions while the handle owns another.
//!
//! [`MockPortOpener`] and [`MockPortLocator`] complete the picture for
//! connection-manager and supervisor tests.

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lcd_core::UsbId;

use crate::application::device::{
    DeviceLocator, DeviceOpener, LinkError, SerialChannels, SerialReader, SerialWriter,
};

#[derive(Debug, Default)]
struct DeviceState {
    writes: Mutex<Vec<Vec<u8>>>,
    reset_levels: Mutex<Vec<bool>>,
    pending: Mutex<VecDeque<Vec<u8>>>,
    boot_lines: Mutex<Vec<String>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    write_delay: Mutex<Duration>,
    writes_in_flight: AtomicUsize,
    open_halves: AtomicUsize,
}

/// Recording fake of the display firmware.
#[derive(Debug, Clone, Default)]
pub struct MockSerialDevice {
    state: Arc<DeviceState>,
}

impl MockSerialDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device that prints `lines` every time its reset line is raised,
    /// the way the firmware reboots on a DTR edge.
    pub fn with_boot_lines(lines: &[&str]) -> Self {
        let device = Self::new();
        *device.state.boot_lines.lock().expect("lock poisoned") =
            lines.iter().map(|l| l.to_string()).collect();
        device
    }

    /// Queues one line of device output.  A trailing `\n` is added.
    pub fn push_line(&self, line: &str) {
        let mut raw = line.as_bytes().to_vec();
        raw.push(b'\n');
        self.push_raw(&raw);
    }

    /// Queues `bytes` as one read, exactly as given.
    pub fn push_raw(&self, bytes: &[u8]) {
        self.state
            .pending
            .lock()
            .expect("lock poisoned")
            .push_back(bytes.to_vec());
    }

    /// Every successful write, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.writes.lock().expect("lock poisoned").clone()
    }

    /// Every successful write decoded as text, in order.
    pub fn written_text(&self) -> Vec<String> {
        self.writes()
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }

    /// Reset line levels in the order they were driven.
    pub fn reset_levels(&self) -> Vec<bool> {
        self.state.reset_levels.lock().expect("lock poisoned").clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every later write take `delay` before it completes.
    pub fn set_write_delay(&self, delay: Duration) {
        *self.state.write_delay.lock().expect("lock poisoned") = delay;
    }

    /// Writes that have started but not yet returned.
    pub fn writes_in_flight(&self) -> usize {
        self.state.writes_in_flight.load(Ordering::SeqCst)
    }

    /// Reader and writer halves handed out and not yet dropped.
    pub fn open_halves(&self) -> usize {
        self.state.open_halves.load(Ordering::SeqCst)
    }

    /// Fresh reader/writer halves sharing this device's state.
    pub fn channels(&self) -> SerialChannels {
        self.state.open_halves.fetch_add(2, Ordering::SeqCst);
        SerialChannels {
            reader: Box::new(MockReader {
                state: Arc::clone(&self.state),
            }),
            writer: Box::new(MockWriter {
                state: Arc::clone(&self.state),
            }),
        }
    }
}

struct MockReader {
    state: Arc<DeviceState>,
}

impl SerialReader for MockReader {
    fn bytes_waiting(&mut self) -> io::Result<u32> {
        if self.state.fail_reads.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        let pending = self.state.pending.lock().expect("lock poisoned");
        Ok(pending.iter().map(|l| l.len() as u32).sum())
    }

    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        if self.state.fail_reads.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        // An empty queue behaves like an expired read timeout.
        Ok(self
            .state
            .pending
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or_default())
    }
}

impl Drop for MockReader {
    fn drop(&mut self) {
        self.state.open_halves.fetch_sub(1, Ordering::SeqCst);
    }
}

struct MockWriter {
    state: Arc<DeviceState>,
}

impl SerialWriter for MockWriter {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.state.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        self.state.writes_in_flight.fetch_add(1, Ordering::SeqCst);
        let delay = *self.state.write_delay.lock().expect("lock poisoned");
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.state
            .writes
            .lock()
            .expect("lock poisoned")
            .push(bytes.to_vec());
        self.state.writes_in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_reset_line(&mut self, asserted: bool) -> io::Result<()> {
        self.state
            .reset_levels
            .lock()
            .expect("lock poisoned")
            .push(asserted);
        if asserted {
            let boot = self.state.boot_lines.lock().expect("lock poisoned").clone();
            let mut pending = self.state.pending.lock().expect("lock poisoned");
            for line in boot {
                let mut raw = line.into_bytes();
                raw.push(b'\n');
                pending.push_back(raw);
            }
        }
        Ok(())
    }
}

impl Drop for MockWriter {
    fn drop(&mut self) {
        self.state.open_halves.fetch_sub(1, Ordering::SeqCst);
    }
}

// ── Opener ────────────────────────────────────────────────────────────────────

/// [`DeviceOpener`] that hands out channels to one [`MockSerialDevice`].
#[derive(Debug)]
pub struct MockPortOpener {
    device: MockSerialDevice,
    failures_left: AtomicU32,
    opened: Mutex<Vec<PathBuf>>,
}

impl MockPortOpener {
    pub fn new(device: MockSerialDevice) -> Self {
        Self::failing_first(device, 0)
    }

    /// Refuses the first `failures` opens with [`LinkError::OpenFailed`].
    pub fn failing_first(device: MockSerialDevice, failures: u32) -> Self {
        Self {
            device,
            failures_left: AtomicU32::new(failures),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Paths of every successful open, in order.
    pub fn opened_paths(&self) -> Vec<PathBuf> {
        self.opened.lock().expect("lock poisoned").clone()
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().expect("lock poisoned").len()
    }
}

impl DeviceOpener for MockPortOpener {
    fn open(&self, path: &Path, _baud_rate: u32) -> Result<SerialChannels, LinkError> {
        let refused = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(LinkError::OpenFailed {
                path: path.to_path_buf(),
                reason: "device busy".to_string(),
            });
        }
        self.opened
            .lock()
            .expect("lock poisoned")
            .push(path.to_path_buf());
        Ok(self.device.channels())
    }
}

// ── Locator ───────────────────────────────────────────────────────────────────

/// [`DeviceLocator`] with scripted answers.
///
/// Scripted results are returned first, one per scan; afterwards every scan
/// returns the fallback, which tests may change at any time.
#[derive(Debug, Default)]
pub struct MockPortLocator {
    scripted: Mutex<VecDeque<Option<PathBuf>>>,
    fallback: Mutex<Option<PathBuf>>,
    scans: AtomicUsize,
}

impl MockPortLocator {
    /// Never finds anything.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Always finds `path`.
    pub fn always(path: impl Into<PathBuf>) -> Self {
        let locator = Self::default();
        locator.set_fallback(Some(path.into()));
        locator
    }

    /// Returns `script` in order, then `fallback` forever.
    pub fn scripted(script: Vec<Option<PathBuf>>, fallback: Option<PathBuf>) -> Self {
        let locator = Self::default();
        *locator.scripted.lock().expect("lock poisoned") = script.into();
        locator.set_fallback(fallback);
        locator
    }

    pub fn set_fallback(&self, path: Option<PathBuf>) {
        *self.fallback.lock().expect("lock poisoned") = path;
    }

    /// Number of scans performed so far.
    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

impl DeviceLocator for MockPortLocator {
    fn locate(&self, _device: UsbId) -> Option<PathBuf> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.scripted.lock().expect("lock poisoned").pop_front() {
            return next;
        }
        self.fallback.lock().expect("lock poisoned").clone()
    }
}
