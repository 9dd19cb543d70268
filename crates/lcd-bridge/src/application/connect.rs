//! Connection manager: find the device, open it, reset it, publish it.
//!
//! [`ConnectionManager::connect`] is a self-healing loop with no failure
//! arm.  It keeps scanning until the device shows up, keeps retrying until
//! the port opens, and only returns once a handle has been published into
//! the [`SharedLink`].
//!
//! # Sequence
//!
//! ```text
//! locate ──none──► sleep 2 s ──┐
//!   │ ▲                        │
//!   │ └────────────────────────┘
//!   ▼
//! open ──error──► sleep 5 s ──► locate
//!   │
//!   ▼
//! pulse DTR low/high, wait ≤ 5 s for "Ready"   (timeout only warns)
//!   │
//!   ▼
//! publish into SharedLink (prior handle closed)
//!   │
//!   ▼
//! write "x=0&y=0&message=<name>", pause, "x=0&y=1&message=TCP <port>"
//! ```
//!
//! All serial calls run on Tokio's blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lcd_core::{decode_line, is_ready_line, ConnectionAttempt, DisplayCommand, UsbId};
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use super::device::{run_blocking, DeviceHandle, DeviceLocator, DeviceOpener, LinkError};
use super::shared_link::SharedLink;
use crate::domain::LinkTimings;

/// Pause between reads while waiting for the ready marker and nothing is
/// buffered.
const HANDSHAKE_POLL: Duration = Duration::from_millis(20);

/// How the reset handshake ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// The device printed the ready marker.
    Ready,
    /// The window elapsed (or a read failed) first.  The link is used anyway.
    TimedOut,
}

/// Result of one completed connection cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub path: PathBuf,
    pub handshake: HandshakeOutcome,
}

/// Establishes device links and publishes them into a [`SharedLink`].
pub struct ConnectionManager {
    locator: Arc<dyn DeviceLocator>,
    opener: Arc<dyn DeviceOpener>,
    link: Arc<SharedLink>,
    timings: LinkTimings,
    service_port: u16,
}

impl ConnectionManager {
    /// `service_port` is announced on the display after every connect.
    pub fn new(
        locator: Arc<dyn DeviceLocator>,
        opener: Arc<dyn DeviceOpener>,
        link: Arc<SharedLink>,
        timings: LinkTimings,
        service_port: u16,
    ) -> Self {
        Self {
            locator,
            opener,
            link,
            timings,
            service_port,
        }
    }

    pub fn link(&self) -> &Arc<SharedLink> {
        &self.link
    }

    /// Blocks until a link to `attempt.device` is published.  Never fails.
    pub async fn connect(&self, attempt: ConnectionAttempt) -> ConnectOutcome {
        loop {
            let path = self.locate(attempt.device).await;

            let handle = match self.open(&path, attempt.baud_rate).await {
                Ok(handle) => Arc::new(handle),
                Err(e) => {
                    if e.is_retryable() {
                        warn!("{e}; rescanning in {:?}", self.timings.open_retry);
                    } else {
                        error!("{e}; rescanning in {:?}", self.timings.open_retry);
                    }
                    time::sleep(self.timings.open_retry).await;
                    continue;
                }
            };
            info!("opened {} at {} baud", path.display(), attempt.baud_rate);

            let handshake = self.handshake(&handle).await;
            if let Err(e) = handle.mark_ready() {
                warn!("link on {} not marked ready: {e}", path.display());
            }
            self.link.replace(Arc::clone(&handle)).await;
            info!("device link on {} is up", path.display());

            self.announce(&handle).await;
            return ConnectOutcome { path, handshake };
        }
    }

    /// Scans until the device appears.
    async fn locate(&self, device: UsbId) -> PathBuf {
        loop {
            let locator = Arc::clone(&self.locator);
            let found = tokio::task::spawn_blocking(move || locator.locate(device))
                .await
                .unwrap_or_else(|e| {
                    warn!("device scan task failed: {e}");
                    None
                });

            if let Some(path) = found {
                debug!("device {device} found at {}", path.display());
                return path;
            }
            info!(
                "{}; rescanning in {:?}",
                LinkError::NotFound { device },
                self.timings.not_found_retry
            );
            time::sleep(self.timings.not_found_retry).await;
        }
    }

    async fn open(&self, path: &Path, baud_rate: u32) -> Result<DeviceHandle, LinkError> {
        let opener = Arc::clone(&self.opener);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || DeviceHandle::open(opener.as_ref(), &path, baud_rate))
            .await
            .map_err(|e| LinkError::Blocking(e.to_string()))?
    }

    /// Resets the board and waits for it to print the ready marker.
    async fn handshake(&self, handle: &Arc<DeviceHandle>) -> HandshakeOutcome {
        let settle = self.timings.reset_settle;
        if let Err(e) = run_blocking(handle, move |h| h.pulse_reset(settle)).await {
            warn!("could not reset device on {}: {e}", handle.path().display());
        }

        let window = self.timings.handshake_timeout;
        let deadline = Instant::now() + window;
        loop {
            let now = Instant::now();
            if now >= deadline {
                warn!(
                    "{}; continuing without it",
                    LinkError::HandshakeTimeout { waited: window }
                );
                return HandshakeOutcome::TimedOut;
            }

            match run_blocking(handle, |h| h.read_line_if_waiting()).await {
                Ok(Some(raw)) => {
                    let line = decode_line(&raw);
                    if !line.is_empty() {
                        debug!("handshake: {line}");
                    }
                    if is_ready_line(&line) {
                        info!("device on {} reports ready", handle.path().display());
                        return HandshakeOutcome::Ready;
                    }
                }
                Ok(None) => time::sleep(HANDSHAKE_POLL.min(deadline - now)).await,
                Err(e) => {
                    warn!("handshake read failed: {e}; continuing without ready marker");
                    return HandshakeOutcome::TimedOut;
                }
            }
        }
    }

    /// Writes the device name and service port to the display.  Best effort.
    async fn announce(&self, handle: &Arc<DeviceHandle>) {
        let label = handle
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| handle.path().display().to_string());

        let directives = [
            DisplayCommand::device_label(label),
            DisplayCommand::service_port(self.service_port),
        ];
        for (i, directive) in directives.into_iter().enumerate() {
            if i > 0 {
                time::sleep(self.timings.init_gap).await;
            }
            let bytes = directive.encode();
            match run_blocking(handle, move |h| h.write_all(&bytes)).await {
                Ok(()) => debug!("sent init directive `{directive}`"),
                Err(e) => warn!("init directive `{directive}` not sent: {e}"),
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
