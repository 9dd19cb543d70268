//! Device output monitor.
//!
//! Polls the current handle and logs whatever the firmware prints.  It only
//! reads: it never closes, replaces or clears the link, even when a read
//! fails.  Spotting a dead device is the supervisor's job.

use std::sync::Arc;
use std::time::Duration;

use lcd_core::decode_line;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{error, info};

use super::device::run_blocking;
use super::shared_link::SharedLink;

pub struct HealthMonitor {
    link: Arc<SharedLink>,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(link: Arc<SharedLink>, interval: Duration) -> Self {
        Self { link, interval }
    }

    /// Reads and logs at most one line.  Returns the decoded line, if any.
    pub async fn poll_once(&self) -> Option<String> {
        let handle = self.link.current_open().await?;

        match run_blocking(&handle, |h| h.read_line_if_waiting()).await {
            Ok(Some(raw)) => {
                let line = decode_line(&raw);
                if line.is_empty() {
                    return None;
                }
                info!(target: "device", "{line}");
                Some(line)
            }
            Ok(None) => None,
            Err(e) => {
                error!("reading from {}: {e}", handle.path().display());
                None
            }
        }
    }

    pub async fn run(self) {
        loop {
            self.poll_once().await;
            time::sleep(self.interval).await;
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
