//! The single holder of the active device handle.
//!
//! Every component that touches the serial link goes through [`SharedLink`]:
//! the connection manager publishes into it, the supervisor inspects and
//! evicts, the health monitor and request handlers copy the handle out.
//!
//! The lock only ever guards the slot itself.  Callers clone the
//! `Arc<DeviceHandle>` out and release the guard before doing any I/O, so a
//! slow serial write never holds up an inspection.
//!
//! The path is read from the handle, so a reader can never observe a handle
//! paired with someone else's path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time;
use tracing::{debug, info};

use super::device::DeviceHandle;

/// Verdict of one supervisor inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkHealth {
    /// A handle is present, open, and its device node still exists.
    Healthy,
    /// No handle has been published (or it was cleared).
    Missing,
    /// A handle is present but reports itself closed.
    Closed,
    /// The device node vanished; the handle was closed and evicted.
    Stale,
}

impl LinkHealth {
    pub fn needs_reconnect(self) -> bool {
        !matches!(self, LinkHealth::Healthy)
    }
}

/// Mutex-guarded slot for the current device handle.
#[derive(Debug, Default)]
pub struct SharedLink {
    slot: Mutex<Option<Arc<DeviceHandle>>>,
    changed: Notify,
}

impl SharedLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current handle, open or not.
    pub async fn get(&self) -> Option<Arc<DeviceHandle>> {
        self.slot.lock().await.clone()
    }

    /// The current handle if it is open.
    pub async fn current_open(&self) -> Option<Arc<DeviceHandle>> {
        self.slot.lock().await.clone().filter(|h| h.is_open())
    }

    /// Path of the current handle.
    pub async fn current_path(&self) -> Option<PathBuf> {
        self.slot
            .lock()
            .await
            .as_ref()
            .map(|h| h.path().to_path_buf())
    }

    /// Publishes `handle`, closing whatever was there before.
    pub async fn replace(&self, handle: Arc<DeviceHandle>) {
        let prior = {
            let mut slot = self.slot.lock().await;
            slot.replace(handle)
        };
        self.changed.notify_waiters();

        if let Some(prior) = prior {
            debug!("replacing link on {}", prior.path().display());
            prior.close();
        }
    }

    /// Empties the slot and closes the evicted handle.
    pub async fn clear(&self) -> Option<Arc<DeviceHandle>> {
        let prior = self.slot.lock().await.take();
        self.changed.notify_waiters();
        if let Some(prior) = &prior {
            prior.close();
        }
        prior
    }

    /// Inspects the slot under the lock.
    ///
    /// `path_exists` is called with the lock held and must return quickly.
    /// A handle whose path no longer exists is removed from the slot and
    /// closed after the lock is released.
    pub async fn assess(&self, path_exists: impl Fn(&Path) -> bool) -> LinkHealth {
        let (health, evicted) = {
            let mut slot = self.slot.lock().await;
            match slot.as_ref() {
                None => (LinkHealth::Missing, None),
                Some(h) if !h.is_open() => (LinkHealth::Closed, None),
                Some(h) if !path_exists(h.path()) => (LinkHealth::Stale, slot.take()),
                Some(_) => (LinkHealth::Healthy, None),
            }
        };

        if let Some(stale) = evicted {
            info!(
                "device path {} disappeared; closing stale link",
                stale.path().display()
            );
            stale.close();
            self.changed.notify_waiters();
        }
        health
    }

    /// Resolves once an open handle is present.
    ///
    /// Wakes on every publish, and re-checks every `poll` regardless.
    pub async fn wait_until_open(&self, poll: Duration) -> Arc<DeviceHandle> {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(handle) = self.current_open().await {
                return handle;
            }

            tokio::select! {
                _ = notified => {}
                _ = time::sleep(poll) => {}
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::device::run_blocking;
    use crate::infrastructure::serial::mock::{MockPortOpener, MockSerialDevice};

    fn handle_on(path: &str, device: &MockSerialDevice) -> Arc<DeviceHandle> {
        let opener = MockPortOpener::new(device.clone());
        let handle = DeviceHandle::open(&opener, Path::new(path), 9600).unwrap();
        handle.mark_ready().unwrap();
        Arc::new(handle)
    }

    #[tokio::test]
    async fn test_new_link_is_empty() {
        let link = SharedLink::new();
        assert!(link.get().await.is_none());
        assert!(link.current_path().await.is_none());
    }

    #[tokio::test]
    async fn test_replace_publishes_handle_and_path() {
        // Arrange
        let link = SharedLink::new();
        let handle = handle_on("/dev/ttyACM0", &MockSerialDevice::new());

        // Act
        link.replace(Arc::clone(&handle)).await;

        // Assert
        let current = link.current_open().await.unwrap();
        assert!(Arc::ptr_eq(&current, &handle));
        assert_eq!(
            link.current_path().await,
            Some(PathBuf::from("/dev/ttyACM0"))
        );
    }

    #[tokio::test]
    async fn test_replace_closes_prior_handle() {
        // Arrange
        let link = SharedLink::new();
        let first = handle_on("/dev/ttyACM0", &MockSerialDevice::new());
        let second = handle_on("/dev/ttyACM1", &MockSerialDevice::new());
        link.replace(Arc::clone(&first)).await;

        // Act
        link.replace(Arc::clone(&second)).await;

        // Assert
        assert!(!first.is_open());
        assert!(second.is_open());
        assert_eq!(
            link.current_path().await,
            Some(PathBuf::from("/dev/ttyACM1"))
        );
    }

    #[tokio::test]
    async fn test_current_open_skips_closed_handle() {
        let link = SharedLink::new();
        let handle = handle_on("/dev/ttyACM0", &MockSerialDevice::new());
        link.replace(Arc::clone(&handle)).await;

        handle.close();

        assert!(link.current_open().await.is_none());
        assert!(link.get().await.is_some());
    }

    #[tokio::test]
    async fn test_clear_closes_and_empties() {
        let link = SharedLink::new();
        let handle = handle_on("/dev/ttyACM0", &MockSerialDevice::new());
        link.replace(Arc::clone(&handle)).await;

        let evicted = link.clear().await;

        assert!(evicted.is_some());
        assert!(!handle.is_open());
        assert!(link.get().await.is_none());
    }

    #[tokio::test]
    async fn test_clear_does_not_wait_for_in_flight_write() {
        // Arrange: a 500 ms write is running on the blocking pool
        let device = MockSerialDevice::new();
        device.set_write_delay(Duration::from_millis(500));
        let link = SharedLink::new();
        let handle = handle_on("/dev/ttyACM0", &device);
        link.replace(Arc::clone(&handle)).await;
        let slow_write = {
            let handle = Arc::clone(&handle);
            tokio::spawn(async move { run_blocking(&handle, |h| h.write_all(b"slow\n")).await })
        };
        while device.writes_in_flight() == 0 {
            time::sleep(Duration::from_millis(1)).await;
        }

        // Act
        let started = std::time::Instant::now();
        link.clear().await;
        let elapsed = started.elapsed();

        // Assert
        assert!(elapsed < Duration::from_millis(100), "clear blocked for {elapsed:?}");
        assert!(!handle.is_open());
        slow_write.await.unwrap().unwrap();
        assert_eq!(device.writes(), vec![b"slow\n".to_vec()]);
        assert_eq!(device.open_halves(), 0);
    }

    #[tokio::test]
    async fn test_assess_reports_each_verdict() {
        let link = SharedLink::new();
        assert_eq!(link.assess(|_| true).await, LinkHealth::Missing);

        let handle = handle_on("/dev/ttyACM0", &MockSerialDevice::new());
        link.replace(Arc::clone(&handle)).await;
        assert_eq!(link.assess(|_| true).await, LinkHealth::Healthy);

        handle.close();
        assert_eq!(link.assess(|_| true).await, LinkHealth::Closed);
    }

    #[tokio::test]
    async fn test_assess_evicts_stale_handle() {
        // Arrange
        let link = SharedLink::new();
        let handle = handle_on("/dev/ttyACM0", &MockSerialDevice::new());
        link.replace(Arc::clone(&handle)).await;

        // Act
        let health = link.assess(|_| false).await;

        // Assert
        assert_eq!(health, LinkHealth::Stale);
        assert!(health.needs_reconnect());
        assert!(!handle.is_open());
        assert!(link.get().await.is_none());
    }

    #[tokio::test]
    async fn test_wait_until_open_wakes_on_publish() {
        // Arrange
        let link = Arc::new(SharedLink::new());
        let waiter = {
            let link = Arc::clone(&link);
            tokio::spawn(async move { link.wait_until_open(Duration::from_secs(60)).await })
        };
        tokio::task::yield_now().await;

        // Act
        let handle = handle_on("/dev/ttyACM0", &MockSerialDevice::new());
        link.replace(Arc::clone(&handle)).await;

        // Assert: the 60 s poll never fires, so only the notification can finish this
        let got = time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter should wake on publish")
            .unwrap();
        assert!(Arc::ptr_eq(&got, &handle));
    }

    #[tokio::test]
    async fn test_wait_until_open_returns_immediately_when_open() {
        let link = SharedLink::new();
        let handle = handle_on("/dev/ttyACM0", &MockSerialDevice::new());
        link.replace(Arc::clone(&handle)).await;

        let got = time::timeout(
            Duration::from_millis(200),
            link.wait_until_open(Duration::from_secs(60)),
        )
        .await;

        assert!(got.is_ok());
    }
}
