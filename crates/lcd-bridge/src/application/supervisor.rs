//! Periodic link-liveness check with automatic reconnect.
//!
//! Every tick the supervisor asks the [`SharedLink`] whether the current
//! handle is still usable.  A missing handle, a closed handle, or a device
//! node that vanished from the filesystem (USB unplug) all trigger a fresh
//! [`ConnectionManager::connect`] cycle.  The first tick runs immediately,
//! which is how the process makes its initial connection.

use std::path::Path;
use std::sync::Arc;

use lcd_core::ConnectionAttempt;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info};

use super::connect::ConnectionManager;
use super::shared_link::LinkHealth;

/// Keeps the device link alive for the lifetime of the process.
pub struct ReconnectSupervisor {
    manager: Arc<ConnectionManager>,
    attempt: ConnectionAttempt,
    interval: std::time::Duration,
}

impl ReconnectSupervisor {
    pub fn new(
        manager: Arc<ConnectionManager>,
        attempt: ConnectionAttempt,
        interval: std::time::Duration,
    ) -> Self {
        Self {
            manager,
            attempt,
            interval,
        }
    }

    /// Inspects the link once.  A stale handle is evicted here.
    pub async fn check_once(&self) -> LinkHealth {
        self.manager.link().assess(path_exists).await
    }

    /// One full tick: check, and reconnect if needed.
    pub async fn tick(&self) -> LinkHealth {
        let health = self.check_once().await;
        if health.needs_reconnect() {
            info!("device link {health:?}; reconnecting");
            let outcome = self.manager.connect(self.attempt).await;
            debug!(
                "reconnected on {} ({:?})",
                outcome.path.display(),
                outcome.handshake
            );
        }
        health
    }

    /// Runs forever: tick, then sleep one interval.
    pub async fn run(self) {
        loop {
            self.tick().await;
            time::sleep(self.interval).await;
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

/// A single `stat` of the device node.  Never retries.
fn path_exists(path: &Path) -> bool {
    path.exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::device::{DeviceLocator, DeviceOpener};
    use crate::application::shared_link::SharedLink;
    use crate::domain::LinkTimings;
    use crate::infrastructure::serial::mock::{MockPortLocator, MockPortOpener, MockSerialDevice};
    use lcd_core::UsbId;
    use std::time::Duration;

    fn timings() -> LinkTimings {
        LinkTimings {
            not_found_retry: Duration::from_millis(5),
            open_retry: Duration::from_millis(5),
            supervisor_interval: Duration::from_millis(20),
            monitor_interval: Duration::from_millis(5),
            gateway_poll: Duration::from_millis(10),
            handshake_timeout: Duration::from_millis(30),
            reset_settle: Duration::from_millis(1),
            init_gap: Duration::from_millis(1),
            read_timeout: Duration::from_millis(10),
        }
    }

    fn supervisor(locator: Arc<MockPortLocator>) -> (ReconnectSupervisor, Arc<SharedLink>) {
        let link = Arc::new(SharedLink::new());
        let opener = Arc::new(MockPortOpener::new(MockSerialDevice::with_boot_lines(&["Ready"])));
        let manager = Arc::new(ConnectionManager::new(
            locator as Arc<dyn DeviceLocator>,
            opener as Arc<dyn DeviceOpener>,
            Arc::clone(&link),
            timings(),
            9999,
        ));
        let attempt = ConnectionAttempt::new(UsbId::new(0x2341, 0x0043), 9600);
        (
            ReconnectSupervisor::new(manager, attempt, timings().supervisor_interval),
            link,
        )
    }

    #[tokio::test]
    async fn test_first_tick_connects_when_link_missing() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let dev = dir.path().join("ttyACM0");
        std::fs::write(&dev, b"").unwrap();
        let (sup, link) = supervisor(Arc::new(MockPortLocator::always(&dev)));

        // Act
        let health = sup.tick().await;

        // Assert
        assert_eq!(health, LinkHealth::Missing);
        assert_eq!(link.current_path().await, Some(dev));
    }

    #[tokio::test]
    async fn test_tick_leaves_healthy_link_alone() {
        let dir = tempfile::tempdir().unwrap();
        let dev = dir.path().join("ttyACM0");
        std::fs::write(&dev, b"").unwrap();
        let locator = Arc::new(MockPortLocator::always(&dev));
        let (sup, link) = supervisor(Arc::clone(&locator));
        sup.tick().await;
        let first = link.get().await.unwrap();

        let health = sup.tick().await;

        assert_eq!(health, LinkHealth::Healthy);
        assert_eq!(locator.scans(), 1);
        assert!(Arc::ptr_eq(&first, &link.get().await.unwrap()));
    }

    #[tokio::test]
    async fn test_check_once_evicts_when_device_node_removed() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let dev = dir.path().join("ttyACM0");
        std::fs::write(&dev, b"").unwrap();
        let (sup, link) = supervisor(Arc::new(MockPortLocator::always(&dev)));
        sup.tick().await;
        let handle = link.get().await.unwrap();

        // Act
        std::fs::remove_file(&dev).unwrap();
        let health = sup.check_once().await;

        // Assert
        assert_eq!(health, LinkHealth::Stale);
        assert!(!handle.is_open());
        assert!(link.get().await.is_none());
    }

    #[tokio::test]
    async fn test_tick_reconnects_closed_handle() {
        let dir = tempfile::tempdir().unwrap();
        let dev = dir.path().join("ttyACM0");
        std::fs::write(&dev, b"").unwrap();
        let (sup, link) = supervisor(Arc::new(MockPortLocator::always(&dev)));
        sup.tick().await;
        let first = link.get().await.unwrap();
        first.close();

        let health = sup.tick().await;

        assert_eq!(health, LinkHealth::Closed);
        let second = link.current_open().await.expect("reconnected");
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
