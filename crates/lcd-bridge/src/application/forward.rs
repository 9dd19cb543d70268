//! Forwarding one client request to the device.
//!
//! The handle is copied out of the [`SharedLink`] and the lock released
//! before the write, so a slow device never blocks the supervisor.

use lcd_core::{encode_command, ClientRequest, RequestError};
use tracing::{debug, error, info, warn};

use super::device::{run_blocking, LinkError};
use super::shared_link::SharedLink;

/// What happened to a client request.
#[derive(Debug)]
pub enum ForwardOutcome {
    /// `bytes` were written to the device, newline included.
    Sent { bytes: usize },
    /// The payload was blank after trimming.
    Empty,
    /// No open link; the request was dropped.
    NoLink,
    /// The payload was not valid UTF-8.
    Rejected(RequestError),
    /// The write failed; the request was dropped.
    Failed(LinkError),
}

/// Writes `request`'s trimmed text plus a newline to the current device.
///
/// Nothing is ever reported back to the client; the outcome is logged here
/// and returned for the caller's bookkeeping.
pub async fn forward_request(link: &SharedLink, request: &ClientRequest) -> ForwardOutcome {
    let text = match request.command() {
        Ok(Some(text)) => text,
        Ok(None) => {
            debug!("empty request from {}", request.peer);
            return ForwardOutcome::Empty;
        }
        Err(e) => {
            warn!("dropping request: {e}");
            return ForwardOutcome::Rejected(e);
        }
    };

    let Some(handle) = link.current_open().await else {
        warn!("no device link; dropping `{text}` from {}", request.peer);
        return ForwardOutcome::NoLink;
    };

    let bytes = encode_command(text);
    let len = bytes.len();
    match run_blocking(&handle, move |h| h.write_all(&bytes)).await {
        Ok(()) => {
            info!("{} -> {}: {text}", request.peer, handle.path().display());
            ForwardOutcome::Sent { bytes: len }
        }
        Err(e) => {
            error!("forwarding `{text}` from {}: {e}", request.peer);
            ForwardOutcome::Failed(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::device::DeviceHandle;
    use crate::infrastructure::serial::mock::{MockPortOpener, MockSerialDevice};
    use std::net::SocketAddr;
    use std::path::Path;
    use std::sync::Arc;

    fn peer() -> SocketAddr {
        "192.168.1.20:50000".parse().unwrap()
    }

    async fn linked(device: &MockSerialDevice) -> SharedLink {
        let link = SharedLink::new();
        let opener = MockPortOpener::new(device.clone());
        let handle = DeviceHandle::open(&opener, Path::new("/dev/ttyACM0"), 9600).unwrap();
        handle.mark_ready().unwrap();
        link.replace(Arc::new(handle)).await;
        link
    }

    #[tokio::test]
    async fn test_forward_writes_trimmed_text_with_newline() {
        // Arrange
        let device = MockSerialDevice::new();
        let link = linked(&device).await;
        let req = ClientRequest::new(peer(), b"  x=1&y=1&message=Hi \r\n".to_vec());

        // Act
        let outcome = forward_request(&link, &req).await;

        // Assert
        assert!(matches!(outcome, ForwardOutcome::Sent { bytes: 19 }));
        assert_eq!(device.writes(), vec![b"x=1&y=1&message=Hi\n".to_vec()]);
    }

    #[tokio::test]
    async fn test_forward_blank_payload_writes_nothing() {
        let device = MockSerialDevice::new();
        let link = linked(&device).await;

        let outcome = forward_request(&link, &ClientRequest::new(peer(), b" \n".to_vec())).await;

        assert!(matches!(outcome, ForwardOutcome::Empty));
        assert!(device.writes().is_empty());
    }

    #[tokio::test]
    async fn test_forward_without_link_is_dropped() {
        let link = SharedLink::new();
        let req = ClientRequest::new(peer(), b"x=0&y=0&message=hello".to_vec());

        let outcome = forward_request(&link, &req).await;

        assert!(matches!(outcome, ForwardOutcome::NoLink));
    }

    #[tokio::test]
    async fn test_forward_invalid_utf8_is_rejected() {
        let device = MockSerialDevice::new();
        let link = linked(&device).await;
        let req = ClientRequest::new(peer(), vec![b'h', 0xff, b'i']);

        let outcome = forward_request(&link, &req).await;

        assert!(matches!(outcome, ForwardOutcome::Rejected(_)));
        assert!(device.writes().is_empty());
    }

    #[tokio::test]
    async fn test_forward_write_failure_is_reported() {
        let device = MockSerialDevice::new();
        device.fail_writes(true);
        let link = linked(&device).await;
        let req = ClientRequest::new(peer(), b"x=0&y=0&message=hello".to_vec());

        let outcome = forward_request(&link, &req).await;

        assert!(matches!(outcome, ForwardOutcome::Failed(LinkError::Io(_))));
    }
}
