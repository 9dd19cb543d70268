//! One TCP client's command.
//!
//! The bridge speaks a one-shot protocol: a client connects, sends up to
//! [`MAX_REQUEST_BYTES`] bytes, and the connection is closed.  There is no
//! framing and no reply.  A `ClientRequest` is the raw payload of that single
//! read plus the peer address, kept only long enough to decode it.

use std::net::SocketAddr;

use thiserror::Error;

/// Largest payload read from a single client connection.
pub const MAX_REQUEST_BYTES: usize = 1024;

/// Error returned when a client payload cannot be turned into a command.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("payload from {peer} is not valid UTF-8 (byte {valid_up_to})")]
    InvalidUtf8 { peer: SocketAddr, valid_up_to: usize },
}

/// Raw bytes received from one TCP connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRequest {
    pub peer: SocketAddr,
    pub payload: Vec<u8>,
}

impl ClientRequest {
    pub fn new(peer: SocketAddr, payload: Vec<u8>) -> Self {
        Self { peer, payload }
    }

    /// Decodes the payload as UTF-8 and trims surrounding whitespace.
    ///
    /// Returns `Ok(None)` when nothing but whitespace was sent, which the
    /// gateway treats as "nothing to forward".
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidUtf8`] if the payload is not UTF-8.
    pub fn command(&self) -> Result<Option<&str>, RequestError> {
        let text = std::str::from_utf8(&self.payload).map_err(|e| RequestError::InvalidUtf8 {
            peer: self.peer,
            valid_up_to: e.valid_up_to(),
        })?;
        let trimmed = text.trim();
        Ok((!trimmed.is_empty()).then_some(trimmed))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "192.168.1.20:50000".parse().unwrap()
    }

    #[test]
    fn test_command_trims_trailing_newline() {
        // Arrange
        let req = ClientRequest::new(peer(), b"x=1&y=1&message=Hi\r\n".to_vec());

        // Act / Assert
        assert_eq!(req.command(), Ok(Some("x=1&y=1&message=Hi")));
    }

    #[test]
    fn test_command_keeps_inner_spaces() {
        let req = ClientRequest::new(peer(), b"  x=0&y=0&message=Hello World ".to_vec());
        assert_eq!(req.command(), Ok(Some("x=0&y=0&message=Hello World")));
    }

    #[test]
    fn test_command_whitespace_only_is_none() {
        let req = ClientRequest::new(peer(), b" \r\n\t".to_vec());
        assert_eq!(req.command(), Ok(None));
    }

    #[test]
    fn test_command_empty_payload_is_none() {
        let req = ClientRequest::new(peer(), Vec::new());
        assert_eq!(req.command(), Ok(None));
    }

    #[test]
    fn test_command_rejects_invalid_utf8() {
        let req = ClientRequest::new(peer(), vec![b'o', b'k', 0xff, 0xfe]);
        assert_eq!(
            req.command(),
            Err(RequestError::InvalidUtf8 {
                peer: peer(),
                valid_up_to: 2,
            })
        );
    }
}
