//! TCP request gateway: gated bind, accept loop and one-shot client handler.
//!
//! This module is responsible for:
//!
//! 1. Waiting until the first device link is up (nothing is bound before).
//! 2. Binding a TCP listener on the configured address.
//! 3. Accepting connections until the `running` flag is cleared.
//! 4. Per connection: one read of up to 1024 bytes, forward to the device,
//!    close.  Nothing is ever written back to the client.
//!
//! # Shutdown
//!
//! The bind gate and the accept loop both wake every 200 ms to check the
//! shared `AtomicBool` that the Ctrl+C handler in `main.rs` clears.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use lcd_core::{ClientRequest, MAX_REQUEST_BYTES};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::application::{forward_request, ForwardOutcome, SharedLink};

/// How often the accept loop and the bind gate re-check the `running` flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

// ── Public API ────────────────────────────────────────────────────────────────

/// Waits for the first device link, then serves clients until `running` is
/// cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_gateway(
    addr: SocketAddr,
    link: Arc<SharedLink>,
    poll: Duration,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let Some(listener) = bind_when_ready(addr, &link, poll, &running).await? else {
        return Ok(());
    };
    serve(listener, link, running).await
}

/// Binds `addr` once `link` holds an open handle.
///
/// Returns `Ok(None)` if `running` is cleared while still waiting.
///
/// # Errors
///
/// Returns an error if the bind fails (port in use, no permission).
pub async fn bind_when_ready(
    addr: SocketAddr,
    link: &SharedLink,
    poll: Duration,
    running: &AtomicBool,
) -> anyhow::Result<Option<TcpListener>> {
    info!("waiting for the device link before listening on {addr}");
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown requested before the device link came up");
            return Ok(None);
        }
        if timeout(SHUTDOWN_POLL, link.wait_until_open(poll)).await.is_ok() {
            break;
        }
    }

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind TCP listener on {addr}"))?;
    info!("listening for display commands on {addr}");
    Ok(Some(listener))
}

/// Accept loop.  Each connection gets its own task.
///
/// # Errors
///
/// Currently infallible once bound; transient accept errors are logged.
pub async fn serve(
    listener: TcpListener,
    link: Arc<SharedLink>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        match timeout(SHUTDOWN_POLL, listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                debug!("connection from {peer}");
                let link = Arc::clone(&link);
                tokio::spawn(async move {
                    handle_client(stream, peer, &link).await;
                });
            }
            Ok(Err(e)) => {
                // e.g. too many open files; keep serving
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }

    Ok(())
}

// ── Per-connection handler ────────────────────────────────────────────────────

/// Reads one request, forwards it, closes the connection.
///
/// Returns what happened to the request, or `None` if nothing was read.
pub async fn handle_client(
    mut stream: TcpStream,
    peer: SocketAddr,
    link: &SharedLink,
) -> Option<ForwardOutcome> {
    let mut buf = vec![0u8; MAX_REQUEST_BYTES];
    let outcome = match stream.read(&mut buf).await {
        Ok(0) => {
            debug!("{peer} closed without sending anything");
            None
        }
        Ok(n) => {
            buf.truncate(n);
            Some(forward_request(link, &ClientRequest::new(peer, buf)).await)
        }
        Err(e) => {
            warn!("reading from {peer}: {e}");
            None
        }
    };

    if let Err(e) = stream.shutdown().await {
        debug!("closing {peer}: {e}");
    }
    outcome
}
