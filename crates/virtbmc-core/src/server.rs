//! The per-instance serve loop.
//!
//! [`BmcServer::bind`] claims the configured address synchronously so that a
//! bind failure is reported to whoever asked for the start. [`BmcServer::run`]
//! then answers datagrams until the variant's stop signal fires.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::bmc::Bmc;
use crate::error::{CoreError, Result};
use crate::protocol::{self, FrameCodec, PayloadCodec};

/// Largest datagram accepted.
const MAX_FRAME_BYTES: usize = 1024;

/// Tuning for a serve loop.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// Upper bound between checks of the stop signal while idle.
    pub wake_interval: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            wake_interval: Duration::from_secs(1),
        }
    }
}

/// A bound, not yet running, serve loop for one variant.
pub struct BmcServer {
    bmc: Arc<dyn Bmc>,
    socket: std::net::UdpSocket,
    codec: Arc<dyn FrameCodec>,
    options: ServeOptions,
}

impl std::fmt::Debug for BmcServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BmcServer")
            .field("bmc", &self.bmc.name())
            .field("socket", &self.socket)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl BmcServer {
    /// Bind the variant's configured address and port.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Bind` naming the address and port if the socket
    /// cannot be bound, for example without privileges for port 623.
    pub fn bind(bmc: Arc<dyn Bmc>, options: ServeOptions) -> Result<Self> {
        let config = bmc.config();
        let addr = SocketAddr::new(config.address, config.port);

        let bind_error = |source| CoreError::Bind {
            address: config.address,
            port: config.port,
            source,
        };
        let socket = std::net::UdpSocket::bind(addr).map_err(bind_error)?;
        socket.set_nonblocking(true).map_err(bind_error)?;

        tracing::debug!(bmc = %bmc.name(), addr = %addr, "Bound management socket");

        Ok(Self {
            bmc,
            socket,
            codec: Arc::new(PayloadCodec),
            options,
        })
    }

    /// Replace the frame codec.
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn FrameCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// The address actually bound, useful when the configured port is 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket has been closed underneath us.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Serve requests until the variant is stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if the variant fails to prepare or the socket cannot
    /// be registered with the runtime.
    pub async fn run(self) -> Result<()> {
        let Self {
            bmc,
            socket,
            codec,
            options,
        } = self;
        let socket = UdpSocket::from_std(socket)?;

        if let Err(e) = bmc.prepare().await {
            tracing::error!(bmc = %bmc.name(), error = %e, "Failed to prepare bmc");
            bmc.stop();
            return Err(e);
        }

        tracing::info!(bmc = %bmc.name(), driver = bmc.driver(), "Serving");

        let mut stop = bmc.stop_signal().subscribe();
        let mut buf = vec![0u8; MAX_FRAME_BYTES];

        loop {
            if *stop.borrow_and_update() {
                break;
            }

            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                received = socket.recv_from(&mut buf) => match received {
                    Ok((len, peer)) => {
                        let Some(request) = codec.decode(&buf[..len]) else {
                            tracing::trace!(bmc = %bmc.name(), peer = %peer, "Dropped undecodable frame");
                            continue;
                        };
                        let response = protocol::dispatch(bmc.as_ref(), &request).await;
                        let frame = codec.encode(&request, &response);
                        if let Err(e) = socket.send_to(&frame, peer).await {
                            tracing::warn!(bmc = %bmc.name(), peer = %peer, error = %e, "Failed to send response");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(bmc = %bmc.name(), error = %e, "Receive failed");
                    }
                },
                () = tokio::time::sleep(options.wake_interval) => {}
            }
        }

        tracing::info!(bmc = %bmc.name(), "Stopped serving");
        Ok(())
    }
}
