//! Local listener forwarding
//!
//! Accepts connections on a local TCP listener and relays each one through
//! a channel dialed on the transport.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use kf_core::config::RelayConfig;
use kf_core::traits::TransportClient;
use kf_core::{ForwardError, ForwardSpec, Protocol};

use crate::relay::relay;

/// A bound local listener that forwards to a remote address
pub struct LocalForwarder<C> {
    /// Listening socket
    listener: TcpListener,
    /// What this forwarder binds and dials
    spec: ForwardSpec,
    /// Transport used to dial the remote side
    client: Arc<C>,
    /// Relay settings for every link
    relay_config: RelayConfig,
}

impl<C: TransportClient> LocalForwarder<C> {
    /// Bind the listener described by `spec`
    pub async fn bind(
        spec: ForwardSpec,
        client: Arc<C>,
        relay_config: RelayConfig,
    ) -> Result<Self, ForwardError> {
        if spec.protocol != Protocol::Tcp {
            return Err(ForwardError::Unsupported(format!(
                "{} forwarding ({})",
                spec.protocol, spec
            )));
        }

        let listener =
            TcpListener::bind(&spec.bind)
                .await
                .map_err(|source| ForwardError::Bind {
                    address: spec.bind.clone(),
                    source,
                })?;

        Ok(Self {
            listener,
            spec,
            client,
            relay_config,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the listener fails or `cancel` fires
    ///
    /// A listener error is terminal and returned. Failures of individual
    /// connections are logged and never end the loop.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), ForwardError> {
        let local_addr = self.listener.local_addr()?;
        tracing::info!("Forwarding {} -> {}", local_addr, self.spec.remote);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Forward on {} shutting down", local_addr);
                    return Ok(());
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((socket, peer_addr)) => self.handle_connection(socket, peer_addr),
                        Err(e) => {
                            tracing::error!("Listener on {} failed: {}", local_addr, e);
                            return Err(ForwardError::Io(e));
                        }
                    }
                }
            }
        }
    }

    /// Spawn the link for one accepted connection
    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        let client = Arc::clone(&self.client);
        let remote = self.spec.remote.clone();
        let relay_config = self.relay_config.clone();

        tokio::spawn(async move {
            socket.set_nodelay(true).ok();

            let channel = match client.dial_channel(Protocol::Tcp, &remote, peer_addr).await {
                Ok(channel) => channel,
                Err(e) => {
                    tracing::warn!("Dropping connection from {}: {}", peer_addr, e);
                    return;
                }
            };

            tracing::debug!("Link {} -> {} open", peer_addr, remote);
            let stats = relay(socket, channel, &relay_config).await;
            tracing::debug!(
                sent = stats.a_to_b,
                received = stats.b_to_a,
                "Link {} -> {} closed",
                peer_addr,
                remote
            );
        });
    }
}

/// A running forwarder
pub struct ForwardHandle {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<Result<(), ForwardError>>,
}

impl ForwardHandle {
    /// Bind `spec` and start accepting in a background task
    pub async fn spawn<C: TransportClient>(
        spec: ForwardSpec,
        client: Arc<C>,
        relay_config: RelayConfig,
    ) -> Result<Self, ForwardError> {
        let forwarder = LocalForwarder::bind(spec, client, relay_config).await?;
        let local_addr = forwarder.local_addr()?;
        let cancel = CancellationToken::new();
        let task = tokio::spawn(forwarder.run(cancel.clone()));

        Ok(Self {
            local_addr,
            cancel,
            task,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting new connections; open links keep running
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Whether the accept loop has ended
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the accept loop to end
    pub async fn join(self) -> Result<(), ForwardError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(ForwardError::Io(io::Error::new(io::ErrorKind::Other, e))),
        }
    }
}
