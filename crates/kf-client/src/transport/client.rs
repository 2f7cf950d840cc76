//! russh implementations of the transport traits

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::Bytes;
use russh::client::{self, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;
use tokio::sync::{mpsc, Mutex};

use kf_core::traits::{
    BoxedStream, ChannelOpenEvent, ChannelOpenStream, RequestChannel, SubscriptionSlot,
    TransportClient,
};
use kf_core::types::split_host_port;
use kf_core::{ForwardError, Protocol};
use kf_protocol::{X11Request, X11_CHANNEL_TYPE, X11_REQUEST};

/// Buffered inbound X11 opens before the subscriber catches up
const X11_OPEN_CHANNEL_CAPACITY: usize = 64;

/// An X11 channel opened by the server
pub struct X11ChannelOpen {
    channel: Channel<Msg>,
    originator: String,
}

#[async_trait]
impl ChannelOpenEvent for X11ChannelOpen {
    fn channel_type(&self) -> &str {
        X11_CHANNEL_TYPE
    }

    fn originator(&self) -> String {
        self.originator.clone()
    }

    async fn accept(self) -> Result<BoxedStream, ForwardError> {
        // russh confirms server-initiated channels before handing them over.
        Ok(Box::new(self.channel.into_stream()))
    }
}

/// An authenticated SSH connection
pub struct SshClient {
    /// SSH session handle
    handle: Handle<ClientHandler>,
    /// Inbound X11 channel opens
    x11: SubscriptionSlot<X11ChannelOpen>,
}

impl SshClient {
    pub(super) fn new(handle: Handle<ClientHandler>, x11: SubscriptionSlot<X11ChannelOpen>) -> Self {
        Self { handle, x11 }
    }

    /// Open a session channel for requests and commands
    pub async fn open_session(&self) -> Result<SshSessionChannel, ForwardError> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(ForwardError::transport)?;
        Ok(SshSessionChannel::new(channel))
    }

    /// Disconnect from the server
    pub async fn disconnect(&self) -> Result<(), ForwardError> {
        self.handle
            .disconnect(Disconnect::ByApplication, "closing", "en")
            .await
            .map_err(ForwardError::transport)
    }
}

#[async_trait]
impl TransportClient for SshClient {
    type Event = X11ChannelOpen;

    fn channel_open_available(&self, channel_type: &str) -> bool {
        channel_type == self.x11.channel_type() && self.x11.is_available()
    }

    fn subscribe_channel_open(
        &self,
        channel_type: &str,
    ) -> Result<ChannelOpenStream<Self::Event>, ForwardError> {
        if channel_type != self.x11.channel_type() {
            return Err(ForwardError::Unsupported(format!(
                "inbound '{}' channels",
                channel_type
            )));
        }
        self.x11.take()
    }

    async fn dial_channel(
        &self,
        protocol: Protocol,
        address: &str,
        origin: SocketAddr,
    ) -> Result<BoxedStream, ForwardError> {
        if protocol != Protocol::Tcp {
            return Err(ForwardError::Unsupported(format!("{} channels", protocol)));
        }

        let (host, port) = split_host_port(address).ok_or_else(|| ForwardError::Dial {
            address: address.to_string(),
            source: Box::new(io::Error::new(
                io::ErrorKind::InvalidInput,
                "expected host:port",
            )),
        })?;

        let channel = self
            .handle
            .channel_open_direct_tcpip(
                host,
                u32::from(port),
                origin.ip().to_string(),
                u32::from(origin.port()),
            )
            .await
            .map_err(|e| ForwardError::Dial {
                address: address.to_string(),
                source: Box::new(e),
            })?;

        Ok(Box::new(channel.into_stream()))
    }
}

/// A session channel that carries channel requests
pub struct SshSessionChannel {
    channel: Mutex<Channel<Msg>>,
}

impl SshSessionChannel {
    fn new(channel: Channel<Msg>) -> Self {
        Self {
            channel: Mutex::new(channel),
        }
    }

    /// Take back the channel, e.g. to run a command on it
    pub fn into_inner(self) -> Channel<Msg> {
        self.channel.into_inner()
    }

    /// Wait for the reply to a request sent with `want_reply`
    async fn wait_reply(channel: &mut Channel<Msg>) -> Result<bool, ForwardError> {
        loop {
            match channel.wait().await {
                Some(ChannelMsg::Success) => return Ok(true),
                Some(ChannelMsg::Failure) => return Ok(false),
                Some(other) => {
                    tracing::trace!("Ignoring {:?} while awaiting request reply", other);
                }
                None => {
                    return Err(ForwardError::transport(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "channel closed before request reply",
                    )))
                }
            }
        }
    }
}

#[async_trait]
impl RequestChannel for SshSessionChannel {
    async fn send_request(
        &self,
        name: &str,
        want_reply: bool,
        payload: Bytes,
    ) -> Result<bool, ForwardError> {
        if name != X11_REQUEST {
            return Err(ForwardError::Unsupported(format!(
                "channel request '{}'",
                name
            )));
        }

        let request = X11Request::decode(&payload)?;
        let mut channel = self.channel.lock().await;
        channel
            .request_x11(
                want_reply,
                request.single_connection,
                request.auth_protocol,
                request.auth_cookie,
                request.screen_number,
            )
            .await
            .map_err(ForwardError::transport)?;

        if !want_reply {
            return Ok(true);
        }
        Self::wait_reply(&mut channel).await
    }
}

/// SSH client handler
pub(super) struct ClientHandler {
    /// Expected host key fingerprint
    expected_host_key: Option<String>,
    /// Sender for inbound X11 channels
    x11_tx: mpsc::Sender<X11ChannelOpen>,
}

impl ClientHandler {
    /// Create a handler and the slot its X11 opens are delivered to
    pub(super) fn new(expected_host_key: Option<String>) -> (Self, SubscriptionSlot<X11ChannelOpen>) {
        let (x11_tx, x11_rx) = mpsc::channel(X11_OPEN_CHANNEL_CAPACITY);
        let handler = Self {
            expected_host_key,
            x11_tx,
        };
        (handler, SubscriptionSlot::new(X11_CHANNEL_TYPE, x11_rx))
    }
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = anyhow::Error;

    /// Verify the server's host key
    ///
    /// Without a configured fingerprint any key is accepted and logged.
    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint();
        tracing::debug!("Server host key: {}", fingerprint);

        match &self.expected_host_key {
            Some(expected) if *expected != fingerprint => {
                tracing::error!(
                    "Host key mismatch: expected {}, got {}",
                    expected,
                    fingerprint
                );
                Ok(false)
            }
            Some(_) => {
                tracing::debug!("Host key verified against configured fingerprint");
                Ok(true)
            }
            None => {
                tracing::info!("Accepting unverified server host key {}", fingerprint);
                Ok(true)
            }
        }
    }

    /// Hand a server-opened X11 channel to the subscriber
    async fn server_channel_open_x11(
        &mut self,
        channel: Channel<Msg>,
        originator_address: &str,
        originator_port: u32,
        _session: &mut client::Session,
    ) -> Result<(), Self::Error> {
        let originator = format!("{}:{}", originator_address, originator_port);
        tracing::debug!("Server opened x11 channel from {}", originator);

        let event = X11ChannelOpen {
            channel,
            originator,
        };
        if let Err(e) = self.x11_tx.try_send(event) {
            tracing::warn!("Dropping x11 channel: {}", e);
        }
        Ok(())
    }
}
