//! Transport traits
//!
//! The forwarder never speaks SSH itself. It consumes an already
//! authenticated client through these traits: dial a channel, send a
//! channel request, and receive server-initiated channel opens.

use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::ForwardError;
use crate::types::Protocol;

/// A bidirectional byte stream with independent half-close
pub trait DuplexStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> DuplexStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Type-erased duplex stream
pub type BoxedStream = Box<dyn DuplexStream>;

/// Infinite stream of inbound channel-open events
pub type ChannelOpenStream<E> = BoxStream<'static, E>;

/// A channel on which typed requests can be sent
#[async_trait]
pub trait RequestChannel: Send + Sync {
    /// Send a named request; returns whether the peer accepted it
    ///
    /// With `want_reply == false` the result is always `true`.
    async fn send_request(
        &self,
        name: &str,
        want_reply: bool,
        payload: Bytes,
    ) -> Result<bool, ForwardError>;
}

/// A server-initiated channel waiting to be accepted
#[async_trait]
pub trait ChannelOpenEvent: Send + Sized + 'static {
    /// Channel type, e.g. `x11`
    fn channel_type(&self) -> &str;

    /// Originator address reported by the server
    fn originator(&self) -> String;

    /// Accept the channel and take its stream
    async fn accept(self) -> Result<BoxedStream, ForwardError>;
}

/// An authenticated, multiplexed transport connection
#[async_trait]
pub trait TransportClient: Send + Sync + 'static {
    /// Inbound channel-open event type
    type Event: ChannelOpenEvent;

    /// Whether `subscribe_channel_open(channel_type)` would succeed
    fn channel_open_available(&self, channel_type: &str) -> bool;

    /// Take the stream of inbound opens for `channel_type`
    ///
    /// There is one stream per channel type for the life of the client;
    /// a second call fails with `ForwardError::AlreadySubscribed`.
    fn subscribe_channel_open(
        &self,
        channel_type: &str,
    ) -> Result<ChannelOpenStream<Self::Event>, ForwardError>;

    /// Open a channel to `address` (`host:port`) on the far side
    async fn dial_channel(
        &self,
        protocol: Protocol,
        address: &str,
        origin: SocketAddr,
    ) -> Result<BoxedStream, ForwardError>;
}
