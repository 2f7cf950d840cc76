//! Core trait definitions

mod subscription;
mod transport;

pub use subscription::SubscriptionSlot;
pub use transport::{
    BoxedStream, ChannelOpenEvent, ChannelOpenStream, DuplexStream, RequestChannel,
    TransportClient,
};
