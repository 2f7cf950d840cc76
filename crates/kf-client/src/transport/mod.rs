//! SSH transport built on russh

mod client;
mod connector;

pub use client::{SshClient, SshSessionChannel, X11ChannelOpen};
pub use connector::{ConnectionError, SshConnector};
