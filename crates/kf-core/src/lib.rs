//! kf-core: Core abstractions and configuration for k-Forward
//!
//! This crate provides the shared types, transport traits, configuration
//! structures and X authority lookup used by the forwarding client.

pub mod config;
pub mod display;
pub mod env;
pub mod error;
pub mod traits;
pub mod types;
pub mod xauth;

pub use error::{ConfigError, ForwardError};
pub use types::{DisplayCredential, ForwardSpec, Protocol};
