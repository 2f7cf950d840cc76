//! Forwarding on top of an authenticated transport client

use std::sync::Arc;

use tokio::task::JoinHandle;

use kf_core::config::RelayConfig;
use kf_core::env::{Environment, SystemEnvironment};
use kf_core::traits::{RequestChannel, TransportClient};
use kf_core::{ForwardError, ForwardSpec, Protocol};
use kf_protocol::xauth::DEFAULT_MAX_FIELD_LEN;

use crate::forward::ForwardHandle;
use crate::x11::X11Forwarder;

/// Starts forwards against one shared transport client
///
/// The client's own lifecycle (connect, disconnect) stays with the caller.
pub struct ForwardSession<C> {
    client: Arc<C>,
    env: Arc<dyn Environment>,
    relay_config: RelayConfig,
    max_field_len: usize,
}

impl<C: TransportClient> ForwardSession<C> {
    /// Wrap a connected client, reading the real process environment
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            env: Arc::new(SystemEnvironment),
            relay_config: RelayConfig::default(),
            max_field_len: DEFAULT_MAX_FIELD_LEN,
        }
    }

    /// Use a different environment provider
    pub fn with_environment(mut self, env: Arc<dyn Environment>) -> Self {
        self.env = env;
        self
    }

    /// Use different relay settings
    pub fn with_relay_config(mut self, relay_config: RelayConfig) -> Self {
        self.relay_config = relay_config;
        self
    }

    /// Limit the authority file field length used for X11 setup
    pub fn with_max_field_len(mut self, max_field_len: usize) -> Self {
        self.max_field_len = max_field_len;
        self
    }

    /// The underlying transport client
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Listen on `spec.bind` and forward each connection to `spec.remote`
    pub async fn forward_spec(&self, spec: ForwardSpec) -> Result<ForwardHandle, ForwardError> {
        ForwardHandle::spawn(spec, Arc::clone(&self.client), self.relay_config.clone()).await
    }

    /// Listen on `local` and forward each connection to `remote`
    pub async fn forward(
        &self,
        local: &str,
        remote: &str,
        protocol: Protocol,
    ) -> Result<ForwardHandle, ForwardError> {
        self.forward_spec(ForwardSpec {
            bind: local.to_string(),
            remote: remote.to_string(),
            protocol,
        })
        .await
    }

    /// Enable X11 forwarding on `session`
    pub async fn enable_display_forward<S>(&self, session: &S) -> Result<JoinHandle<()>, ForwardError>
    where
        S: RequestChannel + ?Sized,
    {
        X11Forwarder::new(Arc::clone(&self.env), self.relay_config.clone())
            .with_max_field_len(self.max_field_len)
            .enable(session, self.client.as_ref())
            .await
    }
}
