//! X11 display forwarding
//!
//! Requests X11 forwarding on a session channel using the local display's
//! MIT-MAGIC-COOKIE-1, then serves every `x11` channel the server opens by
//! relaying it to the local X server.

use std::io;
use std::sync::Arc;

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use kf_core::config::RelayConfig;
use kf_core::display::{DisplaySpec, DisplayTarget};
use kf_core::env::Environment;
use kf_core::traits::{BoxedStream, ChannelOpenEvent, ChannelOpenStream, RequestChannel, TransportClient};
use kf_core::xauth::XauthReader;
use kf_core::ForwardError;
use kf_protocol::{ProtocolError, X11Request, X11_CHANNEL_TYPE, X11_REQUEST};

/// Sets up X11 forwarding for a session
#[derive(Clone)]
pub struct X11Forwarder {
    env: Arc<dyn Environment>,
    xauth: XauthReader,
    relay_config: RelayConfig,
}

impl X11Forwarder {
    /// Create a forwarder reading display settings from `env`
    pub fn new(env: Arc<dyn Environment>, relay_config: RelayConfig) -> Self {
        Self {
            xauth: XauthReader::new(Arc::clone(&env)),
            env,
            relay_config,
        }
    }

    /// Limit the authority file field length
    pub fn with_max_field_len(mut self, max_field_len: usize) -> Self {
        self.xauth = self.xauth.with_max_field_len(max_field_len);
        self
    }

    /// Build the `x11-req` for the local display
    pub fn build_request(&self) -> Result<X11Request, ForwardError> {
        let number = DisplaySpec::display_number_or_default(self.env.as_ref());
        let credential = self.xauth.find_credential("", &number.to_string())?;
        tracing::debug!("Using {} for display {}", credential.protocol_name, number);

        Ok(X11Request::mit_magic_cookie(hex::encode(&credential.cookie)))
    }

    /// Request X11 forwarding on `session` and serve inbound `x11` channels
    ///
    /// Returns the task draining the client's `x11` channel-open stream. It
    /// runs for as long as the client delivers events.
    pub async fn enable<S, C>(&self, session: &S, client: &C) -> Result<JoinHandle<()>, ForwardError>
    where
        S: RequestChannel + ?Sized,
        C: TransportClient,
    {
        // Fail before touching the server if the x11 stream is already taken.
        if !client.channel_open_available(X11_CHANNEL_TYPE) {
            return Err(ForwardError::AlreadySubscribed(X11_CHANNEL_TYPE.to_string()));
        }

        // The authority file is read with blocking I/O.
        let forwarder = self.clone();
        let request = tokio::task::spawn_blocking(move || forwarder.build_request())
            .await
            .map_err(|e| ForwardError::Io(io::Error::new(io::ErrorKind::Other, e)))??;

        let accepted = session
            .send_request(X11_REQUEST, true, request.encode())
            .await?;
        if !accepted {
            return Err(ProtocolError::RequestRefused("x11 forward setup failed".into()).into());
        }

        let events = client.subscribe_channel_open(X11_CHANNEL_TYPE)?;
        tracing::info!("X11 forwarding enabled");

        Ok(tokio::spawn(serve_x11_channels(
            events,
            Arc::clone(&self.env),
            self.relay_config.clone(),
        )))
    }
}

/// Accept every inbound `x11` channel and relay it to the local display
async fn serve_x11_channels<E: ChannelOpenEvent>(
    mut events: ChannelOpenStream<E>,
    env: Arc<dyn Environment>,
    relay_config: RelayConfig,
) {
    while let Some(event) = events.next().await {
        let env = Arc::clone(&env);
        let relay_config = relay_config.clone();

        tokio::spawn(async move {
            let originator = event.originator();
            tracing::debug!("Accepting {} channel from {}", event.channel_type(), originator);

            let channel = match event.accept().await {
                Ok(channel) => channel,
                Err(e) => {
                    tracing::debug!("Failed to accept x11 channel from {}: {}", originator, e);
                    return;
                }
            };

            let display = match connect_display(env.as_ref()).await {
                Ok(display) => display,
                Err(e) => {
                    tracing::warn!("Cannot reach local X display: {}", e);
                    return;
                }
            };

            let stats = crate::relay::relay(channel, display, &relay_config).await;
            tracing::debug!(
                to_display = stats.a_to_b,
                from_display = stats.b_to_a,
                "X11 channel from {} closed",
                originator
            );
        });
    }

    tracing::debug!("X11 channel-open stream ended");
}

/// Connect to the X server named by `DISPLAY`
pub async fn connect_display(env: &dyn Environment) -> Result<BoxedStream, ForwardError> {
    let spec = DisplaySpec::from_env(env)?;
    let target = spec.target()?;
    tracing::trace!("Connecting to X display at {}", target);

    match target {
        #[cfg(unix)]
        DisplayTarget::Unix(path) => {
            let stream = tokio::net::UnixStream::connect(&path).await?;
            Ok(Box::new(stream))
        }
        #[cfg(not(unix))]
        DisplayTarget::Unix(path) => Err(ForwardError::Unsupported(format!(
            "unix display socket {}",
            path.display()
        ))),
        DisplayTarget::Tcp { host, port } => {
            let stream = TcpStream::connect((host.as_str(), port)).await?;
            stream.set_nodelay(true).ok();
            Ok(Box::new(stream))
        }
    }
}
