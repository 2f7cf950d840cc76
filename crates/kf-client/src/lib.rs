//! kf-client: TCP and X11 forwarding over SSH
//!
//! Local listeners are relayed through `direct-tcpip` channels, and X11
//! channels opened by the server are relayed to the local display. The
//! forwarding logic works against the `kf_core::traits` transport traits;
//! [`transport`] implements them with russh.

pub mod forward;
pub mod relay;
pub mod session;
pub mod transport;
pub mod x11;

pub use forward::{ForwardHandle, LocalForwarder};
pub use relay::{relay, RelayStats};
pub use session::ForwardSession;
pub use x11::X11Forwarder;
