//! Bidirectional bridge between the uwsgi wire protocol and HTTP/1.x.
//!
//! Two translation directions share one frame codec:
//!
//! - **Inbound**: [`UwsgiListener`] wraps a TCP acceptor so an unmodified
//!   HTTP engine (it plugs straight into `axum::serve`) can accept
//!   connections from uwsgi-speaking clients. Each connection's leading
//!   frame is decoded lazily on first read and replaced with an equivalent
//!   HTTP/1.1 request preamble; body bytes pass through untouched.
//! - **Outbound**: [`Forwarder`] re-encodes an already-parsed HTTP request
//!   as a uwsgi frame sent to a backend over a fresh connection, then
//!   relays the backend's raw HTTP response to the original caller.

pub mod config;
pub mod forward;
pub mod gateway;
pub mod net;
pub mod protocol;

pub use config::GatewayConfig;
pub use forward::{BackendError, Forwarder};
pub use gateway::GatewayServer;
pub use net::{UwsgiListener, UwsgiStream};
pub use protocol::{FramingError, ProtocolError};
