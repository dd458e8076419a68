//! Listener adapter for the inbound bridge.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept raw TCP connections and wrap each in a [`UwsgiStream`]
//! - Plug into `axum::serve` as a drop-in listener
//!
//! Accept never inspects the frame. Decode happens lazily on the first read
//! inside the connection's own task, so a slow or silent client cannot
//! block the accept loop or other connections.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};

use super::connection::UwsgiStream;

/// A TCP acceptor whose connections speak uwsgi on the wire but HTTP to
/// whatever serves them.
pub struct UwsgiListener {
    inner: TcpListener,
}

impl UwsgiListener {
    /// Bind to the given address.
    pub async fn bind(addr: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(address = %listener.local_addr()?, "uwsgi listener bound");
        Ok(Self { inner: listener })
    }

    /// Wrap an already-bound TCP listener.
    pub fn from_tcp(inner: TcpListener) -> Self {
        Self { inner }
    }

    /// Accept one connection and wrap it. The frame is not touched here.
    pub async fn accept(&self) -> io::Result<(UwsgiStream<TcpStream>, SocketAddr)> {
        let (stream, addr) = self.inner.accept().await?;
        tracing::debug!(peer_addr = %addr, "uwsgi connection accepted");
        Ok((UwsgiStream::new(stream), addr))
    }

    /// Local address this listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

impl axum::serve::Listener for UwsgiListener {
    type Io = UwsgiStream<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            match UwsgiListener::accept(self).await {
                Ok(pair) => return pair,
                Err(err) => {
                    // Transient accept failures (e.g. EMFILE) leave the
                    // listener itself usable; back off and keep accepting.
                    tracing::warn!(error = %err, "accept failed");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}
