//! Network adapters for the inbound bridge.
//!
//! # Data Flow
//! `UwsgiListener` accepts raw TCP connections and wraps each in a
//! `UwsgiStream` before the HTTP engine ever sees it. The stream decodes
//! the leading uwsgi frame on first read and delivers a synthesized HTTP
//! preamble ahead of the untouched body bytes; everything after that is
//! plain pass-through.

pub mod connection;
pub mod listener;

pub use connection::UwsgiStream;
pub use listener::UwsgiListener;
