//! HTTP/1.1 request preamble synthesis.
//!
//! Renders the request line and header block for a decoded frame. The
//! returned bytes, concatenated with the untouched body bytes still on the
//! socket, parse identically to a request sent natively over HTTP.

use bytes::{BufMut, Bytes, BytesMut};

use super::vars::RequestVars;

/// Render `"<METHOD> <URI> <PROTOCOL>\r\n"` followed by one header line per
/// entry and a terminating blank line.
pub fn synthesize_preamble(vars: &RequestVars) -> Bytes {
    let header_len: usize = vars
        .headers
        .iter()
        .map(|(name, value)| name.len() + value.len() + 4)
        .sum();
    let mut buf = BytesMut::with_capacity(
        vars.method.len() + vars.request_uri.len() + vars.protocol.len() + 4 + header_len + 2,
    );

    buf.put_slice(vars.method.as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(vars.request_uri.as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(vars.protocol.as_bytes());
    buf.put_slice(b"\r\n");

    for (name, value) in &vars.headers {
        buf.put_slice(name.as_bytes());
        buf.put_slice(b": ");
        buf.put_slice(value.as_bytes());
        buf.put_slice(b"\r\n");
    }
    buf.put_slice(b"\r\n");

    buf.freeze()
}
