//! Per-connection stream adapter.
//!
//! # Responsibilities
//! - Consume the leading uwsgi frame on the first read, never at accept time
//! - Splice the synthesized HTTP preamble ahead of the raw body bytes
//! - Pass reads and writes through untouched once the frame is consumed
//!
//! Consumption is strictly sequential: all four header bytes, then all
//! `size` variable bytes, then preamble and body. A truncated or malformed
//! frame surfaces as a read error, so the HTTP engine sees a failed
//! connection rather than a partial request. Writes always go straight to
//! the socket; the response leaves as plain HTTP.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::protocol::frame::{decode_vars, FrameHeader, HEADER_LEN};
use crate::protocol::synth::synthesize_preamble;
use crate::protocol::vars::RequestVars;
use crate::protocol::FramingError;

enum ReadState {
    /// Accumulating the fixed 4-byte frame header.
    Header { buf: [u8; HEADER_LEN], filled: usize },
    /// Accumulating the `size`-byte variable block.
    Vars { buf: Box<[u8]>, filled: usize },
    /// Draining the synthesized preamble to the caller.
    Preamble(Bytes),
    /// Frame consumed; reads go straight to the socket.
    PassThrough,
    /// Frame decode failed; every further read repeats the error kind.
    Failed(io::ErrorKind),
}

/// Wraps one raw byte stream and presents it to the HTTP engine as if the
/// client had spoken HTTP natively.
pub struct UwsgiStream<S> {
    inner: S,
    state: ReadState,
}

impl<S> UwsgiStream<S> {
    /// Wrap a freshly accepted raw stream. No bytes are read until the
    /// first `poll_read`.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            state: ReadState::Header {
                buf: [0; HEADER_LEN],
                filled: 0,
            },
        }
    }

    /// Consume the adapter, returning the underlying stream.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for UwsgiStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        out: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            match &mut this.state {
                ReadState::Header { buf, filled } => {
                    let n = ready!(read_some(&mut this.inner, cx, &mut buf[*filled..]))?;
                    if n == 0 {
                        let err = FramingError::TruncatedHeader(*filled);
                        this.state = ReadState::Failed(io::ErrorKind::UnexpectedEof);
                        return Poll::Ready(Err(err.into()));
                    }
                    *filled += n;
                    if *filled == HEADER_LEN {
                        // Cannot fail with all four bytes present.
                        let header = FrameHeader::decode(&buf[..]).map_err(io::Error::from)?;
                        this.state = ReadState::Vars {
                            buf: vec![0u8; header.size as usize].into_boxed_slice(),
                            filled: 0,
                        };
                    }
                }
                ReadState::Vars { buf, filled } => {
                    if *filled < buf.len() {
                        let n = ready!(read_some(&mut this.inner, cx, &mut buf[*filled..]))?;
                        if n == 0 {
                            let err = FramingError::TruncatedVars {
                                declared: buf.len(),
                                got: *filled,
                            };
                            this.state = ReadState::Failed(io::ErrorKind::UnexpectedEof);
                            return Poll::Ready(Err(err.into()));
                        }
                        *filled += n;
                    }
                    if *filled == buf.len() {
                        match synthesize(&buf[..]) {
                            Ok(preamble) => this.state = ReadState::Preamble(preamble),
                            Err(err) => {
                                this.state = ReadState::Failed(err.kind());
                                return Poll::Ready(Err(err));
                            }
                        }
                    }
                }
                ReadState::Preamble(pending) => {
                    let n = pending.len().min(out.remaining());
                    out.put_slice(&pending[..n]);
                    pending.advance(n);
                    if pending.is_empty() {
                        this.state = ReadState::PassThrough;
                    }
                    return Poll::Ready(Ok(()));
                }
                ReadState::PassThrough => return Pin::new(&mut this.inner).poll_read(cx, out),
                ReadState::Failed(kind) => {
                    return Poll::Ready(Err(io::Error::new(
                        *kind,
                        "uwsgi frame decode already failed on this connection",
                    )))
                }
            }
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for UwsgiStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }
}

fn read_some<S: AsyncRead + Unpin>(
    inner: &mut S,
    cx: &mut Context<'_>,
    dst: &mut [u8],
) -> Poll<io::Result<usize>> {
    let mut buf = ReadBuf::new(dst);
    ready!(Pin::new(inner).poll_read(cx, &mut buf))?;
    Poll::Ready(Ok(buf.filled().len()))
}

fn synthesize(block: &[u8]) -> io::Result<Bytes> {
    let entries = decode_vars(block)?;
    let vars = RequestVars::from_entries(&entries)?;
    Ok(synthesize_preamble(&vars))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn frame(entries: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
        let mut block = Vec::new();
        for (key, value) in entries {
            block.extend_from_slice(&(key.len() as u16).to_le_bytes());
            block.extend_from_slice(key.as_bytes());
            block.extend_from_slice(&(value.len() as u16).to_le_bytes());
            block.extend_from_slice(value.as_bytes());
        }
        let mut out = vec![0, 0, 0, 0];
        out[1..3].copy_from_slice(&(block.len() as u16).to_le_bytes());
        out.extend_from_slice(&block);
        out.extend_from_slice(body);
        out
    }

    #[tokio::test]
    async fn splices_preamble_before_body() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut stream = UwsgiStream::new(server);

        let bytes = frame(
            &[
                ("REQUEST_METHOD", "POST"),
                ("REQUEST_URI", "/foo"),
                ("SERVER_PROTOCOL", "HTTP/1.1"),
                ("CONTENT_LENGTH", "8"),
            ],
            b"foo=bar1",
        );
        client.write_all(&bytes).await.unwrap();
        client.shutdown().await.unwrap();

        let mut output = Vec::new();
        stream.read_to_end(&mut output).await.unwrap();
        assert_eq!(
            output,
            b"POST /foo HTTP/1.1\r\nContent-Length: 8\r\n\r\nfoo=bar1"
        );
    }

    #[tokio::test]
    async fn truncated_variable_block_is_a_read_error() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut stream = UwsgiStream::new(server);

        // Header declares 64 variable bytes but only 3 arrive.
        let mut bytes = vec![0, 64, 0, 0];
        bytes.extend_from_slice(b"abc");
        client.write_all(&bytes).await.unwrap();
        client.shutdown().await.unwrap();

        let mut output = Vec::new();
        let err = stream.read_to_end(&mut output).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn missing_required_variable_is_a_read_error() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut stream = UwsgiStream::new(server);

        let bytes = frame(&[("REQUEST_URI", "/foo")], b"");
        client.write_all(&bytes).await.unwrap();
        client.shutdown().await.unwrap();

        let mut output = Vec::new();
        let err = stream.read_to_end(&mut output).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn error_repeats_on_subsequent_reads() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut stream = UwsgiStream::new(server);

        client.write_all(&[0, 64, 0, 0]).await.unwrap();
        client.shutdown().await.unwrap();

        let mut buf = [0u8; 16];
        assert!(stream.read(&mut buf).await.is_err());
        assert!(stream.read(&mut buf).await.is_err());
    }

    #[tokio::test]
    async fn writes_pass_through_unmodified() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut stream = UwsgiStream::new(server);

        stream.write_all(b"HTTP/1.1 200 OK\r\n\r\n").await.unwrap();
        stream.flush().await.unwrap();

        let mut buf = vec![0u8; 19];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"HTTP/1.1 200 OK\r\n\r\n");
    }
}
