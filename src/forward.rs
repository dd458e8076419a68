//! Backend forwarder: the outbound half of the bridge.
//!
//! # Responsibilities
//! - Re-encode a parsed HTTP request as a uwsgi frame
//! - Dial the backend and stream the request body without buffering it whole
//! - Read the backend's raw HTTP response and relay it as a streaming body
//!
//! One invocation opens exactly one backend connection and performs exactly
//! one request/response exchange. Connection pooling, retries and timeouts
//! belong to the caller, not here.

use std::io::Cursor;

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, Request, Response, StatusCode, Version};
use bytes::BytesMut;
use http_body_util::BodyExt;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::io::ReaderStream;

use crate::protocol::frame::{encode_vars, FrameHeader};
use crate::protocol::vars::to_entries;
use crate::protocol::ProtocolError;

/// A response header section larger than this is treated as malformed.
const MAX_RESPONSE_HEAD: usize = 64 * 1024;

/// Failures while forwarding a request to the backend.
///
/// None of these are retried here; the caller decides how a failed forward
/// surfaces (the gateway maps them to 502).
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not be dialed.
    #[error("failed to connect to backend {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// The request does not fit the uwsgi frame format.
    #[error("request cannot be encoded as a uwsgi frame: {0}")]
    Encode(#[from] ProtocolError),

    /// The inbound request body failed while being streamed.
    #[error("request body error: {0}")]
    RequestBody(axum::Error),

    /// I/O failure on the backend connection (reset, broken pipe).
    #[error("i/o error talking to the backend: {0}")]
    Io(#[from] std::io::Error),

    /// The backend's reply could not be parsed as an HTTP response.
    #[error("malformed backend response: {0}")]
    MalformedResponse(&'static str),
}

/// Forwards parsed HTTP requests to a single uwsgi backend.
#[derive(Debug, Clone)]
pub struct Forwarder {
    backend_addr: String,
}

impl Forwarder {
    pub fn new(backend_addr: impl Into<String>) -> Self {
        Self {
            backend_addr: backend_addr.into(),
        }
    }

    /// Address this forwarder dials.
    pub fn backend_addr(&self) -> &str {
        &self.backend_addr
    }

    /// Forward one request and return the backend's response with a
    /// streaming body.
    pub async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, BackendError> {
        let (parts, body) = request.into_parts();

        let entries = to_entries(&parts);
        let block = encode_vars(&entries)?;
        let frame_header = FrameHeader {
            modifier1: 0,
            size: block.len() as u16,
            modifier2: 0,
        };

        tracing::debug!(
            backend = %self.backend_addr,
            method = %parts.method,
            uri = %parts.uri,
            "forwarding request as uwsgi frame"
        );

        let mut stream = TcpStream::connect(&self.backend_addr)
            .await
            .map_err(|source| BackendError::Connect {
                addr: self.backend_addr.clone(),
                source,
            })?;

        stream.write_all(&frame_header.encode()).await?;
        stream.write_all(&block).await?;
        write_body(&mut stream, body).await?;
        stream.flush().await?;

        read_response(stream).await
    }
}

/// Stream the request body to the backend chunk by chunk.
async fn write_body(stream: &mut TcpStream, mut body: Body) -> Result<(), BackendError> {
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(BackendError::RequestBody)?;
        if let Some(chunk) = frame.data_ref() {
            stream.write_all(chunk).await?;
        }
    }
    Ok(())
}

/// Read the backend's raw HTTP response: parse the status line and headers,
/// then hand the remainder back as a streaming body.
async fn read_response(mut stream: TcpStream) -> Result<Response<Body>, BackendError> {
    let mut head = BytesMut::with_capacity(4096);
    let (status, version, header_list, content_length, body_start) = loop {
        let n = stream.read_buf(&mut head).await?;
        if n == 0 {
            return Err(BackendError::MalformedResponse(
                "connection closed before the response head was complete",
            ));
        }

        let mut headers = [httparse::EMPTY_HEADER; 64];
        let mut parsed = httparse::Response::new(&mut headers);
        match parsed.parse(&head) {
            Ok(httparse::Status::Complete(consumed)) => {
                let (status, version, header_list, content_length) = interpret_head(&parsed)?;
                break (status, version, header_list, content_length, consumed);
            }
            Ok(httparse::Status::Partial) => {
                if head.len() > MAX_RESPONSE_HEAD {
                    return Err(BackendError::MalformedResponse("response head too large"));
                }
            }
            Err(_) => {
                return Err(BackendError::MalformedResponse(
                    "unparseable status line or header block",
                ))
            }
        }
    };

    // Whatever body bytes arrived along with the head, followed by the rest
    // of the backend stream. The connection is single-exchange, so absent a
    // Content-Length the body simply runs to EOF.
    let buffered = head.freeze().slice(body_start..);
    let body = match content_length {
        Some(total) => {
            let rest = total.saturating_sub(buffered.len() as u64);
            Body::from_stream(ReaderStream::new(Cursor::new(buffered).chain(stream.take(rest))))
        }
        None => Body::from_stream(ReaderStream::new(Cursor::new(buffered).chain(stream))),
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.version_mut() = version;
    for (name, value) in header_list {
        response.headers_mut().append(name, value);
    }
    Ok(response)
}

type ResponseHead = (
    StatusCode,
    Version,
    Vec<(HeaderName, HeaderValue)>,
    Option<u64>,
);

fn interpret_head(parsed: &httparse::Response<'_, '_>) -> Result<ResponseHead, BackendError> {
    let code = parsed
        .code
        .ok_or(BackendError::MalformedResponse("missing status code"))?;
    let status = StatusCode::from_u16(code)
        .map_err(|_| BackendError::MalformedResponse("status code out of range"))?;
    let version = match parsed.version {
        Some(0) => Version::HTTP_10,
        _ => Version::HTTP_11,
    };

    let mut header_list = Vec::with_capacity(parsed.headers.len());
    let mut content_length = None;
    for h in parsed.headers.iter() {
        let name = HeaderName::from_bytes(h.name.as_bytes())
            .map_err(|_| BackendError::MalformedResponse("invalid header name"))?;
        let value = HeaderValue::from_bytes(h.value)
            .map_err(|_| BackendError::MalformedResponse("invalid header value"))?;
        if name == header::CONTENT_LENGTH {
            content_length = value.to_str().ok().and_then(|v| v.parse().ok());
        }
        header_list.push((name, value));
    }
    Ok((status, version, header_list, content_length))
}
