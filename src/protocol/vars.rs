//! CGI-style variable mapping.
//!
//! # Responsibilities
//! - Interpret a decoded variable block as HTTP request semantics (inbound)
//! - Produce the ordered variable set for a parsed request (outbound)
//! - Fold header names between wire form (`HTTP_USER_AGENT`) and HTTP form
//!   (`User-Agent`)
//!
//! The recognized key set is closed and decoded exactly once into a typed
//! [`RequestVars`]; a frame missing `REQUEST_METHOD` or `REQUEST_URI` fails
//! loudly instead of surfacing empty fields downstream. Unrecognized keys
//! without the `HTTP_` prefix are ignored, per uwsgi convention.

use axum::http::request::Parts;
use axum::http::{header, Version};
use bytes::Bytes;

use super::ProtocolError;

const REQUEST_METHOD: &str = "REQUEST_METHOD";
const REQUEST_URI: &str = "REQUEST_URI";
const QUERY_STRING: &str = "QUERY_STRING";
const SERVER_PROTOCOL: &str = "SERVER_PROTOCOL";
const CONTENT_LENGTH: &str = "CONTENT_LENGTH";
const CONTENT_TYPE: &str = "CONTENT_TYPE";
const HEADER_PREFIX: &str = "HTTP_";

/// A uwsgi request interpreted as HTTP request semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestVars {
    /// Request method, e.g. `POST`.
    pub method: String,
    /// Path plus query, exactly as the request line will carry it.
    pub request_uri: String,
    /// Protocol version for the request line, e.g. `HTTP/1.1`.
    pub protocol: String,
    /// Header set in wire order, names already folded to HTTP form.
    pub headers: Vec<(String, String)>,
    /// Declared body length, when the frame carried a parseable one.
    pub content_length: Option<u64>,
}

impl RequestVars {
    /// Interpret decoded variable entries.
    ///
    /// `QUERY_STRING` is appended to the URI with a `?` only when the URI
    /// does not already embed one. `CONTENT_TYPE` and `CONTENT_LENGTH`
    /// become ordinary headers even though they lack the `HTTP_` prefix on
    /// the wire, without duplicating a prefixed form the client also sent.
    pub fn from_entries(entries: &[(Bytes, Bytes)]) -> Result<Self, ProtocolError> {
        let mut method = None;
        let mut uri = None;
        let mut query = None;
        let mut protocol = None;
        let mut content_length = None;
        let mut content_type = None;
        let mut headers: Vec<(String, String)> = Vec::new();

        for (key, value) in entries {
            let key = String::from_utf8_lossy(key);
            let value = String::from_utf8_lossy(value).into_owned();
            match key.as_ref() {
                REQUEST_METHOD => method = Some(value),
                REQUEST_URI => uri = Some(value),
                QUERY_STRING => query = Some(value),
                SERVER_PROTOCOL => protocol = Some(value),
                CONTENT_LENGTH => content_length = Some(value),
                CONTENT_TYPE => content_type = Some(value),
                key => {
                    if let Some(raw) = key.strip_prefix(HEADER_PREFIX) {
                        headers.push((fold_header_name(raw), value));
                    }
                }
            }
        }

        let method = method.ok_or(ProtocolError::MissingVariable(REQUEST_METHOD))?;
        let mut request_uri = uri.ok_or(ProtocolError::MissingVariable(REQUEST_URI))?;
        if let Some(query) = query {
            if !query.is_empty() && !request_uri.contains('?') {
                request_uri.push('?');
                request_uri.push_str(&query);
            }
        }

        if let Some(value) = content_type {
            push_unique(&mut headers, "Content-Type", value);
        }
        let content_length = content_length.and_then(|value| {
            let parsed = value.parse().ok();
            push_unique(&mut headers, "Content-Length", value);
            parsed
        });

        Ok(Self {
            method,
            request_uri,
            protocol: protocol.unwrap_or_else(|| "HTTP/1.1".to_string()),
            headers,
            content_length,
        })
    }
}

/// Build the ordered outbound variable set for a parsed request.
///
/// Order is fixed for determinism: the dedicated CGI keys first, then one
/// `HTTP_<NAME>` entry per header in the request's own order.
/// `Content-Type` and `Content-Length` travel only as their dedicated keys.
pub fn to_entries(parts: &Parts) -> Vec<(String, String)> {
    let mut entries = Vec::with_capacity(parts.headers.len() + 6);

    entries.push((REQUEST_METHOD.to_string(), parts.method.to_string()));
    entries.push((
        REQUEST_URI.to_string(),
        parts
            .uri
            .path_and_query()
            .map(|pq| pq.to_string())
            .unwrap_or_else(|| "/".to_string()),
    ));
    entries.push((
        QUERY_STRING.to_string(),
        parts.uri.query().unwrap_or("").to_string(),
    ));
    if let Some(value) = parts.headers.get(header::CONTENT_LENGTH) {
        entries.push((
            CONTENT_LENGTH.to_string(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        ));
    }
    if let Some(value) = parts.headers.get(header::CONTENT_TYPE) {
        entries.push((
            CONTENT_TYPE.to_string(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        ));
    }
    entries.push((SERVER_PROTOCOL.to_string(), protocol_name(parts.version)));

    for (name, value) in &parts.headers {
        if *name == header::CONTENT_LENGTH || *name == header::CONTENT_TYPE {
            continue;
        }
        entries.push((
            unfold_header_name(name.as_str()),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        ));
    }

    entries
}

/// `USER_AGENT` → `User-Agent`: underscores become dashes, each segment
/// title-cased.
pub fn fold_header_name(raw: &str) -> String {
    raw.split('_')
        .map(|segment| {
            let mut out = String::with_capacity(segment.len());
            let mut chars = segment.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                for c in chars {
                    out.extend(c.to_lowercase());
                }
            }
            out
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// `User-Agent` → `HTTP_USER_AGENT`: the inverse of [`fold_header_name`].
pub fn unfold_header_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + HEADER_PREFIX.len());
    out.push_str(HEADER_PREFIX);
    for c in name.chars() {
        out.push(if c == '-' { '_' } else { c.to_ascii_uppercase() });
    }
    out
}

fn protocol_name(version: Version) -> String {
    match version {
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        _ => "HTTP/1.1",
    }
    .to_string()
}

fn push_unique(headers: &mut Vec<(String, String)>, name: &str, value: String) {
    if !headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name)) {
        headers.push((name.to_string(), value));
    }
}
