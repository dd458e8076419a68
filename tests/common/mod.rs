//! Shared utilities for integration tests.

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

/// Build a complete uwsgi frame: header, variable block, raw body bytes.
///
/// Framing is hand-rolled here on purpose so the tests exercise the crate's
/// codec against an independent encoding of the wire format.
#[allow(dead_code)]
pub fn uwsgi_frame(entries: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
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

/// Read one HTTP response off a raw socket: status code, headers, body.
///
/// Honors `Content-Length` when present, otherwise reads to EOF.
#[allow(dead_code)]
pub async fn read_http_response(stream: &mut TcpStream) -> (u16, Vec<(String, String)>, Vec<u8>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let mut headers = [httparse::EMPTY_HEADER; 32];
        let mut response = httparse::Response::new(&mut headers);
        if let Ok(httparse::Status::Complete(consumed)) = response.parse(&buf) {
            let status = response.code.unwrap();
            let headers: Vec<(String, String)> = response
                .headers
                .iter()
                .map(|h| {
                    (
                        h.name.to_string(),
                        String::from_utf8_lossy(h.value).into_owned(),
                    )
                })
                .collect();
            let content_length = headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.parse::<usize>().ok());

            let mut body = buf[consumed..].to_vec();
            match content_length {
                Some(len) => {
                    while body.len() < len {
                        let n = stream.read(&mut chunk).await.unwrap();
                        if n == 0 {
                            break;
                        }
                        body.extend_from_slice(&chunk[..n]);
                    }
                    body.truncate(len);
                }
                None => loop {
                    let n = stream.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    body.extend_from_slice(&chunk[..n]);
                },
            }
            return (status, headers, body);
        }

        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before the response head was complete");
        buf.extend_from_slice(&chunk[..n]);
    }
}
