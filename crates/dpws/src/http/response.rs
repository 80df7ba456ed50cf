// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Responses and their serialization.

use super::chunked::ChunkedWriter;
use super::date::format_http_date;
use super::header::{HeaderMap, HttpResponseHeader, HttpVersion};
use std::fmt;
use std::io::{self, Write};
use std::time::SystemTime;

/// Callback producing a body on demand.
pub type BodyWriter = Box<dyn FnOnce(&mut dyn Write) -> io::Result<()> + Send>;

/// Response body and how it is framed on the wire.
pub enum ResponseBody {
    Empty,
    /// Known bytes; sent with `Content-Length`.
    Fixed(Vec<u8>),
    /// Generated into memory first so `Content-Length` can be sent.
    Buffered(BodyWriter),
    /// Generated straight to the socket with chunked framing (buffered for
    /// HTTP/1.0 clients, which cannot decode chunks).
    Streamed(BodyWriter),
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Empty => f.write_str("Empty"),
            ResponseBody::Fixed(b) => write!(f, "Fixed({} bytes)", b.len()),
            ResponseBody::Buffered(_) => f.write_str("Buffered"),
            ResponseBody::Streamed(_) => f.write_str("Streamed"),
        }
    }
}

/// Response produced by a handler.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: ResponseBody,
    close: bool,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: ResponseBody::Empty,
            close: false,
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_content_type(self, content_type: &str) -> Self {
        self.with_header("Content-Type", content_type)
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = ResponseBody::Fixed(body);
        self
    }

    pub fn with_buffered<F>(mut self, writer: F) -> Self
    where
        F: FnOnce(&mut dyn Write) -> io::Result<()> + Send + 'static,
    {
        self.body = ResponseBody::Buffered(Box::new(writer));
        self
    }

    pub fn with_streamed<F>(mut self, writer: F) -> Self
    where
        F: FnOnce(&mut dyn Write) -> io::Result<()> + Send + 'static,
    {
        self.body = ResponseBody::Streamed(Box::new(writer));
        self
    }

    pub fn with_last_modified(self, time: SystemTime) -> Self {
        self.with_header("Last-Modified", format_http_date(time))
    }

    /// Close the connection after this response.
    pub fn closing(mut self) -> Self {
        self.close = true;
        self
    }

    pub fn forces_close(&self) -> bool {
        self.close
    }

    /// Plain-text response for error statuses.
    pub fn text(status: u16, message: &str) -> Self {
        Self::new(status)
            .with_content_type("text/plain; charset=utf-8")
            .with_body(message.as_bytes().to_vec())
    }

    pub fn not_found() -> Self {
        Self::text(404, "Not Found")
    }

    pub fn bad_request(reason: &str) -> Self {
        Self::text(400, reason).closing()
    }

    pub fn unauthorized(challenge: String) -> Self {
        Self::text(401, "Unauthorized").with_header("WWW-Authenticate", challenge)
    }

    pub fn not_modified() -> Self {
        Self::new(304)
    }
}

/// Statuses that never carry a body.
fn bodiless(status: u16) -> bool {
    (100..200).contains(&status) || status == 204 || status == 304
}

/// How a response is being sent.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WriteOptions<'a> {
    pub request_version: HttpVersion,
    pub head_only: bool,
    pub keep_alive: bool,
    pub chunk_size: usize,
    pub server_name: &'a str,
}

/// Serialize `response`. Returns whether the connection stays open.
pub(crate) fn write_response<W: Write>(
    w: &mut W,
    response: HttpResponse,
    opts: WriteOptions<'_>,
) -> io::Result<bool> {
    let HttpResponse {
        status,
        headers,
        body,
        close,
    } = response;
    let keep_alive = opts.keep_alive && !close;

    let mut head = HttpResponseHeader::new(status);
    head.headers = headers;
    head.headers.insert("Date", format_http_date(SystemTime::now()));
    if !head.headers.contains("Server") {
        head.headers.insert("Server", opts.server_name);
    }
    head.headers
        .insert("Connection", if keep_alive { "keep-alive" } else { "close" });

    if bodiless(status) {
        head.headers.remove("Content-Length");
        head.headers.remove("Transfer-Encoding");
        head.write_to(w)?;
        w.flush()?;
        return Ok(keep_alive);
    }

    let bytes = match body {
        ResponseBody::Empty => Vec::new(),
        ResponseBody::Fixed(bytes) => bytes,
        ResponseBody::Buffered(writer) => {
            let mut buf = Vec::new();
            writer(&mut buf)?;
            buf
        }
        ResponseBody::Streamed(writer) if opts.request_version == HttpVersion::Http11 => {
            head.headers.remove("Content-Length");
            head.headers.insert("Transfer-Encoding", "chunked");
            head.write_to(w)?;
            if opts.head_only {
                w.flush()?;
                return Ok(keep_alive);
            }
            let mut chunked = ChunkedWriter::new(&mut *w, opts.chunk_size);
            writer(&mut chunked)?;
            chunked.finish()?;
            return Ok(keep_alive);
        }
        ResponseBody::Streamed(writer) => {
            let mut buf = Vec::new();
            writer(&mut buf)?;
            buf
        }
    };

    head.headers.remove("Transfer-Encoding");
    head.headers.insert("Content-Length", bytes.len().to_string());
    head.write_to(w)?;
    if !opts.head_only {
        w.write_all(&bytes)?;
    }
    w.flush()?;
    Ok(keep_alive)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(version: HttpVersion) -> WriteOptions<'static> {
        WriteOptions {
            request_version: version,
            head_only: false,
            keep_alive: true,
            chunk_size: 8,
            server_name: "test",
        }
    }

    fn render(response: HttpResponse, version: HttpVersion) -> (String, bool) {
        let mut out = Vec::new();
        let alive = write_response(&mut out, response, opts(version)).unwrap();
        (String::from_utf8(out).unwrap(), alive)
    }

    #[test]
    fn test_fixed_body_has_content_length() {
        let (text, alive) = render(
            HttpResponse::ok().with_content_type("text/plain").with_body(b"hello".to_vec()),
            HttpVersion::Http11,
        );
        assert!(alive);
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 5\r\n"));
        assert!(text.contains("Connection: keep-alive\r\n"));
        assert!(text.contains("Date: "));
        assert!(text.ends_with("\r\n\r\nhello"));
    }

    #[test]
    fn test_buffered_body_is_measured() {
        let (text, _) = render(
            HttpResponse::ok().with_buffered(|w| w.write_all(b"generated")),
            HttpVersion::Http11,
        );
        assert!(text.contains("Content-Length: 9\r\n"));
        assert!(!text.contains("chunked"));
    }

    #[test]
    fn test_streamed_body_is_chunked_for_http11() {
        let (text, _) = render(
            HttpResponse::ok().with_streamed(|w| w.write_all(b"0123456789")),
            HttpVersion::Http11,
        );
        assert!(text.contains("Transfer-Encoding: chunked\r\n"));
        assert!(text.ends_with("8\r\n01234567\r\n2\r\n89\r\n0\r\n\r\n"));
    }

    #[test]
    fn test_streamed_body_is_buffered_for_http10() {
        let (text, _) = render(
            HttpResponse::ok().with_streamed(|w| w.write_all(b"0123456789")),
            HttpVersion::Http10,
        );
        assert!(text.contains("Content-Length: 10\r\n"));
        assert!(!text.contains("chunked"));
    }

    #[test]
    fn test_not_modified_has_no_body() {
        let (text, _) = render(
            HttpResponse::not_modified().with_body(b"ignored".to_vec()),
            HttpVersion::Http11,
        );
        assert!(text.starts_with("HTTP/1.1 304 Not Modified\r\n"));
        assert!(!text.contains("Content-Length"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_closing_response() {
        let (text, alive) = render(HttpResponse::bad_request("nope"), HttpVersion::Http11);
        assert!(!alive);
        assert!(text.contains("Connection: close\r\n"));
    }
}
