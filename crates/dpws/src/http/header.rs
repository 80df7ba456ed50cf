// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request and response heads.

use super::HttpError;
use crate::mime::ContentType;
use std::fmt;
use std::io::{self, BufRead, Write};

/// Ordered header fields with case-insensitive names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replace every value of `name` with a single one.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.remove(name);
        self.entries.push((name.to_string(), value.into()));
    }

    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.entries.push((name.to_string(), value.into()));
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if a comma-separated header (e.g. `Connection`) lists `token`.
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.get_all(name)
            .flat_map(|v| v.split(','))
            .any(|t| t.trim().eq_ignore_ascii_case(token))
    }

    /// Parsed `Content-Length`. Conflicting or non-numeric values are errors.
    pub fn content_length(&self) -> Result<Option<u64>, HttpError> {
        let mut result: Option<u64> = None;
        for value in self.get_all("Content-Length") {
            let n: u64 = value
                .trim()
                .parse()
                .map_err(|_| HttpError::BadRequest(format!("bad Content-Length: {}", value)))?;
            if result.is_some_and(|prev| prev != n) {
                return Err(HttpError::BadRequest("conflicting Content-Length".into()));
            }
            result = Some(n);
        }
        Ok(result)
    }

    pub fn is_chunked(&self) -> bool {
        self.get_all("Transfer-Encoding")
            .flat_map(|v| v.split(','))
            .last()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("chunked"))
    }

    pub fn content_type(&self) -> Option<ContentType> {
        self.get("Content-Type").map(ContentType::parse)
    }

    fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        for (name, value) in &self.entries {
            write!(w, "{}: {}\r\n", name, value)?;
        }
        Ok(())
    }
}

/// HTTP protocol version of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HttpVersion {
    Http10,
    Http11,
}

impl HttpVersion {
    fn parse(text: &str) -> Result<Self, HttpError> {
        match text {
            "HTTP/1.1" => Ok(Self::Http11),
            "HTTP/1.0" => Ok(Self::Http10),
            other if other.starts_with("HTTP/1.") => Ok(Self::Http11),
            other => Err(HttpError::BadRequest(format!("unsupported version: {}", other))),
        }
    }
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http10 => f.write_str("HTTP/1.0"),
            Self::Http11 => f.write_str("HTTP/1.1"),
        }
    }
}

/// Limits applied while reading a head.
#[derive(Debug, Clone, Copy)]
pub struct HeadLimits {
    pub max_line: usize,
    pub max_total: usize,
}

impl Default for HeadLimits {
    fn default() -> Self {
        Self {
            max_line: 8 * 1024,
            max_total: 64 * 1024,
        }
    }
}

/// Request line plus header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequestHeader {
    pub method: String,
    pub target: String,
    pub version: HttpVersion,
    pub headers: HeaderMap,
}

impl HttpRequestHeader {
    pub fn new(method: &str, target: &str) -> Self {
        Self {
            method: method.to_string(),
            target: target.to_string(),
            version: HttpVersion::Http11,
            headers: HeaderMap::new(),
        }
    }

    /// Read a request head. `Ok(None)` means the peer closed the connection
    /// cleanly before sending anything.
    pub fn read_from<R: BufRead>(
        reader: &mut R,
        limits: HeadLimits,
    ) -> Result<Option<Self>, HttpError> {
        // Tolerate stray CRLFs between pipelined requests.
        let request_line = loop {
            match read_line(reader, limits.max_line)? {
                None => return Ok(None),
                Some(line) if line.is_empty() => continue,
                Some(line) => break line,
            }
        };

        let mut parts = request_line.split(' ').filter(|p| !p.is_empty());
        let (method, target, version) = match (parts.next(), parts.next(), parts.next()) {
            (Some(m), Some(t), Some(v)) if parts.next().is_none() => (m, t, v),
            _ => {
                return Err(HttpError::BadRequest(format!(
                    "malformed request line: {:?}",
                    request_line
                )))
            }
        };
        if !method.bytes().all(|b| b.is_ascii_uppercase() || b == b'-' || b == b'_') {
            return Err(HttpError::BadRequest(format!("bad method: {}", method)));
        }

        Ok(Some(Self {
            method: method.to_string(),
            target: target.to_string(),
            version: HttpVersion::parse(version)?,
            headers: read_fields(reader, limits, request_line.len())?,
        }))
    }

    /// Target without query string.
    pub fn path(&self) -> &str {
        self.target
            .split_once('?')
            .map_or(self.target.as_str(), |(p, _)| p)
    }

    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, q)| q)
    }

    /// Media type of the body, lower-cased and without parameters.
    pub fn media_type(&self) -> Option<String> {
        self.headers
            .content_type()
            .map(|ct| ct.media_type().to_string())
            .filter(|m| !m.is_empty())
    }

    /// Whether the client wants the connection kept open.
    pub fn wants_keep_alive(&self) -> bool {
        match self.version {
            HttpVersion::Http11 => !self.headers.has_token("Connection", "close"),
            HttpVersion::Http10 => self.headers.has_token("Connection", "keep-alive"),
        }
    }

    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        write!(w, "{} {} {}\r\n", self.method, self.target, self.version)?;
        self.headers.write_to(w)?;
        w.write_all(b"\r\n")
    }
}

/// Status line plus header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponseHeader {
    pub version: HttpVersion,
    pub status: u16,
    pub reason: String,
    pub headers: HeaderMap,
}

impl HttpResponseHeader {
    pub fn new(status: u16) -> Self {
        Self {
            version: HttpVersion::Http11,
            status,
            reason: reason_phrase(status).to_string(),
            headers: HeaderMap::new(),
        }
    }

    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        write!(w, "{} {} {}\r\n", self.version, self.status, self.reason)?;
        self.headers.write_to(w)?;
        w.write_all(b"\r\n")
    }

    /// Read a response head (client side).
    pub fn read_from<R: BufRead>(
        reader: &mut R,
        limits: HeadLimits,
    ) -> Result<Option<Self>, HttpError> {
        let line = match read_line(reader, limits.max_line)? {
            None => return Ok(None),
            Some(line) => line,
        };
        let mut parts = line.splitn(3, ' ');
        let version = HttpVersion::parse(parts.next().unwrap_or_default())?;
        let status = parts
            .next()
            .and_then(|s| s.parse::<u16>().ok())
            .ok_or_else(|| HttpError::BadRequest(format!("bad status line: {:?}", line)))?;
        let reason = parts.next().unwrap_or_default().to_string();
        Ok(Some(Self {
            version,
            status,
            reason,
            headers: read_fields(reader, limits, line.len())?,
        }))
    }
}

fn read_fields<R: BufRead>(
    reader: &mut R,
    limits: HeadLimits,
    mut total: usize,
) -> Result<HeaderMap, HttpError> {
    let mut headers = HeaderMap::new();
    loop {
        let line = read_line(reader, limits.max_line)?
            .ok_or_else(|| HttpError::BadRequest("connection closed inside header".into()))?;
        if line.is_empty() {
            return Ok(headers);
        }
        total += line.len() + 2;
        if total > limits.max_total {
            return Err(HttpError::HeaderTooLarge);
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            return Err(HttpError::BadRequest("obsolete line folding".into()));
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| HttpError::BadRequest(format!("bad header line: {:?}", line)))?;
        if name.is_empty() || name.ends_with(' ') {
            return Err(HttpError::BadRequest(format!("bad header name: {:?}", name)));
        }
        headers.append(name, value.trim());
    }
}

/// Read one CRLF (or bare LF) terminated line, without the terminator.
pub(crate) fn read_line<R: BufRead>(
    reader: &mut R,
    max_len: usize,
) -> Result<Option<String>, HttpError> {
    let mut line = Vec::new();
    loop {
        let available = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(HttpError::Io(e)),
        };
        if available.is_empty() {
            if line.is_empty() {
                return Ok(None);
            }
            return Err(HttpError::BadRequest("unterminated line".into()));
        }
        match available.iter().position(|b| *b == b'\n') {
            Some(i) => {
                line.extend_from_slice(&available[..i]);
                reader.consume(i + 1);
                break;
            }
            None => {
                let n = available.len();
                line.extend_from_slice(available);
                reader.consume(n);
            }
        }
        if line.len() > max_len {
            return Err(HttpError::HeaderTooLarge);
        }
    }
    if line.len() > max_len {
        return Err(HttpError::HeaderTooLarge);
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    String::from_utf8(line)
        .map(Some)
        .map_err(|_| HttpError::BadRequest("non-UTF-8 header line".into()))
}

/// Standard reason phrase for the status codes this server emits.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        200 => "OK",
        202 => "Accepted",
        204 => "No Content",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        411 => "Length Required",
        413 => "Payload Too Large",
        415 => "Unsupported Media Type",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        505 => "HTTP Version Not Supported",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(raw: &str) -> Result<Option<HttpRequestHeader>, HttpError> {
        HttpRequestHeader::read_from(&mut Cursor::new(raw.as_bytes()), HeadLimits::default())
    }

    #[test]
    fn test_parse_request_head() {
        let req = parse(
            "POST /device?x=1 HTTP/1.1\r\nHost: a\r\ncontent-type: application/soap+xml; charset=utf-8\r\nContent-Length: 12\r\n\r\n",
        )
        .unwrap()
        .unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.path(), "/device");
        assert_eq!(req.query(), Some("x=1"));
        assert_eq!(req.media_type().as_deref(), Some("application/soap+xml"));
        assert_eq!(req.headers.get("CONTENT-LENGTH"), Some("12"));
        assert_eq!(req.headers.content_length().unwrap(), Some(12));
        assert!(req.wants_keep_alive());
    }

    #[test]
    fn test_clean_eof_is_none() {
        assert!(parse("").unwrap().is_none());
        assert!(parse("\r\n").unwrap().is_none());
    }

    #[test]
    fn test_malformed_request_lines() {
        assert!(matches!(parse("GET\r\n\r\n"), Err(HttpError::BadRequest(_))));
        assert!(matches!(parse("get / HTTP/1.1\r\n\r\n"), Err(HttpError::BadRequest(_))));
        assert!(matches!(parse("GET / SPDY/3\r\n\r\n"), Err(HttpError::BadRequest(_))));
        assert!(matches!(
            parse("GET / HTTP/1.1\r\nNoColon\r\n\r\n"),
            Err(HttpError::BadRequest(_))
        ));
    }

    #[test]
    fn test_header_size_limit() {
        let raw = format!("GET / HTTP/1.1\r\nX-Big: {}\r\n\r\n", "a".repeat(200));
        let limits = HeadLimits {
            max_line: 100,
            max_total: 1000,
        };
        let err = HttpRequestHeader::read_from(&mut Cursor::new(raw.as_bytes()), limits);
        assert!(matches!(err, Err(HttpError::HeaderTooLarge)));
    }

    #[test]
    fn test_keep_alive_rules() {
        let h10 = parse("GET / HTTP/1.0\r\n\r\n").unwrap().unwrap();
        assert!(!h10.wants_keep_alive());
        let h10_ka = parse("GET / HTTP/1.0\r\nConnection: Keep-Alive\r\n\r\n")
            .unwrap()
            .unwrap();
        assert!(h10_ka.wants_keep_alive());
        let h11_close = parse("GET / HTTP/1.1\r\nConnection: TE, close\r\n\r\n")
            .unwrap()
            .unwrap();
        assert!(!h11_close.wants_keep_alive());
    }

    #[test]
    fn test_content_length_conflict() {
        let req = parse("POST / HTTP/1.1\r\nContent-Length: 3\r\nContent-Length: 4\r\n\r\n")
            .unwrap()
            .unwrap();
        assert!(req.headers.content_length().is_err());
    }

    #[test]
    fn test_response_head_round_trip() {
        let mut head = HttpResponseHeader::new(304);
        head.headers.insert("Date", "Thu, 01 Jan 1970 00:00:00 GMT");
        let mut out = Vec::new();
        head.write_to(&mut out).unwrap();
        let parsed = HttpResponseHeader::read_from(&mut Cursor::new(out), HeadLimits::default())
            .unwrap()
            .unwrap();
        assert_eq!(parsed, head);
    }
}
