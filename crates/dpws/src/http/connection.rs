// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-connection request loop.
//!
//! ```text
//! AWAIT_REQUEST -> PARSE_HEADERS -> REJECT (400/431, close)
//!                                -> DISPATCH -> SERIALIZE_RESPONSE
//!                                                -> AWAIT_REQUEST (keep-alive)
//!                                                -> CLOSE
//! ```
//!
//! Requests on one connection are handled strictly in order.

use super::body::RequestBody;
use super::date::parse_http_date;
use super::header::{HeadLimits, HttpRequestHeader, HttpVersion};
use super::registry::{HandlerRegistry, HttpRequest};
use super::response::{write_response, HttpResponse, WriteOptions};
use super::HttpError;
use crate::config::HttpServerConfig;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Arms a deadline while the connection waits for the next request.
pub(crate) trait IdleWatch {
    fn arm(&self);
    fn disarm(&self);
    /// Whether the deadline already closed the connection.
    fn fired(&self) -> bool {
        false
    }
}

/// No deadline (in-memory streams, tests).
impl IdleWatch for () {
    fn arm(&self) {}
    fn disarm(&self) {}
}

/// Everything a connection needs from its server.
pub(crate) struct ConnectionContext<'a> {
    pub registry: &'a HandlerRegistry,
    pub config: &'a HttpServerConfig,
    pub peer: Option<SocketAddr>,
}

/// Serve requests until the peer closes, an error occurs or a response
/// ends the connection. Returns the number of requests answered.
pub(crate) fn serve_connection<R: Read, W: Write>(
    reader: R,
    mut writer: W,
    ctx: &ConnectionContext<'_>,
    idle: &dyn IdleWatch,
) -> u64 {
    let mut reader = BufReader::new(reader);
    let limits = HeadLimits {
        max_line: ctx.config.max_request_line,
        max_total: ctx.config.max_header_bytes,
    };
    let mut served = 0u64;

    loop {
        idle.arm();
        let head = HttpRequestHeader::read_from(&mut reader, limits);
        idle.disarm();

        let head = match head {
            Ok(Some(head)) => head,
            Ok(None) => {
                if idle.fired() {
                    log::debug!("[http] {:?}: idle timeout, closing", ctx.peer);
                } else {
                    log::debug!("[http] {:?}: peer closed after {} requests", ctx.peer, served);
                }
                break;
            }
            Err(HttpError::Io(e)) => {
                log::debug!("[http] {:?}: read failed: {}", ctx.peer, e);
                break;
            }
            Err(e) => {
                log::warn!("[http] {:?}: rejecting request: {}", ctx.peer, e);
                let response = HttpResponse::text(e.status(), &e.to_string()).closing();
                let opts = write_options(ctx.config, HttpVersion::Http11, false, false);
                if let Err(e) = write_response(&mut writer, response, opts) {
                    log::debug!("[http] {:?}: failed to send rejection: {}", ctx.peer, e);
                }
                break;
            }
        };

        served += 1;
        match exchange(&mut reader, &mut writer, head, ctx) {
            Ok(true) => continue,
            Ok(false) => break,
            Err(e) => {
                log::debug!("[http] {:?}: write failed: {}", ctx.peer, e);
                break;
            }
        }
    }
    served
}

fn write_options(
    config: &HttpServerConfig,
    version: HttpVersion,
    head_only: bool,
    keep_alive: bool,
) -> WriteOptions<'_> {
    WriteOptions {
        request_version: version,
        head_only,
        keep_alive,
        chunk_size: config.chunk_size,
        server_name: &config.server_name,
    }
}

fn seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs())
}

/// Handle one request whose head was already read. Returns whether the
/// connection stays open.
fn exchange<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    head: HttpRequestHeader,
    ctx: &ConnectionContext<'_>,
) -> io::Result<bool> {
    let keep_alive = ctx.config.keep_alive && head.wants_keep_alive();
    let opts = write_options(ctx.config, head.version, head.method == "HEAD", keep_alive);
    let expects_continue = head.version == HttpVersion::Http11
        && head
            .headers
            .get("Expect")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("100-continue"));

    let mut body = if head.headers.is_chunked() {
        RequestBody::chunked(reader)
    } else {
        match head.headers.content_length() {
            Ok(Some(len)) => RequestBody::fixed(reader, len),
            Ok(None) => RequestBody::empty(),
            Err(e) => {
                log::warn!("[http] {:?}: {}", ctx.peer, e);
                let response = HttpResponse::bad_request(&e.to_string());
                write_response(writer, response, opts)?;
                return Ok(false);
            }
        }
    };
    let has_body = body.declared_length() != Some(0);

    let awaiting_continue = expects_continue && has_body;

    let resolved = match ctx
        .registry
        .resolve(head.path(), head.media_type().as_deref(), ctx.config.backtracking)
    {
        Ok(Some(resolved)) => resolved,
        Ok(None) => {
            let response = HttpResponse::not_found();
            return finish_early(&mut body, writer, &head, response, opts, awaiting_continue);
        }
        Err(e) => {
            log::error!("[http] handler lookup failed: {}", e);
            let response = HttpResponse::text(500, "Internal Server Error").closing();
            return finish_early(&mut body, writer, &head, response, opts, awaiting_continue);
        }
    };

    let user = match &resolved.auth {
        Some(group) => match group.authenticate(head.headers.get("Authorization")) {
            Ok(user) => Some(user),
            Err(e) => {
                log::debug!("[http] {} {}: {}", head.method, head.target, e);
                let response = HttpResponse::unauthorized(group.challenge());
                return finish_early(&mut body, writer, &head, response, opts, awaiting_continue);
            }
        },
        None => None,
    };

    if head.method == "GET" || head.method == "HEAD" {
        let since = head.headers.get("If-Modified-Since").and_then(parse_http_date);
        if let (Some(since), Some(modified)) = (since, resolved.handler.last_modified(&head)) {
            if seconds(modified) <= seconds(since) {
                let response = HttpResponse::not_modified().with_last_modified(modified);
                return finish_early(&mut body, writer, &head, response, opts, false);
            }
        }
    }

    if awaiting_continue {
        writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n")?;
        writer.flush()?;
    }

    let method = head.method.clone();
    let target = head.target.clone();
    let mut request = HttpRequest {
        header: head,
        peer: ctx.peer,
        body,
        user,
    };
    let (response, drained) = match resolved.handler.handle(&mut request) {
        Ok(response) => {
            let drained = request.body.drain().is_ok();
            (response, drained)
        }
        Err(e) => {
            log::warn!("[http] {} {}: handler failed: {}", method, target, e);
            (HttpResponse::text(e.status, &e.message).closing(), false)
        }
    };
    let response = if drained { response } else { response.closing() };

    log::debug!("[http] {:?} {} {} -> {}", ctx.peer, method, target, response.status);
    write_response(writer, response, opts)
}

/// Answer without invoking the handler. The body is drained unless the
/// client is still waiting for `100 Continue`, in which case the
/// connection is closed instead.
fn finish_early<W: Write>(
    body: &mut RequestBody<'_>,
    writer: &mut W,
    head: &HttpRequestHeader,
    response: HttpResponse,
    opts: WriteOptions<'_>,
    awaiting_continue: bool,
) -> io::Result<bool> {
    let response = if awaiting_continue || body.drain().is_err() {
        response.closing()
    } else {
        response
    };
    log::debug!("[http] {} {} -> {}", head.method, head.target, response.status);
    write_response(writer, response, opts)
}
