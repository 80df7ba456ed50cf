// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test code readability over pedantic
#![allow(clippy::missing_panics_doc)] // Tests panic on failure

//! HTTP server integration tests over loopback TCP.

use dpws::config::{HttpServerConfig, WorkerPoolConfig};
use dpws::http::{
    basic_authorization, format_http_date, AuthGroup, HandlerError, HandlerRegistry, HeadLimits,
    HttpHandler, HttpRequest, HttpResponse, HttpResponseHeader, HttpServer, StaticResource,
};
use dpws::rt::WorkerPool;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{Ipv4Addr, TcpStream};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

struct Fixture {
    server: HttpServer,
    pool: WorkerPool,
}

impl Fixture {
    fn start(config: HttpServerConfig, registry: HandlerRegistry) -> Self {
        let pool = WorkerPool::new(WorkerPoolConfig::default().with_name("http-test")).unwrap();
        let config = config
            .with_port(0)
            .with_bind_address(Ipv4Addr::LOCALHOST.into());
        let server = HttpServer::start(config, Arc::new(registry), pool.clone()).unwrap();
        Self { server, pool }
    }

    fn connect(&self) -> Client {
        let stream = TcpStream::connect(self.server.local_addr()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        Client {
            writer: stream.try_clone().unwrap(),
            reader: BufReader::new(stream),
        }
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.server.stop();
        self.pool.shutdown();
    }
}

struct Client {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

impl Client {
    fn send(&mut self, raw: &str) {
        self.writer.write_all(raw.as_bytes()).unwrap();
    }

    fn response(&mut self) -> Option<(HttpResponseHeader, String)> {
        let head = HttpResponseHeader::read_from(&mut self.reader, HeadLimits::default()).ok()??;
        let len = head.headers.content_length().ok()?.unwrap_or(0);
        let mut body = vec![0u8; len as usize];
        self.reader.read_exact(&mut body).ok()?;
        Some((head, String::from_utf8(body).ok()?))
    }

    fn is_closed(&mut self) -> bool {
        match self.reader.fill_buf() {
            Ok(buf) => buf.is_empty(),
            Err(_) => true,
        }
    }
}

fn tagged(tag: &'static str) -> Arc<dyn HttpHandler> {
    Arc::new(
        move |req: &mut HttpRequest<'_>| -> Result<HttpResponse, HandlerError> {
            let mut body = String::new();
            req.body.read_to_string(&mut body)?;
            Ok(HttpResponse::ok()
                .with_content_type("text/plain")
                .with_body(format!("{}:{}:{}", tag, req.path(), body).into_bytes()))
        },
    )
}

#[test]
fn test_media_type_specific_handler_wins() {
    let registry = HandlerRegistry::new();
    registry.register("/x", None, tagged("generic")).unwrap();
    registry
        .register("/x", Some("application/soap+xml"), tagged("soap"))
        .unwrap();
    let fixture = Fixture::start(HttpServerConfig::default(), registry);
    let mut client = fixture.connect();

    client.send(
        "POST /x HTTP/1.1\r\nHost: t\r\nContent-Type: application/soap+xml; charset=utf-8\r\nContent-Length: 2\r\n\r\nhi",
    );
    let (head, body) = client.response().unwrap();
    assert_eq!(head.status, 200);
    assert_eq!(body, "soap:/x:hi");

    client.send("POST /x HTTP/1.1\r\nHost: t\r\nContent-Type: text/plain\r\nContent-Length: 2\r\n\r\nho");
    let (_, body) = client.response().unwrap();
    assert_eq!(body, "generic:/x:ho");
}

#[test]
fn test_keep_alive_pipelined_requests_answer_in_order() {
    let registry = HandlerRegistry::new();
    registry.register("/a", None, tagged("a")).unwrap();
    registry.register("/b", None, tagged("b")).unwrap();
    let fixture = Fixture::start(HttpServerConfig::default(), registry);
    let mut client = fixture.connect();

    client.send(concat!(
        "POST /a HTTP/1.1\r\nHost: t\r\nContent-Length: 1\r\n\r\n1",
        "POST /b HTTP/1.1\r\nHost: t\r\nContent-Length: 1\r\n\r\n2",
        "GET /a HTTP/1.1\r\nHost: t\r\n\r\n",
    ));
    let bodies: Vec<String> = (0..3).map(|_| client.response().unwrap().1).collect();
    assert_eq!(bodies, vec!["a:/a:1", "b:/b:2", "a:/a:"]);
    assert_eq!(fixture.server.connections_accepted(), 1);
}

#[test]
fn test_conditional_get_not_modified() {
    let modified = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    let registry = HandlerRegistry::new();
    registry
        .register(
            "/wsdl",
            None,
            Arc::new(StaticResource::with_last_modified(
                "text/xml",
                b"<definitions/>".to_vec(),
                modified,
            )),
        )
        .unwrap();
    let fixture = Fixture::start(HttpServerConfig::default(), registry);
    let mut client = fixture.connect();

    client.send(&format!(
        "GET /wsdl HTTP/1.1\r\nHost: t\r\nIf-Modified-Since: {}\r\n\r\n",
        format_http_date(modified)
    ));
    let (head, body) = client.response().unwrap();
    assert_eq!(head.status, 304);
    assert!(body.is_empty());

    let earlier = modified - Duration::from_secs(60);
    client.send(&format!(
        "GET /wsdl HTTP/1.1\r\nHost: t\r\nIf-Modified-Since: {}\r\n\r\n",
        format_http_date(earlier)
    ));
    let (head, body) = client.response().unwrap();
    assert_eq!(head.status, 200);
    assert_eq!(body, "<definitions/>");
    assert_eq!(
        head.headers.get("Last-Modified"),
        Some(format_http_date(modified).as_str())
    );
}

#[test]
fn test_basic_auth_challenge_then_success() {
    let registry = HandlerRegistry::new();
    registry
        .add_auth_group(AuthGroup::new("ops").with_user("alice", "secret"))
        .unwrap();
    let whoami: Arc<dyn HttpHandler> = Arc::new(
        |req: &mut HttpRequest<'_>| -> Result<HttpResponse, HandlerError> {
            Ok(HttpResponse::ok().with_body(req.user.clone().unwrap_or_default().into_bytes()))
        },
    );
    registry
        .register_with_auth("/admin", None, whoami, "ops")
        .unwrap();
    let fixture = Fixture::start(HttpServerConfig::default(), registry);
    let mut client = fixture.connect();

    client.send("GET /admin HTTP/1.1\r\nHost: t\r\n\r\n");
    let (head, _) = client.response().unwrap();
    assert_eq!(head.status, 401);
    assert!(head.headers.get("WWW-Authenticate").is_some());

    client.send(&format!(
        "GET /admin HTTP/1.1\r\nHost: t\r\nAuthorization: {}\r\n\r\n",
        basic_authorization("alice", "secret")
    ));
    let (head, body) = client.response().unwrap();
    assert_eq!(head.status, 200);
    assert_eq!(body, "alice");
}

#[test]
fn test_malformed_request_closes_connection() {
    let fixture = Fixture::start(HttpServerConfig::default(), HandlerRegistry::new());
    let mut client = fixture.connect();
    client.send("THIS IS NOT HTTP\r\n\r\n");
    let (head, _) = client.response().unwrap();
    assert_eq!(head.status, 400);
    assert!(client.is_closed());
}

#[test]
fn test_idle_connection_closed_by_watchdog() {
    let config = HttpServerConfig::default().with_request_timeout(Duration::from_millis(200));
    let fixture = Fixture::start(config, HandlerRegistry::new());
    let mut client = fixture.connect();

    std::thread::sleep(Duration::from_millis(600));
    assert!(client.is_closed());
}

#[test]
fn test_stop_releases_port() {
    let mut fixture = Fixture::start(HttpServerConfig::default(), HandlerRegistry::new());
    let addr = fixture.server.local_addr();
    fixture.server.stop();
    assert!(TcpStream::connect_timeout(&addr, Duration::from_millis(200)).is_err());
}
