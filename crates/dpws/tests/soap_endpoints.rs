// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test code readability over pedantic
#![allow(clippy::missing_panics_doc)] // Tests panic on failure

//! SOAP endpoint integration tests: HTTP binding with attachments, UDP
//! binding with repetition, and generation translation on the wire.

use dpws::config::{
    DpwsConfig, HttpServerConfig, RepeatConfig, WorkerPoolConfig, MAX_DATAGRAM_SIZE,
};
use dpws::http::{HandlerRegistry, HeadLimits, HttpResponseHeader, HttpServer};
use dpws::message::{
    DeviceMetadata, DiscoveryData, EndpointReference, Message, MessageBody, MessageKind, QName,
    ThisModel,
};
use dpws::mime::MultipartReader;
use dpws::protocol::{translate_outgoing, ProtocolVersion};
use dpws::rt::WorkerPool;
use dpws::soap::{
    Exchange, MessageGenerator, MessageReceiver, SoapCodec, SoapError, SoapHttpHandler,
    UdpOutbound,
};
use std::io::{BufReader, Cursor, Read, Write};
use std::net::{Ipv4Addr, TcpStream, UdpSocket};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn device_hello() -> Message {
    let current = ProtocolVersion::Current.vocabulary();
    Message::new(MessageBody::Hello(
        DiscoveryData::new(EndpointReference::new("urn:uuid:5f1d3c4e-0000-4000-8000-000000000001"))
            .with_type(current.device_type())
            .with_type(QName::new("http://example.org/printer", "PrinterServiceType"))
            .with_scope("http://example.org/lab")
            .with_xaddr("http://10.0.0.7:5357/device"),
    ))
}

#[test]
fn test_hello_translation_round_trip() {
    let original = device_hello();
    let legacy = ProtocolVersion::Legacy.vocabulary();

    let translated = translate_outgoing(&original, ProtocolVersion::Legacy);
    assert_eq!(translated.header.action, legacy.action(MessageKind::Hello));
    assert_eq!(translated.header.to.as_deref(), Some(legacy.adhoc_to));
    match &translated.body {
        MessageBody::Hello(data) => assert!(data.types.contains(&legacy.device_type())),
        other => panic!("unexpected body {:?}", other),
    }

    let wire = SoapCodec.encode(&original, ProtocolVersion::Legacy).unwrap();
    let decoded = SoapCodec.decode(&wire).unwrap();
    assert_eq!(decoded.version, ProtocolVersion::Legacy);
    assert_eq!(decoded.message, original);
}

// ---------------------------------------------------------------------------
// SOAP over HTTP
// ---------------------------------------------------------------------------

fn post(addr: std::net::SocketAddr, content_type: &str, body: &[u8]) -> (u16, Vec<u8>) {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    write!(
        stream,
        "POST /device HTTP/1.1\r\nHost: t\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        content_type,
        body.len()
    )
    .unwrap();
    stream.write_all(body).unwrap();

    let mut reader = BufReader::new(stream);
    let head = HttpResponseHeader::read_from(&mut reader, HeadLimits::default())
        .unwrap()
        .unwrap();
    let len = head.headers.content_length().unwrap().unwrap_or(0);
    let mut out = vec![0u8; len as usize];
    reader.read_exact(&mut out).unwrap();
    (head.status, out)
}

fn start_soap_server(receiver: Arc<dyn MessageReceiver>) -> (HttpServer, WorkerPool) {
    let pool = WorkerPool::new(WorkerPoolConfig::default().with_name("soap-test")).unwrap();
    let registry = HandlerRegistry::new();
    registry
        .register("/device", None, Arc::new(SoapHttpHandler::new(receiver)))
        .unwrap();
    let config = HttpServerConfig::default()
        .with_port(0)
        .with_bind_address(Ipv4Addr::LOCALHOST.into());
    let server = HttpServer::start(config, Arc::new(registry), pool.clone()).unwrap();
    (server, pool)
}

fn metadata_receiver() -> Arc<dyn MessageReceiver> {
    Arc::new(
        |msg: Message, exchange: &mut Exchange| -> Result<(), SoapError> {
            match msg.body {
                MessageBody::Get => {
                    let metadata = DeviceMetadata {
                        this_model: Some(ThisModel {
                            manufacturer: "Acme".into(),
                            model_name: "Printer 9000".into(),
                            ..Default::default()
                        }),
                        ..Default::default()
                    };
                    exchange.respond(msg.reply(MessageBody::GetResponse(metadata)))
                }
                MessageBody::Hello(_) => Ok(()),
                _ => Err(SoapError::Receiver("unsupported".into())),
            }
        },
    )
}

#[test]
fn test_legacy_get_answered_in_legacy_generation() {
    let (mut server, pool) = start_soap_server(metadata_receiver());
    let get = Message::new(MessageBody::Get);
    let body = SoapCodec.encode(&get, ProtocolVersion::Legacy).unwrap();

    let (status, reply) = post(server.local_addr(), "application/soap+xml", &body);
    assert_eq!(status, 200);
    let decoded = SoapCodec.decode(&reply).unwrap();
    assert_eq!(decoded.version, ProtocolVersion::Legacy);
    assert_eq!(
        decoded.message.header.relates_to.as_deref(),
        Some(get.header.message_id.as_str())
    );
    match decoded.message.body {
        MessageBody::GetResponse(meta) => {
            assert_eq!(meta.this_model.unwrap().model_name, "Printer 9000")
        }
        other => panic!("unexpected body {:?}", other),
    }

    let hello = SoapCodec.encode(&device_hello(), ProtocolVersion::Current).unwrap();
    let (status, _) = post(server.local_addr(), "application/soap+xml", &hello);
    assert_eq!(status, 202);

    server.stop();
    pool.shutdown();
}

#[test]
fn test_attachments_reach_receiver() {
    let receiver: Arc<dyn MessageReceiver> = Arc::new(
        |msg: Message, exchange: &mut Exchange| -> Result<(), SoapError> {
            let names: Vec<String> = exchange
                .attachments()
                .iter()
                .map(|a| {
                    format!(
                        "{}={}",
                        a.content_id.clone().unwrap_or_default(),
                        String::from_utf8_lossy(&a.data)
                    )
                })
                .collect();
            let metadata = DeviceMetadata {
                this_model: Some(ThisModel {
                    model_name: names.join(","),
                    ..Default::default()
                }),
                ..Default::default()
            };
            exchange.respond(msg.reply(MessageBody::GetResponse(metadata)))
        },
    );
    let (mut server, pool) = start_soap_server(receiver);

    let envelope = SoapCodec
        .encode(&Message::new(MessageBody::Get), ProtocolVersion::Current)
        .unwrap();
    let mut body = Vec::new();
    body.extend_from_slice(b"--MIMEb\r\nContent-Type: application/xop+xml\r\nContent-ID: <root>\r\n\r\n");
    body.extend_from_slice(&envelope);
    body.extend_from_slice(b"\r\n--MIMEb\r\nContent-ID: <a1>\r\n\r\nfirst");
    body.extend_from_slice(b"\r\n--MIMEb\r\nContent-ID: <a2>\r\n\r\nsecond\r\n--MIMEb--\r\n");

    let (status, reply) = post(
        server.local_addr(),
        "multipart/related; boundary=MIMEb; start=\"<root>\"",
        &body,
    );
    assert_eq!(status, 200);
    match SoapCodec.decode(&reply).unwrap().message.body {
        MessageBody::GetResponse(meta) => {
            assert_eq!(meta.this_model.unwrap().model_name, "a1=first,a2=second")
        }
        other => panic!("unexpected body {:?}", other),
    }

    server.stop();
    pool.shutdown();
}

#[test]
fn test_three_part_body_advances_true_true_false() {
    let body = "preamble\r\n--sep\r\nContent-ID: <p1>\r\n\r\none\r\n--sep\r\n\r\ntwo\r\n--sep\r\nX-Part: 3\r\n\r\nthree\r\n--sep--\r\nepilogue";
    let mut reader = MultipartReader::new(Cursor::new(body.as_bytes().to_vec()), "sep").unwrap();

    let mut contents = Vec::new();
    let mut advances = Vec::new();
    loop {
        let mut data = String::new();
        reader.part().unwrap().read_to_string(&mut data).unwrap();
        contents.push(data);
        let more = reader.advance_to_next_part().unwrap();
        advances.push(more);
        if !more {
            break;
        }
    }
    assert_eq!(advances, vec![true, true, false]);
    assert_eq!(contents, vec!["one", "two", "three"]);
}

// ---------------------------------------------------------------------------
// SOAP over UDP
// ---------------------------------------------------------------------------

#[test]
fn test_multicast_repeats_with_growing_capped_delays() {
    let sink = UdpSocket::bind("127.0.0.1:0").unwrap();
    sink.set_read_timeout(Some(Duration::from_secs(3))).unwrap();
    let pool = WorkerPool::new(WorkerPoolConfig::default().with_name("udp-test")).unwrap();
    let config = DpwsConfig::default().with_multicast_repeat(RepeatConfig::new(3, 20, 40, 60));
    let outbound = UdpOutbound::new(
        Arc::new(UdpSocket::bind("127.0.0.1:0").unwrap()),
        pool.clone(),
        &config,
    )
    .unwrap()
    .with_group(sink.local_addr().unwrap());

    let hello = device_hello();
    outbound.send_multicast(&hello).unwrap();

    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let mut arrivals = Vec::new();
    for _ in 0..4 {
        let (len, _) = sink.recv_from(&mut buf).unwrap();
        arrivals.push(Instant::now());
        let decoded = SoapCodec.decode(&buf[..len]).unwrap();
        assert_eq!(decoded.message.header.message_id, hello.header.message_id);
    }
    sink.set_read_timeout(Some(Duration::from_millis(300))).unwrap();
    assert!(sink.recv_from(&mut buf).is_err(), "more than 1+3 transmissions");

    let gaps: Vec<Duration> = arrivals.windows(2).map(|w| w[1] - w[0]).collect();
    let slack = Duration::from_millis(15);
    assert!(gaps[0] + slack >= Duration::from_millis(20));
    for pair in gaps.windows(2) {
        assert!(pair[1] + slack >= pair[0], "delays shrank: {:?}", gaps);
    }
    assert!(gaps.iter().all(|g| *g <= Duration::from_millis(60) + Duration::from_millis(100)));
    pool.shutdown();
}
