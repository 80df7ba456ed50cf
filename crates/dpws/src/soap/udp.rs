// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SOAP-over-UDP binding.
//!
//! A dedicated thread polls the socket with mio and drains every readable
//! datagram; each datagram becomes one worker pool task which decodes it,
//! drops duplicates, invokes the receiver and sends any response back to
//! the sender with unicast repetition.

use super::codec::SoapCodec;
use super::repeat::RepeatSender;
use super::{Exchange, MessageGenerator, MessageReceiver, Transport};
use crate::config::{discovery_multicast_addr, DpwsConfig, MAX_DATAGRAM_SIZE};
use crate::error::{Error, Result};
use crate::message::{AppSequencer, Message, MessageKind};
use crate::net::{bind_discovery_socket, detect_interfaces, join_discovery_group};
use crate::protocol::ProtocolVersion;
use crate::rt::WorkerPool;
use lru::LruCache;
use mio::{Events, Interest, Poll, Token};
use parking_lot::Mutex;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const SOCKET_TOKEN: Token = Token(0);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Remembers recent message ids so repeated datagrams are handled once.
pub struct DuplicateFilter {
    seen: Mutex<LruCache<String, ()>>,
}

impl DuplicateFilter {
    /// Filter remembering at most `capacity` ids (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            seen: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Record `message_id`; true when it was already seen.
    ///
    /// Empty ids are never considered duplicates.
    pub fn is_duplicate(&self, message_id: &str) -> bool {
        if message_id.is_empty() {
            return false;
        }
        let mut seen = self.seen.lock();
        if seen.get(message_id).is_some() {
            return true;
        }
        seen.put(message_id.to_string(), ());
        false
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for DuplicateFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateFilter")
            .field("len", &self.len())
            .finish()
    }
}

/// Outgoing SOAP-over-UDP traffic of one endpoint.
///
/// Multicast messages go to the discovery group in the configured
/// generation; unicast replies go in whatever generation the request used.
/// Hello, Bye and match responses are stamped with an `AppSequence`.
pub struct UdpOutbound {
    generator: Arc<dyn MessageGenerator>,
    multicast: RepeatSender,
    unicast: RepeatSender,
    version: ProtocolVersion,
    group: SocketAddr,
    sequencer: AppSequencer,
}

impl UdpOutbound {
    pub fn new(socket: Arc<UdpSocket>, pool: WorkerPool, config: &DpwsConfig) -> io::Result<Self> {
        let ipv6 = socket.local_addr()?.is_ipv6();
        let multicast = RepeatSender::new(socket, config.multicast_repeat).with_pool(pool);
        let unicast = multicast.with_config(config.unicast_repeat);
        Ok(Self {
            generator: Arc::new(SoapCodec),
            multicast,
            unicast,
            version: config.protocol_version,
            group: discovery_multicast_addr(ipv6),
            sequencer: AppSequencer::new(),
        })
    }

    pub fn with_generator(mut self, generator: Arc<dyn MessageGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Send to a different multicast destination (tests, non-standard ports).
    pub fn with_group(mut self, group: SocketAddr) -> Self {
        self.group = group;
        self
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn group(&self) -> SocketAddr {
        self.group
    }

    /// Multicast `message` to the discovery group.
    pub fn send_multicast(&self, message: &Message) -> Result<()> {
        crate::trace_fn!("UdpOutbound::send_multicast");
        let bytes = self.encode(message, self.version)?;
        log::debug!(
            "[soap-udp] multicast {:?} ({} bytes) to {}",
            message.kind(),
            bytes.len(),
            self.group
        );
        self.multicast.send(bytes, self.group)
    }

    /// Unicast `message` to `dest` in `version`.
    pub fn send_unicast(
        &self,
        message: &Message,
        dest: SocketAddr,
        version: ProtocolVersion,
    ) -> Result<()> {
        let bytes = self.encode(message, version)?;
        log::debug!(
            "[soap-udp] unicast {:?} ({} bytes) to {}",
            message.kind(),
            bytes.len(),
            dest
        );
        self.unicast.send(bytes, dest)
    }

    /// Stop pending repeats.
    pub fn cancel(&self) {
        self.multicast.cancel();
    }

    fn encode(&self, message: &Message, version: ProtocolVersion) -> Result<Vec<u8>> {
        let sequenced = matches!(
            message.kind(),
            MessageKind::Hello
                | MessageKind::Bye
                | MessageKind::ProbeMatches
                | MessageKind::ResolveMatches
        );
        let bytes = if sequenced && message.header.app_sequence.is_none() {
            let stamped = message.clone().with_app_sequence(self.sequencer.next());
            self.generator.encode(&stamped, version)?
        } else {
            self.generator.encode(message, version)?
        };
        if bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(Error::Send(format!(
                "{:?} envelope of {} bytes exceeds datagram size",
                message.kind(),
                bytes.len()
            )));
        }
        Ok(bytes)
    }
}

impl std::fmt::Debug for UdpOutbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpOutbound")
            .field("version", &self.version)
            .field("group", &self.group)
            .finish()
    }
}

/// Receive-side counters.
#[derive(Debug, Default)]
pub struct UdpMetrics {
    pub datagrams_received: AtomicU64,
    pub bytes_received: AtomicU64,
    pub duplicates_dropped: AtomicU64,
    pub decode_errors: AtomicU64,
    pub responses_sent: AtomicU64,
    pub tasks_rejected: AtomicU64,
}

impl UdpMetrics {
    /// `(received, bytes, duplicates, decode_errors, responses, rejected)`
    pub fn snapshot(&self) -> (u64, u64, u64, u64, u64, u64) {
        (
            self.datagrams_received.load(Ordering::Relaxed),
            self.bytes_received.load(Ordering::Relaxed),
            self.duplicates_dropped.load(Ordering::Relaxed),
            self.decode_errors.load(Ordering::Relaxed),
            self.responses_sent.load(Ordering::Relaxed),
            self.tasks_rejected.load(Ordering::Relaxed),
        )
    }
}

struct Dispatch {
    generator: Arc<dyn MessageGenerator>,
    receiver: Arc<dyn MessageReceiver>,
    filter: DuplicateFilter,
    outbound: Arc<UdpOutbound>,
    metrics: Arc<UdpMetrics>,
}

impl Dispatch {
    fn handle_datagram(&self, data: &[u8], peer: SocketAddr) {
        crate::trace_fn!("SoapUdpServer::handle_datagram");
        let decoded = match self.generator.decode(data) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.metrics.decode_errors.fetch_add(1, Ordering::Relaxed);
                log::debug!("[soap-udp] dropping datagram from {}: {}", peer, e);
                return;
            }
        };
        if self.filter.is_duplicate(&decoded.message.header.message_id) {
            self.metrics.duplicates_dropped.fetch_add(1, Ordering::Relaxed);
            log::trace!(
                "[soap-udp] duplicate {} from {}",
                decoded.message.header.message_id,
                peer
            );
            return;
        }

        let kind = decoded.message.kind();
        let mut exchange = Exchange::new(Transport::Udp { peer }, decoded.version);
        if let Err(e) = self.receiver.receive(decoded.message, &mut exchange) {
            log::debug!("[soap-udp] receiver failed on {:?} from {}: {}", kind, peer, e);
            return;
        }
        let Some(response) = exchange.take_response() else {
            return;
        };
        match self
            .outbound
            .send_unicast(&response, peer, exchange.version())
        {
            Ok(()) => {
                self.metrics.responses_sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => log::warn!("[soap-udp] response to {} failed: {}", peer, e),
        }
    }
}

/// SOAP-over-UDP endpoint: receive loop plus outbound sender.
pub struct SoapUdpServer {
    local_addr: SocketAddr,
    outbound: Arc<UdpOutbound>,
    metrics: Arc<UdpMetrics>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SoapUdpServer {
    /// Bind the discovery port from `config` and join the multicast group
    /// on every capable interface.
    pub fn bind(
        config: &DpwsConfig,
        receiver: Arc<dyn MessageReceiver>,
        pool: WorkerPool,
    ) -> Result<Self> {
        let socket = bind_discovery_socket(config.discovery_port, false)?;
        let outgoing = join_discovery_group(&socket, &detect_interfaces())?;
        log::info!(
            "[soap-udp] discovery socket on port {} (outgoing interface {})",
            config.discovery_port,
            outgoing
        );
        Self::start(socket, receiver, pool, config)
    }

    /// Serve an already bound socket.
    pub fn start(
        socket: UdpSocket,
        receiver: Arc<dyn MessageReceiver>,
        pool: WorkerPool,
        config: &DpwsConfig,
    ) -> Result<Self> {
        crate::trace_fn!("SoapUdpServer::start");
        config.validate()?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;
        let socket = Arc::new(socket);

        let outbound = Arc::new(UdpOutbound::new(socket.clone(), pool.clone(), config)?);
        let metrics = Arc::new(UdpMetrics::default());
        let dispatch = Arc::new(Dispatch {
            generator: Arc::new(SoapCodec),
            receiver,
            filter: DuplicateFilter::new(config.duplicate_cache_size),
            outbound: outbound.clone(),
            metrics: metrics.clone(),
        });
        let running = Arc::new(AtomicBool::new(true));

        let loop_socket = socket.try_clone()?;
        let loop_running = running.clone();
        let handle = std::thread::Builder::new()
            .name("dpws-udp-rx".to_string())
            .spawn(move || Self::run_loop(loop_socket, dispatch, pool, loop_running))?;

        log::info!("[soap-udp] listening on {}", local_addr);
        Ok(Self {
            local_addr,
            outbound,
            metrics,
            running,
            handle: Some(handle),
        })
    }

    fn run_loop(
        socket: UdpSocket,
        dispatch: Arc<Dispatch>,
        pool: WorkerPool,
        running: Arc<AtomicBool>,
    ) {
        let mut poll = match Poll::new() {
            Ok(p) => p,
            Err(e) => {
                log::error!("[soap-udp] cannot create poll: {}", e);
                return;
            }
        };
        let mut events = Events::with_capacity(16);
        let mut socket = mio::net::UdpSocket::from_std(socket);
        if let Err(e) = poll
            .registry()
            .register(&mut socket, SOCKET_TOKEN, Interest::READABLE)
        {
            log::error!("[soap-udp] cannot register socket: {}", e);
            return;
        }

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        while running.load(Ordering::Relaxed) {
            if let Err(e) = poll.poll(&mut events, Some(POLL_INTERVAL)) {
                if e.kind() != io::ErrorKind::Interrupted {
                    log::debug!("[soap-udp] poll error: {}", e);
                }
                continue;
            }

            for event in events.iter() {
                if event.token() != SOCKET_TOKEN {
                    continue;
                }
                loop {
                    let (len, peer) = match socket.recv_from(&mut buf) {
                        Ok(result) => result,
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                        Err(e) => {
                            log::debug!("[soap-udp] recv_from error: {}", e);
                            break;
                        }
                    };
                    dispatch
                        .metrics
                        .datagrams_received
                        .fetch_add(1, Ordering::Relaxed);
                    dispatch
                        .metrics
                        .bytes_received
                        .fetch_add(len as u64, Ordering::Relaxed);

                    let data = buf[..len].to_vec();
                    let task = dispatch.clone();
                    if let Err(e) = pool.submit(move || task.handle_datagram(&data, peer)) {
                        dispatch
                            .metrics
                            .tasks_rejected
                            .fetch_add(1, Ordering::Relaxed);
                        log::debug!("[soap-udp] dropping datagram from {}: {}", peer, e);
                    }
                }
            }
        }
        log::debug!("[soap-udp] receive loop stopped");
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Sender sharing this endpoint's socket.
    pub fn outbound(&self) -> Arc<UdpOutbound> {
        self.outbound.clone()
    }

    pub fn metrics(&self) -> &UdpMetrics {
        &self.metrics
    }

    /// Stop the receive loop and pending repeats. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        self.outbound.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("[soap-udp] receive thread panicked");
            }
        }
    }
}

impl Drop for SoapUdpServer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for SoapUdpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoapUdpServer")
            .field("local_addr", &self.local_addr)
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RepeatConfig, WorkerPoolConfig};
    use crate::message::{
        DiscoveryData, EndpointReference, MessageBody, Probe, ProbeMatches,
    };
    use crate::soap::SoapError;
    use std::time::Instant;

    fn test_config() -> DpwsConfig {
        DpwsConfig::default()
            .with_multicast_repeat(RepeatConfig::once())
            .with_unicast_repeat(RepeatConfig::once())
    }

    fn loopback() -> UdpSocket {
        UdpSocket::bind("127.0.0.1:0").unwrap()
    }

    fn recv_message(socket: &UdpSocket) -> Option<(Message, ProtocolVersion)> {
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, _) = socket.recv_from(&mut buf).ok()?;
        let decoded = SoapCodec.decode(&buf[..len]).ok()?;
        Some((decoded.message, decoded.version))
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        cond()
    }

    #[test]
    fn test_duplicate_filter() {
        let filter = DuplicateFilter::new(2);
        assert!(!filter.is_duplicate("urn:uuid:a"));
        assert!(filter.is_duplicate("urn:uuid:a"));
        assert!(!filter.is_duplicate("urn:uuid:b"));
        assert!(!filter.is_duplicate("urn:uuid:c"));
        // "a" was evicted by capacity
        assert!(!filter.is_duplicate("urn:uuid:a"));
        assert!(!filter.is_duplicate(""));
        assert!(!filter.is_duplicate(""));
    }

    #[test]
    fn test_probe_answered_in_request_generation() {
        let target = EndpointReference::random();
        let answer = target.clone();
        let receiver: Arc<dyn MessageReceiver> = Arc::new(
            move |msg: Message, exchange: &mut Exchange| -> std::result::Result<(), SoapError> {
                if let MessageBody::Probe(_) = msg.body {
                    let matches = ProbeMatches {
                        matches: vec![DiscoveryData::new(answer.clone())],
                    };
                    exchange.respond(msg.reply(MessageBody::ProbeMatches(matches)))?;
                }
                Ok(())
            },
        );
        let pool = WorkerPool::new(WorkerPoolConfig::default()).unwrap();
        let mut server =
            SoapUdpServer::start(loopback(), receiver, pool.clone(), &test_config()).unwrap();

        let client = loopback();
        let probe = Message::new(MessageBody::Probe(Probe::default()));
        let bytes = SoapCodec.encode(&probe, ProtocolVersion::Legacy).unwrap();
        client.send_to(&bytes, server.local_addr()).unwrap();

        let (reply, version) = recv_message(&client).expect("no ProbeMatches");
        assert_eq!(version, ProtocolVersion::Legacy);
        assert_eq!(
            reply.header.relates_to.as_deref(),
            Some(probe.header.message_id.as_str())
        );
        assert!(reply.header.app_sequence.is_some());
        match reply.body {
            MessageBody::ProbeMatches(m) => assert_eq!(m.matches[0].endpoint_reference, target),
            other => panic!("unexpected body {:?}", other),
        }

        server.stop();
        pool.shutdown();
    }

    #[test]
    fn test_duplicates_and_garbage_dropped() {
        let calls = Arc::new(AtomicU64::new(0));
        let seen = calls.clone();
        let receiver: Arc<dyn MessageReceiver> = Arc::new(
            move |_msg: Message, _ex: &mut Exchange| -> std::result::Result<(), SoapError> {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        );
        let pool = WorkerPool::new(WorkerPoolConfig::default()).unwrap();
        let mut server =
            SoapUdpServer::start(loopback(), receiver, pool.clone(), &test_config()).unwrap();

        let client = loopback();
        let hello = Message::new(MessageBody::Hello(DiscoveryData::new(
            EndpointReference::random(),
        )));
        let bytes = SoapCodec.encode(&hello, ProtocolVersion::Current).unwrap();
        for _ in 0..3 {
            client.send_to(&bytes, server.local_addr()).unwrap();
        }
        client.send_to(b"not xml", server.local_addr()).unwrap();

        assert!(wait_until(|| server.metrics().snapshot().0 == 4));
        assert!(wait_until(|| {
            let (_, _, dup, bad, _, _) = server.metrics().snapshot();
            dup == 2 && bad == 1
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        server.stop();
        pool.shutdown();
    }

    #[test]
    fn test_multicast_uses_configured_generation() {
        let sink = loopback();
        let pool = WorkerPool::new(WorkerPoolConfig::default()).unwrap();
        let config = test_config().with_protocol_version(ProtocolVersion::Legacy);
        let outbound = UdpOutbound::new(Arc::new(loopback()), pool.clone(), &config)
            .unwrap()
            .with_group(sink.local_addr().unwrap());

        let hello = Message::new(MessageBody::Hello(DiscoveryData::new(
            EndpointReference::random(),
        )));
        outbound.send_multicast(&hello).unwrap();
        outbound.send_multicast(&hello).unwrap();

        let (first, version) = recv_message(&sink).expect("no Hello");
        let (second, _) = recv_message(&sink).expect("no second Hello");
        assert_eq!(version, ProtocolVersion::Legacy);
        assert_eq!(first.kind(), MessageKind::Hello);
        let (a, b) = (
            first.header.app_sequence.unwrap(),
            second.header.app_sequence.unwrap(),
        );
        assert_eq!(a.instance_id, b.instance_id);
        assert!(b.message_number > a.message_number);
        pool.shutdown();
    }

    #[test]
    fn test_stop_is_idempotent() {
        let receiver: Arc<dyn MessageReceiver> = Arc::new(
            |_m: Message, _e: &mut Exchange| -> std::result::Result<(), SoapError> { Ok(()) },
        );
        let pool = WorkerPool::new(WorkerPoolConfig::default()).unwrap();
        let mut server =
            SoapUdpServer::start(loopback(), receiver, pool.clone(), &test_config()).unwrap();
        server.stop();
        server.stop();
        pool.shutdown();
    }
}
