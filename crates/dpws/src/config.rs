// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DPWS engine configuration - single source of protocol constants.
//!
//! - **Level 1 (Static)**: wire constants (multicast groups, ports, media types)
//! - **Level 2 (Dynamic)**: plain config structs with `Default`, builder
//!   methods and `validate()`
//!
//! ```
//! use dpws::config::{DpwsConfig, HttpServerConfig, RepeatConfig};
//! use std::time::Duration;
//!
//! let config = DpwsConfig::default()
//!     .with_http(HttpServerConfig::default().with_port(0))
//!     .with_multicast_repeat(RepeatConfig::new(3, 50, 100, 400));
//! assert!(config.validate().is_ok());
//! ```

use crate::error::{Error, Result};
use crate::protocol::ProtocolVersion;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

// =======================================================================
// SOAP-over-UDP / WS-Discovery wire constants
// =======================================================================

/// WS-Discovery IPv4 multicast group.
pub const DISCOVERY_MULTICAST_V4: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// WS-Discovery IPv6 link-local multicast group (FF02::C).
pub const DISCOVERY_MULTICAST_V6: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0x000c);

/// WS-Discovery UDP port (IANA registered).
pub const DISCOVERY_PORT: u16 = 3702;

/// Largest datagram the UDP receive loop accepts.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Environment variable selecting the outgoing multicast interface.
pub const MULTICAST_IF_ENV: &str = "DPWS_MULTICAST_IF";

// =======================================================================
// HTTP constants
// =======================================================================

/// Media type of SOAP 1.2 envelopes.
pub const SOAP_MEDIA_TYPE: &str = "application/soap+xml";

/// Media type of SOAP-with-attachments bodies.
pub const MULTIPART_RELATED_MEDIA_TYPE: &str = "multipart/related";

/// Default TCP port of the HTTP server.
pub const DEFAULT_HTTP_PORT: u16 = 5357;

/// Default per-request timeout (time allowed between requests).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Default `Server` header value.
pub const DEFAULT_SERVER_NAME: &str = concat!("dpws/", env!("CARGO_PKG_VERSION"));

/// Discovery multicast destination for the given address family.
pub fn discovery_multicast_addr(ipv6: bool) -> SocketAddr {
    if ipv6 {
        SocketAddr::new(IpAddr::V6(DISCOVERY_MULTICAST_V6), DISCOVERY_PORT)
    } else {
        SocketAddr::new(IpAddr::V4(DISCOVERY_MULTICAST_V4), DISCOVERY_PORT)
    }
}

// =======================================================================
// HTTP server
// =======================================================================

/// HTTP server configuration.
#[derive(Clone, Debug)]
pub struct HttpServerConfig {
    /// Address to bind (None = all IPv4 interfaces)
    pub bind_address: Option<IpAddr>,

    /// TCP listen port (0 = ephemeral port assigned by OS)
    pub port: u16,

    /// TCP listen backlog
    pub listen_backlog: i32,

    /// Time a connection may sit idle awaiting the next request
    pub request_timeout: Duration,

    /// Allow persistent connections
    pub keep_alive: bool,

    /// Fall back to the longest registered path prefix when no exact path matches
    pub backtracking: bool,

    /// Maximum accepted request line length (bytes)
    pub max_request_line: usize,

    /// Maximum accepted header block size (bytes)
    pub max_header_bytes: usize,

    /// Chunk size used for chunked response framing
    pub chunk_size: usize,

    /// `Server` header value
    pub server_name: String,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            bind_address: None,
            port: DEFAULT_HTTP_PORT,
            listen_backlog: 128,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            keep_alive: true,
            backtracking: false,
            max_request_line: 8 * 1024,
            max_header_bytes: 64 * 1024,
            chunk_size: 8 * 1024,
            server_name: DEFAULT_SERVER_NAME.to_string(),
        }
    }
}

impl HttpServerConfig {
    /// Builder: set listen port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder: set bind address
    pub fn with_bind_address(mut self, addr: IpAddr) -> Self {
        self.bind_address = Some(addr);
        self
    }

    /// Builder: set request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builder: enable/disable persistent connections
    pub fn with_keep_alive(mut self, enabled: bool) -> Self {
        self.keep_alive = enabled;
        self
    }

    /// Builder: enable/disable path-prefix backtracking
    pub fn with_backtracking(mut self, enabled: bool) -> Self {
        self.backtracking = enabled;
        self
    }

    /// Socket address to bind.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(
            self.bind_address.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            self.port,
        )
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            return Err(Error::Config("request_timeout must be > 0".into()));
        }
        if self.max_request_line < 16 {
            return Err(Error::Config("max_request_line too small".into()));
        }
        if self.max_header_bytes < self.max_request_line {
            return Err(Error::Config(
                "max_header_bytes must be >= max_request_line".into(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be > 0".into()));
        }
        Ok(())
    }
}

// =======================================================================
// SOAP-over-UDP repetition
// =======================================================================

/// SOAP-over-UDP retransmission parameters (delays in milliseconds).
///
/// One immediate transmission is followed by `repeat_count` repeats. The
/// first repeat waits a random delay in `[min_delay, max_delay]`; each
/// following delay doubles, capped at `upper_delay`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepeatConfig {
    /// Number of repeats after the initial transmission
    pub repeat_count: u32,
    /// Lower bound of the initial random delay (ms)
    pub min_delay: u64,
    /// Upper bound of the initial random delay (ms)
    pub max_delay: u64,
    /// Ceiling for the doubled delay (ms)
    pub upper_delay: u64,
}

impl RepeatConfig {
    /// Create a repeat configuration.
    pub const fn new(repeat_count: u32, min_delay: u64, max_delay: u64, upper_delay: u64) -> Self {
        Self {
            repeat_count,
            min_delay,
            max_delay,
            upper_delay,
        }
    }

    /// SOAP-over-UDP defaults for multicast (MULTICAST_UDP_REPEAT = 1).
    pub const fn multicast() -> Self {
        Self::new(1, 50, 250, 500)
    }

    /// SOAP-over-UDP defaults for unicast (UNICAST_UDP_REPEAT = 1).
    pub const fn unicast() -> Self {
        Self::new(1, 50, 250, 500)
    }

    /// Single transmission, no repeats.
    pub const fn once() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.min_delay > self.max_delay {
            return Err(Error::Config("min_delay must be <= max_delay".into()));
        }
        if self.repeat_count > 0 && self.max_delay > self.upper_delay {
            return Err(Error::Config("max_delay must be <= upper_delay".into()));
        }
        Ok(())
    }
}

impl Default for RepeatConfig {
    fn default() -> Self {
        Self::multicast()
    }
}

// =======================================================================
// Worker pool
// =======================================================================

/// Worker pool configuration.
#[derive(Clone, Debug)]
pub struct WorkerPoolConfig {
    /// Thread name prefix
    pub name: String,
    /// Maximum number of concurrently existing workers
    pub max_workers: usize,
    /// Idle time after which a worker retires
    pub idle_timeout: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            name: "dpws".to_string(),
            max_workers: 64,
            idle_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerPoolConfig {
    /// Builder: set maximum worker count
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Builder: set idle timeout
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Builder: set thread name prefix
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(Error::Config("max_workers must be > 0".into()));
        }
        Ok(())
    }
}

// =======================================================================
// Aggregate
// =======================================================================

/// Complete engine configuration.
#[derive(Clone, Debug)]
pub struct DpwsConfig {
    /// HTTP server settings
    pub http: HttpServerConfig,
    /// Worker pool settings
    pub pool: WorkerPoolConfig,
    /// Repetition of multicast discovery traffic
    pub multicast_repeat: RepeatConfig,
    /// Repetition of unicast discovery responses
    pub unicast_repeat: RepeatConfig,
    /// Generation emitted on multicast output
    pub protocol_version: ProtocolVersion,
    /// Number of message ids remembered for duplicate suppression
    pub duplicate_cache_size: usize,
    /// Local UDP port for discovery (0 = ephemeral, for tests)
    pub discovery_port: u16,
}

impl Default for DpwsConfig {
    fn default() -> Self {
        Self {
            http: HttpServerConfig::default(),
            pool: WorkerPoolConfig::default(),
            multicast_repeat: RepeatConfig::multicast(),
            unicast_repeat: RepeatConfig::unicast(),
            protocol_version: ProtocolVersion::Current,
            duplicate_cache_size: 256,
            discovery_port: DISCOVERY_PORT,
        }
    }
}

impl DpwsConfig {
    /// Builder: set HTTP config
    pub fn with_http(mut self, http: HttpServerConfig) -> Self {
        self.http = http;
        self
    }

    /// Builder: set worker pool config
    pub fn with_pool(mut self, pool: WorkerPoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Builder: set multicast repetition
    pub fn with_multicast_repeat(mut self, repeat: RepeatConfig) -> Self {
        self.multicast_repeat = repeat;
        self
    }

    /// Builder: set unicast repetition
    pub fn with_unicast_repeat(mut self, repeat: RepeatConfig) -> Self {
        self.unicast_repeat = repeat;
        self
    }

    /// Builder: set emitted protocol generation
    pub fn with_protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.protocol_version = version;
        self
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.http.validate()?;
        self.pool.validate()?;
        self.multicast_repeat.validate()?;
        self.unicast_repeat.validate()?;
        if self.duplicate_cache_size == 0 {
            return Err(Error::Config("duplicate_cache_size must be > 0".into()));
        }
        Ok(())
    }
}

/// Outgoing multicast interface override from [`MULTICAST_IF_ENV`].
pub fn multicast_interface_override() -> Option<IpAddr> {
    let var = std::env::var(MULTICAST_IF_ENV).ok()?;
    match var.trim().parse::<IpAddr>() {
        Ok(addr) => {
            log::debug!("[config] Using {} override: {}", MULTICAST_IF_ENV, addr);
            Some(addr)
        }
        Err(_) => {
            log::warn!("[config] Ignoring unparsable {}={}", MULTICAST_IF_ENV, var);
            None
        }
    }
}
