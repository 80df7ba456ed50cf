// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # dpws - Devices Profile for Web Services protocol engine
//!
//! Transport and runtime layers of a DPWS / WS-Discovery stack: a
//! keep-alive HTTP/1.1 server with path and media-type routing, SOAP
//! dispatch over HTTP and UDP, a streaming MIME multipart reader, a typed
//! message model spanning two protocol generations, and the thread pool
//! and fair lock the servers run on.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dpws::config::{DpwsConfig, HttpServerConfig};
//! use dpws::http::{HandlerRegistry, HttpServer};
//! use dpws::message::{Message, MessageBody};
//! use dpws::rt::WorkerPool;
//! use dpws::soap::{Exchange, MessageReceiver, SoapError, SoapHttpHandler};
//! use std::sync::Arc;
//!
//! fn main() -> dpws::Result<()> {
//!     let config = DpwsConfig::default().with_http(HttpServerConfig::default().with_port(8080));
//!     let pool = WorkerPool::new(config.pool.clone())?;
//!
//!     let receiver: Arc<dyn MessageReceiver> = Arc::new(
//!         |msg: Message, exchange: &mut Exchange| -> Result<(), SoapError> {
//!             if let MessageBody::Get = msg.body {
//!                 exchange.respond(msg.reply(MessageBody::GetResponse(Default::default())))?;
//!             }
//!             Ok(())
//!         },
//!     );
//!     let registry = Arc::new(HandlerRegistry::default());
//!     registry.register("/device", Some("application/soap+xml"), Arc::new(SoapHttpHandler::new(receiver)))?;
//!
//!     let server = HttpServer::start(config.http, registry, pool)?;
//!     println!("listening on {}", server.local_addr());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |  application: MessageReceiver / HttpHandler / SubscriptionSet |
//! +--------------------------------------------------------------+
//! |  soap: codec, HTTP binding, UDP binding (repeat, dedup)      |
//! +--------------------------------------------------------------+
//! |  message (typed, current vocabulary) <-> protocol translator |
//! +--------------------------------------------------------------+
//! |  http: server, registry, auth, watchdog  |  mime: multipart  |
//! +--------------------------------------------------------------+
//! |  rt: WorkerPool, FairRwLock          |  net: interfaces      |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`http`] - HTTP/1.1 server and handler registry
//! - [`soap`] - SOAP over HTTP and UDP
//! - [`message`] - typed DPWS messages
//! - [`protocol`] - protocol generations and translation
//! - [`mime`] - multipart/related reader
//! - [`rt`] - worker pool and fair lock
//! - [`eventing`] - WS-Eventing subscriptions

/// Logging backend and the `trace_fn!` macro.
#[macro_use]
pub mod logging;

/// Engine configuration and wire constants.
pub mod config;
/// Crate error type.
pub mod error;
/// WS-Eventing subscription set.
pub mod eventing;
/// HTTP/1.1 keep-alive server.
pub mod http;
/// Typed messages.
pub mod message;
/// Streaming MIME multipart reader.
pub mod mime;
/// Network addresses, interfaces and multicast setup.
pub mod net;
/// Protocol generations and translation.
pub mod protocol;
/// Worker pool and fair lock.
pub mod rt;
/// SOAP dispatch.
pub mod soap;

pub use config::DpwsConfig;
pub use error::{Error, Result};
