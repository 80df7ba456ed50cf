// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SOAP dispatch over HTTP and UDP.
//!
//! Incoming bytes go through a [`MessageGenerator`] (by default the
//! [`SoapCodec`]) into a typed [`Message`] normalized to the current
//! protocol generation, then to the application's [`MessageReceiver`].
//! The receiver answers through the [`Exchange`] it is handed; the
//! response is translated back to the requester's generation on the way
//! out.
//!
//! # Architecture
//!
//! ```text
//! HTTP  POST --> SoapHttpHandler --+
//!                                  +--> MessageGenerator::decode --> MessageReceiver
//! UDP datagram --> SoapUdpServer --+                                      |
//!                                                                Exchange::respond
//!                                                                         |
//!                  HTTP response / RepeatSender <-- encode(version) <-----+
//! ```

mod codec;
mod http_handler;
mod repeat;
mod udp;
mod xml;

pub use codec::SoapCodec;
pub use http_handler::SoapHttpHandler;
pub use repeat::{DatagramSink, RepeatSender};
pub use udp::{DuplicateFilter, SoapUdpServer, UdpOutbound};

use crate::message::{Fault, Message, QName};
use crate::protocol::ProtocolVersion;
use std::fmt;
use std::net::SocketAddr;

/// Failure to decode, encode or handle a SOAP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoapError {
    /// Not well-formed XML or not a SOAP 1.2 envelope.
    Xml(String),
    /// A required element is absent.
    Missing(&'static str),
    /// An element holds an unusable value.
    Invalid(String),
    /// Action URI unknown in both generations.
    UnknownAction(String),
    /// The receiver failed to process a valid message.
    Receiver(String),
    /// [`Exchange::respond`] called twice.
    AlreadyResponded,
}

impl SoapError {
    /// SOAP fault reported to the requester.
    pub fn to_fault(&self) -> Fault {
        match self {
            SoapError::UnknownAction(action) => {
                let vocab = ProtocolVersion::Current.vocabulary();
                Fault::sender(format!("action not supported: {}", action))
                    .with_subcode(QName::new(vocab.addressing_ns, "ActionNotSupported"))
            }
            SoapError::Receiver(msg) => Fault::receiver(msg.clone()),
            SoapError::AlreadyResponded => Fault::receiver(self.to_string()),
            other => Fault::sender(other.to_string()),
        }
    }
}

impl fmt::Display for SoapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoapError::Xml(msg) => write!(f, "malformed envelope: {}", msg),
            SoapError::Missing(what) => write!(f, "missing element: {}", what),
            SoapError::Invalid(msg) => write!(f, "invalid content: {}", msg),
            SoapError::UnknownAction(action) => write!(f, "unknown action: {}", action),
            SoapError::Receiver(msg) => write!(f, "receiver failed: {}", msg),
            SoapError::AlreadyResponded => write!(f, "exchange already has a response"),
        }
    }
}

impl std::error::Error for SoapError {}

impl From<SoapError> for crate::Error {
    fn from(e: SoapError) -> Self {
        match e {
            SoapError::Xml(msg) => crate::Error::Xml(msg),
            SoapError::UnknownAction(action) => crate::Error::UnknownAction(action),
            SoapError::Receiver(msg) => crate::Error::Handler(msg),
            SoapError::AlreadyResponded => crate::Error::Usage(e.to_string()),
            other => crate::Error::Protocol(other.to_string()),
        }
    }
}

/// Decoded message plus the generation it arrived in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub message: Message,
    pub version: ProtocolVersion,
}

/// Converts between bytes and typed messages.
pub trait MessageGenerator: Send + Sync {
    /// Parse an envelope of either generation; the result uses the
    /// current vocabulary.
    fn decode(&self, bytes: &[u8]) -> Result<Decoded, SoapError>;

    /// Serialize `message` in `version`'s vocabulary.
    fn encode(&self, message: &Message, version: ProtocolVersion) -> Result<Vec<u8>, SoapError>;
}

/// Application entry point for incoming messages.
///
/// Runs on the thread that received the message (connection thread or
/// datagram task); a response, if any, goes through `exchange`.
pub trait MessageReceiver: Send + Sync {
    fn receive(&self, message: Message, exchange: &mut Exchange) -> Result<(), SoapError>;
}

impl<F> MessageReceiver for F
where
    F: Fn(Message, &mut Exchange) -> Result<(), SoapError> + Send + Sync,
{
    fn receive(&self, message: Message, exchange: &mut Exchange) -> Result<(), SoapError> {
        self(message, exchange)
    }
}

/// Where a message came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Http {
        peer: Option<SocketAddr>,
        path: String,
        user: Option<String>,
    },
    Udp {
        peer: SocketAddr,
    },
}

/// Non-envelope part of a `multipart/related` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub content_id: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Request context and response slot handed to a [`MessageReceiver`].
#[derive(Debug)]
pub struct Exchange {
    transport: Transport,
    version: ProtocolVersion,
    attachments: Vec<Attachment>,
    response: Option<Message>,
}

impl Exchange {
    pub fn new(transport: Transport, version: ProtocolVersion) -> Self {
        Self {
            transport,
            version,
            attachments: Vec::new(),
            response: None,
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Generation the request arrived in; the response is sent in it too.
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn attachment(&self, content_id: &str) -> Option<&Attachment> {
        self.attachments
            .iter()
            .find(|a| a.content_id.as_deref() == Some(content_id))
    }

    /// Set the response. Only one response per exchange.
    pub fn respond(&mut self, message: Message) -> Result<(), SoapError> {
        if self.response.is_some() {
            return Err(SoapError::AlreadyResponded);
        }
        self.response = Some(message);
        Ok(())
    }

    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }

    pub fn take_response(&mut self) -> Option<Message> {
        self.response.take()
    }
}

/// Fault message answering `request` (or unsolicited when the request
/// could not be decoded).
pub fn fault_message(request: Option<&Message>, fault: Fault) -> Message {
    use crate::message::MessageBody;
    match request {
        Some(request) => request.reply(MessageBody::Fault(fault)),
        None => Message::new(MessageBody::Fault(fault)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{FaultCode, MessageBody};

    #[test]
    fn test_exchange_single_response() {
        let mut exchange = Exchange::new(
            Transport::Udp {
                peer: "127.0.0.1:3702".parse().unwrap(),
            },
            ProtocolVersion::Legacy,
        );
        let msg = Message::new(MessageBody::Get);
        exchange.respond(msg.clone()).unwrap();
        assert_eq!(exchange.respond(msg), Err(SoapError::AlreadyResponded));
        assert!(exchange.take_response().is_some());
        assert!(!exchange.has_response());
    }

    #[test]
    fn test_fault_mapping() {
        assert_eq!(
            SoapError::Xml("eof".into()).to_fault().code,
            FaultCode::Sender
        );
        assert_eq!(
            SoapError::Receiver("db down".into()).to_fault().code,
            FaultCode::Receiver
        );
        let fault = SoapError::UnknownAction("urn:x".into()).to_fault();
        assert_eq!(fault.subcode.unwrap().local, "ActionNotSupported");
    }

    #[test]
    fn test_error_conversion() {
        let err: crate::Error = SoapError::AlreadyResponded.into();
        assert!(matches!(err, crate::Error::Usage(_)));
        let err: crate::Error = SoapError::UnknownAction("urn:x".into()).into();
        assert!(matches!(err, crate::Error::UnknownAction(_)));
    }
}
