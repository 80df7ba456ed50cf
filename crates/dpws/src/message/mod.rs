// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed discovery, metadata and eventing messages.
//!
//! A [`Message`] is a [`SoapHeader`] plus a [`MessageBody`]; the body enum
//! is the message kind. In memory every message uses the current protocol
//! generation's vocabulary. Conversion to and from the legacy generation
//! happens at the wire boundary (see [`crate::protocol`]).
//!
//! ```
//! use dpws::message::{DiscoveryData, EndpointReference, Message, MessageBody, MessageKind};
//!
//! let hello = Message::new(MessageBody::Hello(DiscoveryData::new(EndpointReference::random())));
//! assert_eq!(hello.kind(), MessageKind::Hello);
//! assert!(hello.header.action.ends_with("/Hello"));
//! ```

mod discovery;
mod duration;
mod eventing;
mod fault;
mod header;
mod metadata;
mod qname;

pub use discovery::{DiscoveryData, Probe, ProbeMatches, Resolve, ResolveMatches, ScopeMatchRule};
pub use duration::{format_duration, parse_duration};
pub use eventing::{
    Filter, Renew, RenewResponse, Subscribe, SubscribeResponse, SubscriptionEnd,
    SubscriptionEndStatus,
};
pub use fault::{Fault, FaultCode};
pub use header::{
    new_message_id, AppSequence, AppSequencer, EndpointReference, ReferenceParameter, SoapHeader,
};
pub use metadata::{
    DeviceMetadata, GetMetadata, MetadataLocation, MetadataResponse, Relationship,
    ServiceEndpoint, ThisDevice, ThisModel, WSDL_DIALECT,
};
pub use qname::QName;

use crate::protocol::ProtocolVersion;

/// Discriminant of [`MessageBody`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Hello,
    Bye,
    Probe,
    ProbeMatches,
    Resolve,
    ResolveMatches,
    Get,
    GetResponse,
    GetMetadata,
    GetMetadataResponse,
    Subscribe,
    SubscribeResponse,
    Renew,
    RenewResponse,
    Unsubscribe,
    UnsubscribeResponse,
    SubscriptionEnd,
    Fault,
}

impl MessageKind {
    pub const ALL: [MessageKind; 18] = [
        Self::Hello,
        Self::Bye,
        Self::Probe,
        Self::ProbeMatches,
        Self::Resolve,
        Self::ResolveMatches,
        Self::Get,
        Self::GetResponse,
        Self::GetMetadata,
        Self::GetMetadataResponse,
        Self::Subscribe,
        Self::SubscribeResponse,
        Self::Renew,
        Self::RenewResponse,
        Self::Unsubscribe,
        Self::UnsubscribeResponse,
        Self::SubscriptionEnd,
        Self::Fault,
    ];

    /// Sent to the ad-hoc multicast group rather than to a reply endpoint.
    pub fn is_multicast(self) -> bool {
        matches!(self, Self::Hello | Self::Bye | Self::Probe | Self::Resolve)
    }

    /// No response is ever sent for this kind.
    pub fn is_one_way(self) -> bool {
        matches!(
            self,
            Self::Hello | Self::Bye | Self::SubscriptionEnd | Self::Fault
        ) || self.is_response()
    }

    pub fn is_response(self) -> bool {
        matches!(
            self,
            Self::ProbeMatches
                | Self::ResolveMatches
                | Self::GetResponse
                | Self::GetMetadataResponse
                | Self::SubscribeResponse
                | Self::RenewResponse
                | Self::UnsubscribeResponse
        )
    }
}

/// Kind-specific payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Hello(DiscoveryData),
    Bye(DiscoveryData),
    Probe(Probe),
    ProbeMatches(ProbeMatches),
    Resolve(Resolve),
    ResolveMatches(ResolveMatches),
    Get,
    GetResponse(DeviceMetadata),
    GetMetadata(GetMetadata),
    GetMetadataResponse(MetadataResponse),
    Subscribe(Subscribe),
    SubscribeResponse(SubscribeResponse),
    Renew(Renew),
    RenewResponse(RenewResponse),
    Unsubscribe,
    UnsubscribeResponse,
    SubscriptionEnd(SubscriptionEnd),
    Fault(Fault),
}

impl MessageBody {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Hello(_) => MessageKind::Hello,
            Self::Bye(_) => MessageKind::Bye,
            Self::Probe(_) => MessageKind::Probe,
            Self::ProbeMatches(_) => MessageKind::ProbeMatches,
            Self::Resolve(_) => MessageKind::Resolve,
            Self::ResolveMatches(_) => MessageKind::ResolveMatches,
            Self::Get => MessageKind::Get,
            Self::GetResponse(_) => MessageKind::GetResponse,
            Self::GetMetadata(_) => MessageKind::GetMetadata,
            Self::GetMetadataResponse(_) => MessageKind::GetMetadataResponse,
            Self::Subscribe(_) => MessageKind::Subscribe,
            Self::SubscribeResponse(_) => MessageKind::SubscribeResponse,
            Self::Renew(_) => MessageKind::Renew,
            Self::RenewResponse(_) => MessageKind::RenewResponse,
            Self::Unsubscribe => MessageKind::Unsubscribe,
            Self::UnsubscribeResponse => MessageKind::UnsubscribeResponse,
            Self::SubscriptionEnd(_) => MessageKind::SubscriptionEnd,
            Self::Fault(_) => MessageKind::Fault,
        }
    }

    /// Type sets embedded in the payload (for device-type translation).
    pub fn type_sets_mut(&mut self) -> Vec<&mut Vec<QName>> {
        match self {
            Self::Hello(d) | Self::Bye(d) => vec![&mut d.types],
            Self::Probe(p) => vec![&mut p.types],
            Self::ProbeMatches(m) => m.matches.iter_mut().map(|d| &mut d.types).collect(),
            Self::ResolveMatches(m) => m.matched.iter_mut().map(|d| &mut d.types).collect(),
            Self::GetResponse(meta) => meta
                .relationship
                .iter_mut()
                .flat_map(|r| r.host.iter_mut().chain(r.hosted.iter_mut()))
                .map(|s| &mut s.types)
                .collect(),
            Self::GetMetadataResponse(meta) => meta
                .relationship
                .iter_mut()
                .flat_map(|r| r.host.iter_mut().chain(r.hosted.iter_mut()))
                .map(|s| &mut s.types)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// A SOAP message: addressing header plus typed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: SoapHeader,
    pub body: MessageBody,
}

impl Message {
    /// New message with the current-generation action and a fresh id.
    ///
    /// Multicast kinds are addressed to the ad-hoc discovery URI.
    pub fn new(body: MessageBody) -> Self {
        let vocab = ProtocolVersion::Current.vocabulary();
        let kind = body.kind();
        let mut header = SoapHeader::new(vocab.action(kind));
        if kind.is_multicast() {
            header.to = Some(vocab.adhoc_to.to_string());
        }
        Self { header, body }
    }

    pub fn kind(&self) -> MessageKind {
        self.body.kind()
    }

    /// Response correlated with this request.
    ///
    /// Addressed to the request's `ReplyTo` (anonymous when absent) and
    /// carrying that endpoint's reference parameters.
    pub fn reply(&self, body: MessageBody) -> Message {
        let vocab = ProtocolVersion::Current.vocabulary();
        let mut header = SoapHeader::new(vocab.action(body.kind()));
        header.relates_to = Some(self.header.message_id.clone());
        match &self.header.reply_to {
            Some(epr) => {
                header.to = Some(epr.address.clone());
                header.reference_parameters = epr.reference_parameters.clone();
            }
            None => header.to = Some(vocab.anonymous.to_string()),
        }
        Message { header, body }
    }

    pub fn with_app_sequence(mut self, seq: AppSequence) -> Self {
        self.header.app_sequence = Some(seq);
        self
    }
}
