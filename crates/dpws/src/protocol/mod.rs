// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Protocol generations and their wire vocabularies.
//!
//! | Generation | DPWS | WS-Discovery | WS-Addressing |
//! |------------|------|--------------|---------------|
//! | `Legacy` | 2006/02 | 2005/04 | 2004/08 |
//! | `Current` | 1.1 (2009/01) | 1.1 (2009/01) | 1.0 (2005/08) |
//!
//! Transfer, MetadataExchange and Eventing actions are identical in both.
//!
//! # Architecture
//!
//! Each generation lives in a private module exposing one static
//! [`Vocabulary`]. Everything else reaches it through
//! [`ProtocolVersion::vocabulary`], so no code outside this module names a
//! generation-specific URI.

mod current;
mod legacy;
pub mod translator;

pub use translator::{normalize_incoming, translate_outgoing, upgrade_incoming_probe};

use crate::message::{MessageKind, QName, ScopeMatchRule, SubscriptionEndStatus};
use std::fmt;
use std::str::FromStr;

/// SOAP 1.2 envelope namespace (both generations).
pub const SOAP_ENVELOPE_NS: &str = "http://www.w3.org/2003/05/soap-envelope";
/// WS-Eventing 2004/08 namespace (both generations).
pub const EVENTING_NS: &str = "http://schemas.xmlsoap.org/ws/2004/08/eventing";
/// WS-MetadataExchange 2004/09 namespace.
pub const MEX_NS: &str = "http://schemas.xmlsoap.org/ws/2004/09/mex";

const TRANSFER_GET: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer/Get";
const TRANSFER_GET_RESPONSE: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer/GetResponse";

const fn shared_actions() -> [(MessageKind, &'static str); 11] {
    [
        (MessageKind::Get, TRANSFER_GET),
        (MessageKind::GetResponse, TRANSFER_GET_RESPONSE),
        (
            MessageKind::GetMetadata,
            "http://schemas.xmlsoap.org/ws/2004/09/mex/GetMetadata/Request",
        ),
        (
            MessageKind::GetMetadataResponse,
            "http://schemas.xmlsoap.org/ws/2004/09/mex/GetMetadata/Response",
        ),
        (
            MessageKind::Subscribe,
            "http://schemas.xmlsoap.org/ws/2004/08/eventing/Subscribe",
        ),
        (
            MessageKind::SubscribeResponse,
            "http://schemas.xmlsoap.org/ws/2004/08/eventing/SubscribeResponse",
        ),
        (
            MessageKind::Renew,
            "http://schemas.xmlsoap.org/ws/2004/08/eventing/Renew",
        ),
        (
            MessageKind::RenewResponse,
            "http://schemas.xmlsoap.org/ws/2004/08/eventing/RenewResponse",
        ),
        (
            MessageKind::Unsubscribe,
            "http://schemas.xmlsoap.org/ws/2004/08/eventing/Unsubscribe",
        ),
        (
            MessageKind::UnsubscribeResponse,
            "http://schemas.xmlsoap.org/ws/2004/08/eventing/UnsubscribeResponse",
        ),
        (
            MessageKind::SubscriptionEnd,
            "http://schemas.xmlsoap.org/ws/2004/08/eventing/SubscriptionEnd",
        ),
    ]
}

/// URIs and namespaces of one protocol generation.
#[derive(Debug)]
pub struct Vocabulary {
    pub name: &'static str,
    pub dpws_ns: &'static str,
    pub discovery_ns: &'static str,
    pub addressing_ns: &'static str,
    /// WS-Addressing anonymous (reply on the back channel) address.
    pub anonymous: &'static str,
    /// Ad-hoc `To` of multicast discovery traffic.
    pub adhoc_to: &'static str,
    pub rfc_match_rule: &'static str,
    pub strcmp_match_rule: &'static str,
    pub this_model_dialect: &'static str,
    pub this_device_dialect: &'static str,
    pub relationship_dialect: &'static str,
    pub host_relationship: &'static str,
    pub action_filter_dialect: &'static str,
    discovery_actions: [(MessageKind, &'static str); 7],
    shared_actions: [(MessageKind, &'static str); 11],
}

impl Vocabulary {
    fn actions(&self) -> impl Iterator<Item = &(MessageKind, &'static str)> {
        self.discovery_actions.iter().chain(self.shared_actions.iter())
    }

    /// Action URI of `kind` in this generation.
    pub fn action(&self, kind: MessageKind) -> &'static str {
        self.actions()
            .find(|(k, _)| *k == kind)
            .map(|(_, a)| *a)
            .unwrap_or_default()
    }

    pub fn kind_of(&self, action: &str) -> Option<MessageKind> {
        self.actions().find(|(_, a)| *a == action).map(|(k, _)| *k)
    }

    /// The DPWS `Device` port type.
    pub fn device_type(&self) -> QName {
        QName::new(self.dpws_ns, "Device")
    }

    pub fn match_rule_uri(&self, rule: ScopeMatchRule) -> &'static str {
        match rule {
            ScopeMatchRule::Rfc3986 => self.rfc_match_rule,
            ScopeMatchRule::Strcmp0 => self.strcmp_match_rule,
        }
    }

    pub fn subscription_end_status(&self, status: SubscriptionEndStatus) -> String {
        format!("{}/{}", EVENTING_NS, status.local_name())
    }
}

/// Wire-format generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProtocolVersion {
    /// DPWS 2006/02 family.
    Legacy,
    /// DPWS 1.1 family; the in-memory representation.
    #[default]
    Current,
}

impl ProtocolVersion {
    pub const ALL: [ProtocolVersion; 2] = [ProtocolVersion::Current, ProtocolVersion::Legacy];

    pub fn vocabulary(self) -> &'static Vocabulary {
        match self {
            ProtocolVersion::Legacy => &legacy::VOCABULARY,
            ProtocolVersion::Current => &current::VOCABULARY,
        }
    }

    /// Generation owning a DPWS, WS-Discovery or WS-Addressing namespace.
    pub fn from_namespace(ns: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| {
            let vocab = v.vocabulary();
            ns == vocab.dpws_ns || ns == vocab.discovery_ns || ns == vocab.addressing_ns
        })
    }

    /// Message kind of an action URI in any generation.
    pub fn kind_of_action(action: &str) -> Option<MessageKind> {
        Self::ALL
            .into_iter()
            .find_map(|v| v.vocabulary().kind_of(action))
    }

    pub fn is_adhoc_to(uri: &str) -> bool {
        Self::ALL.into_iter().any(|v| v.vocabulary().adhoc_to == uri)
    }

    pub fn is_anonymous(uri: &str) -> bool {
        Self::ALL.into_iter().any(|v| v.vocabulary().anonymous == uri)
    }

    pub fn is_dpws_namespace(ns: &str) -> bool {
        Self::ALL.into_iter().any(|v| v.vocabulary().dpws_ns == ns)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.vocabulary().name)
    }
}

impl FromStr for ProtocolVersion {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" | "2006" | "dpws2006" => Ok(ProtocolVersion::Legacy),
            "current" | "1.1" | "2009" | "dpws11" => Ok(ProtocolVersion::Current),
            other => Err(crate::Error::Config(format!(
                "unknown protocol version: {}",
                other
            ))),
        }
    }
}
