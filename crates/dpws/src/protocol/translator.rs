// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stateless translation between protocol generations.
//!
//! Outgoing messages are rewritten for the target generation: action URI,
//! ad-hoc or anonymous `To`, anonymous `ReplyTo`, and the DPWS `Device` type
//! in every embedded type set. Incoming messages are normalized to the
//! current generation before anything else sees them. Application-defined
//! actions and explicit endpoint addresses pass through untouched.

use super::ProtocolVersion;
use crate::message::{Message, MessageBody, MessageKind};

/// Copy of `message` expressed in `target`'s vocabulary.
pub fn translate_outgoing(message: &Message, target: ProtocolVersion) -> Message {
    let mut out = message.clone();
    retarget(&mut out, target);
    out
}

/// Rewrite an incoming message (either generation) to the current one.
pub fn normalize_incoming(message: &mut Message) {
    retarget(message, ProtocolVersion::Current);
}

/// Upgrade the type set of an incoming legacy Probe in place.
///
/// Returns true if any type was rewritten.
pub fn upgrade_incoming_probe(message: &mut Message) -> bool {
    let target = ProtocolVersion::Current.vocabulary();
    match &mut message.body {
        MessageBody::Probe(probe) => {
            let mut changed = false;
            for qname in probe.types.iter_mut() {
                if qname.local == "Device"
                    && ProtocolVersion::is_dpws_namespace(&qname.namespace)
                    && qname.namespace != target.dpws_ns
                {
                    qname.namespace = target.dpws_ns.to_string();
                    changed = true;
                }
            }
            changed
        }
        _ => false,
    }
}

fn retarget(message: &mut Message, target: ProtocolVersion) {
    let vocab = target.vocabulary();
    let kind = message.kind();

    if is_standard_action(&message.header.action, kind) {
        message.header.action = vocab.action(kind).to_string();
    }

    message.header.to = match message.header.to.take() {
        Some(to) if ProtocolVersion::is_adhoc_to(&to) => Some(vocab.adhoc_to.to_string()),
        Some(to) if ProtocolVersion::is_anonymous(&to) => Some(vocab.anonymous.to_string()),
        Some(to) => Some(to),
        None if kind.is_multicast() => Some(vocab.adhoc_to.to_string()),
        None if kind.is_response() => Some(vocab.anonymous.to_string()),
        None => None,
    };

    if let Some(reply_to) = message.header.reply_to.as_mut() {
        if ProtocolVersion::is_anonymous(&reply_to.address) {
            reply_to.address = vocab.anonymous.to_string();
        }
    }

    for types in message.body.type_sets_mut() {
        for qname in types.iter_mut() {
            if qname.local == "Device" && ProtocolVersion::is_dpws_namespace(&qname.namespace) {
                qname.namespace = vocab.dpws_ns.to_string();
            }
        }
    }

    if target != ProtocolVersion::Current {
        log::trace!("[translator] {:?} -> {}", kind, target);
    }
}

fn is_standard_action(action: &str, kind: MessageKind) -> bool {
    ProtocolVersion::ALL
        .into_iter()
        .any(|v| v.vocabulary().action(kind) == action)
}
