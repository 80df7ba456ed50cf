// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WS-Addressing header block and WS-Discovery application sequencing.

use super::QName;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque reference parameter carried in an endpoint reference and echoed
/// as a header block when the endpoint is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceParameter {
    pub name: QName,
    pub value: String,
}

impl ReferenceParameter {
    pub fn new(name: QName, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// WS-Addressing endpoint reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointReference {
    pub address: String,
    pub reference_parameters: Vec<ReferenceParameter>,
}

impl EndpointReference {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            reference_parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, param: ReferenceParameter) -> Self {
        self.reference_parameters.push(param);
        self
    }

    /// Fresh `urn:uuid:` address, the usual stable device identity.
    pub fn random() -> Self {
        Self::new(new_message_id())
    }

    pub fn parameter(&self, name: &QName) -> Option<&str> {
        self.reference_parameters
            .iter()
            .find(|p| p.name == *name)
            .map(|p| p.value.as_str())
    }
}

/// WS-Discovery `AppSequence` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppSequence {
    pub instance_id: u64,
    pub message_number: u64,
}

/// Monotonic `AppSequence` source for one device instance.
///
/// The instance id is the creation time in seconds, so it increases across
/// restarts as receivers expect.
#[derive(Debug)]
pub struct AppSequencer {
    instance_id: u64,
    next: AtomicU64,
}

impl AppSequencer {
    pub fn new() -> Self {
        let instance_id = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(1);
        Self::with_instance_id(instance_id)
    }

    pub fn with_instance_id(instance_id: u64) -> Self {
        Self {
            instance_id,
            next: AtomicU64::new(1),
        }
    }

    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    pub fn next(&self) -> AppSequence {
        AppSequence {
            instance_id: self.instance_id,
            message_number: self.next.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl Default for AppSequencer {
    fn default() -> Self {
        Self::new()
    }
}

/// SOAP header fields shared by every message kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapHeader {
    pub action: String,
    pub message_id: String,
    pub relates_to: Option<String>,
    pub reply_to: Option<EndpointReference>,
    pub to: Option<String>,
    pub app_sequence: Option<AppSequence>,
    /// Reference parameters of the addressed endpoint.
    pub reference_parameters: Vec<ReferenceParameter>,
}

impl SoapHeader {
    /// Header with a fresh message id.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            message_id: new_message_id(),
            relates_to: None,
            reply_to: None,
            to: None,
            app_sequence: None,
            reference_parameters: Vec::new(),
        }
    }

    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn with_relates_to(mut self, id: impl Into<String>) -> Self {
        self.relates_to = Some(id.into());
        self
    }
}

/// `urn:uuid:` message identifier.
pub fn new_message_id() -> String {
    format!("urn:uuid:{}", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ids_are_unique_urns() {
        let a = new_message_id();
        let b = new_message_id();
        assert!(a.starts_with("urn:uuid:"));
        assert_eq!(a.len(), "urn:uuid:".len() + 36);
        assert_ne!(a, b);
    }

    #[test]
    fn test_sequencer_is_monotonic() {
        let seq = AppSequencer::with_instance_id(7);
        let first = seq.next();
        let second = seq.next();
        assert_eq!(first.instance_id, 7);
        assert!(second.message_number > first.message_number);
    }

    #[test]
    fn test_endpoint_parameter_lookup() {
        let id = QName::new("urn:test", "Identifier");
        let epr = EndpointReference::new("http://host/sub")
            .with_parameter(ReferenceParameter::new(id.clone(), "abc"));
        assert_eq!(epr.parameter(&id), Some("abc"));
        assert_eq!(epr.parameter(&QName::new("urn:test", "Other")), None);
    }
}
