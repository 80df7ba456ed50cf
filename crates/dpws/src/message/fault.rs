// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SOAP 1.2 faults.

use super::QName;

/// Top-level SOAP 1.2 fault code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCode {
    VersionMismatch,
    MustUnderstand,
    Sender,
    Receiver,
}

impl FaultCode {
    pub fn local_name(self) -> &'static str {
        match self {
            Self::VersionMismatch => "VersionMismatch",
            Self::MustUnderstand => "MustUnderstand",
            Self::Sender => "Sender",
            Self::Receiver => "Receiver",
        }
    }

    pub fn from_local_name(name: &str) -> Option<Self> {
        match name {
            "VersionMismatch" => Some(Self::VersionMismatch),
            "MustUnderstand" => Some(Self::MustUnderstand),
            "Sender" => Some(Self::Sender),
            "Receiver" => Some(Self::Receiver),
            _ => None,
        }
    }

    /// HTTP status used when the fault answers an HTTP request.
    pub fn http_status(self) -> u16 {
        match self {
            Self::Receiver => 500,
            _ => 400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub code: FaultCode,
    pub subcode: Option<QName>,
    pub reason: String,
    pub detail: Option<String>,
}

impl Fault {
    pub fn sender(reason: impl Into<String>) -> Self {
        Self {
            code: FaultCode::Sender,
            subcode: None,
            reason: reason.into(),
            detail: None,
        }
    }

    pub fn receiver(reason: impl Into<String>) -> Self {
        Self {
            code: FaultCode::Receiver,
            subcode: None,
            reason: reason.into(),
            detail: None,
        }
    }

    pub fn with_subcode(mut self, subcode: QName) -> Self {
        self.subcode = Some(subcode);
        self
    }
}
