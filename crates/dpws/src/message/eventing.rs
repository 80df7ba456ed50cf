// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WS-Eventing payloads.

use super::EndpointReference;
use std::time::Duration;

/// Action filter of a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub dialect: String,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscribe {
    pub end_to: Option<EndpointReference>,
    pub notify_to: EndpointReference,
    pub expires: Option<Duration>,
    pub filter: Option<Filter>,
}

impl Subscribe {
    pub fn new(notify_to: EndpointReference) -> Self {
        Self {
            end_to: None,
            notify_to,
            expires: None,
            filter: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeResponse {
    pub subscription_manager: EndpointReference,
    pub expires: Duration,
}

/// Renew request; the subscription is identified by the header's
/// reference parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Renew {
    pub expires: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenewResponse {
    pub expires: Option<Duration>,
}

/// Reason a source ended a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionEndStatus {
    DeliveryFailure,
    SourceShuttingDown,
    SourceCancelling,
}

impl SubscriptionEndStatus {
    pub fn local_name(self) -> &'static str {
        match self {
            Self::DeliveryFailure => "DeliveryFailure",
            Self::SourceShuttingDown => "SourceShuttingDown",
            Self::SourceCancelling => "SourceCancelling",
        }
    }

    pub fn from_local_name(name: &str) -> Option<Self> {
        match name {
            "DeliveryFailure" => Some(Self::DeliveryFailure),
            "SourceShuttingDown" => Some(Self::SourceShuttingDown),
            "SourceCancelling" => Some(Self::SourceCancelling),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionEnd {
    pub subscription_manager: EndpointReference,
    pub status: SubscriptionEndStatus,
    pub reason: Option<String>,
}
