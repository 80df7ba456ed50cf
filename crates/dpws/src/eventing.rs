// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WS-Eventing subscription set of one event source.
//!
//! Subscriptions are leases: each has an absolute expiry which `renew`
//! pushes forward and [`SubscriptionSet::expire`] enforces. The manager
//! endpoint handed to subscribers carries an `Identifier` reference
//! parameter; Renew and Unsubscribe requests echo it back as a header
//! block, which is how they are matched to a subscription.
//!
//! ```
//! use dpws::eventing::SubscriptionSet;
//! use dpws::message::{EndpointReference, Subscribe};
//!
//! let set = SubscriptionSet::new("http://10.0.0.5:5357/events");
//! let response = set.subscribe(&Subscribe::new(EndpointReference::new("http://sink/1")));
//! assert_eq!(set.len(), 1);
//! let id = SubscriptionSet::identifier(&response.subscription_manager.reference_parameters);
//! assert!(id.is_some());
//! ```

use crate::message::{
    EndpointReference, Filter, Message, MessageBody, QName, ReferenceParameter, Renew,
    RenewResponse, Subscribe, SubscribeResponse, SubscriptionEnd, SubscriptionEndStatus,
};
use crate::protocol::EVENTING_NS;
use crate::soap::{Exchange, MessageReceiver, SoapError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Lease granted when the subscriber asks for none.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(3600);

/// One active subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub notify_to: EndpointReference,
    pub end_to: Option<EndpointReference>,
    pub filter: Option<Filter>,
    pub expires_at: Instant,
}

impl Subscription {
    /// Whether a notification with `action` should reach this subscriber.
    ///
    /// No filter means every action.
    pub fn accepts(&self, action: &str) -> bool {
        match &self.filter {
            None => true,
            Some(filter) => filter.actions.iter().any(|a| a == action),
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

/// Subscriptions of one event source, guarded by a mutex.
#[derive(Debug)]
pub struct SubscriptionSet {
    manager_address: String,
    default_lease: Duration,
    max_lease: Duration,
    subscriptions: Mutex<HashMap<String, Subscription>>,
}

impl SubscriptionSet {
    /// Empty set whose subscription manager lives at `manager_address`.
    pub fn new(manager_address: impl Into<String>) -> Self {
        Self {
            manager_address: manager_address.into(),
            default_lease: DEFAULT_LEASE,
            max_lease: DEFAULT_LEASE * 24,
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_default_lease(mut self, lease: Duration) -> Self {
        self.default_lease = lease;
        self
    }

    /// Longest lease granted; longer requests are clamped.
    pub fn with_max_lease(mut self, lease: Duration) -> Self {
        self.max_lease = lease;
        self
    }

    /// Name of the reference parameter identifying a subscription.
    pub fn identifier_name() -> QName {
        QName::new(EVENTING_NS, "Identifier")
    }

    /// Subscription id among `params` (a manager EPR or request header).
    pub fn identifier(params: &[ReferenceParameter]) -> Option<&str> {
        let name = Self::identifier_name();
        params
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    fn grant(&self, requested: Option<Duration>) -> Duration {
        requested
            .filter(|d| !d.is_zero())
            .unwrap_or(self.default_lease)
            .min(self.max_lease)
    }

    /// Register a subscription; the response names its manager endpoint.
    pub fn subscribe(&self, request: &Subscribe) -> SubscribeResponse {
        let lease = self.grant(request.expires);
        let id = format!("urn:uuid:{}", uuid::Uuid::new_v4());
        let subscription = Subscription {
            id: id.clone(),
            notify_to: request.notify_to.clone(),
            end_to: request.end_to.clone(),
            filter: request.filter.clone(),
            expires_at: Instant::now() + lease,
        };
        log::debug!(
            "[eventing] subscribe {} -> {} for {:?}",
            id,
            subscription.notify_to.address,
            lease
        );
        self.subscriptions.lock().insert(id.clone(), subscription);

        SubscribeResponse {
            subscription_manager: EndpointReference::new(self.manager_address.clone())
                .with_parameter(ReferenceParameter::new(Self::identifier_name(), id)),
            expires: lease,
        }
    }

    /// Extend the lease of `id`. Expired subscriptions cannot be renewed.
    pub fn renew(&self, id: &str, request: &Renew) -> Result<RenewResponse, SoapError> {
        let now = Instant::now();
        let lease = self.grant(request.expires);
        let mut subscriptions = self.subscriptions.lock();
        match subscriptions.get_mut(id) {
            Some(sub) if !sub.is_expired(now) => {
                sub.expires_at = now + lease;
                log::debug!("[eventing] renew {} for {:?}", id, lease);
                Ok(RenewResponse {
                    expires: Some(lease),
                })
            }
            Some(_) => {
                subscriptions.remove(id);
                Err(unknown_subscription(id))
            }
            None => Err(unknown_subscription(id)),
        }
    }

    pub fn unsubscribe(&self, id: &str) -> Result<(), SoapError> {
        match self.subscriptions.lock().remove(id) {
            Some(_) => {
                log::debug!("[eventing] unsubscribe {}", id);
                Ok(())
            }
            None => Err(unknown_subscription(id)),
        }
    }

    /// Remaining lease of `id`.
    pub fn status(&self, id: &str) -> Option<Duration> {
        let now = Instant::now();
        self.subscriptions
            .lock()
            .get(id)
            .filter(|s| !s.is_expired(now))
            .map(|s| s.remaining(now))
    }

    /// Remove and return every subscription whose lease ended by `now`.
    pub fn expire(&self, now: Instant) -> Vec<Subscription> {
        let mut subscriptions = self.subscriptions.lock();
        let expired: Vec<String> = subscriptions
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| s.id.clone())
            .collect();
        let removed: Vec<Subscription> = expired
            .iter()
            .filter_map(|id| subscriptions.remove(id))
            .collect();
        if !removed.is_empty() {
            log::debug!("[eventing] {} subscription(s) expired", removed.len());
        }
        removed
    }

    /// Live subscriptions interested in `action`.
    pub fn subscribers(&self, action: &str) -> Vec<Subscription> {
        let now = Instant::now();
        self.subscriptions
            .lock()
            .values()
            .filter(|s| !s.is_expired(now) && s.accepts(action))
            .cloned()
            .collect()
    }

    /// Drop every subscription, returning the SubscriptionEnd messages
    /// to send (to `EndTo`, or `NotifyTo` when absent).
    pub fn teardown(&self, status: SubscriptionEndStatus, reason: Option<&str>) -> Vec<Message> {
        let drained: Vec<Subscription> = self.subscriptions.lock().drain().map(|(_, s)| s).collect();
        log::debug!(
            "[eventing] teardown of {} subscription(s): {}",
            drained.len(),
            status.local_name()
        );
        drained
            .into_iter()
            .map(|sub| self.end_message(sub, status, reason))
            .collect()
    }

    fn end_message(
        &self,
        sub: Subscription,
        status: SubscriptionEndStatus,
        reason: Option<&str>,
    ) -> Message {
        let target = sub.end_to.unwrap_or(sub.notify_to);
        let mut message = Message::new(MessageBody::SubscriptionEnd(SubscriptionEnd {
            subscription_manager: EndpointReference::new(self.manager_address.clone())
                .with_parameter(ReferenceParameter::new(Self::identifier_name(), sub.id)),
            status,
            reason: reason.map(str::to_string),
        }));
        message.header.to = Some(target.address);
        message.header.reference_parameters = target.reference_parameters;
        message
    }

    pub fn len(&self) -> usize {
        self.subscriptions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn unknown_subscription(id: &str) -> SoapError {
    SoapError::Invalid(format!("unknown subscription {}", id))
}

/// Serves Subscribe, Renew and Unsubscribe; other kinds are refused.
impl MessageReceiver for SubscriptionSet {
    fn receive(&self, message: Message, exchange: &mut Exchange) -> Result<(), SoapError> {
        let id = || {
            Self::identifier(&message.header.reference_parameters)
                .ok_or(SoapError::Missing("wse:Identifier"))
        };
        let body = match &message.body {
            MessageBody::Subscribe(request) => {
                MessageBody::SubscribeResponse(self.subscribe(request))
            }
            MessageBody::Renew(request) => MessageBody::RenewResponse(self.renew(id()?, request)?),
            MessageBody::Unsubscribe => {
                self.unsubscribe(id()?)?;
                MessageBody::UnsubscribeResponse
            }
            _ => return Err(SoapError::UnknownAction(message.header.action.clone())),
        };
        exchange.respond(message.reply(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;
    use crate::protocol::ProtocolVersion;
    use crate::soap::Transport;

    fn sink(n: u32) -> EndpointReference {
        EndpointReference::new(format!("http://sink/{}", n))
    }

    fn id_of(response: &SubscribeResponse) -> String {
        SubscriptionSet::identifier(&response.subscription_manager.reference_parameters)
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_subscribe_grants_clamped_lease() {
        let set = SubscriptionSet::new("http://dev/events").with_max_lease(Duration::from_secs(60));
        let mut request = Subscribe::new(sink(1));
        request.expires = Some(Duration::from_secs(600));
        let response = set.subscribe(&request);
        assert_eq!(response.expires, Duration::from_secs(60));
        assert_eq!(response.subscription_manager.address, "http://dev/events");
        assert!(set.status(&id_of(&response)).is_some());
    }

    #[test]
    fn test_renew_and_unsubscribe() {
        let set = SubscriptionSet::new("http://dev/events");
        let id = id_of(&set.subscribe(&Subscribe::new(sink(1))));

        let renewed = set
            .renew(
                &id,
                &Renew {
                    expires: Some(Duration::from_secs(30)),
                },
            )
            .unwrap();
        assert_eq!(renewed.expires, Some(Duration::from_secs(30)));

        set.unsubscribe(&id).unwrap();
        assert!(set.is_empty());
        assert!(set.unsubscribe(&id).is_err());
        assert!(set.renew(&id, &Renew::default()).is_err());
    }

    #[test]
    fn test_expire_removes_only_ended_leases() {
        let set = SubscriptionSet::new("http://dev/events");
        let mut short = Subscribe::new(sink(1));
        short.expires = Some(Duration::from_secs(1));
        let short_id = id_of(&set.subscribe(&short));
        set.subscribe(&Subscribe::new(sink(2)));

        assert!(set.expire(Instant::now()).is_empty());
        let expired = set.expire(Instant::now() + Duration::from_secs(2));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, short_id);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_filter_selects_subscribers() {
        let set = SubscriptionSet::new("http://dev/events");
        let mut filtered = Subscribe::new(sink(1));
        filtered.filter = Some(Filter {
            dialect: String::new(),
            actions: vec!["urn:svc/Changed".to_string()],
        });
        set.subscribe(&filtered);
        set.subscribe(&Subscribe::new(sink(2)));

        assert_eq!(set.subscribers("urn:svc/Changed").len(), 2);
        let other = set.subscribers("urn:svc/Other");
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].notify_to, sink(2));
    }

    #[test]
    fn test_teardown_addresses_end_to() {
        let set = SubscriptionSet::new("http://dev/events");
        let mut request = Subscribe::new(sink(1));
        request.end_to = Some(sink(9));
        set.subscribe(&request);
        set.subscribe(&Subscribe::new(sink(2)));

        let mut ends = set.teardown(SubscriptionEndStatus::SourceShuttingDown, Some("bye"));
        ends.sort_by(|a, b| a.header.to.cmp(&b.header.to));
        assert!(set.is_empty());
        assert_eq!(ends.len(), 2);
        assert_eq!(ends[0].header.to.as_deref(), Some("http://sink/2"));
        assert_eq!(ends[1].header.to.as_deref(), Some("http://sink/9"));
        match &ends[0].body {
            MessageBody::SubscriptionEnd(end) => {
                assert_eq!(end.status, SubscriptionEndStatus::SourceShuttingDown);
                assert_eq!(end.reason.as_deref(), Some("bye"));
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_receiver_round() {
        let set = SubscriptionSet::new("http://dev/events");
        let transport = Transport::Http {
            peer: None,
            path: "/events".to_string(),
            user: None,
        };

        let subscribe = Message::new(MessageBody::Subscribe(Subscribe::new(sink(1))));
        let mut exchange = Exchange::new(transport.clone(), ProtocolVersion::Current);
        set.receive(subscribe, &mut exchange).unwrap();
        let response = exchange.take_response().unwrap();
        let manager = match response.body {
            MessageBody::SubscribeResponse(r) => r.subscription_manager,
            other => panic!("unexpected body {:?}", other),
        };

        let mut unsubscribe = Message::new(MessageBody::Unsubscribe);
        unsubscribe.header.reference_parameters = manager.reference_parameters;
        let mut exchange = Exchange::new(transport.clone(), ProtocolVersion::Current);
        set.receive(unsubscribe, &mut exchange).unwrap();
        assert_eq!(
            exchange.take_response().unwrap().kind(),
            MessageKind::UnsubscribeResponse
        );
        assert!(set.is_empty());

        let mut exchange = Exchange::new(transport, ProtocolVersion::Current);
        let err = set
            .receive(Message::new(MessageBody::Renew(Renew::default())), &mut exchange)
            .unwrap_err();
        assert_eq!(err, SoapError::Missing("wse:Identifier"));
    }
}
