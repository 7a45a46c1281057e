use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use crate::alerts::connection::ConnectionId;
use crate::alerts::registry::ConnectionRegistry;
use crate::blockchain::address_codec::{self, CodecError};
use crate::logging::{LogContext, MetricsLogger};

/// Subscriber identifier as supplied by the client
pub type SubscriberId = String;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscribeError {
    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] CodecError),
    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),
    #[error("Address {address} already has {limit} subscriptions")]
    AddressLimit { address: String, limit: usize },
    #[error("Subscription limit of {limit} reached")]
    TotalLimit { limit: usize },
}

/// Bounds on the subscription map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionLimits {
    pub max_per_address: usize,
    pub max_total: usize,
}

impl Default for SubscriptionLimits {
    fn default() -> Self {
        Self {
            max_per_address: 1_000,
            max_total: 100_000,
        }
    }
}

/// Outbound "address touched" message
#[derive(Debug, Serialize)]
pub struct AddressEvent<'a> {
    pub cmd: &'static str,
    pub address: &'a str,
}

impl<'a> AddressEvent<'a> {
    pub fn new(address: &'a str) -> Self {
        Self { cmd: "ADDRESS_EVENT", address }
    }

    pub fn to_payload(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Outcome of notifying a batch of addresses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyReport {
    pub delivered: usize,
    pub pruned: usize,
}

#[derive(Default)]
struct Subscriptions {
    by_address: HashMap<String, HashMap<SubscriberId, ConnectionId>>,
    total: usize,
}

/// Address-keyed subscription table.
///
/// Keys are canonical public addresses; values map subscriber ids to the
/// connection that should receive alerts. Connection handles themselves
/// live in the [`ConnectionRegistry`].
pub struct AlertHub {
    subscriptions: Mutex<Subscriptions>,
    registry: Arc<ConnectionRegistry>,
    limits: SubscriptionLimits,
}

impl AlertHub {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self::with_limits(registry, SubscriptionLimits::default())
    }

    pub fn with_limits(registry: Arc<ConnectionRegistry>, limits: SubscriptionLimits) -> Self {
        Self {
            subscriptions: Mutex::new(Subscriptions::default()),
            registry,
            limits,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Subscriptions> {
        self.subscriptions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Register or replace the connection for an (address, subscriber) pair.
    ///
    /// The address is verified and stored in its canonical form, which is
    /// returned.
    pub fn subscribe(
        &self,
        address: &str,
        subscriber_id: &str,
        connection: ConnectionId,
    ) -> Result<String, SubscribeError> {
        let address = address_codec::canonicalize(address.trim())?;

        if !self.registry.contains(connection) {
            return Err(SubscribeError::UnknownConnection(connection));
        }

        let mut guard = self.lock();
        let subs = &mut *guard;
        let is_new_pair = subs
            .by_address
            .get(&address)
            .map_or(true, |subscribers| !subscribers.contains_key(subscriber_id));

        if is_new_pair {
            if subs.total >= self.limits.max_total {
                return Err(SubscribeError::TotalLimit { limit: self.limits.max_total });
            }
            let per_address = subs.by_address.get(&address).map_or(0, |s| s.len());
            if per_address >= self.limits.max_per_address {
                return Err(SubscribeError::AddressLimit {
                    address,
                    limit: self.limits.max_per_address,
                });
            }
            subs.total += 1;
        }

        subs.by_address
            .entry(address.clone())
            .or_default()
            .insert(subscriber_id.to_string(), connection);

        LogContext::new("alert_hub", "subscribe")
            .with_address(&address)
            .with_connection(connection)
            .with_metadata("subscriber_id", serde_json::json!(subscriber_id))
            .info(&format!("Starting alert for subscriber {} on {}", subscriber_id, address));

        Ok(address)
    }

    /// Remove an (address, subscriber) pair, but only when it is bound to
    /// `connection`. Returns whether an entry was removed.
    pub fn unsubscribe(&self, address: &str, subscriber_id: &str, connection: ConnectionId) -> bool {
        let address = address.trim();
        let mut guard = self.lock();
        let subs = &mut *guard;

        let Some(subscribers) = subs.by_address.get_mut(address) else {
            return false;
        };
        if subscribers.get(subscriber_id) != Some(&connection) {
            return false;
        }

        subscribers.remove(subscriber_id);
        if subscribers.is_empty() {
            subs.by_address.remove(address);
        }
        subs.total -= 1;
        true
    }

    /// Send one `ADDRESS_EVENT` per touched address to each of its
    /// subscribers, dropping entries whose connection is gone.
    pub fn notify_addresses(&self, addresses: &BTreeSet<String>) -> NotifyReport {
        let mut report = NotifyReport::default();
        let mut guard = self.lock();
        let subs = &mut *guard;

        for address in addresses {
            let Some(subscribers) = subs.by_address.get_mut(address) else {
                continue;
            };

            let payload = AddressEvent::new(address).to_payload();
            let before = subscribers.len();

            subscribers.retain(|_, connection| self.registry.send_to(*connection, &payload).is_ok());

            let pruned = before - subscribers.len();
            report.delivered += subscribers.len();
            report.pruned += pruned;

            if subscribers.is_empty() {
                subs.by_address.remove(address);
            }
            subs.total -= pruned;

            if pruned > 0 {
                LogContext::new("alert_hub", "prune")
                    .with_address(address)
                    .with_metadata("pruned", serde_json::json!(pruned))
                    .debug(&format!("Removed {} stale subscriptions", pruned));
            }
        }

        if report.delivered > 0 || report.pruned > 0 {
            MetricsLogger::log_alert_broadcast(addresses.len(), report.delivered, report.pruned);
        }

        report
    }

    /// Number of (address, subscriber) pairs
    pub fn subscription_count(&self) -> usize {
        self.lock().total
    }

    /// Number of distinct watched addresses
    pub fn watched_address_count(&self) -> usize {
        self.lock().by_address.len()
    }

    pub fn is_watched(&self, address: &str) -> bool {
        self.lock().by_address.contains_key(address)
    }
}
