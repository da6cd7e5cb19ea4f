//! The session registry: the authoritative in-memory map of live sessions.
//!
//! This is the only place usage time actually counts down; the durable
//! customer row is only periodically and finally synced. The registry is
//! a plain `HashMap` with a single logical writer: the daemon event loop
//! owns it (through the engine) and all external calls funnel through
//! that loop, so no locking happens at this level.

use chrono::{DateTime, Local};
use std::collections::HashMap;
use tracing::warn;
use warnet_api::{Customer, SessionInfo};
use warnet_util::CustomerId;

/// Live counters for one logged-in customer.
///
/// Created on register, mutated every tick, destroyed on unregister.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub balance: i64,
    pub time_remaining: i64,
    pub started_at: DateTime<Local>,
}

impl ActiveSession {
    fn from_customer(customer: &Customer, started_at: DateTime<Local>) -> Self {
        Self {
            customer_id: customer.id,
            customer_name: customer.name.clone(),
            balance: customer.balance,
            time_remaining: customer.time_remaining,
            started_at,
        }
    }

    pub fn to_session_info(&self) -> SessionInfo {
        SessionInfo {
            customer_id: self.customer_id,
            customer_name: self.customer_name.clone(),
            balance: self.balance,
            time_remaining: self.time_remaining,
            started_at: self.started_at,
        }
    }
}

/// A counter push owed to a customer's station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionUpdate {
    pub customer_id: CustomerId,
    pub time_remaining: i64,
    pub balance: i64,
}

/// Result of one decrement pass over the registry.
#[derive(Debug, Default)]
pub struct TickPass {
    /// Counter updates due this tick (broadcast-interval boundaries).
    pub updates: Vec<SessionUpdate>,
    /// Customers whose counter was already exhausted at tick entry.
    pub expired: Vec<CustomerId>,
}

/// The authoritative map of currently active sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<CustomerId, ActiveSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a live snapshot copied from the given customer.
    ///
    /// Idempotent: a second register for the same customer is a no-op
    /// with a warning, leaving the existing counters untouched.
    pub fn register(&mut self, customer: &Customer, started_at: DateTime<Local>) -> bool {
        if self.sessions.contains_key(&customer.id) {
            warn!(customer_id = %customer.id, "Session already registered; ignoring");
            return false;
        }

        self.sessions
            .insert(customer.id, ActiveSession::from_customer(customer, started_at));
        true
    }

    /// Remove and return the live snapshot; no-op if absent.
    pub fn unregister(&mut self, customer_id: CustomerId) -> Option<ActiveSession> {
        self.sessions.remove(&customer_id)
    }

    pub fn get(&self, customer_id: CustomerId) -> Option<&ActiveSession> {
        self.sessions.get(&customer_id)
    }

    pub fn contains(&self, customer_id: CustomerId) -> bool {
        self.sessions.contains_key(&customer_id)
    }

    /// In-place balance update for a top-up reaching an online customer.
    /// Returns the fresh counters so the caller can push them out
    /// immediately; `None` when the customer is not online.
    pub fn update_balance(
        &mut self,
        customer_id: CustomerId,
        new_balance: i64,
    ) -> Option<SessionUpdate> {
        let session = self.sessions.get_mut(&customer_id)?;
        session.balance = new_balance;

        Some(SessionUpdate {
            customer_id,
            time_remaining: session.time_remaining,
            balance: session.balance,
        })
    }

    /// Overwrite both counters after an expiry conversion.
    pub fn apply_conversion(
        &mut self,
        customer_id: CustomerId,
        balance: i64,
        time_remaining: i64,
    ) -> Option<SessionUpdate> {
        let session = self.sessions.get_mut(&customer_id)?;
        session.balance = balance;
        session.time_remaining = time_remaining;

        Some(SessionUpdate {
            customer_id,
            time_remaining: session.time_remaining,
            balance: session.balance,
        })
    }

    /// One decrement pass over every session. CPU-only: the caller
    /// performs all pushes and expiry I/O after this returns, so no
    /// customer's store trouble can stall another's countdown.
    ///
    /// A session with time left loses one second; when the new value
    /// lands on a broadcast-interval boundary an update is owed. A
    /// session that arrives with nothing left is reported as expired
    /// instead of being decremented further.
    pub fn tick(&mut self, broadcast_interval: i64) -> TickPass {
        let mut pass = TickPass::default();

        for session in self.sessions.values_mut() {
            if session.time_remaining > 0 {
                session.time_remaining -= 1;
                if session.time_remaining % broadcast_interval == 0 {
                    pass.updates.push(SessionUpdate {
                        customer_id: session.customer_id,
                        time_remaining: session.time_remaining,
                        balance: session.balance,
                    });
                }
            } else {
                pass.expired.push(session.customer_id);
            }
        }

        pass
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Ids of every registered customer (sorted, for deterministic
    /// iteration by callers that mutate while walking).
    pub fn customer_ids(&self) -> Vec<CustomerId> {
        let mut ids: Vec<_> = self.sessions.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Live views for state snapshots, sorted by customer id.
    pub fn session_infos(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<_> = self.sessions.values().map(|s| s.to_session_info()).collect();
        infos.sort_by_key(|info| info.customer_id);
        infos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warnet_api::CustomerStatus;

    fn customer(id: i64, balance: i64, time_remaining: i64) -> Customer {
        Customer {
            id: CustomerId::new(id),
            name: format!("customer-{id}"),
            balance,
            time_remaining,
            status: CustomerStatus::Active,
        }
    }

    #[test]
    fn register_is_idempotent() {
        let mut registry = SessionRegistry::new();
        let now = warnet_util::now();

        assert!(registry.register(&customer(1, 0, 100), now));
        // Second register keeps the original counters.
        assert!(!registry.register(&customer(1, 0, 999), now));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(CustomerId::new(1)).unwrap().time_remaining, 100);
    }

    #[test]
    fn unregister_absent_is_noop() {
        let mut registry = SessionRegistry::new();
        assert!(registry.unregister(CustomerId::new(9)).is_none());
    }

    #[test]
    fn tick_decrements_monotonically() {
        let mut registry = SessionRegistry::new();
        registry.register(&customer(1, 0, 50), warnet_util::now());

        for k in 1..=50 {
            registry.tick(10);
            assert_eq!(
                registry.get(CustomerId::new(1)).unwrap().time_remaining,
                50 - k
            );
        }
    }

    #[test]
    fn tick_pushes_updates_on_broadcast_boundaries() {
        let mut registry = SessionRegistry::new();
        registry.register(&customer(1, 5_000, 25), warnet_util::now());

        let mut pushed = Vec::new();
        for _ in 0..25 {
            let pass = registry.tick(10);
            pushed.extend(pass.updates);
            assert!(pass.expired.is_empty());
        }

        let values: Vec<i64> = pushed.iter().map(|u| u.time_remaining).collect();
        assert_eq!(values, vec![20, 10, 0]);
        assert!(pushed.iter().all(|u| u.balance == 5_000));
    }

    #[test]
    fn tick_reports_exhausted_sessions_without_decrementing() {
        let mut registry = SessionRegistry::new();
        registry.register(&customer(1, 0, 1), warnet_util::now());

        let pass = registry.tick(10);
        assert!(pass.expired.is_empty());
        assert_eq!(registry.get(CustomerId::new(1)).unwrap().time_remaining, 0);

        // Next tick sees zero and routes to expiry instead.
        let pass = registry.tick(10);
        assert_eq!(pass.expired, vec![CustomerId::new(1)]);
        assert_eq!(registry.get(CustomerId::new(1)).unwrap().time_remaining, 0);
    }

    #[test]
    fn tick_handles_empty_registry() {
        let mut registry = SessionRegistry::new();
        let pass = registry.tick(10);
        assert!(pass.updates.is_empty());
        assert!(pass.expired.is_empty());
    }

    #[test]
    fn update_balance_returns_fresh_counters() {
        let mut registry = SessionRegistry::new();
        registry.register(&customer(1, 1_000, 300), warnet_util::now());

        let update = registry.update_balance(CustomerId::new(1), 11_000).unwrap();
        assert_eq!(update.balance, 11_000);
        assert_eq!(update.time_remaining, 300);

        assert!(registry.update_balance(CustomerId::new(2), 500).is_none());
    }

    #[test]
    fn apply_conversion_overwrites_both_counters() {
        let mut registry = SessionRegistry::new();
        registry.register(&customer(1, 10_000, 0), warnet_util::now());

        let update = registry
            .apply_conversion(CustomerId::new(1), 0, 3_600)
            .unwrap();
        assert_eq!(update.balance, 0);
        assert_eq!(update.time_remaining, 3_600);
    }

    #[test]
    fn independent_sessions_do_not_interfere() {
        let mut registry = SessionRegistry::new();
        let now = warnet_util::now();
        registry.register(&customer(1, 0, 10), now);
        registry.register(&customer(2, 0, 20), now);

        for _ in 0..5 {
            registry.tick(10);
        }

        assert_eq!(registry.get(CustomerId::new(1)).unwrap().time_remaining, 5);
        assert_eq!(registry.get(CustomerId::new(2)).unwrap().time_remaining, 15);

        registry.unregister(CustomerId::new(1));
        registry.tick(10);
        assert_eq!(registry.get(CustomerId::new(2)).unwrap().time_remaining, 14);
    }
}
