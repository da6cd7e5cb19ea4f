//! Session lifecycle orchestration
//!
//! `SessionEngine` composes the billing policy, the session registry,
//! the store and the notifier. It is owned by the daemon event loop;
//! every mutation (login, logout, top-up, tick) funnels through that
//! single owner, which is what keeps the registry race-free.

use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::{debug, info, warn};
use warnet_api::{
    Customer, CustomerStatus, EndReason, EngineStateSnapshot, EventPayload, API_VERSION,
};
use warnet_config::{BillingSettings, SessionSettings};
use warnet_store::{ActivityEntry, ActivityEvent, Store, StoreError};
use warnet_util::{format_seconds, CustomerId, SessionRowId, WarnetError};

use crate::billing::{self, ExpiryDecision};
use crate::{Notifier, SessionRegistry};

pub(crate) fn store_err(e: StoreError) -> WarnetError {
    WarnetError::store(e.to_string())
}

/// What a successful activation produced.
#[derive(Debug, Clone, Copy)]
pub struct StartOutcome {
    pub session_id: SessionRowId,
    pub balance: i64,
    pub time_remaining: i64,
    /// Whether one conversion ran before the countdown began.
    pub converted: bool,
}

/// The billing and session-lifecycle engine.
pub struct SessionEngine {
    pub(crate) registry: SessionRegistry,
    pub(crate) store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    billing: BillingSettings,
    broadcast_interval: i64,
}

impl SessionEngine {
    pub fn new(
        billing: BillingSettings,
        session: SessionSettings,
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        info!(
            rate = billing.rate,
            seconds_per_unit = billing.seconds_per_unit,
            broadcast_interval = session.broadcast_interval_seconds,
            "Session engine initialized"
        );

        Self {
            registry: SessionRegistry::new(),
            store,
            notifier,
            billing,
            broadcast_interval: session.broadcast_interval_seconds,
        }
    }

    /// Begin billing for an authenticated customer.
    ///
    /// The caller (the authentication gate) has already verified
    /// identity; this only decides whether the customer can afford a
    /// session, runs at most one conversion, and brings the durable and
    /// in-memory state up. Funds are persisted before the registry is
    /// touched so a crash in between cannot leave memory ahead of the
    /// store.
    pub fn start_session(
        &mut self,
        customer_id: CustomerId,
        now: DateTime<Local>,
    ) -> Result<StartOutcome, WarnetError> {
        let customer = self
            .store
            .get_customer(customer_id)
            .map_err(store_err)?
            .ok_or(WarnetError::CustomerNotFound(customer_id))?;

        if self.registry.contains(customer_id) {
            warn!(customer_id = %customer_id, "Session start refused: already active");
            return Err(WarnetError::SessionAlreadyActive(customer_id));
        }

        let activation =
            billing::should_activate(customer.balance, customer.time_remaining, &self.billing);
        if !activation.allow {
            info!(
                customer_id = %customer_id,
                balance = customer.balance,
                "Activation denied: no usage time and balance below one unit"
            );
            let _ = self
                .store
                .append_activity(ActivityEntry::new(ActivityEvent::ActivationDenied {
                    customer_id,
                    balance: customer.balance,
                    time_remaining: customer.time_remaining,
                }));
            return Err(WarnetError::InsufficientResources);
        }

        let mut balance = customer.balance;
        let mut time_remaining = customer.time_remaining;
        let mut converted = false;

        if activation.convert {
            let conversion = billing::convert_once(balance, time_remaining, &self.billing)
                .expect("activation signalled a convertible balance");

            self.store
                .update_customer_funds(customer_id, conversion.balance, conversion.time_remaining)
                .map_err(store_err)?;
            let _ = self
                .store
                .append_activity(ActivityEntry::new(ActivityEvent::CreditConverted {
                    customer_id,
                    amount: conversion.amount,
                    balance_before: balance,
                    balance_after: conversion.balance,
                    time_before: time_remaining,
                    time_after: conversion.time_remaining,
                }));

            info!(
                customer_id = %customer_id,
                amount = conversion.amount,
                "Converted one unit of balance into usage time"
            );

            balance = conversion.balance;
            time_remaining = conversion.time_remaining;
            converted = true;
        }

        if customer.status != CustomerStatus::Active {
            self.store
                .set_customer_status(customer_id, CustomerStatus::Active)
                .map_err(store_err)?;
        }

        let snapshot = Customer {
            balance,
            time_remaining,
            status: CustomerStatus::Active,
            ..customer
        };
        self.registry.register(&snapshot, now);

        let session_id = self
            .store
            .create_session(customer_id, now)
            .map_err(store_err)?;

        let _ = self
            .store
            .append_activity(ActivityEntry::new(ActivityEvent::SessionStarted {
                customer_id,
                session_id,
            }));

        self.notifier.to_admins(EventPayload::CustomerStatusChanged {
            customer_id,
            status: CustomerStatus::Active,
        });
        self.notifier.to_admins(EventPayload::LoginNotification {
            customer_id,
            customer_name: snapshot.name.clone(),
            time: now,
        });

        info!(
            customer_id = %customer_id,
            session_id = %session_id,
            remaining = %format_seconds(time_remaining),
            "Session started"
        );

        Ok(StartOutcome {
            session_id,
            balance,
            time_remaining,
            converted,
        })
    }

    /// Terminate a customer's session.
    ///
    /// Safe to call repeatedly: once the registry entry is gone a second
    /// call degrades to a defensive store update plus warnings, never an
    /// error. The live snapshot, not the store, is the authority for the
    /// final counter value.
    pub fn end_session(
        &mut self,
        customer_id: CustomerId,
        reason: EndReason,
        now: DateTime<Local>,
    ) -> Result<(), WarnetError> {
        let snapshot = self.registry.unregister(customer_id);
        if snapshot.is_none() {
            warn!(
                customer_id = %customer_id,
                "No live snapshot at termination; best-effort store update"
            );
        }

        self.store
            .set_customer_status(customer_id, CustomerStatus::Inactive)
            .map_err(store_err)?;

        if let Some(snap) = &snapshot {
            self.store
                .update_time_remaining(customer_id, snap.time_remaining.max(0))
                .map_err(store_err)?;
        }

        let closed = self
            .store
            .close_latest_active_session(customer_id, now, reason.session_status())
            .map_err(store_err)?;
        if closed.is_none() {
            warn!(customer_id = %customer_id, "No open session row to close");
        }

        // Best-effort display name: the snapshot first, else a fresh
        // row read (which may race a deletion on the admin side).
        let customer_name = match &snapshot {
            Some(snap) => snap.customer_name.clone(),
            None => self
                .store
                .get_customer(customer_id)
                .ok()
                .flatten()
                .map(|c| c.name)
                .unwrap_or_default(),
        };

        self.notifier.to_admins(EventPayload::CustomerStatusChanged {
            customer_id,
            status: CustomerStatus::Inactive,
        });
        self.notifier.to_admins(EventPayload::LogoutNotification {
            customer_id,
            customer_name,
            time: now,
        });

        let time_remaining = snapshot.as_ref().map(|s| s.time_remaining).unwrap_or(0);
        let _ = self
            .store
            .append_activity(ActivityEntry::new(ActivityEvent::SessionEnded {
                customer_id,
                session_id: closed,
                reason,
                time_remaining,
            }));

        info!(
            customer_id = %customer_id,
            reason = ?reason,
            remaining = %format_seconds(time_remaining),
            "Session ended"
        );

        Ok(())
    }

    /// A top-up reached an online customer: sync the live snapshot and
    /// push the fresh counters so the station display is never stale by
    /// more than one round trip. A no-op for offline customers (the
    /// store was already updated by the caller).
    pub fn update_balance(&mut self, customer_id: CustomerId, new_balance: i64) {
        match self.registry.update_balance(customer_id, new_balance) {
            Some(update) => {
                self.notifier.to_customer(
                    customer_id,
                    EventPayload::SessionUpdate {
                        time_remaining: update.time_remaining,
                        balance: update.balance,
                    },
                );
                debug!(customer_id = %customer_id, balance = new_balance, "Live balance updated");
            }
            None => {
                debug!(
                    customer_id = %customer_id,
                    "Top-up for offline customer; no live snapshot to update"
                );
            }
        }
    }

    /// One tick: advance every countdown, then process expiries.
    ///
    /// The decrement pass is pure CPU and completes over the whole
    /// registry before any expiry I/O runs, so one customer's store
    /// trouble cannot stall another's clock. An expiry that fails is
    /// left registered and retried on the next tick.
    pub fn tick(&mut self, now: DateTime<Local>) {
        if self.registry.is_empty() {
            return;
        }

        let pass = self.registry.tick(self.broadcast_interval);

        for update in pass.updates {
            self.notifier.to_customer(
                update.customer_id,
                EventPayload::SessionUpdate {
                    time_remaining: update.time_remaining,
                    balance: update.balance,
                },
            );
        }

        for customer_id in pass.expired {
            if let Err(e) = self.handle_expiry(customer_id, now) {
                warn!(
                    customer_id = %customer_id,
                    error = %e,
                    "Expiry handling failed; will retry next tick"
                );
            }
        }
    }

    /// A session's counter hit zero: convert another unit if the stored
    /// balance covers it, otherwise terminate.
    fn handle_expiry(
        &mut self,
        customer_id: CustomerId,
        now: DateTime<Local>,
    ) -> Result<(), WarnetError> {
        // Re-read the authoritative balance; a top-up may have arrived
        // through a path that never touched the live snapshot.
        let stored = self.store.get_customer(customer_id).map_err(store_err)?;

        let Some(customer) = stored else {
            warn!(customer_id = %customer_id, "Customer row vanished mid-session; terminating");
            return self.end_session(customer_id, EndReason::AutoExpired, now);
        };

        match billing::on_expiry(customer.balance, &self.billing) {
            ExpiryDecision::Convert => {
                let time_remaining = self
                    .registry
                    .get(customer_id)
                    .map(|s| s.time_remaining)
                    .unwrap_or(0);
                let conversion =
                    billing::convert_once(customer.balance, time_remaining, &self.billing)
                        .expect("expiry decision signalled a convertible balance");

                self.store
                    .update_customer_funds(
                        customer_id,
                        conversion.balance,
                        conversion.time_remaining,
                    )
                    .map_err(store_err)?;
                let _ = self
                    .store
                    .append_activity(ActivityEntry::new(ActivityEvent::CreditConverted {
                        customer_id,
                        amount: conversion.amount,
                        balance_before: customer.balance,
                        balance_after: conversion.balance,
                        time_before: time_remaining,
                        time_after: conversion.time_remaining,
                    }));

                if let Some(update) = self.registry.apply_conversion(
                    customer_id,
                    conversion.balance,
                    conversion.time_remaining,
                ) {
                    self.notifier.to_customer(
                        customer_id,
                        EventPayload::SessionUpdate {
                            time_remaining: update.time_remaining,
                            balance: update.balance,
                        },
                    );
                }

                info!(
                    customer_id = %customer_id,
                    amount = conversion.amount,
                    "Expiry conversion applied; session continues"
                );
                Ok(())
            }
            ExpiryDecision::Terminate => self.end_session(customer_id, EndReason::AutoExpired, now),
        }
    }

    /// Cancel every live session (daemon shutdown).
    pub fn shutdown_all(&mut self, now: DateTime<Local>) {
        for customer_id in self.registry.customer_ids() {
            if let Err(e) = self.end_session(customer_id, EndReason::Unknown, now) {
                warn!(
                    customer_id = %customer_id,
                    error = %e,
                    "Failed to end session during shutdown"
                );
            }
        }
    }

    /// Current engine state for admin consoles.
    pub fn state_snapshot(&self) -> EngineStateSnapshot {
        EngineStateSnapshot {
            api_version: API_VERSION,
            active_count: self.registry.len(),
            sessions: self.registry.session_infos(),
        }
    }

    pub fn has_session(&self, customer_id: CustomerId) -> bool {
        self.registry.contains(customer_id)
    }

    pub fn active_count(&self) -> usize {
        self.registry.len()
    }

    /// Read access to the live registry (state inspection in tests).
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordingNotifier;
    use warnet_api::{Audience, SessionStatus};
    use warnet_store::SqliteStore;

    struct Fixture {
        engine: SessionEngine,
        store: Arc<SqliteStore>,
        notifier: Arc<RecordingNotifier>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = SessionEngine::new(
            BillingSettings::default(),
            SessionSettings::default(),
            store.clone(),
            notifier.clone(),
        );
        Fixture {
            engine,
            store,
            notifier,
        }
    }

    fn seed(store: &SqliteStore, balance: i64, time_remaining: i64) -> CustomerId {
        store.insert_customer("Budi", balance, time_remaining).unwrap()
    }

    #[test]
    fn start_with_time_skips_conversion() {
        let mut f = fixture();
        let id = seed(&f.store, 5_000, 1_800);

        let outcome = f.engine.start_session(id, warnet_util::now()).unwrap();

        assert!(!outcome.converted);
        assert_eq!(outcome.balance, 5_000);
        assert_eq!(outcome.time_remaining, 1_800);
        assert!(f.engine.has_session(id));

        let customer = f.store.get_customer(id).unwrap().unwrap();
        assert_eq!(customer.status, CustomerStatus::Active);
    }

    #[test]
    fn start_without_time_converts_exactly_once() {
        let mut f = fixture();
        let id = seed(&f.store, 10_000, 0);

        let outcome = f.engine.start_session(id, warnet_util::now()).unwrap();

        assert!(outcome.converted);
        assert_eq!(outcome.balance, 0);
        assert_eq!(outcome.time_remaining, 3_600);

        // The conversion hit the store before the session registered.
        let customer = f.store.get_customer(id).unwrap().unwrap();
        assert_eq!(customer.balance, 0);
        assert_eq!(customer.time_remaining, 3_600);

        // Admins saw a status change and a login notification.
        let sent = f.notifier.sent();
        assert!(sent.iter().any(|(aud, ev)| {
            *aud == Audience::Admins
                && matches!(
                    ev,
                    EventPayload::CustomerStatusChanged {
                        status: CustomerStatus::Active,
                        ..
                    }
                )
        }));
        assert!(sent
            .iter()
            .any(|(_, ev)| matches!(ev, EventPayload::LoginNotification { .. })));
    }

    #[test]
    fn start_without_funds_is_refused_with_no_state_change() {
        let mut f = fixture();
        let id = seed(&f.store, 5_000, 0);

        let result = f.engine.start_session(id, warnet_util::now());

        assert!(matches!(result, Err(WarnetError::InsufficientResources)));
        assert!(!f.engine.has_session(id));

        let customer = f.store.get_customer(id).unwrap().unwrap();
        assert_eq!(customer.balance, 5_000);
        assert_eq!(customer.status, CustomerStatus::Inactive);

        // No session row was created.
        assert!(f.store.active_sessions().unwrap().is_empty());
    }

    #[test]
    fn start_unknown_customer_fails() {
        let mut f = fixture();
        let result = f.engine.start_session(CustomerId::new(404), warnet_util::now());
        assert!(matches!(result, Err(WarnetError::CustomerNotFound(_))));
    }

    #[test]
    fn duplicate_start_is_refused() {
        let mut f = fixture();
        let id = seed(&f.store, 0, 600);

        f.engine.start_session(id, warnet_util::now()).unwrap();
        let result = f.engine.start_session(id, warnet_util::now());

        assert!(matches!(result, Err(WarnetError::SessionAlreadyActive(_))));
        // Still exactly one open session row.
        assert_eq!(f.store.active_sessions().unwrap().len(), 1);
    }

    #[test]
    fn end_session_persists_final_counter_and_closes_row() {
        let mut f = fixture();
        let id = seed(&f.store, 0, 100);

        let outcome = f.engine.start_session(id, warnet_util::now()).unwrap();
        for _ in 0..40 {
            f.engine.tick(warnet_util::now());
        }

        f.engine
            .end_session(id, EndReason::UserLogout, warnet_util::now())
            .unwrap();

        assert!(!f.engine.has_session(id));

        let customer = f.store.get_customer(id).unwrap().unwrap();
        assert_eq!(customer.status, CustomerStatus::Inactive);
        // Final value synced from the live snapshot, not the stale row.
        assert_eq!(customer.time_remaining, 60);

        let session = f.store.get_session(outcome.session_id).unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Cancelled);
        assert!(session.end_time.is_some());
    }

    #[test]
    fn end_session_twice_is_idempotent() {
        let mut f = fixture();
        let id = seed(&f.store, 0, 100);

        let outcome = f.engine.start_session(id, warnet_util::now()).unwrap();
        f.engine
            .end_session(id, EndReason::UserLogout, warnet_util::now())
            .unwrap();

        // Second call: no live snapshot, no open row, still Ok.
        f.engine
            .end_session(id, EndReason::UserLogout, warnet_util::now())
            .unwrap();

        let session = f.store.get_session(outcome.session_id).unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Cancelled);

        // Exactly one SessionEnded row mentions a closed session id;
        // the second termination had nothing left to close.
        let closes: Vec<_> = f
            .store
            .recent_activity(20)
            .unwrap()
            .into_iter()
            .filter_map(|entry| match entry.event {
                ActivityEvent::SessionEnded { session_id, .. } => Some(session_id),
                _ => None,
            })
            .collect();
        assert_eq!(closes.len(), 2);
        assert_eq!(closes.iter().filter(|id| id.is_some()).count(), 1);
    }

    #[test]
    fn expiry_with_funds_converts_and_continues() {
        let mut f = fixture();
        let id = seed(&f.store, 10_000, 2);

        f.engine.start_session(id, warnet_util::now()).unwrap();
        f.notifier.take();

        // Two ticks drain the counter, the third processes the expiry.
        for _ in 0..3 {
            f.engine.tick(warnet_util::now());
        }

        assert!(f.engine.has_session(id));
        let session = f.engine.registry().get(id).unwrap();
        assert_eq!(session.balance, 0);
        assert_eq!(session.time_remaining, 3_600);

        let customer = f.store.get_customer(id).unwrap().unwrap();
        assert_eq!(customer.balance, 0);
        assert_eq!(customer.time_remaining, 3_600);

        // The station saw the refreshed counters.
        assert!(f.notifier.sent().iter().any(|(aud, ev)| {
            *aud == Audience::Customer(id)
                && matches!(
                    ev,
                    EventPayload::SessionUpdate {
                        time_remaining: 3_600,
                        balance: 0
                    }
                )
        }));
    }

    #[test]
    fn expiry_without_funds_terminates_as_completed() {
        let mut f = fixture();
        let id = seed(&f.store, 5_000, 1);

        let outcome = f.engine.start_session(id, warnet_util::now()).unwrap();
        for _ in 0..2 {
            f.engine.tick(warnet_util::now());
        }

        assert!(!f.engine.has_session(id));

        let customer = f.store.get_customer(id).unwrap().unwrap();
        assert_eq!(customer.status, CustomerStatus::Inactive);
        assert_eq!(customer.time_remaining, 0);
        assert_eq!(customer.balance, 5_000);

        // Natural expiry closes the row as completed.
        let session = f.store.get_session(outcome.session_id).unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
    }

    #[test]
    fn expiry_rereads_store_balance_for_out_of_band_topups() {
        let mut f = fixture();
        let id = seed(&f.store, 0, 1);

        f.engine.start_session(id, warnet_util::now()).unwrap();

        // Top-up lands directly in the store, bypassing update_balance.
        f.store.update_balance(id, 10_000).unwrap();

        for _ in 0..2 {
            f.engine.tick(warnet_util::now());
        }

        // The stale zero-balance snapshot did not terminate the session.
        assert!(f.engine.has_session(id));
        assert_eq!(f.engine.registry().get(id).unwrap().time_remaining, 3_600);
    }

    #[test]
    fn update_balance_pushes_fresh_counters_to_station() {
        let mut f = fixture();
        let id = seed(&f.store, 1_000, 600);

        f.engine.start_session(id, warnet_util::now()).unwrap();
        f.notifier.take();

        f.engine.update_balance(id, 21_000);

        let sent = f.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, Audience::Customer(id));
        assert!(matches!(
            sent[0].1,
            EventPayload::SessionUpdate {
                balance: 21_000,
                time_remaining: 600
            }
        ));
        assert_eq!(f.engine.registry().get(id).unwrap().balance, 21_000);
    }

    #[test]
    fn update_balance_for_offline_customer_is_noop() {
        let mut f = fixture();
        let id = seed(&f.store, 1_000, 600);

        f.engine.update_balance(id, 9_000);
        assert!(f.notifier.sent().is_empty());
    }

    #[test]
    fn broadcast_updates_fire_on_interval_boundaries() {
        let mut f = fixture();
        let id = seed(&f.store, 0, 21);

        f.engine.start_session(id, warnet_util::now()).unwrap();
        f.notifier.take();

        for _ in 0..21 {
            f.engine.tick(warnet_util::now());
        }

        let values: Vec<i64> = f
            .notifier
            .sent()
            .into_iter()
            .filter_map(|(_, ev)| match ev {
                EventPayload::SessionUpdate { time_remaining, .. } => Some(time_remaining),
                _ => None,
            })
            .collect();
        assert_eq!(values, vec![20, 10, 0]);
    }

    #[test]
    fn shutdown_cancels_every_live_session() {
        let mut f = fixture();
        let a = f.store.insert_customer("Budi", 0, 100).unwrap();
        let b = f.store.insert_customer("Sari", 0, 200).unwrap();

        f.engine.start_session(a, warnet_util::now()).unwrap();
        f.engine.start_session(b, warnet_util::now()).unwrap();

        f.engine.shutdown_all(warnet_util::now());

        assert_eq!(f.engine.active_count(), 0);
        assert!(f.store.active_sessions().unwrap().is_empty());
        for id in [a, b] {
            let customer = f.store.get_customer(id).unwrap().unwrap();
            assert_eq!(customer.status, CustomerStatus::Inactive);
        }
    }

    #[test]
    fn state_snapshot_lists_live_sessions() {
        let mut f = fixture();
        let id = seed(&f.store, 2_500, 900);

        f.engine.start_session(id, warnet_util::now()).unwrap();

        let snapshot = f.engine.state_snapshot();
        assert_eq!(snapshot.active_count, 1);
        assert_eq!(snapshot.sessions[0].customer_id, id);
        assert_eq!(snapshot.sessions[0].balance, 2_500);
        assert_eq!(snapshot.sessions[0].time_remaining, 900);
    }
}
