//! Boot-time recovery of sessions left open by an unclean shutdown.
//!
//! Runs once, before the first tick, so a freshly resumed registration
//! never races the ticker.

use chrono::{DateTime, Local};
use tracing::{info, warn};
use warnet_api::{Customer, EndReason, SessionStatus};
use warnet_store::{ActivityEntry, ActivityEvent, Store};
use warnet_util::{elapsed_seconds, format_seconds, WarnetError};

use crate::engine::{store_err, SessionEngine};

/// What the reconciliation pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Sessions re-registered live; their open rows keep running.
    pub resumed: usize,
    /// Sessions that ran out of time while the daemon was down.
    pub expired: usize,
    /// Rows whose customer no longer exists, force-closed.
    pub orphans: usize,
}

impl SessionEngine {
    /// Reconcile every session row still marked active against elapsed
    /// wall-clock time. A row that fails is skipped with a warning so
    /// one bad record cannot block boot.
    pub fn recover(&mut self, now: DateTime<Local>) -> Result<RecoveryReport, WarnetError> {
        let rows = self.store.active_sessions().map_err(store_err)?;
        let mut report = RecoveryReport::default();

        for row in rows {
            let session = row.session;

            let Some(customer) = row.customer else {
                warn!(session_id = %session.id, "Orphan session row; closing as cancelled");
                if let Err(e) = self
                    .store
                    .close_session(session.id, now, SessionStatus::Cancelled)
                {
                    warn!(session_id = %session.id, error = %e, "Failed to close orphan row; skipping");
                    continue;
                }
                let _ = self
                    .store
                    .append_activity(ActivityEntry::new(ActivityEvent::OrphanSessionClosed {
                        session_id: session.id,
                    }));
                report.orphans += 1;
                continue;
            };

            let elapsed = elapsed_seconds(session.start_time, now);
            let remaining = customer.time_remaining - elapsed;

            if remaining <= 0 {
                // The customer silently ran out of time while the
                // process was down.
                let result = self
                    .store
                    .update_time_remaining(customer.id, 0)
                    .map_err(store_err)
                    .and_then(|_| self.end_session(customer.id, EndReason::AutoExpired, now));

                if let Err(e) = result {
                    warn!(customer_id = %customer.id, error = %e, "Failed to expire recovered session; skipping");
                    continue;
                }
                report.expired += 1;
            } else {
                if let Err(e) = self.store.update_time_remaining(customer.id, remaining) {
                    warn!(customer_id = %customer.id, error = %e, "Failed to persist recovered counter; skipping");
                    continue;
                }

                // The existing row keeps running; no new row is created.
                let snapshot = Customer {
                    time_remaining: remaining,
                    ..customer
                };
                self.registry.register(&snapshot, session.start_time);

                info!(
                    customer_id = %snapshot.id,
                    remaining = %format_seconds(remaining),
                    "Session resumed after restart"
                );
                report.resumed += 1;
            }
        }

        let _ = self
            .store
            .append_activity(ActivityEntry::new(ActivityEvent::RecoveryCompleted {
                resumed: report.resumed,
                expired: report.expired,
                orphans: report.orphans,
            }));

        info!(
            resumed = report.resumed,
            expired = report.expired,
            orphans = report.orphans,
            "Recovery pass complete"
        );

        Ok(report)
    }
}
