//! Store trait definitions

use chrono::{DateTime, Local};
use warnet_api::{Customer, CustomerStatus, SessionRecord, SessionStatus};
use warnet_util::{CustomerId, SessionRowId};

use crate::{ActivityEntry, StoreResult};

/// Main store trait.
///
/// The engine owns `balance`, `time_remaining` and `status` on the
/// customer row and the whole sessions table; everything else on the
/// customer belongs to the administrative side of the platform, which
/// shares this store.
pub trait Store: Send + Sync {
    // Customers

    /// Create a customer. The seam used by the administrative CRUD
    /// handlers (and tests); new customers start inactive.
    fn insert_customer(
        &self,
        name: &str,
        balance: i64,
        time_remaining: i64,
    ) -> StoreResult<CustomerId>;

    /// Fetch a customer by id
    fn get_customer(&self, id: CustomerId) -> StoreResult<Option<Customer>>;

    /// Persist both counters at once (used after a conversion)
    fn update_customer_funds(
        &self,
        id: CustomerId,
        balance: i64,
        time_remaining: i64,
    ) -> StoreResult<()>;

    /// Persist the time counter alone (final sync at session end,
    /// recovery reconciliation)
    fn update_time_remaining(&self, id: CustomerId, time_remaining: i64) -> StoreResult<()>;

    /// Persist the balance alone (top-ups)
    fn update_balance(&self, id: CustomerId, balance: i64) -> StoreResult<()>;

    /// Mark a customer active or inactive
    fn set_customer_status(&self, id: CustomerId, status: CustomerStatus) -> StoreResult<()>;

    // Sessions

    /// Open a new session row (`status = active`, no end time)
    fn create_session(
        &self,
        customer_id: CustomerId,
        start_time: DateTime<Local>,
    ) -> StoreResult<SessionRowId>;

    /// Close the most recent active session row for a customer.
    /// Returns the closed row id, or `None` when no open row exists.
    fn close_latest_active_session(
        &self,
        customer_id: CustomerId,
        end_time: DateTime<Local>,
        status: SessionStatus,
    ) -> StoreResult<Option<SessionRowId>>;

    /// Close a specific session row
    fn close_session(
        &self,
        id: SessionRowId,
        end_time: DateTime<Local>,
        status: SessionStatus,
    ) -> StoreResult<()>;

    /// Fetch a session row by id
    fn get_session(&self, id: SessionRowId) -> StoreResult<Option<SessionRecord>>;

    /// All session rows still marked active, joined with their customer.
    /// A missing customer surfaces as `None` (orphan row).
    fn active_sessions(&self) -> StoreResult<Vec<ActiveSessionRow>>;

    // Activity journal

    /// Append a journal entry
    fn append_activity(&self, entry: ActivityEntry) -> StoreResult<()>;

    /// Get recent journal entries, newest first
    fn recent_activity(&self, limit: usize) -> StoreResult<Vec<ActivityEntry>>;

    // Health

    /// Check if the store is healthy
    fn is_healthy(&self) -> bool;
}

/// One row of the recovery query: an open session and (when it still
/// exists) the customer it belongs to.
#[derive(Debug, Clone)]
pub struct ActiveSessionRow {
    pub session: SessionRecord,
    pub customer: Option<Customer>,
}
