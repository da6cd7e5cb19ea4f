//! Activity journal event types

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use warnet_api::EndReason;
use warnet_util::{CustomerId, SessionRowId};

/// Types of journal events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityEvent {
    /// Daemon started
    DaemonStarted,

    /// Daemon stopped
    DaemonStopped,

    /// A customer logged in and billing began
    SessionStarted {
        customer_id: CustomerId,
        session_id: SessionRowId,
    },

    /// A session terminated
    SessionEnded {
        customer_id: CustomerId,
        /// The row that was closed, when one was found
        session_id: Option<SessionRowId>,
        reason: EndReason,
        /// Seconds left at the instant of termination
        time_remaining: i64,
    },

    /// One unit of balance was converted into usage time
    CreditConverted {
        customer_id: CustomerId,
        amount: i64,
        balance_before: i64,
        balance_after: i64,
        time_before: i64,
        time_after: i64,
    },

    /// Activation refused: no time left and balance below one unit
    ActivationDenied {
        customer_id: CustomerId,
        balance: i64,
        time_remaining: i64,
    },

    /// Boot-time reconciliation finished
    RecoveryCompleted {
        resumed: usize,
        expired: usize,
        orphans: usize,
    },

    /// A session row with no matching customer was force-closed
    OrphanSessionClosed { session_id: SessionRowId },

    /// IPC client connected
    ClientConnected {
        client_id: String,
        role: String,
        uid: Option<u32>,
    },

    /// IPC client disconnected
    ClientDisconnected { client_id: String },
}

/// Full journal entry with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Unique entry ID
    pub id: i64,

    /// Entry timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: ActivityEvent,
}

impl ActivityEntry {
    pub fn new(event: ActivityEvent) -> Self {
        Self {
            id: 0, // Will be set by the store
            timestamp: warnet_util::now(),
            event,
        }
    }
}
