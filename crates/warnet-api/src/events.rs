//! Event types for warnetd -> client streaming
//!
//! Event names and field casing are carried over from the legacy wire
//! protocol so existing station and console clients keep working.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use warnet_util::CustomerId;

use crate::{CustomerStatus, API_VERSION};

/// Which clients an event is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Connections attached to this customer.
    Customer(CustomerId),
    /// The administrator broadcast group.
    Admins,
    /// Every connected client.
    All,
}

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: warnet_util::now(),
            payload,
        }
    }
}

/// All possible events from the daemon to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    /// Live counter push to the session's own station.
    #[serde(rename = "session:update")]
    SessionUpdate { time_remaining: i64, balance: i64 },

    /// A customer went active or inactive.
    #[serde(rename = "customer:status-changed")]
    CustomerStatusChanged {
        customer_id: CustomerId,
        status: CustomerStatus,
    },

    /// A customer logged in.
    #[serde(rename = "admin:login-notification", rename_all = "camelCase")]
    LoginNotification {
        customer_id: CustomerId,
        customer_name: String,
        time: DateTime<Local>,
    },

    /// A customer logged out (name is best-effort; the row read may
    /// race a deletion on the administrative side).
    #[serde(rename = "admin:logout-notification", rename_all = "camelCase")]
    LogoutNotification {
        customer_id: CustomerId,
        customer_name: String,
        time: DateTime<Local>,
    },

    /// Daemon is shutting down.
    #[serde(rename = "shutdown")]
    Shutdown,
}
