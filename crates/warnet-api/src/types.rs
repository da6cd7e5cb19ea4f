//! Shared types for the warnetd API

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use warnet_util::{CustomerId, SessionRowId};

/// Whether a customer currently occupies a session.
///
/// `Active` implies exactly one live entry in the session registry;
/// the lifecycle transitions keep the two in step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    Active,
    Inactive,
}

/// Lifecycle state of a durable session row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Open: the customer is (or was, at crash time) logged in.
    Active,
    /// Closed because usage time ran out naturally.
    Completed,
    /// Closed for any other reason (logout, kick, crash recovery).
    Cancelled,
}

/// Why a session terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    UserLogout,
    AutoExpired,
    AdminKick,
    Unknown,
}

impl EndReason {
    /// The session-row status a termination reason maps to.
    pub fn session_status(&self) -> SessionStatus {
        match self {
            EndReason::AutoExpired => SessionStatus::Completed,
            _ => SessionStatus::Cancelled,
        }
    }
}

/// Durable customer record, restricted to the fields this engine reads
/// and writes. Credential material never crosses this boundary; the
/// authentication gate resolves identity upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    /// Monetary balance in the smallest currency unit. Never negative.
    pub balance: i64,
    /// Purchased usage time in seconds. Never negative.
    pub time_remaining: i64,
    pub status: CustomerStatus,
}

/// Durable session row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionRowId,
    pub customer_id: CustomerId,
    pub start_time: DateTime<Local>,
    /// Set exactly once, at termination.
    pub end_time: Option<DateTime<Local>>,
    pub status: SessionStatus,
}

/// Live view of one active session for state snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub balance: i64,
    pub time_remaining: i64,
    pub started_at: DateTime<Local>,
}

/// Full engine state snapshot for admin consoles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStateSnapshot {
    pub api_version: u32,
    pub active_count: usize,
    pub sessions: Vec<SessionInfo>,
}

/// Role for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// A customer terminal: starts/ends its own session.
    Station,
    /// Operator console: can kick sessions and push top-ups.
    Admin,
    /// Read-only observer.
    Observer,
}

impl ClientRole {
    pub fn can_start_session(&self) -> bool {
        matches!(self, ClientRole::Station | ClientRole::Admin)
    }

    pub fn can_end_session(&self) -> bool {
        matches!(self, ClientRole::Station | ClientRole::Admin)
    }

    pub fn can_kick(&self) -> bool {
        matches!(self, ClientRole::Admin)
    }

    pub fn can_update_balance(&self) -> bool {
        matches!(self, ClientRole::Admin)
    }

    pub fn receives_admin_events(&self) -> bool {
        matches!(self, ClientRole::Admin | ClientRole::Observer)
    }
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub ready: bool,
    pub store_ok: bool,
}
