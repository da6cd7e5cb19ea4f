//! Command types for the warnetd protocol

use serde::{Deserialize, Serialize};
use warnet_util::{ClientId, CustomerId, SessionRowId};

use crate::{EndReason, API_VERSION};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// The command
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Response payload or error
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    CustomerNotFound,
    /// No usage time left and balance below one conversion unit.
    InsufficientResources,
    SessionAlreadyActive,
    PermissionDenied,
    RateLimited,
    StoreError,
    InternalError,
}

/// All possible commands from clients.
///
/// Session start/end requests arrive from the authentication gate: the
/// customer named here has already been authenticated upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Begin billing for an authenticated customer.
    StartSession { customer_id: CustomerId },

    /// Terminate a customer's session. Stations omit the reason
    /// (defaults to user logout); consoles may pass `admin_kick`.
    EndSession {
        customer_id: CustomerId,
        #[serde(default)]
        reason: Option<EndReason>,
    },

    /// A top-up reached an online customer through the administrative
    /// side; sync the live snapshot to the new stored balance.
    UpdateBalance {
        customer_id: CustomerId,
        new_balance: i64,
    },

    /// Bind this connection to a customer's event channel.
    AttachCustomer { customer_id: CustomerId },

    /// Get current engine state
    GetState,

    /// Subscribe to the admin event stream
    SubscribeEvents,

    /// Unsubscribe from events
    UnsubscribeEvents,

    /// Get health status
    GetHealth,

    /// Ping for keepalive
    Ping,
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    SessionStarted {
        session_id: SessionRowId,
        balance: i64,
        time_remaining: i64,
        /// Whether one balance-to-time conversion ran during activation.
        converted: bool,
    },
    SessionEnded,
    BalanceUpdated {
        customer_id: CustomerId,
        balance: i64,
    },
    Attached {
        customer_id: CustomerId,
    },
    State(crate::EngineStateSnapshot),
    Subscribed {
        client_id: ClientId,
    },
    Unsubscribed,
    Health(crate::HealthStatus),
    Pong,
}

/// Client connection info (set by the IPC layer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: ClientId,
    pub role: crate::ClientRole,
    /// Unix UID if available
    pub uid: Option<u32>,
}

impl ClientInfo {
    pub fn new(role: crate::ClientRole) -> Self {
        Self {
            client_id: ClientId::new(),
            role,
            uid: None,
        }
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization() {
        let req = Request::new(1, Command::StartSession {
            customer_id: CustomerId::new(3),
        });
        let json = serde_json::to_string(&req).unwrap();
        let parsed: Request = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.request_id, 1);
        assert!(matches!(
            parsed.command,
            Command::StartSession { customer_id } if customer_id == CustomerId::new(3)
        ));
    }

    #[test]
    fn end_session_reason_is_optional() {
        let json = r#"{"type":"end_session","customer_id":9,"reason":null}"#;
        let command: Command = serde_json::from_str(json).unwrap();
        assert!(matches!(
            command,
            Command::EndSession { reason: None, .. }
        ));
    }

    #[test]
    fn response_serialization() {
        let resp = Response::success(
            7,
            ResponsePayload::SessionStarted {
                session_id: SessionRowId::new(12),
                balance: 0,
                time_remaining: 3600,
                converted: true,
            },
        );

        let json = serde_json::to_string(&resp).unwrap();
        let parsed: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.request_id, 7);
    }
}
