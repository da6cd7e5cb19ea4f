//! Error types for warnetd

use thiserror::Error;

use crate::CustomerId;

/// Core error type for warnetd operations
#[derive(Debug, Error)]
pub enum WarnetError {
    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    /// The customer has no usage time left and not enough balance to
    /// convert. A normal, user-facing outcome rather than a fault.
    #[error("Insufficient time and balance")]
    InsufficientResources,

    #[error("Customer {0} already has an active session")]
    SessionAlreadyActive(CustomerId),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WarnetError {
    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn ipc(msg: impl Into<String>) -> Self {
        Self::IpcError(msg.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, WarnetError>;
