//! Protocol types for warnetd IPC
//!
//! This crate defines the stable API between warnetd and its clients
//! (station terminals and admin consoles):
//! - Commands (requests from clients)
//! - Responses
//! - Events (daemon -> clients, audience-routed)
//! - Shared records (Customer, SessionRecord) and status enums
//! - Versioning

mod commands;
mod events;
mod types;

pub use commands::*;
pub use events::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
