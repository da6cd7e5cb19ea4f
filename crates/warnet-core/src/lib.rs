//! Core billing and session-lifecycle engine for warnetd
//!
//! This crate is the heart of warnetd, containing:
//! - The billing policy (balance-to-time conversion, expiry decisions)
//! - The in-memory session registry (the only place time counts down)
//! - Session lifecycle orchestration (login, logout, expiry)
//! - Boot-time recovery of sessions left open by an unclean shutdown
//! - The `Notifier` seam to the real-time transport

pub mod billing;
mod engine;
mod notifier;
mod recovery;
mod registry;

pub use engine::*;
pub use notifier::*;
pub use recovery::*;
pub use registry::*;
