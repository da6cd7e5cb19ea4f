//! Billing policy: pure decisions, no I/O
//!
//! The conversion rule is one unit at a time: a conversion deducts
//! exactly `rate` from the balance and credits exactly
//! `seconds_per_unit` seconds, even when the balance could afford
//! several units. This bounds the size of any single journal entry and
//! keeps client-visible increments predictable.

pub use warnet_config::BillingSettings;

/// Outcome of the activation check at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    /// May a session start at all?
    pub allow: bool,
    /// Must one conversion run before the countdown can begin?
    pub convert: bool,
}

/// Decide whether a customer may start a session.
///
/// Allowed when usage time remains, or when the balance covers at least
/// one conversion unit.
pub fn should_activate(balance: i64, time_remaining: i64, billing: &BillingSettings) -> Activation {
    if time_remaining > 0 {
        Activation {
            allow: true,
            convert: false,
        }
    } else if balance >= billing.rate {
        Activation {
            allow: true,
            convert: true,
        }
    } else {
        Activation {
            allow: false,
            convert: false,
        }
    }
}

/// Result of a single conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conversion {
    pub balance: i64,
    pub time_remaining: i64,
    /// Currency units deducted (always the configured rate).
    pub amount: i64,
}

/// Convert exactly one unit of balance into usage time.
///
/// Returns `None` when the balance cannot cover the rate; a conversion
/// never runs partially.
pub fn convert_once(
    balance: i64,
    time_remaining: i64,
    billing: &BillingSettings,
) -> Option<Conversion> {
    if balance < billing.rate {
        return None;
    }

    Some(Conversion {
        balance: balance - billing.rate,
        time_remaining: time_remaining + billing.seconds_per_unit,
        amount: billing.rate,
    })
}

/// What to do when a session's counter reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryDecision {
    /// Balance covers another unit: convert and keep the session alive.
    Convert,
    /// Out of funds: terminate the session.
    Terminate,
}

/// Decide the expiry outcome from the authoritative stored balance.
pub fn on_expiry(balance: i64, billing: &BillingSettings) -> ExpiryDecision {
    if balance >= billing.rate {
        ExpiryDecision::Convert
    } else {
        ExpiryDecision::Terminate
    }
}
