//! Configuration validation

use crate::schema::RawConfig;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("billing.rate must be positive, got {0}")]
    NonPositiveRate(i64),

    #[error("billing.seconds_per_unit must be positive, got {0}")]
    NonPositiveSecondsPerUnit(i64),

    #[error("session.tick_interval_ms must be positive")]
    ZeroTickInterval,

    #[error("session.broadcast_interval_seconds must be positive, got {0}")]
    NonPositiveBroadcastInterval(i64),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(rate) = config.billing.rate {
        if rate <= 0 {
            errors.push(ValidationError::NonPositiveRate(rate));
        }
    }

    if let Some(secs) = config.billing.seconds_per_unit {
        if secs <= 0 {
            errors.push(ValidationError::NonPositiveSecondsPerUnit(secs));
        }
    }

    if config.session.tick_interval_ms == Some(0) {
        errors.push(ValidationError::ZeroTickInterval);
    }

    if let Some(interval) = config.session.broadcast_interval_seconds {
        if interval <= 0 {
            errors.push(ValidationError::NonPositiveBroadcastInterval(interval));
        }
    }

    errors
}
