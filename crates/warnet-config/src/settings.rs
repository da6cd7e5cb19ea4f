//! Validated settings ready for use by the daemon and engine

use crate::schema::{RawBillingConfig, RawConfig, RawDaemonConfig, RawSessionConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Validated settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub daemon: DaemonSettings,
    pub billing: BillingSettings,
    pub session: SessionSettings,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            daemon: DaemonSettings::from_raw(raw.daemon),
            billing: BillingSettings::from_raw(raw.billing),
            session: SessionSettings::from_raw(raw.session),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            daemon: DaemonSettings::default(),
            billing: BillingSettings::default(),
            session: SessionSettings::default(),
        }
    }
}

/// Daemon paths
#[derive(Debug, Clone)]
pub struct DaemonSettings {
    pub socket_path: PathBuf,
    pub data_dir: PathBuf,
}

impl DaemonSettings {
    fn from_raw(raw: RawDaemonConfig) -> Self {
        Self {
            socket_path: raw
                .socket_path
                .unwrap_or_else(warnet_util::socket_path_without_env),
            data_dir: raw.data_dir.unwrap_or_else(warnet_util::data_dir_without_env),
        }
    }
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            socket_path: warnet_util::socket_path_without_env(),
            data_dir: warnet_util::data_dir_without_env(),
        }
    }
}

/// The conversion rule: `rate` currency units buy `seconds_per_unit`
/// seconds of usage time. Configuration, not hard-coded business law.
#[derive(Debug, Clone, Copy)]
pub struct BillingSettings {
    pub rate: i64,
    pub seconds_per_unit: i64,
}

impl BillingSettings {
    pub const DEFAULT_RATE: i64 = 10_000;
    pub const DEFAULT_SECONDS_PER_UNIT: i64 = 3_600;

    fn from_raw(raw: RawBillingConfig) -> Self {
        Self {
            rate: raw.rate.unwrap_or(Self::DEFAULT_RATE),
            seconds_per_unit: raw
                .seconds_per_unit
                .unwrap_or(Self::DEFAULT_SECONDS_PER_UNIT),
        }
    }
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            rate: Self::DEFAULT_RATE,
            seconds_per_unit: Self::DEFAULT_SECONDS_PER_UNIT,
        }
    }
}

/// Countdown cadence
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub tick_interval: Duration,
    pub broadcast_interval_seconds: i64,
}

impl SessionSettings {
    fn from_raw(raw: RawSessionConfig) -> Self {
        Self {
            tick_interval: Duration::from_millis(raw.tick_interval_ms.unwrap_or(1000)),
            broadcast_interval_seconds: raw.broadcast_interval_seconds.unwrap_or(10),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1000),
            broadcast_interval_seconds: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.billing.rate, 10_000);
        assert_eq!(settings.billing.seconds_per_unit, 3_600);
        assert_eq!(settings.session.tick_interval, Duration::from_millis(1000));
        assert_eq!(settings.session.broadcast_interval_seconds, 10);
    }
}
