//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Daemon-level settings
    #[serde(default)]
    pub daemon: RawDaemonConfig,

    /// Billing rule settings
    #[serde(default)]
    pub billing: RawBillingConfig,

    /// Session tick/broadcast cadence
    #[serde(default)]
    pub session: RawSessionConfig,
}

/// Daemon-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDaemonConfig {
    /// IPC socket path
    pub socket_path: Option<PathBuf>,

    /// Data directory for the store
    pub data_dir: Option<PathBuf>,
}

/// Billing rule settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawBillingConfig {
    /// Currency units deducted per conversion (default 10000)
    pub rate: Option<i64>,

    /// Seconds credited per conversion (default 3600)
    pub seconds_per_unit: Option<i64>,
}

/// Session cadence settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSessionConfig {
    /// Countdown tick interval in milliseconds (default 1000)
    pub tick_interval_ms: Option<u64>,

    /// Push a counter update every N seconds of countdown (default 10)
    pub broadcast_interval_seconds: Option<i64>,
}
