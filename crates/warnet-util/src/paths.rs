//! Default paths for warnetd components
//!
//! User-writable defaults (no root required):
//! - Socket: `$XDG_RUNTIME_DIR/warnetd/warnetd.sock` or `/tmp/warnetd-$USER/warnetd.sock`
//! - Config: `$XDG_CONFIG_HOME/warnet/config.toml` or `~/.config/warnet/config.toml`
//! - Data: `$XDG_DATA_HOME/warnetd` or `~/.local/share/warnetd`

use std::path::PathBuf;

/// Environment variable for overriding the socket path
pub const WARNET_SOCKET_ENV: &str = "WARNET_SOCKET";

/// Environment variable for overriding the data directory
pub const WARNET_DATA_DIR_ENV: &str = "WARNET_DATA_DIR";

const SOCKET_FILENAME: &str = "warnetd.sock";
const APP_DIR: &str = "warnetd";

/// Default socket path: `$WARNET_SOCKET`, else the XDG runtime dir, else /tmp.
pub fn default_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var(WARNET_SOCKET_ENV) {
        return PathBuf::from(path);
    }

    socket_path_without_env()
}

/// Socket path without checking the env var (for config defaults where
/// the override is applied separately).
pub fn socket_path_without_env() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username)).join(SOCKET_FILENAME)
}

/// Default config file path: `$XDG_CONFIG_HOME/warnet/config.toml` or
/// `~/.config/warnet/config.toml`.
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join("warnet").join("config.toml");
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("warnet")
            .join("config.toml");
    }

    PathBuf::from("/etc/warnet/config.toml")
}

/// Default data directory: `$WARNET_DATA_DIR`, else XDG data home, else
/// `~/.local/share/warnetd`.
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(WARNET_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Data directory without checking the env var.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    PathBuf::from("/tmp").join(APP_DIR).join("data")
}
