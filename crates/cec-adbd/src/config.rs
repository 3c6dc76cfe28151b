//! Monitor configuration.
//!
//! `MonitorConfig` is built once at startup through [`MonitorConfigBuilder`]
//! and never changes afterwards. Construction validates everything the
//! monitor needs before the bus is armed, including the presence of both
//! key files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::credential::{CredentialError, CredentialStore};

/// Default ADB-over-TCP port.
pub const DEFAULT_ADB_PORT: u16 = 5555;

/// Connect and per-message read/write timeout for control sessions.
pub const TRANSPORT_TIMEOUT: Duration = Duration::from_secs(9);

/// How long to wait for the device after offering the public key.
pub const AUTH_TIMEOUT: Duration = Duration::from_millis(100);

/// Log file used when disk logging is enabled.
pub const DISK_LOG_PATH: &str = "/tmp/hdmi_cec_to_adb.log";

/// Configuration errors; all of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No target device address given
    #[error("TV IP address must be set")]
    MissingAddress,

    /// No private key path given
    #[error("ADB key file path must be set")]
    MissingKeyPath,

    /// Port 0 cannot be connected to
    #[error("ADB port must be non-zero")]
    InvalidPort,

    /// One of the key files is absent or unreadable
    #[error("ADB key must exist for ADB to work: {0}")]
    Credential(#[from] CredentialError),
}

/// Immutable monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    address: String,
    port: u16,
    key_path: PathBuf,
    verbose: bool,
    log_to_disk: bool,
    transport_timeout: Duration,
    auth_timeout: Duration,
}

impl MonitorConfig {
    /// Starts building a configuration.
    pub fn builder() -> MonitorConfigBuilder {
        MonitorConfigBuilder::default()
    }

    /// Target device address (host name or IP).
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Path of the private key; the public key lives at `<key_path>.pub`.
    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn log_to_disk(&self) -> bool {
        self.log_to_disk
    }

    pub fn transport_timeout(&self) -> Duration {
        self.transport_timeout
    }

    pub fn auth_timeout(&self) -> Duration {
        self.auth_timeout
    }

    /// `address:port`, as used for the TCP connection and in logs.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Builder for [`MonitorConfig`].
#[derive(Debug, Clone)]
pub struct MonitorConfigBuilder {
    address: Option<String>,
    port: u16,
    key_path: Option<PathBuf>,
    verbose: bool,
    log_to_disk: bool,
    transport_timeout: Duration,
    auth_timeout: Duration,
}

impl Default for MonitorConfigBuilder {
    fn default() -> Self {
        Self {
            address: None,
            port: DEFAULT_ADB_PORT,
            key_path: None,
            verbose: false,
            log_to_disk: false,
            transport_timeout: TRANSPORT_TIMEOUT,
            auth_timeout: AUTH_TIMEOUT,
        }
    }
}

impl MonitorConfigBuilder {
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn key_path(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(key_path.into());
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn log_to_disk(mut self, log_to_disk: bool) -> Self {
        self.log_to_disk = log_to_disk;
        self
    }

    pub fn transport_timeout(mut self, timeout: Duration) -> Self {
        self.transport_timeout = timeout;
        self
    }

    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// - `ConfigError::MissingAddress` if the address is unset or blank
    /// - `ConfigError::MissingKeyPath` if the key path is unset or empty
    /// - `ConfigError::InvalidPort` if the port is 0
    /// - `ConfigError::Credential` if either key file is missing
    pub fn build(self) -> Result<MonitorConfig, ConfigError> {
        let address = self
            .address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .ok_or(ConfigError::MissingAddress)?;

        let key_path = self
            .key_path
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ConfigError::MissingKeyPath)?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        CredentialStore::verify_present(&key_path)?;

        Ok(MonitorConfig {
            address,
            port: self.port,
            key_path,
            verbose: self.verbose,
            log_to_disk: self.log_to_disk,
            transport_timeout: self.transport_timeout,
            auth_timeout: self.auth_timeout,
        })
    }
}
