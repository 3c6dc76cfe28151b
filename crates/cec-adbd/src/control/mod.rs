//! ADB control client.
//!
//! One standby event produces one control session: connect, authenticate,
//! send `input keyevent 26`, close. Sessions are never retried; a failure
//! is reported to the caller and the event is dropped.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Every socket operation is bounded by a timeout
//! - Close errors are logged, never propagated

mod client;
mod session;

pub use client::{send_power_off, AdbControlClient, PowerController};
pub use session::{AdbSession, SessionState};

use adb_protocol::AuthError;
use thiserror::Error;

use crate::credential::CredentialError;

/// Shell instruction sent once the session is authenticated; 26 is the
/// Android power key code.
pub const POWER_OFF_COMMAND: &str = "input keyevent 26";

/// Identity announced in the host `CNXN` banner.
pub const SYSTEM_IDENTITY: &str = "hdmi-cec-to-adb";

/// Errors from a control session.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Key files could not be loaded for this session
    #[error("failed to load ADB credentials: {0}")]
    Credential(#[from] CredentialError),

    /// Key material could not be turned into a signer
    #[error("invalid ADB credentials: {0}")]
    InvalidCredential(#[source] AuthError),

    /// TCP connection refused, unreachable, or timed out
    #[error("failed to connect to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// Device rejected the key or did not finish the handshake in time
    #[error("authentication with {endpoint} failed: {reason}")]
    AuthenticationFailed { endpoint: String, reason: String },

    /// Shell stream could not be opened or was interrupted
    #[error("shell command failed on {endpoint}: {reason}")]
    CommandFailed { endpoint: String, reason: String },

    /// Operation attempted in the wrong session state
    #[error("invalid session state: expected {expected}, found {actual}")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },
}

impl ControlError {
    /// Short label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Credential(_) | Self::InvalidCredential(_) => "credential",
            Self::ConnectionFailed { .. } => "connection_failed",
            Self::AuthenticationFailed { .. } => "authentication_failed",
            Self::CommandFailed { .. } => "command_failed",
            Self::InvalidState { .. } => "invalid_state",
        }
    }
}
