use std::io;
use std::sync::Arc;

use adb_protocol::AuthSigner;
use async_trait::async_trait;
use tracing::{debug, info};

use super::{AdbSession, ControlError, POWER_OFF_COMMAND};
use crate::config::MonitorConfig;
use crate::credential::{Credential, CredentialError, CredentialStore};

/// Something that can put the target device to sleep.
///
/// The listener depends on this trait rather than on the ADB client so
/// tests can count calls without a network.
#[async_trait]
pub trait PowerController: Send + Sync {
    /// Sends the power-off instruction. Returns the device's shell output.
    async fn power_off(&self) -> Result<String, ControlError>;
}

/// Control client that opens a fresh ADB session for every request.
#[derive(Debug, Clone)]
pub struct AdbControlClient {
    config: Arc<MonitorConfig>,
}

impl AdbControlClient {
    pub fn new(config: Arc<MonitorConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }
}

#[async_trait]
impl PowerController for AdbControlClient {
    async fn power_off(&self) -> Result<String, ControlError> {
        let key_path = self.config.key_path().to_path_buf();
        let credential = tokio::task::spawn_blocking(move || CredentialStore::load(&key_path))
            .await
            .map_err(|e| CredentialError::Unreadable {
                path: self.config.key_path().to_path_buf(),
                source: io::Error::new(io::ErrorKind::Other, e),
            })??;

        send_power_off(&self.config, credential).await
    }
}

/// Runs one complete control session: connect, authenticate, send the
/// power keypress, close.
///
/// The session is closed on every path, including failures, and the
/// credential is dropped when this returns.
///
/// # Errors
///
/// Returns the first `ControlError` hit by any phase.
pub async fn send_power_off(
    config: &MonitorConfig,
    credential: Credential,
) -> Result<String, ControlError> {
    let signer = AuthSigner::from_pem(credential.private_key(), credential.public_key())
        .map_err(ControlError::InvalidCredential)?;
    drop(credential);

    let mut session = AdbSession::new(config.transport_timeout(), config.auth_timeout());

    let result = async {
        session.connect(config.address(), config.port()).await?;
        session.authenticate(&signer).await?;
        debug!(
            endpoint = %config.endpoint(),
            command = POWER_OFF_COMMAND,
            "Sending shell command"
        );
        session.shell(POWER_OFF_COMMAND).await
    }
    .await;

    session.close().await;

    if let Ok(response) = &result {
        info!(
            endpoint = %config.endpoint(),
            response = %response.trim(),
            "Power-off command delivered"
        );
    }

    result
}
