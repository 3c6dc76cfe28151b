//! One ADB connection and its state machine.
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──authenticate──▶ Authenticating ──▶ Connected
//!                               │                              │               │
//!                               └──────────▶ Error ◀───────────┘               │
//!                                              │                               │
//!                                              └────────close────▶ Closed ◀────┘
//! ```

use std::fmt;
use std::io;
use std::time::Duration;

use adb_protocol::{
    AdbMessage, AuthError, AuthSigner, AuthType, Command, MessageHeader, ProtocolError,
    HEADER_SIZE,
};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use super::{ControlError, SYSTEM_IDENTITY};

/// Stream id used for the single shell stream of a session.
const LOCAL_ID: u32 = 1;

/// Lifecycle state of an [`AdbSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticating,
    Connected,
    Closed,
    Error,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Connected => "connected",
            Self::Closed => "closed",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// Low-level failures inside a session phase.
///
/// Each phase folds these into the matching `ControlError` variant.
#[derive(Debug, Error)]
enum TransportError {
    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("connection closed by device")]
    Eof,

    #[error("not connected")]
    NotConnected,

    #[error("{0}")]
    Io(io::Error),

    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("unexpected {command} message (arg0={arg0})")]
    Unexpected { command: Command, arg0: u32 },

    #[error("device refused to open the shell stream")]
    StreamRefused,
}

impl From<io::Error> for TransportError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::UnexpectedEof => Self::Eof,
            _ => Self::Io(error),
        }
    }
}

fn unexpected(message: &AdbMessage) -> TransportError {
    TransportError::Unexpected {
        command: message.command,
        arg0: message.arg0,
    }
}

fn expect_token(message: &AdbMessage) -> Result<&[u8], TransportError> {
    match message.auth_type() {
        Some(AuthType::Token) => Ok(&message.payload),
        _ => Err(unexpected(message)),
    }
}

/// A single ADB-over-TCP session.
///
/// Owned by one control-client invocation. [`AdbSession::close`] shuts the
/// socket down at most once, however many times it is called.
pub struct AdbSession {
    endpoint: String,
    stream: Option<TcpStream>,
    state: SessionState,
    transport_timeout: Duration,
    auth_timeout: Duration,
    banner: Option<String>,
}

impl AdbSession {
    /// Creates a disconnected session.
    pub fn new(transport_timeout: Duration, auth_timeout: Duration) -> Self {
        Self {
            endpoint: String::new(),
            stream: None,
            state: SessionState::Disconnected,
            transport_timeout,
            auth_timeout,
            banner: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The device's `CNXN` banner, once authenticated.
    pub fn device_banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    fn expect_state(&self, expected: SessionState) -> Result<(), ControlError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ControlError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    /// Opens the TCP connection.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ConnectionFailed` if the connection is refused,
    /// unreachable, or does not complete within the transport timeout.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<(), ControlError> {
        self.expect_state(SessionState::Disconnected)?;
        self.endpoint = format!("{host}:{port}");
        self.state = SessionState::Connecting;

        debug!(endpoint = %self.endpoint, "Connecting to ADB device");

        let reason = match timeout(self.transport_timeout, TcpStream::connect((host, port))).await
        {
            Ok(Ok(stream)) => {
                let _ = stream.set_nodelay(true);
                self.stream = Some(stream);
                return Ok(());
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {:?}", self.transport_timeout),
        };

        self.state = SessionState::Error;
        Err(ControlError::ConnectionFailed {
            endpoint: self.endpoint.clone(),
            reason,
        })
    }

    /// Runs the `CNXN`/`AUTH` handshake.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::AuthenticationFailed` if the device rejects the
    /// key, misbehaves, or does not answer in time.
    pub async fn authenticate(&mut self, signer: &AuthSigner) -> Result<(), ControlError> {
        self.expect_state(SessionState::Connecting)?;
        self.state = SessionState::Authenticating;

        match self.handshake(signer).await {
            Ok(banner) => {
                debug!(endpoint = %self.endpoint, banner = %banner, "ADB session authenticated");
                self.banner = Some(banner);
                self.state = SessionState::Connected;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Error;
                Err(ControlError::AuthenticationFailed {
                    endpoint: self.endpoint.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn handshake(&mut self, signer: &AuthSigner) -> Result<String, TransportError> {
        self.send(AdbMessage::connect(SYSTEM_IDENTITY)).await?;

        let reply = self.receive(self.transport_timeout).await?;
        if reply.command == Command::Cnxn {
            // Device has authentication disabled
            return Ok(reply.payload_text());
        }

        let signature = signer.sign(expect_token(&reply)?)?;
        self.send(AdbMessage::auth(AuthType::Signature, signature))
            .await?;

        let reply = self.receive(self.transport_timeout).await?;
        if reply.command == Command::Cnxn {
            return Ok(reply.payload_text());
        }
        expect_token(&reply)?;

        debug!(endpoint = %self.endpoint, "Signature rejected, offering public key");
        self.send(AdbMessage::auth(
            AuthType::RsaPublicKey,
            signer.public_key_payload(),
        ))
        .await?;

        let reply = self.receive(self.auth_timeout).await?;
        match reply.command {
            Command::Cnxn => Ok(reply.payload_text()),
            _ => Err(unexpected(&reply)),
        }
    }

    /// Runs one shell instruction and returns its output.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::CommandFailed` if the stream cannot be opened or
    /// breaks before the device closes it.
    pub async fn shell(&mut self, command: &str) -> Result<String, ControlError> {
        self.expect_state(SessionState::Connected)?;

        self.run_shell(command)
            .await
            .map_err(|e| ControlError::CommandFailed {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            })
    }

    async fn run_shell(&mut self, command: &str) -> Result<String, TransportError> {
        self.send(AdbMessage::open(LOCAL_ID, &format!("shell:{command}")))
            .await?;

        let mut remote_id = None;
        let mut output = Vec::new();

        loop {
            let message = self.receive(self.transport_timeout).await?;
            match message.command {
                Command::Okay => {
                    remote_id = Some(message.arg0);
                }
                Command::Wrte => {
                    output.extend_from_slice(&message.payload);
                    remote_id = Some(message.arg0);
                    self.send(AdbMessage::okay(LOCAL_ID, message.arg0)).await?;
                }
                Command::Clse => {
                    let Some(remote) = remote_id else {
                        return Err(TransportError::StreamRefused);
                    };
                    if let Err(e) = self.send(AdbMessage::close(LOCAL_ID, remote)).await {
                        debug!(endpoint = %self.endpoint, error = %e, "Failed to acknowledge stream close");
                    }
                    break;
                }
                _ => return Err(unexpected(&message)),
            }
        }

        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    /// Shuts the connection down.
    ///
    /// Never fails: shutdown errors are logged. Safe to call in any state.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                warn!(endpoint = %self.endpoint, error = %e, "Error while closing ADB connection");
            }
            debug!(endpoint = %self.endpoint, "ADB connection closed");
        }
        self.state = SessionState::Closed;
    }

    async fn send(&mut self, message: AdbMessage) -> Result<(), TransportError> {
        let wait = self.transport_timeout;
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;

        trace!(
            command = %message.command,
            arg0 = message.arg0,
            arg1 = message.arg1,
            len = message.payload.len(),
            "ADB send"
        );

        let bytes = message.encode();
        timeout(wait, stream.write_all(&bytes))
            .await
            .map_err(|_| TransportError::TimedOut(wait))??;
        Ok(())
    }

    async fn receive(&mut self, wait: Duration) -> Result<AdbMessage, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;

        let read = async {
            let mut header = [0u8; HEADER_SIZE];
            stream.read_exact(&mut header).await?;
            let header = MessageHeader::decode(&header)?;

            let mut payload = vec![0u8; header.payload_len()];
            stream.read_exact(&mut payload).await?;
            Ok::<_, TransportError>(AdbMessage::from_parts(header, payload)?)
        };

        let message = timeout(wait, read)
            .await
            .map_err(|_| TransportError::TimedOut(wait))??;

        trace!(
            command = %message.command,
            arg0 = message.arg0,
            arg1 = message.arg1,
            len = message.payload.len(),
            "ADB receive"
        );

        Ok(message)
    }
}
