//! ADB Protocol - Wire messages for the Android Debug Bridge over TCP
//!
//! This crate provides the 24-byte message framing used between an ADB host
//! and a device, plus RSA token signing for the authentication handshake.
//! It performs no I/O; the monitor's control client drives the socket.

pub mod auth;
pub mod error;
pub mod message;

pub use auth::{AuthSigner, TOKEN_SIZE};
pub use error::{AuthError, ProtocolError};
pub use message::{
    checksum, AdbMessage, AuthType, Command, MessageHeader, HEADER_SIZE, MAX_PAYLOAD, VERSION,
};
