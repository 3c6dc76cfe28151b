//! Error types for ADB framing and authentication.

use thiserror::Error;

/// Errors raised while decoding ADB messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer bytes than a full header
    #[error("insufficient data: need {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// Command word is not one of the known ADB commands
    #[error("unknown command: 0x{0:08x}")]
    UnknownCommand(u32),

    /// Magic field does not match `command ^ 0xffffffff`
    #[error("bad magic 0x{magic:08x} for command 0x{command:08x}")]
    BadMagic { command: u32, magic: u32 },

    /// Declared payload larger than the negotiated maximum
    #[error("payload of {len} bytes exceeds maximum of {max}")]
    PayloadTooLarge { len: u32, max: u32 },

    /// Payload length does not match the header
    #[error("payload length mismatch: header says {declared}, got {actual}")]
    LengthMismatch { declared: u32, actual: usize },

    /// Payload checksum does not match the header
    #[error("checksum mismatch: header says {declared}, computed {computed}")]
    ChecksumMismatch { declared: u32, computed: u32 },
}

/// Errors raised while preparing or using the signing key.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Private key text is neither PKCS#8 nor PKCS#1 PEM
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    /// Device sent a token of the wrong size
    #[error("invalid auth token length {len} (expected {expected})")]
    InvalidToken { len: usize, expected: usize },

    /// RSA signing failed
    #[error("signing failed: {0}")]
    Signing(#[from] rsa::Error),
}
