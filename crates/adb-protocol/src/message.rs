//! ADB message framing.
//!
//! Wire format:
//! ```text
//! [command:4][arg0:4][arg1:4][data_length:4][data_checksum:4][magic:4][payload:N]
//! ```
//! Total header size: 24 bytes. All integers are little-endian and
//! `magic == command ^ 0xffffffff`.

use std::fmt;

use crate::ProtocolError;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 24;

/// Protocol version announced in `CNXN`.
pub const VERSION: u32 = 0x0100_0000;

/// Maximum payload size announced in `CNXN` and accepted on read.
pub const MAX_PAYLOAD: u32 = 1024 * 1024;

/// ADB command words (ASCII tags read as little-endian u32).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Command {
    Sync = 0x434e_5953,
    Cnxn = 0x4e58_4e43,
    Auth = 0x4854_5541,
    Open = 0x4e45_504f,
    Okay = 0x5941_4b4f,
    Clse = 0x4553_4c43,
    Wrte = 0x4554_5257,
}

impl Command {
    /// Four-letter tag as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "SYNC",
            Self::Cnxn => "CNXN",
            Self::Auth => "AUTH",
            Self::Open => "OPEN",
            Self::Okay => "OKAY",
            Self::Clse => "CLSE",
            Self::Wrte => "WRTE",
        }
    }
}

impl TryFrom<u32> for Command {
    type Error = ProtocolError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0x434e_5953 => Ok(Self::Sync),
            0x4e58_4e43 => Ok(Self::Cnxn),
            0x4854_5541 => Ok(Self::Auth),
            0x4e45_504f => Ok(Self::Open),
            0x5941_4b4f => Ok(Self::Okay),
            0x4553_4c43 => Ok(Self::Clse),
            0x4554_5257 => Ok(Self::Wrte),
            other => Err(ProtocolError::UnknownCommand(other)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `arg0` values of an `AUTH` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AuthType {
    /// Device challenge carrying a random token
    Token = 1,
    /// Host reply carrying the signed token
    Signature = 2,
    /// Host offer of its public key for the user to accept
    RsaPublicKey = 3,
}

impl AuthType {
    pub fn from_arg(arg0: u32) -> Option<Self> {
        match arg0 {
            1 => Some(Self::Token),
            2 => Some(Self::Signature),
            3 => Some(Self::RsaPublicKey),
            _ => None,
        }
    }
}

/// Byte-sum checksum carried in the header.
pub fn checksum(data: &[u8]) -> u32 {
    data.iter()
        .fold(0u32, |acc, byte| acc.wrapping_add(u32::from(*byte)))
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, ProtocolError> {
    bytes
        .get(offset..offset + 4)
        .and_then(|slice| <[u8; 4]>::try_from(slice).ok())
        .map(u32::from_le_bytes)
        .ok_or(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        })
}

/// A decoded message header, before its payload has been read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub command: Command,
    pub arg0: u32,
    pub arg1: u32,
    pub data_length: u32,
    pub data_checksum: u32,
}

impl MessageHeader {
    /// Decodes the first [`HEADER_SIZE`] bytes of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] for short input, an unknown command, a
    /// magic mismatch, or a payload larger than [`MAX_PAYLOAD`].
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ProtocolError::InsufficientData {
                needed: HEADER_SIZE,
                available: bytes.len(),
            });
        }

        let raw_command = read_u32(bytes, 0)?;
        let arg0 = read_u32(bytes, 4)?;
        let arg1 = read_u32(bytes, 8)?;
        let data_length = read_u32(bytes, 12)?;
        let data_checksum = read_u32(bytes, 16)?;
        let magic = read_u32(bytes, 20)?;

        if magic != raw_command ^ 0xffff_ffff {
            return Err(ProtocolError::BadMagic {
                command: raw_command,
                magic,
            });
        }

        let command = Command::try_from(raw_command)?;

        if data_length > MAX_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge {
                len: data_length,
                max: MAX_PAYLOAD,
            });
        }

        Ok(Self {
            command,
            arg0,
            arg1,
            data_length,
            data_checksum,
        })
    }

    /// Payload length as a buffer size.
    pub fn payload_len(&self) -> usize {
        self.data_length as usize
    }
}

/// A complete ADB message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdbMessage {
    pub command: Command,
    pub arg0: u32,
    pub arg1: u32,
    pub payload: Vec<u8>,
}

impl AdbMessage {
    pub fn new(command: Command, arg0: u32, arg1: u32, payload: Vec<u8>) -> Self {
        Self {
            command,
            arg0,
            arg1,
            payload,
        }
    }

    /// Host connection banner: `CNXN(VERSION, MAX_PAYLOAD, "host::<identity>\0")`.
    pub fn connect(system_identity: &str) -> Self {
        Self::new(
            Command::Cnxn,
            VERSION,
            MAX_PAYLOAD,
            nul_terminated(&format!("host::{system_identity}")),
        )
    }

    pub fn auth(auth_type: AuthType, payload: Vec<u8>) -> Self {
        Self::new(Command::Auth, auth_type as u32, 0, payload)
    }

    /// Opens a stream to `destination` (e.g. `shell:ls`).
    pub fn open(local_id: u32, destination: &str) -> Self {
        Self::new(Command::Open, local_id, 0, nul_terminated(destination))
    }

    pub fn okay(local_id: u32, remote_id: u32) -> Self {
        Self::new(Command::Okay, local_id, remote_id, Vec::new())
    }

    pub fn write(local_id: u32, remote_id: u32, data: Vec<u8>) -> Self {
        Self::new(Command::Wrte, local_id, remote_id, data)
    }

    pub fn close(local_id: u32, remote_id: u32) -> Self {
        Self::new(Command::Clse, local_id, remote_id, Vec::new())
    }

    /// Returns the auth type when this is an `AUTH` message.
    pub fn auth_type(&self) -> Option<AuthType> {
        match self.command {
            Command::Auth => AuthType::from_arg(self.arg0),
            _ => None,
        }
    }

    /// Builds the header describing this message.
    pub fn header(&self) -> MessageHeader {
        MessageHeader {
            command: self.command,
            arg0: self.arg0,
            arg1: self.arg1,
            data_length: self.payload.len() as u32,
            data_checksum: checksum(&self.payload),
        }
    }

    /// Encodes header and payload into one buffer.
    pub fn encode(&self) -> Vec<u8> {
        let header = self.header();
        let command = self.command as u32;

        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        buf.extend_from_slice(&command.to_le_bytes());
        buf.extend_from_slice(&header.arg0.to_le_bytes());
        buf.extend_from_slice(&header.arg1.to_le_bytes());
        buf.extend_from_slice(&header.data_length.to_le_bytes());
        buf.extend_from_slice(&header.data_checksum.to_le_bytes());
        buf.extend_from_slice(&(command ^ 0xffff_ffff).to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Joins a decoded header with its payload.
    ///
    /// A zero checksum is accepted as "not computed": newer devices skip it.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] when the payload length or checksum does not
    /// match the header.
    pub fn from_parts(header: MessageHeader, payload: Vec<u8>) -> Result<Self, ProtocolError> {
        if payload.len() != header.payload_len() {
            return Err(ProtocolError::LengthMismatch {
                declared: header.data_length,
                actual: payload.len(),
            });
        }

        let computed = checksum(&payload);
        if header.data_checksum != 0 && header.data_checksum != computed {
            return Err(ProtocolError::ChecksumMismatch {
                declared: header.data_checksum,
                computed,
            });
        }

        Ok(Self::new(header.command, header.arg0, header.arg1, payload))
    }

    /// Decodes one message from the start of `bytes`.
    ///
    /// Returns the message and the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] for malformed or truncated input.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), ProtocolError> {
        let header = MessageHeader::decode(bytes)?;
        let end = HEADER_SIZE + header.payload_len();
        let payload = bytes
            .get(HEADER_SIZE..end)
            .ok_or(ProtocolError::InsufficientData {
                needed: end,
                available: bytes.len(),
            })?
            .to_vec();
        Ok((Self::from_parts(header, payload)?, end))
    }

    /// Payload as text, without the trailing NUL.
    pub fn payload_text(&self) -> String {
        let text = String::from_utf8_lossy(&self.payload);
        text.trim_end_matches('\0').to_string()
    }
}

fn nul_terminated(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len() + 1);
    bytes.extend_from_slice(text.as_bytes());
    bytes.push(0);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_tags() {
        assert_eq!(&(Command::Cnxn as u32).to_le_bytes(), b"CNXN");
        assert_eq!(&(Command::Auth as u32).to_le_bytes(), b"AUTH");
        assert_eq!(&(Command::Open as u32).to_le_bytes(), b"OPEN");
        assert_eq!(&(Command::Okay as u32).to_le_bytes(), b"OKAY");
        assert_eq!(&(Command::Clse as u32).to_le_bytes(), b"CLSE");
        assert_eq!(&(Command::Wrte as u32).to_le_bytes(), b"WRTE");
        assert_eq!(&(Command::Sync as u32).to_le_bytes(), b"SYNC");
    }

    #[test]
    fn test_connect_banner() {
        let msg = AdbMessage::connect("hdmi-cec");
        assert_eq!(msg.command, Command::Cnxn);
        assert_eq!(msg.arg0, VERSION);
        assert_eq!(msg.arg1, MAX_PAYLOAD);
        assert_eq!(msg.payload, b"host::hdmi-cec\0");
        assert_eq!(msg.payload_text(), "host::hdmi-cec");
    }

    #[test]
    fn test_encoded_header_layout() {
        let msg = AdbMessage::open(1, "shell:input keyevent 26");
        let bytes = msg.encode();

        assert_eq!(bytes.len(), HEADER_SIZE + msg.payload.len());
        assert_eq!(&bytes[0..4], b"OPEN");
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &0u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &(msg.payload.len() as u32).to_le_bytes());
        assert_eq!(&bytes[16..20], &checksum(&msg.payload).to_le_bytes());
        assert_eq!(
            &bytes[20..24],
            &((Command::Open as u32) ^ 0xffff_ffff).to_le_bytes()
        );
        assert_eq!(&bytes[24..], b"shell:input keyevent 26\0");
    }

    #[test]
    fn test_decode_encoded_message() {
        let msg = AdbMessage::write(7, 1, b"ok".to_vec());
        let bytes = msg.encode();
        let (decoded, consumed) = AdbMessage::decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[1, 2, 3]), 6);
        assert_eq!(checksum(&[0xff; 4]), 0x3fc);
    }

    #[test]
    fn test_short_header() {
        assert_eq!(
            MessageHeader::decode(&[0u8; 10]),
            Err(ProtocolError::InsufficientData {
                needed: HEADER_SIZE,
                available: 10
            })
        );
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = AdbMessage::okay(1, 2).encode();
        bytes[20] ^= 0x01;
        assert!(matches!(
            MessageHeader::decode(&bytes),
            Err(ProtocolError::BadMagic { .. })
        ));
    }

    #[test]
    fn test_unknown_command() {
        let raw: u32 = 0x1234_5678;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&raw.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 16]);
        bytes.extend_from_slice(&(raw ^ 0xffff_ffff).to_le_bytes());
        assert_eq!(
            MessageHeader::decode(&bytes),
            Err(ProtocolError::UnknownCommand(raw))
        );
    }

    #[test]
    fn test_payload_too_large() {
        let mut bytes = AdbMessage::okay(1, 2).encode();
        bytes[12..16].copy_from_slice(&(MAX_PAYLOAD + 1).to_le_bytes());
        assert!(matches!(
            MessageHeader::decode(&bytes),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_checksum_mismatch() {
        let msg = AdbMessage::write(7, 1, b"abc".to_vec());
        let mut header = msg.header();
        header.data_checksum += 1;
        assert!(matches!(
            AdbMessage::from_parts(header, msg.payload.clone()),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_zero_checksum_accepted() {
        let msg = AdbMessage::write(7, 1, b"abc".to_vec());
        let mut header = msg.header();
        header.data_checksum = 0;
        assert_eq!(AdbMessage::from_parts(header, msg.payload.clone()).unwrap(), msg);
    }

    #[test]
    fn test_truncated_payload() {
        let bytes = AdbMessage::write(7, 1, b"abcdef".to_vec()).encode();
        assert!(matches!(
            AdbMessage::decode(&bytes[..bytes.len() - 2]),
            Err(ProtocolError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_auth_type() {
        let msg = AdbMessage::auth(AuthType::Signature, vec![1, 2]);
        assert_eq!(msg.auth_type(), Some(AuthType::Signature));
        assert_eq!(AdbMessage::okay(1, 2).auth_type(), None);
        assert_eq!(AuthType::from_arg(9), None);
    }
}
