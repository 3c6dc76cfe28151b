//! Frame decoding errors following panic-free policy.

use thiserror::Error;

use crate::LogicalAddress;

/// Errors that can occur while decoding a bus frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Frame contained no bytes at all
    #[error("Empty CEC frame")]
    Empty,

    /// Header-only frame used by devices to poll for an address
    #[error("Polling frame {initiator} -> {destination} carries no opcode")]
    Poll {
        initiator: LogicalAddress,
        destination: LogicalAddress,
    },

    /// Frame longer than the bus allows
    #[error("CEC frame of {len} bytes exceeds the {max} byte limit")]
    TooLong { len: usize, max: usize },

    /// A byte in a traffic line could not be parsed as hex
    #[error("Invalid frame byte '{token}'")]
    InvalidByte { token: String },
}

/// Result type for frame decoding.
pub type FrameResult<T> = Result<T, FrameError>;
