//! CEC Core - Bus domain types for the HDMI-CEC monitor
//!
//! This crate provides the types shared between bus drivers and the
//! standby listener: logical addresses, opcodes, decoded frames, and the
//! parser for `cec-client` traffic lines.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod address;
pub mod error;
pub mod event;
pub mod opcode;
pub mod traffic;

// Re-exports for convenience
pub use address::LogicalAddress;
pub use error::{FrameError, FrameResult};
pub use event::{BusEvent, MAX_FRAME_LEN};
pub use opcode::Opcode;
pub use traffic::parse_traffic_line;
