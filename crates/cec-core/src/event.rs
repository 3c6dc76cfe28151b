//! Decoded bus frames.

use std::fmt;

use crate::{FrameError, FrameResult, LogicalAddress, Opcode};

/// Maximum number of bytes in a CEC frame (header + opcode + 14 operands).
pub const MAX_FRAME_LEN: usize = 16;

/// A decoded CEC frame as delivered by a bus driver.
///
/// Events are produced on the driver thread and consumed read-only by the
/// listener; nothing keeps them after dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusEvent {
    opcode: Opcode,
    source: LogicalAddress,
    destination: LogicalAddress,
    payload: Vec<u8>,
}

impl BusEvent {
    /// Creates an event from already decoded parts.
    pub fn new(
        opcode: impl Into<Opcode>,
        source: impl Into<LogicalAddress>,
        destination: impl Into<LogicalAddress>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            opcode: opcode.into(),
            source: source.into(),
            destination: destination.into(),
            payload,
        }
    }

    /// Decodes a raw frame: `[header, opcode, operands...]`.
    ///
    /// # Errors
    ///
    /// - `FrameError::Empty` for a zero-length frame
    /// - `FrameError::Poll` for a header-only polling frame
    /// - `FrameError::TooLong` when the frame exceeds [`MAX_FRAME_LEN`]
    pub fn from_frame(frame: &[u8]) -> FrameResult<Self> {
        if frame.len() > MAX_FRAME_LEN {
            return Err(FrameError::TooLong {
                len: frame.len(),
                max: MAX_FRAME_LEN,
            });
        }

        let (header, rest) = frame.split_first().ok_or(FrameError::Empty)?;
        let (source, destination) = LogicalAddress::from_header(*header);

        let (opcode, operands) = rest
            .split_first()
            .ok_or(FrameError::Poll {
                initiator: source,
                destination,
            })?;

        Ok(Self {
            opcode: Opcode::new(*opcode),
            source,
            destination,
            payload: operands.to_vec(),
        })
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn source(&self) -> LogicalAddress {
        self.source
    }

    pub fn destination(&self) -> LogicalAddress {
        self.destination
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns true for a global power-down announcement.
    ///
    /// A standby addressed to a single device is a point-to-point request
    /// and does not qualify.
    pub fn is_standby_broadcast(&self) -> bool {
        self.opcode == Opcode::STANDBY && self.destination.is_broadcast()
    }
}

impl fmt::Display for BusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}: {}", self.source, self.destination, self.opcode)?;
        for byte in &self.payload {
            write!(f, " {byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_standby_broadcast() {
        let event = BusEvent::from_frame(&[0x4F, 0x36]).unwrap();
        assert_eq!(event.source(), LogicalAddress::PLAYBACK_1);
        assert_eq!(event.destination(), LogicalAddress::BROADCAST);
        assert_eq!(event.opcode(), Opcode::STANDBY);
        assert!(event.payload().is_empty());
        assert!(event.is_standby_broadcast());
    }

    #[test]
    fn test_decode_with_operands() {
        let event = BusEvent::from_frame(&[0x4F, 0x90, 0x01]).unwrap();
        assert_eq!(event.opcode(), Opcode::REPORT_POWER_STATUS);
        assert_eq!(event.payload(), &[0x01]);
        assert!(!event.is_standby_broadcast());
    }

    #[test]
    fn test_directed_standby_is_not_broadcast() {
        let event = BusEvent::from_frame(&[0x04, 0x36]).unwrap();
        assert_eq!(event.destination(), LogicalAddress::PLAYBACK_1);
        assert!(!event.is_standby_broadcast());
    }

    #[test]
    fn test_empty_frame() {
        assert_eq!(BusEvent::from_frame(&[]), Err(FrameError::Empty));
    }

    #[test]
    fn test_poll_frame() {
        let err = BusEvent::from_frame(&[0x44]).unwrap_err();
        assert!(matches!(err, FrameError::Poll { .. }));
    }

    #[test]
    fn test_frame_too_long() {
        let frame = [0u8; MAX_FRAME_LEN + 1];
        assert_eq!(
            BusEvent::from_frame(&frame),
            Err(FrameError::TooLong {
                len: 17,
                max: MAX_FRAME_LEN
            })
        );
    }

    #[test]
    fn test_display() {
        let event = BusEvent::from_frame(&[0x4F, 0x90, 0x01]).unwrap();
        assert_eq!(
            event.to_string(),
            "Playback 1 (4) -> Broadcast (F): report power status (90) 01"
        );
    }
}
