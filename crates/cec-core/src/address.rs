//! CEC logical addresses.

use std::fmt;

/// A 4-bit logical address on the CEC bus.
///
/// The header byte of every frame carries the initiator in its high nibble
/// and the destination in its low nibble. Address `0xF` doubles as the
/// broadcast destination and the "unregistered" initiator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalAddress(u8);

impl LogicalAddress {
    pub const TV: LogicalAddress = LogicalAddress(0x0);
    pub const RECORDING_1: LogicalAddress = LogicalAddress(0x1);
    pub const RECORDING_2: LogicalAddress = LogicalAddress(0x2);
    pub const TUNER_1: LogicalAddress = LogicalAddress(0x3);
    pub const PLAYBACK_1: LogicalAddress = LogicalAddress(0x4);
    pub const AUDIO_SYSTEM: LogicalAddress = LogicalAddress(0x5);
    pub const TUNER_2: LogicalAddress = LogicalAddress(0x6);
    pub const TUNER_3: LogicalAddress = LogicalAddress(0x7);
    pub const PLAYBACK_2: LogicalAddress = LogicalAddress(0x8);
    pub const RECORDING_3: LogicalAddress = LogicalAddress(0x9);
    pub const TUNER_4: LogicalAddress = LogicalAddress(0xA);
    pub const PLAYBACK_3: LogicalAddress = LogicalAddress(0xB);
    pub const BROADCAST: LogicalAddress = LogicalAddress(0xF);

    /// Creates an address from the low nibble of `value`.
    pub const fn new(value: u8) -> Self {
        Self(value & 0x0F)
    }

    /// Splits a frame header byte into `(initiator, destination)`.
    pub const fn from_header(header: u8) -> (Self, Self) {
        (Self::new(header >> 4), Self::new(header))
    }

    /// Returns the raw 4-bit value.
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Returns true for the broadcast address.
    pub const fn is_broadcast(self) -> bool {
        self.0 == Self::BROADCAST.0
    }

    /// Human readable device role, as printed by `cec-client`.
    pub fn name(self) -> &'static str {
        match self.0 {
            0x0 => "TV",
            0x1 => "Recorder 1",
            0x2 => "Recorder 2",
            0x3 => "Tuner 1",
            0x4 => "Playback 1",
            0x5 => "Audio",
            0x6 => "Tuner 2",
            0x7 => "Tuner 3",
            0x8 => "Playback 2",
            0x9 => "Recorder 3",
            0xA => "Tuner 4",
            0xB => "Playback 3",
            0xC => "Reserved 1",
            0xD => "Reserved 2",
            0xE => "Free use",
            _ => "Broadcast",
        }
    }
}

impl From<u8> for LogicalAddress {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for LogicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:X})", self.name(), self.0)
    }
}
