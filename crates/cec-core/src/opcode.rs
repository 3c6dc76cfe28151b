//! CEC opcodes the monitor cares about.

use std::fmt;

/// A CEC opcode byte.
///
/// Only a handful are named; anything else is carried through as its raw
/// value so that unknown traffic can still be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opcode(u8);

impl Opcode {
    pub const FEATURE_ABORT: Opcode = Opcode(0x00);
    pub const IMAGE_VIEW_ON: Opcode = Opcode(0x04);
    pub const TEXT_VIEW_ON: Opcode = Opcode(0x0D);
    pub const STANDBY: Opcode = Opcode(0x36);
    pub const USER_CONTROL_PRESSED: Opcode = Opcode(0x44);
    pub const USER_CONTROL_RELEASED: Opcode = Opcode(0x45);
    pub const GIVE_OSD_NAME: Opcode = Opcode(0x46);
    pub const SET_OSD_NAME: Opcode = Opcode(0x47);
    pub const ROUTING_CHANGE: Opcode = Opcode(0x80);
    pub const ACTIVE_SOURCE: Opcode = Opcode(0x82);
    pub const GIVE_PHYSICAL_ADDRESS: Opcode = Opcode(0x83);
    pub const REPORT_PHYSICAL_ADDRESS: Opcode = Opcode(0x84);
    pub const REQUEST_ACTIVE_SOURCE: Opcode = Opcode(0x85);
    pub const DEVICE_VENDOR_ID: Opcode = Opcode(0x87);
    pub const GIVE_DEVICE_VENDOR_ID: Opcode = Opcode(0x8C);
    pub const GIVE_DEVICE_POWER_STATUS: Opcode = Opcode(0x8F);
    pub const REPORT_POWER_STATUS: Opcode = Opcode(0x90);
    pub const CEC_VERSION: Opcode = Opcode(0x9E);

    /// Wraps a raw opcode byte.
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Returns the raw opcode byte.
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Returns the opcode name, if it is one of the named opcodes.
    pub fn name(self) -> Option<&'static str> {
        let name = match self.0 {
            0x00 => "feature abort",
            0x04 => "image view on",
            0x0D => "text view on",
            0x36 => "standby",
            0x44 => "user control pressed",
            0x45 => "user control released",
            0x46 => "give osd name",
            0x47 => "set osd name",
            0x80 => "routing change",
            0x82 => "active source",
            0x83 => "give physical address",
            0x84 => "report physical address",
            0x85 => "request active source",
            0x87 => "device vendor id",
            0x8C => "give device vendor id",
            0x8F => "give device power status",
            0x90 => "report power status",
            0x9E => "cec version",
            _ => return None,
        };
        Some(name)
    }
}

impl From<u8> for Opcode {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({:02x})", name, self.0),
            None => write!(f, "unknown ({:02x})", self.0),
        }
    }
}
