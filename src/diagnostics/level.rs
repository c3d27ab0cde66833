//! Verbose levels

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Bitmask of message severities.
///
/// A message carries exactly one level. `ALL` is the union of every level
/// and is only meaningful as a subscription mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct VerboseLevel(u8);

impl VerboseLevel {
    pub const NONE: VerboseLevel = VerboseLevel(0);
    pub const DEBUG: VerboseLevel = VerboseLevel(1 << 0);
    pub const INFO: VerboseLevel = VerboseLevel(1 << 1);
    pub const WARNING: VerboseLevel = VerboseLevel(1 << 2);
    pub const ERROR: VerboseLevel = VerboseLevel(1 << 3);
    pub const FATAL: VerboseLevel = VerboseLevel(1 << 4);
    pub const ALL: VerboseLevel = VerboseLevel(0x1F);

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Build from raw bits, dropping bits that name no level
    pub const fn from_bits_truncate(bits: u8) -> Self {
        VerboseLevel(bits & Self::ALL.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `other` is set in `self`
    pub const fn contains(self, other: VerboseLevel) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: VerboseLevel) -> bool {
        self.0 & other.0 != 0
    }

    /// Exactly one level bit set
    pub const fn is_single(self) -> bool {
        self.0 != 0 && self.0 & (self.0 - 1) == 0 && self.0 & !Self::ALL.0 == 0
    }
}

impl BitOr for VerboseLevel {
    type Output = VerboseLevel;

    fn bitor(self, rhs: Self) -> Self {
        VerboseLevel(self.0 | rhs.0)
    }
}

impl BitOrAssign for VerboseLevel {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for VerboseLevel {
    type Output = VerboseLevel;

    fn bitand(self, rhs: Self) -> Self {
        VerboseLevel(self.0 & rhs.0)
    }
}

impl fmt::Display for VerboseLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            VerboseLevel::NONE => "NONE",
            VerboseLevel::DEBUG => "DEBUG",
            VerboseLevel::INFO => "INFO",
            VerboseLevel::WARNING => "WARNING",
            VerboseLevel::ERROR => "ERROR",
            VerboseLevel::FATAL => "FATAL",
            VerboseLevel::ALL => "ALL",
            other => return write!(f, "{:#04x}", other.0),
        };
        f.write_str(name)
    }
}
