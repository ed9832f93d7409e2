//! JEDEC chip identifiers

use core::fmt;

/// 24-bit JEDEC ID as read by `0x9F`
///
/// Packed little-endian in read order: manufacturer in bits 0..8, memory
/// type in bits 8..16, capacity code in bits 16..24. So a GigaDevice
/// GD25Q16 (`C8 60 15`) is `0x1560C8`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct ChipId(pub u32);

/// Macronix manufacturer ID
pub const MFR_MACRONIX: u8 = 0xC2;

impl ChipId {
    /// Build from the three bytes returned by RDID
    pub const fn from_bytes(bytes: [u8; 3]) -> Self {
        Self(bytes[0] as u32 | (bytes[1] as u32) << 8 | (bytes[2] as u32) << 16)
    }

    /// Raw packed value
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// JEDEC manufacturer byte
    pub const fn manufacturer(self) -> u8 {
        self.0 as u8
    }

    /// Capacity code (log2 of the size in bytes)
    pub const fn capacity_code(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// Nothing answered: the bus floated high or was held low
    pub const fn is_absent(self) -> bool {
        self.0 == 0 || self.0 == 0x00FF_FFFF
    }

    /// Chip size in bytes derived from the capacity code
    ///
    /// Returns `None` for codes outside what a 32-bit address can reach.
    pub const fn size(self) -> Option<u32> {
        match self.capacity_code() {
            code @ 10..=31 => Some(1u32 << code),
            _ => None,
        }
    }

    /// Chips above 16 MiB need 4-byte addressing
    pub const fn needs_4byte(self) -> bool {
        self.capacity_code() > 24
    }
}

impl fmt::Debug for ChipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChipId(0x{:06x})", self.0)
    }
}

impl fmt::Display for ChipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:06x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields() {
        let id = ChipId::from_bytes([0xC8, 0x60, 0x15]);
        assert_eq!(id.raw(), 0x1560C8);
        assert_eq!(id.manufacturer(), 0xC8);
        assert_eq!(id.size(), Some(2 * 1024 * 1024));
        assert!(!id.needs_4byte());

        let big = ChipId(0x192085);
        assert_eq!(big.size(), Some(32 * 1024 * 1024));
        assert!(big.needs_4byte());
    }

    #[test]
    fn test_absent() {
        assert!(ChipId::from_bytes([0xFF; 3]).is_absent());
        assert!(ChipId::from_bytes([0; 3]).is_absent());
        assert_eq!(ChipId(0x0000C8).size(), None);
    }
}
