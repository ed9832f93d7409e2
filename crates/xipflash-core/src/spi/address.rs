//! Address width types

/// Address width for SPI commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressWidth {
    /// No address phase
    #[default]
    None,
    /// 3-byte (24-bit) address - supports up to 16 MiB
    ThreeByte,
    /// 4-byte (32-bit) address
    FourByte,
}

impl AddressWidth {
    /// Returns the number of address bytes
    pub const fn bytes(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::ThreeByte => 3,
            Self::FourByte => 4,
        }
    }

    /// Encode an address big-endian into `buf`, returning the used prefix
    pub fn encode<'b>(&self, address: u32, buf: &'b mut [u8; 4]) -> &'b [u8] {
        let be = address.to_be_bytes();
        match self {
            Self::None => &buf[..0],
            Self::ThreeByte => {
                buf[..3].copy_from_slice(&be[1..]);
                &buf[..3]
            }
            Self::FourByte => {
                *buf = be;
                &buf[..]
            }
        }
    }
}
