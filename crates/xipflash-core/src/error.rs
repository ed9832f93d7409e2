//! Error types for xipflash-core
//!
//! Transient busy conditions are retried where they are detected and never
//! show up here. What remains are hardware collaborator failures, bounded
//! polls that ran out, and caller contract violations.

use core::fmt;

/// A request that breaks the driver's calling contract
///
/// These are programming errors in the caller. The embedding firmware is
/// expected to treat them as fatal, see [`Error::is_fatal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractViolation {
    /// Erase offset or length not aligned to the 4 KiB sector size
    UnalignedErase {
        /// Requested offset
        offset: u32,
        /// Requested length
        len: u32,
    },
    /// Request extends past the end of the device
    OutOfBounds {
        /// Requested offset
        offset: u32,
        /// Requested length
        len: u32,
    },
    /// Security region index outside `0..4`
    InvalidRegion(u8),
    /// `offset + len` exceeds the 1 KiB security region
    RegionOverflow {
        /// Offset inside the region
        offset: u32,
        /// Requested length
        len: usize,
    },
    /// Write or erase issued from interrupt context
    WriteFromInterrupt,
    /// Command asks for more dummy bytes than the controller can clock out
    TooManyDummyBytes(u8),
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Bus errors
    /// Controller never reported ready before a transaction
    BusNotReady,
    /// Controller or DMA transfer failed
    Bus,
    /// Chip-select GPIO could not be driven
    ChipSelect,

    // Chip errors
    /// No chip answered the JEDEC ID read (all zeros or all ones)
    ChipNotFound,
    /// The selected chip select has no probed chip
    ChipNotPresent,
    /// A status register write did not stick
    StatusWriteFailed,

    // Operation errors
    /// A bounded busy poll ran out
    Timeout,
    /// No stable delay chain value was found
    CalibrationFailed,
    /// Optional feature disabled in the board capabilities
    NotSupported,
    /// Board configuration holds values the hardware cannot take
    InvalidConfig,

    // Caller errors
    /// Calling contract violated
    Contract(ContractViolation),
}

impl Error {
    /// Returns true for errors that indicate caller misuse
    ///
    /// Continuing after one of these risks flash corruption; firmware
    /// should reset the system.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Contract(_))
    }
}

impl From<ContractViolation> for Error {
    fn from(v: ContractViolation) -> Self {
        Self::Contract(v)
    }
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnalignedErase { offset, len } => write!(
                f,
                "erase of 0x{:x} bytes at 0x{:08x} is not sector aligned",
                len, offset
            ),
            Self::OutOfBounds { offset, len } => write!(
                f,
                "0x{:x} bytes at 0x{:08x} exceed the device",
                len, offset
            ),
            Self::InvalidRegion(index) => write!(f, "security region {} does not exist", index),
            Self::RegionOverflow { offset, len } => write!(
                f,
                "0x{:x} bytes at region offset 0x{:x} exceed the security region",
                len, offset
            ),
            Self::WriteFromInterrupt => write!(f, "flash not allow write in irq"),
            Self::TooManyDummyBytes(n) => write!(f, "{} dummy bytes requested", n),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusNotReady => write!(f, "SPI controller not ready"),
            Self::Bus => write!(f, "SPI transfer failed"),
            Self::ChipSelect => write!(f, "chip select GPIO failed"),
            Self::ChipNotFound => write!(f, "flash chip not found"),
            Self::ChipNotPresent => write!(f, "no flash chip on this chip select"),
            Self::StatusWriteFailed => write!(f, "status register write did not take effect"),
            Self::Timeout => write!(f, "operation timed out"),
            Self::CalibrationFailed => write!(f, "no stable delay chain found"),
            Self::NotSupported => write!(f, "feature not enabled on this board"),
            Self::InvalidConfig => write!(f, "invalid board configuration"),
            Self::Contract(v) => write!(f, "contract violation: {}", v),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
