//! Simulator errors

use thiserror::Error;

/// Errors building or driving the emulated board
#[derive(Debug, Error)]
pub enum SimError {
    /// The configured JEDEC ID has no valid capacity code
    #[error("JEDEC ID 0x{0:06x} has no valid capacity")]
    InvalidChipId(u32),

    /// An initial image does not fit the chip
    #[error("image of {len} bytes does not fit a {size} byte chip")]
    ImageTooLarge {
        /// Image length
        len: usize,
        /// Chip size
        size: u32,
    },

    /// Bytes were shifted with no chip select asserted
    #[error("bus activity with no chip selected")]
    NoChipSelected,

    /// Driver error
    #[error(transparent)]
    Flash(#[from] xipflash_core::Error),
}

/// Result alias for the simulator
pub type Result<T> = std::result::Result<T, SimError>;
