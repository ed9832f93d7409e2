//! Chip identification, static quirk table and per-chip runtime state

mod id;
pub mod quirks;
mod state;

pub use id::{ChipId, MFR_MACRONIX};
pub use quirks::{ChipQuirk, DelayPoint, ProtectPattern};
pub use state::{AddressMode, ChipFlags, ChipState, PendingOp, SuspendState};

/// XT25F64F, needs a read of the target before resume
pub const XT25F64F: ChipId = ChipId(0x17400B);
/// PY25Q256HB, extended address register must be cleared on 4-byte exit
pub const PY25Q256HB: ChipId = ChipId(0x192085);
/// GD25B512ME, XIP enable lives in the volatile configuration register
pub const GD25B512ME: ChipId = ChipId(0x1A47C8);

/// Page program granularity
pub const PAGE_SIZE: u32 = 256;
/// Smallest erase unit
pub const SECTOR_SIZE: u32 = 4 * 1024;
/// Block erase unit
pub const BLOCK_SIZE: u32 = 64 * 1024;
/// Value of erased bytes
pub const ERASE_VALUE: u8 = 0xFF;
