//! Runtime state of one probed chip

use bitflags::bitflags;

use super::{quirks, ChipId, ChipQuirk};
use crate::bus::ChipSelect;
use crate::spi::{opcodes, AddressWidth};

/// Addressing mode the chip is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressMode {
    /// 3-byte addresses
    #[default]
    ThreeByte,
    /// 4-byte addresses, native 4-byte opcodes
    FourByte,
}

impl AddressMode {
    /// Address width used on the bus
    pub const fn width(self) -> AddressWidth {
        match self {
            Self::ThreeByte => AddressWidth::ThreeByte,
            Self::FourByte => AddressWidth::FourByte,
        }
    }

    /// Page program opcode
    pub const fn program_opcode(self) -> u8 {
        match self {
            Self::ThreeByte => opcodes::PP,
            Self::FourByte => opcodes::PP_4B,
        }
    }
}

bitflags! {
    /// Per-chip operational flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChipFlags: u8 {
        /// An erase was started and is being driven by the suspend loop;
        /// interrupt-context callers must finish it before using the chip
        const NO_WAIT_READY = 1 << 0;
        /// Quad enable bit confirmed set
        const QUAD_ENABLED  = 1 << 1;
        /// Chip is in deep power-down
        const POWERED_DOWN  = 1 << 2;
    }
}

/// Kind of long-running operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOp {
    /// Sector or block erase
    Erase,
}

/// Suspend/resume state machine
///
/// `Idle -> Busy -> [Suspended <-> Resuming] -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuspendState {
    /// Nothing in flight
    #[default]
    Idle,
    /// Operation running on the chip
    Busy {
        /// What is running
        op: PendingOp,
        /// Target address
        addr: u32,
    },
    /// Operation paused, reads are allowed
    Suspended {
        /// What is paused
        op: PendingOp,
        /// Target address
        addr: u32,
    },
    /// Resume sent, waiting for the chip to report progress
    Resuming {
        /// What is resuming
        op: PendingOp,
        /// Target address
        addr: u32,
    },
}

/// One physical chip on a chip select
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipState {
    /// Chip select it sits on
    pub cs: ChipSelect,
    /// JEDEC ID
    pub id: ChipId,
    /// Size in bytes
    pub size: u32,
    /// Address mode, tracked per chip
    pub address_mode: AddressMode,
    /// Operational flags
    pub flags: ChipFlags,
    /// Suspend/resume state
    pub suspend: SuspendState,
    /// Supply voltage the delay chain was last set for
    pub vdd_mv: u16,
}

impl ChipState {
    /// State for a freshly probed chip
    pub fn new(cs: ChipSelect, id: ChipId, size: u32) -> Self {
        Self {
            cs,
            id,
            size,
            address_mode: AddressMode::ThreeByte,
            flags: ChipFlags::empty(),
            suspend: SuspendState::Idle,
            vdd_mv: quirks::DEFAULT_VDD_MV,
        }
    }

    /// Static table row for this chip
    pub fn quirk(&self) -> &'static ChipQuirk {
        quirks::lookup_or_default(self.id)
    }

    /// Address width used on the bus
    pub fn address_width(&self) -> AddressWidth {
        self.address_mode.width()
    }
}
