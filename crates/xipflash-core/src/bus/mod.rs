//! Bus transaction primitive
//!
//! [`Bus`] turns one [`SpiCommand`] into controller register activity. The
//! opcode sequencer only sees the [`SpiTransport`] trait, so it can be
//! driven by the real primitive or by a recording fake in tests.

mod controller;
mod transfer;

pub use controller::{NoCsPin, SpiController};
pub use transfer::{Bus, DMA_THRESHOLD};

use bitflags::bitflags;

use crate::error::Result;
use crate::platform::ExecContext;
use crate::spi::SpiCommand;

/// Which chip select a transaction goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum ChipSelect {
    /// Controller chip select bit, chip 0
    #[default]
    Primary,
    /// GPIO chip select, chip 1
    Secondary,
}

impl ChipSelect {
    /// Array index for per-chip tables
    pub const fn index(self) -> usize {
        match self {
            Self::Primary => 0,
            Self::Secondary => 1,
        }
    }
}

bitflags! {
    /// Persistent bus behavior flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BusFlags: u8 {
        /// Do not take the interrupt lock around transactions
        const NO_IRQ_LOCK             = 1 << 0;
        /// Skip the continuous-read reset in the prepare step
        const NO_EXIT_CONTINUOUS_READ = 1 << 1;
        /// Reads use the multi-wire address phase (0xBB / 0xEB)
        const NXIO                    = 1 << 2;
    }
}

/// Static and runtime configuration of one controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Negotiated data width: 1, 2 or 4 lines
    pub bus_width: u8,
    /// Delay chain value per chip select
    pub delay_chain: [u8; 2],
    /// DMA channel for long data phases
    pub dma_channel: Option<u8>,
    /// Behavior flags
    pub flags: BusFlags,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            bus_width: 1,
            delay_chain: [8, 8],
            dma_channel: None,
            flags: BusFlags::empty(),
        }
    }
}

/// What the opcode sequencer needs from the bus
///
/// Mirrors a SPI master: execute one command, plus the timing services
/// the polling loops use.
pub trait SpiTransport {
    /// Execute a single command, blocking until it completes
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()>;

    /// Negotiated data width (1, 2 or 4)
    fn bus_width(&self) -> u8;

    /// Current behavior flags
    fn flags(&self) -> BusFlags;

    /// Replace the behavior flags
    fn set_flags(&mut self, flags: BusFlags);

    /// Busy-wait for `us` microseconds
    fn delay_us(&mut self, us: u32);

    /// Sleep for `ms` milliseconds (task context only)
    fn sleep_ms(&mut self, ms: u32);

    /// Execution context of the caller
    fn context(&self) -> ExecContext;
}
