//! Static board configuration
//!
//! Optional hardware features are runtime capability flags so that one
//! build can drive any board variant.

use bitflags::bitflags;

use crate::bus::{BusConfig, BusFlags};
use crate::calibration::DELAY_CHAIN_MAX;
use crate::chip::quirks::DEFAULT_VDD_MV;
use crate::error::{Error, Result};
use crate::xip;

bitflags! {
    /// Optional features present on the board
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
    #[cfg_attr(feature = "std", serde(transparent))]
    pub struct Capabilities: u32 {
        /// Quad data lines are wired
        const QUAD                 = 1 << 0;
        /// Address phase of reads goes multi-wire too
        const NXIO                 = 1 << 1;
        /// Second chip on a GPIO chip select
        const DUAL_CS              = 1 << 2;
        /// Security register access
        const SECURITY_REGIONS     = 1 << 3;
        /// Delay chain and clock follow supply voltage changes
        const DVFS                 = 1 << 4;
        /// Long erases use program/erase suspend
        const SUSPEND              = 1 << 5;
        /// Transactions run without the interrupt lock
        const NO_IRQ_LOCK          = 1 << 6;
        /// Writes are allowed from interrupt context (panic dump)
        const WRITE_FROM_INTERRUPT = 1 << 7;
    }
}

/// Everything the board support code knows before the chip is probed
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "std", serde(default))]
pub struct BoardConfig {
    /// Data lines wired to the chip: 1, 2 or 4
    pub bus_width: u8,
    /// Delay chain used until the chip table says otherwise
    pub delay_chain: u8,
    /// DMA channel for long data phases
    pub dma_channel: Option<u8>,
    /// Bus clock at init
    pub flash_clock_mhz: u32,
    /// Optional features
    pub capabilities: Capabilities,
    /// Size of the second chip when it cannot be derived from its ID
    pub secondary_size: Option<u32>,
    /// Supply voltage at boot
    pub vdd_mv: u16,
    /// XIP gate nesting limit
    pub xip_limit: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            bus_width: 1,
            delay_chain: 8,
            dma_channel: None,
            flash_clock_mhz: 80,
            capabilities: Capabilities::empty(),
            secondary_size: None,
            vdd_mv: DEFAULT_VDD_MV,
            xip_limit: xip::DEFAULT_LIMIT,
        }
    }
}

impl BoardConfig {
    /// Reject values the hardware cannot take
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.bus_width, 1 | 2 | 4) {
            return Err(Error::InvalidConfig);
        }
        if self.bus_width == 4 && !self.capabilities.contains(Capabilities::QUAD) {
            return Err(Error::InvalidConfig);
        }
        if self.delay_chain > DELAY_CHAIN_MAX || self.xip_limit == 0 {
            return Err(Error::InvalidConfig);
        }
        Ok(())
    }

    /// Check one capability
    pub fn has(&self, cap: Capabilities) -> bool {
        self.capabilities.contains(cap)
    }

    /// Controller configuration derived from the board
    pub fn bus_config(&self) -> BusConfig {
        let mut flags = BusFlags::empty();
        flags.set(BusFlags::NO_IRQ_LOCK, self.has(Capabilities::NO_IRQ_LOCK));
        flags.set(BusFlags::NXIO, self.has(Capabilities::NXIO));
        BusConfig {
            bus_width: self.bus_width,
            delay_chain: [self.delay_chain; 2],
            dma_channel: self.dma_channel,
            flags,
        }
    }
}
