//! Security registers
//!
//! Four 1 KiB OTP-like regions outside the main array. Region `n` starts
//! at address `n << 12`; the address width follows the chip's current
//! address mode.

use crate::bus::SpiTransport;
use crate::chip::{ChipState, PAGE_SIZE};
use crate::error::{ContractViolation, Result};
use crate::protocol::{self, PageChunks};
use crate::spi::{opcodes, SpiCommand};

/// Number of security regions
pub const REGION_COUNT: u8 = 4;
/// Size of one region in bytes
pub const REGION_SIZE: u32 = 1024;
/// Largest factory unique ID
pub const UNIQUE_ID_LEN: usize = 16;

const ERASE_POLL_US: u32 = 1_000;
const ERASE_TIMEOUT_US: u32 = 1_000_000;
const PROGRAM_POLL_US: u32 = 10;
const PROGRAM_TIMEOUT_US: u32 = 10_000;

/// A validated region index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityRegion(u8);

impl SecurityRegion {
    /// Validate `index`
    pub fn new(index: u8) -> Result<Self> {
        if index >= REGION_COUNT {
            return Err(ContractViolation::InvalidRegion(index).into());
        }
        Ok(Self(index))
    }

    /// Region index
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Chip address of `offset` inside the region
    pub const fn address(self, offset: u32) -> u32 {
        (self.0 as u32) << 12 | offset
    }

    /// Reject accesses that would run past the region
    pub fn check_bounds(self, offset: u32, len: usize) -> Result<()> {
        let overflow = ContractViolation::RegionOverflow { offset, len };
        let end = u32::try_from(len)
            .ok()
            .and_then(|len| offset.checked_add(len))
            .ok_or(overflow)?;
        if end > REGION_SIZE {
            return Err(overflow.into());
        }
        Ok(())
    }
}

/// Erase a whole region
pub fn erase_region<T: SpiTransport + ?Sized>(
    t: &mut T,
    chip: &ChipState,
    region: SecurityRegion,
) -> Result<()> {
    protocol::write_enable(t)?;
    t.execute(&mut SpiCommand::addressed(
        opcodes::ERSR,
        region.address(0),
        chip.address_width(),
    ))?;
    protocol::wait_ready(t, ERASE_POLL_US, ERASE_TIMEOUT_US)
}

/// Program `data` at `offset` inside a region, splitting at page boundaries
pub fn write_region<T: SpiTransport + ?Sized>(
    t: &mut T,
    chip: &ChipState,
    region: SecurityRegion,
    offset: u32,
    data: &[u8],
) -> Result<()> {
    region.check_bounds(offset, data.len())?;
    for (at, start, len) in PageChunks::new(offset, data.len(), PAGE_SIZE) {
        protocol::write_enable(t)?;
        t.execute(&mut SpiCommand::write(
            opcodes::PRSR,
            region.address(at),
            chip.address_width(),
            &data[start..start + len],
        ))?;
        protocol::wait_ready(t, PROGRAM_POLL_US, PROGRAM_TIMEOUT_US)?;
    }
    Ok(())
}

/// Read `buf.len()` bytes at `offset` inside a region
pub fn read_region<T: SpiTransport + ?Sized>(
    t: &mut T,
    chip: &ChipState,
    region: SecurityRegion,
    offset: u32,
    buf: &mut [u8],
) -> Result<()> {
    region.check_bounds(offset, buf.len())?;
    if buf.is_empty() {
        return Ok(());
    }
    let mut cmd = SpiCommand::read(
        opcodes::RDSCUR,
        region.address(offset),
        chip.address_width(),
        buf,
    )
    .with_dummy_bytes(1);
    t.execute(&mut cmd)
}
