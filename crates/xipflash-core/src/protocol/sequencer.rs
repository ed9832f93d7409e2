//! Serial NOR command sequences
//!
//! Every function here is generic over [`SpiTransport`], composes one or
//! more bus transactions, and leaves the chip in a defined state: write
//! type commands are preceded by WREN and, unless [`Wait::NoWait`] is
//! requested, followed by a bounded busy poll.

use crate::bus::{BusFlags, SpiTransport};
use crate::chip::{
    AddressMode, ChipFlags, ChipId, ChipState, BLOCK_SIZE, MFR_MACRONIX, PAGE_SIZE, PY25Q256HB,
    SECTOR_SIZE,
};
use crate::error::{ContractViolation, Error, Result};
use crate::spi::{opcodes, AddressWidth, SpiCommand, TransferFlags};

/// Status register selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusReg {
    /// SR1: WIP, WEL, block protect
    Sr1,
    /// SR2: QE, suspend, CMP
    Sr2,
    /// SR3: drive strength and vendor bits
    Sr3,
}

impl StatusReg {
    /// Opcode reading this register
    pub const fn read_opcode(self) -> u8 {
        match self {
            Self::Sr1 => opcodes::RDSR,
            Self::Sr2 => opcodes::RDSR2,
            Self::Sr3 => opcodes::RDSR3,
        }
    }

    /// Opcode writing this register
    pub const fn write_opcode(self) -> u8 {
        match self {
            Self::Sr1 => opcodes::WRSR,
            Self::Sr2 => opcodes::WRSR2,
            Self::Sr3 => opcodes::WRSR3,
        }
    }
}

/// Whether a write-type command waits for the busy bit to clear
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Poll until WIP clears
    Ready,
    /// Return right after the opcode; the caller drives completion
    NoWait,
}

// Poll intervals and bounds in microseconds
const PROGRAM_POLL_US: u32 = 10;
const PROGRAM_TIMEOUT_US: u32 = 10_000;
const SECTOR_POLL_US: u32 = 1_000;
const SECTOR_TIMEOUT_US: u32 = 1_000_000;
const BLOCK_POLL_US: u32 = 10_000;
const BLOCK_TIMEOUT_US: u32 = 4_000_000;
const STATUS_POLL_US: u32 = 100;
const STATUS_TIMEOUT_US: u32 = 500_000;

/// Read the JEDEC ID
pub fn read_chip_id<T: SpiTransport + ?Sized>(t: &mut T) -> Result<ChipId> {
    let mut buf = [0u8; 3];
    t.execute(&mut SpiCommand::read_reg(opcodes::RDID, &mut buf))?;
    Ok(ChipId::from_bytes(buf))
}

/// Read one status register
pub fn read_status<T: SpiTransport + ?Sized>(t: &mut T, reg: StatusReg) -> Result<u8> {
    let mut buf = [0u8; 1];
    t.execute(&mut SpiCommand::read_reg(reg.read_opcode(), &mut buf))?;
    Ok(buf[0])
}

/// Send the Write Enable command
pub fn write_enable<T: SpiTransport + ?Sized>(t: &mut T) -> Result<()> {
    t.execute(&mut SpiCommand::simple(opcodes::WREN))
}

/// Check if a write or erase operation is in progress
pub fn is_busy<T: SpiTransport + ?Sized>(t: &mut T) -> Result<bool> {
    Ok(read_status(t, StatusReg::Sr1)? & opcodes::SR1_WIP != 0)
}

/// Wait for the WIP (Write In Progress) bit to clear
///
/// Polls the status register every `poll_delay_us` and gives up with
/// [`Error::Timeout`] after `timeout_us`.
pub fn wait_ready<T: SpiTransport + ?Sized>(
    t: &mut T,
    poll_delay_us: u32,
    timeout_us: u32,
) -> Result<()> {
    let max_polls = if poll_delay_us > 0 {
        timeout_us / poll_delay_us
    } else {
        timeout_us
    };

    for _ in 0..=max_polls {
        if !is_busy(t)? {
            return Ok(());
        }
        if poll_delay_us > 0 {
            t.delay_us(poll_delay_us);
        }
    }

    Err(Error::Timeout)
}

/// Write a status register
///
/// `data` may carry more than one byte: `WRSR` with two bytes writes SR1
/// and SR2 together on most parts.
pub fn write_status<T: SpiTransport + ?Sized>(t: &mut T, reg: StatusReg, data: &[u8]) -> Result<()> {
    write_enable(t)?;
    t.execute(&mut SpiCommand::write_reg(reg.write_opcode(), data))?;
    wait_ready(t, STATUS_POLL_US, STATUS_TIMEOUT_US)
}

/// Opcode, phase flags and dummy length for data reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadMode {
    /// Read opcode
    pub opcode: u8,
    /// Multi-wire phases
    pub flags: TransferFlags,
    /// Dummy bytes after the address
    pub dummy_bytes: u8,
}

/// Pick the fast read variant for the bus width
///
/// With `nxio` the address goes out multi-wire too (1-2-2 / 1-4-4); the
/// quad I/O form carries a mode byte plus two dummy bytes. 4-byte
/// addressing uses the opcode one above the 3-byte one.
pub fn select_read_mode(bus_width: u8, nxio: bool, width: AddressWidth) -> ReadMode {
    let (opcode, flags, dummy_bytes) = match (bus_width, nxio) {
        (4, true) => (opcodes::QIOR, TransferFlags::MIO_ADDR_DATA, 3),
        (4, false) => (opcodes::QOR, TransferFlags::MIO_DATA, 1),
        (2, true) => (opcodes::DIOR, TransferFlags::MIO_ADDR_DATA, 1),
        (2, false) => (opcodes::DOR, TransferFlags::MIO_DATA, 1),
        _ => (opcodes::FAST_READ, TransferFlags::empty(), 1),
    };
    let opcode = if width == AddressWidth::FourByte {
        opcode + 1
    } else {
        opcode
    };
    ReadMode {
        opcode,
        flags,
        dummy_bytes,
    }
}

/// Read `buf.len()` bytes at `addr` in one transaction
pub fn read<T: SpiTransport + ?Sized>(
    t: &mut T,
    chip: &ChipState,
    addr: u32,
    buf: &mut [u8],
) -> Result<()> {
    if buf.is_empty() {
        return Ok(());
    }
    let width = chip.address_width();
    let bus_width = if chip.flags.contains(ChipFlags::QUAD_ENABLED) || t.bus_width() != 4 {
        t.bus_width()
    } else {
        1
    };
    let mode = select_read_mode(bus_width, t.flags().contains(BusFlags::NXIO), width);
    let mut cmd = SpiCommand::read(mode.opcode, addr, width, buf)
        .with_flags(mode.flags)
        .with_dummy_bytes(mode.dummy_bytes);
    t.execute(&mut cmd)
}

/// Program up to one page; `data` must not cross a page boundary
pub fn program_page<T: SpiTransport + ?Sized>(
    t: &mut T,
    chip: &ChipState,
    addr: u32,
    data: &[u8],
    wait: Wait,
) -> Result<()> {
    write_enable(t)?;
    let mut cmd = SpiCommand::write(
        chip.address_mode.program_opcode(),
        addr,
        chip.address_width(),
        data,
    );
    t.execute(&mut cmd)?;
    match wait {
        Wait::Ready => wait_ready(t, PROGRAM_POLL_US, PROGRAM_TIMEOUT_US),
        Wait::NoWait => Ok(()),
    }
}

/// Splits a write into page-sized pieces
///
/// The first piece runs up to the next page boundary, so an unaligned
/// start becomes aligned from the second piece on. Yields
/// `(flash address, offset into the data, length)`.
#[derive(Debug, Clone)]
pub struct PageChunks {
    addr: u32,
    offset: usize,
    remaining: usize,
    page: u32,
}

impl PageChunks {
    /// Chunks of `len` bytes starting at `addr` for pages of `page` bytes
    pub fn new(addr: u32, len: usize, page: u32) -> Self {
        Self {
            addr,
            offset: 0,
            remaining: len,
            page,
        }
    }
}

impl Iterator for PageChunks {
    type Item = (u32, usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let room = (self.page - self.addr % self.page) as usize;
        let len = room.min(self.remaining);
        let item = (self.addr, self.offset, len);
        self.addr += len as u32;
        self.offset += len;
        self.remaining -= len;
        Some(item)
    }
}

/// Program `data` at `addr`, splitting at page boundaries
pub fn write<T: SpiTransport + ?Sized>(
    t: &mut T,
    chip: &ChipState,
    addr: u32,
    data: &[u8],
) -> Result<()> {
    for (page_addr, offset, len) in PageChunks::new(addr, data.len(), PAGE_SIZE) {
        program_page(t, chip, page_addr, &data[offset..offset + len], Wait::Ready)?;
    }
    Ok(())
}

/// Erase granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseKind {
    /// 4 KiB sector
    Sector,
    /// 64 KiB block
    Block,
}

impl EraseKind {
    /// Bytes erased by one command
    pub const fn size(self) -> u32 {
        match self {
            Self::Sector => SECTOR_SIZE,
            Self::Block => BLOCK_SIZE,
        }
    }

    /// Opcode for the given address mode
    pub const fn opcode(self, mode: AddressMode) -> u8 {
        match (self, mode) {
            (Self::Sector, AddressMode::ThreeByte) => opcodes::SE_20,
            (Self::Sector, AddressMode::FourByte) => opcodes::SE_21,
            (Self::Block, AddressMode::ThreeByte) => opcodes::BE_D8,
            (Self::Block, AddressMode::FourByte) => opcodes::BE_DC,
        }
    }

    const fn poll(self) -> (u32, u32) {
        match self {
            Self::Sector => (SECTOR_POLL_US, SECTOR_TIMEOUT_US),
            Self::Block => (BLOCK_POLL_US, BLOCK_TIMEOUT_US),
        }
    }
}

/// Reject erases that are not sector aligned
pub fn check_erase_alignment(offset: u32, len: u32) -> Result<()> {
    if offset % SECTOR_SIZE != 0 || len % SECTOR_SIZE != 0 {
        return Err(ContractViolation::UnalignedErase { offset, len }.into());
    }
    Ok(())
}

/// Plans an aligned erase as a sequence of sector and block commands
///
/// A block command is used whenever the cursor is block aligned and at
/// least a block remains; everything else goes sector by sector.
#[derive(Debug, Clone)]
pub struct EraseSteps {
    addr: u32,
    remaining: u32,
}

impl EraseSteps {
    /// Plan an erase of `len` bytes at `addr`; both must be sector aligned
    pub fn new(addr: u32, len: u32) -> Result<Self> {
        check_erase_alignment(addr, len)?;
        Ok(Self {
            addr,
            remaining: len,
        })
    }
}

impl Iterator for EraseSteps {
    type Item = (u32, EraseKind);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let kind = if self.addr % BLOCK_SIZE == 0 && self.remaining >= BLOCK_SIZE {
            EraseKind::Block
        } else {
            EraseKind::Sector
        };
        let item = (self.addr, kind);
        self.addr += kind.size();
        self.remaining -= kind.size();
        Some(item)
    }
}

/// Issue one sector or block erase
pub fn erase_unit<T: SpiTransport + ?Sized>(
    t: &mut T,
    chip: &ChipState,
    kind: EraseKind,
    addr: u32,
    wait: Wait,
) -> Result<()> {
    write_enable(t)?;
    let mut cmd = SpiCommand::addressed(kind.opcode(chip.address_mode), addr, chip.address_width());
    t.execute(&mut cmd)?;
    match wait {
        Wait::Ready => {
            let (poll, timeout) = kind.poll();
            wait_ready(t, poll, timeout)
        }
        Wait::NoWait => Ok(()),
    }
}

/// Erase `len` bytes at `addr`, waiting for each command
pub fn erase<T: SpiTransport + ?Sized>(
    t: &mut T,
    chip: &ChipState,
    addr: u32,
    len: u32,
) -> Result<()> {
    for (step_addr, kind) in EraseSteps::new(addr, len)? {
        erase_unit(t, chip, kind, step_addr, Wait::Ready)?;
    }
    Ok(())
}

/// Switch the chip to 4-byte addressing
pub fn enter_4byte_mode<T: SpiTransport + ?Sized>(t: &mut T, chip: &mut ChipState) -> Result<()> {
    t.execute(&mut SpiCommand::simple(opcodes::EN4B))?;
    chip.address_mode = AddressMode::FourByte;
    Ok(())
}

/// Switch the chip back to 3-byte addressing
///
/// PY25Q256HB keeps the top address byte in its extended address
/// register after leaving 4-byte mode; it is cleared here.
pub fn exit_4byte_mode<T: SpiTransport + ?Sized>(t: &mut T, chip: &mut ChipState) -> Result<()> {
    t.execute(&mut SpiCommand::simple(opcodes::EX4B))?;
    if chip.id == PY25Q256HB {
        write_enable(t)?;
        t.execute(&mut SpiCommand::write_reg(opcodes::WREAR, &[0]))?;
    }
    chip.address_mode = AddressMode::ThreeByte;
    Ok(())
}

/// Set the quad enable bit
///
/// Macronix keeps QE in SR1 bit 6. Everyone else uses SR2 bit 1, but
/// silicon revisions disagree on which opcode writes SR2: try `WRSR2`
/// first, verify, then fall back to a two-byte `WRSR`.
///
/// Returns whether QE reads back set. A chip that refuses is left in
/// single-wire mode, not treated as an error.
pub fn enable_quad<T: SpiTransport + ?Sized>(t: &mut T, chip: &mut ChipState) -> Result<bool> {
    let enabled = if chip.id.manufacturer() == MFR_MACRONIX {
        let sr1 = read_status(t, StatusReg::Sr1)?;
        if sr1 & opcodes::SR1_QE_MXIC == 0 {
            write_status(t, StatusReg::Sr1, &[sr1 | opcodes::SR1_QE_MXIC])?;
        }
        read_status(t, StatusReg::Sr1)? & opcodes::SR1_QE_MXIC != 0
    } else {
        let sr2 = read_status(t, StatusReg::Sr2)?;
        if sr2 & opcodes::SR2_QE == 0 {
            write_status(t, StatusReg::Sr2, &[sr2 | opcodes::SR2_QE])?;
            if read_status(t, StatusReg::Sr2)? & opcodes::SR2_QE == 0 {
                let sr1 = read_status(t, StatusReg::Sr1)?;
                write_status(t, StatusReg::Sr1, &[sr1, sr2 | opcodes::SR2_QE])?;
            }
        }
        read_status(t, StatusReg::Sr2)? & opcodes::SR2_QE != 0
    };

    chip.flags.set(ChipFlags::QUAD_ENABLED, enabled);
    if enabled {
        log::debug!("chip {}: quad enable set", chip.id);
    } else {
        log::warn!("chip {}: quad enable did not stick", chip.id);
    }
    Ok(enabled)
}

/// Clear the quad enable bit
///
/// Same write paths as [`enable_quad`]. Unlike enabling, a bit that stays
/// set is an error: the caller is about to drive the chip single-wire.
pub fn disable_quad<T: SpiTransport + ?Sized>(t: &mut T, chip: &mut ChipState) -> Result<()> {
    let still_set = if chip.id.manufacturer() == MFR_MACRONIX {
        let sr1 = read_status(t, StatusReg::Sr1)?;
        if sr1 & opcodes::SR1_QE_MXIC != 0 {
            write_status(t, StatusReg::Sr1, &[sr1 & !opcodes::SR1_QE_MXIC])?;
        }
        read_status(t, StatusReg::Sr1)? & opcodes::SR1_QE_MXIC != 0
    } else {
        let sr2 = read_status(t, StatusReg::Sr2)?;
        if sr2 & opcodes::SR2_QE != 0 {
            write_status(t, StatusReg::Sr2, &[sr2 & !opcodes::SR2_QE])?;
            if read_status(t, StatusReg::Sr2)? & opcodes::SR2_QE != 0 {
                let sr1 = read_status(t, StatusReg::Sr1)?;
                write_status(t, StatusReg::Sr1, &[sr1, sr2 & !opcodes::SR2_QE])?;
            }
        }
        read_status(t, StatusReg::Sr2)? & opcodes::SR2_QE != 0
    };

    if still_set {
        log::error!("chip {}: quad enable cannot be cleared", chip.id);
        return Err(Error::StatusWriteFailed);
    }
    chip.flags.remove(ChipFlags::QUAD_ENABLED);
    log::debug!("chip {}: quad enable cleared", chip.id);
    Ok(())
}

/// Send the suspend opcode
pub fn suspend<T: SpiTransport + ?Sized>(t: &mut T) -> Result<()> {
    t.execute(&mut SpiCommand::simple(opcodes::SUSPEND))
}

/// Send the resume opcode
pub fn resume<T: SpiTransport + ?Sized>(t: &mut T) -> Result<()> {
    t.execute(&mut SpiCommand::simple(opcodes::RESUME))
}

/// Read the factory unique ID (up to 16 bytes)
pub fn read_unique_id<T: SpiTransport + ?Sized>(
    t: &mut T,
    chip: &ChipState,
    buf: &mut [u8],
) -> Result<()> {
    let mut cmd =
        SpiCommand::read(opcodes::RDUID, 0, chip.address_width(), buf).with_dummy_bytes(1);
    t.execute(&mut cmd)
}

/// Enter deep power-down
///
/// A chip left in quad continuous read would swallow the opcode, so it
/// is reset first when the bus runs four wires.
pub fn power_down<T: SpiTransport + ?Sized>(t: &mut T) -> Result<()> {
    if t.bus_width() == 4 {
        t.execute(&mut SpiCommand::simple(opcodes::CONTINUOUS_READ_RESET))?;
    }
    t.execute(&mut SpiCommand::simple(opcodes::DP))?;
    t.delay_us(5);
    Ok(())
}

/// Release from deep power-down
pub fn power_up<T: SpiTransport + ?Sized>(t: &mut T) -> Result<()> {
    t.execute(&mut SpiCommand::simple(opcodes::RDP))?;
    t.delay_us(40);
    Ok(())
}

/// Read one volatile configuration register byte
pub fn read_volatile_config<T: SpiTransport + ?Sized>(
    t: &mut T,
    chip: &ChipState,
    addr: u32,
) -> Result<u8> {
    let mut buf = [0u8; 1];
    let mut cmd =
        SpiCommand::read(opcodes::RDVCR, addr, chip.address_width(), &mut buf).with_dummy_bytes(1);
    t.execute(&mut cmd)?;
    Ok(buf[0])
}

/// Write one volatile configuration register byte
pub fn write_volatile_config<T: SpiTransport + ?Sized>(
    t: &mut T,
    chip: &ChipState,
    addr: u32,
    value: u8,
) -> Result<()> {
    write_enable(t)?;
    let data = [value];
    t.execute(&mut SpiCommand::write(
        opcodes::WRVCR,
        addr,
        chip.address_width(),
        &data,
    ))
}
