//! Emulated serial NOR chip
//!
//! Decodes the byte stream of one chip-select window the way a real part
//! does: opcode, address, dummy cycles, data. Program and erase run in
//! virtual time and can be suspended; reads issued while a program or
//! erase is running come back as garbage and are counted.

use xipflash_core::chip::{quirks, BLOCK_SIZE, ERASE_VALUE, MFR_MACRONIX, PAGE_SIZE, SECTOR_SIZE};
use xipflash_core::security::{REGION_COUNT, REGION_SIZE};
use xipflash_core::spi::opcodes;

use crate::config::{SimChipConfig, TimingWindow};
use crate::error::{Result, SimError};

/// Counters for conditions a correct driver never causes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChipStats {
    /// Resumes on an erratum part without the target read just before
    pub erratum_hits: u32,
    /// Array reads while a program or erase was running
    pub busy_reads: u32,
    /// Quad reads with the quad enable bit clear
    pub quad_without_qe: u32,
    /// Program or erase refused by block protection
    pub rejected_writes: u32,
    /// Commands dropped because the chip was busy or powered down
    pub ignored_commands: u32,
    /// Accepted suspend opcodes
    pub suspends: u32,
    /// Accepted resume opcodes
    pub resumes: u32,
    /// Completed page programs
    pub programs: u32,
    /// Completed sector and block erases
    pub erases: u32,
}

/// One finished chip-select window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// First byte shifted in
    pub opcode: u8,
    /// Decoded address, for addressed opcodes
    pub address: Option<u32>,
    /// Data bytes written after the header
    pub data_out: usize,
    /// Bytes read back
    pub data_in: usize,
    /// Widest I/O setting seen in the window
    pub lines: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Effect {
    Erase { addr: u32, len: u32 },
    Program { addr: u32, data: Vec<u8> },
    RegionErase { region: usize },
    RegionProgram { region: usize, offset: usize, data: Vec<u8> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    Running { deadline: u64 },
    Suspended { remaining: u64, settle_at: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Pending {
    effect: Effect,
    target: u32,
    progress: Progress,
    corrupt_target: bool,
}

impl Pending {
    fn is_erase(&self) -> bool {
        matches!(self.effect, Effect::Erase { .. } | Effect::RegionErase { .. })
    }
}

/// Bytes of the target flipped by an unguarded resume on erratum parts
const ERRATUM_BYTES: u32 = 4;

/// The emulated chip
#[derive(Debug, Clone)]
pub struct SimChip {
    config: SimChipConfig,
    size: u32,
    data: Vec<u8>,
    regions: [[u8; REGION_SIZE as usize]; REGION_COUNT as usize],
    status: [u8; 3],
    wel: bool,
    four_byte: bool,
    ext_addr: u8,
    vcr: [u8; 8],
    powered_down: bool,
    pending: Option<Pending>,
    last: Option<(u8, Option<u32>)>,
    tx: Vec<u8>,
    tx_read: usize,
    tx_lines: u8,
    stats: ChipStats,
}

fn is_array_read(opcode: u8) -> bool {
    matches!(
        opcode,
        opcodes::FAST_READ
            | 0x0C
            | opcodes::DOR
            | 0x3C
            | opcodes::QOR
            | 0x6C
            | opcodes::DIOR
            | 0xBC
            | opcodes::QIOR
            | 0xEC
    )
}

fn is_quad_read(opcode: u8) -> bool {
    matches!(opcode, opcodes::QOR | 0x6C | opcodes::QIOR | 0xEC)
}

fn dummy_len(opcode: u8) -> usize {
    match opcode {
        opcodes::QIOR | 0xEC => 3,
        opcodes::RDSCUR | opcodes::RDUID | opcodes::RDVCR => 1,
        op if is_array_read(op) => 1,
        _ => 0,
    }
}

impl SimChip {
    /// Erased chip with power-on status registers
    pub fn new(config: SimChipConfig) -> Result<Self> {
        let size = config
            .chip_id()
            .size()
            .ok_or(SimError::InvalidChipId(config.id))?;
        Ok(Self {
            size,
            data: vec![ERASE_VALUE; size as usize],
            regions: [[ERASE_VALUE; REGION_SIZE as usize]; REGION_COUNT as usize],
            status: config.status,
            wel: false,
            four_byte: false,
            ext_addr: 0,
            vcr: [0xFF; 8],
            powered_down: false,
            pending: None,
            last: None,
            tx: Vec::new(),
            tx_read: 0,
            tx_lines: 1,
            stats: ChipStats::default(),
            config,
        })
    }

    /// Copy `image` into the array at `offset`
    pub fn load(&mut self, offset: u32, image: &[u8]) -> Result<()> {
        let start = offset as usize;
        let end = start
            .checked_add(image.len())
            .filter(|&end| end <= self.data.len())
            .ok_or(SimError::ImageTooLarge {
                len: image.len(),
                size: self.size,
            })?;
        self.data[start..end].copy_from_slice(image);
        Ok(())
    }

    /// Chip model
    pub fn config(&self) -> &SimChipConfig {
        &self.config
    }

    /// Replace the stable delay chain window
    pub fn set_timing(&mut self, timing: TimingWindow) {
        self.config.timing = timing;
    }

    /// Array size in bytes
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Array contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Security region contents
    pub fn region(&self, index: usize) -> &[u8] {
        &self.regions[index]
    }

    /// Misbehavior counters
    pub fn stats(&self) -> &ChipStats {
        &self.stats
    }

    /// Status registers as the chip would report them at `now`
    pub fn status(&self, now: u64) -> [u8; 3] {
        let mut sr1 = self.status[0] & !(opcodes::SR1_WIP | opcodes::SR1_WEL);
        if self.busy(now) {
            sr1 |= opcodes::SR1_WIP;
        }
        if self.wel {
            sr1 |= opcodes::SR1_WEL;
        }
        let mut sr2 = self.status[1];
        if let Some(p) = &self.pending {
            if matches!(p.progress, Progress::Suspended { .. }) {
                sr2 |= if p.is_erase() {
                    opcodes::SR2_SUS1
                } else {
                    opcodes::SR2_SUS2
                };
            }
        }
        [sr1, sr2, self.status[2]]
    }

    /// Whether WIP reads as set
    pub fn busy(&self, now: u64) -> bool {
        match self.pending.as_ref().map(|p| p.progress) {
            Some(Progress::Running { .. }) => true,
            Some(Progress::Suspended { settle_at, .. }) => now < settle_at,
            None => false,
        }
    }

    /// Whether a program or erase is running (not suspended)
    ///
    /// Instruction fetch from the mapped window stalls in this state.
    pub fn running(&self) -> bool {
        matches!(
            self.pending.as_ref().map(|p| p.progress),
            Some(Progress::Running { .. })
        )
    }

    /// Whether an operation is parked by suspend
    pub fn suspended(&self) -> bool {
        matches!(
            self.pending.as_ref().map(|p| p.progress),
            Some(Progress::Suspended { .. })
        )
    }

    /// 4-byte address mode
    pub fn four_byte(&self) -> bool {
        self.four_byte
    }

    /// Extended address register
    pub fn ext_addr(&self) -> u8 {
        self.ext_addr
    }

    /// One volatile configuration register byte
    pub fn vcr(&self, addr: usize) -> u8 {
        self.vcr[addr & 7]
    }

    /// Deep power-down
    pub fn powered_down(&self) -> bool {
        self.powered_down
    }

    /// Quad enable bit as this vendor places it
    pub fn quad_enabled(&self) -> bool {
        if self.config.chip_id().manufacturer() == MFR_MACRONIX {
            self.status[0] & opcodes::SR1_QE_MXIC != 0
        } else {
            self.status[1] & opcodes::SR2_QE != 0
        }
    }

    /// Park an erase as if suspended before a reset
    pub fn inject_suspended_erase(&mut self, addr: u32, len: u32, remaining_us: u64) {
        self.pending = Some(Pending {
            effect: Effect::Erase { addr, len },
            target: addr,
            progress: Progress::Suspended {
                remaining: remaining_us,
                settle_at: 0,
            },
            corrupt_target: false,
        });
    }

    /// Complete a running operation whose time is up
    pub(crate) fn tick(&mut self, now: u64) {
        let done = matches!(
            self.pending.as_ref().map(|p| p.progress),
            Some(Progress::Running { deadline }) if now >= deadline
        );
        if done {
            if let Some(p) = self.pending.take() {
                self.complete(p);
            }
        }
    }

    fn complete(&mut self, p: Pending) {
        match p.effect {
            Effect::Erase { addr, len } => {
                self.data[addr as usize..(addr + len) as usize].fill(ERASE_VALUE);
                self.stats.erases += 1;
            }
            Effect::Program { addr, data } => {
                let base = addr & !(PAGE_SIZE - 1);
                for (i, b) in data.iter().enumerate() {
                    let at = base | ((addr + i as u32) & (PAGE_SIZE - 1));
                    self.data[at as usize] &= b;
                }
                self.stats.programs += 1;
            }
            Effect::RegionErase { region } => self.regions[region].fill(ERASE_VALUE),
            Effect::RegionProgram {
                region,
                offset,
                data,
            } => {
                for (i, b) in data.iter().enumerate() {
                    self.regions[region][(offset + i) % REGION_SIZE as usize] &= b;
                }
            }
        }
        if p.corrupt_target {
            let start = p.target as usize;
            let end = (p.target + ERRATUM_BYTES).min(self.size) as usize;
            for b in &mut self.data[start..end] {
                *b ^= 0x01;
            }
        }
        self.wel = false;
    }

    fn address_len(&self, opcode: u8) -> usize {
        match opcode {
            0x0C | 0x3C | 0x6C | 0xBC | 0xEC | opcodes::PP_4B | opcodes::SE_21 | opcodes::BE_DC => 4,
            opcodes::FAST_READ
            | opcodes::DOR
            | opcodes::QOR
            | opcodes::DIOR
            | opcodes::QIOR
            | opcodes::PP
            | opcodes::SE_20
            | opcodes::BE_D8
            | opcodes::ERSR
            | opcodes::PRSR
            | opcodes::RDSCUR
            | opcodes::RDUID
            | opcodes::RDVCR
            | opcodes::WRVCR => {
                if self.four_byte {
                    4
                } else {
                    3
                }
            }
            _ => 0,
        }
    }

    /// Opcode, address and header length once the header is complete
    fn header(&self) -> Option<(u8, Option<u32>, usize)> {
        let opcode = *self.tx.first()?;
        let alen = self.address_len(opcode);
        let len = 1 + alen + dummy_len(opcode);
        if self.tx.len() < len {
            return None;
        }
        let address = (alen > 0).then(|| {
            let raw = self.tx[1..1 + alen]
                .iter()
                .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
            if alen == 3 {
                (u32::from(self.ext_addr) << 24) | raw
            } else {
                raw
            }
        });
        Some((opcode, address, len))
    }

    fn array_offset(&self, addr: u32) -> u32 {
        addr & (self.size - 1)
    }

    /// Chip select asserted
    pub(crate) fn begin(&mut self) {
        self.tx.clear();
        self.tx_read = 0;
        self.tx_lines = 1;
    }

    /// Bytes shifted into the chip
    pub(crate) fn write(&mut self, bytes: &[u8], lines: u8) {
        self.tx.extend_from_slice(bytes);
        self.tx_lines = self.tx_lines.max(lines);
    }

    /// Bytes shifted out of the chip
    pub(crate) fn read(&mut self, buf: &mut [u8], lines: u8, now: u64) {
        self.tx_lines = self.tx_lines.max(lines);
        self.tick(now);
        let Some((opcode, address, _)) = self.header() else {
            buf.fill(0xFF);
            return;
        };
        let start = self.tx_read;
        self.tx_read += buf.len();

        if self.powered_down {
            buf.fill(0xFF);
            return;
        }
        if self.running()
            && !matches!(opcode, opcodes::RDSR | opcodes::RDSR2 | opcodes::RDSR3)
        {
            self.stats.busy_reads += 1;
            buf.fill(0xFF);
            return;
        }

        match opcode {
            opcodes::RDID => {
                let id = self.config.id.to_le_bytes();
                for (i, b) in buf.iter_mut().enumerate() {
                    *b = id[(start + i) % 3];
                }
            }
            opcodes::RDSR | opcodes::RDSR2 | opcodes::RDSR3 => {
                let reg = match opcode {
                    opcodes::RDSR => 0,
                    opcodes::RDSR2 => 1,
                    _ => 2,
                };
                buf.fill(self.status(now)[reg]);
            }
            op if is_array_read(op) => {
                if is_quad_read(op) && !self.quad_enabled() {
                    self.stats.quad_without_qe += 1;
                    buf.fill(0xFF);
                    return;
                }
                let base = address.unwrap_or(0) as usize + start;
                for (i, b) in buf.iter_mut().enumerate() {
                    *b = self.data[self.array_offset((base + i) as u32) as usize];
                }
            }
            opcodes::RDSCUR => {
                let addr = address.unwrap_or(0);
                let region = ((addr >> 12) as usize) % REGION_COUNT as usize;
                let offset = (addr as usize & (REGION_SIZE as usize - 1)) + start;
                for (i, b) in buf.iter_mut().enumerate() {
                    *b = self.regions[region][(offset + i) % REGION_SIZE as usize];
                }
            }
            opcodes::RDUID => {
                for (i, b) in buf.iter_mut().enumerate() {
                    *b = self.config.unique_id[(start + i) % self.config.unique_id.len()];
                }
            }
            opcodes::RDVCR => {
                let addr = address.unwrap_or(0) as usize + start;
                for (i, b) in buf.iter_mut().enumerate() {
                    *b = self.vcr[(addr + i) & 7];
                }
            }
            _ => buf.fill(0xFF),
        }
    }

    fn protected(&self, addr: u32, len: u32) -> bool {
        let Some(pattern) = quirks::lookup(self.config.chip_id()).and_then(|q| q.protect) else {
            return false;
        };
        let on = self.status[0] & pattern.sr1_mask == pattern.sr1_value
            && self.status[1] & pattern.sr2_mask == pattern.sr2_value;
        on && addr < self.config.protected_len && len > 0
    }

    fn start(&mut self, effect: Effect, target: u32, duration_us: u32, now: u64) {
        self.pending = Some(Pending {
            effect,
            target,
            progress: Progress::Running {
                deadline: now + u64::from(duration_us),
            },
            corrupt_target: false,
        });
    }

    fn start_erase(&mut self, addr: u32, unit: u32, duration_us: u32, now: u64) {
        let addr = self.array_offset(addr) & !(unit - 1);
        if self.protected(addr, unit) {
            self.stats.rejected_writes += 1;
            self.wel = false;
            return;
        }
        self.start(Effect::Erase { addr, len: unit }, addr, duration_us, now);
    }

    fn suspend(&mut self, now: u64) {
        if !self.config.suspend_supported {
            return;
        }
        let latency = u64::from(self.config.suspend_latency_us);
        if let Some(p) = self.pending.as_mut() {
            if let Progress::Running { deadline } = p.progress {
                p.progress = Progress::Suspended {
                    remaining: deadline.saturating_sub(now),
                    settle_at: now + latency,
                };
                self.stats.suspends += 1;
            }
        }
    }

    fn resume(&mut self, now: u64) {
        let target = self.pending.as_ref().map(|p| p.target);
        let guarded = match self.last {
            Some((op, Some(addr))) => is_array_read(op) && Some(addr) == target,
            _ => false,
        };
        let erratum = self.config.has_resume_erratum();
        if let Some(p) = self.pending.as_mut() {
            if let Progress::Suspended { remaining, .. } = p.progress {
                p.progress = Progress::Running {
                    deadline: now + remaining,
                };
                if erratum && !guarded {
                    p.corrupt_target = true;
                    self.stats.erratum_hits += 1;
                }
                self.stats.resumes += 1;
            }
        }
    }

    /// Chip select released: act on the command
    pub(crate) fn end(&mut self, now: u64) -> Option<Transaction> {
        self.tick(now);
        let opcode = *self.tx.first()?;
        let header = self.header();
        let address = header.and_then(|(_, a, _)| a);
        let data: Vec<u8> = header
            .map(|(_, _, len)| self.tx[len..].to_vec())
            .unwrap_or_default();
        let record = Transaction {
            opcode,
            address,
            data_out: data.len(),
            data_in: self.tx_read,
            lines: self.tx_lines,
        };
        if opcode == opcodes::CONTINUOUS_READ_RESET {
            self.last = Some((opcode, None));
            return Some(record);
        }

        let status_only = matches!(
            opcode,
            opcodes::RDSR | opcodes::RDSR2 | opcodes::RDSR3 | opcodes::SUSPEND
        );
        if (self.powered_down && opcode != opcodes::RDP) || (self.running() && !status_only) {
            self.stats.ignored_commands += 1;
            return Some(record);
        }
        if self.four_byte {
            if let Some(addr) = address {
                if self.address_len(opcode) == 4 {
                    self.ext_addr = (addr >> 24) as u8;
                }
            }
        }

        let programming = matches!(
            opcode,
            opcodes::PP
                | opcodes::PP_4B
                | opcodes::SE_20
                | opcodes::SE_21
                | opcodes::BE_D8
                | opcodes::BE_DC
                | opcodes::ERSR
                | opcodes::PRSR
        );
        if programming && self.pending.is_some() {
            // Program/erase during suspend is not modelled
            self.stats.ignored_commands += 1;
            return Some(record);
        }

        match opcode {
            opcodes::WREN => self.wel = true,
            opcodes::WRDI => self.wel = false,
            opcodes::WRSR if self.wel => {
                if let Some(&sr1) = data.first() {
                    self.status[0] = sr1 & !(opcodes::SR1_WIP | opcodes::SR1_WEL);
                }
                if let Some(&sr2) = data.get(1) {
                    self.status[1] = sr2 & !(opcodes::SR2_SUS1 | opcodes::SR2_SUS2);
                }
                self.wel = false;
            }
            opcodes::WRSR2 if self.wel && self.config.wrsr2_supported => {
                if let Some(&sr2) = data.first() {
                    self.status[1] = sr2 & !(opcodes::SR2_SUS1 | opcodes::SR2_SUS2);
                }
                self.wel = false;
            }
            opcodes::WRSR3 if self.wel => {
                if let Some(&sr3) = data.first() {
                    self.status[2] = sr3;
                }
                self.wel = false;
            }
            opcodes::PP | opcodes::PP_4B if self.wel => {
                let addr = self.array_offset(address.unwrap_or(0));
                if self.protected(addr, data.len() as u32) {
                    self.stats.rejected_writes += 1;
                    self.wel = false;
                } else {
                    let len = data.len().min(PAGE_SIZE as usize);
                    let effect = Effect::Program {
                        addr,
                        data: data[..len].to_vec(),
                    };
                    self.start(effect, addr, self.config.page_program_us, now);
                }
            }
            opcodes::SE_20 | opcodes::SE_21 if self.wel => {
                self.start_erase(address.unwrap_or(0), SECTOR_SIZE, self.config.sector_erase_us, now)
            }
            opcodes::BE_D8 | opcodes::BE_DC if self.wel => {
                self.start_erase(address.unwrap_or(0), BLOCK_SIZE, self.config.block_erase_us, now)
            }
            opcodes::ERSR if self.wel => {
                let addr = address.unwrap_or(0);
                let region = ((addr >> 12) as usize) % REGION_COUNT as usize;
                self.start(
                    Effect::RegionErase { region },
                    addr,
                    self.config.sector_erase_us,
                    now,
                );
            }
            opcodes::PRSR if self.wel => {
                let addr = address.unwrap_or(0);
                let effect = Effect::RegionProgram {
                    region: ((addr >> 12) as usize) % REGION_COUNT as usize,
                    offset: addr as usize & (REGION_SIZE as usize - 1),
                    data: data.clone(),
                };
                self.start(effect, addr, self.config.page_program_us, now);
            }
            opcodes::EN4B => self.four_byte = true,
            opcodes::EX4B => self.four_byte = false,
            opcodes::WREAR if self.wel => {
                self.ext_addr = data.first().copied().unwrap_or(0);
                self.wel = false;
            }
            opcodes::WRVCR if self.wel => {
                if let Some(&v) = data.first() {
                    self.vcr[address.unwrap_or(0) as usize & 7] = v;
                }
                self.wel = false;
            }
            opcodes::SUSPEND => self.suspend(now),
            opcodes::RESUME => self.resume(now),
            opcodes::DP => self.powered_down = true,
            opcodes::RDP => self.powered_down = false,
            _ => {}
        }
        self.last = Some((opcode, address));
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chip() -> SimChip {
        SimChip::new(SimChipConfig::default()).unwrap()
    }

    fn run(c: &mut SimChip, bytes: &[u8], now: u64) -> Transaction {
        c.begin();
        c.write(bytes, 1);
        c.end(now).unwrap()
    }

    fn read(c: &mut SimChip, header: &[u8], len: usize, now: u64) -> Vec<u8> {
        let mut buf = vec![0; len];
        c.begin();
        c.write(header, 1);
        c.read(&mut buf, 1, now);
        c.end(now);
        buf
    }

    #[test]
    fn test_rdid() {
        let mut c = chip();
        assert_eq!(read(&mut c, &[opcodes::RDID], 3, 0), [0xC8, 0x60, 0x15]);
    }

    #[test]
    fn test_program_needs_wel_and_time() {
        let mut c = chip();
        run(&mut c, &[opcodes::PP, 0, 0x10, 0, 0x12, 0x34], 0);
        assert_eq!(c.data()[0x1000], 0xFF);

        run(&mut c, &[opcodes::WREN], 0);
        run(&mut c, &[opcodes::PP, 0, 0x10, 0, 0x12, 0x34], 0);
        assert!(c.busy(100));
        c.tick(400);
        assert!(!c.busy(400));
        assert_eq!(&c.data()[0x1000..0x1002], &[0x12, 0x34]);
        assert_eq!(c.status(400)[0] & opcodes::SR1_WEL, 0);
    }

    #[test]
    fn test_program_wraps_inside_page() {
        let mut c = chip();
        run(&mut c, &[opcodes::WREN], 0);
        run(&mut c, &[opcodes::PP, 0, 0, 0xFF, 0x11, 0x22], 0);
        c.tick(1000);
        assert_eq!(c.data()[0xFF], 0x11);
        assert_eq!(c.data()[0x00], 0x22);
        assert_eq!(c.data()[0x100], 0xFF);
    }

    #[test]
    fn test_suspend_keeps_old_data_readable() {
        let mut c = chip();
        c.load(0, &[0u8; 8192]).unwrap();
        run(&mut c, &[opcodes::WREN], 0);
        run(&mut c, &[opcodes::SE_20, 0, 0x10, 0], 0);
        assert_eq!(read(&mut c, &[opcodes::FAST_READ, 0, 0, 0, 0], 1, 10), [0xFF]);
        assert_eq!(c.stats().busy_reads, 1);

        run(&mut c, &[opcodes::SUSPEND], 100);
        assert!(c.busy(110));
        assert!(!c.busy(120));
        assert_eq!(c.status(120)[1] & opcodes::SR2_SUS1, opcodes::SR2_SUS1);
        assert_eq!(read(&mut c, &[opcodes::FAST_READ, 0, 0x10, 0, 0], 2, 200), [0, 0]);

        run(&mut c, &[opcodes::RESUME], 1000);
        c.tick(1000 + 29_900);
        assert!(c.data()[0x1000..0x2000].iter().all(|&b| b == 0xFF));
        assert!(c.data()[..0x1000].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_erratum_resume_without_read_corrupts_target() {
        let mut c = SimChip::new(SimChipConfig::with_id(0x17400B)).unwrap();
        run(&mut c, &[opcodes::WREN], 0);
        run(&mut c, &[opcodes::SE_20, 0, 0x20, 0], 0);
        run(&mut c, &[opcodes::SUSPEND], 10);
        run(&mut c, &[opcodes::RESUME], 100);
        c.tick(100_000);
        assert_eq!(c.stats().erratum_hits, 1);
        assert_eq!(&c.data()[0x2000..0x2005], &[0xFE, 0xFE, 0xFE, 0xFE, 0xFF]);
    }

    #[test]
    fn test_erratum_guarded_by_target_read() {
        let mut c = SimChip::new(SimChipConfig::with_id(0x17400B)).unwrap();
        run(&mut c, &[opcodes::WREN], 0);
        run(&mut c, &[opcodes::SE_20, 0, 0x20, 0], 0);
        run(&mut c, &[opcodes::SUSPEND], 10);
        read(&mut c, &[opcodes::FAST_READ, 0, 0x20, 0, 0], 4, 50);
        run(&mut c, &[opcodes::RESUME], 100);
        assert_eq!(c.stats().erratum_hits, 0);
    }

    #[test]
    fn test_quad_read_needs_qe() {
        let mut c = chip();
        read(&mut c, &[opcodes::QOR, 0, 0, 0, 0], 4, 0);
        assert_eq!(c.stats().quad_without_qe, 1);
        run(&mut c, &[opcodes::WREN], 0);
        run(&mut c, &[opcodes::WRSR2, opcodes::SR2_QE], 0);
        assert!(c.quad_enabled());
    }

    #[test]
    fn test_wrsr2_unsupported_keeps_wel() {
        let mut c = SimChip::new(SimChipConfig {
            wrsr2_supported: false,
            ..Default::default()
        })
        .unwrap();
        run(&mut c, &[opcodes::WREN], 0);
        run(&mut c, &[opcodes::WRSR2, opcodes::SR2_QE], 0);
        assert!(!c.quad_enabled());
        run(&mut c, &[opcodes::WRSR, 0, opcodes::SR2_QE], 0);
        assert!(c.quad_enabled());
    }

    #[test]
    fn test_protected_range_rejects_erase() {
        let mut c = chip();
        c.load(0, &[0u8; 4]).unwrap();
        run(&mut c, &[opcodes::WREN], 0);
        run(&mut c, &[opcodes::WRSR, 0x1B << 2, 0], 0);
        run(&mut c, &[opcodes::WREN], 0);
        run(&mut c, &[opcodes::SE_20, 0, 0, 0], 0);
        c.tick(100_000);
        assert_eq!(c.stats().rejected_writes, 1);
        assert_eq!(c.data()[0], 0);
    }

    #[test]
    fn test_power_down_ignores_commands() {
        let mut c = chip();
        run(&mut c, &[opcodes::DP], 0);
        assert_eq!(read(&mut c, &[opcodes::RDID], 3, 0), [0xFF; 3]);
        run(&mut c, &[opcodes::RDP], 0);
        assert_eq!(read(&mut c, &[opcodes::RDID], 3, 0), [0xC8, 0x60, 0x15]);
    }

    #[test]
    fn test_four_byte_mode_latches_ext_addr() {
        let mut c = SimChip::new(SimChipConfig::with_id(0x192085)).unwrap();
        run(&mut c, &[opcodes::EN4B], 0);
        read(&mut c, &[0x0C, 0x01, 0, 0, 0, 0], 1, 0);
        assert_eq!(c.ext_addr(), 1);
        run(&mut c, &[opcodes::EX4B], 0);
        assert_eq!(c.ext_addr(), 1);
        run(&mut c, &[opcodes::WREN], 0);
        run(&mut c, &[opcodes::WREAR, 0], 0);
        assert_eq!(c.ext_addr(), 0);
    }
}
