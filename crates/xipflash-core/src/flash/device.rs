//! The flash device handle

use embedded_hal::digital::OutputPin;

use crate::bus::{Bus, ChipSelect, SpiController, SpiTransport};
use crate::calibration::{self, dvfs, Calibration, SweepConfig, SweepStep, SweepTarget};
use crate::chip::{
    ChipFlags, ChipId, ChipState, PendingOp, GD25B512ME, PAGE_SIZE, SECTOR_SIZE,
};
use crate::config::{BoardConfig, Capabilities};
use crate::dualcs::{DualChipMap, Segment};
use crate::error::{ContractViolation, Error, Result};
use crate::platform::{ExecContext, Platform};
use crate::protocol::{self, EraseKind, EraseSteps, PageChunks, StatusReg, Wait};
use crate::security::{self, SecurityRegion, UNIQUE_ID_LEN};
use crate::spi::{opcodes, SpiCommand};
use crate::suspend;
use crate::wp::{self, ProtectionChange};
use crate::xip::{GateUser, XipGate};

use super::{FlashParameters, PageLayout};

/// Longest single read on the GPIO chip select
const SECONDARY_READ_CHUNK: usize = 0x8000;
const SECONDARY_POLL_MS: u32 = 2;
const SECONDARY_TIMEOUT_MS: u32 = 10_000;
const SECONDARY_WAKE_US: u32 = 100;

/// GD25B512ME volatile configuration: XIP mode byte
const VCR_XIP_ADDR: u32 = 6;
const VCR_XIP_ENABLE: u8 = 0xFE;

/// Busy poll for the GPIO chip select, sleeping between polls when the
/// caller may block
fn wait_ready_sleeping<T: SpiTransport + ?Sized>(t: &mut T) -> Result<()> {
    let mut waited_ms = 0;
    while protocol::is_busy(t)? {
        if waited_ms >= SECONDARY_TIMEOUT_MS {
            return Err(Error::Timeout);
        }
        if t.context().may_block() {
            t.sleep_ms(SECONDARY_POLL_MS);
        } else {
            t.delay_us(SECONDARY_POLL_MS * 1000);
        }
        waited_ms += SECONDARY_POLL_MS;
    }
    Ok(())
}

/// Serial NOR flash on one controller, one or two chips
///
/// Presents a flat byte address space. Chip 0 is the execute-in-place
/// chip; chip 1, if present, sits behind a GPIO chip select and follows
/// chip 0 in the address space.
pub struct NorFlash<C, G, P> {
    bus: Bus<C, G, P>,
    config: BoardConfig,
    chips: [Option<ChipState>; 2],
    map: DualChipMap,
    gate: &'static XipGate,
}

impl<C, G, P> NorFlash<C, G, P>
where
    C: SpiController,
    G: OutputPin,
    P: Platform,
{
    /// Create an uninitialized device; call [`init`](Self::init) next
    pub fn new(bus: Bus<C, G, P>, config: BoardConfig, gate: &'static XipGate) -> Self {
        Self {
            bus,
            config,
            chips: [None, None],
            map: DualChipMap::single(0),
            gate,
        }
    }

    /// Probe and configure the chip(s)
    pub fn init(&mut self) -> Result<()> {
        self.config.validate()?;
        self.bus.select(ChipSelect::Primary);
        let chip = self.probe(ChipSelect::Primary)?;
        let size0 = chip.size;
        self.chips[0] = Some(chip);
        self.map = DualChipMap::single(size0);

        if self.config.has(Capabilities::DUAL_CS) {
            self.bus.select(ChipSelect::Secondary);
            let res = self.wake_secondary().and_then(|()| self.probe(ChipSelect::Secondary));
            self.bus.select(ChipSelect::Primary);
            match res {
                Ok(chip) => {
                    let size1 = self.config.secondary_size.unwrap_or(chip.size);
                    self.map = DualChipMap { size0, size1 };
                    self.chips[1] = Some(chip);
                }
                Err(Error::ChipNotFound) => {
                    log::warn!("no chip answered on the second chip select");
                }
                Err(e) => return Err(e),
            }
        }

        self.bus
            .platform_mut()
            .set_flash_clock_mhz(ChipSelect::Primary, self.config.flash_clock_mhz);
        Ok(())
    }

    fn wake_secondary(&mut self) -> Result<()> {
        self.bus.execute(&mut SpiCommand::simple(opcodes::RDP))?;
        self.bus.delay_us(SECONDARY_WAKE_US);
        self.bus
            .execute(&mut SpiCommand::simple(opcodes::CONTINUOUS_READ_RESET))
    }

    /// Identify the chip on the selected chip select and bring it into
    /// operating mode
    fn probe(&mut self, cs: ChipSelect) -> Result<ChipState> {
        let id = protocol::read_chip_id(&mut self.bus)?;
        if id.is_absent() {
            return Err(Error::ChipNotFound);
        }
        let size = id.size().ok_or(Error::ChipNotFound)?;
        let mut chip = ChipState::new(cs, id, size);
        let quirk = chip.quirk();

        if self.config.has(Capabilities::SUSPEND)
            && suspend::recover_at_init(&mut self.bus, &mut chip)?
        {
            log::warn!("chip {}: finished an operation suspended before reset", id);
        }

        chip.vdd_mv = self.config.vdd_mv;
        if let Some(delay) = quirk.delay_for(chip.vdd_mv) {
            self.bus.set_delay_chain(cs, delay);
        }

        if self.bus.bus_width() == 4
            && protocol::enable_quad(&mut self.bus, &mut chip)?
            && id == GD25B512ME
        {
            protocol::write_volatile_config(&mut self.bus, &chip, VCR_XIP_ADDR, VCR_XIP_ENABLE)?;
            let vcr = protocol::read_volatile_config(&mut self.bus, &chip, VCR_XIP_ADDR)?;
            if vcr != VCR_XIP_ENABLE {
                log::warn!("chip {}: XIP mode byte reads back 0x{:02x}", id, vcr);
            }
        }

        if id.needs_4byte() {
            protocol::enter_4byte_mode(&mut self.bus, &mut chip)?;
        }

        let sr1 = protocol::read_status(&mut self.bus, StatusReg::Sr1)?;
        let sr2 = protocol::read_status(&mut self.bus, StatusReg::Sr2)?;
        let sr3 = protocol::read_status(&mut self.bus, StatusReg::Sr3)?;
        log::info!(
            "chip {} ({}) on {:?}: {} KiB, {:?} addressing, delay chain {}, status {:02x} {:02x} {:02x}",
            id,
            quirk.name,
            cs,
            size / 1024,
            chip.address_mode,
            self.bus.delay_chain(cs),
            sr1,
            sr2,
            sr3
        );
        Ok(chip)
    }

    /// Run `f` against one chip with the bus routed to it
    ///
    /// The per-chip lock is taken in task context only. An interrupt
    /// caller first completes any operation a preempted task left
    /// suspended on the chip.
    fn with_chip<R>(
        &mut self,
        cs: ChipSelect,
        f: impl FnOnce(&mut Bus<C, G, P>, &mut ChipState, &'static XipGate) -> Result<R>,
    ) -> Result<R> {
        let gate = self.gate;
        let Some(chip) = self.chips[cs.index()].as_mut() else {
            return Err(Error::ChipNotPresent);
        };
        let blocking = self.bus.context().may_block();
        if blocking {
            self.bus.platform_mut().lock(cs);
        }
        self.bus.select(cs);

        let res = (|| {
            suspend::finish_pending(&mut self.bus, chip)?;
            if chip.flags.contains(ChipFlags::POWERED_DOWN) {
                protocol::power_up(&mut self.bus)?;
                chip.flags.remove(ChipFlags::POWERED_DOWN);
            }
            f(&mut self.bus, chip, gate)
        })();

        self.bus.select(ChipSelect::Primary);
        if blocking {
            self.bus.platform_mut().unlock(cs);
        }
        res
    }

    fn check_write_context(&self) -> Result<()> {
        if self.bus.context() == ExecContext::Interrupt
            && !self.config.has(Capabilities::WRITE_FROM_INTERRUPT)
        {
            log::error!("flash not allow write in irq");
            return Err(ContractViolation::WriteFromInterrupt.into());
        }
        Ok(())
    }

    fn segments(&self, offset: u32, len: usize) -> Result<heapless::Vec<Segment, 2>> {
        let len32 = u32::try_from(len).map_err(|_| ContractViolation::OutOfBounds {
            offset,
            len: u32::MAX,
        })?;
        self.map.route(offset, len32)
    }

    /// Read `buf.len()` bytes at `offset`
    pub fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()> {
        for seg in self.segments(offset, buf.len())? {
            let out = &mut buf[seg.buf_offset..seg.buf_offset + seg.len as usize];
            self.with_chip(seg.cs, |bus, chip, _| match seg.cs {
                ChipSelect::Primary => protocol::read(bus, chip, seg.local_offset, out),
                ChipSelect::Secondary => {
                    let mut at = seg.local_offset;
                    for chunk in out.chunks_mut(SECONDARY_READ_CHUNK) {
                        protocol::read(bus, chip, at, chunk)?;
                        at += chunk.len() as u32;
                    }
                    Ok(())
                }
            })?;
        }
        Ok(())
    }

    /// Program `data` at `offset`
    ///
    /// The range must be erased; NOR programming only clears bits.
    pub fn write(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        self.check_write_context()?;
        for seg in self.segments(offset, data.len())? {
            let src = &data[seg.buf_offset..seg.buf_offset + seg.len as usize];
            self.with_chip(seg.cs, |bus, chip, gate| {
                for (addr, start, len) in PageChunks::new(seg.local_offset, src.len(), PAGE_SIZE) {
                    gate.wait_idle(bus, GateUser::Write);
                    let page = &src[start..start + len];
                    match seg.cs {
                        ChipSelect::Primary => {
                            protocol::program_page(bus, chip, addr, page, Wait::Ready)?
                        }
                        ChipSelect::Secondary => {
                            protocol::program_page(bus, chip, addr, page, Wait::NoWait)?;
                            wait_ready_sleeping(bus)?;
                        }
                    }
                }
                Ok(())
            })?;
            if seg.cs == ChipSelect::Primary {
                self.bus
                    .platform_mut()
                    .invalidate_cache(seg.local_offset, seg.len);
            }
        }
        Ok(())
    }

    /// Erase `len` bytes at `offset`; both must be 4 KiB aligned
    ///
    /// On chip 0, erases below 256 KiB issued from task context run under
    /// suspend so code fetch keeps going while the chip is busy.
    pub fn erase(&mut self, offset: u32, len: u32) -> Result<()> {
        self.check_write_context()?;
        protocol::check_erase_alignment(offset, len)?;
        let use_suspend = self.config.has(Capabilities::SUSPEND)
            && suspend::erase_may_suspend(len, self.bus.context());

        for seg in self.map.route(offset, len)? {
            log::debug!(
                "erase {:?} 0x{:08x}+0x{:x}{}",
                seg.cs,
                seg.local_offset,
                seg.len,
                if use_suspend { " (suspendable)" } else { "" }
            );
            self.with_chip(seg.cs, |bus, chip, gate| match seg.cs {
                ChipSelect::Primary if use_suspend => {
                    chip.flags.insert(ChipFlags::NO_WAIT_READY);
                    let res = erase_suspendable(bus, chip, gate, seg.local_offset, seg.len);
                    chip.flags.remove(ChipFlags::NO_WAIT_READY);
                    res
                }
                ChipSelect::Primary => {
                    for (addr, kind) in EraseSteps::new(seg.local_offset, seg.len)? {
                        gate.wait_idle(bus, GateUser::Erase);
                        protocol::erase_unit(bus, chip, kind, addr, Wait::Ready)?;
                    }
                    Ok(())
                }
                ChipSelect::Secondary => {
                    for (addr, kind) in EraseSteps::new(seg.local_offset, seg.len)? {
                        gate.wait_idle(bus, GateUser::Erase);
                        protocol::erase_unit(bus, chip, kind, addr, Wait::NoWait)?;
                        wait_ready_sleeping(bus)?;
                    }
                    Ok(())
                }
            })?;
            if seg.cs == ChipSelect::Primary {
                self.bus
                    .platform_mut()
                    .invalidate_cache(seg.local_offset, seg.len);
            }
        }
        Ok(())
    }

    /// Enable or disable block protection on every chip
    ///
    /// Chips without a protect pattern are left alone.
    pub fn set_write_protection(&mut self, enable: bool) -> Result<[Option<ProtectionChange>; 2]> {
        let mut changes = [None, None];
        for cs in [ChipSelect::Primary, ChipSelect::Secondary] {
            if self.chips[cs.index()].is_some() {
                changes[cs.index()] =
                    Some(self.with_chip(cs, |bus, chip, _| wp::set_protection(bus, chip, enable))?);
            }
        }
        Ok(changes)
    }

    fn security_region(&self, index: u8) -> Result<SecurityRegion> {
        if !self.config.has(Capabilities::SECURITY_REGIONS) {
            return Err(Error::NotSupported);
        }
        SecurityRegion::new(index)
    }

    /// Erase security region `index` on chip 0
    pub fn erase_security_region(&mut self, index: u8) -> Result<()> {
        self.check_write_context()?;
        let region = self.security_region(index)?;
        self.with_chip(ChipSelect::Primary, |bus, chip, gate| {
            gate.wait_idle(bus, GateUser::Erase);
            security::erase_region(bus, chip, region)
        })
    }

    /// Program `data` at `offset` in security region `index` on chip 0
    pub fn write_security_region(&mut self, index: u8, offset: u32, data: &[u8]) -> Result<()> {
        self.check_write_context()?;
        let region = self.security_region(index)?;
        region.check_bounds(offset, data.len())?;
        self.with_chip(ChipSelect::Primary, |bus, chip, gate| {
            gate.wait_idle(bus, GateUser::Write);
            security::write_region(bus, chip, region, offset, data)
        })
    }

    /// Read `buf.len()` bytes at `offset` in security region `index`
    pub fn read_security_region(&mut self, index: u8, offset: u32, buf: &mut [u8]) -> Result<()> {
        let region = self.security_region(index)?;
        region.check_bounds(offset, buf.len())?;
        self.with_chip(ChipSelect::Primary, |bus, chip, _| {
            security::read_region(bus, chip, region, offset, buf)
        })
    }

    /// Read the factory unique ID of chip 0, returns the bytes filled
    pub fn read_unique_id(&mut self, buf: &mut [u8]) -> Result<usize> {
        let len = buf.len().min(UNIQUE_ID_LEN);
        self.with_chip(ChipSelect::Primary, |bus, chip, _| {
            protocol::read_unique_id(bus, chip, &mut buf[..len])
        })?;
        Ok(len)
    }

    /// Put every chip into deep power-down
    pub fn power_down(&mut self) -> Result<()> {
        for cs in [ChipSelect::Secondary, ChipSelect::Primary] {
            if self.chips[cs.index()].is_some() {
                self.with_chip(cs, |bus, chip, _| {
                    protocol::power_down(bus)?;
                    chip.flags.insert(ChipFlags::POWERED_DOWN);
                    Ok(())
                })?;
            }
        }
        Ok(())
    }

    /// Release every chip from deep power-down
    pub fn power_up(&mut self) -> Result<()> {
        for cs in [ChipSelect::Primary, ChipSelect::Secondary] {
            // with_chip wakes a powered-down chip before running the closure
            if self.chips[cs.index()].is_some() {
                self.with_chip(cs, |_, _, _| Ok(()))?;
            }
        }
        Ok(())
    }

    /// Voltage scaling notification
    ///
    /// Reprograms delay chain and bus clock of each chip from its table
    /// row, in the order the direction of the change requires.
    pub fn on_voltage_change(&mut self, change: dvfs::VoltageChange) {
        if !self.config.has(Capabilities::DVFS) {
            return;
        }
        let key = self.bus.platform_mut().irq_lock();
        for cs in [ChipSelect::Primary, ChipSelect::Secondary] {
            let Some(chip) = self.chips[cs.index()].as_mut() else {
                continue;
            };
            let Some(plan) = dvfs::plan(chip.quirk(), &change) else {
                continue;
            };
            let set_delay = |bus: &mut Bus<C, G, P>| {
                if let Some(delay) = plan.delay {
                    bus.set_delay_chain(cs, delay);
                }
            };
            match plan.order {
                dvfs::ApplyOrder::ClockFirst => {
                    self.bus.platform_mut().set_flash_clock_mhz(cs, plan.clock_mhz);
                    set_delay(&mut self.bus);
                }
                dvfs::ApplyOrder::DelayFirst => {
                    set_delay(&mut self.bus);
                    self.bus.platform_mut().set_flash_clock_mhz(cs, plan.clock_mhz);
                }
            }
            chip.vdd_mv = change.new_mv;
            log::info!(
                "delay chain update by vdd: {} => {}",
                change.old_mv,
                change.new_mv
            );
        }
        self.bus.platform_mut().irq_unlock(key);
    }

    /// Sweep the delay chain of one chip and apply the result
    ///
    /// On [`Error::CalibrationFailed`] the previous delay chain is kept.
    pub fn calibrate<F: FnMut(SweepStep)>(
        &mut self,
        cs: ChipSelect,
        sweep: &SweepConfig,
        progress: F,
    ) -> Result<Calibration> {
        if self.chips[cs.index()].is_none() {
            return Err(Error::ChipNotPresent);
        }
        if let calibration::TrialMode::DataPattern { scratch } = sweep.mode {
            self.check_write_context()?;
            protocol::check_erase_alignment(scratch, SECTOR_SIZE)?;
        }
        let mut target = ChipSweep { flash: self, cs };
        calibration::sweep(&mut target, sweep, progress)
    }

    /// Complete an operation a preempted task left suspended
    ///
    /// Interrupt handlers that touch the flash call this on entry; the
    /// device operations do it themselves.
    pub fn suspend_finished(&mut self) -> Result<()> {
        for cs in [ChipSelect::Primary, ChipSelect::Secondary] {
            if let Some(chip) = self.chips[cs.index()].as_mut() {
                self.bus.select(cs);
                let res = suspend::finish_pending(&mut self.bus, chip);
                self.bus.select(ChipSelect::Primary);
                res?;
            }
        }
        Ok(())
    }

    /// Fixed geometry parameters
    pub fn parameters(&self) -> FlashParameters {
        FlashParameters::default()
    }

    /// Page layout over the whole logical space
    pub fn page_layout(&self) -> PageLayout {
        let params = self.parameters();
        PageLayout {
            pages_count: (self.size() / u64::from(params.write_block_size)) as u32,
            pages_size: params.write_block_size,
        }
    }

    /// Logical size in bytes
    pub fn size(&self) -> u64 {
        self.map.total()
    }

    /// Address split between the chips
    pub fn map(&self) -> DualChipMap {
        self.map
    }

    /// State of the chip on `cs`
    pub fn chip(&self, cs: ChipSelect) -> Option<&ChipState> {
        self.chips[cs.index()].as_ref()
    }

    /// JEDEC ID of chip 0
    pub fn chip_id(&self) -> Option<ChipId> {
        self.chip(ChipSelect::Primary).map(|c| c.id)
    }

    /// Board configuration
    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// The underlying bus
    pub fn bus(&self) -> &Bus<C, G, P> {
        &self.bus
    }

    /// The underlying bus (mutable)
    pub fn bus_mut(&mut self) -> &mut Bus<C, G, P> {
        &mut self.bus
    }

    /// Release the bus
    pub fn into_bus(self) -> Bus<C, G, P> {
        self.bus
    }
}

/// Erase on chip 0, suspending after every command until it completes
fn erase_suspendable<T: SpiTransport + ?Sized>(
    t: &mut T,
    chip: &mut ChipState,
    gate: &XipGate,
    offset: u32,
    len: u32,
) -> Result<()> {
    for (addr, kind) in EraseSteps::new(offset, len)? {
        gate.wait_idle(t, GateUser::Erase);
        protocol::erase_unit(t, chip, kind, addr, Wait::NoWait)?;
        suspend::begin(chip, PendingOp::Erase, addr);
        suspend::suspend(t, chip)?;
        suspend::wait_finished(t, chip, gate)?;
    }
    Ok(())
}

/// Sweep hooks bound to one chip select
struct ChipSweep<'a, C, G, P> {
    flash: &'a mut NorFlash<C, G, P>,
    cs: ChipSelect,
}

impl<C, G, P> SweepTarget for ChipSweep<'_, C, G, P>
where
    C: SpiController,
    G: OutputPin,
    P: Platform,
{
    fn delay_chain(&self) -> u8 {
        self.flash.bus.delay_chain(self.cs)
    }

    fn set_delay_chain(&mut self, value: u8) {
        self.flash.bus.set_delay_chain(self.cs, value);
    }

    fn cpu_clock_mhz(&self) -> u32 {
        self.flash.bus.platform().cpu_clock_mhz()
    }

    fn set_cpu_clock_mhz(&mut self, mhz: u32) {
        self.flash.bus.platform_mut().set_cpu_clock_mhz(mhz);
    }

    fn read_id(&mut self) -> Result<ChipId> {
        self.flash
            .with_chip(self.cs, |bus, _, _| protocol::read_chip_id(bus))
    }

    fn erase_sector(&mut self, offset: u32) -> Result<()> {
        self.flash.with_chip(self.cs, |bus, chip, _| {
            protocol::erase_unit(bus, chip, EraseKind::Sector, offset, Wait::Ready)
        })
    }

    fn program(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        self.flash
            .with_chip(self.cs, |bus, chip, _| protocol::write(bus, chip, offset, data))
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()> {
        self.flash
            .with_chip(self.cs, |bus, chip, _| protocol::read(bus, chip, offset, buf))
    }
}
