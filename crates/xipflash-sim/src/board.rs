//! Shared board state
//!
//! One virtual clock, one controller and up to two chips. The controller,
//! the GPIO pin and the platform hooks are separate handles onto the same
//! [`BoardState`], the way the driver sees separate peripherals.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use xipflash_core::bus::{Bus, ChipSelect};
use xipflash_core::config::BoardConfig;
use xipflash_core::flash::NorFlash;
use xipflash_core::platform::ExecContext;
use xipflash_core::xip::XipGate;

use crate::chip::{ChipStats, SimChip};
use crate::config::SimChipConfig;
use crate::controller::SimController;
use crate::error::{Result, SimError};
use crate::pin::SimCsPin;
use crate::platform::SimPlatform;

/// One chip-select window as seen on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    /// Virtual time at chip select release
    pub time_us: u64,
    /// Chip it went to
    pub cs: ChipSelect,
    /// First byte
    pub opcode: u8,
    /// Decoded address
    pub address: Option<u32>,
    /// Data bytes written after the header
    pub data_out: usize,
    /// Bytes read
    pub data_in: usize,
    /// Widest I/O setting in the window
    pub lines: u8,
    /// Any part of it moved by DMA
    pub dma: bool,
    /// Delay chain register during the window
    pub delay_chain: u8,
}

/// Clock and sampling changes, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigEvent {
    /// Controller delay chain field changed
    DelayChain(u8),
    /// Bus clock for a chip select changed
    FlashClock {
        /// Chip select
        cs: ChipSelect,
        /// New clock
        mhz: u32,
    },
    /// CPU clock changed
    CpuClock(u32),
}

/// Called with the board on every task sleep
pub type SleepHook = Box<dyn FnMut(&mut BoardState) + Send>;

/// Everything on the board
pub struct BoardState {
    now_us: u64,
    chips: [Option<SimChip>; 2],
    active: Option<ChipSelect>,
    tx_dma: bool,
    lines: u8,
    delay_chain: u8,
    cpu_mhz: u32,
    flash_clock_mhz: [u32; 2],
    context: ExecContext,
    irq_depth: u32,
    irq_locks: u32,
    held: [bool; 2],
    mutex_locks: u32,
    lock_violations: u32,
    not_ready_polls: u32,
    slept_ms: u64,
    xip_stalls: u32,
    trace: Vec<TraceEvent>,
    config_log: Vec<ConfigEvent>,
    invalidations: Vec<(u32, u32)>,
    sleep_hook: Option<SleepHook>,
}

/// CPU clock out of reset
pub const DEFAULT_CPU_MHZ: u32 = 160;

impl BoardState {
    fn new(chips: [Option<SimChip>; 2]) -> Self {
        Self {
            now_us: 0,
            chips,
            active: None,
            tx_dma: false,
            lines: 1,
            delay_chain: 0,
            cpu_mhz: DEFAULT_CPU_MHZ,
            flash_clock_mhz: [0; 2],
            context: ExecContext::Task,
            irq_depth: 0,
            irq_locks: 0,
            held: [false; 2],
            mutex_locks: 0,
            lock_violations: 0,
            not_ready_polls: 0,
            slept_ms: 0,
            xip_stalls: 0,
            trace: Vec::new(),
            config_log: Vec::new(),
            invalidations: Vec::new(),
            sleep_hook: None,
        }
    }

    /// Virtual time
    pub fn now_us(&self) -> u64 {
        self.now_us
    }

    /// Let virtual time pass
    pub fn advance(&mut self, us: u64) {
        self.now_us += us;
        let now = self.now_us;
        for chip in self.chips.iter_mut().flatten() {
            chip.tick(now);
        }
    }

    /// Task sleep: time passes and the sleep hook runs
    pub fn sleep(&mut self, ms: u32) {
        self.advance(u64::from(ms) * 1000);
        self.slept_ms += u64::from(ms);
        if let Some(mut hook) = self.sleep_hook.take() {
            hook(self);
            self.sleep_hook = Some(hook);
        }
    }

    /// Install a hook that runs on every task sleep
    pub fn set_sleep_hook(&mut self, hook: impl FnMut(&mut BoardState) + Send + 'static) {
        self.sleep_hook = Some(Box::new(hook));
    }

    /// Total time spent in task sleeps
    pub fn slept_ms(&self) -> u64 {
        self.slept_ms
    }

    /// Chip on `cs`
    pub fn chip(&self, cs: ChipSelect) -> Option<&SimChip> {
        self.chips[cs.index()].as_ref()
    }

    /// Chip on `cs` (mutable)
    pub fn chip_mut(&mut self, cs: ChipSelect) -> Option<&mut SimChip> {
        self.chips[cs.index()].as_mut()
    }

    /// Counters of the chip on `cs`
    pub fn stats(&self, cs: ChipSelect) -> ChipStats {
        self.chip(cs).map(|c| *c.stats()).unwrap_or_default()
    }

    /// Execution context reported to the driver
    pub fn context(&self) -> ExecContext {
        self.context
    }

    /// Switch the execution context reported to the driver
    pub fn set_context(&mut self, context: ExecContext) {
        self.context = context;
    }

    /// Report the controller busy for the next `polls` ready checks
    pub fn set_not_ready_polls(&mut self, polls: u32) {
        self.not_ready_polls = polls;
    }

    /// Current CPU clock
    pub fn cpu_mhz(&self) -> u32 {
        self.cpu_mhz
    }

    /// Bus clock programmed for `cs`
    pub fn flash_clock_mhz(&self, cs: ChipSelect) -> u32 {
        self.flash_clock_mhz[cs.index()]
    }

    /// Controller delay chain field
    pub fn delay_chain(&self) -> u8 {
        self.delay_chain
    }

    /// Interrupt lock nesting depth
    pub fn irq_depth(&self) -> u32 {
        self.irq_depth
    }

    /// Interrupt locks taken so far
    pub fn irq_locks(&self) -> u32 {
        self.irq_locks
    }

    /// Whether the per-chip mutex for `cs` is held
    pub fn mutex_held(&self, cs: ChipSelect) -> bool {
        self.held[cs.index()]
    }

    /// Per-chip mutex acquisitions so far
    pub fn mutex_locks(&self) -> u32 {
        self.mutex_locks
    }

    /// Double locks and unlocks of a per-chip mutex
    pub fn lock_violations(&self) -> u32 {
        self.lock_violations
    }

    /// Instruction fetches that hit a busy chip
    pub fn xip_stalls(&self) -> u32 {
        self.xip_stalls
    }

    /// Bus activity so far
    pub fn trace(&self) -> &[TraceEvent] {
        &self.trace
    }

    /// Opcodes sent to `cs`, in order
    pub fn opcodes(&self, cs: ChipSelect) -> Vec<u8> {
        self.trace
            .iter()
            .filter(|e| e.cs == cs)
            .map(|e| e.opcode)
            .collect()
    }

    /// Forget the trace and the clock log
    pub fn clear_trace(&mut self) {
        self.trace.clear();
        self.config_log.clear();
        self.invalidations.clear();
    }

    /// Clock and delay changes so far
    pub fn config_log(&self) -> &[ConfigEvent] {
        &self.config_log
    }

    /// Cache invalidations requested by the driver
    pub fn invalidations(&self) -> &[(u32, u32)] {
        &self.invalidations
    }

    /// Instruction fetch from the memory-mapped window of chip 0
    ///
    /// Returns false, fills `buf` with 0xFF and counts a stall when the
    /// chip is running a program or erase.
    pub fn xip_read(&mut self, offset: u32, buf: &mut [u8]) -> bool {
        let Some(chip) = self.chips[0].as_ref() else {
            buf.fill(0xFF);
            return false;
        };
        if chip.running() {
            self.xip_stalls += 1;
            buf.fill(0xFF);
            return false;
        }
        let data = chip.data();
        let start = offset as usize;
        for (i, b) in buf.iter_mut().enumerate() {
            *b = data.get(start + i).copied().unwrap_or(0xFF);
        }
        true
    }

    pub(crate) fn is_ready(&mut self) -> bool {
        if self.not_ready_polls > 0 {
            self.not_ready_polls -= 1;
            return false;
        }
        true
    }

    pub(crate) fn set_cs(&mut self, cs: ChipSelect, asserted: bool) {
        if asserted {
            self.active = Some(cs);
            self.tx_dma = false;
            if let Some(chip) = self.chips[cs.index()].as_mut() {
                chip.begin();
            }
            return;
        }
        if self.active != Some(cs) {
            return;
        }
        self.active = None;
        let now = self.now_us;
        let Some(tx) = self.chips[cs.index()].as_mut().and_then(|c| c.end(now)) else {
            return;
        };
        self.trace.push(TraceEvent {
            time_us: now,
            cs,
            opcode: tx.opcode,
            address: tx.address,
            data_out: tx.data_out,
            data_in: tx.data_in,
            lines: tx.lines,
            dma: self.tx_dma,
            delay_chain: self.delay_chain,
        });
    }

    pub(crate) fn set_lines(&mut self, lines: u8) {
        self.lines = lines;
    }

    pub(crate) fn set_delay_chain(&mut self, value: u8) {
        if value != self.delay_chain {
            self.delay_chain = value;
            self.config_log.push(ConfigEvent::DelayChain(value));
        }
    }

    pub(crate) fn shift_out(&mut self, data: &[u8], dma: bool) -> Result<()> {
        let cs = self.active.ok_or(SimError::NoChipSelected)?;
        self.tx_dma |= dma;
        let lines = self.lines;
        if let Some(chip) = self.chips[cs.index()].as_mut() {
            chip.write(data, lines);
        }
        Ok(())
    }

    pub(crate) fn shift_in(&mut self, buf: &mut [u8], dma: bool) -> Result<()> {
        let cs = self.active.ok_or(SimError::NoChipSelected)?;
        self.tx_dma |= dma;
        let (lines, now, delay, cpu) = (self.lines, self.now_us, self.delay_chain, self.cpu_mhz);
        let Some(chip) = self.chips[cs.index()].as_mut() else {
            // Nobody drives the data lines
            buf.fill(0xFF);
            return Ok(());
        };
        chip.read(buf, lines, now);
        if !chip.config().timing.contains(delay, cpu) {
            for b in buf.iter_mut() {
                *b ^= 0x40;
            }
        }
        Ok(())
    }

    pub(crate) fn irq_lock(&mut self) -> u32 {
        self.irq_depth += 1;
        self.irq_locks += 1;
        self.irq_depth - 1
    }

    pub(crate) fn irq_unlock(&mut self, key: u32) {
        if key + 1 != self.irq_depth {
            log::error!("irq unlock out of order: key {} at depth {}", key, self.irq_depth);
        }
        self.irq_depth = self.irq_depth.saturating_sub(1);
    }

    pub(crate) fn lock(&mut self, cs: ChipSelect) {
        if self.held[cs.index()] {
            log::error!("chip {:?} mutex taken twice", cs);
            self.lock_violations += 1;
        }
        self.held[cs.index()] = true;
        self.mutex_locks += 1;
    }

    pub(crate) fn unlock(&mut self, cs: ChipSelect) {
        if !self.held[cs.index()] {
            log::error!("chip {:?} mutex released while free", cs);
            self.lock_violations += 1;
        }
        self.held[cs.index()] = false;
    }

    pub(crate) fn set_flash_clock(&mut self, cs: ChipSelect, mhz: u32) {
        self.flash_clock_mhz[cs.index()] = mhz;
        self.config_log.push(ConfigEvent::FlashClock { cs, mhz });
    }

    pub(crate) fn set_cpu_clock(&mut self, mhz: u32) {
        self.cpu_mhz = mhz;
        self.config_log.push(ConfigEvent::CpuClock(mhz));
    }

    pub(crate) fn invalidate(&mut self, offset: u32, len: u32) {
        self.invalidations.push((offset, len));
    }
}

/// Driver instance wired to the emulated board
pub type SimFlash = NorFlash<SimController, SimCsPin, SimPlatform>;

/// Handle onto one emulated board
#[derive(Clone)]
pub struct SimBoard {
    state: Arc<Mutex<BoardState>>,
}

impl SimBoard {
    /// Board with one chip on the controller chip select
    pub fn new(primary: SimChipConfig) -> Result<Self> {
        Self::with_chips(primary, None)
    }

    /// Board with an optional second chip on the GPIO chip select
    pub fn with_chips(primary: SimChipConfig, secondary: Option<SimChipConfig>) -> Result<Self> {
        let chip0 = SimChip::new(primary)?;
        let chip1 = secondary.map(SimChip::new).transpose()?;
        Ok(Self {
            state: Arc::new(Mutex::new(BoardState::new([Some(chip0), chip1]))),
        })
    }

    /// Lock the board for inspection or setup
    pub fn state(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Controller handle
    pub fn controller(&self) -> SimController {
        SimController::new(Arc::clone(&self.state))
    }

    /// GPIO chip select handle
    pub fn cs_pin(&self) -> SimCsPin {
        SimCsPin::new(Arc::clone(&self.state))
    }

    /// Platform services handle
    pub fn platform(&self) -> SimPlatform {
        SimPlatform::new(Arc::clone(&self.state))
    }

    /// Bus over this board's controller
    pub fn bus(&self, config: &BoardConfig) -> Bus<SimController, SimCsPin, SimPlatform> {
        Bus::new(
            self.controller(),
            self.cs_pin(),
            self.platform(),
            config.bus_config(),
        )
    }

    /// Uninitialized driver instance on this board
    pub fn flash(&self, config: BoardConfig, gate: &'static XipGate) -> SimFlash {
        NorFlash::new(self.bus(&config), config, gate)
    }
}

/// XIP gate that lives as long as the process
///
/// The driver holds a `'static` reference to the gate, as firmware does
/// with its global.
pub fn leak_gate(limit: u32) -> &'static XipGate {
    Box::leak(Box::new(XipGate::new(limit)))
}
