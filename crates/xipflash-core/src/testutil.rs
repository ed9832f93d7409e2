//! Recording fakes shared by the unit tests

use std::vec::Vec;

use core::convert::Infallible;
use embedded_hal::digital::{ErrorType, OutputPin};

use crate::bus::{BusFlags, ChipSelect, SpiController, SpiTransport};
use crate::error::Result;
use crate::platform::{ExecContext, IrqKey, Platform};
use crate::spi::{opcodes, AddressWidth, SpiCommand, TransferFlags};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Cs(bool),
    Lines(u8),
    Write(Vec<u8>),
    Read(usize),
    DmaWrite(u8, usize),
    DmaRead(u8, usize),
    DelayChain(u8),
}

#[derive(Default)]
pub struct RecordingController {
    pub events: Vec<Event>,
    pub never_ready: bool,
}

impl SpiController for RecordingController {
    fn is_ready(&mut self) -> bool {
        !self.never_ready
    }

    fn set_cs(&mut self, asserted: bool) {
        self.events.push(Event::Cs(asserted));
    }

    fn set_lines(&mut self, lines: u8) {
        self.events.push(Event::Lines(lines));
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.events.push(Event::Write(data.to_vec()));
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        buf.fill(0xA5);
        self.events.push(Event::Read(buf.len()));
        Ok(())
    }

    fn dma_write(&mut self, channel: u8, data: &[u8]) -> Result<()> {
        self.events.push(Event::DmaWrite(channel, data.len()));
        Ok(())
    }

    fn dma_read(&mut self, channel: u8, buf: &mut [u8]) -> Result<()> {
        buf.fill(0x5A);
        self.events.push(Event::DmaRead(channel, buf.len()));
        Ok(())
    }

    fn set_delay_chain(&mut self, value: u8) {
        self.events.push(Event::DelayChain(value));
    }
}

#[derive(Default)]
pub struct RecordingPin {
    pub levels: Vec<bool>,
}

impl ErrorType for RecordingPin {
    type Error = Infallible;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        self.levels.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        self.levels.push(true);
        Ok(())
    }
}

#[derive(Default)]
pub struct TestPlatform {
    pub context: ExecContext,
    pub irq_locks: u32,
    pub irq_depth: u32,
    pub delayed_us: u64,
    pub slept_ms: u64,
    pub locks: Vec<(ChipSelect, bool)>,
    pub clocks: Vec<(ChipSelect, u32)>,
    pub cpu_mhz: u32,
}

impl Platform for TestPlatform {
    fn context(&self) -> ExecContext {
        self.context
    }

    fn irq_lock(&mut self) -> IrqKey {
        self.irq_locks += 1;
        self.irq_depth += 1;
        IrqKey(self.irq_depth)
    }

    fn irq_unlock(&mut self, _key: IrqKey) {
        self.irq_depth -= 1;
    }

    fn delay_us(&mut self, us: u32) {
        self.delayed_us += u64::from(us);
    }

    fn sleep_ms(&mut self, ms: u32) {
        self.slept_ms += u64::from(ms);
    }

    fn lock(&mut self, cs: ChipSelect) {
        self.locks.push((cs, true));
    }

    fn unlock(&mut self, cs: ChipSelect) {
        self.locks.push((cs, false));
    }

    fn set_flash_clock_mhz(&mut self, cs: ChipSelect, mhz: u32) {
        self.clocks.push((cs, mhz));
    }

    fn cpu_clock_mhz(&self) -> u32 {
        self.cpu_mhz
    }

    fn set_cpu_clock_mhz(&mut self, mhz: u32) {
        self.cpu_mhz = mhz;
    }
}

/// One command as seen by [`ScriptedChip`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub opcode: u8,
    pub address: Option<u32>,
    pub width: AddressWidth,
    pub dummy: u8,
    pub flags: TransferFlags,
    pub data: Vec<u8>,
    pub read_len: usize,
    pub bus_flags: BusFlags,
}

/// Register-level chip model behind [`SpiTransport`]
pub struct ScriptedChip {
    pub sent: Vec<Sent>,
    pub id: [u8; 3],
    pub status: [u8; 3],
    /// RDSR reports busy this many more times
    pub busy_polls: u32,
    /// WRSR2 is accepted but has no effect
    pub ignore_wrsr2: bool,
    /// No status register write has any effect
    pub status_locked: bool,
    /// Busy polls parked by SUSPEND, handed back by RESUME
    pub suspended_busy: u32,
    /// SUSPEND is accepted but has no effect
    pub ignore_suspend: bool,
    pub bus_width: u8,
    pub flags: BusFlags,
    pub context: ExecContext,
    pub delayed_us: u64,
    pub slept_ms: u64,
    pub fill: u8,
}

impl Default for ScriptedChip {
    fn default() -> Self {
        Self {
            sent: Vec::new(),
            id: [0xC8, 0x60, 0x15],
            status: [0; 3],
            busy_polls: 0,
            ignore_wrsr2: false,
            status_locked: false,
            suspended_busy: 0,
            ignore_suspend: false,
            bus_width: 1,
            flags: BusFlags::empty(),
            context: ExecContext::Task,
            delayed_us: 0,
            slept_ms: 0,
            fill: 0xA5,
        }
    }
}

impl ScriptedChip {
    pub fn opcodes(&self) -> Vec<u8> {
        self.sent.iter().map(|s| s.opcode).collect()
    }

    pub fn writes_of(&self, opcode: u8) -> Vec<&Sent> {
        self.sent.iter().filter(|s| s.opcode == opcode).collect()
    }
}

impl SpiTransport for ScriptedChip {
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        match cmd.opcode {
            opcodes::RDID => {
                for (dst, src) in cmd.read_buf.iter_mut().zip(self.id) {
                    *dst = src;
                }
            }
            opcodes::RDSR => {
                let busy = if self.busy_polls > 0 {
                    self.busy_polls -= 1;
                    opcodes::SR1_WIP
                } else {
                    0
                };
                cmd.read_buf.fill(self.status[0] | busy);
            }
            opcodes::RDSR2 => cmd.read_buf.fill(self.status[1]),
            opcodes::RDSR3 => cmd.read_buf.fill(self.status[2]),
            opcodes::WRSR if !self.status_locked => {
                if let Some(&b) = cmd.write_data.first() {
                    self.status[0] = b;
                }
                if let Some(&b) = cmd.write_data.get(1) {
                    self.status[1] = b;
                }
            }
            opcodes::WRSR2 if !self.ignore_wrsr2 && !self.status_locked => {
                if let Some(&b) = cmd.write_data.first() {
                    self.status[1] = b;
                }
            }
            opcodes::SUSPEND if !self.ignore_suspend => {
                self.suspended_busy = core::mem::take(&mut self.busy_polls);
            }
            opcodes::RESUME => {
                self.busy_polls += core::mem::take(&mut self.suspended_busy);
            }
            opcodes::WRSR3 if !self.status_locked => {
                if let Some(&b) = cmd.write_data.first() {
                    self.status[2] = b;
                }
            }
            _ => cmd.read_buf.fill(self.fill),
        }
        self.sent.push(Sent {
            opcode: cmd.opcode,
            address: cmd.address,
            width: cmd.address_width,
            dummy: cmd.dummy_bytes,
            flags: cmd.flags,
            data: cmd.write_data.to_vec(),
            read_len: cmd.read_buf.len(),
            bus_flags: self.flags,
        });
        Ok(())
    }

    fn bus_width(&self) -> u8 {
        self.bus_width
    }

    fn flags(&self) -> BusFlags {
        self.flags
    }

    fn set_flags(&mut self, flags: BusFlags) {
        self.flags = flags;
    }

    fn delay_us(&mut self, us: u32) {
        self.delayed_us += u64::from(us);
    }

    fn sleep_ms(&mut self, ms: u32) {
        self.slept_ms += u64::from(ms);
    }

    fn context(&self) -> ExecContext {
        self.context
    }
}
