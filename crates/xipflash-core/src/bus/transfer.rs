//! The transfer primitive

use embedded_hal::digital::OutputPin;

use super::{BusConfig, BusFlags, ChipSelect, SpiController, SpiTransport};
use crate::error::{ContractViolation, Error, Result};
use crate::platform::{ExecContext, Platform};
use crate::spi::{opcodes, SpiCommand, TransferFlags};

/// Data phases longer than this use DMA when a channel is configured
pub const DMA_THRESHOLD: usize = 16;

/// Ready-bit polls (1 µs apart) before giving up on the controller
const READY_POLLS: u32 = 1000;

/// Longest dummy phase a command may carry
pub const MAX_DUMMY_BYTES: usize = 8;

const ZEROS: [u8; MAX_DUMMY_BYTES] = [0; MAX_DUMMY_BYTES];

/// One controller, its optional GPIO chip select and the platform services
///
/// Owning all three makes the bus the single place where a transaction can
/// be in flight; the exclusive borrow on [`SpiTransport::execute`] enforces
/// it.
pub struct Bus<C, G, P> {
    controller: C,
    cs_pin: G,
    platform: P,
    config: BusConfig,
    selected: ChipSelect,
}

impl<C, G, P> Bus<C, G, P>
where
    C: SpiController,
    G: OutputPin,
    P: Platform,
{
    /// Create a bus from its parts
    pub fn new(controller: C, cs_pin: G, platform: P, config: BusConfig) -> Self {
        Self {
            controller,
            cs_pin,
            platform,
            config,
            selected: ChipSelect::Primary,
        }
    }

    /// Current configuration
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Route following transactions to `cs`
    pub fn select(&mut self, cs: ChipSelect) {
        self.selected = cs;
    }

    /// Chip select the next transaction goes to
    pub fn selected(&self) -> ChipSelect {
        self.selected
    }

    /// Delay chain used for `cs`
    pub fn delay_chain(&self, cs: ChipSelect) -> u8 {
        self.config.delay_chain[cs.index()]
    }

    /// Change the delay chain for `cs`
    ///
    /// Takes effect in the controller immediately when `cs` is selected,
    /// otherwise at its next transaction.
    pub fn set_delay_chain(&mut self, cs: ChipSelect, value: u8) {
        self.config.delay_chain[cs.index()] = value;
        if cs == self.selected {
            self.controller.set_delay_chain(value);
        }
    }

    /// Platform services
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Platform services (mutable)
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// The controller
    pub fn controller(&self) -> &C {
        &self.controller
    }

    /// Split the bus back into its parts
    pub fn into_parts(self) -> (C, G, P) {
        (self.controller, self.cs_pin, self.platform)
    }

    fn set_cs(&mut self, asserted: bool) -> Result<()> {
        match self.selected {
            ChipSelect::Primary => {
                self.controller.set_cs(asserted);
                Ok(())
            }
            ChipSelect::Secondary => {
                let res = if asserted {
                    self.cs_pin.set_low()
                } else {
                    self.cs_pin.set_high()
                };
                res.map_err(|_| Error::ChipSelect)
            }
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        match self.config.dma_channel {
            Some(ch) if data.len() > DMA_THRESHOLD => self.controller.dma_write(ch, data),
            _ => self.controller.write(data),
        }
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.config.dma_channel {
            Some(ch) if buf.len() > DMA_THRESHOLD => self.controller.dma_read(ch, buf),
            _ => self.controller.read(buf),
        }
    }

    /// Wait for the controller, load the chip's delay chain and kick the
    /// chip out of continuous read unless told not to.
    fn prepare(&mut self) -> Result<()> {
        let mut polls = 0;
        while !self.controller.is_ready() {
            polls += 1;
            if polls >= READY_POLLS {
                return Err(Error::BusNotReady);
            }
            self.platform.delay_us(1);
        }

        self.controller.set_delay_chain(self.delay_chain(self.selected));
        self.controller.set_lines(1);

        if !self.config.flags.contains(BusFlags::NO_EXIT_CONTINUOUS_READ) {
            self.set_cs(true)?;
            let res = self
                .controller
                .write(&[opcodes::CONTINUOUS_READ_RESET, opcodes::CONTINUOUS_READ_RESET]);
            self.set_cs(false)?;
            res?;
        }
        Ok(())
    }

    fn shift(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        let width = self.config.bus_width;

        if cmd.flags.contains(TransferFlags::MIO_CMD_ADDR_DATA) {
            self.controller.set_lines(width);
        }
        self.write_bytes(&[cmd.opcode])?;

        if cmd.flags.contains(TransferFlags::MIO_ADDR_DATA) {
            self.controller.set_lines(width);
        }
        if let Some(addr) = cmd.address {
            let mut buf = [0u8; 4];
            let bytes = cmd.address_width.encode(addr, &mut buf);
            self.write_bytes(bytes)?;
        }
        if cmd.dummy_bytes > 0 {
            self.write_bytes(&ZEROS[..usize::from(cmd.dummy_bytes)])?;
        }

        if cmd.flags.contains(TransferFlags::MIO_DATA) {
            self.controller.set_lines(width);
        }
        if cmd.has_write() {
            self.write_bytes(cmd.write_data)?;
        } else if cmd.has_read() {
            self.read_bytes(cmd.read_buf)?;
        }
        Ok(())
    }

    fn transfer_locked(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        self.prepare()?;

        self.set_cs(true)?;
        let res = self.shift(cmd);
        if cmd.flags.intersects(TransferFlags::MIO_MASK) {
            self.controller.set_lines(1);
        }
        self.set_cs(false)?;
        res
    }
}

impl<C, G, P> SpiTransport for Bus<C, G, P>
where
    C: SpiController,
    G: OutputPin,
    P: Platform,
{
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        if usize::from(cmd.dummy_bytes) > MAX_DUMMY_BYTES {
            return Err(ContractViolation::TooManyDummyBytes(cmd.dummy_bytes).into());
        }

        let key = if self.config.flags.contains(BusFlags::NO_IRQ_LOCK) {
            None
        } else {
            Some(self.platform.irq_lock())
        };

        let res = self.transfer_locked(cmd);

        if let Some(key) = key {
            self.platform.irq_unlock(key);
        }
        res
    }

    fn bus_width(&self) -> u8 {
        self.config.bus_width
    }

    fn flags(&self) -> BusFlags {
        self.config.flags
    }

    fn set_flags(&mut self, flags: BusFlags) {
        self.config.flags = flags;
    }

    fn delay_us(&mut self, us: u32) {
        self.platform.delay_us(us);
    }

    fn sleep_ms(&mut self, ms: u32) {
        self.platform.sleep_ms(ms);
    }

    fn context(&self) -> ExecContext {
        self.platform.context()
    }
}
