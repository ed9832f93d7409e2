//! Controller hardware surface
//!
//! The register-level view of one SPI flash controller: the ready bit, the
//! in-register chip select, the I/O width field, the CPU-polled FIFOs, a
//! DMA channel and the delay chain field.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};

use crate::error::Result;

/// One SPI flash controller instance
///
/// Implementations bind the register base internally. Every method runs
/// to completion before returning.
pub trait SpiController {
    /// Controller idle and ready for a new transaction
    fn is_ready(&mut self) -> bool;

    /// Drive the in-register chip select (`true` = asserted, line low)
    fn set_cs(&mut self, asserted: bool);

    /// Select the number of I/O lines (1, 2 or 4) for the following bytes
    fn set_lines(&mut self, lines: u8);

    /// Shift bytes out through the TX FIFO
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Shift bytes in through the RX FIFO
    fn read(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Shift bytes out with the given DMA channel, blocking until done
    fn dma_write(&mut self, channel: u8, data: &[u8]) -> Result<()>;

    /// Shift bytes in with the given DMA channel, blocking until done
    fn dma_read(&mut self, channel: u8, buf: &mut [u8]) -> Result<()>;

    /// Program the sampling delay chain field
    fn set_delay_chain(&mut self, value: u8);
}

/// Placeholder pin for boards without a second chip
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCsPin;

impl ErrorType for NoCsPin {
    type Error = Infallible;
}

impl OutputPin for NoCsPin {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }
}
