//! Emulated SPI flash controller

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use xipflash_core::bus::{ChipSelect, SpiController};
use xipflash_core::Error;

use crate::board::BoardState;
use crate::error::SimError;

/// Register-level handle onto the board's controller
///
/// The in-register chip select always drives chip 0.
pub struct SimController {
    state: Arc<Mutex<BoardState>>,
}

impl SimController {
    pub(crate) fn new(state: Arc<Mutex<BoardState>>) -> Self {
        Self { state }
    }

    fn board(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn bus_error(e: SimError) -> Error {
    log::error!("sim controller: {}", e);
    Error::Bus
}

impl SpiController for SimController {
    fn is_ready(&mut self) -> bool {
        self.board().is_ready()
    }

    fn set_cs(&mut self, asserted: bool) {
        self.board().set_cs(ChipSelect::Primary, asserted);
    }

    fn set_lines(&mut self, lines: u8) {
        self.board().set_lines(lines);
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        self.board().shift_out(data, false).map_err(bus_error)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        self.board().shift_in(buf, false).map_err(bus_error)
    }

    fn dma_write(&mut self, _channel: u8, data: &[u8]) -> Result<(), Error> {
        self.board().shift_out(data, true).map_err(bus_error)
    }

    fn dma_read(&mut self, _channel: u8, buf: &mut [u8]) -> Result<(), Error> {
        self.board().shift_in(buf, true).map_err(bus_error)
    }

    fn set_delay_chain(&mut self, value: u8) {
        self.board().set_delay_chain(value);
    }
}
