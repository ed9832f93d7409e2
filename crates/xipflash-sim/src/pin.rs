//! GPIO chip select for chip 1

use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};

use embedded_hal::digital::{ErrorType, OutputPin};
use xipflash_core::bus::ChipSelect;

use crate::board::BoardState;

/// Active-low GPIO wired to the second chip
pub struct SimCsPin {
    state: Arc<Mutex<BoardState>>,
}

impl SimCsPin {
    pub(crate) fn new(state: Arc<Mutex<BoardState>>) -> Self {
        Self { state }
    }

    fn drive(&mut self, asserted: bool) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_cs(ChipSelect::Secondary, asserted);
    }
}

impl ErrorType for SimCsPin {
    type Error = Infallible;
}

impl OutputPin for SimCsPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.drive(true);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.drive(false);
        Ok(())
    }
}
