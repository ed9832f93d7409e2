//! `embedded-storage` NOR flash traits

use embedded_hal::digital::OutputPin;
use embedded_storage::nor_flash::{self as es, NorFlashError, NorFlashErrorKind};

use super::NorFlash;
use crate::bus::SpiController;
use crate::chip::SECTOR_SIZE;
use crate::error::{ContractViolation, Error};
use crate::platform::Platform;

impl NorFlashError for Error {
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            Error::Contract(ContractViolation::OutOfBounds { .. }) => NorFlashErrorKind::OutOfBounds,
            Error::Contract(ContractViolation::UnalignedErase { .. }) => NorFlashErrorKind::NotAligned,
            _ => NorFlashErrorKind::Other,
        }
    }
}

impl<C, G, P> es::ErrorType for NorFlash<C, G, P>
where
    C: SpiController,
    G: OutputPin,
    P: Platform,
{
    type Error = Error;
}

impl<C, G, P> es::ReadNorFlash for NorFlash<C, G, P>
where
    C: SpiController,
    G: OutputPin,
    P: Platform,
{
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        NorFlash::read(self, offset, bytes)
    }

    fn capacity(&self) -> usize {
        self.size() as usize
    }
}

impl<C, G, P> es::NorFlash for NorFlash<C, G, P>
where
    C: SpiController,
    G: OutputPin,
    P: Platform,
{
    const WRITE_SIZE: usize = 1;
    const ERASE_SIZE: usize = SECTOR_SIZE as usize;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        let len = to.checked_sub(from).ok_or(ContractViolation::OutOfBounds {
            offset: from,
            len: 0,
        })?;
        NorFlash::erase(self, from, len)
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        NorFlash::write(self, offset, bytes)
    }
}
