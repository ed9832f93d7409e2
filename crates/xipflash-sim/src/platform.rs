//! RTOS and clock tree hooks backed by the virtual clock

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use xipflash_core::bus::ChipSelect;
use xipflash_core::platform::{ExecContext, IrqKey, Platform};

use crate::board::BoardState;

/// Platform services of the emulated board
///
/// Delays and sleeps advance virtual time; the per-chip mutexes and the
/// interrupt lock only record what the driver did with them.
pub struct SimPlatform {
    state: Arc<Mutex<BoardState>>,
}

impl SimPlatform {
    pub(crate) fn new(state: Arc<Mutex<BoardState>>) -> Self {
        Self { state }
    }

    fn board(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Platform for SimPlatform {
    fn context(&self) -> ExecContext {
        self.board().context()
    }

    fn irq_lock(&mut self) -> IrqKey {
        IrqKey(self.board().irq_lock())
    }

    fn irq_unlock(&mut self, key: IrqKey) {
        self.board().irq_unlock(key.0);
    }

    fn delay_us(&mut self, us: u32) {
        self.board().advance(u64::from(us));
    }

    fn sleep_ms(&mut self, ms: u32) {
        let mut board = self.board();
        if board.context() == ExecContext::Interrupt {
            log::error!("sleep of {} ms in interrupt context", ms);
        }
        board.sleep(ms);
    }

    fn lock(&mut self, cs: ChipSelect) {
        self.board().lock(cs);
    }

    fn unlock(&mut self, cs: ChipSelect) {
        self.board().unlock(cs);
    }

    fn set_flash_clock_mhz(&mut self, cs: ChipSelect, mhz: u32) {
        self.board().set_flash_clock(cs, mhz);
    }

    fn cpu_clock_mhz(&self) -> u32 {
        self.board().cpu_mhz()
    }

    fn set_cpu_clock_mhz(&mut self, mhz: u32) {
        self.board().set_cpu_clock(mhz);
    }

    fn invalidate_cache(&mut self, offset: u32, len: u32) {
        self.board().invalidate(offset, len);
    }
}
