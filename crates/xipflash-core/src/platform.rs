//! RTOS and SoC services the driver consumes
//!
//! The driver never owns interrupts, timers, mutexes or the clock tree. It
//! asks for them through [`Platform`], which the board support code (or the
//! simulator) implements.

use crate::bus::ChipSelect;

/// Where the current call is executing
///
/// Every operation that differs between task and interrupt context takes
/// its branch from this value instead of carrying two copies of the logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecContext {
    /// Thread context: may block, sleep and take mutexes
    #[default]
    Task,
    /// Interrupt context: must not block
    Interrupt,
}

impl ExecContext {
    /// Returns true if blocking primitives (mutex, sleep) are allowed
    pub const fn may_block(self) -> bool {
        matches!(self, Self::Task)
    }
}

/// Opaque token returned by [`Platform::irq_lock`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqKey(pub u32);

/// Board services used by the flash driver
pub trait Platform {
    /// Execution context of the caller
    fn context(&self) -> ExecContext;

    /// Disable interrupts, returning the key to restore them
    ///
    /// Must nest.
    fn irq_lock(&mut self) -> IrqKey;

    /// Restore the interrupt state saved in `key`
    fn irq_unlock(&mut self, key: IrqKey);

    /// Busy-wait for `us` microseconds
    fn delay_us(&mut self, us: u32);

    /// Yield the CPU for `ms` milliseconds
    ///
    /// Only called in [`ExecContext::Task`].
    fn sleep_ms(&mut self, ms: u32);

    /// Take the per-chip mutex
    ///
    /// Only called in [`ExecContext::Task`].
    fn lock(&mut self, cs: ChipSelect);

    /// Release the per-chip mutex
    fn unlock(&mut self, cs: ChipSelect);

    /// Program the bus clock used for the given chip
    fn set_flash_clock_mhz(&mut self, cs: ChipSelect, mhz: u32);

    /// Current CPU clock
    fn cpu_clock_mhz(&self) -> u32;

    /// Change the CPU clock (used by calibration sweeps)
    fn set_cpu_clock_mhz(&mut self, mhz: u32);

    /// Drop cached lines covering a flash range after it changed
    fn invalidate_cache(&mut self, _offset: u32, _len: u32) {}
}
