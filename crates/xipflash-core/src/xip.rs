//! Execute-in-place gate
//!
//! Code that streams from the memory-mapped flash window (a DMA master
//! fetching assets, a cache refill burst) registers itself here for the
//! duration. Writers and erasers wait for the count to drop to zero before
//! they take the bus, so a mapped read is never cut off mid-burst.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::bus::SpiTransport;
use crate::platform::ExecContext;

/// Default nesting limit
pub const DEFAULT_LIMIT: u32 = 20;

const TASK_POLL_MS: u32 = 2;
const IRQ_SETTLE_US: u32 = 5_000;
const WARN_AFTER_MS: u32 = 1_000;

/// Who is waiting on the gate, for the overtime log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateUser {
    /// Page program
    Write,
    /// Sector or block erase
    Erase,
    /// Suspend/resume bookkeeping
    Suspend,
}

/// Nesting counter of active mapped-window readers
#[derive(Debug)]
pub struct XipGate {
    count: AtomicU32,
    limit: u32,
}

impl XipGate {
    /// Gate with the given nesting limit
    pub const fn new(limit: u32) -> Self {
        Self {
            count: AtomicU32::new(0),
            limit,
        }
    }

    /// Register a mapped-window reader
    ///
    /// # Panics
    ///
    /// When the nesting limit is exceeded; readers are leaking.
    pub fn lock(&self) {
        let prev = self.count.fetch_add(1, Ordering::AcqRel);
        if prev >= self.limit {
            self.count.fetch_sub(1, Ordering::AcqRel);
            panic!("xip lock nesting exceeds {}", self.limit);
        }
    }

    /// Drop a mapped-window reader
    ///
    /// # Panics
    ///
    /// On underflow.
    pub fn unlock(&self) {
        let res = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1));
        if res.is_err() {
            panic!("xip unlock without lock");
        }
    }

    /// Active readers
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    /// Wait until no mapped-window reader is active
    ///
    /// Task context sleeps in 2 ms steps and complains once per second.
    /// Interrupt context cannot wait for a task to finish, so it gives the
    /// in-flight burst a single 5 ms grace period and proceeds.
    pub fn wait_idle<T: SpiTransport + ?Sized>(&self, t: &mut T, user: GateUser) {
        let mut waited_ms = 0;
        while self.count() != 0 {
            match t.context() {
                ExecContext::Task => {
                    t.sleep_ms(TASK_POLL_MS);
                    waited_ms += TASK_POLL_MS;
                    if waited_ms > WARN_AFTER_MS {
                        log::error!("xip gate busy for over 1s ({:?})", user);
                        waited_ms = 0;
                    }
                }
                ExecContext::Interrupt => {
                    log::warn!("flash {:?} in irq with xip reader active", user);
                    t.delay_us(IRQ_SETTLE_US);
                    break;
                }
            }
        }
    }
}

impl Default for XipGate {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedChip;

    #[test]
    fn test_nesting() {
        let gate = XipGate::new(2);
        gate.lock();
        gate.lock();
        assert_eq!(gate.count(), 2);
        gate.unlock();
        gate.unlock();
        assert_eq!(gate.count(), 0);
    }

    #[test]
    #[should_panic(expected = "nesting")]
    fn test_overflow_panics() {
        let gate = XipGate::new(1);
        gate.lock();
        gate.lock();
    }

    #[test]
    #[should_panic(expected = "without lock")]
    fn test_underflow_panics() {
        XipGate::default().unlock();
    }

    #[test]
    fn test_idle_gate_does_not_wait() {
        let gate = XipGate::default();
        let mut t = ScriptedChip::default();
        gate.wait_idle(&mut t, GateUser::Write);
        assert_eq!(t.slept_ms, 0);
        assert_eq!(t.delayed_us, 0);
    }

    #[test]
    fn test_interrupt_context_waits_once() {
        let gate = XipGate::default();
        gate.lock();
        let mut t = ScriptedChip {
            context: ExecContext::Interrupt,
            ..Default::default()
        };
        gate.wait_idle(&mut t, GateUser::Erase);
        assert_eq!(t.delayed_us, 5_000);
        assert_eq!(t.slept_ms, 0);
    }
}
