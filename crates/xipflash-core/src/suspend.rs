//! Program/erase suspend and resume
//!
//! A long erase is started without waiting, suspended straight away, and
//! then driven to completion by [`wait_finished`]: resume, give the chip a
//! little time, and if it is still busy suspend it again and let the task
//! sleep. While the chip sits suspended, code fetch from the mapped window
//! proceeds normally.
//!
//! Only the completion wait is allowed to run out. When it does, the
//! operation is finished with an unbounded busy wait; an erase cannot be
//! abandoned halfway.

use crate::bus::{BusFlags, SpiTransport};
use crate::chip::{ChipFlags, ChipState, PendingOp, SuspendState, XT25F64F};
use crate::error::Result;
use crate::platform::ExecContext;
use crate::protocol::{self, StatusReg};
use crate::spi::opcodes;
use crate::xip::{GateUser, XipGate};

/// Erases of this size or more run without suspend
pub const NO_SUSPEND_ERASE_LEN: u32 = 256 * 1024;

const SUSPEND_ATTEMPTS: u32 = 3;
const SUSPEND_LATENCY_US: u32 = 30;
const SHORT_POLL_US: u32 = 5;
const SHORT_POLLS: u32 = 100;
const BUSY_POLL_US: u32 = 50;
const BUSY_POLLS: u32 = 20;
const FINISH_ITERATIONS: u32 = 20_000;
const ERRATUM_READ_LEN: usize = 4;

/// Record that an operation was started on the chip
pub fn begin(chip: &mut ChipState, op: PendingOp, addr: u32) {
    chip.suspend = SuspendState::Busy { op, addr };
}

fn pending(chip: &ChipState) -> Option<(PendingOp, u32)> {
    match chip.suspend {
        SuspendState::Idle => None,
        SuspendState::Busy { op, addr }
        | SuspendState::Suspended { op, addr }
        | SuspendState::Resuming { op, addr } => Some((op, addr)),
    }
}

/// Spin on WIP without a bound
fn spin_until_ready<T: SpiTransport + ?Sized>(t: &mut T) -> Result<()> {
    while protocol::is_busy(t)? {
        t.delay_us(SHORT_POLL_US);
    }
    Ok(())
}

/// Suspend the running operation
///
/// Sends the suspend opcode and waits for WIP to drop, up to three times.
/// Returns whether the chip confirmed.
pub fn suspend<T: SpiTransport + ?Sized>(t: &mut T, chip: &mut ChipState) -> Result<bool> {
    for attempt in 0..SUSPEND_ATTEMPTS {
        protocol::suspend(t)?;
        t.delay_us(SUSPEND_LATENCY_US);
        for _ in 0..SHORT_POLLS {
            t.delay_us(SHORT_POLL_US);
            if !protocol::is_busy(t)? {
                if let Some((op, addr)) = pending(chip) {
                    chip.suspend = SuspendState::Suspended { op, addr };
                }
                return Ok(true);
            }
        }
        log::warn!("chip {}: suspend not confirmed, attempt {}", chip.id, attempt + 1);
    }
    Ok(false)
}

/// Resume and report whether the operation has finished
///
/// On a chip that keeps running past the short wait the operation is
/// suspended again and `false` is returned.
pub fn resume_and_check_idle<T: SpiTransport + ?Sized>(
    t: &mut T,
    chip: &mut ChipState,
    gate: &XipGate,
) -> Result<bool> {
    gate.wait_idle(t, GateUser::Suspend);

    let target = pending(chip);
    if chip.id == XT25F64F {
        // Resuming this part flips bits at the target unless the target is
        // read first, and the resume must not be preceded by 0xFF 0xFF.
        if let Some((_, addr)) = target {
            let mut scratch = [0u8; ERRATUM_READ_LEN];
            protocol::read(t, chip, addr, &mut scratch)?;
        }
        let flags = t.flags();
        t.set_flags(flags | BusFlags::NO_EXIT_CONTINUOUS_READ);
        let res = protocol::resume(t);
        t.set_flags(flags);
        res?;
    } else {
        protocol::resume(t)?;
    }
    if let Some((op, addr)) = target {
        chip.suspend = SuspendState::Resuming { op, addr };
    }

    t.delay_us(SUSPEND_LATENCY_US);
    for _ in 0..SHORT_POLLS {
        t.delay_us(SHORT_POLL_US);
        if protocol::read_status(t, StatusReg::Sr2)? & opcodes::SR2_SUS1 == 0 {
            break;
        }
    }

    if !protocol::is_busy(t)? {
        chip.suspend = SuspendState::Idle;
        return Ok(true);
    }
    for _ in 0..BUSY_POLLS {
        t.delay_us(BUSY_POLL_US);
        if !protocol::is_busy(t)? {
            chip.suspend = SuspendState::Idle;
            return Ok(true);
        }
    }

    suspend(t, chip)?;
    Ok(false)
}

/// Drive a suspended operation to completion
///
/// Task callers sleep 1 ms every other round while the chip is suspended.
pub fn wait_finished<T: SpiTransport + ?Sized>(
    t: &mut T,
    chip: &mut ChipState,
    gate: &XipGate,
) -> Result<()> {
    for i in 0..FINISH_ITERATIONS {
        if resume_and_check_idle(t, chip, gate)? {
            return Ok(());
        }
        if t.context() == ExecContext::Task && i % 2 == 0 {
            t.sleep_ms(1);
        }
    }

    log::error!("nor resume error");
    gate.wait_idle(t, GateUser::Suspend);
    if matches!(chip.suspend, SuspendState::Suspended { .. }) {
        protocol::resume(t)?;
    }
    spin_until_ready(t)?;
    chip.suspend = SuspendState::Idle;
    Ok(())
}

/// Resume and wait for completion, no questions asked
pub fn resume_finished<T: SpiTransport + ?Sized>(t: &mut T, chip: &mut ChipState) -> Result<()> {
    log::info!("chip {}: suspended, waiting for resume to finish", chip.id);
    protocol::resume(t)?;
    t.delay_us(SHORT_POLL_US);
    spin_until_ready(t)?;
    chip.suspend = SuspendState::Idle;
    Ok(())
}

/// Interrupt entry hook
///
/// A task that was preempted inside [`wait_finished`] leaves the chip
/// suspended and marked no-wait. An interrupt-context caller cannot wait
/// for that task, so it completes the operation itself.
pub fn finish_pending<T: SpiTransport + ?Sized>(t: &mut T, chip: &mut ChipState) -> Result<()> {
    if t.context() != ExecContext::Interrupt || !chip.flags.contains(ChipFlags::NO_WAIT_READY) {
        return Ok(());
    }
    resume_finished(t, chip)?;
    chip.flags.remove(ChipFlags::NO_WAIT_READY);
    Ok(())
}

/// Complete an operation left suspended across a reset
///
/// Checks both suspend status bits.
pub fn recover_at_init<T: SpiTransport + ?Sized>(t: &mut T, chip: &mut ChipState) -> Result<bool> {
    let sr2 = protocol::read_status(t, StatusReg::Sr2)?;
    if sr2 & (opcodes::SR2_SUS1 | opcodes::SR2_SUS2) == 0 {
        return Ok(false);
    }
    resume_finished(t, chip)?;
    Ok(true)
}

/// Whether an erase of `len` bytes may use suspend
pub fn erase_may_suspend(len: u32, context: ExecContext) -> bool {
    len < NO_SUSPEND_ERASE_LEN && context == ExecContext::Task
}
