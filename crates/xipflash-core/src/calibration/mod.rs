//! Delay chain calibration
//!
//! The sweep steps the delay chain through its range, runs a number of
//! trials at each value and counts the passes. The chosen value is the
//! middle of the longest run of values tied for the best pass count, so it
//! sits as far as possible from both failing edges of the timing window.

pub mod dvfs;

use core::ops::RangeInclusive;

use heapless::Vec;

use crate::chip::{ChipId, PAGE_SIZE};
use crate::error::{Error, Result};

/// Largest delay chain register value (6 bits)
pub const DELAY_CHAIN_MAX: u8 = 63;
/// Number of delay chain values
pub const DELAY_CHAIN_VALUES: usize = DELAY_CHAIN_MAX as usize + 1;
/// Shortest run of best values that counts as a result
pub const MIN_RUN: usize = 3;
/// CPU clocks a sweep may cycle through
pub const MAX_CPU_CLOCKS: usize = 8;

/// What a single trial does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialMode {
    /// Re-read the JEDEC ID and compare with the reference
    ChipId,
    /// Erase a scratch sector, program a page pattern and read it back
    DataPattern {
        /// Sector-aligned scratch offset; its contents are destroyed
        scratch: u32,
    },
}

/// Sweep parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepConfig {
    /// Trial kind
    pub mode: TrialMode,
    /// Delay chain values to try
    pub range: RangeInclusive<u8>,
    /// Trials per value and CPU clock
    pub trials: u16,
    /// CPU clocks to repeat the sweep at; empty keeps the current clock
    pub cpu_clocks: Vec<u32, MAX_CPU_CLOCKS>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            mode: TrialMode::ChipId,
            range: 0..=DELAY_CHAIN_MAX,
            trials: 8,
            cpu_clocks: Vec::new(),
        }
    }
}

/// Sweep result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calibration {
    /// Chosen delay chain value
    pub value: u8,
    /// First value of the winning run
    pub run_start: u8,
    /// Length of the winning run
    pub run_len: u8,
    /// Pass count per delay value
    pub passes: [u16; DELAY_CHAIN_VALUES],
}

/// Sweep progress, reported once per delay value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepStep {
    /// CPU clock the step ran at
    pub cpu_mhz: u32,
    /// Delay chain value tried
    pub delay: u8,
    /// Trials that passed
    pub passed: u16,
}

/// Hooks a sweep needs on the device under calibration
pub trait SweepTarget {
    /// Current delay chain
    fn delay_chain(&self) -> u8;
    /// Program the delay chain
    fn set_delay_chain(&mut self, value: u8);
    /// Current CPU clock
    fn cpu_clock_mhz(&self) -> u32;
    /// Change the CPU clock
    fn set_cpu_clock_mhz(&mut self, mhz: u32);
    /// Read the JEDEC ID
    fn read_id(&mut self) -> Result<ChipId>;
    /// Erase one sector
    fn erase_sector(&mut self, offset: u32) -> Result<()>;
    /// Program bytes
    fn program(&mut self, offset: u32, data: &[u8]) -> Result<()>;
    /// Read bytes
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()>;
}

/// Longest run of entries equal to the maximum, first one on ties
///
/// Returns `(start, len)`, or `None` if nothing passed at all.
pub fn longest_max_run(counts: &[u16]) -> Option<(usize, usize)> {
    let max = *counts.iter().max()?;
    if max == 0 {
        return None;
    }

    let mut best: Option<(usize, usize)> = None;
    let mut i = 0;
    while i < counts.len() {
        if counts[i] != max {
            i += 1;
            continue;
        }
        let start = i;
        while i < counts.len() && counts[i] == max {
            i += 1;
        }
        let len = i - start;
        if best.map_or(true, |(_, best_len)| len > best_len) {
            best = Some((start, len));
        }
    }
    best
}

/// Pick the delay chain value from per-value pass counts
///
/// Midpoint of the longest run tied for the maximum, rounded down; `None`
/// if that run is shorter than [`MIN_RUN`].
pub fn select_delay_chain(counts: &[u16]) -> Option<usize> {
    longest_max_run(counts)
        .filter(|&(_, len)| len >= MIN_RUN)
        .map(|(start, len)| start + (len - 1) / 2)
}

fn pattern_byte(seed: u8, i: usize) -> u8 {
    (i as u8).wrapping_mul(0x1D) ^ seed ^ ((i >> 8) as u8)
}

fn run_trial<S: SweepTarget + ?Sized>(
    target: &mut S,
    mode: TrialMode,
    reference: ChipId,
    seed: u8,
) -> Result<bool> {
    match mode {
        TrialMode::ChipId => Ok(target.read_id()? == reference),
        TrialMode::DataPattern { scratch } => {
            let mut pattern = [0u8; PAGE_SIZE as usize];
            for (i, b) in pattern.iter_mut().enumerate() {
                *b = pattern_byte(seed, i);
            }
            target.erase_sector(scratch)?;
            target.program(scratch, &pattern)?;
            let mut readback = [0u8; PAGE_SIZE as usize];
            target.read(scratch, &mut readback)?;
            Ok(readback == pattern)
        }
    }
}

/// Run a sweep and apply its result
///
/// The reference ID is read at the current delay, which must be safe. The
/// original delay chain and CPU clock are restored afterwards; on success
/// the chosen value is programmed. A trial that errors counts as failed.
///
/// Returns [`Error::CalibrationFailed`] when no run of [`MIN_RUN`] values
/// passed; the default delay chain stays in place.
pub fn sweep<S, F>(target: &mut S, config: &SweepConfig, mut progress: F) -> Result<Calibration>
where
    S: SweepTarget + ?Sized,
    F: FnMut(SweepStep),
{
    let original_delay = target.delay_chain();
    let original_cpu = target.cpu_clock_mhz();
    let reference = target.read_id()?;

    let mut passes = [0u16; DELAY_CHAIN_VALUES];
    let mut clocks: Vec<u32, MAX_CPU_CLOCKS> = config.cpu_clocks.clone();
    if clocks.is_empty() {
        let _ = clocks.push(original_cpu);
    }
    let first = *config.range.start();
    let last = (*config.range.end()).min(DELAY_CHAIN_MAX);

    for &cpu_mhz in clocks.iter() {
        target.set_cpu_clock_mhz(cpu_mhz);
        for delay in first..=last {
            target.set_delay_chain(delay);
            let mut passed = 0u16;
            for trial in 0..config.trials {
                let seed = delay ^ (trial as u8);
                if let Ok(true) = run_trial(target, config.mode, reference, seed) {
                    passed += 1;
                }
            }
            passes[usize::from(delay)] += passed;
            log::trace!("cpu {} MHz delay {}: {}/{}", cpu_mhz, delay, passed, config.trials);
            progress(SweepStep {
                cpu_mhz,
                delay,
                passed,
            });
        }
    }

    target.set_cpu_clock_mhz(original_cpu);

    let window = longest_max_run(&passes).filter(|&(_, len)| len >= MIN_RUN);
    let Some((run_start, run_len)) = window else {
        target.set_delay_chain(original_delay);
        log::warn!(
            "delay chain calibration found no stable window, keeping {}",
            original_delay
        );
        return Err(Error::CalibrationFailed);
    };
    let value = run_start + (run_len - 1) / 2;

    target.set_delay_chain(value as u8);
    log::info!(
        "delay chain calibrated: {} (window {}..={}, {} passes), was {}",
        value,
        run_start,
        run_start + run_len - 1,
        passes[value],
        original_delay
    );

    Ok(Calibration {
        value: value as u8,
        run_start: run_start as u8,
        run_len: run_len as u8,
        passes,
    })
}
