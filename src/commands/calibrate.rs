//! Delay chain calibration command

use indicatif::{ProgressBar, ProgressStyle};
use xipflash_core::bus::ChipSelect;
use xipflash_core::calibration::{Calibration, SweepConfig, TrialMode, MAX_CPU_CLOCKS};
use xipflash_sim::SimFlash;

use crate::error::{CliError, Result};

/// Build the sweep parameters from the command line
fn sweep_config(trials: u16, scratch: Option<u32>, cpu_clocks: &[u32]) -> Result<SweepConfig> {
    let cpu_clocks = heapless::Vec::from_slice(cpu_clocks).map_err(|()| {
        CliError::InvalidArgument(format!("at most {} CPU clocks per sweep", MAX_CPU_CLOCKS))
    })?;
    let mode = match scratch {
        Some(scratch) => TrialMode::DataPattern { scratch },
        None => TrialMode::ChipId,
    };
    Ok(SweepConfig {
        mode,
        trials,
        cpu_clocks,
        ..Default::default()
    })
}

/// One line per delay value that passed at least once
fn print_passes(cal: &Calibration, max: u16) {
    for (delay, &passes) in cal.passes.iter().enumerate() {
        if passes == 0 {
            continue;
        }
        let marker = if delay == usize::from(cal.value) { " <=" } else { "" };
        println!(
            "  {:2}: {:3}/{} {}{}",
            delay,
            passes,
            max,
            "#".repeat(usize::from(passes) * 32 / usize::from(max.max(1))),
            marker
        );
    }
}

/// Run the calibrate command
pub fn run_calibrate(
    flash: &mut SimFlash,
    cs: ChipSelect,
    trials: u16,
    scratch: Option<u32>,
    cpu_clocks: &[u32],
) -> Result<()> {
    let sweep = sweep_config(trials, scratch, cpu_clocks)?;
    let values = u64::from(*sweep.range.end() - *sweep.range.start()) + 1;
    let rounds = sweep.cpu_clocks.len().max(1) as u64;

    let pb = ProgressBar::new(values * rounds);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    let before = flash.bus().delay_chain(cs);
    let res = flash.calibrate(cs, &sweep, |step| {
        pb.set_message(format!(
            "{} MHz delay {}: {}/{}",
            step.cpu_mhz, step.delay, step.passed, trials
        ));
        pb.inc(1);
    });
    pb.finish_and_clear();

    let cal = res?;
    println!(
        "{:?}: delay chain {} => {} (stable window {}..={})",
        cs,
        before,
        cal.value,
        cal.run_start,
        cal.run_start + cal.run_len - 1
    );
    print_passes(&cal, trials.saturating_mul(rounds as u16));
    Ok(())
}
