//! Voltage scaling replay

use xipflash_core::bus::ChipSelect;
use xipflash_core::calibration::dvfs::{DvfsStage, VoltageChange};
use xipflash_sim::{SimBoard, SimFlash};

use crate::error::Result;

/// Deliver both notifications of one voltage change and report the result
pub fn run_dvfs(flash: &mut SimFlash, board: &SimBoard, from: u16, to: u16) -> Result<()> {
    for stage in [DvfsStage::PreChange, DvfsStage::PostChange] {
        flash.on_voltage_change(VoltageChange {
            old_mv: from,
            new_mv: to,
            stage,
        });
    }

    let state = board.state();
    for event in state.config_log() {
        log::debug!("controller: {:?}", event);
    }
    for cs in [ChipSelect::Primary, ChipSelect::Secondary] {
        let Some(chip) = flash.chip(cs) else {
            continue;
        };
        println!(
            "{:?}: {} mV, delay chain {}, bus clock {} MHz",
            cs,
            chip.vdd_mv,
            flash.bus().delay_chain(cs),
            state.flash_clock_mhz(cs)
        );
    }
    Ok(())
}
