//! Write protection command implementations

use xipflash_core::bus::ChipSelect;
use xipflash_core::chip::ProtectPattern;
use xipflash_core::wp::ProtectionChange;
use xipflash_sim::{SimBoard, SimFlash};

use crate::error::Result;

/// Format the protection state encoded in the status registers
fn format_state(pattern: Option<ProtectPattern>, sr1: u8, sr2: u8) -> &'static str {
    match pattern {
        None => "unsupported",
        Some(p) if sr1 & p.sr1_mask == p.sr1_value && sr2 & p.sr2_mask == p.sr2_value => {
            "boot area protected"
        }
        Some(p) if sr1 & p.sr1_mask == 0 => "disabled",
        Some(_) => "other range",
    }
}

/// Show status registers and protection state of each chip
pub fn run_wp_status(flash: &SimFlash, board: &SimBoard) -> Result<()> {
    let state = board.state();
    let now = state.now_us();
    for cs in [ChipSelect::Primary, ChipSelect::Secondary] {
        let (Some(chip), Some(sim)) = (flash.chip(cs), state.chip(cs)) else {
            continue;
        };
        let [sr1, sr2, sr3] = sim.status(now);
        println!(
            "{:?} ({}): SR1=0x{:02x} SR2=0x{:02x} SR3=0x{:02x}, {}",
            cs,
            chip.quirk().name,
            sr1,
            sr2,
            sr3,
            format_state(chip.quirk().protect, sr1, sr2)
        );
    }
    Ok(())
}

/// Enable or disable boot area protection
pub fn run_wp_set(flash: &mut SimFlash, enable: bool) -> Result<()> {
    let changes = flash.set_write_protection(enable)?;
    for (cs, change) in [ChipSelect::Primary, ChipSelect::Secondary]
        .into_iter()
        .zip(changes)
    {
        let Some(change) = change else {
            continue;
        };
        match change {
            ProtectionChange::Unsupported => {
                println!("{:?}: write protection not supported by this chip", cs)
            }
            ProtectionChange::Unchanged => println!("{:?}: already in the requested state", cs),
            ProtectionChange::Applied { sr1, sr2 } => println!(
                "{:?}: protection {} (SR1=0x{:02x} SR2=0x{:02x})",
                cs,
                if enable { "enabled" } else { "disabled" },
                sr1,
                sr2
            ),
        }
    }
    Ok(())
}
