//! Probe and unique ID commands

use xipflash_core::bus::ChipSelect;
use xipflash_sim::SimFlash;

use super::format_size;
use crate::error::Result;

/// Print what init found on each chip select
pub fn run_probe(flash: &SimFlash) -> Result<()> {
    for cs in [ChipSelect::Primary, ChipSelect::Secondary] {
        let Some(chip) = flash.chip(cs) else {
            continue;
        };
        println!("{:?} chip:", cs);
        println!("  Name:         {}", chip.quirk().name);
        println!("  JEDEC ID:     {:06X}", chip.id.raw());
        println!("  Size:         {}", format_size(u64::from(chip.size)));
        println!("  Addressing:   {:?}", chip.address_mode);
        println!("  Delay chain:  {}", flash.bus().delay_chain(cs));
        println!("  Supply:       {} mV", chip.vdd_mv);
        if !chip.flags.is_empty() {
            println!("  Flags:        {:?}", chip.flags);
        }
    }
    println!("Address space:  {}", format_size(flash.size()));
    Ok(())
}

/// Print the factory unique ID of chip 0
pub fn run_uid(flash: &mut SimFlash) -> Result<()> {
    let mut uid = [0u8; 16];
    let len = flash.read_unique_id(&mut uid)?;
    let hex: Vec<String> = uid[..len].iter().map(|b| format!("{:02X}", b)).collect();
    println!("Unique ID: {}", hex.join(""));
    Ok(())
}
