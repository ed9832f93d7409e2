//! Delay chain and bus clock tracking of supply voltage changes
//!
//! A voltage drop lowers clock and delay before the rail moves; a rise
//! raises them only after it has settled. Both sides of the change are
//! therefore always inside the chip's timing window.

use crate::chip::ChipQuirk;

/// Below this supply the bus clock is capped
pub const LOW_VOLTAGE_MV: u16 = 1000;
/// Bus clock cap at low voltage
pub const LOW_VOLTAGE_CLOCK_MHZ: u32 = 64;

/// When the notification is delivered relative to the rail change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum DvfsStage {
    /// Voltage has not moved yet
    PreChange,
    /// Voltage has settled at the new level
    PostChange,
}

/// One voltage scaling notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct VoltageChange {
    /// Supply before the change
    pub old_mv: u16,
    /// Supply after the change
    pub new_mv: u16,
    /// Delivery stage
    pub stage: DvfsStage,
}

/// Which register goes first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOrder {
    /// Bus clock, then delay chain (voltage decrease)
    ClockFirst,
    /// Delay chain, then bus clock (voltage increase)
    DelayFirst,
}

/// What to program for one chip on a voltage change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DvfsPlan {
    /// Register order
    pub order: ApplyOrder,
    /// New delay chain, `None` if the table has no row for the voltage
    pub delay: Option<u8>,
    /// New bus clock
    pub clock_mhz: u32,
}

/// Bus clock for a supply voltage
pub fn clock_for(quirk: &ChipQuirk, vdd_mv: u16) -> u32 {
    if vdd_mv < LOW_VOLTAGE_MV {
        LOW_VOLTAGE_CLOCK_MHZ
    } else {
        quirk.max_clock_mhz
    }
}

/// Decide what a notification means for a chip, if anything
///
/// Returns `None` for equal voltages and for the stage that does not
/// apply to the direction of the change.
pub fn plan(quirk: &ChipQuirk, change: &VoltageChange) -> Option<DvfsPlan> {
    let order = match (change.new_mv.cmp(&change.old_mv), change.stage) {
        (core::cmp::Ordering::Less, DvfsStage::PreChange) => ApplyOrder::ClockFirst,
        (core::cmp::Ordering::Greater, DvfsStage::PostChange) => ApplyOrder::DelayFirst,
        _ => return None,
    };
    Some(DvfsPlan {
        order,
        delay: quirk.delay_for(change.new_mv),
        clock_mhz: clock_for(quirk, change.new_mv),
    })
}
