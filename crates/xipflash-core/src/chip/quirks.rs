//! Static per-chip behavior table
//!
//! Plain data keyed by JEDEC ID: block-protect encoding, delay chain per
//! supply voltage and the fastest safe bus clock. Nothing here is code;
//! the one behavioral quirk (the resume erratum) lives in
//! [`crate::suspend`].

use super::ChipId;

/// How a chip encodes "protect from offset 0 up to the boot boundary"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectPattern {
    /// Protect-relevant bits in status register 1
    pub sr1_mask: u8,
    /// Their value when protected
    pub sr1_value: u8,
    /// Protect-relevant bits in status register 2
    pub sr2_mask: u8,
    /// Their value in both states
    pub sr2_value: u8,
}

/// Delay chain to use at a given core supply voltage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayPoint {
    /// Supply voltage in millivolts
    pub vdd_mv: u16,
    /// Delay chain register value
    pub delay: u8,
}

/// One row of the chip table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipQuirk {
    /// JEDEC ID this row applies to (0 for the default row)
    pub id: ChipId,
    /// Part name for logs
    pub name: &'static str,
    /// Block-protect encoding, `None` when protection is unsupported
    pub protect: Option<ProtectPattern>,
    /// Voltage to delay chain table
    pub delays: &'static [DelayPoint],
    /// Fastest bus clock in MHz at nominal voltage
    pub max_clock_mhz: u32,
}

impl ChipQuirk {
    /// Delay chain for an exact voltage level
    pub fn delay_for(&self, vdd_mv: u16) -> Option<u8> {
        self.delays
            .iter()
            .find(|p| p.vdd_mv == vdd_mv)
            .map(|p| p.delay)
    }
}

/// Voltage level the delay chain is initialised for
pub const DEFAULT_VDD_MV: u16 = 1200;

const fn dp(vdd_mv: u16, delay: u8) -> DelayPoint {
    DelayPoint { vdd_mv, delay }
}

/// Delay table for 3-byte address parts
pub const DELAYS_3B: &[DelayPoint] = &[
    dp(950, 11),
    dp(1000, 10),
    dp(1100, 11),
    dp(1150, 11),
    dp(1200, 13),
];

/// Delay table for 4-byte address parts
pub const DELAYS_4B: &[DelayPoint] = &[
    dp(950, 9),
    dp(1000, 10),
    dp(1100, 10),
    dp(1150, 10),
    dp(1200, 11),
];

/// BP4..BP0 in SR1 bits 2..6 set to 0b11011 (lower 16 KiB), CMP cleared
const GD_LOWER_16K: ProtectPattern = ProtectPattern {
    sr1_mask: 0x1F << 2,
    sr1_value: 0x1B << 2,
    sr2_mask: 0x40,
    sr2_value: 0,
};

/// SEC=1, TB=1, BP=001 (lower 4 KiB), CMP cleared
const WINBOND_LOWER_4K: ProtectPattern = ProtectPattern {
    sr1_mask: 0x7C,
    sr1_value: 0x64,
    sr2_mask: 0x40,
    sr2_value: 0,
};

/// The chip table. Row 0 is the fallback for unknown IDs.
pub static CHIP_QUIRKS: &[ChipQuirk] = &[
    ChipQuirk {
        id: ChipId(0),
        name: "generic",
        protect: None,
        delays: DELAYS_3B,
        max_clock_mhz: 80,
    },
    ChipQuirk {
        id: ChipId(0x1560C8),
        name: "GD25Q16",
        protect: Some(GD_LOWER_16K),
        delays: DELAYS_3B,
        max_clock_mhz: 96,
    },
    ChipQuirk {
        id: ChipId(0x1840EF),
        name: "W25Q128",
        protect: Some(WINBOND_LOWER_4K),
        delays: DELAYS_3B,
        max_clock_mhz: 104,
    },
    ChipQuirk {
        id: ChipId(0x182085),
        name: "PY25Q128",
        protect: Some(GD_LOWER_16K),
        delays: DELAYS_3B,
        max_clock_mhz: 96,
    },
    ChipQuirk {
        id: ChipId(0x17400B),
        name: "XT25F64F",
        protect: None,
        delays: DELAYS_3B,
        max_clock_mhz: 80,
    },
    ChipQuirk {
        id: ChipId(0x192085),
        name: "PY25Q256HB",
        protect: None,
        delays: DELAYS_4B,
        max_clock_mhz: 96,
    },
    ChipQuirk {
        id: ChipId(0x1A47C8),
        name: "GD25B512ME",
        protect: None,
        delays: DELAYS_4B,
        max_clock_mhz: 104,
    },
];

/// Exact row for `id`, if the chip is known
pub fn lookup(id: ChipId) -> Option<&'static ChipQuirk> {
    CHIP_QUIRKS[1..].iter().find(|q| q.id == id)
}

/// Row for `id`, falling back to the generic row
pub fn lookup_or_default(id: ChipId) -> &'static ChipQuirk {
    lookup(id).unwrap_or(&CHIP_QUIRKS[0])
}
