//! Emulated chip description

use serde::{Deserialize, Serialize};
use xipflash_core::chip::{ChipId, XT25F64F};

/// Delay chain values the chip samples correctly at
///
/// The window narrows by `high_clock_shrink` on each side once the CPU
/// runs at `high_clock_mhz` or faster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingWindow {
    /// Lowest stable delay chain value
    pub low: u8,
    /// Highest stable delay chain value
    pub high: u8,
    /// CPU clock at which the window starts to narrow
    pub high_clock_mhz: u32,
    /// Values lost on each side at high CPU clock
    pub high_clock_shrink: u8,
}

impl Default for TimingWindow {
    fn default() -> Self {
        Self {
            low: 6,
            high: 20,
            high_clock_mhz: 240,
            high_clock_shrink: 2,
        }
    }
}

impl TimingWindow {
    /// Whether `delay` samples correctly at `cpu_mhz`
    pub fn contains(&self, delay: u8, cpu_mhz: u32) -> bool {
        let shrink = if cpu_mhz >= self.high_clock_mhz {
            self.high_clock_shrink
        } else {
            0
        };
        let low = self.low.saturating_add(shrink);
        let high = self.high.saturating_sub(shrink);
        (low..=high).contains(&delay)
    }
}

/// Emulated chip model and its timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimChipConfig {
    /// JEDEC ID, manufacturer in the low byte
    pub id: u32,
    /// Non-volatile status register contents at power-on
    pub status: [u8; 3],
    /// The chip understands the dedicated SR2 write opcode
    pub wrsr2_supported: bool,
    /// The chip implements program/erase suspend
    pub suspend_supported: bool,
    /// Resume corrupts the target unless it was read just before;
    /// `None` derives it from the ID
    pub resume_erratum: Option<bool>,
    /// Stable delay chain window
    pub timing: TimingWindow,
    /// Bytes from offset 0 covered when block protection is on
    pub protected_len: u32,
    /// Factory unique ID
    pub unique_id: [u8; 16],
    /// Page program time
    pub page_program_us: u32,
    /// 4 KiB sector erase time
    pub sector_erase_us: u32,
    /// 64 KiB block erase time
    pub block_erase_us: u32,
    /// Time from the suspend opcode until WIP drops
    pub suspend_latency_us: u32,
}

impl Default for SimChipConfig {
    fn default() -> Self {
        Self {
            id: 0x1560C8,
            status: [0; 3],
            wrsr2_supported: true,
            suspend_supported: true,
            resume_erratum: None,
            timing: TimingWindow::default(),
            protected_len: 16 * 1024,
            unique_id: [
                0x55, 0x49, 0x44, 0x00, 0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0, 0x0f,
                0x1e, 0x2d, 0x3c,
            ],
            page_program_us: 400,
            sector_erase_us: 30_000,
            block_erase_us: 150_000,
            suspend_latency_us: 20,
        }
    }
}

impl SimChipConfig {
    /// Default model with the given JEDEC ID
    pub fn with_id(id: u32) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// JEDEC ID as the driver sees it
    pub fn chip_id(&self) -> ChipId {
        ChipId(self.id)
    }

    /// Whether resume needs the read-before-resume workaround
    pub fn has_resume_erratum(&self) -> bool {
        self.resume_erratum
            .unwrap_or_else(|| self.chip_id() == XT25F64F)
    }
}
