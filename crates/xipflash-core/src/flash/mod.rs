//! Flat byte-addressed flash device
//!
//! [`NorFlash`] is what the rest of the firmware sees: `read`, `write`,
//! `erase` and `set_write_protection` over one logical address space,
//! plus the optional features enabled in [`crate::config::Capabilities`].

mod device;
mod storage;

pub use device::NorFlash;

use crate::chip::{ERASE_VALUE, SECTOR_SIZE};

/// Geometry reported to storage layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashParameters {
    /// Smallest unit a storage layer should rewrite
    pub write_block_size: u32,
    /// Value of erased bytes
    pub erase_value: u8,
}

impl Default for FlashParameters {
    fn default() -> Self {
        Self {
            write_block_size: SECTOR_SIZE,
            erase_value: ERASE_VALUE,
        }
    }
}

/// Uniform page layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    /// Number of pages
    pub pages_count: u32,
    /// Bytes per page
    pub pages_size: u32,
}
