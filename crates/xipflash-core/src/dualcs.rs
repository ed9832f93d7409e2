//! Logical address space over two chip selects
//!
//! Chip 0 holds `[0, size0)`, chip 1 holds `[size0, size0 + size1)`. A
//! request crossing the boundary becomes two segments issued in order.

use heapless::Vec;

use crate::bus::ChipSelect;
use crate::error::{ContractViolation, Result};

/// One per-chip piece of a logical request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Chip that owns the piece
    pub cs: ChipSelect,
    /// Offset inside that chip
    pub local_offset: u32,
    /// Offset into the caller's buffer
    pub buf_offset: usize,
    /// Length in bytes
    pub len: u32,
}

/// Sizes of the two chips
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DualChipMap {
    /// Size of chip 0
    pub size0: u32,
    /// Size of chip 1, 0 when absent
    pub size1: u32,
}

impl DualChipMap {
    /// Single chip layout
    pub const fn single(size: u32) -> Self {
        Self {
            size0: size,
            size1: 0,
        }
    }

    /// Total logical size
    pub const fn total(&self) -> u64 {
        self.size0 as u64 + self.size1 as u64
    }

    /// Chip that owns a logical offset
    pub fn owner(&self, offset: u32) -> ChipSelect {
        if offset < self.size0 {
            ChipSelect::Primary
        } else {
            ChipSelect::Secondary
        }
    }

    /// Split a logical request into per-chip segments
    pub fn route(&self, offset: u32, len: u32) -> Result<Vec<Segment, 2>> {
        if u64::from(offset) + u64::from(len) > self.total() {
            return Err(ContractViolation::OutOfBounds { offset, len }.into());
        }

        let mut segments = Vec::new();
        if len == 0 {
            return Ok(segments);
        }

        let mut buf_offset = 0usize;
        let mut offset = offset;
        let mut remaining = len;

        if offset < self.size0 {
            let first = remaining.min(self.size0 - offset);
            // capacity is 2, at most two pushes happen
            let _ = segments.push(Segment {
                cs: ChipSelect::Primary,
                local_offset: offset,
                buf_offset,
                len: first,
            });
            buf_offset += first as usize;
            offset += first;
            remaining -= first;
        }
        if remaining > 0 {
            let _ = segments.push(Segment {
                cs: ChipSelect::Secondary,
                local_offset: offset - self.size0,
                buf_offset,
                len: remaining,
            });
        }
        Ok(segments)
    }
}
