//! Erase command implementation

use xipflash_core::chip::BLOCK_SIZE;
use xipflash_sim::SimFlash;

use super::{byte_bar, format_size};
use crate::error::{CliError, Result};

/// End of the erase range, rejected when it runs past the device
fn erase_end(start: u32, len: u32, size: u64) -> Result<u64> {
    let end = u64::from(start) + u64::from(len);
    if end > size {
        return Err(CliError::InvalidArgument(format!(
            "0x{:X} bytes at 0x{:08X} do not fit the device (0x{:X} bytes)",
            len, start, size
        )));
    }
    Ok(end)
}

/// Run the erase command
///
/// Without a range the whole address space is erased, block by block.
pub fn run_erase(flash: &mut SimFlash, start: Option<u32>, length: Option<u32>) -> Result<()> {
    let (start, len) = match (start, length) {
        (Some(start), Some(len)) => (start, len),
        (Some(_), None) | (None, Some(_)) => {
            return Err(CliError::InvalidArgument(
                "Both --start and --length must be specified for partial erase".into(),
            ));
        }
        (None, None) => {
            let size = u32::try_from(flash.size()).map_err(|_| {
                CliError::InvalidArgument("device too large for one erase".into())
            })?;
            (0, size)
        }
    };

    let end = erase_end(start, len, flash.size())?;
    let pb = byte_bar(u64::from(len), "Erasing")?;
    let mut offset = u64::from(start);
    while offset < end {
        // Whole blocks where possible; the driver rejects unaligned pieces
        let block = u64::from(BLOCK_SIZE);
        let step = if offset % block == 0 && end - offset >= block {
            block
        } else {
            (end - offset).min(block - offset % block)
        };
        // Both fit in u32: end is bounded by the device size
        flash.erase(offset as u32, step as u32)?;
        offset += step;
        pb.inc(step);
    }
    pb.finish_with_message("Erase complete");

    println!(
        "Erased {} starting at 0x{:08X}",
        format_size(u64::from(len)),
        start
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erase_end_within_device() {
        assert_eq!(erase_end(0x1000, 0x1000, 2 << 20).unwrap(), 0x2000);
        assert_eq!(erase_end(0, 2 << 20, 2 << 20).unwrap(), 2 << 20);
    }

    #[test]
    fn test_erase_end_rejects_wrapping_range() {
        assert!(matches!(
            erase_end(0xFFFF_F000, 0x2000, 2 << 20),
            Err(CliError::InvalidArgument(_))
        ));
        assert!(erase_end(0x1F_F000, 0x2000, 2 << 20).is_err());
    }
}
