//! Write command implementation
//!
//! Partial sectors at either end of the image are read first and merged,
//! so erasing before the write leaves the neighbouring data intact.

use std::fs;
use std::path::Path;

use xipflash_core::chip::SECTOR_SIZE;
use xipflash_sim::SimFlash;

use super::byte_bar;
use super::read::read_with_progress;
use crate::error::{CliError, Result};

/// Chunk size for writing and erasing progress
const WRITE_CHUNK_SIZE: usize = 4096;

/// Sector-aligned range covering `start..start + len`
fn sector_span(start: u32, len: u32) -> (u32, u32) {
    let first = start & !(SECTOR_SIZE - 1);
    let end = (start + len).div_ceil(SECTOR_SIZE) * SECTOR_SIZE;
    (first, end - first)
}

/// Index of the first byte that differs
fn first_mismatch(expected: &[u8], actual: &[u8]) -> Option<usize> {
    expected.iter().zip(actual).position(|(a, b)| a != b)
}

/// Run the write command
pub fn run_write(
    flash: &mut SimFlash,
    input: &Path,
    start: u32,
    verify: bool,
    erase: bool,
) -> Result<()> {
    let data = fs::read(input).map_err(CliError::io(input))?;
    let len = u32::try_from(data.len())
        .ok()
        .filter(|&len| u64::from(start) + u64::from(len) <= flash.size())
        .ok_or_else(|| {
            CliError::InvalidArgument(format!(
                "{} bytes at 0x{:08X} do not fit the device (0x{:X} bytes)",
                data.len(),
                start,
                flash.size()
            ))
        })?;
    if len == 0 {
        println!("Nothing to write");
        return Ok(());
    }

    let (base, image) = if erase {
        let (first, span) = sector_span(start, len);
        let mut merged = vec![0u8; span as usize];
        read_with_progress(flash, first, &mut merged)?;
        let at = (start - first) as usize;
        merged[at..at + data.len()].copy_from_slice(&data);

        let pb = byte_bar(u64::from(span), "Erasing")?;
        let mut offset = first;
        while offset < first + span {
            flash.erase(offset, SECTOR_SIZE)?;
            offset += SECTOR_SIZE;
            pb.inc(u64::from(SECTOR_SIZE));
        }
        pb.finish_with_message("Erase complete");
        (first, merged)
    } else {
        (start, data)
    };

    let pb = byte_bar(image.len() as u64, "Writing")?;
    let mut offset = base;
    for chunk in image.chunks(WRITE_CHUNK_SIZE) {
        flash.write(offset, chunk)?;
        offset += chunk.len() as u32;
        pb.inc(chunk.len() as u64);
    }
    pb.finish_with_message("Write complete");

    if verify {
        let mut readback = vec![0u8; image.len()];
        read_with_progress(flash, base, &mut readback)?;
        if let Some(at) = first_mismatch(&image, &readback) {
            return Err(CliError::VerifyFailed(base + at as u32));
        }
        println!("Verified {} bytes", image.len());
    }

    println!("Wrote {} bytes at 0x{:08X}", len, start);
    Ok(())
}
