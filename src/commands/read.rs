//! Read command implementation

use std::fs::File;
use std::io::Write;
use std::path::Path;

use xipflash_sim::SimFlash;

use super::byte_bar;
use crate::error::{CliError, Result};

/// Default chunk size for reading (4 KiB)
const READ_CHUNK_SIZE: usize = 4096;

/// Resolve an optional length against the device end
pub(super) fn resolve_range(flash: &SimFlash, start: u32, length: Option<u32>) -> Result<(u32, u32)> {
    let size = flash.size();
    if u64::from(start) >= size {
        return Err(CliError::InvalidArgument(format!(
            "start 0x{:08X} is outside the device (0x{:X} bytes)",
            start, size
        )));
    }
    let len = match length {
        Some(len) => len,
        None => u32::try_from(size - u64::from(start))
            .map_err(|_| CliError::InvalidArgument("device too large for one read".into()))?,
    };
    Ok((start, len))
}

/// Read a range of flash into `data` with a progress bar
pub(super) fn read_with_progress(flash: &mut SimFlash, start: u32, data: &mut [u8]) -> Result<()> {
    let pb = byte_bar(data.len() as u64, "Reading")?;
    let mut offset = start;
    for chunk in data.chunks_mut(READ_CHUNK_SIZE) {
        flash.read(offset, chunk)?;
        offset += chunk.len() as u32;
        pb.inc(chunk.len() as u64);
    }
    pb.finish_with_message("Read complete");
    Ok(())
}

/// Run the read command
pub fn run_read(flash: &mut SimFlash, output: &Path, start: u32, length: Option<u32>) -> Result<()> {
    let (start, len) = resolve_range(flash, start, length)?;
    let mut data = vec![0u8; len as usize];
    read_with_progress(flash, start, &mut data)?;

    let mut file = File::create(output).map_err(CliError::io(output))?;
    file.write_all(&data).map_err(CliError::io(output))?;

    println!("Wrote {} bytes to {:?}", data.len(), output);
    Ok(())
}
