//! Security register commands

use std::fs;
use std::path::Path;

use xipflash_sim::SimFlash;

use super::hex_dump;
use crate::error::{CliError, Result};

/// Dump part of a security region to a file or stdout
pub fn run_security_read(
    flash: &mut SimFlash,
    index: u8,
    offset: u32,
    length: u32,
    output: Option<&Path>,
) -> Result<()> {
    let mut data = vec![0u8; length as usize];
    flash.read_security_region(index, offset, &mut data)?;
    match output {
        Some(path) => {
            fs::write(path, &data).map_err(CliError::io(path))?;
            println!("Wrote {} bytes of region {} to {:?}", data.len(), index, path);
        }
        None => print!("{}", hex_dump(offset, &data)),
    }
    Ok(())
}

/// Program a file into a security region
pub fn run_security_write(flash: &mut SimFlash, index: u8, offset: u32, input: &Path) -> Result<()> {
    let data = fs::read(input).map_err(CliError::io(input))?;
    flash.write_security_region(index, offset, &data)?;
    println!(
        "Programmed {} bytes into region {} at 0x{:03X}",
        data.len(),
        index,
        offset
    );
    Ok(())
}

/// Erase a security region
pub fn run_security_erase(flash: &mut SimFlash, index: u8) -> Result<()> {
    flash.erase_security_region(index)?;
    println!("Erased security region {}", index);
    Ok(())
}
