//! CLI command implementations
//!
//! Every command runs against an initialized [`SimFlash`] on an emulated
//! board; the board handle is passed where a command reports register or
//! clock state the driver does not expose.
//!
//! [`SimFlash`]: xipflash_sim::SimFlash

mod calibrate;
mod dvfs;
mod erase;
mod probe;
mod read;
mod security;
mod wp;
mod write;

pub use calibrate::run_calibrate;
pub use dvfs::run_dvfs;
pub use erase::run_erase;
pub use probe::{run_probe, run_uid};
pub use read::run_read;
pub use security::{run_security_erase, run_security_read, run_security_write};
pub use wp::{run_wp_set, run_wp_status};
pub use write::run_write;

use indicatif::{ProgressBar, ProgressStyle};

use crate::error::Result;

/// Byte progress bar with a phase label
fn byte_bar(total: u64, phase: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{eta}}) {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Format a byte count as KiB or MiB where it divides evenly
fn format_size(size: u64) -> String {
    if size >= 1024 * 1024 && size % (1024 * 1024) == 0 {
        format!("{} MiB", size / (1024 * 1024))
    } else if size >= 1024 && size % 1024 == 0 {
        format!("{} KiB", size / 1024)
    } else {
        format!("{} bytes", size)
    }
}

/// Hex dump with offsets, 16 bytes per line
fn hex_dump(base: u32, data: &[u8]) -> String {
    let mut out = String::new();
    for (i, line) in data.chunks(16).enumerate() {
        let hex: Vec<String> = line.iter().map(|b| format!("{:02x}", b)).collect();
        let ascii: String = line
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect();
        out.push_str(&format!(
            "{:08x}  {:<47}  {}\n",
            base as usize + i * 16,
            hex.join(" "),
            ascii
        ));
    }
    out
}
