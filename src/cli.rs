//! CLI argument parsing

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use xipflash_core::bus::ChipSelect;

/// Parse a string as a hex or decimal u32
pub fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "xipflash")]
#[command(author, version, about = "Serial NOR flash driver on an emulated XIP board", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Board description (TOML); defaults to a single GD25Q16 on a 1-wire bus
    #[arg(short, long, global = true)]
    pub board: Option<PathBuf>,

    /// Save the contents of chip 0 to this file when the command finishes
    #[arg(long, global = true)]
    pub save: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Chip select on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChipArg {
    /// Controller chip select (the XIP chip)
    Primary,
    /// GPIO chip select
    Secondary,
}

impl From<ChipArg> for ChipSelect {
    fn from(arg: ChipArg) -> Self {
        match arg {
            ChipArg::Primary => ChipSelect::Primary,
            ChipArg::Secondary => ChipSelect::Secondary,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe the chips and print what was found
    Probe,

    /// Read flash contents to file
    Read {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Start offset (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,

        /// Number of bytes; defaults to the rest of the device
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,
    },

    /// Write file to flash
    Write {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Start offset (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,

        /// Skip the read-back after writing
        #[arg(long)]
        no_verify: bool,

        /// Don't erase before writing
        #[arg(long)]
        no_erase: bool,
    },

    /// Erase flash
    Erase {
        /// Start address for partial erase (hex, e.g., 0x10000)
        #[arg(long, value_parser = parse_hex_u32)]
        start: Option<u32>,

        /// Length of region to erase (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,
    },

    /// Block protection of the boot area
    #[command(subcommand)]
    Wp(WpCommands),

    /// Sweep the delay chain and apply the most stable value
    Calibrate {
        /// Chip to calibrate
        #[arg(long, value_enum, default_value = "primary")]
        chip: ChipArg,

        /// Trials per delay value and CPU clock
        #[arg(long, default_value = "8")]
        trials: u16,

        /// Program and read back a scratch sector instead of re-reading the ID
        #[arg(long, value_parser = parse_hex_u32)]
        scratch: Option<u32>,

        /// CPU clocks (MHz) to repeat the sweep at (comma-separated)
        #[arg(long, value_delimiter = ',')]
        cpu_clocks: Vec<u32>,
    },

    /// Security register access
    #[command(subcommand)]
    Security(SecurityCommands),

    /// Print the factory unique ID
    Uid,

    /// Replay a supply voltage change
    Dvfs {
        /// Supply before the change (mV)
        #[arg(long)]
        from: u16,

        /// Supply after the change (mV)
        #[arg(long)]
        to: u16,
    },
}

/// Write protection subcommands
#[derive(Subcommand)]
pub enum WpCommands {
    /// Show the status registers of each chip
    Status,
    /// Protect the boot area
    Enable,
    /// Remove the protection
    Disable,
}

/// Security register subcommands
#[derive(Subcommand)]
pub enum SecurityCommands {
    /// Dump a region
    Read {
        /// Region index (0-3)
        #[arg(long)]
        index: u8,

        /// Offset inside the region
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        offset: u32,

        /// Number of bytes
        #[arg(long, value_parser = parse_hex_u32, default_value = "0x400")]
        length: u32,

        /// Output file; hex dump to stdout if not specified
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Program a file into a region
    Write {
        /// Region index (0-3)
        #[arg(long)]
        index: u8,

        /// Offset inside the region
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        offset: u32,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Erase a region
    Erase {
        /// Region index (0-3)
        #[arg(long)]
        index: u8,
    },
}
