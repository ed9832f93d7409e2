//! xipflash - serial NOR flash driver exerciser
//!
//! Runs the `xipflash-core` driver against an emulated board: the SPI
//! controller, the chips behind it and the RTOS services the driver calls
//! into are all simulated, so every driver operation can be tried from
//! the command line without hardware.
//!
//! The board comes from a TOML description (see [`board`]); without one a
//! single GD25Q16 on a one-wire bus is used.

mod board;
mod cli;
mod commands;
mod error;

use std::fs;

use clap::Parser;
use cli::{Cli, Commands, SecurityCommands, WpCommands};
use xipflash_core::bus::ChipSelect;
use xipflash_core::config::Capabilities;
use xipflash_sim::{leak_gate, SimBoard, SimFlash};

use board::BoardSpec;
use error::{CliError, Result};

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let spec = match &cli.board {
        Some(path) => BoardSpec::from_file(path)?,
        None => BoardSpec::default(),
    };
    let (board, mut flash) = open_board(&spec)?;

    run(&cli.command, &board, &mut flash)?;

    if let Some(path) = &cli.save {
        let state = board.state();
        if let Some(chip) = state.chip(ChipSelect::Primary) {
            fs::write(path, chip.data()).map_err(CliError::io(path))?;
            log::info!("saved chip 0 contents to {:?}", path);
        }
    }
    Ok(())
}

/// Build the emulated board, preload images and initialize the driver
fn open_board(spec: &BoardSpec) -> Result<(SimBoard, SimFlash)> {
    let secondary = spec
        .secondary
        .as_ref()
        .filter(|_| spec.config.has(Capabilities::DUAL_CS));
    let board = SimBoard::with_chips(
        spec.primary.model.clone(),
        secondary.map(|s| s.model.clone()),
    )?;

    for (cs, chip) in [
        (ChipSelect::Primary, Some(&spec.primary)),
        (ChipSelect::Secondary, secondary),
    ] {
        let Some((path, offset)) = chip.and_then(|c| c.image.as_ref()) else {
            continue;
        };
        let image = fs::read(path).map_err(CliError::io(path))?;
        let mut state = board.state();
        if let Some(sim) = state.chip_mut(cs) {
            sim.load(*offset, &image)?;
            log::debug!("{:?}: loaded {} bytes at 0x{:08x}", cs, image.len(), offset);
        }
    }

    let mut flash = board.flash(spec.config.clone(), leak_gate(spec.config.xip_limit));
    flash.init()?;
    Ok((board, flash))
}

fn run(command: &Commands, board: &SimBoard, flash: &mut SimFlash) -> Result<()> {
    match command {
        Commands::Probe => commands::run_probe(flash),
        Commands::Read {
            output,
            start,
            length,
        } => commands::run_read(flash, output, *start, *length),
        Commands::Write {
            input,
            start,
            no_verify,
            no_erase,
        } => commands::run_write(flash, input, *start, !no_verify, !no_erase),
        Commands::Erase { start, length } => commands::run_erase(flash, *start, *length),
        Commands::Wp(subcmd) => match subcmd {
            WpCommands::Status => commands::run_wp_status(flash, board),
            WpCommands::Enable => commands::run_wp_set(flash, true),
            WpCommands::Disable => commands::run_wp_set(flash, false),
        },
        Commands::Calibrate {
            chip,
            trials,
            scratch,
            cpu_clocks,
        } => commands::run_calibrate(flash, (*chip).into(), *trials, *scratch, cpu_clocks),
        Commands::Security(subcmd) => match subcmd {
            SecurityCommands::Read {
                index,
                offset,
                length,
                output,
            } => commands::run_security_read(flash, *index, *offset, *length, output.as_deref()),
            SecurityCommands::Write {
                index,
                offset,
                input,
            } => commands::run_security_write(flash, *index, *offset, input),
            SecurityCommands::Erase { index } => commands::run_security_erase(flash, *index),
        },
        Commands::Uid => commands::run_uid(flash),
        Commands::Dvfs { from, to } => commands::run_dvfs(flash, board, *from, *to),
    }
}
