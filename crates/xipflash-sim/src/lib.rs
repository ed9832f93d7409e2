//! Emulated execute-in-place flash board
//!
//! An in-memory stand-in for the hardware `xipflash-core` drives: an SPI
//! flash controller with a GPIO chip select, one or two serial NOR chips
//! that decode real command bytes, and platform hooks running on a virtual
//! clock. Program and erase take virtual time, honor suspend and resume,
//! and the chips reproduce the quirks the driver works around.
//!
//! ```no_run
//! use xipflash_core::config::BoardConfig;
//! use xipflash_sim::{leak_gate, SimBoard, SimChipConfig};
//!
//! let board = SimBoard::new(SimChipConfig::default()).unwrap();
//! let mut flash = board.flash(BoardConfig::default(), leak_gate(20));
//! flash.init().unwrap();
//! let mut buf = [0u8; 16];
//! flash.read(0, &mut buf).unwrap();
//! ```

mod board;
pub mod chip;
pub mod config;
mod controller;
pub mod error;
mod pin;
mod platform;

pub use board::{
    leak_gate, BoardState, ConfigEvent, SimBoard, SimFlash, SleepHook, TraceEvent,
    DEFAULT_CPU_MHZ,
};
pub use chip::{ChipStats, SimChip, Transaction};
pub use config::{SimChipConfig, TimingWindow};
pub use controller::SimController;
pub use error::{Result, SimError};
pub use pin::SimCsPin;
pub use platform::SimPlatform;
