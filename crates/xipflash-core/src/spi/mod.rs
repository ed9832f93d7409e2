//! SPI types and command structures
//!
//! This module provides types for representing bus transactions, the
//! multi-wire phase flags and the serial NOR opcodes.

mod address;
mod command;
mod flags;
pub mod opcodes;

pub use address::AddressWidth;
pub use command::SpiCommand;
pub use flags::TransferFlags;
pub use opcodes::*;
