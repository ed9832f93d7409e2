//! xipflash-core - Serial NOR flash controller core
//!
//! This crate drives a serial NOR flash chip sitting on a SPI-like bus that
//! is shared with execute-in-place code fetch. It is `no_std` compatible and
//! consumes the hardware (controller registers, chip-select GPIO, interrupt
//! lock, delays, clocks) through the traits in [`bus`] and [`platform`].
//!
//! Layers, bottom-up:
//!
//! - [`bus`] - the transaction primitive (prepare, chip select, multi-wire
//!   phases, CPU or DMA data path)
//! - [`protocol`] - JEDEC opcode sequences built on the primitive
//! - [`wp`], [`security`], [`suspend`], [`calibration`] - chip policies
//! - [`flash`] - the device handle with the flat read/write/erase interface,
//!   including the dual chip-select router from [`dualcs`]
//!
//! # Features
//!
//! - `std` - Enable standard library support (`std::error::Error` and serde
//!   derives on configuration types)
//!
//! # Example
//!
//! ```ignore
//! use xipflash_core::flash::NorFlash;
//!
//! let mut flash = NorFlash::new(bus, config, &XIP_GATE);
//! flash.init()?;
//! flash.erase(0x10000, 0x1000)?;
//! flash.write(0x10000, b"hello")?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod bus;
pub mod calibration;
pub mod chip;
pub mod config;
pub mod dualcs;
pub mod error;
pub mod flash;
pub mod platform;
pub mod protocol;
pub mod security;
pub mod spi;
pub mod suspend;
pub mod wp;
pub mod xip;

#[cfg(test)]
mod testutil;

pub use error::{ContractViolation, Error, Result};
