//! Opcode sequencer
//!
//! Builds flash commands out of bus transactions. Knows nothing about
//! chip selects, locking or suspend; those are layered on top by
//! [`crate::flash::NorFlash`].

mod sequencer;

pub use sequencer::*;
