#![allow(dead_code)]

use xipflash_core::bus::ChipSelect;
use xipflash_core::config::BoardConfig;
use xipflash_sim::{leak_gate, SimBoard, SimChipConfig, SimFlash, TraceEvent};

pub const GD25Q16: u32 = 0x1560C8;
pub const W25Q128: u32 = 0x1840EF;
pub const XT25F64F: u32 = 0x17400B;
pub const PY25Q256HB: u32 = 0x192085;
pub const GD25B512ME: u32 = 0x1A47C8;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Probed driver on a single-chip board
pub fn setup(chip: SimChipConfig, config: BoardConfig) -> (SimBoard, SimFlash) {
    init_logger();
    let board = SimBoard::new(chip).unwrap();
    let mut flash = board.flash(config, leak_gate(20));
    flash.init().unwrap();
    board.state().clear_trace();
    (board, flash)
}

/// Probed driver on the default GD25Q16 board
pub fn setup_default() -> (SimBoard, SimFlash) {
    setup(SimChipConfig::default(), BoardConfig::default())
}

pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed))
        .collect()
}

/// Trace entries with the given opcode
pub fn events(board: &SimBoard, opcode: u8) -> Vec<TraceEvent> {
    board
        .state()
        .trace()
        .iter()
        .filter(|e| e.opcode == opcode)
        .cloned()
        .collect()
}

/// Addresses of the trace entries with the given opcode
pub fn addresses(board: &SimBoard, opcode: u8) -> Vec<u32> {
    events(board, opcode)
        .iter()
        .filter_map(|e| e.address)
        .collect()
}

pub fn load(board: &SimBoard, cs: ChipSelect, offset: u32, data: &[u8]) {
    board
        .state()
        .chip_mut(cs)
        .unwrap()
        .load(offset, data)
        .unwrap();
}

pub fn contents(board: &SimBoard, cs: ChipSelect, offset: u32, len: usize) -> Vec<u8> {
    let state = board.state();
    let data = state.chip(cs).unwrap().data();
    data[offset as usize..offset as usize + len].to_vec()
}
