//! Read, write and erase through the driver against the emulated board

mod common;

use common::*;
use embedded_storage::nor_flash::{self as es, NorFlashError, NorFlashErrorKind};
use xipflash_core::bus::ChipSelect;
use xipflash_core::chip::AddressMode;
use xipflash_core::config::{BoardConfig, Capabilities};
use xipflash_core::platform::ExecContext;
use xipflash_core::spi::opcodes;
use xipflash_core::{ContractViolation, Error};
use xipflash_sim::{leak_gate, SimBoard, SimChipConfig};

#[test]
fn test_probe_reads_id_and_table_delay() {
    init_logger();
    let board = SimBoard::new(SimChipConfig::default()).unwrap();
    let mut flash = board.flash(BoardConfig::default(), leak_gate(20));
    flash.init().unwrap();

    assert_eq!(flash.chip_id().unwrap().raw(), GD25Q16);
    assert_eq!(flash.size(), 2 << 20);
    assert_eq!(flash.bus().delay_chain(ChipSelect::Primary), 13);
    let state = board.state();
    assert_eq!(state.opcodes(ChipSelect::Primary)[..2], [0xFF, opcodes::RDID]);
    assert_eq!(state.flash_clock_mhz(ChipSelect::Primary), 80);
}

#[test]
fn test_skewed_sampling_fails_probe() {
    init_logger();
    let board = SimBoard::new(SimChipConfig::default()).unwrap();
    board.state().chip_mut(ChipSelect::Primary).unwrap().set_timing(
        xipflash_sim::TimingWindow {
            low: 40,
            high: 50,
            ..Default::default()
        },
    );
    let mut flash = board.flash(BoardConfig::default(), leak_gate(20));
    // Every bit read back is skewed, so the ID is garbage
    assert_eq!(flash.init(), Err(Error::ChipNotFound));
}

#[test]
fn test_erase_write_read_round_trip() {
    let (board, mut flash) = setup_default();
    load(&board, ChipSelect::Primary, 0x20000, &[0u8; 0x12000]);

    for (offset, len) in [(0x20000u32, 0x2000usize), (0x22000, 0x1000), (0x30000, 0x10000)] {
        flash.erase(offset, len as u32).unwrap();
        let data = pattern(len, offset as u8 ^ 0x5A);
        flash.write(offset, &data).unwrap();
        let mut back = vec![0u8; len];
        flash.read(offset, &mut back).unwrap();
        assert_eq!(back, data, "round trip at 0x{:x}", offset);
    }
    assert_eq!(board.state().stats(ChipSelect::Primary).busy_reads, 0);
}

#[test]
fn test_write_splits_at_page_boundary() {
    let (board, mut flash) = setup_default();
    let data = pattern(0x100, 3);

    flash.write(0x1080, &data).unwrap();
    let split = events(&board, opcodes::PP);
    assert_eq!(split.len(), 2);
    assert_eq!(split[0].address, Some(0x1080));
    assert_eq!(split[0].data_out, 0x80);
    assert_eq!(split[1].address, Some(0x1100));
    assert_eq!(split[1].data_out, 0x80);

    flash.write(0x3080, &data[..0x80]).unwrap();
    flash.write(0x3100, &data[0x80..]).unwrap();
    assert_eq!(
        contents(&board, ChipSelect::Primary, 0x1000, 0x200),
        contents(&board, ChipSelect::Primary, 0x3000, 0x200)
    );
}

#[test]
fn test_erase_picks_block_or_sector() {
    let (board, mut flash) = setup_default();

    flash.erase(0x40000, 0x10000).unwrap();
    assert_eq!(addresses(&board, opcodes::BE_D8), [0x40000]);
    assert!(events(&board, opcodes::SE_20).is_empty());

    board.state().clear_trace();
    flash.erase(0x51000, 0x10000).unwrap();
    assert!(events(&board, opcodes::BE_D8).is_empty());
    let sectors: Vec<u32> = (0..16).map(|i| 0x51000 + i * 0x1000).collect();
    assert_eq!(addresses(&board, opcodes::SE_20), sectors);

    board.state().clear_trace();
    flash.erase(0x60000, 0x11000).unwrap();
    assert_eq!(addresses(&board, opcodes::BE_D8), [0x60000]);
    assert_eq!(addresses(&board, opcodes::SE_20), [0x70000]);
}

#[test]
fn test_unaligned_erase_is_rejected_before_bus() {
    let (board, mut flash) = setup_default();
    let err = flash.erase(0x1000, 0x800).unwrap_err();
    assert_eq!(
        err,
        Error::Contract(ContractViolation::UnalignedErase {
            offset: 0x1000,
            len: 0x800
        })
    );
    assert!(err.is_fatal());
    assert!(board.state().trace().is_empty());
}

#[test]
fn test_out_of_bounds_is_rejected() {
    let (board, mut flash) = setup_default();
    let mut buf = [0u8; 32];
    let err = flash.read((2 << 20) - 16, &mut buf).unwrap_err();
    assert!(matches!(
        err,
        Error::Contract(ContractViolation::OutOfBounds { .. })
    ));
    assert!(board.state().trace().is_empty());
}

#[test]
fn test_long_transfers_use_dma() {
    let config = BoardConfig {
        dma_channel: Some(2),
        ..Default::default()
    };
    let (board, mut flash) = setup(SimChipConfig::default(), config);

    let mut short = [0u8; 8];
    flash.read(0, &mut short).unwrap();
    let mut long = [0u8; 64];
    flash.read(0x100, &mut long).unwrap();

    let reads = events(&board, opcodes::FAST_READ);
    assert_eq!(reads.len(), 2);
    assert!(!reads[0].dma);
    assert!(reads[1].dma);
}

#[test]
fn test_write_and_erase_invalidate_cache() {
    let (board, mut flash) = setup_default();
    flash.erase(0x8000, 0x1000).unwrap();
    flash.write(0x8010, &[1, 2, 3]).unwrap();
    assert_eq!(
        board.state().invalidations(),
        &[(0x8000, 0x1000), (0x8010, 3)]
    );
}

#[test]
fn test_controller_never_ready_times_out() {
    let (board, mut flash) = setup_default();
    board.state().set_not_ready_polls(u32::MAX);
    let mut buf = [0u8; 4];
    assert_eq!(flash.read(0, &mut buf), Err(Error::BusNotReady));
}

#[test]
fn test_transactions_hold_irq_lock_and_task_mutex() {
    let (board, mut flash) = setup_default();
    let before = board.state().irq_locks();
    let mut buf = [0u8; 4];
    flash.read(0, &mut buf).unwrap();

    let state = board.state();
    assert_eq!(state.irq_locks(), before + 1);
    assert_eq!(state.irq_depth(), 0);
    assert_eq!(state.mutex_locks(), 1);
    assert!(!state.mutex_held(ChipSelect::Primary));
    assert_eq!(state.lock_violations(), 0);
}

#[test]
fn test_no_irq_lock_capability() {
    let config = BoardConfig {
        capabilities: Capabilities::NO_IRQ_LOCK,
        ..Default::default()
    };
    let (board, mut flash) = setup(SimChipConfig::default(), config);
    let mut buf = [0u8; 4];
    flash.read(0, &mut buf).unwrap();
    assert_eq!(board.state().irq_locks(), 0);
}

#[test]
fn test_interrupt_context_skips_mutex_and_rejects_writes() {
    let (board, mut flash) = setup_default();
    board.state().set_context(ExecContext::Interrupt);

    let mut buf = [0u8; 4];
    flash.read(0, &mut buf).unwrap();
    assert_eq!(board.state().mutex_locks(), 0);

    board.state().clear_trace();
    let err = flash.write(0, &[0]).unwrap_err();
    assert_eq!(err, Error::Contract(ContractViolation::WriteFromInterrupt));
    assert!(err.is_fatal());
    assert_eq!(
        flash.erase(0, 0x1000),
        Err(Error::Contract(ContractViolation::WriteFromInterrupt))
    );
    assert!(board.state().trace().is_empty());
}

#[test]
fn test_panic_dump_writes_from_interrupt() {
    let config = BoardConfig {
        capabilities: Capabilities::WRITE_FROM_INTERRUPT | Capabilities::SUSPEND,
        ..Default::default()
    };
    let (board, mut flash) = setup(SimChipConfig::default(), config);
    load(&board, ChipSelect::Primary, 0x10000, &[0u8; 0x1000]);
    board.state().set_context(ExecContext::Interrupt);

    flash.erase(0x10000, 0x1000).unwrap();
    flash.write(0x10000, b"panic").unwrap();

    assert_eq!(contents(&board, ChipSelect::Primary, 0x10000, 6), b"panic\xff");
    let state = board.state();
    // Interrupt callers never suspend and never take the mutex
    assert!(!state.opcodes(ChipSelect::Primary).contains(&opcodes::SUSPEND));
    assert_eq!(state.mutex_locks(), 0);
    assert_eq!(state.slept_ms(), 0);
}

#[test]
fn test_quad_mode_reads_four_wide() {
    let config = BoardConfig {
        bus_width: 4,
        capabilities: Capabilities::QUAD,
        ..Default::default()
    };
    let (board, mut flash) = setup(SimChipConfig::default(), config);
    assert!(board
        .state()
        .chip(ChipSelect::Primary)
        .unwrap()
        .quad_enabled());

    load(&board, ChipSelect::Primary, 0x400, &pattern(32, 9));
    let mut buf = [0u8; 32];
    flash.read(0x400, &mut buf).unwrap();
    assert_eq!(buf.to_vec(), pattern(32, 9));

    let reads = events(&board, opcodes::QOR);
    assert_eq!(reads.len(), 1);
    assert_eq!(reads[0].lines, 4);
    assert_eq!(board.state().stats(ChipSelect::Primary).quad_without_qe, 0);
}

#[test]
fn test_quad_enable_falls_back_to_two_byte_wrsr() {
    let chip = SimChipConfig {
        wrsr2_supported: false,
        ..Default::default()
    };
    let config = BoardConfig {
        bus_width: 4,
        capabilities: Capabilities::QUAD | Capabilities::NXIO,
        ..Default::default()
    };
    let (board, mut flash) = setup(chip, config);
    assert!(board
        .state()
        .chip(ChipSelect::Primary)
        .unwrap()
        .quad_enabled());

    load(&board, ChipSelect::Primary, 0, &pattern(8, 1));
    let mut buf = [0u8; 8];
    flash.read(0, &mut buf).unwrap();
    assert_eq!(buf.to_vec(), pattern(8, 1));
    assert_eq!(events(&board, opcodes::QIOR).len(), 1);
}

#[test]
fn test_four_byte_chip_uses_native_opcodes() {
    let (board, mut flash) = setup(SimChipConfig::with_id(PY25Q256HB), BoardConfig::default());
    assert_eq!(
        flash.chip(ChipSelect::Primary).unwrap().address_mode,
        AddressMode::FourByte
    );
    assert_eq!(flash.bus().delay_chain(ChipSelect::Primary), 11);

    let high = 0x0180_0000;
    load(&board, ChipSelect::Primary, high, &[0u8; 0x1000]);
    flash.erase(high, 0x1000).unwrap();
    flash.write(high + 4, &[0xAA, 0x55]).unwrap();
    let mut buf = [0u8; 8];
    flash.read(high, &mut buf).unwrap();

    assert_eq!(buf, [0xFF, 0xFF, 0xFF, 0xFF, 0xAA, 0x55, 0xFF, 0xFF]);
    assert_eq!(addresses(&board, opcodes::SE_21), [high]);
    assert_eq!(addresses(&board, opcodes::PP_4B), [high + 4]);
    assert_eq!(addresses(&board, opcodes::FAST_READ + 1), [high]);
}

#[test]
fn test_gd25b512me_gets_xip_enable() {
    init_logger();
    let config = BoardConfig {
        bus_width: 4,
        capabilities: Capabilities::QUAD,
        ..Default::default()
    };
    let board = SimBoard::new(SimChipConfig::with_id(GD25B512ME)).unwrap();
    let mut flash = board.flash(config, leak_gate(20));
    flash.init().unwrap();

    let state = board.state();
    let chip = state.chip(ChipSelect::Primary).unwrap();
    assert_eq!(chip.vcr(6), 0xFE);
    assert!(chip.four_byte());

    // Written, then read back before switching to 4-byte addressing
    let ops = state.opcodes(ChipSelect::Primary);
    let write = ops.iter().position(|&op| op == opcodes::WRVCR).unwrap();
    let readback = ops.iter().position(|&op| op == opcodes::RDVCR).unwrap();
    let en4b = ops.iter().position(|&op| op == opcodes::EN4B).unwrap();
    assert!(write < readback && readback < en4b);
}

#[test]
fn test_embedded_storage_traits() {
    let (board, mut flash) = setup_default();
    load(&board, ChipSelect::Primary, 0x2000, &[0u8; 0x1000]);

    assert_eq!(es::ReadNorFlash::capacity(&flash), 2 << 20);
    es::NorFlash::erase(&mut flash, 0x2000, 0x3000).unwrap();
    es::NorFlash::write(&mut flash, 0x2000, b"storage").unwrap();
    let mut buf = [0u8; 7];
    es::ReadNorFlash::read(&mut flash, 0x2000, &mut buf).unwrap();
    assert_eq!(&buf, b"storage");

    let err = es::NorFlash::erase(&mut flash, 0x2001, 0x3001).unwrap_err();
    assert_eq!(err.kind(), NorFlashErrorKind::NotAligned);
    let err = es::NorFlash::erase(&mut flash, 0x3000, 0x2000).unwrap_err();
    assert_eq!(err.kind(), NorFlashErrorKind::OutOfBounds);

    let layout = flash.page_layout();
    assert_eq!(layout.pages_size, 0x1000);
    assert_eq!(layout.pages_count, 512);
}
