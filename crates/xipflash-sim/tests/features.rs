//! Optional board features: protection, security regions, power, DVFS,
//! calibration and the second chip select

mod common;

use common::*;
use xipflash_core::bus::ChipSelect;
use xipflash_core::calibration::{SweepConfig, TrialMode};
use xipflash_core::calibration::dvfs::{DvfsStage, VoltageChange};
use xipflash_core::config::{BoardConfig, Capabilities};
use xipflash_core::spi::opcodes;
use xipflash_core::wp::ProtectionChange;
use xipflash_core::{ContractViolation, Error};
use xipflash_sim::{leak_gate, ConfigEvent, SimBoard, SimChipConfig, TimingWindow};

fn status(board: &SimBoard) -> [u8; 3] {
    let state = board.state();
    let now = state.now_us();
    state.chip(ChipSelect::Primary).unwrap().status(now)
}

#[test]
fn test_write_protection_is_idempotent() {
    let chip = SimChipConfig {
        status: [0x80, 0x00, 0x00],
        ..Default::default()
    };
    let (board, mut flash) = setup(chip, BoardConfig::default());

    let first = flash.set_write_protection(true).unwrap();
    assert_eq!(
        first[0],
        Some(ProtectionChange::Applied {
            sr1: 0xEC,
            sr2: 0
        })
    );
    assert_eq!(first[1], None);
    let once = status(&board);

    let second = flash.set_write_protection(true).unwrap();
    assert_eq!(second[0], Some(ProtectionChange::Unchanged));
    assert_eq!(status(&board), once);
    assert_eq!(events(&board, opcodes::WRSR).len(), 1);
}

#[test]
fn test_protected_range_refuses_erase_until_disabled() {
    let (board, mut flash) = setup_default();
    load(&board, ChipSelect::Primary, 0, &[0u8; 0x1000]);
    flash.set_write_protection(true).unwrap();

    flash.erase(0, 0x1000).unwrap();
    assert_eq!(contents(&board, ChipSelect::Primary, 0, 4), [0, 0, 0, 0]);
    assert_eq!(board.state().stats(ChipSelect::Primary).rejected_writes, 1);

    let change = flash.set_write_protection(false).unwrap();
    assert_eq!(
        change[0],
        Some(ProtectionChange::Applied { sr1: 0, sr2: 0 })
    );
    flash.erase(0, 0x1000).unwrap();
    assert_eq!(contents(&board, ChipSelect::Primary, 0, 4), [0xFF; 4]);
}

#[test]
fn test_unknown_chip_protection_is_noop() {
    let (board, mut flash) = setup(SimChipConfig::with_id(XT25F64F), BoardConfig::default());
    let change = flash.set_write_protection(true).unwrap();
    assert_eq!(change[0], Some(ProtectionChange::Unsupported));
    assert!(events(&board, opcodes::WRSR).is_empty());
}

fn security_config() -> BoardConfig {
    BoardConfig {
        capabilities: Capabilities::SECURITY_REGIONS,
        ..Default::default()
    }
}

#[test]
fn test_security_region_round_trip() {
    let (board, mut flash) = setup(SimChipConfig::default(), security_config());
    let data = pattern(0x20, 0x33);

    flash.erase_security_region(1).unwrap();
    flash.write_security_region(1, 0xF0, &data).unwrap();
    assert_eq!(addresses(&board, opcodes::ERSR), [0x1000]);
    assert_eq!(addresses(&board, opcodes::PRSR), [0x10F0, 0x1100]);

    let mut back = [0u8; 0x20];
    flash.read_security_region(1, 0xF0, &mut back).unwrap();
    assert_eq!(back.to_vec(), data);
    let state = board.state();
    assert_eq!(state.chip(ChipSelect::Primary).unwrap().region(1)[0xF0..0x110], data[..]);
    assert!(state.chip(ChipSelect::Primary).unwrap().region(0).iter().all(|&b| b == 0xFF));
}

#[test]
fn test_security_region_bounds_checked_before_bus() {
    let (board, mut flash) = setup(SimChipConfig::default(), security_config());

    assert_eq!(
        flash.write_security_region(0, 0x3F0, &[0u8; 0x20]),
        Err(Error::Contract(ContractViolation::RegionOverflow {
            offset: 0x3F0,
            len: 0x20
        }))
    );
    let mut buf = [0u8; 4];
    assert_eq!(
        flash.read_security_region(4, 0, &mut buf),
        Err(Error::Contract(ContractViolation::InvalidRegion(4)))
    );
    // A write ending exactly at the region end is fine
    flash.write_security_region(0, 0x3F0, &[0u8; 0x10]).unwrap();
    assert_eq!(addresses(&board, opcodes::PRSR), [0x3F0]);
}

#[test]
fn test_security_regions_need_capability() {
    let (board, mut flash) = setup_default();
    assert_eq!(flash.erase_security_region(0), Err(Error::NotSupported));
    assert!(board.state().trace().is_empty());
}

#[test]
fn test_unique_id() {
    let (_board, mut flash) = setup_default();
    let mut buf = [0u8; 20];
    assert_eq!(flash.read_unique_id(&mut buf).unwrap(), 16);
    assert_eq!(buf[..16], SimChipConfig::default().unique_id);
    assert_eq!(buf[16..], [0; 4]);
}

#[test]
fn test_power_down_wakes_on_access() {
    let (board, mut flash) = setup_default();
    load(&board, ChipSelect::Primary, 0, b"boot");
    flash.power_down().unwrap();
    assert!(board.state().chip(ChipSelect::Primary).unwrap().powered_down());

    let mut buf = [0u8; 4];
    flash.read(0, &mut buf).unwrap();
    assert_eq!(&buf, b"boot");
    let state = board.state();
    assert!(!state.chip(ChipSelect::Primary).unwrap().powered_down());
    let ops: Vec<u8> = state
        .opcodes(ChipSelect::Primary)
        .into_iter()
        .filter(|&op| op != opcodes::CONTINUOUS_READ_RESET)
        .collect();
    assert_eq!(ops, [opcodes::DP, opcodes::RDP, opcodes::FAST_READ]);
}

#[test]
fn test_power_up_without_access() {
    let (board, mut flash) = setup_default();
    flash.power_down().unwrap();
    flash.power_up().unwrap();
    assert!(!board.state().chip(ChipSelect::Primary).unwrap().powered_down());
}

fn dvfs_config() -> BoardConfig {
    BoardConfig {
        capabilities: Capabilities::DVFS,
        ..Default::default()
    }
}

#[test]
fn test_voltage_drop_lowers_clock_before_delay() {
    let (board, mut flash) = setup(SimChipConfig::default(), dvfs_config());

    flash.on_voltage_change(VoltageChange {
        old_mv: 1200,
        new_mv: 950,
        stage: DvfsStage::PostChange,
    });
    assert!(board.state().config_log().is_empty());

    flash.on_voltage_change(VoltageChange {
        old_mv: 1200,
        new_mv: 950,
        stage: DvfsStage::PreChange,
    });
    let state = board.state();
    assert_eq!(
        state.config_log(),
        &[
            ConfigEvent::FlashClock {
                cs: ChipSelect::Primary,
                mhz: 64
            },
            ConfigEvent::DelayChain(11),
        ]
    );
    assert_eq!(state.irq_depth(), 0);
    assert_eq!(flash.chip(ChipSelect::Primary).unwrap().vdd_mv, 950);
}

#[test]
fn test_voltage_rise_raises_delay_before_clock() {
    let (board, mut flash) = setup(SimChipConfig::default(), dvfs_config());
    flash.on_voltage_change(VoltageChange {
        old_mv: 1200,
        new_mv: 950,
        stage: DvfsStage::PreChange,
    });
    board.state().clear_trace();

    flash.on_voltage_change(VoltageChange {
        old_mv: 950,
        new_mv: 1200,
        stage: DvfsStage::PostChange,
    });
    assert_eq!(
        board.state().config_log(),
        &[
            ConfigEvent::DelayChain(13),
            ConfigEvent::FlashClock {
                cs: ChipSelect::Primary,
                mhz: 96
            },
        ]
    );
}

#[test]
fn test_voltage_change_ignored_without_capability() {
    let (board, mut flash) = setup_default();
    flash.on_voltage_change(VoltageChange {
        old_mv: 1200,
        new_mv: 950,
        stage: DvfsStage::PreChange,
    });
    assert!(board.state().config_log().is_empty());
    assert_eq!(flash.bus().delay_chain(ChipSelect::Primary), 13);
}

#[test]
fn test_calibration_centres_in_window() {
    let (board, mut flash) = setup_default();
    board
        .state()
        .chip_mut(ChipSelect::Primary)
        .unwrap()
        .set_timing(TimingWindow {
            low: 4,
            high: 16,
            ..Default::default()
        });

    let mut steps = 0;
    let cal = flash
        .calibrate(ChipSelect::Primary, &SweepConfig::default(), |_| steps += 1)
        .unwrap();
    assert_eq!(steps, 64);
    assert_eq!((cal.run_start, cal.run_len, cal.value), (4, 13, 10));
    assert_eq!(flash.bus().delay_chain(ChipSelect::Primary), 10);
}

#[test]
fn test_calibration_across_cpu_clocks() {
    let (board, mut flash) = setup_default();
    board
        .state()
        .chip_mut(ChipSelect::Primary)
        .unwrap()
        .set_timing(TimingWindow {
            low: 10,
            high: 30,
            high_clock_mhz: 240,
            high_clock_shrink: 2,
        });

    let sweep = SweepConfig {
        trials: 2,
        cpu_clocks: heapless::Vec::from_slice(&[160, 240]).unwrap(),
        ..Default::default()
    };
    let cal = flash.calibrate(ChipSelect::Primary, &sweep, |_| {}).unwrap();
    assert_eq!((cal.run_start, cal.run_len, cal.value), (12, 17, 20));
    assert_eq!(cal.passes[10], 2);
    assert_eq!(cal.passes[20], 4);
    assert_eq!(board.state().cpu_mhz(), 160);
}

#[test]
fn test_calibration_failure_keeps_delay() {
    let (board, mut flash) = setup_default();
    board
        .state()
        .chip_mut(ChipSelect::Primary)
        .unwrap()
        .set_timing(TimingWindow {
            low: 13,
            high: 14,
            ..Default::default()
        });
    let res = flash.calibrate(ChipSelect::Primary, &SweepConfig::default(), |_| {});
    assert_eq!(res.unwrap_err(), Error::CalibrationFailed);
    assert_eq!(flash.bus().delay_chain(ChipSelect::Primary), 13);
}

#[test]
fn test_calibration_with_data_pattern() {
    let (board, mut flash) = setup_default();
    let sweep = SweepConfig {
        mode: TrialMode::DataPattern { scratch: 0x1F_F000 },
        range: 0..=31,
        trials: 1,
        ..Default::default()
    };
    let cal = flash.calibrate(ChipSelect::Primary, &sweep, |_| {}).unwrap();
    assert_eq!((cal.run_start, cal.run_len, cal.value), (6, 15, 13));
    assert!(events(&board, opcodes::SE_20)
        .iter()
        .all(|e| e.address == Some(0x1F_F000)));
}

fn dual_board(secondary: Option<SimChipConfig>) -> (SimBoard, xipflash_sim::SimFlash) {
    init_logger();
    let board = SimBoard::with_chips(SimChipConfig::default(), secondary).unwrap();
    let config = BoardConfig {
        capabilities: Capabilities::DUAL_CS,
        ..Default::default()
    };
    let mut flash = board.flash(config, leak_gate(20));
    flash.init().unwrap();
    board.state().clear_trace();
    (board, flash)
}

#[test]
fn test_second_chip_extends_address_space() {
    let (board, flash) = dual_board(Some(SimChipConfig::with_id(W25Q128)));
    assert_eq!(flash.size(), (2 << 20) + (16 << 20));
    assert_eq!(flash.map().size0, 2 << 20);
    assert_eq!(flash.chip(ChipSelect::Secondary).unwrap().id.raw(), W25Q128);
    assert_eq!(board.state().lock_violations(), 0);
}

#[test]
fn test_read_across_chip_boundary() {
    let (board, mut flash) = dual_board(Some(SimChipConfig::with_id(W25Q128)));
    let tail = pattern(16, 1);
    let head = pattern(16, 2);
    load(&board, ChipSelect::Primary, (2 << 20) - 16, &tail);
    load(&board, ChipSelect::Secondary, 0, &head);

    let mut buf = [0u8; 32];
    flash.read((2 << 20) - 16, &mut buf).unwrap();
    assert_eq!(buf[..16], tail[..]);
    assert_eq!(buf[16..], head[..]);

    let reads = events(&board, opcodes::FAST_READ);
    assert_eq!(reads.len(), 2);
    assert_eq!((reads[0].cs, reads[0].address), (ChipSelect::Primary, Some((2 << 20) - 16)));
    assert_eq!((reads[1].cs, reads[1].address), (ChipSelect::Secondary, Some(0)));
}

#[test]
fn test_write_across_chip_boundary() {
    let (board, mut flash) = dual_board(Some(SimChipConfig::with_id(W25Q128)));
    let data = pattern(0x100, 5);
    flash.write((2 << 20) - 0x80, &data).unwrap();

    assert_eq!(
        contents(&board, ChipSelect::Primary, (2 << 20) - 0x80, 0x80),
        data[..0x80]
    );
    assert_eq!(contents(&board, ChipSelect::Secondary, 0, 0x80), data[0x80..]);
    // The GPIO chip select waits with sleeps between polls
    assert!(board.state().slept_ms() > 0);
    // Only chip 0 is mapped, so only its range is invalidated
    assert_eq!(board.state().invalidations(), &[((2 << 20) - 0x80, 0x80)]);
}

#[test]
fn test_second_chip_reads_in_chunks() {
    let (board, mut flash) = dual_board(Some(SimChipConfig::with_id(W25Q128)));
    let mut buf = vec![0u8; 0x10000];
    flash.read(2 << 20, &mut buf).unwrap();
    assert_eq!(addresses(&board, opcodes::FAST_READ), [0, 0x8000]);
    assert!(events(&board, opcodes::FAST_READ)
        .iter()
        .all(|e| e.cs == ChipSelect::Secondary));
}

#[test]
fn test_erase_on_second_chip() {
    let (board, mut flash) = dual_board(Some(SimChipConfig::with_id(W25Q128)));
    load(&board, ChipSelect::Secondary, 0x1000, &[0u8; 0x1000]);
    flash.erase((2 << 20) + 0x1000, 0x1000).unwrap();
    assert_eq!(contents(&board, ChipSelect::Secondary, 0x1000, 4), [0xFF; 4]);
    assert_eq!(addresses(&board, opcodes::SE_20), [0x1000]);
    assert!(board.state().invalidations().is_empty());
}

#[test]
fn test_missing_second_chip_degrades_to_single() {
    let (_board, flash) = dual_board(None);
    assert_eq!(flash.size(), 2 << 20);
    assert!(flash.chip(ChipSelect::Secondary).is_none());
}

#[test]
fn test_each_chip_keeps_its_delay_chain() {
    let (board, mut flash) = dual_board(Some(SimChipConfig::with_id(W25Q128)));
    flash.bus_mut().set_delay_chain(ChipSelect::Secondary, 9);
    let mut buf = [0u8; 4];
    flash.read(0, &mut buf).unwrap();
    flash.read(2 << 20, &mut buf).unwrap();

    let reads = events(&board, opcodes::FAST_READ);
    assert_eq!(reads[0].delay_chain, 13);
    assert_eq!(reads[1].delay_chain, 9);
}
