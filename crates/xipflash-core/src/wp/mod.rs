//! Block-protect policy
//!
//! Each known chip encodes "protect the boot area at offset 0" as a pair of
//! masked status register values (see [`ProtectPattern`]). Enabling writes
//! the pattern when the chip is not already in it; disabling clears the
//! protect bits of SR1 and restores the SR2 bits to their neutral value.
//! Every other status bit is preserved.

use crate::bus::SpiTransport;
use crate::chip::{ChipState, ProtectPattern};
use crate::error::{Error, Result};
use crate::protocol::{self, StatusReg};

/// Outcome of [`set_protection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionChange {
    /// The chip has no protect pattern; nothing was touched
    Unsupported,
    /// Status registers already matched the request
    Unchanged,
    /// New values written to SR1 and SR2
    Applied {
        /// Status register 1 after the write
        sr1: u8,
        /// Status register 2 after the write
        sr2: u8,
    },
}

/// Compute new status register values, or `None` if nothing needs writing
pub fn protect_values(pattern: &ProtectPattern, sr1: u8, sr2: u8, enable: bool) -> Option<(u8, u8)> {
    if enable {
        if sr1 & pattern.sr1_mask == pattern.sr1_value && sr2 & pattern.sr2_mask == pattern.sr2_value {
            return None;
        }
        Some((
            (sr1 & !pattern.sr1_mask) | pattern.sr1_value,
            (sr2 & !pattern.sr2_mask) | pattern.sr2_value,
        ))
    } else {
        // CMP lives in SR2, so a clear BP field alone can still mean "all protected"
        let target = (
            sr1 & !pattern.sr1_mask,
            (sr2 & !pattern.sr2_mask) | pattern.sr2_value,
        );
        (target != (sr1, sr2)).then_some(target)
    }
}

/// Enable or disable block protection on one chip
pub fn set_protection<T: SpiTransport + ?Sized>(
    t: &mut T,
    chip: &ChipState,
    enable: bool,
) -> Result<ProtectionChange> {
    let Some(pattern) = chip.quirk().protect else {
        log::debug!("chip {}: write protection not supported", chip.id);
        return Ok(ProtectionChange::Unsupported);
    };

    let sr1 = protocol::read_status(t, StatusReg::Sr1)?;
    let sr2 = protocol::read_status(t, StatusReg::Sr2)?;

    match protect_values(&pattern, sr1, sr2, enable) {
        None => Ok(ProtectionChange::Unchanged),
        Some((new_sr1, new_sr2)) => {
            protocol::write_status(t, StatusReg::Sr1, &[new_sr1, new_sr2])?;
            let got_sr1 = protocol::read_status(t, StatusReg::Sr1)?;
            let got_sr2 = protocol::read_status(t, StatusReg::Sr2)?;
            if got_sr1 & pattern.sr1_mask != new_sr1 & pattern.sr1_mask
                || got_sr2 & pattern.sr2_mask != new_sr2 & pattern.sr2_mask
            {
                log::error!(
                    "chip {}: status write ignored (sr1 0x{:02x}, sr2 0x{:02x})",
                    chip.id,
                    got_sr1,
                    got_sr2
                );
                return Err(Error::StatusWriteFailed);
            }
            log::info!(
                "chip {}: write protection {} (sr1 0x{:02x} => 0x{:02x}, sr2 0x{:02x} => 0x{:02x})",
                chip.id,
                if enable { "enabled" } else { "disabled" },
                sr1,
                new_sr1,
                sr2,
                new_sr2
            );
            Ok(ProtectionChange::Applied {
                sr1: new_sr1,
                sr2: new_sr2,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ChipSelect;
    use crate::chip::ChipId;
    use crate::spi::opcodes;
    use crate::testutil::ScriptedChip;

    fn chip(id: u32) -> ChipState {
        ChipState::new(ChipSelect::Primary, ChipId(id), 2 << 20)
    }

    #[test]
    fn test_enable_preserves_unrelated_bits() {
        // QE set in SR2, CMP set, SRP0 set in SR1
        let mut t = ScriptedChip {
            status: [0x80, 0x42, 0],
            ..Default::default()
        };
        let change = set_protection(&mut t, &chip(0x1560C8), true).unwrap();
        assert_eq!(change, ProtectionChange::Applied { sr1: 0xEC, sr2: 0x02 });
        assert_eq!(t.status[0], 0xEC);
        assert_eq!(t.status[1], 0x02);
        let wrsr = t.writes_of(opcodes::WRSR);
        assert_eq!(wrsr.len(), 1);
        assert_eq!(wrsr[0].data, std::vec![0xEC, 0x02]);
    }

    #[test]
    fn test_enable_is_idempotent() {
        let mut t = ScriptedChip::default();
        let c = chip(0x1560C8);
        set_protection(&mut t, &c, true).unwrap();
        let after_first = t.status;
        assert_eq!(set_protection(&mut t, &c, true).unwrap(), ProtectionChange::Unchanged);
        assert_eq!(t.status, after_first);
        assert_eq!(t.writes_of(opcodes::WRSR).len(), 1);
    }

    #[test]
    fn test_disable_clears_complement_bit() {
        // BP clear with CMP set protects the whole array
        let mut t = ScriptedChip {
            status: [0x00, 0x40, 0],
            ..Default::default()
        };
        let c = chip(0x1560C8);
        let change = set_protection(&mut t, &c, false).unwrap();
        assert_eq!(change, ProtectionChange::Applied { sr1: 0x00, sr2: 0x00 });
        assert_eq!(t.status[1] & 0x40, 0);
        assert_eq!(set_protection(&mut t, &c, false).unwrap(), ProtectionChange::Unchanged);
        assert_eq!(t.writes_of(opcodes::WRSR).len(), 1);
    }

    #[test]
    fn test_disable_clears_only_protect_bits() {
        let mut t = ScriptedChip {
            status: [0x6C | 0x80, 0x02, 0],
            ..Default::default()
        };
        let change = set_protection(&mut t, &chip(0x1560C8), false).unwrap();
        assert_eq!(change, ProtectionChange::Applied { sr1: 0x80, sr2: 0x02 });

        assert_eq!(
            set_protection(&mut t, &chip(0x1560C8), false).unwrap(),
            ProtectionChange::Unchanged
        );
    }

    #[test]
    fn test_ignored_status_write_is_reported() {
        let mut t = ScriptedChip {
            status_locked: true,
            ..Default::default()
        };
        let err = set_protection(&mut t, &chip(0x1560C8), true).unwrap_err();
        assert_eq!(err, Error::StatusWriteFailed);
        assert_eq!(t.status, [0, 0, 0]);
    }

    #[test]
    fn test_unknown_chip_is_noop() {
        let mut t = ScriptedChip::default();
        assert_eq!(
            set_protection(&mut t, &chip(0x123456), true).unwrap(),
            ProtectionChange::Unsupported
        );
        assert!(t.sent.is_empty());
    }

    #[test]
    fn test_winbond_pattern() {
        let p = crate::chip::quirks::lookup(ChipId(0x1840EF)).unwrap().protect.unwrap();
        assert_eq!(protect_values(&p, 0, 0, true), Some((0x64, 0)));
        assert_eq!(protect_values(&p, 0x64, 0, true), None);
        assert_eq!(protect_values(&p, 0x64, 0x40, true), Some((0x64, 0)));
    }
}
