//! Per-transfer line-width flags

use bitflags::bitflags;

bitflags! {
    /// Which phases of a transfer run at the negotiated multi-wire width
    ///
    /// Without any flag every phase is single wire. The widest flag wins:
    /// switching happens right before the first phase it names and stays
    /// in effect until the end of the transfer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TransferFlags: u8 {
        /// Opcode, address, dummy and data on all lines (4-4-4 / 2-2-2)
        const MIO_CMD_ADDR_DATA = 1 << 0;
        /// Address, dummy and data on all lines (1-4-4 / 1-2-2)
        const MIO_ADDR_DATA     = 1 << 1;
        /// Data only on all lines (1-1-4 / 1-1-2)
        const MIO_DATA          = 1 << 2;

        /// Any multi-wire phase
        const MIO_MASK = Self::MIO_CMD_ADDR_DATA.bits()
            | Self::MIO_ADDR_DATA.bits()
            | Self::MIO_DATA.bits();
    }
}
