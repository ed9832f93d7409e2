//! SPI command structure

use super::{AddressWidth, TransferFlags};

/// A single bus transaction
///
/// Borrowing the data buffers keeps the primitive allocation free. A
/// command has at most one data phase: `write_data` or `read_buf`.
pub struct SpiCommand<'a> {
    /// The opcode byte
    pub opcode: u8,

    /// Address (if any)
    pub address: Option<u32>,

    /// Address width
    pub address_width: AddressWidth,

    /// Dummy bytes clocked out after the address
    pub dummy_bytes: u8,

    /// Multi-wire phase selection
    pub flags: TransferFlags,

    /// Data to write after opcode/address/dummy
    pub write_data: &'a [u8],

    /// Buffer to read into
    pub read_buf: &'a mut [u8],
}

impl<'a> SpiCommand<'a> {
    /// Opcode only (WREN, EN4B, SUSPEND...)
    pub fn simple(opcode: u8) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            dummy_bytes: 0,
            flags: TransferFlags::empty(),
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Register read with no address (RDSR, RDID)
    pub fn read_reg(opcode: u8, buf: &'a mut [u8]) -> Self {
        Self {
            read_buf: buf,
            ..Self::simple(opcode)
        }
    }

    /// Register write with no address (WRSR)
    pub fn write_reg(opcode: u8, data: &'a [u8]) -> Self {
        Self {
            write_data: data,
            ..Self::simple(opcode)
        }
    }

    /// Addressed command without data (erase)
    pub fn addressed(opcode: u8, addr: u32, width: AddressWidth) -> Self {
        Self {
            address: Some(addr),
            address_width: width,
            ..Self::simple(opcode)
        }
    }

    /// Addressed read
    pub fn read(opcode: u8, addr: u32, width: AddressWidth, buf: &'a mut [u8]) -> Self {
        Self {
            read_buf: buf,
            ..Self::addressed(opcode, addr, width)
        }
    }

    /// Addressed write (page program)
    pub fn write(opcode: u8, addr: u32, width: AddressWidth, data: &'a [u8]) -> Self {
        Self {
            write_data: data,
            ..Self::addressed(opcode, addr, width)
        }
    }

    /// Set the multi-wire phase flags
    pub fn with_flags(mut self, flags: TransferFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the number of dummy bytes
    pub fn with_dummy_bytes(mut self, count: u8) -> Self {
        self.dummy_bytes = count;
        self
    }

    /// Returns true if this command has a read phase
    pub fn has_read(&self) -> bool {
        !self.read_buf.is_empty()
    }

    /// Returns true if this command has a write phase
    pub fn has_write(&self) -> bool {
        !self.write_data.is_empty()
    }

    /// Length of the data phase
    pub fn data_len(&self) -> usize {
        self.write_data.len() + self.read_buf.len()
    }
}
