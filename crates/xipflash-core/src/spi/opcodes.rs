//! Serial NOR flash opcodes
//!
//! JEDEC command set plus the vendor commands the supported chips need.

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required before any write/erase operation
pub const WREN: u8 = 0x06;
/// Write Disable - clears WEL bit in status register
pub const WRDI: u8 = 0x04;

// ============================================================================
// Status registers
// ============================================================================

/// Read Status Register 1
pub const RDSR: u8 = 0x05;
/// Read Status Register 2
pub const RDSR2: u8 = 0x35;
/// Read Status Register 3
pub const RDSR3: u8 = 0x15;
/// Write Status Register 1 (two data bytes also write SR2)
pub const WRSR: u8 = 0x01;
/// Write Status Register 2
pub const WRSR2: u8 = 0x31;
/// Write Status Register 3
pub const WRSR3: u8 = 0x11;

// ============================================================================
// Identification
// ============================================================================

/// Read JEDEC ID (manufacturer + memory type + capacity)
pub const RDID: u8 = 0x9F;
/// Read Unique ID
pub const RDUID: u8 = 0x4B;

// ============================================================================
// Reads - 3-byte address, add one for the 4-byte variant
// ============================================================================

/// Fast Read (1-1-1, one dummy byte)
pub const FAST_READ: u8 = 0x0B;
/// Dual Output Read (1-1-2)
pub const DOR: u8 = 0x3B;
/// Dual I/O Read (1-2-2)
pub const DIOR: u8 = 0xBB;
/// Quad Output Read (1-1-4)
pub const QOR: u8 = 0x6B;
/// Quad I/O Read (1-4-4)
pub const QIOR: u8 = 0xEB;

// ============================================================================
// Program and erase
// ============================================================================

/// Page Program with 3-byte address
pub const PP: u8 = 0x02;
/// Page Program with 4-byte address
pub const PP_4B: u8 = 0x12;
/// Sector Erase 4KB with 3-byte address
pub const SE_20: u8 = 0x20;
/// Sector Erase 4KB with 4-byte address
pub const SE_21: u8 = 0x21;
/// Block Erase 64KB with 3-byte address
pub const BE_D8: u8 = 0xD8;
/// Block Erase 64KB with 4-byte address
pub const BE_DC: u8 = 0xDC;

// ============================================================================
// 4-byte address mode control
// ============================================================================

/// Enter 4-Byte Address Mode
pub const EN4B: u8 = 0xB7;
/// Exit 4-Byte Address Mode
pub const EX4B: u8 = 0xE9;
/// Write Extended Address Register
pub const WREAR: u8 = 0xC5;

// ============================================================================
// Power management
// ============================================================================

/// Deep Power Down
pub const DP: u8 = 0xB9;
/// Release from Deep Power Down
pub const RDP: u8 = 0xAB;

// ============================================================================
// Security registers
// ============================================================================

/// Erase Security Register
pub const ERSR: u8 = 0x44;
/// Program Security Register
pub const PRSR: u8 = 0x42;
/// Read Security Register
pub const RDSCUR: u8 = 0x48;

// ============================================================================
// Volatile configuration register (GigaDevice octal/quad parts)
// ============================================================================

/// Read Volatile Configuration Register
pub const RDVCR: u8 = 0x85;
/// Write Volatile Configuration Register
pub const WRVCR: u8 = 0x81;

// ============================================================================
// Continuous read
// ============================================================================

/// Sent twice with chip select low to drop a chip out of continuous read
pub const CONTINUOUS_READ_RESET: u8 = 0xFF;

// ============================================================================
// Suspend/Resume
// ============================================================================

/// Erase/Program Suspend
pub const SUSPEND: u8 = 0x75;
/// Erase/Program Resume
pub const RESUME: u8 = 0x7A;

// ============================================================================
// Status register bit definitions
// ============================================================================

/// Status Register 1: Write In Progress / Busy
pub const SR1_WIP: u8 = 0x01;
/// Status Register 1: Write Enable Latch
pub const SR1_WEL: u8 = 0x02;
/// Status Register 1: Quad Enable on Macronix parts
pub const SR1_QE_MXIC: u8 = 0x40;

/// Status Register 2: Quad Enable
pub const SR2_QE: u8 = 0x02;
/// Status Register 2: Program suspended
pub const SR2_SUS2: u8 = 0x04;
/// Status Register 2: Complement protect
pub const SR2_CMP: u8 = 0x40;
/// Status Register 2: Erase suspended
pub const SR2_SUS1: u8 = 0x80;
