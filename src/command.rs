//! Vendor request decoding.
//!
//! A command arrives as the raw 8-byte SETUP packet. Byte 1 (`bRequest`)
//! selects the command, bytes 2..8 (`wValue`, `wIndex`, `wLength`) carry its
//! parameters, all little-endian.

use crate::session::BlockFlags;

/// Select ISP mode, reset to 16-bit addressing.
pub const FUNC_CONNECT: u8 = 1;
/// Release the target.
pub const FUNC_DISCONNECT: u8 = 2;
/// Raw 4-byte ISP instruction.
pub const FUNC_TRANSMIT: u8 = 3;
/// Start a flash read session.
pub const FUNC_READFLASH: u8 = 4;
/// Issue the programming-enable instruction.
pub const FUNC_ENABLEPROG: u8 = 5;
/// Start a flash write session.
pub const FUNC_WRITEFLASH: u8 = 6;
/// Start an EEPROM read session.
pub const FUNC_READEEPROM: u8 = 7;
/// Start an EEPROM write session.
pub const FUNC_WRITEEEPROM: u8 = 8;
/// Set a 32-bit address, ignore the 16-bit ones from now on.
pub const FUNC_SETLONGADDRESS: u8 = 9;
/// Select the ISP clock.
pub const FUNC_SETISPSCK: u8 = 10;
/// Connect using the auxiliary protocol.
pub const FUNC_AUX_CONNECT: u8 = 11;
/// Disconnect the auxiliary protocol.
pub const FUNC_AUX_DISCONNECT: u8 = 12;
/// Receive one auxiliary byte.
pub const FUNC_AUX_RAWREAD: u8 = 13;
/// Send one auxiliary byte.
pub const FUNC_AUX_RAWWRITE: u8 = 14;
/// Start an auxiliary read session.
pub const FUNC_AUX_READBLOCK: u8 = 15;
/// Start an auxiliary write session.
pub const FUNC_AUX_WRITEBLOCK: u8 = 16;
/// Report the capability bitmask.
pub const FUNC_GETCAPABILITIES: u8 = 127;

/// One decoded vendor request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Enter ISP mode.
    Connect,
    /// Leave ISP mode.
    Disconnect,
    /// Raw ISP instruction.
    Transmit([u8; 4]),
    /// Read flash; `address` is ignored in wide addressing mode.
    ReadFlash {
        /// 16-bit start address
        address: u16,
        /// bytes to read
        count: u16,
    },
    /// Read EEPROM; `address` is ignored in wide addressing mode.
    ReadEeprom {
        /// 16-bit start address
        address: u16,
        /// bytes to read
        count: u16,
    },
    /// Enable programming on the target.
    EnableProgramming,
    /// Write flash; `address` is ignored in wide addressing mode.
    WriteFlash {
        /// 16-bit start address
        address: u16,
        /// flash page size in bytes, `0` for unpaged devices
        page_size: u16,
        /// position of this request within the host's block
        flags: BlockFlags,
        /// bytes to write
        count: u16,
    },
    /// Write EEPROM; `address` is ignored in wide addressing mode.
    WriteEeprom {
        /// 16-bit start address
        address: u16,
        /// bytes to write
        count: u16,
    },
    /// Switch to wide addressing at the given address.
    SetLongAddress(u32),
    /// Raw SCK selector byte.
    SetProgrammingClock(u8),
    /// Report capabilities.
    GetCapabilities,
    /// Enter auxiliary-protocol mode.
    AuxConnect {
        /// bit delay handed to the auxiliary bit-banger
        bit_delay: u16,
    },
    /// Leave auxiliary-protocol mode.
    AuxDisconnect,
    /// Receive one raw auxiliary byte.
    AuxRawRead,
    /// Send one raw auxiliary byte.
    AuxRawWrite(u8),
    /// Read through the auxiliary protocol.
    AuxReadBlock {
        /// 16-bit start address
        address: u16,
        /// bytes to read
        count: u16,
    },
    /// Write through the auxiliary protocol.
    AuxWriteBlock {
        /// 16-bit start address
        address: u16,
        /// bytes to write
        count: u16,
    },
    /// Anything else. Ignored.
    Unknown(u8),
}

impl Command {
    /// Decode a SETUP packet.
    pub fn decode(setup: &[u8; 8]) -> Self {
        match setup[1] {
            FUNC_CONNECT => Command::Connect,
            FUNC_DISCONNECT => Command::Disconnect,
            FUNC_TRANSMIT => Command::Transmit(instruction(setup)),
            FUNC_READFLASH => Command::ReadFlash {
                address: short_address(setup),
                count: byte_count(setup),
            },
            FUNC_READEEPROM => Command::ReadEeprom {
                address: short_address(setup),
                count: byte_count(setup),
            },
            FUNC_ENABLEPROG => Command::EnableProgramming,
            FUNC_WRITEFLASH => Command::WriteFlash {
                address: short_address(setup),
                page_size: page_size(setup),
                flags: block_flags(setup),
                count: byte_count(setup),
            },
            FUNC_WRITEEEPROM => Command::WriteEeprom {
                address: short_address(setup),
                count: byte_count(setup),
            },
            FUNC_SETLONGADDRESS => Command::SetLongAddress(long_address(setup)),
            FUNC_SETISPSCK => Command::SetProgrammingClock(setup[2]),
            FUNC_GETCAPABILITIES => Command::GetCapabilities,
            FUNC_AUX_CONNECT => Command::AuxConnect {
                bit_delay: short_address(setup),
            },
            FUNC_AUX_DISCONNECT => Command::AuxDisconnect,
            FUNC_AUX_RAWREAD => Command::AuxRawRead,
            FUNC_AUX_RAWWRITE => Command::AuxRawWrite(setup[2]),
            FUNC_AUX_READBLOCK => Command::AuxReadBlock {
                address: short_address(setup),
                count: byte_count(setup),
            },
            FUNC_AUX_WRITEBLOCK => Command::AuxWriteBlock {
                address: short_address(setup),
                count: byte_count(setup),
            },
            other => Command::Unknown(other),
        }
    }
}

/// 16-bit field in bytes 2..4 (`wValue`). Address for session commands,
/// bit delay for `AuxConnect`.
pub fn short_address(setup: &[u8; 8]) -> u16 {
    u16::from_le_bytes([setup[2], setup[3]])
}

/// Transfer length in bytes 6..8 (`wLength`).
pub fn byte_count(setup: &[u8; 8]) -> u16 {
    u16::from_le_bytes([setup[6], setup[7]])
}

/// 32-bit address in bytes 2..6.
pub fn long_address(setup: &[u8; 8]) -> u32 {
    u32::from_le_bytes([setup[2], setup[3], setup[4], setup[5]])
}

/// Page size: low 8 bits in byte 4, bits 8..12 in the high nibble of byte 5.
pub fn page_size(setup: &[u8; 8]) -> u16 {
    (setup[4] as u16) | (((setup[5] & 0xf0) as u16) << 4)
}

/// Block flags: low nibble of byte 5.
pub fn block_flags(setup: &[u8; 8]) -> BlockFlags {
    BlockFlags::from_bits_truncate(setup[5] & 0x0f)
}

/// Raw ISP instruction in bytes 2..6.
pub fn instruction(setup: &[u8; 8]) -> [u8; 4] {
    [setup[2], setup[3], setup[4], setup[5]]
}
