//! Multi-packet transfer state.
//!
//! A read or write command only arms the [`Session`]. The data itself then
//! moves one packet at a time through [`Session::produce()`] (device to host)
//! and [`Session::consume()`] (host to device), until the session drops back
//! to [`Mode::Idle`].

use bitflags::bitflags;

use crate::fmt::{debug, trace, warning};
use crate::io::{MemorySpace, ProgrammerIO, SckOption};

/// Packet size of the control endpoint. A read packet shorter than this
/// ends a flash or EEPROM read session.
pub const PACKET_SIZE: usize = 8;

/// Transfer mode of the programmer.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// No transfer in progress.
    Idle = 0,
    /// Host is sending flash contents.
    WriteFlash = 1,
    /// Host is reading flash.
    ReadFlash = 2,
    /// Host is reading EEPROM.
    ReadEeprom = 3,
    /// Host is sending EEPROM contents.
    WriteEeprom = 4,
    /// Host is reading through the auxiliary protocol.
    AuxRead = 5,
    /// Host is writing through the auxiliary protocol.
    AuxWrite = 6,
}

bitflags! {
    /// Where a `WriteFlash` request sits within the host's block.
    ///
    /// A host block may be split into several requests; only the first one
    /// carries [`FIRST`](BlockFlags::FIRST) and only the last one
    /// [`LAST`](BlockFlags::LAST).
    #[repr(transparent)]
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct BlockFlags: u8 {
        /// Start of a block, the page counter is seeded.
        const FIRST = 0x01;
        /// End of a block, a partly filled page is flushed.
        const LAST = 0x02;
    }
}

/// A packet callback was invoked while no matching session is armed.
///
/// The discriminant is the value reported to the transport.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionError {
    /// The session is not in a read (or write) mode.
    NotReady = 0xff,
}

impl From<SessionError> for u8 {
    fn from(e: SessionError) -> u8 {
        e as u8
    }
}

/// Result of consuming one write packet.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteStatus {
    /// More data is expected.
    More = 0,
    /// All announced bytes are written, the session is idle again.
    Complete = 1,
}

impl From<WriteStatus> for u8 {
    fn from(s: WriteStatus) -> u8 {
        s as u8
    }
}

/// Programmer protocol state. There is one per device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Session {
    mode: Mode,
    address: u32,
    address_wide: bool,
    remaining: u16,
    page_size: u16,
    page_counter: u16,
    block_flags: BlockFlags,
    sck_selector: u8,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Idle session with 16-bit addressing and automatic SCK.
    pub const fn new() -> Self {
        Self {
            mode: Mode::Idle,
            address: 0,
            address_wide: false,
            remaining: 0,
            page_size: 0,
            page_counter: 0,
            block_flags: BlockFlags::empty(),
            sck_selector: SckOption::Auto as u8,
        }
    }

    /// Current transfer mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Address of the next byte to transfer.
    pub fn address(&self) -> u32 {
        self.address
    }

    /// `true` once `SetLongAddress` was received. It stays set until the
    /// next `Connect`.
    pub fn is_address_wide(&self) -> bool {
        self.address_wide
    }

    /// Bytes still announced for the current transfer.
    pub fn remaining(&self) -> u16 {
        self.remaining
    }

    /// Flash page size of the last `WriteFlash`, `0` if unpaged.
    pub fn page_size(&self) -> u16 {
        self.page_size
    }

    /// Bytes left until the current flash page is flushed.
    pub fn page_counter(&self) -> u16 {
        self.page_counter
    }

    /// Flags of the last write command.
    pub fn block_flags(&self) -> BlockFlags {
        self.block_flags
    }

    /// Selected ISP clock. A selector without a [`SckOption`] variant reads
    /// as [`SckOption::Auto`].
    pub fn sck(&self) -> SckOption {
        SckOption::try_from(self.sck_selector).unwrap_or_default()
    }

    /// Selector byte exactly as sent with `SetProgrammingClock`.
    pub fn sck_selector(&self) -> u8 {
        self.sck_selector
    }

    pub(crate) fn set_sck_selector(&mut self, selector: u8) {
        self.sck_selector = selector;
    }

    pub(crate) fn set_legacy_addressing(&mut self) {
        self.address_wide = false;
    }

    pub(crate) fn set_long_address(&mut self, address: u32) {
        self.address_wide = true;
        self.address = address;
    }

    fn set_short_address(&mut self, address: u16) {
        if !self.address_wide {
            self.address = address as u32;
        }
    }

    fn arm(&mut self, mode: Mode, count: u16) {
        if self.mode != Mode::Idle {
            debug!(
                "abandoning mode {} with {} bytes left",
                self.mode as u8,
                self.remaining
            );
        }
        self.remaining = count;
        self.mode = mode;
        debug!(
            "mode {} at {:#x}, {} bytes",
            mode as u8,
            self.address,
            count
        );
    }

    fn finish(&mut self) {
        trace!("mode {} done at {:#x}", self.mode as u8, self.address);
        self.mode = Mode::Idle;
        self.remaining = 0;
    }

    /// Arm a flash or EEPROM read.
    pub(crate) fn begin_read(&mut self, mode: Mode, address: u16, count: u16) {
        debug_assert!(matches!(mode, Mode::ReadFlash | Mode::ReadEeprom));
        self.set_short_address(address);
        self.arm(mode, count);
    }

    /// Arm a flash write. The page counter is seeded on a `FIRST` block only,
    /// so consecutive requests of one block share a page.
    pub(crate) fn begin_flash_write(
        &mut self,
        address: u16,
        page_size: u16,
        flags: BlockFlags,
        count: u16,
    ) {
        self.set_short_address(address);
        self.page_size = page_size;
        self.block_flags = flags;
        // An unseeded counter larger than the page would never hit a boundary.
        if flags.contains(BlockFlags::FIRST) || self.page_counter > page_size {
            self.page_counter = page_size;
        }
        self.arm(Mode::WriteFlash, count);
    }

    /// Arm an EEPROM write; EEPROM is never paged.
    pub(crate) fn begin_eeprom_write(&mut self, address: u16, count: u16) {
        self.set_short_address(address);
        self.page_size = 0;
        self.block_flags = BlockFlags::empty();
        self.arm(Mode::WriteEeprom, count);
    }

    /// Arm an auxiliary-protocol transfer. Its address space is 16-bit, so
    /// wide addressing does not apply.
    pub(crate) fn begin_aux(&mut self, mode: Mode, address: u16, count: u16) {
        debug_assert!(matches!(mode, Mode::AuxRead | Mode::AuxWrite));
        self.address = address as u32;
        self.arm(mode, count);
    }

    /// Fill `buf` with the next bytes of the armed read session.
    ///
    /// Returns the number of bytes produced. A flash or EEPROM session ends
    /// when `buf` is shorter than [`PACKET_SIZE`]; the remaining byte count is
    /// not consulted. An auxiliary read never ends on its own.
    pub fn produce<T: ProgrammerIO>(
        &mut self,
        io: &mut T,
        buf: &mut [u8],
    ) -> Result<usize, SessionError> {
        match self.mode {
            Mode::AuxRead => {
                io.aux_read_block(self.address, buf);
                self.address = self.address.wrapping_add(buf.len() as u32);
                Ok(buf.len())
            }
            Mode::ReadFlash | Mode::ReadEeprom => {
                let eeprom = self.mode == Mode::ReadEeprom;
                for b in buf.iter_mut() {
                    let space = if eeprom {
                        MemorySpace::Eeprom
                    } else {
                        MemorySpace::flash(self.address)
                    };
                    *b = io.read_byte(self.address, space);
                    self.address = self.address.wrapping_add(1);
                }

                // short packet - last one
                if buf.len() < PACKET_SIZE {
                    self.finish();
                }
                Ok(buf.len())
            }
            Mode::Idle | Mode::WriteFlash | Mode::WriteEeprom | Mode::AuxWrite => {
                warning!("read packet in mode {}", self.mode as u8);
                Err(SessionError::NotReady)
            }
        }
    }

    /// Consume the next packet of the armed write session.
    ///
    /// Bytes past the announced count are ignored.
    pub fn consume<T: ProgrammerIO>(
        &mut self,
        io: &mut T,
        data: &[u8],
    ) -> Result<WriteStatus, SessionError> {
        match self.mode {
            Mode::AuxWrite => {
                io.aux_write_block(self.address, data);
                self.address = self.address.wrapping_add(data.len() as u32);
                let len = u16::try_from(data.len()).unwrap_or(u16::MAX);
                self.remaining = self.remaining.saturating_sub(len);
                if self.remaining == 0 {
                    self.finish();
                    Ok(WriteStatus::Complete)
                } else {
                    Ok(WriteStatus::More)
                }
            }
            Mode::WriteFlash | Mode::WriteEeprom => {
                if self.remaining == 0 {
                    // zero-length write command, nothing is pending
                    self.finish();
                    return Ok(WriteStatus::Complete);
                }

                let eeprom = self.mode == Mode::WriteEeprom;
                for &value in data {
                    if eeprom {
                        io.write_byte(self.address, value, MemorySpace::Eeprom, true);
                    } else {
                        self.write_flash_byte(io, value);
                    }

                    self.remaining -= 1;
                    if self.remaining == 0 {
                        self.flush_partial_page(io);
                        self.address = self.address.wrapping_add(1);
                        self.finish();
                        return Ok(WriteStatus::Complete);
                    }
                    self.address = self.address.wrapping_add(1);
                }
                Ok(WriteStatus::More)
            }
            Mode::Idle | Mode::ReadFlash | Mode::ReadEeprom | Mode::AuxRead => {
                warning!("write packet in mode {}", self.mode as u8);
                Err(SessionError::NotReady)
            }
        }
    }

    /// Page buffering: a page is committed every `page_size` bytes, counted
    /// from the last `FIRST` block, not from address alignment.
    fn write_flash_byte<T: ProgrammerIO>(&mut self, io: &mut T, value: u8) {
        let space = MemorySpace::flash(self.address);

        if self.page_size == 0 {
            io.write_byte(self.address, value, space, true);
            return;
        }

        io.write_byte(self.address, value, space, false);
        self.page_counter = self.page_counter.saturating_sub(1);
        if self.page_counter == 0 {
            trace!("flush page at {:#x}", self.address);
            io.flush_page(self.address);
            self.page_counter = self.page_size;
        }
    }

    fn flush_partial_page<T: ProgrammerIO>(&mut self, io: &mut T) {
        if self.block_flags.contains(BlockFlags::LAST) && self.page_counter != self.page_size {
            trace!("flush partial page at {:#x}", self.address);
            io.flush_page(self.address);
        }
    }
}
