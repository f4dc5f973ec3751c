//! Outbound interface to the hardware that actually clocks the target.

/// Capability bit: the auxiliary (TPI) protocol is available.
pub const CAP_AUX: u32 = 0x0000_0001;

/// Length of one auxiliary-protocol timing tick, in microseconds. Reset
/// pulses and settle times of the auxiliary connect sequences are multiples
/// of it.
pub const TICK_US: u32 = 320;

/// Which memory of the target a byte read or write addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MemorySpace {
    /// Program flash reachable with a 16-bit address.
    Flash,
    /// Program flash above the 16-bit limit, needs an extended address.
    FarFlash,
    /// Data EEPROM.
    Eeprom,
}

impl MemorySpace {
    /// Highest flash address that can be reached without an extended address.
    pub const NEAR_LIMIT: u32 = 0xffff;

    /// Pick the flash space for `address`.
    pub fn flash(address: u32) -> Self {
        if address > Self::NEAR_LIMIT {
            MemorySpace::FarFlash
        } else {
            MemorySpace::Flash
        }
    }
}

/// Lock or fuse byte requested through a well-known ISP instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FuseSelector {
    /// `0x58 0x00`
    Lock,
    /// `0x50 0x00`
    Low,
    /// `0x58 0x08`
    High,
    /// `0x50 0x08`
    Extended,
}

/// ISP clock (SCK) selection, as sent by the host in `SetProgrammingClock`.
///
/// Converting from the wire byte is lossy: a selector outside `0..=12` has no
/// variant. The session keeps the raw byte
/// ([`Session::sck_selector()`](crate::Session::sck_selector)) and hands it to
/// [`ProgrammerIO::isp_connect_selector()`], so an implementation with extra
/// clock settings can still see it.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SckOption {
    /// Let the programmer choose.
    #[default]
    Auto = 0,
    /// 0.5 kHz
    Khz0_5 = 1,
    /// 1 kHz
    Khz1 = 2,
    /// 2 kHz
    Khz2 = 3,
    /// 4 kHz
    Khz4 = 4,
    /// 8 kHz
    Khz8 = 5,
    /// 16 kHz
    Khz16 = 6,
    /// 32 kHz
    Khz32 = 7,
    /// 93.75 kHz
    Khz93_75 = 8,
    /// 187.5 kHz
    Khz187_5 = 9,
    /// 375 kHz
    Khz375 = 10,
    /// 750 kHz
    Khz750 = 11,
    /// 1.5 MHz
    Mhz1_5 = 12,
}

impl TryFrom<u8> for SckOption {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, u8> {
        Ok(match v {
            0 => SckOption::Auto,
            1 => SckOption::Khz0_5,
            2 => SckOption::Khz1,
            3 => SckOption::Khz2,
            4 => SckOption::Khz4,
            5 => SckOption::Khz8,
            6 => SckOption::Khz16,
            7 => SckOption::Khz32,
            8 => SckOption::Khz93_75,
            9 => SckOption::Khz187_5,
            10 => SckOption::Khz375,
            11 => SckOption::Khz750,
            12 => SckOption::Mhz1_5,
            other => return Err(other),
        })
    }
}

/// Target did not answer the programming-enable instruction.
///
/// Reported to the host as status byte `1`.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProgModeError {
    /// No synchronization with the target.
    NoResponse = 1,
}

impl From<ProgModeError> for u8 {
    fn from(e: ProgModeError) -> u8 {
        e as u8
    }
}

/// Trait that describes the hardware layer used to program a target.
/// [`Programmer`](crate::Programmer) calls these functions while it
/// decodes commands and moves data.
///
/// None of these functions can fail from the protocol's point of view:
/// an address beyond the target's memory must be clamped or ignored by the
/// implementation. The only exception is [`enter_programming_mode()`](ProgrammerIO::enter_programming_mode),
/// whose result is reported back to the host.
///
/// All functions are called from `usb_dev.poll([])` (usually the USB interrupt
/// context) and must finish before returning, including the timed waits.
pub trait ProgrammerIO {
    /// Bitmask reported by `GetCapabilities`. Default is [`CAP_AUX`].
    const CAPABILITIES: u32 = CAP_AUX;

    /// Prepare the ISP pins and clock the target at `sck`.
    fn isp_connect(&mut self, sck: SckOption);

    /// Connect with the raw selector byte of the last `SetProgrammingClock`.
    ///
    /// Default decodes it and calls [`isp_connect()`](ProgrammerIO::isp_connect),
    /// unknown selectors become [`SckOption::Auto`]. Override to support
    /// selectors beyond `SckOption`.
    fn isp_connect_selector(&mut self, selector: u8) {
        self.isp_connect(SckOption::try_from(selector).unwrap_or_default());
    }

    /// Release the ISP pins.
    fn isp_disconnect(&mut self);

    /// Issue the programming-enable sequence.
    fn enter_programming_mode(&mut self) -> Result<(), ProgModeError>;

    /// Clock one raw ISP byte out and return the byte clocked in.
    fn transmit(&mut self, byte: u8) -> u8;

    /// Read one byte of target memory.
    fn read_byte(&mut self, address: u32, space: MemorySpace) -> u8;

    /// Write one byte of target memory.
    ///
    /// For paged flash `flush` is `false`: the byte only goes to the target's
    /// page buffer and a later [`flush_page()`](ProgrammerIO::flush_page)
    /// commits it. Unpaged flash and EEPROM bytes are written with `flush` set.
    fn write_byte(&mut self, address: u32, value: u8, space: MemorySpace, flush: bool);

    /// Commit the target's page buffer to the flash page containing `address`.
    fn flush_page(&mut self, address: u32);

    /// Read signature byte `index` (0..=2).
    fn signature_byte(&mut self, index: u8) -> u8;

    /// Read a lock or fuse byte.
    fn fuse_byte(&mut self, selector: FuseSelector) -> u8;

    /// Turn the activity indicator on or off. Default does nothing.
    fn set_activity(&mut self, _on: bool) {}

    /// Drive the target's reset line.
    fn set_reset(&mut self, high: bool);

    /// Busy-wait for `micros` microseconds. The engine only asks for
    /// multiples of [`TICK_US`].
    fn wait_us(&mut self, micros: u32);

    /// Switch the pins to auxiliary-protocol mode with the given bit delay.
    fn aux_init(&mut self, bit_delay: u16);

    /// Float all programming pins.
    fn aux_release(&mut self);

    /// Send one auxiliary-protocol frame.
    fn aux_send_byte(&mut self, byte: u8);

    /// Receive one auxiliary-protocol frame.
    fn aux_recv_byte(&mut self) -> u8;

    /// Read `buf.len()` bytes starting at `address` using the auxiliary protocol.
    fn aux_read_block(&mut self, address: u32, buf: &mut [u8]);

    /// Write `data` starting at `address` using the auxiliary protocol.
    fn aux_write_block(&mut self, address: u32, data: &[u8]);
}
