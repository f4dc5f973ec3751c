#![allow(dead_code)]
use usb_device::class::UsbClass;
use usbd_class_tester::prelude::*;

use usbd_usbasp::*;

// Requests
pub const CONNECT: u8 = 1;
pub const DISCONNECT: u8 = 2;
pub const TRANSMIT: u8 = 3;
pub const READFLASH: u8 = 4;
pub const ENABLEPROG: u8 = 5;
pub const WRITEFLASH: u8 = 6;
pub const READEEPROM: u8 = 7;
pub const WRITEEEPROM: u8 = 8;
pub const SETLONGADDRESS: u8 = 9;
pub const SETISPSCK: u8 = 10;
pub const AUX_CONNECT: u8 = 11;
pub const AUX_DISCONNECT: u8 = 12;
pub const AUX_RAWREAD: u8 = 13;
pub const AUX_RAWWRITE: u8 = 14;
pub const AUX_READBLOCK: u8 = 15;
pub const AUX_WRITEBLOCK: u8 = 16;
pub const GETCAPABILITIES: u8 = 127;

pub const FIRST: u8 = 0x01;
pub const LAST: u8 = 0x02;

pub const FLASH_SIZE: usize = 128 * 1024;
pub const EEPROM_SIZE: usize = 1024;
pub const AUX_SIZE: usize = 16 * 1024;

pub const SIGNATURE: [u8; 3] = [0x1e, 0x95, 0x0f];
pub const LOCK: u8 = 0xfc;
pub const LOW_FUSE: u8 = 0x62;
pub const HIGH_FUSE: u8 = 0xd9;
pub const EXT_FUSE: u8 = 0xf7;

/// Everything the engine asked the hardware to do, reads included.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    IspConnect(SckOption),
    IspDisconnect,
    EnterProgMode,
    Transmit(u8),
    Read {
        address: u32,
        space: MemorySpace,
    },
    Write {
        address: u32,
        value: u8,
        space: MemorySpace,
        flush: bool,
    },
    Flush(u32),
    Signature(u8),
    Fuse(FuseSelector),
    Activity(bool),
    Reset(bool),
    Wait(u32),
    AuxInit(u16),
    AuxRelease,
    AuxSend(u8),
    AuxRecv,
    AuxRead {
        address: u32,
        len: usize,
    },
    AuxWrite {
        address: u32,
        data: Vec<u8>,
    },
}

pub struct MockTarget {
    pub flash: Vec<u8>,
    pub eeprom: Vec<u8>,
    pub aux: Vec<u8>,
    pub events: Vec<Event>,
    pub prog_mode_ok: bool,
}

impl MockTarget {
    pub fn new() -> Self {
        Self {
            flash: Self::pattern(FLASH_SIZE, 0),
            eeprom: Self::pattern(EEPROM_SIZE, 0x40),
            aux: Self::pattern(AUX_SIZE, 0x80),
            events: Vec::new(),
            prog_mode_ok: true,
        }
    }

    // Initialize memory as: [seed, seed+1, ... seed+255, seed+1, seed+2, ...]
    fn pattern(size: usize, seed: u8) -> Vec<u8> {
        (0..size)
            .map(|i| seed.wrapping_add(i as u8).wrapping_add((i >> 8) as u8))
            .collect()
    }

    pub fn flushes(&self) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Flush(a) => Some(*a),
                _ => None,
            })
            .collect()
    }

    pub fn writes(&self) -> Vec<(u32, u8, MemorySpace, bool)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Write {
                    address,
                    value,
                    space,
                    flush,
                } => Some((*address, *value, *space, *flush)),
                _ => None,
            })
            .collect()
    }

    pub fn reads(&self) -> Vec<(u32, MemorySpace)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Read { address, space } => Some((*address, *space)),
                _ => None,
            })
            .collect()
    }
}

impl ProgrammerIO for MockTarget {
    fn isp_connect(&mut self, sck: SckOption) {
        self.events.push(Event::IspConnect(sck));
    }

    fn isp_disconnect(&mut self) {
        self.events.push(Event::IspDisconnect);
    }

    fn enter_programming_mode(&mut self) -> Result<(), ProgModeError> {
        self.events.push(Event::EnterProgMode);
        if self.prog_mode_ok {
            Ok(())
        } else {
            Err(ProgModeError::NoResponse)
        }
    }

    fn transmit(&mut self, byte: u8) -> u8 {
        self.events.push(Event::Transmit(byte));
        byte.wrapping_add(1)
    }

    fn read_byte(&mut self, address: u32, space: MemorySpace) -> u8 {
        self.events.push(Event::Read { address, space });
        let mem = match space {
            MemorySpace::Eeprom => &self.eeprom,
            MemorySpace::Flash | MemorySpace::FarFlash => &self.flash,
        };
        mem.get(address as usize).copied().unwrap_or(0xff)
    }

    fn write_byte(&mut self, address: u32, value: u8, space: MemorySpace, flush: bool) {
        self.events.push(Event::Write {
            address,
            value,
            space,
            flush,
        });
        let mem = match space {
            MemorySpace::Eeprom => &mut self.eeprom,
            MemorySpace::Flash | MemorySpace::FarFlash => &mut self.flash,
        };
        if let Some(m) = mem.get_mut(address as usize) {
            *m = value;
        }
    }

    fn flush_page(&mut self, address: u32) {
        self.events.push(Event::Flush(address));
    }

    fn signature_byte(&mut self, index: u8) -> u8 {
        self.events.push(Event::Signature(index));
        SIGNATURE.get(index as usize).copied().unwrap_or(0xff)
    }

    fn fuse_byte(&mut self, selector: FuseSelector) -> u8 {
        self.events.push(Event::Fuse(selector));
        match selector {
            FuseSelector::Lock => LOCK,
            FuseSelector::Low => LOW_FUSE,
            FuseSelector::High => HIGH_FUSE,
            FuseSelector::Extended => EXT_FUSE,
        }
    }

    fn set_activity(&mut self, on: bool) {
        self.events.push(Event::Activity(on));
    }

    fn set_reset(&mut self, high: bool) {
        self.events.push(Event::Reset(high));
    }

    fn wait_us(&mut self, micros: u32) {
        self.events.push(Event::Wait(micros));
    }

    fn aux_init(&mut self, bit_delay: u16) {
        self.events.push(Event::AuxInit(bit_delay));
    }

    fn aux_release(&mut self) {
        self.events.push(Event::AuxRelease);
    }

    fn aux_send_byte(&mut self, byte: u8) {
        self.events.push(Event::AuxSend(byte));
    }

    fn aux_recv_byte(&mut self) -> u8 {
        self.events.push(Event::AuxRecv);
        0x5a
    }

    fn aux_read_block(&mut self, address: u32, buf: &mut [u8]) {
        self.events.push(Event::AuxRead {
            address,
            len: buf.len(),
        });
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.aux.get(address as usize + i).copied().unwrap_or(0xff);
        }
    }

    fn aux_write_block(&mut self, address: u32, data: &[u8]) {
        self.events.push(Event::AuxWrite {
            address,
            data: data.to_vec(),
        });
        for (i, v) in data.iter().enumerate() {
            if let Some(m) = self.aux.get_mut(address as usize + i) {
                *m = *v;
            }
        }
    }
}

/// Raw SETUP packet of a device-to-host vendor request.
pub fn setup(request: u8, value: u16, index: u16, length: u16) -> [u8; 8] {
    let v = value.to_le_bytes();
    let i = index.to_le_bytes();
    let l = length.to_le_bytes();
    [0xc0, request, v[0], v[1], i[0], i[1], l[0], l[1]]
}

/// `wIndex` of a WriteFlash request: page size low byte, then flags in the
/// low nibble and page size bits 8..12 in the high nibble.
pub fn write_flash_index(page_size: u16, flags: u8) -> u16 {
    (page_size & 0xff) | ((((page_size >> 8) & 0x0f) << 12) | ((flags as u16 & 0x0f) << 8))
}

pub fn write_flash_setup(address: u16, page_size: u16, flags: u8, count: u16) -> [u8; 8] {
    let mut s = setup(WRITEFLASH, address, write_flash_index(page_size, flags), count);
    // host to device
    s[0] = 0x40;
    s
}

pub trait DeviceExt<C> {
    fn vendor_in(
        &mut self,
        cls: &mut C,
        req: u8,
        value: u16,
        index: u16,
        length: u16,
    ) -> AnyResult<Vec<u8>>;
    fn vendor_out(
        &mut self,
        cls: &mut C,
        req: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> AnyResult<Vec<u8>>;

    fn connect(&mut self, cls: &mut C) -> AnyResult<Vec<u8>>;
    fn get_capabilities(&mut self, cls: &mut C) -> AnyResult<Vec<u8>>;
    fn read_flash(&mut self, cls: &mut C, address: u16, length: u16) -> AnyResult<Vec<u8>>;
    fn write_flash(
        &mut self,
        cls: &mut C,
        address: u16,
        page_size: u16,
        flags: u8,
        data: &[u8],
    ) -> AnyResult<Vec<u8>>;
    fn set_long_address(&mut self, cls: &mut C, address: u32) -> AnyResult<Vec<u8>>;
    fn transmit(&mut self, cls: &mut C, instruction: [u8; 4]) -> AnyResult<Vec<u8>>;
}

impl<'a, C, M> DeviceExt<C> for Device<'a, C, M>
where
    C: UsbClass<EmulatedUsbBus>,
    M: UsbDeviceCtx<C<'a> = C>,
{
    fn vendor_in(
        &mut self,
        cls: &mut C,
        req: u8,
        value: u16,
        index: u16,
        length: u16,
    ) -> AnyResult<Vec<u8>> {
        self.control_read(
            cls,
            CtrRequestType::to_host().vendor().device(),
            req,
            value,
            index,
            length,
        )
    }

    fn vendor_out(
        &mut self,
        cls: &mut C,
        req: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> AnyResult<Vec<u8>> {
        if data.len() > u16::MAX as usize {
            return Err(AnyUsbError::DataConversion);
        }
        self.control_write(
            cls,
            CtrRequestType::to_device().vendor().device(),
            req,
            value,
            index,
            data.len() as u16,
            data,
        )
    }

    fn connect(&mut self, cls: &mut C) -> AnyResult<Vec<u8>> {
        self.vendor_in(cls, CONNECT, 0, 0, 4)
    }

    fn get_capabilities(&mut self, cls: &mut C) -> AnyResult<Vec<u8>> {
        self.vendor_in(cls, GETCAPABILITIES, 0, 0, 4)
    }

    fn read_flash(&mut self, cls: &mut C, address: u16, length: u16) -> AnyResult<Vec<u8>> {
        self.vendor_in(cls, READFLASH, address, 0, length)
    }

    fn write_flash(
        &mut self,
        cls: &mut C,
        address: u16,
        page_size: u16,
        flags: u8,
        data: &[u8],
    ) -> AnyResult<Vec<u8>> {
        self.vendor_out(
            cls,
            WRITEFLASH,
            address,
            write_flash_index(page_size, flags),
            data,
        )
    }

    fn set_long_address(&mut self, cls: &mut C, address: u32) -> AnyResult<Vec<u8>> {
        let b = address.to_le_bytes();
        self.vendor_in(
            cls,
            SETLONGADDRESS,
            u16::from_le_bytes([b[0], b[1]]),
            u16::from_le_bytes([b[2], b[3]]),
            4,
        )
    }

    fn transmit(&mut self, cls: &mut C, instruction: [u8; 4]) -> AnyResult<Vec<u8>> {
        self.vendor_in(
            cls,
            TRANSMIT,
            u16::from_le_bytes([instruction[0], instruction[1]]),
            u16::from_le_bytes([instruction[2], instruction[3]]),
            4,
        )
    }
}
