#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
//!
//! Implements the USBasp AVR programmer protocol for a `usb-device` device.
//!
//! ## About
//!
//! USBasp is a small in-circuit programmer for AVR microcontrollers. The host
//! tool (for example `avrdude -c usbasp`) talks to it with vendor control
//! requests only: every command is an 8-byte SETUP packet, and flash/EEPROM
//! contents travel in the data stage of those control transfers.
//!
//! This library is a protocol implementation only. Code that clocks the
//! target's ISP or TPI pins is not part of it and has to be provided by the
//! library user through [`ProgrammerIO`].
//!
//! ### Supported operations
//!
//! * ISP connect / disconnect, SCK selection, programming enable
//! * Raw 4-byte ISP instructions, with signature, lock and fuse reads
//!   answered directly
//! * Flash read and write, paged and unpaged, with 16-bit or 32-bit addressing
//! * EEPROM read and write
//! * TPI (auxiliary protocol) connect, disconnect, raw byte and block transfers
//! * Capability report
//!
//! ### Limitations
//!
//! * One control transfer carries at most [`MAX_TRANSFER`] bytes. The
//!   crate turns on `usb-device`'s `control-buffer-256` feature so the
//!   200-byte blocks `avrdude` sends fit.
//!
//! * A flash or EEPROM read session ends on a short packet only. If the host
//!   reads a multiple of 8 bytes, the session stays armed until the next
//!   command replaces it. Hosts rely on this.
//!
//! * Once `SetLongAddress` was received, the 16-bit address fields of all
//!   later flash and EEPROM commands are ignored. Only a `Connect` goes back
//!   to 16-bit addressing.
//!
//! ## Example
//!
//! The example below focuses on [`USBaspClass`]. Target controller
//! initialization (clocks, GPIO, USB peripheral) is left out.
//!
//! ```no_run
//! use usb_device::class_prelude::*;
//! use usb_device::prelude::*;
//! use usbd_usbasp::*;
//!
//! // USBaspClass will use MyTarget to access the AVR being programmed.
//! struct MyTarget {}
//!
//! impl ProgrammerIO for MyTarget {
//!     fn isp_connect(&mut self, sck: SckOption) {
//!         // TODO: set up SPI at the requested clock, pull RESET low
//!     }
//!     fn isp_disconnect(&mut self) {}
//!     fn enter_programming_mode(&mut self) -> Result<(), ProgModeError> {
//!         // TODO: send "Programming Enable" and check the echo
//!         Ok(())
//!     }
//!     fn transmit(&mut self, byte: u8) -> u8 { 0 }
//!     fn read_byte(&mut self, address: u32, space: MemorySpace) -> u8 { 0xff }
//!     fn write_byte(&mut self, address: u32, value: u8, space: MemorySpace, flush: bool) {}
//!     fn flush_page(&mut self, address: u32) {}
//!     fn signature_byte(&mut self, index: u8) -> u8 { 0 }
//!     fn fuse_byte(&mut self, selector: FuseSelector) -> u8 { 0xff }
//!     fn set_reset(&mut self, high: bool) {}
//!     fn wait_us(&mut self, micros: u32) {}
//!     fn aux_init(&mut self, bit_delay: u16) {}
//!     fn aux_release(&mut self) {}
//!     fn aux_send_byte(&mut self, byte: u8) {}
//!     fn aux_recv_byte(&mut self) -> u8 { 0 }
//!     fn aux_read_block(&mut self, address: u32, buf: &mut [u8]) {}
//!     fn aux_write_block(&mut self, address: u32, data: &[u8]) {}
//! }
//!
//! fn run<B: UsbBus>(usb_bus_alloc: &UsbBusAllocator<B>) -> ! {
//!     // Create USBaspClass before the device, it allocates an interface.
//!     let mut usbasp = USBaspClass::new(usb_bus_alloc, MyTarget {});
//!
//!     let mut usb_dev = UsbDeviceBuilder::new(usb_bus_alloc, UsbVidPid(0x16c0, 0x05dc)).build();
//!
//!     // usb_dev.poll() must be called periodically, usually from USB interrupt handlers.
//!     // When a vendor request arrives, handlers in MyTarget may be called.
//!     loop {
//!         usb_dev.poll(&mut [&mut usbasp]);
//!     }
//! }
//! ```
//!

pub(crate) mod fmt;

/// `usb-device` class
pub mod class;
pub mod command;
pub mod dispatcher;
pub mod io;
mod programmer;
pub mod session;

#[doc(inline)]
pub use crate::class::{USBaspClass, MAX_TRANSFER};
#[doc(inline)]
pub use crate::dispatcher::{Dispatcher, Response, LEN_MANY};
#[doc(inline)]
pub use crate::io::{
    FuseSelector, MemorySpace, ProgModeError, ProgrammerIO, SckOption, CAP_AUX, TICK_US,
};
pub use crate::programmer::Programmer;
#[doc(inline)]
pub use crate::session::{BlockFlags, Mode, Session, SessionError, WriteStatus, PACKET_SIZE};
