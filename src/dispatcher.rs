//! Command dispatcher.

use crate::command::Command;
use crate::fmt::{debug, info, warning};
use crate::io::{FuseSelector, ProgrammerIO, SckOption, TICK_US};
use crate::session::{Mode, Session};

/// Capacity of the reply buffer.
pub const REPLY_SIZE: usize = 8;

/// Length value telling the transport that the data stage is driven by the
/// session, not by a fixed reply.
pub const LEN_MANY: u8 = 0xff;

/// `SSTCS TPISR`: store to the auxiliary control/status space.
const AUX_SSTCS_TPISR: u8 = 0xc0;

fn wait_ticks<T: ProgrammerIO>(io: &mut T, ticks: u8) {
    io.wait_us(u32::from(ticks) * TICK_US);
}

/// What the transport has to do after a command was dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    /// No data stage.
    Empty,
    /// Send the first `n` bytes of [`Dispatcher::reply()`].
    Reply(u8),
    /// Data moves through the session's packet callbacks.
    DataPhase,
}

impl Response {
    /// Length as reported on the wire: `0`, the reply length, or [`LEN_MANY`].
    pub fn wire_len(self) -> u8 {
        match self {
            Response::Empty => 0,
            Response::Reply(n) => n,
            Response::DataPhase => LEN_MANY,
        }
    }
}

/// Decodes commands and applies them to a [`Session`].
///
/// The only state it keeps is the reply of the last command.
#[derive(Clone, Debug, Default)]
pub struct Dispatcher {
    reply: [u8; REPLY_SIZE],
    len: u8,
}

impl Dispatcher {
    /// Creates a dispatcher with an empty reply.
    pub const fn new() -> Self {
        Self {
            reply: [0; REPLY_SIZE],
            len: 0,
        }
    }

    /// Reply bytes of the last command, empty if it had none.
    pub fn reply(&self) -> &[u8] {
        &self.reply[..self.len as usize]
    }

    fn respond(&mut self, bytes: &[u8]) -> Response {
        self.reply[..bytes.len()].copy_from_slice(bytes);
        self.len = bytes.len() as u8;
        Response::Reply(self.len)
    }

    /// Handle one SETUP packet.
    ///
    /// Unknown requests are ignored and answered with an empty reply.
    pub fn dispatch<T: ProgrammerIO>(
        &mut self,
        session: &mut Session,
        io: &mut T,
        setup: &[u8; 8],
    ) -> Response {
        self.reply = [0; REPLY_SIZE];
        self.len = 0;

        let command = Command::decode(setup);
        debug!("request {}", setup[1]);

        match command {
            Command::Connect => {
                session.set_legacy_addressing();
                io.set_activity(true);
                io.isp_connect_selector(session.sck_selector());
                info!("isp connect, sck {}", session.sck_selector());
                Response::Empty
            }
            Command::Disconnect => {
                io.isp_disconnect();
                io.set_activity(false);
                info!("isp disconnect");
                Response::Empty
            }
            Command::Transmit(instruction) => self.transmit(io, instruction),
            Command::ReadFlash { address, count } => {
                session.begin_read(Mode::ReadFlash, address, count);
                Response::DataPhase
            }
            Command::ReadEeprom { address, count } => {
                session.begin_read(Mode::ReadEeprom, address, count);
                Response::DataPhase
            }
            Command::EnableProgramming => {
                let status = match io.enter_programming_mode() {
                    Ok(()) => 0,
                    Err(e) => {
                        warning!("target did not enter programming mode");
                        u8::from(e)
                    }
                };
                self.respond(&[status])
            }
            Command::WriteFlash {
                address,
                page_size,
                flags,
                count,
            } => {
                session.begin_flash_write(address, page_size, flags, count);
                Response::DataPhase
            }
            Command::WriteEeprom { address, count } => {
                session.begin_eeprom_write(address, count);
                Response::DataPhase
            }
            Command::SetLongAddress(address) => {
                session.set_long_address(address);
                debug!("long address {:#x}", address);
                Response::Empty
            }
            Command::SetProgrammingClock(raw) => {
                if SckOption::try_from(raw).is_err() {
                    warning!("unknown sck option {}", raw);
                }
                session.set_sck_selector(raw);
                self.respond(&[0])
            }
            Command::GetCapabilities => self.respond(&T::CAPABILITIES.to_le_bytes()),
            Command::AuxConnect { bit_delay } => {
                io.set_reset(true);
                wait_ticks(io, 3);
                io.set_reset(false);
                io.set_activity(true);
                wait_ticks(io, 16);
                io.aux_init(bit_delay);
                info!("aux connect, bit delay {}", bit_delay);
                Response::Empty
            }
            Command::AuxDisconnect => {
                io.aux_send_byte(AUX_SSTCS_TPISR);
                io.aux_send_byte(0);
                wait_ticks(io, 10);
                // pulse reset
                io.set_reset(true);
                wait_ticks(io, 5);
                io.set_reset(false);
                wait_ticks(io, 5);
                io.aux_release();
                io.set_activity(false);
                info!("aux disconnect");
                Response::Empty
            }
            Command::AuxRawRead => {
                let b = io.aux_recv_byte();
                self.respond(&[b])
            }
            Command::AuxRawWrite(b) => {
                io.aux_send_byte(b);
                Response::Empty
            }
            Command::AuxReadBlock { address, count } => {
                session.begin_aux(Mode::AuxRead, address, count);
                Response::DataPhase
            }
            Command::AuxWriteBlock { address, count } => {
                session.begin_aux(Mode::AuxWrite, address, count);
                Response::DataPhase
            }
            Command::Unknown(request) => {
                warning!("unknown request {}", request);
                Response::Empty
            }
        }
    }

    /// Raw ISP instruction. Signature, lock and fuse reads are answered
    /// through the dedicated accessors, everything else is clocked out.
    fn transmit<T: ProgrammerIO>(&mut self, io: &mut T, instruction: [u8; 4]) -> Response {
        let known = match instruction {
            [0x30, _, index, _] => Some(io.signature_byte(index)),
            [0x58, 0x00, _, _] => Some(io.fuse_byte(FuseSelector::Lock)),
            [0x58, 0x08, _, _] => Some(io.fuse_byte(FuseSelector::High)),
            [0x50, 0x00, _, _] => Some(io.fuse_byte(FuseSelector::Low)),
            [0x50, 0x08, _, _] => Some(io.fuse_byte(FuseSelector::Extended)),
            _ => None,
        };

        let reply = match known {
            Some(v) => [0, instruction[0], instruction[1], v],
            None => instruction.map(|b| io.transmit(b)),
        };
        self.respond(&reply)
    }
}
