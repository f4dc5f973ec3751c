use crate::dispatcher::{Dispatcher, Response};
use crate::io::ProgrammerIO;
use crate::session::{Session, SessionError, WriteStatus};

/// Protocol engine: the session, the dispatcher and the hardware behind them.
///
/// This is the transport-independent part. A USB stack calls
/// [`handle_setup()`](Programmer::handle_setup) for every vendor request and,
/// when it returns [`Response::DataPhase`], calls
/// [`produce_packet()`](Programmer::produce_packet) or
/// [`consume_packet()`](Programmer::consume_packet) once per data packet.
/// [`USBaspClass`](crate::USBaspClass) does exactly that for `usb-device`.
pub struct Programmer<T: ProgrammerIO> {
    session: Session,
    dispatcher: Dispatcher,
    io: T,
}

impl<T: ProgrammerIO> Programmer<T> {
    /// Creates an idle programmer.
    pub fn new(io: T) -> Self {
        Self {
            session: Session::new(),
            dispatcher: Dispatcher::new(),
            io,
        }
    }

    /// Handle a SETUP packet.
    pub fn handle_setup(&mut self, setup: &[u8; 8]) -> Response {
        self.dispatcher
            .dispatch(&mut self.session, &mut self.io, setup)
    }

    /// Reply bytes of the last command.
    pub fn reply(&self) -> &[u8] {
        self.dispatcher.reply()
    }

    /// Fill the next device-to-host packet. Capacity is `buf.len()`.
    pub fn produce_packet(&mut self, buf: &mut [u8]) -> Result<usize, SessionError> {
        self.session.produce(&mut self.io, buf)
    }

    /// Take the next host-to-device packet.
    pub fn consume_packet(&mut self, data: &[u8]) -> Result<WriteStatus, SessionError> {
        self.session.consume(&mut self.io, data)
    }

    /// Current session state.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Hardware layer.
    pub fn io(&self) -> &T {
        &self.io
    }

    /// Hardware layer, mutable.
    pub fn io_mut(&mut self) -> &mut T {
        &mut self.io
    }
}
