use core::cmp::min;
use core::marker::PhantomData;
use usb_device::{class_prelude::*, control::Request};

use crate::dispatcher::Response;
use crate::fmt::{trace, warning};
use crate::io::ProgrammerIO;
use crate::programmer::Programmer;
use crate::session::{SessionError, WriteStatus, PACKET_SIZE};

const USB_CLASS_VENDOR_SPECIFIC: u8 = 0xff;

/// Largest data stage handled in one control transfer. A read request with a
/// longer `wLength` is stalled, the armed session stays in place until the
/// next command.
///
/// **Warning**: must not exceed `usb-device`'s control buffer, this crate
/// enables its `control-buffer-256` feature.
pub const MAX_TRANSFER: usize = 256;

/// USBasp programmer class implementation for usb-device library.
///
/// All commands are vendor requests addressed to the device. The data stage
/// of a control transfer is split into [`PACKET_SIZE`] chunks and fed to the
/// session one chunk at a time. This matches how a low-speed device sees it.
pub struct USBaspClass<B: UsbBus, T: ProgrammerIO> {
    if_num: InterfaceNumber,
    _bus: PhantomData<B>,
    programmer: Programmer<T>,
}

/// Rebuild the raw SETUP packet the dispatcher decodes.
fn setup_packet(req: &Request) -> [u8; 8] {
    let value = req.value.to_le_bytes();
    let index = req.index.to_le_bytes();
    let length = req.length.to_le_bytes();
    [
        // bmRequestType
        (req.direction as u8) | ((req.request_type as u8) << 5) | (req.recipient as u8),
        req.request,
        value[0],
        value[1],
        index[0],
        index[1],
        length[0],
        length[1],
    ]
}

impl<B: UsbBus, T: ProgrammerIO> UsbClass<B> for USBaspClass<B, T> {
    fn get_configuration_descriptors(
        &self,
        writer: &mut DescriptorWriter,
    ) -> usb_device::Result<()> {
        // No endpoints besides EP0.
        writer.interface(self.if_num, USB_CLASS_VENDOR_SPECIFIC, 0, 0)?;

        Ok(())
    }

    // Handle control requests to the host.
    fn control_in(&mut self, xfer: ControlIn<B>) {
        let req = *xfer.request();

        if !Self::is_programmer_request(&req) {
            return;
        }

        let setup = setup_packet(&req);

        match self.programmer.handle_setup(&setup) {
            Response::DataPhase => {
                let total = req.length as usize;
                if total > MAX_TRANSFER {
                    warning!("read of {} bytes exceeds {}", total, MAX_TRANSFER);
                    xfer.reject().ok();
                    return;
                }

                let mut buf = [0u8; MAX_TRANSFER];
                match self.read_data_stage(&mut buf[..total]) {
                    Ok(len) => {
                        xfer.accept_with(&buf[..len]).ok();
                    }
                    Err(_) => {
                        xfer.reject().ok();
                    }
                }
            }
            Response::Empty | Response::Reply(_) => {
                xfer.accept_with(self.programmer.reply()).ok();
            }
        }
    }

    // Handle a control request from the host.
    fn control_out(&mut self, xfer: ControlOut<B>) {
        let req = *xfer.request();

        if !Self::is_programmer_request(&req) {
            return;
        }

        let setup = setup_packet(&req);

        match self.programmer.handle_setup(&setup) {
            Response::DataPhase => match self.write_data_stage(xfer.data()) {
                Ok(_) => {
                    xfer.accept().ok();
                }
                Err(_) => {
                    xfer.reject().ok();
                }
            },
            // There is no way to return a reply on OUT, drop it.
            Response::Empty | Response::Reply(_) => {
                xfer.accept().ok();
            }
        }
    }
}

impl<B: UsbBus, T: ProgrammerIO> USBaspClass<B, T> {
    /// Creates a new USBaspClass with the provided UsbBus and
    /// ProgrammerIO
    pub fn new(alloc: &UsbBusAllocator<B>, io: T) -> Self {
        Self {
            if_num: alloc.interface(),
            _bus: PhantomData,
            programmer: Programmer::new(io),
        }
    }

    /// Protocol engine behind this class.
    pub fn programmer(&self) -> &Programmer<T> {
        &self.programmer
    }

    /// Protocol engine behind this class, mutable.
    pub fn programmer_mut(&mut self) -> &mut Programmer<T> {
        &mut self.programmer
    }

    fn is_programmer_request(req: &Request) -> bool {
        req.request_type == control::RequestType::Vendor
            && req.recipient == control::Recipient::Device
    }

    fn read_data_stage(&mut self, buf: &mut [u8]) -> Result<usize, SessionError> {
        let mut len = 0;

        while len < buf.len() {
            let end = min(len + PACKET_SIZE, buf.len());
            let n = self.programmer.produce_packet(&mut buf[len..end])?;
            len += n;
            if n < PACKET_SIZE {
                break;
            }
        }

        trace!("sent {} bytes", len);
        Ok(len)
    }

    fn write_data_stage(&mut self, data: &[u8]) -> Result<WriteStatus, SessionError> {
        let mut status = WriteStatus::More;

        for packet in data.chunks(PACKET_SIZE) {
            status = self.programmer.consume_packet(packet)?;
            if status == WriteStatus::Complete {
                break;
            }
        }

        if status == WriteStatus::More && !data.is_empty() {
            trace!("{} bytes still expected", self.programmer.session().remaining());
        }
        Ok(status)
    }
}
