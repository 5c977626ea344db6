//! Serial peer link
//!
//! Stands in for the wireless notification stack. A host asks for data with a
//! get-data frame and receives the next completed sample frame as one data
//! frame. Reception is polled from the main loop; transmission blocks for the
//! length of one frame.

use heapless::Vec;

use crate::hal::{
    gpio::{gpioa, Alternate, AF1},
    pac,
    prelude::*,
    serial::Serial,
};
use scan::bridge::Transmit;
use scan::buffer::Frame;
use scan::hdlc::{self, Control, Decoder, FrameError, MAX_ENCODED};

type TxPin = gpioa::PA2<Alternate<AF1>>;
type RxPin = gpioa::PA3<Alternate<AF1>>;

/// Bytes taken from the receiver per poll, so a chatty host cannot starve the scan
const RX_BURST: usize = 32;

/// What one poll of the receiver found
pub struct Received {
    pub data_request: bool,
    pub error: Option<FrameError>,
}

pub struct PeerLink {
    serial: Serial<pac::USART2, TxPin, RxPin>,
    decoder: Decoder,
    encoded: Vec<u8, MAX_ENCODED>,
    seq: u8,
}

impl PeerLink {
    pub fn new(serial: Serial<pac::USART2, TxPin, RxPin>) -> Self {
        Self {
            serial,
            decoder: Decoder::new(),
            encoded: Vec::new(),
            seq: 0,
        }
    }

    pub fn poll(&mut self) -> Received {
        let mut received = Received {
            data_request: false,
            error: None,
        };
        for _ in 0..RX_BURST {
            let byte = match self.serial.read() {
                Ok(byte) => byte,
                // Empty, or a line error the HAL has already cleared
                Err(_) => break,
            };
            match self.decoder.push(byte) {
                Some(Ok(packet)) if packet.is_data_request() => received.data_request = true,
                // Acknowledgements and other commands need no response
                Some(Ok(_)) => {}
                Some(Err(e)) => received.error = Some(e),
                None => {}
            }
        }
        received
    }

    fn send_encoded(&mut self) {
        for b in self.encoded.iter() {
            while self.serial.write(*b).is_err() {}
        }
    }
}

impl Transmit for PeerLink {
    type Error = FrameError;

    fn transmit(&mut self, frame: &Frame) -> Result<(), FrameError> {
        hdlc::encode(Control::data(self.seq), frame.as_bytes(), &mut self.encoded)?;
        self.seq = (self.seq + 1) & 7;
        self.send_encoded();
        Ok(())
    }
}
