//! HDLC-style framing for the serial peer link
//!
//! Frame layout, before byte stuffing:
//!
//! ```text
//! 7E | address | control | payload ... | fcs lo | fcs hi | 7E
//! ```
//!
//! `7E` and `7D` inside a frame are sent as `7D` followed by the byte XOR
//! `20`. The FCS is CRC-16/X.25 over address, control and payload.

use heapless::Vec;

use crate::FRAME_LEN;

pub const FLAG: u8 = 0x7E;
pub const ESCAPE: u8 = 0x7D;
const ESCAPE_XOR: u8 = 0x20;
pub const ADDRESS: u8 = 0xFF;

/// Payload of a data frame asking for the next sample frame
pub const GET_DATA: u8 = 0x01;

/// Largest payload either side sends
pub const MAX_PAYLOAD: usize = FRAME_LEN;
/// Worst case encoded size: every byte but the flags stuffed
pub const MAX_ENCODED: usize = 2 + 2 * (MAX_PAYLOAD + 4);

const FCS_INIT: u16 = 0xFFFF;
/// Remainder of a received frame whose FCS checks out
const FCS_GOOD: u16 = 0xF0B8;

const CONTROL_S_FRAME: u8 = 1 << 0;
const CONTROL_SEND_SEQ: u8 = 1;
const CONTROL_S_TYPE: u8 = 2;
const CONTROL_POLL: u8 = 1 << 4;
const CONTROL_RECV_SEQ: u8 = 5;
const S_TYPE_REJECT: u8 = 0b10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Kind {
    Data,
    Ack,
    Nack,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Control {
    pub kind: Kind,
    /// Sequence number, modulo 8
    pub seq: u8,
}

impl Control {
    pub const fn data(seq: u8) -> Self {
        Self { kind: Kind::Data, seq: seq & 7 }
    }

    pub const fn ack(seq: u8) -> Self {
        Self { kind: Kind::Ack, seq: seq & 7 }
    }

    pub fn to_byte(&self) -> u8 {
        let seq = self.seq & 7;
        let bits = match self.kind {
            Kind::Data => seq << CONTROL_SEND_SEQ,
            Kind::Ack => CONTROL_S_FRAME | (seq << CONTROL_RECV_SEQ),
            Kind::Nack => {
                CONTROL_S_FRAME | (S_TYPE_REJECT << CONTROL_S_TYPE) | (seq << CONTROL_RECV_SEQ)
            }
        };
        bits | CONTROL_POLL
    }

    pub fn from_byte(byte: u8) -> Self {
        if byte & CONTROL_S_FRAME == 0 {
            Self::data(byte >> CONTROL_SEND_SEQ)
        } else {
            let kind = if (byte >> CONTROL_S_TYPE) & 0b11 == S_TYPE_REJECT {
                Kind::Nack
            } else {
                Kind::Ack
            };
            Self {
                kind,
                seq: (byte >> CONTROL_RECV_SEQ) & 7,
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Checksum mismatch
    Fcs,
    /// Frame too long for the receive buffer
    Overflow,
    /// Fewer bytes than address, control and FCS
    Short,
}

/// A received frame with its FCS verified
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    pub address: u8,
    pub control: Control,
    pub payload: Vec<u8, MAX_PAYLOAD>,
}

impl Packet {
    /// True for a data frame carrying the get-data command
    pub fn is_data_request(&self) -> bool {
        self.control.kind == Kind::Data && self.payload.as_slice() == [GET_DATA]
    }
}

pub fn fcs16(mut fcs: u16, data: &[u8]) -> u16 {
    for byte in data {
        fcs ^= *byte as u16;
        for _ in 0..8 {
            fcs = if fcs & 1 != 0 {
                (fcs >> 1) ^ 0x8408
            } else {
                fcs >> 1
            };
        }
    }
    fcs
}

fn push_stuffed(out: &mut Vec<u8, MAX_ENCODED>, byte: u8) -> Result<(), FrameError> {
    if byte == FLAG || byte == ESCAPE {
        out.push(ESCAPE).map_err(|_| FrameError::Overflow)?;
        out.push(byte ^ ESCAPE_XOR).map_err(|_| FrameError::Overflow)
    } else {
        out.push(byte).map_err(|_| FrameError::Overflow)
    }
}

/// Encode one frame into `out`, replacing its contents
pub fn encode(
    control: Control,
    payload: &[u8],
    out: &mut Vec<u8, MAX_ENCODED>,
) -> Result<(), FrameError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::Overflow);
    }
    out.clear();

    let header = [ADDRESS, control.to_byte()];
    let fcs = !fcs16(fcs16(FCS_INIT, &header), payload);

    out.push(FLAG).map_err(|_| FrameError::Overflow)?;
    for byte in header.iter().chain(payload).chain(&fcs.to_le_bytes()) {
        push_stuffed(out, *byte)?;
    }
    out.push(FLAG).map_err(|_| FrameError::Overflow)
}

/// Streaming frame decoder, fed one received byte at a time
pub struct Decoder {
    raw: Vec<u8, { MAX_PAYLOAD + 4 }>,
    in_frame: bool,
    escape: bool,
}

impl Decoder {
    pub const fn new() -> Self {
        Self {
            raw: Vec::new(),
            in_frame: false,
            escape: false,
        }
    }

    /// Returns a result each time a closing flag ends a non-empty frame
    pub fn push(&mut self, byte: u8) -> Option<Result<Packet, FrameError>> {
        if byte == FLAG {
            let finished = if self.in_frame && !self.raw.is_empty() {
                Some(self.finish())
            } else {
                None
            };
            // A closing flag may also open the next frame
            self.in_frame = true;
            self.escape = false;
            self.raw.clear();
            return finished;
        }

        if !self.in_frame {
            return None;
        }

        if byte == ESCAPE {
            self.escape = true;
            return None;
        }

        let byte = if self.escape {
            self.escape = false;
            byte ^ ESCAPE_XOR
        } else {
            byte
        };

        if self.raw.push(byte).is_err() {
            self.in_frame = false;
            self.escape = false;
            self.raw.clear();
            return Some(Err(FrameError::Overflow));
        }
        None
    }

    fn finish(&self) -> Result<Packet, FrameError> {
        let raw = self.raw.as_slice();
        if raw.len() < 4 {
            return Err(FrameError::Short);
        }
        if fcs16(FCS_INIT, raw) != FCS_GOOD {
            return Err(FrameError::Fcs);
        }
        let payload = Vec::from_slice(&raw[2..raw.len() - 2]).map_err(|_| FrameError::Overflow)?;
        Ok(Packet {
            address: raw[0],
            control: Control::from_byte(raw[1]),
            payload,
        })
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    fn decode_all(bytes: &[u8]) -> std::vec::Vec<Result<Packet, FrameError>> {
        let mut decoder = Decoder::new();
        bytes.iter().filter_map(|b| decoder.push(*b)).collect()
    }

    #[test]
    pub fn test_fcs_check_value() {
        assert_eq!(!fcs16(FCS_INIT, b"123456789"), 0x906E);
    }

    #[test]
    pub fn test_control_bytes() {
        assert_eq!(Control::data(0).to_byte(), 0x10);
        assert_eq!(Control::data(3).to_byte(), 0x16);
        assert_eq!(Control::ack(2).to_byte(), 0x51);
        assert_eq!(Control::from_byte(0x16), Control::data(3));
        assert_eq!(Control::from_byte(0x51), Control::ack(2));
        let nack = Control { kind: Kind::Nack, seq: 1 };
        assert_eq!(Control::from_byte(nack.to_byte()), nack);
    }

    #[test]
    pub fn test_encode_get_data() {
        let mut out = Vec::new();
        encode(Control::data(0), &[GET_DATA], &mut out).unwrap();

        assert_eq!(out[0], FLAG);
        assert_eq!(out[1..3], [ADDRESS, 0x10]);
        assert_eq!(out[3], GET_DATA);
        assert_eq!(*out.last().unwrap(), FLAG);

        let packets = decode_all(&out);
        assert_eq!(packets.len(), 1);
        let packet = packets[0].as_ref().unwrap();
        assert!(packet.is_data_request());
        assert_eq!(packet.address, ADDRESS);
    }

    #[test]
    pub fn test_stuffing() {
        let payload = [0x00, FLAG, ESCAPE, 0x20, 0xFF];
        let mut out = Vec::new();
        encode(Control::data(1), &payload, &mut out).unwrap();

        // Only the delimiting flags appear unescaped
        assert_eq!(out.iter().filter(|b| **b == FLAG).count(), 2);
        assert!(out.windows(2).any(|w| w == [ESCAPE, 0x5E]));
        assert!(out.windows(2).any(|w| w == [ESCAPE, 0x5D]));

        let packets = decode_all(&out);
        assert_eq!(packets[0].as_ref().unwrap().payload.as_slice(), payload);
    }

    #[test]
    pub fn test_full_sample_frame_fits() {
        // Worst case: every payload byte needs stuffing
        let payload = [FLAG; FRAME_LEN];
        let mut out = Vec::new();
        encode(Control::data(7), &payload, &mut out).unwrap();
        let packets = decode_all(&out);
        let packet = packets[0].as_ref().unwrap();
        assert_eq!(packet.payload.len(), FRAME_LEN);
        assert_eq!(packet.control, Control::data(7));
    }

    #[test]
    pub fn test_corrupt_fcs() {
        let mut out = Vec::new();
        encode(Control::data(0), &[GET_DATA], &mut out).unwrap();
        out[3] ^= 0x04;
        let expected: [Result<Packet, FrameError>; 1] = [Err(FrameError::Fcs)];
        assert_eq!(decode_all(&out), expected);
    }

    #[test]
    pub fn test_short_and_noise() {
        // Garbage before the first flag and empty frames between flags are ignored
        let bytes = [0x55, 0x01, FLAG, FLAG, 0xFF, 0x10, FLAG];
        let expected: [Result<Packet, FrameError>; 1] = [Err(FrameError::Short)];
        assert_eq!(decode_all(&bytes), expected);
    }

    #[test]
    pub fn test_overflow_resyncs() {
        let mut bytes = std::vec![FLAG];
        bytes.extend(std::iter::repeat(0x11).take(MAX_PAYLOAD + 10));
        let mut good = Vec::new();
        encode(Control::data(0), &[GET_DATA], &mut good).unwrap();
        bytes.extend_from_slice(&good);

        let results = decode_all(&bytes);
        assert_eq!(results[0], Err(FrameError::Overflow));
        assert!(results[1].as_ref().unwrap().is_data_request());
        assert_eq!(results.len(), 2);
    }

    #[test]
    pub fn test_back_to_back_frames_share_flag() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        encode(Control::data(0), &[GET_DATA], &mut a).unwrap();
        encode(Control::ack(1), &[], &mut b).unwrap();

        let mut bytes = a.to_vec();
        bytes.extend_from_slice(&b[1..]);
        let results = decode_all(&bytes);
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].as_ref().unwrap().control, Control::ack(1));
    }
}
