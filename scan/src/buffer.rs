use crate::conversion::ConversionResult;
use crate::{Channel, CHANNELS, FRAME_LEN, READINGS, SEGMENT_LEN};

/// Packed scan results, one segment per channel
///
/// Segment `k` holds the readings taken while channel `k` was driven, each
/// as a big-endian u16.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleBuffer {
    bytes: [u8; FRAME_LEN],
}

impl SampleBuffer {
    pub const fn new() -> Self {
        Self {
            bytes: [0; FRAME_LEN],
        }
    }

    pub fn write_segment(&mut self, channel: Channel, result: &ConversionResult) {
        let segment = &mut self.bytes[offset(channel)..offset(channel) + SEGMENT_LEN];
        for (dst, reading) in segment.chunks_exact_mut(2).zip(result.readings) {
            dst.copy_from_slice(&reading.to_be_bytes());
        }
    }

    pub fn segment(&self, channel: Channel) -> &[u8] {
        &self.bytes[offset(channel)..offset(channel) + SEGMENT_LEN]
    }

    /// Decode a segment back into readings
    pub fn readings(&self, channel: Channel) -> [u16; READINGS] {
        decode(self.segment(channel))
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.bytes
    }

    /// Copy the buffer out for a reader that must not see later writes
    pub fn snapshot(&self) -> Frame {
        Frame { bytes: self.bytes }
    }
}

/// An immutable copy of a completed sample buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; FRAME_LEN],
}

impl Frame {
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.bytes
    }

    /// The frame as a grid of readings, indexed [channel][input]
    pub fn taxels(&self) -> [[u16; READINGS]; CHANNELS] {
        let mut grid = [[0; READINGS]; CHANNELS];
        for (row, segment) in grid.iter_mut().zip(self.bytes.chunks_exact(SEGMENT_LEN)) {
            *row = decode(segment);
        }
        grid
    }
}

fn offset(channel: Channel) -> usize {
    channel.index() * SEGMENT_LEN
}

fn decode(segment: &[u8]) -> [u16; READINGS] {
    let mut readings = [0; READINGS];
    for (r, pair) in readings.iter_mut().zip(segment.chunks_exact(2)) {
        *r = u16::from_be_bytes([pair[0], pair[1]]);
    }
    readings
}
