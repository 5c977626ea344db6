#![allow(dead_code)]
#![cfg_attr(not(test), no_std)]

pub mod bridge;
pub mod buffer;
pub mod conversion;
pub mod debug_text;
pub mod hdlc;
pub mod pins;
pub mod sequencer;
pub mod signal;

#[cfg(feature = "stm32f0x1")]
pub mod adc;
#[cfg(feature = "stm32f0x1")]
pub mod gpio;

/// Number of logical sensing channels (drive electrodes)
pub const CHANNELS: usize = 6;
/// Number of analog inputs sampled by one conversion
pub const READINGS: usize = 6;
/// Bytes in one channel's segment of the sample buffer
pub const SEGMENT_LEN: usize = READINGS * 2;
/// Total size of the sample buffer sent to the peer
pub const FRAME_LEN: usize = CHANNELS * SEGMENT_LEN;
/// Largest value a 12-bit conversion can produce
pub const ADC_MAX: u16 = 4095;

/// A valid logical channel index, 0..CHANNELS
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Channel(u8);

impl Channel {
    pub const FIRST: Channel = Channel(0);
    pub const LAST: Channel = Channel(CHANNELS as u8 - 1);

    pub const fn new(index: usize) -> Option<Self> {
        if index < CHANNELS {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// The channel scanned after this one, or None if this is the last
    pub const fn next(&self) -> Option<Self> {
        Self::new(self.0 as usize + 1)
    }

    pub fn all() -> impl Iterator<Item = Channel> {
        (0..CHANNELS as u8).map(Channel)
    }
}

/// Electrical mode of a channel pin
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelMode {
    /// High impedance, readable by the ADC
    Analog,
    /// Low speed push-pull output, driven high
    DrivenOutput,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A conversion was started while another is still in flight
    ScanOutstanding,
    /// A conversion result arrived but no conversion was started
    NoScanOutstanding,
    /// A conversion was started before the converter was calibrated
    NotCalibrated,
    /// ADC calibration did not finish
    Calibration,
    /// ADC did not report ready after enable
    AdcNotReady,
    /// No conversion-complete arrived within the budget while this channel was driven
    Stalled(Channel),
    /// The sequencer is faulted and must be reset
    Faulted,
}

/// Configuration for the scan sequencer
#[derive(Clone, Copy, Debug)]
pub struct ScanConfig {
    /// Milliseconds to wait for a conversion-complete before declaring a stall
    pub conversion_timeout_ms: u32,
    /// Render each conversion as debug text for the serial dump
    pub debug_text: bool,
}

impl ScanConfig {
    const fn default() -> Self {
        Self {
            conversion_timeout_ms: 100,
            debug_text: false,
        }
    }
}

pub const DEFAULT_SCAN_CONFIG: ScanConfig = ScanConfig::default();

#[cfg(test)]
pub mod test {
    use super::*;

    #[test]
    pub fn test_channel_bounds() {
        assert!(Channel::new(CHANNELS - 1).is_some());
        assert!(Channel::new(CHANNELS).is_none());
        assert_eq!(Channel::LAST.next(), None);
        assert_eq!(Channel::FIRST.next().map(|c| c.index()), Some(1));

        let visited: Vec<usize> = Channel::all().map(|c| c.index()).collect();
        assert_eq!(visited, [0, 1, 2, 3, 4, 5]);
    }

    #[test]
    pub fn test_frame_geometry() {
        assert_eq!(SEGMENT_LEN, 12);
        assert_eq!(FRAME_LEN, 72);
    }
}
