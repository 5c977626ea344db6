use crate::{Error, ADC_MAX, READINGS};

/// The readings produced by one multi-channel conversion, in rank order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConversionResult {
    pub readings: [u16; READINGS],
}

impl ConversionResult {
    pub const fn new(readings: [u16; READINGS]) -> Self {
        Self { readings }
    }
}

/// An analog converter that samples all inputs in one triggered sequence
///
/// `start` returns immediately. The driver collects the readings out of band,
/// normally from its interrupt, and hands out exactly one result per `start`
/// through `take_result`.
pub trait Converter {
    /// Blocking calibration, run once before the first conversion
    fn calibrate(&mut self) -> Result<(), Error>;
    fn start(&mut self);
    /// Halt the conversion in progress, if any. Readings from it that have not
    /// been taken yet are discarded and none arrive later.
    fn stop(&mut self);
    /// The next completed conversion, if one is waiting
    fn take_result(&mut self) -> Option<ConversionResult>;
}

/// Wraps a converter and enforces a single outstanding conversion
pub struct ConversionEngine<C> {
    converter: C,
    calibrated: bool,
    outstanding: bool,
    started: u32,
}

impl<C: Converter> ConversionEngine<C> {
    pub fn new(converter: C) -> Self {
        Self {
            converter,
            calibrated: false,
            outstanding: false,
            started: 0,
        }
    }

    pub fn calibrate(&mut self) -> Result<(), Error> {
        self.converter.calibrate()?;
        self.calibrated = true;
        Ok(())
    }

    /// Start a conversion, rejecting the request if one is already in flight
    ///
    /// now: current time in milliseconds, remembered for stall detection
    pub fn start_scan(&mut self, now: u32) -> Result<(), Error> {
        if !self.calibrated {
            return Err(Error::NotCalibrated);
        }
        if self.outstanding {
            return Err(Error::ScanOutstanding);
        }
        self.outstanding = true;
        self.started = now;
        self.converter.start();
        Ok(())
    }

    /// Accept the result of the outstanding conversion
    pub fn complete(&mut self, result: ConversionResult) -> Result<ConversionResult, Error> {
        if !self.outstanding {
            return Err(Error::NoScanOutstanding);
        }
        self.outstanding = false;
        Ok(result)
    }

    /// Stop the converter and forget the outstanding conversion, so nothing
    /// it produced can be taken for the next one
    pub fn abandon(&mut self) {
        self.converter.stop();
        self.outstanding = false;
    }

    pub fn take_result(&mut self) -> Option<ConversionResult> {
        self.converter.take_result()
    }

    pub fn is_outstanding(&self) -> bool {
        self.outstanding
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Milliseconds the outstanding conversion has been running
    pub fn elapsed(&self, now: u32) -> Option<u32> {
        if self.outstanding {
            Some(now.wrapping_sub(self.started))
        } else {
            None
        }
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }

    pub fn converter_mut(&mut self) -> &mut C {
        &mut self.converter
    }
}

/// Gathers single readings from an end-of-conversion interrupt into results
pub struct Collector {
    readings: [u16; READINGS],
    count: usize,
}

impl Collector {
    pub const fn new() -> Self {
        Self {
            readings: [0; READINGS],
            count: 0,
        }
    }

    /// Store the next reading in rank order. Returns the finished result
    /// once READINGS values have been collected.
    pub fn push(&mut self, raw: u16) -> Option<ConversionResult> {
        self.readings[self.count] = raw & ADC_MAX;
        self.count += 1;
        if self.count == READINGS {
            self.count = 0;
            Some(ConversionResult::new(self.readings))
        } else {
            None
        }
    }

    /// Drop a partially collected sequence
    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn len(&self) -> usize {
        self.count
    }
}
