//! Channel scan sequencer
//!
//! A scan cycle drives each channel in turn and takes one conversion while it
//! is driven:
//!
//! ```text
//!         tick && requested
//!   Idle ------------------> Scanning(0)
//!                                | conversion: write segment 0, switch 0 -> 1, start
//!                                v
//!                            Scanning(1) ... Scanning(N-1)
//!                                                | conversion: write segment N-1, release
//!   Idle <---------------------------------------+
//! ```
//!
//! A conversion that does not complete within the configured budget moves the
//! sequencer to `Faulted`, which only `reset` leaves.

use crate::buffer::SampleBuffer;
use crate::conversion::{ConversionEngine, ConversionResult, Converter};
use crate::pins::{PinController, PinDriver};
use crate::{Channel, Error, ScanConfig, CHANNELS, DEFAULT_SCAN_CONFIG};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanState {
    Idle,
    /// The channel is driven and its conversion is outstanding
    Scanning(Channel),
    /// The conversion for the channel never completed
    Faulted(Channel),
}

impl ScanState {
    /// Scan position: the channel index while scanning, CHANNELS when idle
    pub fn position(&self) -> usize {
        match self {
            ScanState::Idle => CHANNELS,
            ScanState::Scanning(c) | ScanState::Faulted(c) => c.index(),
        }
    }
}

/// Outcome of handling one conversion
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Progress {
    /// `written` was stored and `next` is now driven with its conversion started
    Advanced { written: Channel, next: Channel },
    /// `written` was the last segment; the buffer holds a full cycle
    Complete { written: Channel },
}

pub struct Sequencer<'a, P, C> {
    pins: PinController<P>,
    engine: ConversionEngine<C>,
    buffer: SampleBuffer,
    state: ScanState,
    requested: bool,
    config: &'a ScanConfig,
}

impl<'a, P: PinDriver, C: Converter> Sequencer<'a, P, C> {
    pub fn new(
        pins: PinController<P>,
        engine: ConversionEngine<C>,
        config: Option<&'a ScanConfig>,
    ) -> Self {
        Self {
            pins,
            engine,
            buffer: SampleBuffer::new(),
            state: ScanState::Idle,
            requested: false,
            config: config.unwrap_or(&DEFAULT_SCAN_CONFIG),
        }
    }

    /// Calibrate the converter. Must succeed before the first tick.
    pub fn calibrate(&mut self) -> Result<(), Error> {
        self.engine.calibrate()
    }

    /// Request a scan cycle on the next tick
    ///
    /// Has no effect while a cycle is in progress or the sequencer is faulted.
    pub fn request(&mut self) {
        if self.state == ScanState::Idle {
            self.requested = true;
        }
    }

    /// Withdraw a pending request. A cycle in progress still runs to completion.
    pub fn cancel_request(&mut self) {
        self.requested = false;
    }

    pub fn is_requested(&self) -> bool {
        self.requested
    }

    /// Handle the periodic tick
    ///
    /// Returns true if a cycle was started. A tick that arrives while the
    /// previous cycle is still running is reported as `ScanOutstanding` and
    /// changes nothing.
    pub fn on_tick(&mut self, now: u32) -> Result<bool, Error> {
        match self.state {
            ScanState::Faulted(_) => Err(Error::Faulted),
            ScanState::Scanning(_) => Err(Error::ScanOutstanding),
            ScanState::Idle if !self.requested => Ok(false),
            ScanState::Idle => {
                self.begin(Channel::FIRST, now)?;
                Ok(true)
            }
        }
    }

    /// Handle a conversion-complete event for the driven channel
    pub fn on_conversion(&mut self, result: ConversionResult, now: u32) -> Result<Progress, Error> {
        let channel = match self.state {
            ScanState::Scanning(channel) => channel,
            ScanState::Faulted(_) => return Err(Error::Faulted),
            ScanState::Idle => return Err(Error::NoScanOutstanding),
        };

        let result = self.engine.complete(result)?;
        self.buffer.write_segment(channel, &result);
        self.pins.deactivate(channel);

        match channel.next() {
            Some(next) => {
                self.begin(next, now)?;
                Ok(Progress::Advanced { written: channel, next })
            }
            None => {
                self.state = ScanState::Idle;
                self.requested = false;
                Ok(Progress::Complete { written: channel })
            }
        }
    }

    /// The next conversion waiting to be handed to `on_conversion`
    pub fn take_result(&mut self) -> Option<ConversionResult> {
        self.engine.take_result()
    }

    /// Check the outstanding conversion against the stall budget
    pub fn poll(&mut self, now: u32) -> Result<(), Error> {
        if let ScanState::Scanning(channel) = self.state {
            let elapsed = self.engine.elapsed(now).unwrap_or(0);
            if elapsed > self.config.conversion_timeout_ms {
                self.pins.release_all();
                self.engine.abandon();
                self.state = ScanState::Faulted(channel);
                return Err(Error::Stalled(channel));
            }
        }
        Ok(())
    }

    /// Abort any cycle, release every channel and drop a pending request
    ///
    /// The converter is stopped, so no result from the aborted cycle is
    /// delivered afterwards. Buffer contents are undefined until the next
    /// cycle completes.
    pub fn reset(&mut self) {
        self.pins.release_all();
        self.engine.abandon();
        self.state = ScanState::Idle;
        self.requested = false;
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn pins(&self) -> &PinController<P> {
        &self.pins
    }

    pub fn engine(&self) -> &ConversionEngine<C> {
        &self.engine
    }

    fn begin(&mut self, channel: Channel, now: u32) -> Result<(), Error> {
        self.pins.activate(channel);
        if let Err(e) = self.engine.start_scan(now) {
            self.pins.deactivate(channel);
            self.state = ScanState::Idle;
            return Err(e);
        }
        self.state = ScanState::Scanning(channel);
        Ok(())
    }
}
