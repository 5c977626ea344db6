//! Channel pin control
//!
//! Each logical channel owns one drive pin. Between scans every drive pin
//! sits in analog mode, which leaves the electrode floating. Scanning a
//! channel means switching its pin to a push-pull output and driving it high
//! for the duration of one conversion.
//!
//! [`PinController`] only sequences the electrical steps. It does not check
//! that a single channel is driven at a time; the scan sequencer guarantees
//! that by always deactivating the previous channel first.

use crate::{Channel, ChannelMode, CHANNELS};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    A,
    B,
    C,
}

/// A physical GPIO pin
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pin {
    pub port: Port,
    pub index: u8,
}

impl Pin {
    pub const fn new(port: Port, index: u8) -> Self {
        assert!(index < 16);
        Self { port, index }
    }
}

/// Low level pin access implemented by the board
pub trait PinDriver {
    /// Reconfigure the pin as a low speed push-pull output, no pull
    fn set_output(&mut self, pin: Pin);
    /// Reconfigure the pin as an analog input, no pull
    fn set_analog(&mut self, pin: Pin);
    fn set_high(&mut self, pin: Pin);
    fn set_low(&mut self, pin: Pin);
}

pub struct PinController<P> {
    driver: P,
    map: [Pin; CHANNELS],
    modes: [ChannelMode; CHANNELS],
}

impl<P: PinDriver> PinController<P> {
    /// Takes over the channel pins and puts each in analog mode
    pub fn new(mut driver: P, map: [Pin; CHANNELS]) -> Self {
        for pin in map {
            driver.set_low(pin);
            driver.set_analog(pin);
        }
        Self {
            driver,
            map,
            modes: [ChannelMode::Analog; CHANNELS],
        }
    }

    /// Switch the channel's pin to output and drive it high
    pub fn activate(&mut self, channel: Channel) {
        let pin = self.map[channel.index()];
        self.driver.set_output(pin);
        self.driver.set_high(pin);
        self.modes[channel.index()] = ChannelMode::DrivenOutput;
    }

    /// Drive the channel's pin low, then return it to analog
    pub fn deactivate(&mut self, channel: Channel) {
        let pin = self.map[channel.index()];
        self.driver.set_low(pin);
        self.driver.set_analog(pin);
        self.modes[channel.index()] = ChannelMode::Analog;
    }

    /// Return every channel to analog, whatever its recorded mode
    pub fn release_all(&mut self) {
        for channel in Channel::all() {
            self.deactivate(channel);
        }
    }

    pub fn mode(&self, channel: Channel) -> ChannelMode {
        self.modes[channel.index()]
    }

    pub fn pin(&self, channel: Channel) -> Pin {
        self.map[channel.index()]
    }

    /// The channel currently driven, if any
    pub fn driven(&self) -> Option<Channel> {
        Channel::all().find(|c| self.modes[c.index()] == ChannelMode::DrivenOutput)
    }

    pub fn driver(&self) -> &P {
        &self.driver
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum PinOp {
        Output(Pin),
        Analog(Pin),
        High(Pin),
        Low(Pin),
    }

    /// Records every pin operation and tracks which pins are outputs driven high
    pub struct RecordingPins {
        pub ops: Vec<PinOp>,
        outputs: Vec<Pin>,
        high: Vec<Pin>,
        pub max_driven: usize,
    }

    impl RecordingPins {
        pub fn new() -> Self {
            Self {
                ops: Vec::new(),
                outputs: Vec::new(),
                high: Vec::new(),
                max_driven: 0,
            }
        }

        /// Pins that are push-pull outputs and currently high
        pub fn driven(&self) -> Vec<Pin> {
            self.outputs
                .iter()
                .filter(|p| self.high.contains(p))
                .copied()
                .collect()
        }

        fn update(&mut self) {
            self.max_driven = self.max_driven.max(self.outputs.len());
        }
    }

    impl PinDriver for RecordingPins {
        fn set_output(&mut self, pin: Pin) {
            self.ops.push(PinOp::Output(pin));
            if !self.outputs.contains(&pin) {
                self.outputs.push(pin);
            }
            self.update();
        }

        fn set_analog(&mut self, pin: Pin) {
            self.ops.push(PinOp::Analog(pin));
            self.outputs.retain(|p| *p != pin);
            self.update();
        }

        fn set_high(&mut self, pin: Pin) {
            self.ops.push(PinOp::High(pin));
            if !self.high.contains(&pin) {
                self.high.push(pin);
            }
        }

        fn set_low(&mut self, pin: Pin) {
            self.ops.push(PinOp::Low(pin));
            self.high.retain(|p| *p != pin);
        }
    }

    pub const MAP: [Pin; CHANNELS] = [
        Pin::new(Port::B, 3),
        Pin::new(Port::B, 4),
        Pin::new(Port::B, 5),
        Pin::new(Port::B, 8),
        Pin::new(Port::B, 9),
        Pin::new(Port::B, 10),
    ];

    fn ch(i: usize) -> Channel {
        Channel::new(i).unwrap()
    }

    #[test]
    pub fn test_new_parks_all_pins_analog() {
        let pins = PinController::new(RecordingPins::new(), MAP);
        assert_eq!(pins.driven(), None);
        assert!(pins.driver().driven().is_empty());
        for pin in MAP {
            assert!(pins.driver().ops.contains(&PinOp::Analog(pin)));
        }
    }

    #[test]
    pub fn test_activate_order() {
        let mut pins = PinController::new(RecordingPins::new(), MAP);
        let setup = pins.driver().ops.len();

        pins.activate(ch(2));
        assert_eq!(pins.mode(ch(2)), ChannelMode::DrivenOutput);
        assert_eq!(pins.driven(), Some(ch(2)));
        assert_eq!(
            pins.driver().ops[setup..],
            [PinOp::Output(MAP[2]), PinOp::High(MAP[2])]
        );
        assert_eq!(pins.driver().driven(), [MAP[2]]);
    }

    #[test]
    pub fn test_deactivate_order() {
        let mut pins = PinController::new(RecordingPins::new(), MAP);
        pins.activate(ch(4));
        let before = pins.driver().ops.len();

        pins.deactivate(ch(4));
        assert_eq!(pins.mode(ch(4)), ChannelMode::Analog);
        assert_eq!(pins.driven(), None);
        // Level goes low before the pin is released to high impedance
        assert_eq!(
            pins.driver().ops[before..],
            [PinOp::Low(MAP[4]), PinOp::Analog(MAP[4])]
        );
        assert!(pins.driver().driven().is_empty());
    }

    #[test]
    pub fn test_release_all() {
        let mut pins = PinController::new(RecordingPins::new(), MAP);
        pins.activate(ch(5));
        pins.release_all();
        for c in Channel::all() {
            assert_eq!(pins.mode(c), ChannelMode::Analog);
        }
        assert!(pins.driver().driven().is_empty());
    }
}
