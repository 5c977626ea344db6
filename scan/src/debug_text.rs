//! Text dump of raw readings for a serial terminal
//!
//! One line per conversion: a `k=>` channel label, then each reading as four
//! zero-padded decimal digits followed by a comma, then `A` and `\n\r`.
//!
//! ```text
//! 0=>0100,0200,0300,0400,0500,0600,A
//! ```

use core::fmt::Write;

use heapless::String;

use crate::conversion::ConversionResult;
use crate::{Channel, ADC_MAX};

/// Length of the readings part of a line
pub const LINE_LEN: usize = 33;
/// Length of a line with its channel label
pub const LABELLED_LEN: usize = LINE_LEN + 3;

/// A text transport that may refuse output instead of blocking
pub trait TextSink {
    /// Queue the whole string or nothing
    fn try_send(&mut self, text: &str) -> Result<(), Busy>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Busy;

pub fn render(result: &ConversionResult) -> String<LINE_LEN> {
    let mut line = String::new();
    for reading in result.readings {
        // Clamped to 12 bits so every field is four digits and the line fits
        write!(line, "{:04},", reading.min(ADC_MAX)).ok();
    }
    line.push_str("A\n\r").ok();
    line
}

pub fn render_labelled(channel: Channel, result: &ConversionResult) -> String<LABELLED_LEN> {
    let mut line = String::new();
    write!(line, "{}=>", channel.index()).ok();
    line.push_str(&render(result)).ok();
    line
}

/// Send one line to the sink, dropping it if the sink is busy
pub fn emit<S: TextSink>(sink: &mut S, channel: Channel, result: &ConversionResult) -> bool {
    sink.try_send(&render_labelled(channel, result)).is_ok()
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::READINGS;

    struct LimitedSink {
        out: std::string::String,
        room: usize,
    }

    impl TextSink for LimitedSink {
        fn try_send(&mut self, text: &str) -> Result<(), Busy> {
            if text.len() > self.room {
                return Err(Busy);
            }
            self.room -= text.len();
            self.out.push_str(text);
            Ok(())
        }
    }

    #[test]
    pub fn test_render() {
        let line = render(&ConversionResult::new([100, 200, 300, 400, 500, 600]));
        assert_eq!(line.as_str(), "0100,0200,0300,0400,0500,0600,A\n\r");
        assert_eq!(line.len(), LINE_LEN);
    }

    #[test]
    pub fn test_render_padding() {
        let line = render(&ConversionResult::new([0, 7, 42, 999, 1000, 4095]));
        assert_eq!(line.as_str(), "0000,0007,0042,0999,1000,4095,A\n\r");
    }

    #[test]
    pub fn test_render_out_of_range_keeps_terminator() {
        let line = render(&ConversionResult::new([u16::MAX, 10000, 4096, 4095, 0, 9999]));
        assert_eq!(line.as_str(), "4095,4095,4095,4095,0000,4095,A\n\r");
        assert_eq!(line.len(), LINE_LEN);

        let result = ConversionResult::new([u16::MAX; READINGS]);
        let labelled = render_labelled(Channel::FIRST, &result);
        assert!(labelled.ends_with("A\n\r"));
        assert_eq!(labelled.len(), LABELLED_LEN);
    }

    #[test]
    pub fn test_render_labelled() {
        let line = render_labelled(Channel::LAST, &ConversionResult::new([1; READINGS]));
        assert_eq!(line.as_str(), "5=>0001,0001,0001,0001,0001,0001,A\n\r");
        assert_eq!(line.len(), LABELLED_LEN);
    }

    #[test]
    pub fn test_busy_sink_drops_whole_line() {
        let mut sink = LimitedSink {
            out: std::string::String::new(),
            room: LABELLED_LEN + 10,
        };
        let result = ConversionResult::new([2; READINGS]);

        assert!(emit(&mut sink, Channel::FIRST, &result));
        assert!(!emit(&mut sink, Channel::FIRST, &result));
        assert_eq!(sink.out.len(), LABELLED_LEN);
    }
}
