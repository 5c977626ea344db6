//! Hand-off of completed scans to the peer link
//!
//! Sampling and transmission run at different rates. The bridge is armed on a
//! tick when the peer has asked for data, and a cycle that completes while
//! armed is copied out and queued for one transmission. A cycle that completes
//! unarmed stays in the sample buffer and is not sent.

use crate::buffer::{Frame, SampleBuffer};

/// Downstream transport for completed frames
pub trait Transmit {
    type Error;

    fn transmit(&mut self, frame: &Frame) -> Result<(), Self::Error>;
}

pub struct NotificationBridge {
    armed: bool,
    pending: Option<Frame>,
    dropped: u32,
}

impl NotificationBridge {
    pub const fn new() -> Self {
        Self {
            armed: false,
            pending: None,
            dropped: 0,
        }
    }

    /// Tick-time gate. Arms the bridge when the peer has requested data and
    /// returns whether a scan should be requested. Without a request both the
    /// arm and the scan request are withdrawn.
    pub fn on_tick(&mut self, peer_request: bool) -> bool {
        self.armed = peer_request;
        peer_request
    }

    pub fn arm(&mut self) {
        self.armed = true;
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Handle scan-complete. Returns true if a transmission was scheduled.
    ///
    /// The buffer is copied, so the sequencer is free to start overwriting it
    /// before the transmission runs.
    pub fn on_scan_complete(&mut self, buffer: &SampleBuffer) -> bool {
        if !self.armed {
            return false;
        }
        self.armed = false;
        if self.pending.is_some() {
            // The previous frame was never sent; the newer one replaces it
            self.dropped = self.dropped.wrapping_add(1);
        }
        self.pending = Some(buffer.snapshot());
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Run the scheduled transmission, if any
    ///
    /// A failed transmission is not retried; the frame is discarded and the
    /// error returned for the caller to report.
    pub fn run<T: Transmit>(&mut self, link: &mut T) -> Result<bool, T::Error> {
        match self.pending.take() {
            Some(frame) => {
                link.transmit(&frame).map_err(|e| {
                    self.dropped = self.dropped.wrapping_add(1);
                    e
                })?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Frames that were scheduled but never delivered
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::conversion::ConversionResult;
    use crate::{Channel, READINGS};

    pub struct RecordingLink {
        pub sent: Vec<Frame>,
        pub fail: bool,
    }

    impl Transmit for RecordingLink {
        type Error = ();

        fn transmit(&mut self, frame: &Frame) -> Result<(), ()> {
            if self.fail {
                return Err(());
            }
            self.sent.push(*frame);
            Ok(())
        }
    }

    fn filled(value: u16) -> SampleBuffer {
        let mut buf = SampleBuffer::new();
        for c in Channel::all() {
            buf.write_segment(c, &ConversionResult::new([value; READINGS]));
        }
        buf
    }

    #[test]
    pub fn test_unarmed_completion_not_sent() {
        let mut bridge = NotificationBridge::new();
        let mut link = RecordingLink { sent: Vec::new(), fail: false };

        assert!(!bridge.on_tick(false));
        assert!(!bridge.on_scan_complete(&filled(1)));
        assert_eq!(bridge.run(&mut link), Ok(false));
        assert!(link.sent.is_empty());
    }

    #[test]
    pub fn test_armed_completion_sent_once() {
        let mut bridge = NotificationBridge::new();
        let mut link = RecordingLink { sent: Vec::new(), fail: false };

        assert!(bridge.on_tick(true));
        assert!(bridge.on_scan_complete(&filled(7)));
        assert!(!bridge.is_armed());
        // Arm is consumed by the first completion
        assert!(!bridge.on_scan_complete(&filled(8)));

        assert_eq!(bridge.run(&mut link), Ok(true));
        assert_eq!(bridge.run(&mut link), Ok(false));
        assert_eq!(link.sent.len(), 1);
        assert_eq!(link.sent[0].taxels(), [[7; READINGS]; 6]);
    }

    #[test]
    pub fn test_snapshot_survives_overwrite() {
        let mut bridge = NotificationBridge::new();
        let mut link = RecordingLink { sent: Vec::new(), fail: false };
        let mut buf = filled(3);

        bridge.arm();
        bridge.on_scan_complete(&buf);
        buf.write_segment(Channel::FIRST, &ConversionResult::new([9; READINGS]));

        bridge.run(&mut link).unwrap();
        assert_eq!(link.sent[0].as_bytes(), filled(3).as_bytes());
    }

    #[test]
    pub fn test_tick_without_request_disarms() {
        let mut bridge = NotificationBridge::new();
        bridge.on_tick(true);
        bridge.on_tick(false);
        assert!(!bridge.on_scan_complete(&filled(1)));
    }

    #[test]
    pub fn test_failed_transmit_dropped() {
        let mut bridge = NotificationBridge::new();
        let mut link = RecordingLink { sent: Vec::new(), fail: true };

        bridge.arm();
        bridge.on_scan_complete(&filled(1));
        assert_eq!(bridge.run(&mut link), Err(()));
        assert!(!bridge.is_pending());
        assert_eq!(bridge.dropped(), 1);
    }

    #[test]
    pub fn test_unsent_frame_replaced() {
        let mut bridge = NotificationBridge::new();
        let mut link = RecordingLink { sent: Vec::new(), fail: false };

        bridge.arm();
        bridge.on_scan_complete(&filled(1));
        bridge.arm();
        bridge.on_scan_complete(&filled(2));
        assert_eq!(bridge.dropped(), 1);

        bridge.run(&mut link).unwrap();
        assert_eq!(link.sent.len(), 1);
        assert_eq!(link.sent[0].taxels()[0], [2; READINGS]);
    }
}
