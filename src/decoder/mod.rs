//! Resumable decoders for the two streaming measurement formats.
//!
//! Each decoder is fed raw transport bytes in whatever chunks arrive and
//! pushes decoded events into a [`SampleSink`](crate::scan::SampleSink).
//! All decode state lives in the decoder struct, so a protocol unit may be
//! split across any number of calls.

mod express;
mod standard;

pub use self::express::ExpressScanDecoder;
pub use self::standard::StandardScanDecoder;

use std::f32::consts::PI;

/// Converts a raw angle in 1/64-degree units to radians.
#[inline]
pub(crate) fn angle_q6_to_rad(angle_q6: u16) -> f32 {
    (angle_q6 as f32) / 64.0 * (PI / 180.0)
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::scan::{Sample, SampleSink};

    /// Everything a decoder can report, in order.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Event {
        Sample(Sample),
        ZeroReturn,
        Boundary,
        Desync(usize),
    }

    /// Sink that records the raw event stream for assertions.
    #[derive(Debug, Default)]
    pub struct Recorder {
        pub events: Vec<Event>,
    }

    impl Recorder {
        pub fn samples(&self) -> Vec<Sample> {
            self.events
                .iter()
                .filter_map(|event| match event {
                    Event::Sample(sample) => Some(*sample),
                    _ => None,
                })
                .collect()
        }

        pub fn count(&self, matches: impl Fn(&Event) -> bool) -> usize {
            self.events.iter().filter(|event| matches(event)).count()
        }
    }

    impl SampleSink for Recorder {
        fn on_sample(&mut self, sample: Sample) {
            self.events.push(Event::Sample(sample));
        }

        fn on_zero_return(&mut self) {
            self.events.push(Event::ZeroReturn);
        }

        fn on_boundary(&mut self) {
            self.events.push(Event::Boundary);
        }

        fn on_desync(&mut self, skipped: usize) {
            self.events.push(Event::Desync(skipped));
        }
    }
}
