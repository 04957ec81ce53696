use super::angle_q6_to_rad;
use crate::base::{Error, Result};
use crate::scan::{Sample, SampleSink};
use std::f32::consts::TAU;

/// Resumable decoder for the standard scan format: an endless stream of
/// 5-byte units, one measurement each.
///
/// Unit layout:
///
/// * byte 0: quality in the upper 6 bits; bit 0 is the new-scan flag, bit 1
///   its complement (the pair `00`/`11` only occurs when the stream is
///   misaligned),
/// * byte 1: low 7 bits of the angle (bit 0 is a check bit, ignored),
/// * byte 2: high 8 bits of the angle, in 1/64-degree units,
/// * bytes 3..4: distance, little-endian, in 1/4-millimeter units.
///
/// The hardware guarantees byte alignment once streaming has started, so this
/// format has no resync: a failed check-bit pair is fatal to the session.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScanDecoder {
    /// Position within the current 5-byte unit.
    offset: u8,
    quality: u8,
    angle_low: u8,
    angle: f32,
    dist_low: u8,
}

impl StandardScanDecoder {
    /// Creates a decoder positioned at the start of a unit.
    pub fn new() -> StandardScanDecoder {
        StandardScanDecoder {
            offset: 0,
            quality: 0,
            angle_low: 0,
            angle: 0.0,
            dist_low: 0,
        }
    }

    /// Feeds a chunk of stream bytes, pushing decoded events into `sink`.
    ///
    /// The chunk may start and end anywhere relative to unit boundaries.
    /// Returns [`Error::InvalidSync`] when the check bits betray a misaligned
    /// stream; the error is fatal and the remaining input is dropped.
    pub fn decode<S: SampleSink>(&mut self, buf: &[u8], sink: &mut S) -> Result<()> {
        for &byte in buf {
            match self.offset {
                0 => {
                    let check_bits = byte & 0x3;
                    if check_bits == 0 || check_bits == 3 {
                        return Err(Error::InvalidSync {
                            description: format!(
                                "measurement check bits {:02b} are not complementary",
                                check_bits
                            ),
                        });
                    }
                    self.quality = byte >> 2;
                    if check_bits & 0x1 == 0x1 {
                        // This measurement is the first of a new rotation.
                        sink.on_boundary();
                    }
                    self.offset = 1;
                }
                1 => {
                    self.angle_low = byte >> 1;
                    self.offset = 2;
                }
                2 => {
                    let angle_q6 = ((byte as u16) << 7) | self.angle_low as u16;
                    self.angle = angle_q6_to_rad(angle_q6).rem_euclid(TAU);
                    self.offset = 3;
                }
                3 => {
                    self.dist_low = byte;
                    self.offset = 4;
                }
                _ => {
                    let dist_q2 = ((byte as u16) << 8) | self.dist_low as u16;
                    if dist_q2 > 0 {
                        sink.on_sample(Sample {
                            angle: self.angle,
                            distance: dist_q2 as f32 / 4000.0,
                            quality: Some(self.quality),
                        });
                    } else {
                        sink.on_zero_return();
                    }
                    self.offset = 0;
                }
            }
        }
        Ok(())
    }
}

impl Default for StandardScanDecoder {
    fn default() -> Self {
        Self::new()
    }
}
