use super::angle_q6_to_rad;
use crate::answers::RPLIDAR_RESP_MEASUREMENT_CAPSULED_SIZE;
use crate::base::{Error, Result};
use crate::scan::{Sample, SampleSink};
use log::{trace, warn};
use std::f32::consts::{PI, TAU};
use std::mem;

/// Expected upper nibble of the first express packet sync byte.
const RPLIDAR_RESP_MEASUREMENT_EXP_SYNC_1: u8 = 0xA;

/// Expected upper nibble of the second express packet sync byte.
const RPLIDAR_RESP_MEASUREMENT_EXP_SYNC_2: u8 = 0x5;

/// Cabins per packet; each cabin carries two measurements.
const CABINS_PER_PACKET: usize = 16;

/// Measurements per packet.
const SAMPLES_PER_PACKET: usize = 2 * CABINS_PER_PACKET;

const CABIN_SIZE: usize = 5;

/// One decoded cabin measurement: distance in meters (zero for no return)
/// and the signed delta-angle correction in radians.
type CabinNode = (f32, f32);

/// Decode position within an express packet.
#[derive(Debug, Clone, PartialEq)]
enum DecodeState {
    /// Hunting for the first sync nibble, one byte at a time.
    Sync1,
    /// The first sync nibble matched; checking the second.
    Sync2,
    /// Reading the low byte of the reference angle.
    AngleLow,
    /// Reading the high byte of the reference angle.
    AngleHigh,
    /// Filling cabin `cabin`, at byte `byte` of five.
    Cabin { cabin: usize, byte: usize },
}

/// Resumable decoder for the express scan format: 84-byte packets holding one
/// absolute reference angle and 16 bit-packed cabins of two measurements each.
///
/// A packet only carries the *start* angle of its 32 measurements; the angle
/// of each one is interpolated between that packet's reference angle and the
/// next packet's. Decoding therefore runs one packet behind the wire: a
/// packet's cabins are unpacked as they arrive, parked, and emitted when the
/// following header supplies the closing angle. The final partial packet of a
/// session is simply dropped, which is fine because every packet re-anchors
/// the angle.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressScanDecoder {
    state: DecodeState,
    angle_low: u8,
    /// Reference angle of the packet currently being filled, in radians.
    ref_angle: f32,
    /// Reference angle of the most recently completed packet.
    prev_angle: Option<f32>,
    cabin_buf: [u8; CABIN_SIZE],
    /// Cabin measurements of the packet currently being filled.
    building: [CabinNode; SAMPLES_PER_PACKET],
    /// Completed packet awaiting the next reference angle, paired with
    /// `prev_angle` as its start angle.
    pending: Option<[CabinNode; SAMPLES_PER_PACKET]>,
    /// Bytes discarded by the current sync search episode.
    skipped: usize,
}

impl ExpressScanDecoder {
    /// Creates a decoder hunting for its first packet sync.
    pub fn new() -> ExpressScanDecoder {
        ExpressScanDecoder {
            state: DecodeState::Sync1,
            angle_low: 0,
            ref_angle: 0.0,
            prev_angle: None,
            cabin_buf: [0; CABIN_SIZE],
            building: [(0.0, 0.0); SAMPLES_PER_PACKET],
            pending: None,
            skipped: 0,
        }
    }

    /// Feeds a chunk of stream bytes, pushing decoded events into `sink`.
    ///
    /// The chunk may start and end anywhere relative to packet boundaries;
    /// the whole chunk is always consumed. Desync episodes are reported once
    /// each through [`SampleSink::on_desync`] when sync is re-found. When a
    /// search runs past a full packet's worth of bytes without finding the
    /// markers, [`Error::LossOfSync`] is returned; decoding has not stopped
    /// and the caller may keep feeding bytes.
    pub fn decode<S: SampleSink>(&mut self, buf: &[u8], sink: &mut S) -> Result<()> {
        for &byte in buf {
            self.push_byte(byte, sink);
        }

        if self.skipped > RPLIDAR_RESP_MEASUREMENT_CAPSULED_SIZE {
            let skipped = mem::replace(&mut self.skipped, 0);
            warn!(
                "no express sync marker within {} bytes, still searching",
                skipped
            );
            return Err(Error::LossOfSync { skipped });
        }
        Ok(())
    }

    fn push_byte<S: SampleSink>(&mut self, byte: u8, sink: &mut S) {
        match self.state {
            DecodeState::Sync1 => {
                if byte >> 4 == RPLIDAR_RESP_MEASUREMENT_EXP_SYNC_1 {
                    self.state = DecodeState::Sync2;
                } else {
                    self.skipped += 1;
                }
            }
            DecodeState::Sync2 => {
                if byte >> 4 == RPLIDAR_RESP_MEASUREMENT_EXP_SYNC_2 {
                    if self.skipped > 0 {
                        trace!("express sync re-found after {} bytes", self.skipped);
                        sink.on_desync(mem::replace(&mut self.skipped, 0));
                    }
                    self.state = DecodeState::AngleLow;
                } else {
                    // The first marker was a false positive; both bytes are
                    // lost to the search.
                    self.skipped += 2;
                    self.state = DecodeState::Sync1;
                }
            }
            DecodeState::AngleLow => {
                self.angle_low = byte;
                self.state = DecodeState::AngleHigh;
            }
            DecodeState::AngleHigh => {
                let angle_q6 = (((byte & 0x7F) as u16) << 8) | self.angle_low as u16;
                self.ref_angle = angle_q6_to_rad(angle_q6);

                if let Some(prev_angle) = self.prev_angle {
                    // The reference angle wrapping past zero marks the start
                    // of a new rotation.
                    if self.ref_angle < prev_angle {
                        sink.on_boundary();
                    }
                    if let Some(pending) = self.pending.take() {
                        self.emit_pending(prev_angle, &pending, sink);
                    }
                }

                self.state = DecodeState::Cabin { cabin: 0, byte: 0 };
            }
            DecodeState::Cabin { cabin, byte: index } => {
                self.cabin_buf[index] = byte;
                if index + 1 < CABIN_SIZE {
                    self.state = DecodeState::Cabin {
                        cabin,
                        byte: index + 1,
                    };
                } else {
                    self.unpack_cabin(cabin);
                    if cabin + 1 < CABINS_PER_PACKET {
                        self.state = DecodeState::Cabin {
                            cabin: cabin + 1,
                            byte: 0,
                        };
                    } else {
                        // Packet complete: park its measurements until the
                        // next header supplies the closing angle.
                        self.pending = Some(self.building);
                        self.prev_angle = Some(self.ref_angle);
                        self.state = DecodeState::Sync1;
                    }
                }
            }
        }
    }

    /// Unpacks the buffered 5-byte cabin into measurement slots `2*cabin` and
    /// `2*cabin + 1`.
    ///
    /// Per measurement: 14 distance bits split over a full byte and the upper
    /// six bits of a leading byte, in millimeters; a sign bit and the top
    /// magnitude bit of the delta-angle in the leading byte's lowest two
    /// bits; the remaining four magnitude bits packed two-per-packet into the
    /// cabin's final byte, in 1/8-degree units.
    fn unpack_cabin(&mut self, cabin: usize) {
        let [b0, b1, b2, b3, b4] = self.cabin_buf;

        let dist1 = (((b1 as u16) << 6) | ((b0 >> 2) as u16)) as f32 / 1000.0;
        let dist2 = (((b3 as u16) << 6) | ((b2 >> 2) as u16)) as f32 / 1000.0;
        let delta1 = delta_angle(b0, b4 & 0x0F);
        let delta2 = delta_angle(b2, b4 >> 4);

        self.building[2 * cabin] = (dist1, delta1);
        self.building[2 * cabin + 1] = (dist2, delta2);
    }

    /// Emits a parked packet's 32 measurements, spreading them evenly across
    /// the angular gap between its own reference angle (`start_angle`) and
    /// the one just received.
    fn emit_pending<S: SampleSink>(
        &self,
        start_angle: f32,
        pending: &[CabinNode; SAMPLES_PER_PACKET],
        sink: &mut S,
    ) {
        let mut gap = self.ref_angle - start_angle;
        if gap < 0.0 {
            gap += TAU;
        }
        // The measured interpolation step is the gap over the sample count,
        // not the cabin count.
        let step = gap / SAMPLES_PER_PACKET as f32;

        for (i, &(distance, delta)) in pending.iter().enumerate() {
            if distance > 0.0 {
                let angle = (start_angle + step * i as f32 - delta).rem_euclid(TAU);
                sink.on_sample(Sample {
                    angle,
                    distance,
                    quality: None,
                });
            } else {
                sink.on_zero_return();
            }
        }
    }
}

impl Default for ExpressScanDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Reconstructs a delta-angle in radians from a cabin's leading byte and the
/// four low magnitude bits: bit 1 of `lead` is the sign, bit 0 the top
/// magnitude bit, `mag_low` the rest, in 1/8-degree units.
#[inline]
fn delta_angle(lead: u8, mag_low: u8) -> f32 {
    let magnitude = (((lead & 0x1) << 4) | mag_low) as f32;
    let sign = if lead & 0x2 != 0 { -1.0 } else { 1.0 };
    sign * magnitude / 8.0 * (PI / 180.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::testutil::{Event, Recorder};

    /// Builds a cabin from raw distances in millimeters and delta-angles as
    /// (sign-bit, 5-bit magnitude in 1/8 degrees) pairs.
    fn cabin(d1: u16, d2: u16, delta1: (u8, u8), delta2: (u8, u8)) -> [u8; 5] {
        let (s1, m1) = delta1;
        let (s2, m2) = delta2;
        [
            (((d1 & 0x3F) as u8) << 2) | (s1 << 1) | (m1 >> 4),
            (d1 >> 6) as u8,
            (((d2 & 0x3F) as u8) << 2) | (s2 << 1) | (m2 >> 4),
            (d2 >> 6) as u8,
            ((m2 & 0x0F) << 4) | (m1 & 0x0F),
        ]
    }

    const NO_DELTA: (u8, u8) = (0, 0);

    /// Builds a full 84-byte packet with the given reference angle (degrees)
    /// and identical cabins.
    fn packet(ref_angle_deg: f32, cabin_bytes: [u8; 5]) -> Vec<u8> {
        let angle_q6 = (ref_angle_deg * 64.0) as u16;
        let mut bytes = vec![
            0xA0,
            0x50,
            (angle_q6 & 0xFF) as u8,
            (angle_q6 >> 8) as u8,
        ];
        for _ in 0..CABINS_PER_PACKET {
            bytes.extend_from_slice(&cabin_bytes);
        }
        bytes
    }

    #[test]
    fn first_packet_emits_nothing() {
        let mut decoder = ExpressScanDecoder::new();
        let mut recorder = Recorder::default();

        decoder
            .decode(&packet(0.0, cabin(1000, 1000, NO_DELTA, NO_DELTA)), &mut recorder)
            .unwrap();

        assert!(recorder.events.is_empty());
    }

    #[test]
    fn samples_interpolate_evenly_between_reference_angles() {
        let mut decoder = ExpressScanDecoder::new();
        let mut recorder = Recorder::default();

        decoder
            .decode(&packet(0.0, cabin(1000, 1000, NO_DELTA, NO_DELTA)), &mut recorder)
            .unwrap();
        decoder
            .decode(&packet(90.0, cabin(1000, 1000, NO_DELTA, NO_DELTA)), &mut recorder)
            .unwrap();

        // The second header releases the first packet's 32 samples, evenly
        // spaced over the quarter turn: pi/64 per step, ascending.
        let samples = recorder.samples();
        assert_eq!(samples.len(), 32);
        for (k, sample) in samples.iter().enumerate() {
            let expected = k as f32 * (PI / 64.0);
            assert!(
                (sample.angle - expected).abs() < 1e-6,
                "sample {}: angle {} != {}",
                k,
                sample.angle,
                expected
            );
            assert!((sample.distance - 1.0).abs() < 1e-6);
            assert_eq!(sample.quality, None);
        }
        for pair in samples.windows(2) {
            assert!(pair[0].angle < pair[1].angle);
        }
    }

    #[test]
    fn delta_angles_shift_individual_samples() {
        let mut decoder = ExpressScanDecoder::new();
        let mut recorder = Recorder::default();

        // Only the first cabin returns anything: sample 0 with delta -1.5
        // degrees (sign bit set, magnitude 12/8), sample 1 with +3 degrees
        // (magnitude 24/8, top magnitude bit in the lead byte).
        let mut bytes = packet(0.0, cabin(0, 0, NO_DELTA, NO_DELTA));
        bytes.splice(4..9, cabin(2000, 3000, (1, 12), (0, 24)).iter().copied());
        decoder.decode(&bytes, &mut recorder).unwrap();
        decoder
            .decode(&packet(90.0, cabin(0, 0, NO_DELTA, NO_DELTA)), &mut recorder)
            .unwrap();

        let samples = recorder.samples();
        assert_eq!(samples.len(), 2);
        let step = (PI / 2.0) / 32.0;
        let deg = PI / 180.0;

        // Subtracting a negative delta pushes the angle forward.
        assert!((samples[0].angle - 1.5 * deg).abs() < 1e-6);
        assert!((samples[0].distance - 2.0).abs() < 1e-6);
        let expected1 = (step - 3.0 * deg).rem_euclid(TAU);
        assert!((samples[1].angle - expected1).abs() < 1e-6);
        assert!((samples[1].distance - 3.0).abs() < 1e-6);

        assert_eq!(recorder.count(|e| matches!(e, Event::ZeroReturn)), 30);
    }

    #[test]
    fn wrapped_reference_angle_opens_a_new_scan() {
        let mut decoder = ExpressScanDecoder::new();
        let mut recorder = Recorder::default();

        let cabins = cabin(500, 500, NO_DELTA, NO_DELTA);
        decoder.decode(&packet(350.0, cabins), &mut recorder).unwrap();
        decoder.decode(&packet(15.0, cabins), &mut recorder).unwrap();

        // The boundary fires before the parked samples are released, so the
        // interpolated points land in the fresh rotation.
        assert_eq!(recorder.events[0], Event::Boundary);
        assert_eq!(recorder.samples().len(), 32);
        assert_eq!(recorder.count(|e| matches!(e, Event::Boundary)), 1);

        // 350 -> 15 degrees wraps: the gap is 25 degrees, not -335.
        let samples = recorder.samples();
        let step = 25.0 / 32.0 * (PI / 180.0);
        let start = 350.0 * (PI / 180.0);
        for (k, sample) in samples.iter().enumerate() {
            let expected = (start + step * k as f32).rem_euclid(TAU);
            assert!((sample.angle - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn single_garbage_byte_reports_one_desync_episode() {
        let mut decoder = ExpressScanDecoder::new();
        let mut recorder = Recorder::default();

        let cabins = cabin(1000, 1000, NO_DELTA, NO_DELTA);
        let mut stream = vec![0x17];
        stream.extend_from_slice(&packet(0.0, cabins));
        stream.extend_from_slice(&packet(45.0, cabins));

        decoder.decode(&stream, &mut recorder).unwrap();

        assert_eq!(recorder.events[0], Event::Desync(1));
        assert_eq!(recorder.count(|e| matches!(e, Event::Desync(_))), 1);
        // The packet after the garbage byte decodes normally.
        assert_eq!(recorder.samples().len(), 32);
    }

    #[test]
    fn searching_past_a_full_packet_is_loss_of_sync() {
        let mut decoder = ExpressScanDecoder::new();
        let mut recorder = Recorder::default();

        match decoder.decode(&[0u8; 200], &mut recorder) {
            Err(Error::LossOfSync { skipped }) => assert_eq!(skipped, 200),
            other => panic!("expected LossOfSync, got {:?}", other),
        }

        // Not fatal: a valid stream afterwards decodes normally.
        let cabins = cabin(1000, 1000, NO_DELTA, NO_DELTA);
        decoder.decode(&packet(0.0, cabins), &mut recorder).unwrap();
        decoder.decode(&packet(90.0, cabins), &mut recorder).unwrap();
        assert_eq!(recorder.samples().len(), 32);
    }

    #[test]
    fn false_sync_prefix_returns_to_search() {
        let mut decoder = ExpressScanDecoder::new();
        let mut recorder = Recorder::default();

        // 0xA1 matches the first marker but 0x17 fails the second; both are
        // consumed by the search.
        let cabins = cabin(1000, 1000, NO_DELTA, NO_DELTA);
        let mut stream = vec![0xA1, 0x17];
        stream.extend_from_slice(&packet(0.0, cabins));
        stream.extend_from_slice(&packet(45.0, cabins));

        decoder.decode(&stream, &mut recorder).unwrap();

        assert_eq!(recorder.events[0], Event::Desync(2));
        assert_eq!(recorder.samples().len(), 32);
    }

    #[test]
    fn chunked_input_decodes_identically() {
        // Three packets with varied distances, deltas, zero returns and a
        // rotation boundary in the middle.
        let mut stream = Vec::new();
        stream.extend_from_slice(&packet(340.0, cabin(800, 0, (1, 7), NO_DELTA)));
        stream.extend_from_slice(&packet(355.0, cabin(1200, 2500, (0, 3), (1, 19))));
        stream.extend_from_slice(&packet(5.0, cabin(0, 600, NO_DELTA, (0, 31))));
        stream.extend_from_slice(&packet(20.0, cabin(900, 900, (1, 1), (0, 1))));

        let mut reference = Recorder::default();
        ExpressScanDecoder::new()
            .decode(&stream, &mut reference)
            .unwrap();
        assert!(!reference.events.is_empty());

        for split in 0..=stream.len() {
            let mut decoder = ExpressScanDecoder::new();
            let mut recorder = Recorder::default();
            decoder.decode(&stream[..split], &mut recorder).unwrap();
            decoder.decode(&stream[split..], &mut recorder).unwrap();
            assert_eq!(recorder.events, reference.events, "split at {}", split);
        }

        let mut decoder = ExpressScanDecoder::new();
        let mut recorder = Recorder::default();
        for byte in stream.iter() {
            decoder.decode(&[*byte], &mut recorder).unwrap();
        }
        assert_eq!(recorder.events, reference.events);
    }
}
