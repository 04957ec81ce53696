use log::{trace, warn};
use std::mem;
use std::time::Instant;

/// One decoded range measurement.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Sample {
    /// Angle in radians, normalized to `[0, 2π)`.
    pub angle: f32,
    /// Distance in meters. Always greater than zero; zero returns are counted
    /// instead of emitted.
    pub distance: f32,
    /// Signal quality as reported by the sensor. The express format does not
    /// carry quality, so express samples report `None`.
    pub quality: Option<u8>,
}

/// One full rotation's worth of samples, delimited by two consecutive
/// new-scan boundaries. Immutable once emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct Scan {
    /// 1-based index of this rotation within the session.
    pub index: u32,
    /// Samples in emission order.
    pub samples: Vec<Sample>,
    /// Rotation rate in Hz, from the time between the two delimiting
    /// boundaries.
    pub rotation_rate: f32,
    /// Number of measurements in this rotation that reported no return.
    pub zero_returns: u32,
}

/// Receiver for the event stream a scan decoder produces.
///
/// The decoders know nothing about rotations or consumers; they only push
/// samples, zero returns, boundaries and desync reports into this seam.
/// [`ScanAggregator`] is the production implementation.
pub trait SampleSink {
    /// A valid measurement was decoded.
    fn on_sample(&mut self, sample: Sample);

    /// A measurement with distance zero (no reflection) was decoded.
    fn on_zero_return(&mut self);

    /// The stream crossed the sensor's rotation start.
    fn on_boundary(&mut self);

    /// The express decoder discarded `skipped` bytes before re-finding packet
    /// sync. Fired once per desync episode.
    fn on_desync(&mut self, skipped: usize) {
        let _ = skipped;
    }
}

/// Receiver for completed scans.
pub trait ScanConsumer {
    /// Called once per completed rotation, in order.
    fn on_scan(&mut self, scan: Scan);
}

/// Running totals over a whole scan session.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Completed rotations emitted to the consumer.
    pub scans: u32,
    /// Valid samples across all rotations, including partial ones.
    pub samples: u64,
    /// Zero returns across all rotations.
    pub zero_returns: u64,
    /// Express desync episodes observed.
    pub desyncs: u64,
}

/// Groups the decoder event stream into [`Scan`]s.
///
/// Owns the currently open rotation. A boundary closes it: the rotation rate
/// is computed from the time elapsed since the previous boundary, the scan
/// index is incremented and the finished scan is handed to the consumer.
/// Everything received before the first boundary is a partial rotation and is
/// dropped, as is the open rotation when the session stops.
#[derive(Debug)]
pub struct ScanAggregator<C: ScanConsumer> {
    consumer: C,
    samples: Vec<Sample>,
    zero_returns: u32,
    scan_index: u32,
    last_boundary: Option<Instant>,
    stats: ScanStats,
}

impl<C: ScanConsumer> ScanAggregator<C> {
    /// Creates an aggregator feeding completed scans to `consumer`.
    pub fn new(consumer: C) -> ScanAggregator<C> {
        ScanAggregator {
            consumer,
            samples: Vec::new(),
            zero_returns: 0,
            scan_index: 0,
            last_boundary: None,
            stats: ScanStats::default(),
        }
    }

    /// Session totals so far.
    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// Tears down the aggregator, returning the consumer. The open partial
    /// rotation, if any, is discarded.
    pub fn into_consumer(self) -> C {
        self.consumer
    }

    /// Records a rotation boundary observed at `now`.
    ///
    /// Exposed separately from [`SampleSink::on_boundary`] so rate
    /// computation can be driven by synthetic timestamps in tests.
    pub fn boundary_at(&mut self, now: Instant) {
        match self.last_boundary {
            Some(previous) => {
                let elapsed = now.duration_since(previous).as_secs_f32();
                let rotation_rate = if elapsed > 0.0 { 1.0 / elapsed } else { 0.0 };
                self.scan_index += 1;
                let scan = Scan {
                    index: self.scan_index,
                    samples: mem::take(&mut self.samples),
                    rotation_rate,
                    zero_returns: mem::replace(&mut self.zero_returns, 0),
                };
                trace!(
                    "scan {} complete: {} samples, {} zero returns, {:.1} Hz",
                    scan.index,
                    scan.samples.len(),
                    scan.zero_returns,
                    scan.rotation_rate
                );
                self.stats.scans += 1;
                self.consumer.on_scan(scan);
            }
            None => {
                // The data before the first boundary is a partial rotation
                // with no usable rate; drop it.
                trace!(
                    "first boundary: dropping {} samples of partial rotation",
                    self.samples.len()
                );
                self.samples.clear();
                self.zero_returns = 0;
            }
        }
        self.last_boundary = Some(now);
    }
}

impl<C: ScanConsumer> SampleSink for ScanAggregator<C> {
    fn on_sample(&mut self, sample: Sample) {
        self.stats.samples += 1;
        self.samples.push(sample);
    }

    fn on_zero_return(&mut self) {
        self.zero_returns += 1;
        self.stats.zero_returns += 1;
    }

    fn on_boundary(&mut self) {
        self.boundary_at(Instant::now());
    }

    fn on_desync(&mut self, skipped: usize) {
        self.stats.desyncs += 1;
        warn!("scan stream desynchronized, {} bytes discarded", skipped);
    }
}
