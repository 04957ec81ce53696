use crate::scan::{Scan, ScanConsumer};
use log::error;
use std::f32::consts::FRAC_PI_2;
use std::io::{self, Write};

/// A [`ScanConsumer`] that records every emitted sample as one CSV row, in
/// the layout point-cloud tools such as CloudCompare import directly.
///
/// The standard format carries an intensity column fed from the sample
/// quality; the express format does not. Coordinates follow the usual
/// north-up export convention (`x = sin(θ + π/2)·d`, `y = cos(θ + π/2)·d`),
/// rounded to millimeters; the Z column is always 0 since the sensor scans a
/// single plane.
#[derive(Debug)]
pub struct PointLogWriter<W: Write> {
    out: W,
    with_intensity: bool,
    failed: bool,
}

impl<W: Write> PointLogWriter<W> {
    /// Creates a writer for standard scan output and writes the header row.
    pub fn standard(out: W) -> io::Result<PointLogWriter<W>> {
        Self::with_header(out, b"//Scan,X,Y,Z,Intensity\n", true)
    }

    /// Creates a writer for express scan output and writes the header row.
    pub fn express(out: W) -> io::Result<PointLogWriter<W>> {
        Self::with_header(out, b"//Scan,X,Y,Z\n", false)
    }

    fn with_header(mut out: W, header: &[u8], with_intensity: bool) -> io::Result<PointLogWriter<W>> {
        out.write_all(header)?;
        Ok(PointLogWriter {
            out,
            with_intensity,
            failed: false,
        })
    }

    /// Flushes and returns the underlying writer, surfacing any write error
    /// encountered while logging scans.
    pub fn finish(mut self) -> io::Result<W> {
        if self.failed {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "point log incomplete after earlier write failure",
            ));
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

impl<W: Write> ScanConsumer for PointLogWriter<W> {
    fn on_scan(&mut self, scan: Scan) {
        if self.failed {
            return;
        }
        for sample in &scan.samples {
            let x = (sample.angle + FRAC_PI_2).sin() * sample.distance;
            let y = (sample.angle + FRAC_PI_2).cos() * sample.distance;
            let row = if self.with_intensity {
                format!(
                    "{},{:.3},{:.3},0,{}\n",
                    scan.index,
                    x,
                    y,
                    sample.quality.unwrap_or(0)
                )
            } else {
                format!("{},{:.3},{:.3},0\n", scan.index, x, y)
            };
            if let Err(err) = self.out.write_all(row.as_bytes()) {
                error!("point log write failed, dropping further rows: {}", err);
                self.failed = true;
                return;
            }
        }
    }
}
