//! # RPLIDAR host driver
//!
//! `rplidar_host` speaks the host side of the serial protocol used by
//! Slamtec RPLIDAR spinning laser sensors. It frames outgoing commands,
//! validates response descriptors, and decodes the two streaming measurement
//! formats (the 5-byte-per-sample standard scan and the bit-packed 84-byte
//! express scan) into rotation-grouped range samples.
//!
//! The crate is transport-agnostic: anything `Read + Write` works, typically
//! a serial port opened with a short read timeout.
//!
//! ```ignore
//! # use rplidar_host::{LidarDevice, ScanFormat, Scan, ScanConsumer};
//! # use std::sync::atomic::AtomicBool;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! struct Printer;
//! impl ScanConsumer for Printer {
//!     fn on_scan(&mut self, scan: Scan) {
//!         println!("scan {}: {} points at {:.1} Hz", scan.index, scan.samples.len(), scan.rotation_rate);
//!     }
//! }
//!
//! let port = serialport::new("/dev/ttyUSB0", 115200)
//!     .timeout(std::time::Duration::from_millis(1))
//!     .open()?;
//! let mut device = LidarDevice::with_stream(port);
//! println!("model {}", device.get_device_info()?.model);
//!
//! device.start_motor()?;
//! device.start_scan(ScanFormat::Express)?;
//! let stop = AtomicBool::new(false);
//! device.run_scan(ScanFormat::Express, Printer, &stop)?;
//! device.stop_scan()?;
//! device.stop_motor()?;
//! # Ok(())
//! # }
//! ```

extern crate byteorder;
extern crate log;

mod answers;
pub mod base;
mod capture;
mod checksum;
mod cmds;
pub mod decoder;
mod protocol;
pub mod scan;
pub mod utils;

pub use crate::answers::{DeviceHealth, DeviceInfo, SampleRate};
pub use crate::base::{Error, Result, RingByteBuffer};
pub use crate::capture::PointLogWriter;
pub use crate::cmds::{
    RPLIDAR_DEFAULT_MOTOR_PWM, RPLIDAR_MOTOR_PWM_HALF, RPLIDAR_MOTOR_PWM_MAX,
    RPLIDAR_MOTOR_PWM_QUARTER, RPLIDAR_MOTOR_PWM_SLOW, RPLIDAR_MOTOR_PWM_STOP,
    RPLIDAR_MOTOR_PWM_THREE_QUARTER,
};
pub use crate::decoder::{ExpressScanDecoder, StandardScanDecoder};
pub use crate::protocol::{encode_command, CommandFrame, ResponseDescriptor, SendMode};
pub use crate::scan::{Sample, SampleSink, Scan, ScanAggregator, ScanConsumer, ScanStats};

use crate::answers::*;
use crate::cmds::*;
use crate::protocol::RPLIDAR_ANS_HEADER_SIZE;
use byteorder::{ByteOrder, LittleEndian};
use log::{error, trace, warn};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Default timeout for single request/response exchanges.
pub const RPLIDAR_DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Capacity of the transport read buffer; a couple dozen express packets.
const DEVICE_READ_BUFFER_SIZE: usize = 2048;

/// The two documented streaming measurement formats.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScanFormat {
    /// One sample per 5-byte unit, with quality, at roughly 4 kHz.
    Standard,
    /// 32 samples per 84-byte packet, no quality, at roughly 8 kHz.
    Express,
}

/// Represents a connection to and control interface for an RPLIDAR device.
///
/// Owns the transport stream and a read buffer. Query methods perform one
/// command/response exchange; [`run_scan`](LidarDevice::run_scan) drives a
/// streaming session until the caller's stop flag is raised.
#[derive(Debug)]
pub struct LidarDevice<T: ?Sized> {
    stream: Box<T>,
    read_buffer: RingByteBuffer,
}

enum ActiveDecoder {
    Standard(StandardScanDecoder),
    Express(ExpressScanDecoder),
}

impl ActiveDecoder {
    fn new(format: ScanFormat) -> ActiveDecoder {
        match format {
            ScanFormat::Standard => ActiveDecoder::Standard(StandardScanDecoder::new()),
            ScanFormat::Express => ActiveDecoder::Express(ExpressScanDecoder::new()),
        }
    }

    fn decode<S: SampleSink>(&mut self, buf: &[u8], sink: &mut S) -> Result<()> {
        match self {
            ActiveDecoder::Standard(decoder) => decoder.decode(buf, sink),
            ActiveDecoder::Express(decoder) => decoder.decode(buf, sink),
        }
    }
}

impl<T: ?Sized> LidarDevice<T>
where
    T: Read + Write,
{
    /// Constructs a `LidarDevice` over a communication stream, typically a
    /// serial port configured with a short read timeout.
    pub fn with_stream(stream: Box<T>) -> LidarDevice<T> {
        trace!("creating LidarDevice");
        LidarDevice {
            stream,
            read_buffer: RingByteBuffer::with_capacity(DEVICE_READ_BUFFER_SIZE),
        }
    }

    /// Tears down the device, handing the transport stream back to the
    /// caller for closing.
    pub fn into_stream(self) -> Box<T> {
        self.stream
    }

    fn send_command(&mut self, opcode: u8, payload: &[u8]) -> Result<()> {
        let frame = protocol::encode_command(opcode, payload);
        trace!("sending command {:02X}", opcode);
        self.stream.write_all(frame.as_bytes())?;
        self.stream.flush()?;
        Ok(())
    }

    /// Waits for a complete 7-byte response descriptor, buffering partial
    /// reads until the deadline.
    fn read_response_descriptor(&mut self, timeout: Duration) -> Result<ResponseDescriptor> {
        let deadline = Instant::now() + timeout;
        loop {
            let mut header = [0u8; RPLIDAR_ANS_HEADER_SIZE];
            let available = self.read_buffer.peek_into(&mut header);
            match ResponseDescriptor::parse(&header[..available]) {
                Ok(descriptor) => {
                    self.read_buffer.skip_bytes(RPLIDAR_ANS_HEADER_SIZE);
                    return Ok(descriptor);
                }
                Err(Error::Truncated { .. }) => {}
                Err(err) => {
                    error!("response descriptor rejected: {}", err);
                    return Err(err);
                }
            }

            if Instant::now() >= deadline {
                warn!("timed out waiting for a response descriptor");
                return Err(Error::OperationTimeout);
            }
            self.read_buffer.read_from(&mut self.stream)?;
        }
    }

    /// Waits for `len` payload bytes to arrive, then takes them.
    fn read_response_payload(&mut self, len: usize, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        while self.read_buffer.len() < len {
            if Instant::now() >= deadline {
                warn!("timed out waiting for a {} byte response payload", len);
                return Err(Error::OperationTimeout);
            }
            self.read_buffer.read_from(&mut self.stream)?;
        }

        let mut payload = vec![0u8; len];
        let read = self.read_buffer.read(&mut payload)?;
        debug_assert_eq!(read, len);
        Ok(payload)
    }

    /// One command/single-response exchange, descriptor checked against what
    /// the command is documented to produce.
    fn invoke(
        &mut self,
        opcode: u8,
        payload: &[u8],
        data_type: u8,
        response_len: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        self.send_command(opcode, payload)?;
        let descriptor = self.read_response_descriptor(timeout)?;
        descriptor.expect(SendMode::Single, response_len, data_type)?;
        self.read_response_payload(descriptor.len, timeout)
    }

    /// Gets the device information (model, firmware, hardware, serial number).
    pub fn get_device_info(&mut self) -> Result<DeviceInfo> {
        self.get_device_info_with_timeout(RPLIDAR_DEFAULT_TIMEOUT)
    }

    /// Gets the device information with a specified timeout.
    pub fn get_device_info_with_timeout(&mut self, timeout: Duration) -> Result<DeviceInfo> {
        let payload = self.invoke(
            RPLIDAR_CMD_GET_DEVICE_INFO,
            &[],
            RPLIDAR_ANS_TYPE_DEVINFO,
            RPLIDAR_RESP_DEVINFO_SIZE,
            timeout,
        )?;
        DeviceInfo::parse(&payload)
    }

    /// Gets the health status of the device.
    pub fn get_device_health(&mut self) -> Result<DeviceHealth> {
        self.get_device_health_with_timeout(RPLIDAR_DEFAULT_TIMEOUT)
    }

    /// Gets the health status of the device with a specified timeout.
    pub fn get_device_health_with_timeout(&mut self, timeout: Duration) -> Result<DeviceHealth> {
        let payload = self.invoke(
            RPLIDAR_CMD_GET_DEVICE_HEALTH,
            &[],
            RPLIDAR_ANS_TYPE_DEVHEALTH,
            RPLIDAR_RESP_DEVHEALTH_SIZE,
            timeout,
        )?;
        DeviceHealth::parse(&payload)
    }

    /// Gets the sample periods of both scan formats.
    pub fn get_sample_rate(&mut self) -> Result<SampleRate> {
        self.get_sample_rate_with_timeout(RPLIDAR_DEFAULT_TIMEOUT)
    }

    /// Gets the sample periods of both scan formats with a specified timeout.
    pub fn get_sample_rate_with_timeout(&mut self, timeout: Duration) -> Result<SampleRate> {
        let payload = self.invoke(
            RPLIDAR_CMD_GET_SAMPLE_RATE,
            &[],
            RPLIDAR_ANS_TYPE_SAMPLE_RATE,
            RPLIDAR_RESP_SAMPLE_RATE_SIZE,
            timeout,
        )?;
        SampleRate::parse(&payload)
    }

    /// Sets the motor PWM duty cycle. See the `RPLIDAR_MOTOR_PWM_*` presets
    /// for the documented speed points.
    pub fn set_motor_pwm(&mut self, pwm: u16) -> Result<()> {
        trace!("setting motor pwm to {}", pwm);
        let mut payload = [0u8; 2];
        LittleEndian::write_u16(&mut payload, pwm);
        self.send_command(RPLIDAR_CMD_SET_MOTOR_PWM, &payload)
    }

    /// Starts the motor at the default duty cycle.
    pub fn start_motor(&mut self) -> Result<()> {
        self.set_motor_pwm(RPLIDAR_DEFAULT_MOTOR_PWM)
    }

    /// Stops the motor.
    pub fn stop_motor(&mut self) -> Result<()> {
        self.set_motor_pwm(RPLIDAR_MOTOR_PWM_STOP)
    }

    /// Tells the device to stop streaming measurements. No response.
    pub fn stop_scan(&mut self) -> Result<()> {
        self.send_command(RPLIDAR_CMD_STOP, &[])
    }

    /// Resets the device core. Requires re-initialization afterwards.
    pub fn reset(&mut self) -> Result<()> {
        self.send_command(RPLIDAR_CMD_RESET, &[])
    }

    /// Requests a measurement stream and validates the announced descriptor
    /// against the chosen format.
    pub fn start_scan(&mut self, format: ScanFormat) -> Result<()> {
        self.start_scan_with_timeout(format, RPLIDAR_DEFAULT_TIMEOUT)
    }

    /// Requests a measurement stream with a specified descriptor timeout.
    pub fn start_scan_with_timeout(&mut self, format: ScanFormat, timeout: Duration) -> Result<()> {
        let descriptor = match format {
            ScanFormat::Standard => {
                self.send_command(RPLIDAR_CMD_SCAN, &[])?;
                let descriptor = self.read_response_descriptor(timeout)?;
                descriptor.expect(
                    SendMode::Continuous,
                    RPLIDAR_RESP_MEASUREMENT_SIZE,
                    RPLIDAR_ANS_TYPE_MEASUREMENT,
                )?;
                descriptor
            }
            ScanFormat::Express => {
                self.send_command(RPLIDAR_CMD_EXPRESS_SCAN, &RPLIDAR_EXPRESS_SCAN_PAYLOAD)?;
                let descriptor = self.read_response_descriptor(timeout)?;
                descriptor.expect(
                    SendMode::Continuous,
                    RPLIDAR_RESP_MEASUREMENT_CAPSULED_SIZE,
                    RPLIDAR_ANS_TYPE_MEASUREMENT_CAPSULED,
                )?;
                descriptor
            }
        };
        trace!(
            "{:?} scan started, unit size {} bytes",
            format,
            descriptor.len
        );
        Ok(())
    }

    /// Drives a started measurement stream until `stop` is raised.
    ///
    /// Completed rotations go to `consumer`; the returned stats cover the
    /// whole session. See
    /// [`run_scan_with_capture`](LidarDevice::run_scan_with_capture) to also
    /// record the raw byte stream.
    pub fn run_scan<C: ScanConsumer>(
        &mut self,
        format: ScanFormat,
        consumer: C,
        stop: &AtomicBool,
    ) -> Result<(ScanStats, C)> {
        self.run_scan_with_capture(format, consumer, stop, None)
    }

    /// Drives a started measurement stream until `stop` is raised, optionally
    /// teeing every received byte into `raw_capture`.
    ///
    /// The loop is synchronous and cooperative: it reads whatever the
    /// transport has (zero bytes is normal for a stream with a short read
    /// timeout), feeds it to the decoder, then checks the stop flag. Express
    /// sync losses are logged and decoding continues; any other error ends
    /// the session. Bytes already consumed when the stop flag is observed are
    /// processed; a partial packet in flight is discarded.
    pub fn run_scan_with_capture<C: ScanConsumer>(
        &mut self,
        format: ScanFormat,
        consumer: C,
        stop: &AtomicBool,
        mut raw_capture: Option<&mut dyn io::Write>,
    ) -> Result<(ScanStats, C)> {
        let mut aggregator = ScanAggregator::new(consumer);
        let mut decoder = ActiveDecoder::new(format);

        loop {
            self.read_buffer.read_from(&mut self.stream)?;

            loop {
                let chunk_len = {
                    let chunk = self.read_buffer.current_read_slice();
                    if chunk.is_empty() {
                        break;
                    }
                    if let Some(capture) = raw_capture.as_mut() {
                        capture.write_all(chunk)?;
                    }
                    match decoder.decode(chunk, &mut aggregator) {
                        Ok(()) => {}
                        Err(Error::LossOfSync { skipped }) => {
                            warn!("stream lost sync for {} bytes, continuing", skipped);
                        }
                        Err(err) => {
                            error!("scan session aborted: {}", err);
                            return Err(err);
                        }
                    }
                    chunk.len()
                };
                self.read_buffer.skip_bytes(chunk_len);
            }

            // Observed between read iterations; everything already received
            // has been decoded at this point.
            if stop.load(Ordering::Relaxed) {
                break;
            }
        }

        trace!("scan session stopped by caller");
        Ok((aggregator.stats(), aggregator.into_consumer()))
    }
}
