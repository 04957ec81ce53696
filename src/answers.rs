use crate::base::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};

/// Response type identifier for device information.
pub const RPLIDAR_ANS_TYPE_DEVINFO: u8 = 0x04;

/// Payload size of a device information response.
pub const RPLIDAR_RESP_DEVINFO_SIZE: usize = 20;

/// Response type identifier for device health status.
pub const RPLIDAR_ANS_TYPE_DEVHEALTH: u8 = 0x06;

/// Payload size of a device health response.
pub const RPLIDAR_RESP_DEVHEALTH_SIZE: usize = 3;

/// Response type identifier for the sample rate query.
pub const RPLIDAR_ANS_TYPE_SAMPLE_RATE: u8 = 0x15;

/// Payload size of a sample rate response.
pub const RPLIDAR_RESP_SAMPLE_RATE_SIZE: usize = 4;

/// Response type identifier for standard scan measurement data.
pub const RPLIDAR_ANS_TYPE_MEASUREMENT: u8 = 0x81;

/// Wire size of one standard scan measurement unit.
pub const RPLIDAR_RESP_MEASUREMENT_SIZE: usize = 5;

/// Response type identifier for express scan measurement data.
pub const RPLIDAR_ANS_TYPE_MEASUREMENT_CAPSULED: u8 = 0x82;

/// Wire size of one express scan packet (2 sync bytes, 2 angle bytes, 16
/// five-byte cabins).
pub const RPLIDAR_RESP_MEASUREMENT_CAPSULED_SIZE: usize = 84;

// Health status codes

/// The LIDAR is operating correctly.
pub const RPLIDAR_HEALTH_STATUS_OK: u8 = 0;

/// A non-critical warning; the LIDAR might still function.
pub const RPLIDAR_HEALTH_STATUS_WARNING: u8 = 1;

/// A critical error; the LIDAR is likely non-operational.
pub const RPLIDAR_HEALTH_STATUS_ERROR: u8 = 2;

/// Device information reported by the RPLIDAR.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Model ID of the sensor.
    pub model: u8,
    /// Minor part of the firmware version.
    pub firmware_minor: u8,
    /// Major part of the firmware version.
    pub firmware_major: u8,
    /// Hardware revision.
    pub hardware: u8,
    /// 16-byte unique serial number.
    pub serial_number: [u8; 16],
}

impl DeviceInfo {
    /// Parses a device information payload.
    pub fn parse(data: &[u8]) -> Result<DeviceInfo> {
        if data.len() != RPLIDAR_RESP_DEVINFO_SIZE {
            return Err(Error::UnexpectedResponse {
                description: format!(
                    "device info payload of {} bytes, expected {}",
                    data.len(),
                    RPLIDAR_RESP_DEVINFO_SIZE
                ),
            });
        }

        let mut serial_number = [0u8; 16];
        serial_number.copy_from_slice(&data[4..20]);

        Ok(DeviceInfo {
            model: data[0],
            firmware_minor: data[1],
            firmware_major: data[2],
            hardware: data[3],
            serial_number,
        })
    }

    /// Firmware version in the `major.minor` form the vendor documents.
    pub fn firmware_version(&self) -> String {
        format!("{}.{}", self.firmware_major, self.firmware_minor)
    }

    /// Serial number rendered as the usual 32-digit hex string.
    pub fn serial_number_hex(&self) -> String {
        let mut out = String::with_capacity(32);
        for byte in self.serial_number.iter() {
            out.push_str(&format!("{:02x}", byte));
        }
        out
    }
}

/// Health status reported by the RPLIDAR.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeviceHealth {
    /// The device reports normal operation.
    Healthy,
    /// The device reports a warning with the given vendor error code.
    Warning(u16),
    /// The device reports a failure with the given vendor error code.
    Error(u16),
}

impl DeviceHealth {
    /// Parses a device health payload.
    pub fn parse(data: &[u8]) -> Result<DeviceHealth> {
        if data.len() != RPLIDAR_RESP_DEVHEALTH_SIZE {
            return Err(Error::UnexpectedResponse {
                description: format!(
                    "device health payload of {} bytes, expected {}",
                    data.len(),
                    RPLIDAR_RESP_DEVHEALTH_SIZE
                ),
            });
        }

        let error_code = LittleEndian::read_u16(&data[1..3]);
        match data[0] {
            RPLIDAR_HEALTH_STATUS_OK => Ok(DeviceHealth::Healthy),
            RPLIDAR_HEALTH_STATUS_WARNING => Ok(DeviceHealth::Warning(error_code)),
            RPLIDAR_HEALTH_STATUS_ERROR => Ok(DeviceHealth::Error(error_code)),
            status => Err(Error::UnexpectedResponse {
                description: format!("unknown health status code {}", status),
            }),
        }
    }
}

/// Sample periods of the two scan formats, in microseconds per sample.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SampleRate {
    /// Time between two standard scan samples.
    pub standard_us: u16,
    /// Time between two express scan samples.
    pub express_us: u16,
}

impl SampleRate {
    /// Parses a sample rate payload.
    pub fn parse(data: &[u8]) -> Result<SampleRate> {
        if data.len() != RPLIDAR_RESP_SAMPLE_RATE_SIZE {
            return Err(Error::UnexpectedResponse {
                description: format!(
                    "sample rate payload of {} bytes, expected {}",
                    data.len(),
                    RPLIDAR_RESP_SAMPLE_RATE_SIZE
                ),
            });
        }

        Ok(SampleRate {
            standard_us: LittleEndian::read_u16(&data[0..2]),
            express_us: LittleEndian::read_u16(&data[2..4]),
        })
    }

    /// Samples per second in standard scan mode.
    pub fn standard_samples_per_sec(&self) -> f32 {
        1_000_000.0 / self.standard_us as f32
    }

    /// Samples per second in express scan mode.
    pub fn express_samples_per_sec(&self) -> f32 {
        1_000_000.0 / self.express_us as f32
    }
}
