use crate::base::{Error, Result};
use crate::checksum::Checksum;
use byteorder::{ByteOrder, LittleEndian};
use log::trace;

/// Sync byte opening every outgoing command frame.
pub const RPLIDAR_CMD_SYNC_BYTE: u8 = 0xA5;

/// Flag OR-ed into the opcode of commands that carry a payload.
const RPLIDAR_CMDFLAG_HAS_PAYLOAD: u8 = 0x80;

/// Sync byte pair opening every response descriptor.
pub const RPLIDAR_ANS_SYNC_BYTES: [u8; 2] = [0xA5, 0x5A];

/// Total size of a response descriptor: sync pair, 30-bit length plus 2-bit
/// send mode packed little-endian, and a data type byte.
pub const RPLIDAR_ANS_HEADER_SIZE: usize = 7;

const RPLIDAR_ANS_HEADER_SIZE_MASK: u32 = 0x3FFF_FFFF;
const RPLIDAR_ANS_HEADER_SENDMODE_SHIFT: u32 = 30;

/// A fully framed outgoing command: sync byte, opcode, optional length-prefixed
/// payload, and a trailing XOR checksum over everything before it.
///
/// Built once, handed to the transport once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    bytes: Vec<u8>,
}

impl CommandFrame {
    /// The wire bytes of the frame.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the frame, returning the wire bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Builds the wire frame for a command.
///
/// Payload-bearing commands get the payload-flag bit in the opcode and a
/// one-byte payload length, matching the vendor protocol. The checksum byte is
/// appended to every frame, payload or not; the reference hardware accepts it
/// on payload-less commands as well.
pub fn encode_command(opcode: u8, payload: &[u8]) -> CommandFrame {
    debug_assert!(payload.len() <= u8::MAX as usize);

    let mut bytes = Vec::with_capacity(4 + payload.len());
    bytes.push(RPLIDAR_CMD_SYNC_BYTE);
    if payload.is_empty() {
        bytes.push(opcode);
    } else {
        bytes.push(opcode | RPLIDAR_CMDFLAG_HAS_PAYLOAD);
        bytes.push(payload.len() as u8);
        bytes.extend_from_slice(payload);
    }

    let mut checksum = Checksum::new();
    checksum.push_slice(&bytes);
    bytes.push(checksum.checksum());

    trace!("encoded command {:02X}: {:02X?}", opcode, bytes);
    CommandFrame { bytes }
}

/// How the device delivers the response announced by a descriptor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SendMode {
    /// One response of the announced length, then the device goes idle.
    Single,
    /// An open-ended stream of units of the announced length.
    Continuous,
}

/// The decoded 7-byte descriptor that precedes every device response.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ResponseDescriptor {
    /// Response length in bytes; for continuous responses, the unit size.
    pub len: usize,
    /// Single response or continuous stream.
    pub send_mode: SendMode,
    /// Data type tag identifying the response family.
    pub data_type: u8,
}

impl ResponseDescriptor {
    /// Parses a response descriptor from the start of `buf`.
    ///
    /// Returns [`Error::Truncated`] when fewer than
    /// [`RPLIDAR_ANS_HEADER_SIZE`] bytes are available (the caller buffers
    /// more input and retries) and [`Error::InvalidSync`] when the first two
    /// bytes are not the descriptor sync pair.
    pub fn parse(buf: &[u8]) -> Result<ResponseDescriptor> {
        if buf.len() < RPLIDAR_ANS_HEADER_SIZE {
            return Err(Error::Truncated {
                expected: RPLIDAR_ANS_HEADER_SIZE,
                available: buf.len(),
            });
        }

        if buf[0..2] != RPLIDAR_ANS_SYNC_BYTES {
            return Err(Error::InvalidSync {
                description: format!(
                    "descriptor starts with {:02X} {:02X}, expected {:02X} {:02X}",
                    buf[0], buf[1], RPLIDAR_ANS_SYNC_BYTES[0], RPLIDAR_ANS_SYNC_BYTES[1]
                ),
            });
        }

        let size_and_mode = LittleEndian::read_u32(&buf[2..6]);
        let len = (size_and_mode & RPLIDAR_ANS_HEADER_SIZE_MASK) as usize;
        let send_mode = match size_and_mode >> RPLIDAR_ANS_HEADER_SENDMODE_SHIFT {
            0 => SendMode::Single,
            1 => SendMode::Continuous,
            mode => {
                return Err(Error::UnexpectedResponse {
                    description: format!("reserved send mode {}", mode),
                })
            }
        };

        let descriptor = ResponseDescriptor {
            len,
            send_mode,
            data_type: buf[6],
        };
        trace!("parsed response descriptor: {:?}", descriptor);
        Ok(descriptor)
    }

    /// Checks the descriptor against what the issued command is documented to
    /// produce. A mismatch is fatal to that request.
    pub fn expect(&self, send_mode: SendMode, len: usize, data_type: u8) -> Result<()> {
        if self.send_mode != send_mode || self.len != len || self.data_type != data_type {
            return Err(Error::UnexpectedResponse {
                description: format!(
                    "descriptor announces type {:02X}, len {}, {:?}; expected type {:02X}, len {}, {:?}",
                    self.data_type, self.len, self.send_mode, data_type, len, send_mode
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::{RPLIDAR_ANS_TYPE_MEASUREMENT, RPLIDAR_ANS_TYPE_MEASUREMENT_CAPSULED};
    use crate::cmds::*;

    #[test]
    fn encode_payloadless_command() {
        let frame = encode_command(RPLIDAR_CMD_STOP, &[]);
        assert_eq!(frame.as_bytes(), [0xA5, 0x25, 0x80]);
    }

    #[test]
    fn encode_express_scan_command() {
        let frame = encode_command(RPLIDAR_CMD_EXPRESS_SCAN, &RPLIDAR_EXPRESS_SCAN_PAYLOAD);
        assert_eq!(
            frame.as_bytes(),
            [0xA5, 0x82, 0x05, 0, 0, 0, 0, 0, 0x22]
        );
    }

    #[test]
    fn checksum_byte_folds_frame_to_zero() {
        let frames = [
            encode_command(RPLIDAR_CMD_GET_DEVICE_INFO, &[]),
            encode_command(RPLIDAR_CMD_GET_SAMPLE_RATE, &[]),
            encode_command(RPLIDAR_CMD_RESET, &[]),
            encode_command(RPLIDAR_CMD_SET_MOTOR_PWM, &[0xFF, 0x03]),
            encode_command(RPLIDAR_CMD_EXPRESS_SCAN, &RPLIDAR_EXPRESS_SCAN_PAYLOAD),
        ];
        for frame in frames.iter() {
            let folded = frame.as_bytes().iter().fold(0u8, |acc, b| acc ^ b);
            assert_eq!(folded, 0, "frame {:02X?} does not fold to zero", frame);
        }
    }

    #[test]
    fn motor_pwm_frame_matches_reference_bytes() {
        let frame = encode_command(RPLIDAR_CMD_SET_MOTOR_PWM, &[0x18, 0x03]);
        assert_eq!(frame.as_bytes(), [0xA5, 0xF0, 0x02, 0x18, 0x03, 0x4C]);
    }

    #[test]
    fn parse_standard_scan_descriptor() {
        let descriptor =
            ResponseDescriptor::parse(&[0xA5, 0x5A, 0x05, 0x00, 0x00, 0x40, 0x81]).unwrap();
        assert_eq!(descriptor.len, 5);
        assert_eq!(descriptor.send_mode, SendMode::Continuous);
        assert_eq!(descriptor.data_type, RPLIDAR_ANS_TYPE_MEASUREMENT);
    }

    #[test]
    fn parse_express_scan_descriptor() {
        let descriptor =
            ResponseDescriptor::parse(&[0xA5, 0x5A, 0x54, 0x00, 0x00, 0x40, 0x82]).unwrap();
        assert_eq!(descriptor.len, 84);
        assert_eq!(descriptor.send_mode, SendMode::Continuous);
        assert_eq!(descriptor.data_type, RPLIDAR_ANS_TYPE_MEASUREMENT_CAPSULED);
    }

    #[test]
    fn parse_single_response_descriptor() {
        let descriptor =
            ResponseDescriptor::parse(&[0xA5, 0x5A, 0x14, 0x00, 0x00, 0x00, 0x04]).unwrap();
        assert_eq!(descriptor.len, 20);
        assert_eq!(descriptor.send_mode, SendMode::Single);
        assert_eq!(descriptor.data_type, 0x04);
    }

    #[test]
    fn short_descriptor_is_truncated_not_a_panic() {
        match ResponseDescriptor::parse(&[0xA5, 0x5A, 0x05]) {
            Err(crate::base::Error::Truncated {
                expected,
                available,
            }) => {
                assert_eq!(expected, RPLIDAR_ANS_HEADER_SIZE);
                assert_eq!(available, 3);
            }
            other => panic!("expected Truncated, got {:?}", other),
        }
    }

    #[test]
    fn bad_sync_pair_is_rejected() {
        assert!(matches!(
            ResponseDescriptor::parse(&[0xA5, 0xA5, 0x05, 0x00, 0x00, 0x40, 0x81]),
            Err(crate::base::Error::InvalidSync { .. })
        ));
    }

    #[test]
    fn expect_rejects_mismatched_descriptor() {
        let descriptor =
            ResponseDescriptor::parse(&[0xA5, 0x5A, 0x05, 0x00, 0x00, 0x40, 0x81]).unwrap();
        assert!(descriptor
            .expect(SendMode::Continuous, 5, RPLIDAR_ANS_TYPE_MEASUREMENT)
            .is_ok());
        assert!(descriptor
            .expect(SendMode::Continuous, 84, RPLIDAR_ANS_TYPE_MEASUREMENT_CAPSULED)
            .is_err());
        assert!(descriptor
            .expect(SendMode::Single, 5, RPLIDAR_ANS_TYPE_MEASUREMENT)
            .is_err());
    }
}
