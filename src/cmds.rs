// Commands without payload and response

/// Command code to stop the measurement process of the LIDAR.
pub const RPLIDAR_CMD_STOP: u8 = 0x25;

/// Command code to reset the LIDAR core. Requires re-initialization afterwards.
pub const RPLIDAR_CMD_RESET: u8 = 0x40;

// Commands without payload but with a single response

/// Command code to request device information (model, firmware, hardware, serial number).
pub const RPLIDAR_CMD_GET_DEVICE_INFO: u8 = 0x50;

/// Command code to request the device's health status.
pub const RPLIDAR_CMD_GET_DEVICE_HEALTH: u8 = 0x52;

/// Command code to request the sample periods of both scan formats.
pub const RPLIDAR_CMD_GET_SAMPLE_RATE: u8 = 0x59;

// Commands that start a continuous response stream

/// Command code to start a standard scan (~4 kHz, one sample per 5-byte unit).
pub const RPLIDAR_CMD_SCAN: u8 = 0x20;

/// Command code to start an express scan (~8 kHz, 32 samples per 84-byte packet).
/// Carries a 5-byte payload selecting the working mode.
pub const RPLIDAR_CMD_EXPRESS_SCAN: u8 = 0x82;

/// Payload for `RPLIDAR_CMD_EXPRESS_SCAN`: working mode 0 plus four reserved
/// bytes, all zero.
pub const RPLIDAR_EXPRESS_SCAN_PAYLOAD: [u8; 5] = [0; 5];

// Commands with payload and no response

/// Command code to set the motor PWM duty cycle via the accessory board.
/// Requires a 2-byte little-endian payload with the PWM value.
pub const RPLIDAR_CMD_SET_MOTOR_PWM: u8 = 0xF0;

// Motor duty-cycle presets and the rotation rates they produce on the
// reference hardware.

/// Motor stopped.
pub const RPLIDAR_MOTOR_PWM_STOP: u16 = 0;

/// Slowest usable rotation, around 1.5 Hz.
pub const RPLIDAR_MOTOR_PWM_SLOW: u16 = 0x0080;

/// Quarter speed, around 5 Hz.
pub const RPLIDAR_MOTOR_PWM_QUARTER: u16 = 0x014A;

/// Half speed, around 10 Hz.
pub const RPLIDAR_MOTOR_PWM_HALF: u16 = 0x023F;

/// Three-quarter speed, around 15 Hz.
pub const RPLIDAR_MOTOR_PWM_THREE_QUARTER: u16 = 0x0318;

/// Maximum speed, around 20 Hz.
pub const RPLIDAR_MOTOR_PWM_MAX: u16 = 0x03FF;

/// Default PWM value used by `start_motor()`.
pub const RPLIDAR_DEFAULT_MOTOR_PWM: u16 = RPLIDAR_MOTOR_PWM_THREE_QUARTER;
