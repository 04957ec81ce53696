use std::error;
use std::fmt;
use std::io;

/// Represents errors that can occur while talking to an RPLIDAR device.
#[derive(Debug)]
pub enum Error {
    /// A response descriptor or stream marker did not carry the expected sync bytes.
    /// Fatal for single responses; the express stream recovers by resynchronizing.
    InvalidSync { description: String },

    /// Not enough bytes were available to decode the structure.
    /// The caller must buffer more input and retry.
    Truncated { expected: usize, available: usize },

    /// The response descriptor did not match the command that was just issued.
    UnexpectedResponse { description: String },

    /// The express decoder searched more than a full packet's worth of bytes
    /// without finding a sync marker. Not fatal: the input was still consumed
    /// and the caller may keep feeding bytes.
    LossOfSync { skipped: usize },

    /// The operation did not complete within its deadline.
    OperationTimeout,

    /// An I/O error propagated unchanged from the transport stream.
    TransportFailure(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidSync { description } => write!(f, "invalid sync: {}", description),
            Error::Truncated {
                expected,
                available,
            } => write!(
                f,
                "truncated input: expected {} bytes, {} available",
                expected, available
            ),
            Error::UnexpectedResponse { description } => {
                write!(f, "unexpected response: {}", description)
            }
            Error::LossOfSync { skipped } => {
                write!(f, "lost stream sync after skipping {} bytes", skipped)
            }
            Error::OperationTimeout => write!(f, "operation timeout"),
            Error::TransportFailure(err) => write!(f, "transport failure: {}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::TransportFailure(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::TransportFailure(err)
    }
}

/// A specialized `Result` type for RPLIDAR operations.
pub type Result<T> = std::result::Result<T, Error>;
