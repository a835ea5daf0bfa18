//! Errors raised by port interfaces.
//!
//! Every validation failure is reported synchronously to the caller of the operation that
//! triggered it. Hardware collaborator failures are boxed so both interface variants can share one
//! error type regardless of the bus or pin driver in use.

use std::fmt;

use crate::io::Direction;

/// Result type alias for port operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Header pins that are permanently allocated and can never be used as ports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReservedPin {
    /// Ground.
    Ground,
    /// 3.3V power rail.
    Power3V3,
    /// 5V power rail.
    Power5V,
    /// I2C bus lines (data, clock and the ID EEPROM pair).
    I2c,
}

impl fmt::Display for ReservedPin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ReservedPin::Ground => "GROUND",
            ReservedPin::Power3V3 => "3.3V POWER",
            ReservedPin::Power5V => "5V POWER",
            ReservedPin::I2c => "I2C",
        })
    }
}

/// Errors that can occur while operating ports on an interface.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The port number is 0 or greater than the number of ports on the interface.
    #[error("port number {port} is outside of the valid range 1..={count}")]
    OutOfRange { port: u8, count: u8 },

    /// The port number names a header pin that is reserved for power, ground or a fixed bus.
    #[error("port number {port} is reserved for {pin}")]
    Reserved { port: u8, pin: ReservedPin },

    /// The operation is incompatible with the direction the port is currently configured in.
    #[error("port number {port} is set as {direction}, cannot {operation}")]
    DirectionMismatch {
        port: u8,
        direction: Direction,
        operation: &'static str,
    },

    /// An edge registration was attempted without any callback.
    #[error("no rising or falling callback supplied for port number {port}")]
    NoCallback { port: u8 },

    /// A register bit decoded to something other than 0 or 1. This means the bus collaborator
    /// broke its contract and is not recoverable.
    #[error("could not decode port {port} from register {register:#04x} value {value:#010b}")]
    Codec { port: u8, register: u8, value: u8 },

    /// The bus or pin driver reported a failure.
    #[error("hardware access failed: {0}")]
    Hardware(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The background listener thread could not be started.
    #[error("could not start listener thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn hardware<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Hardware(Box::new(e))
    }

    /// Whether this error is one of the invalid port number conditions (out of range or
    /// reserved).
    pub fn is_invalid_port(&self) -> bool {
        matches!(self, Error::OutOfRange { .. } | Error::Reserved { .. })
    }

    /// Whether this error was caused by the port's configured direction.
    pub fn is_direction_mismatch(&self) -> bool {
        matches!(self, Error::DirectionMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_message_names_the_rail() {
        let e = Error::Reserved {
            port: 2,
            pin: ReservedPin::Power5V,
        };
        assert_eq!(e.to_string(), "port number 2 is reserved for 5V POWER");
        assert!(e.is_invalid_port());
        assert!(!e.is_direction_mismatch());
    }

    #[test]
    fn direction_mismatch_message() {
        let e = Error::DirectionMismatch {
            port: 7,
            direction: Direction::Input,
            operation: "set value",
        };
        assert_eq!(e.to_string(), "port number 7 is set as input, cannot set value");
        assert!(e.is_direction_mismatch());
    }

    #[test]
    fn codec_message_shows_raw_register() {
        let e = Error::Codec {
            port: 3,
            register: 0x12,
            value: 0b100,
        };
        assert_eq!(
            e.to_string(),
            "could not decode port 3 from register 0x12 value 0b00000100"
        );
    }
}
