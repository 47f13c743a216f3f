use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The port is missing, busy, or refused to open.
    #[error("port {port} unavailable: {reason}")]
    PortUnavailable { port: String, reason: String },

    /// Nothing arrived within the wait bound.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// Malformed command or a frame that never completed.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Autodetect exhausted every candidate port.
    #[error("no dumper found")]
    NotFound,

    #[error("invalid address range 0x{from:08X}..0x{to:08X}")]
    InvalidRange { from: u32, to: u32 },

    /// An operation needed a port but none was selected.
    #[error("no serial port selected")]
    NoPort,
}

impl From<scroll::Error> for Error {
    fn from(err: scroll::Error) -> Self {
        Error::ProtocolViolation(err.to_string())
    }
}

impl From<serialport::Error> for Error {
    fn from(err: serialport::Error) -> Self {
        match err.kind() {
            // the port name isn't part of a serialport error
            serialport::ErrorKind::NoDevice => Error::PortUnavailable {
                port: String::new(),
                reason: err.description,
            },
            serialport::ErrorKind::Io(kind) => Error::Io(std::io::Error::new(kind, err.description)),
            _ => Error::Io(std::io::Error::new(std::io::ErrorKind::Other, err.description)),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
