//! Host side driver for the serial cartridge dumper firmware.
//!
//! ```no_run
//! use megadumper::{Dumper, SerialTransport};
//!
//! let mut dumper = Dumper::new(SerialTransport::new());
//! let port = dumper.autodetect()?;
//! println!("dumper on {}", port);
//!
//! let rom = dumper.dump(0, 0)?;
//! println!("{} bytes", rom.data.len());
//! # Ok::<(), megadumper::Error>(())
//! ```

/// Byte order helpers, the cartridge is big-endian while the wire is little-endian.
pub mod swap;
pub use swap::{swap16, swap32};

/// Errors for every layer of the driver.
mod error;
pub use error::*;

/// Line parameters, wait bounds and firmware constants.
mod config;
pub use config::*;

///Wire encoding of the requests understood by the firmware.
mod command;
pub use command::*;

/// Length-prefixed frame reassembly.
mod accumulator;
pub use accumulator::*;

/// Byte links to the device: native serial port and the trait tests can implement.
mod transport;
pub use transport::*;

///Blocking request/response over asynchronous byte notifications.
mod coordinator;
pub use coordinator::*;

/// Extraction of the content range from the header bytes.
mod header;
pub use header::*;

/// Version, header, dump and autodetect operations.
mod dumper;
pub use dumper::*;

/// Background execution with a progress channel.
pub mod worker;

/// Scripted transport for exercising the driver without hardware.
pub mod mock;
