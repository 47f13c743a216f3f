use serialport::{DataBits, Parity, StopBits};
use std::time::Duration;

/// Prefix every genuine firmware puts at the start of its version reply.
pub const FIRMWARE_ID: &str = "GENDUMPER";

/// Physical location of the cartridge header, `[start, end)`.
pub const ROM_HEADER_WINDOW: (u32, u32) = (0x80, 0x100);

/// Serial line parameters. The firmware only speaks 460800 8N1.
#[derive(Debug, Clone, PartialEq)]
pub struct LineConfig {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// Per-call read/write timeout of the port itself.
    pub timeout: Duration,
}

impl Default for LineConfig {
    fn default() -> Self {
        LineConfig {
            baud_rate: 460_800,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            timeout: Duration::from_millis(500),
        }
    }
}

/// How long a request may wait for its response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Counted from the moment the command is written, whatever arrives.
    Total(Duration),
    /// Silence on the line. Every chunk of incoming bytes re-arms it.
    Idle(Duration),
}

impl Wait {
    pub fn duration(&self) -> Duration {
        match *self {
            Wait::Total(d) | Wait::Idle(d) => d,
        }
    }
}

/// Wait bounds and constants used by [`crate::Dumper`].
///
/// Version and header queries, including the header window read of a full dump, get a total
/// bound. Content reads use `dump_wait` so a large cartridge streaming at line rate can finish.
#[derive(Debug, Clone, PartialEq)]
pub struct DumperConfig {
    pub line: LineConfig,
    pub version_timeout: Duration,
    pub header_timeout: Duration,
    pub dump_wait: Wait,
    pub firmware_id: String,
    pub header_window: (u32, u32),
}

impl Default for DumperConfig {
    fn default() -> Self {
        let line = LineConfig::default();

        DumperConfig {
            version_timeout: line.timeout,
            header_timeout: Duration::from_millis(3000),
            dump_wait: Wait::Idle(Duration::from_millis(3000)),
            firmware_id: FIRMWARE_ID.into(),
            header_window: ROM_HEADER_WINDOW,
            line,
        }
    }
}
