use crate::{swap, Error, Result};

/// Extracts the cartridge content range from raw header bytes.
///
/// The core treats the header as opaque; a front end that understands the full layout can plug
/// its own parser in through [`crate::Dumper::with_layout`].
pub trait HeaderLayout: Send {
    /// Returns `(start, end)` as stored in the header, before any address scaling.
    fn content_range(&self, header: &[u8]) -> Result<(u32, u32)>;
}

/// Start address at bytes 0..3, end address at bytes 4..7, both in cartridge byte order.
#[derive(Debug, Default, Clone, Copy)]
pub struct RomHeaderFields;

impl HeaderLayout for RomHeaderFields {
    fn content_range(&self, header: &[u8]) -> Result<(u32, u32)> {
        if header.len() < 8 {
            return Err(Error::ProtocolViolation(format!(
                "header is {} bytes, need at least 8",
                header.len()
            )));
        }

        Ok((swap::device_u32(header, 0)?, swap::device_u32(header, 4)?))
    }
}

impl<F> HeaderLayout for F
where
    F: Fn(&[u8]) -> Result<(u32, u32)> + Send,
{
    fn content_range(&self, header: &[u8]) -> Result<(u32, u32)> {
        self(header)
    }
}
