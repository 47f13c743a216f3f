use crate::Result;
use scroll::{Pread, Pwrite, LE};

/// The cartridge bus is big-endian while frames and commands travel little-endian,
/// so every multi-byte value read from cartridge memory has to be reversed.
pub fn swap16(x: u16) -> u16 {
    ((x & 0x00ff) << 8) | ((x >> 8) & 0x00ff)
}

/// 32 bit counterpart of [`swap16`].
pub fn swap32(x: u32) -> u32 {
    ((x & 0x0000_00ff) << 24)
        | ((x & 0x0000_ff00) << 8)
        | ((x & 0x00ff_0000) >> 8)
        | ((x & 0xff00_0000) >> 24)
}

/// Reads a u32 in wire order (length prefixes, command addresses).
pub fn wire_u32(bytes: &[u8], offset: usize) -> Result<u32> {
    Ok(bytes.pread_with::<u32>(offset, LE)?)
}

/// Writes a u32 in wire order at `*offset` and advances it past the value.
pub fn put_wire_u32(dst: &mut [u8], offset: &mut usize, x: u32) -> core::result::Result<(), scroll::Error> {
    dst.gwrite_with(x, offset, LE)?;
    Ok(())
}

/// Encodes a u32 in wire order.
pub fn wire_bytes(x: u32) -> [u8; 4] {
    x.to_le_bytes()
}

/// Reads a u32 in cartridge order (header fields).
pub fn device_u32(bytes: &[u8], offset: usize) -> Result<u32> {
    wire_u32(bytes, offset).map(swap32)
}
