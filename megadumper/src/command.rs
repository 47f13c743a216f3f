use crate::{swap, Error, Result};
use core::convert::TryFrom;
use scroll::{ctx, Pwrite, LE};

/// Opcodes understood by the dumper firmware.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Opcode {
    /// Firmware identity string.
    Version = b'v' as isize,
    /// Header region bytes.
    Header = b'i' as isize,
    /// Raw range of cartridge memory.
    Dump = b'd' as isize,
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            b'v' => Ok(Opcode::Version),
            b'i' => Ok(Opcode::Header),
            b'd' => Ok(Opcode::Dump),
            other => Err(Error::ProtocolViolation(format!(
                "unknown opcode 0x{:02X}",
                other
            ))),
        }
    }
}

/// A request to the device. Dump addresses are absolute cartridge offsets, `from <= to` is left to the caller.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Command {
    Version,
    Header,
    Dump { from: u32, to: u32 },
}

impl Command {
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::Version => Opcode::Version,
            Command::Header => Opcode::Header,
            Command::Dump { .. } => Opcode::Dump,
        }
    }

    /// Length of the command on the wire.
    pub fn size(&self) -> usize {
        match self {
            Command::Dump { .. } => 9,
            _ => 1,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buffer = vec![0_u8; self.size()];
        let written = buffer.pwrite_with(self, 0, LE)?;
        buffer.truncate(written);

        Ok(buffer)
    }

    /// Decodes a command from raw bytes, refusing unknown opcodes and short dump requests.
    pub fn parse(bytes: &[u8]) -> Result<Command> {
        let opcode = match bytes.first() {
            Some(b) => Opcode::try_from(*b)?,
            None => return Err(Error::ProtocolViolation("empty command".into())),
        };

        let command = match opcode {
            Opcode::Version => Command::Version,
            Opcode::Header => Command::Header,
            Opcode::Dump => Command::Dump {
                from: swap::wire_u32(bytes, 1)?,
                to: swap::wire_u32(bytes, 5)?,
            },
        };

        if bytes.len() != command.size() {
            return Err(Error::ProtocolViolation(format!(
                "{:?} command is {} bytes, got {}",
                opcode,
                command.size(),
                bytes.len()
            )));
        }

        Ok(command)
    }
}

impl<'a> ctx::TryIntoCtx<scroll::Endian> for &'a Command {
    type Error = scroll::Error;

    fn try_into_ctx(self, dst: &mut [u8], ctx: scroll::Endian) -> std::result::Result<usize, Self::Error> {
        let mut offset = 0;

        dst.gwrite_with(self.opcode() as u8, &mut offset, ctx)?;
        if let Command::Dump { from, to } = *self {
            swap::put_wire_u32(dst, &mut offset, from)?;
            swap::put_wire_u32(dst, &mut offset, to)?;
        }

        Ok(offset)
    }
}
