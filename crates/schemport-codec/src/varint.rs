//! Unsigned LEB128 variable-length integers: 7 data bits per byte, high bit
//! set on every byte except the last. The Sponge schematic format stores one
//! varint per grid cell in its `BlockData` stream.

use std::io;

/// Appends the LEB128 encoding of `value` to `buffer`.
pub fn write_varint(buffer: &mut Vec<u8>, mut value: u32) {
    while (value & !0x7F) != 0 {
        buffer.push(((value & 0x7F) as u8) | 0x80);
        value >>= 7;
    }
    buffer.push((value & 0x7F) as u8);
}

/// Reads one LEB128 value from `bytes` starting at `*cursor`, advancing the
/// cursor past it. Rejects truncated input and encodings that overflow u32.
pub fn read_varint(bytes: &[u8], cursor: &mut usize) -> io::Result<u32> {
    let mut result: u32 = 0;
    let mut shift = 0u32;

    loop {
        if *cursor >= bytes.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "EOF while reading VarInt",
            ));
        }

        let byte = bytes[*cursor];
        *cursor += 1;

        // u32 holds 32 bits = 4 full groups plus 4 bits of the fifth byte.
        if shift > 28 || (shift == 28 && (byte & 0x70) != 0) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "VarInt overflows 32 bits",
            ));
        }

        result |= ((byte & 0x7F) as u32) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}
