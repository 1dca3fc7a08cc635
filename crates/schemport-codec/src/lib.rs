pub mod bitpack;
pub mod varint;

pub use bitpack::{bits_for_palette, pack, unpack};
pub use varint::{read_varint, write_varint};
