//! Facade over the schemport workspace: re-exports the canonical model, the
//! per-format codecs, and the conversion gateway the rest of the system
//! integrates against.

pub use schemport_common::{Dimensions, Edition, PortError, Result};
pub use schemport_format::{parse, serialize, StructureFormat};
pub use schemport_gateway::{
    CachedStructure, ConversionGateway, ConversionResult, ExportResult, StructureCache,
    StructureMetadata,
};
pub use schemport_model::{Block, BlockState, Schematic, MAX_SPONGE_AXIS, MAX_VOLUME};

pub mod nbt {
    pub use schemport_nbt::{is_gzip, Compound, NbtFile, Tag};
}

pub mod codec {
    pub use schemport_codec::bitpack::{bits_for_palette, pack, unpack};
    pub use schemport_codec::varint::{read_varint, write_varint};
}
