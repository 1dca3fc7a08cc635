pub mod cache;
pub mod gateway;

pub use cache::{CachedStructure, StructureCache};
pub use gateway::{ConversionGateway, ConversionResult, ExportResult, StructureMetadata};
