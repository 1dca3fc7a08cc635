//! Per-format structure codecs. Each module owns one binary container and
//! exposes a `parse`/`serialize` pair over the canonical [`Schematic`].

pub mod litematic;
pub mod mcstructure;
pub mod sponge;

use byteorder::BigEndian;
use schemport_common::PortError;
use schemport_model::Schematic;
use schemport_nbt::{is_gzip, Compound, NbtFile, Tag};
use serde::{Deserialize, Serialize};
use std::io::{self, Cursor};

/// Anything shorter cannot even hold a gzip header or an NBT root tag.
pub const MIN_STRUCTURE_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructureFormat {
    /// Sponge Schematic v2 (`.schem`), WorldEdit's format.
    Schem,
    /// Litematica v6 (`.litematic`).
    Litematic,
    /// Bedrock structure block export (`.mcstructure`).
    Mcstructure,
}

impl StructureFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            StructureFormat::Schem => "schem",
            StructureFormat::Litematic => "litematic",
            StructureFormat::Mcstructure => "mcstructure",
        }
    }

    /// Looks a format up by name or file extension, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "schem" | "schematic" | "sponge" => Some(StructureFormat::Schem),
            "litematic" | "litematica" => Some(StructureFormat::Litematic),
            "mcstructure" | "bedrock" => Some(StructureFormat::Mcstructure),
            _ => None,
        }
    }

    /// Best-effort content detection. Gzip-wrapped big-endian NBT is either
    /// Sponge or Litematica (told apart by the root's keys); a bare compound
    /// opener is Bedrock's uncompressed little-endian NBT.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < MIN_STRUCTURE_LEN {
            return None;
        }
        if is_gzip(bytes) {
            let file = NbtFile::read_gzip::<_, BigEndian>(&mut Cursor::new(bytes)).ok()?;
            let root = file.root.as_compound()?;
            if file.name == "Schematic" || root.get("Palette").is_some() {
                return Some(StructureFormat::Schem);
            }
            if root.get("Regions").is_some() {
                return Some(StructureFormat::Litematic);
            }
            return None;
        }
        if bytes[0] == 10 {
            return Some(StructureFormat::Mcstructure);
        }
        None
    }
}

/// Parses raw uploaded bytes into the canonical model.
pub fn parse(bytes: &[u8], format: StructureFormat) -> Result<Schematic, PortError> {
    if bytes.len() < MIN_STRUCTURE_LEN {
        return Err(PortError::InvalidFormat(format!(
            "structure file too small ({} bytes)",
            bytes.len()
        )));
    }
    match format {
        StructureFormat::Schem => sponge::parse(bytes),
        StructureFormat::Litematic => litematic::parse(bytes),
        StructureFormat::Mcstructure => mcstructure::parse(bytes),
    }
}

/// Serializes the canonical model into the target format's bytes.
pub fn serialize(schematic: &Schematic, format: StructureFormat) -> Result<Vec<u8>, PortError> {
    match format {
        StructureFormat::Schem => sponge::serialize(schematic),
        StructureFormat::Litematic => litematic::serialize(schematic),
        StructureFormat::Mcstructure => mcstructure::serialize(schematic),
    }
}

pub(crate) fn parse_err(msg: impl Into<String>) -> PortError {
    PortError::ParseError(msg.into())
}

pub(crate) fn nbt_io(err: io::Error) -> PortError {
    PortError::ParseError(format!("invalid NBT: {}", err))
}

pub(crate) fn export_io(err: io::Error) -> PortError {
    PortError::ExportFailed(format!("NBT write failed: {}", err))
}

/// Reads a Java-edition NBT document, transparently undoing gzip when the
/// magic bytes are present.
pub(crate) fn read_java_root(bytes: &[u8]) -> Result<NbtFile, PortError> {
    let mut cursor = Cursor::new(bytes);
    let file = if is_gzip(bytes) {
        NbtFile::read_gzip::<_, BigEndian>(&mut cursor)
    } else {
        NbtFile::read::<_, BigEndian>(&mut cursor)
    };
    file.map_err(nbt_io)
}

pub(crate) fn require<'a>(compound: &'a Compound, name: &str) -> Result<&'a Tag, PortError> {
    compound
        .get(name)
        .ok_or_else(|| parse_err(format!("missing required tag `{}`", name)))
}

pub(crate) fn require_compound<'a>(
    compound: &'a Compound,
    name: &str,
) -> Result<&'a Compound, PortError> {
    require(compound, name)?
        .as_compound()
        .ok_or_else(|| parse_err(format!("tag `{}` is not a compound", name)))
}

pub(crate) fn require_list<'a>(compound: &'a Compound, name: &str) -> Result<&'a Vec<Tag>, PortError> {
    require(compound, name)?
        .as_list()
        .ok_or_else(|| parse_err(format!("tag `{}` is not a list", name)))
}

pub(crate) fn require_i16(compound: &Compound, name: &str) -> Result<i16, PortError> {
    require(compound, name)?
        .as_i16()
        .ok_or_else(|| parse_err(format!("tag `{}` is not a short", name)))
}

pub(crate) fn require_i32(compound: &Compound, name: &str) -> Result<i32, PortError> {
    require(compound, name)?
        .as_i32()
        .ok_or_else(|| parse_err(format!("tag `{}` is not an int", name)))
}

pub(crate) fn require_str<'a>(compound: &'a Compound, name: &str) -> Result<&'a str, PortError> {
    require(compound, name)?
        .as_str()
        .ok_or_else(|| parse_err(format!("tag `{}` is not a string", name)))
}

pub(crate) fn require_byte_array<'a>(
    compound: &'a Compound,
    name: &str,
) -> Result<&'a [i8], PortError> {
    require(compound, name)?
        .as_byte_array()
        .ok_or_else(|| parse_err(format!("tag `{}` is not a byte array", name)))
}

pub(crate) fn require_long_array<'a>(
    compound: &'a Compound,
    name: &str,
) -> Result<&'a [i64], PortError> {
    require(compound, name)?
        .as_long_array()
        .ok_or_else(|| parse_err(format!("tag `{}` is not a long array", name)))
}

/// Volume guard shared by the three parsers: runs before any grid allocation.
pub(crate) fn check_parse_volume(volume: i64) -> Result<usize, PortError> {
    if volume <= 0 {
        return Err(parse_err(format!("non-positive structure volume {}", volume)));
    }
    if volume > schemport_model::MAX_VOLUME {
        return Err(parse_err(format!(
            "structure volume {} exceeds the {} cell limit",
            volume,
            schemport_model::MAX_VOLUME
        )));
    }
    Ok(volume as usize)
}
