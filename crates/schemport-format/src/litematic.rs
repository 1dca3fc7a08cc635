//! Litematica v6 (`.litematic`): gzip-wrapped big-endian NBT. Block indices
//! live in a bit-packed long array whose entry width is derived from the
//! palette size.

use crate::{
    check_parse_volume, export_io, parse_err, read_java_root, require_compound, require_i32,
    require_list, require_long_array, require_str,
};
use byteorder::BigEndian;
use schemport_codec::bitpack::{bits_for_palette, pack, unpack};
use schemport_common::{Dimensions, PortError};
use schemport_model::{BlockState, Schematic};
use schemport_nbt::{Compound, NbtFile, Tag};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

pub const LITEMATIC_VERSION: i32 = 6;
pub const MINECRAFT_DATA_VERSION: i32 = 3700;

/// The region the serializer writes, and the parser's first choice. Files
/// written by Litematica itself key the region by schematic name instead, so
/// the parser falls back to the first region present.
const REGION_NAME: &str = "Main";

pub fn parse(bytes: &[u8]) -> Result<Schematic, PortError> {
    let file = read_java_root(bytes)?;
    let root = file
        .root
        .as_compound()
        .ok_or_else(|| parse_err("root tag is not a compound"))?;

    let regions = require_compound(root, "Regions")?;
    let region = match regions.get(REGION_NAME) {
        Some(tag) => tag
            .as_compound()
            .ok_or_else(|| parse_err("region `Main` is not a compound"))?,
        None => regions
            .iter()
            .next()
            .and_then(|(_, tag)| tag.as_compound())
            .ok_or_else(|| parse_err("`Regions` contains no region compound"))?,
    };

    let size = require_compound(region, "Size")?;
    let x = require_i32(size, "x")?;
    let y = require_i32(size, "y")?;
    let z = require_i32(size, "z")?;
    if x <= 0 || y <= 0 || z <= 0 {
        return Err(parse_err(format!("non-positive region size {}x{}x{}", x, y, z)));
    }
    let dimensions = Dimensions::new(x, y, z);
    let volume = check_parse_volume(dimensions.volume())?;

    let palette = read_palette(require_list(region, "BlockStatePalette")?)?;

    let states = require_long_array(region, "BlockStates")?;
    let words: Vec<u64> = states.iter().map(|&l| l as u64).collect();
    let bits = bits_for_palette(palette.len());
    let grid = unpack(&words, bits, volume)
        .map_err(|e| parse_err(format!("bad block state array: {}", e)))?;

    Schematic::from_dense_grid(dimensions, palette, &grid)
}

fn read_palette(entries: &[Tag]) -> Result<Vec<BlockState>, PortError> {
    let mut palette = Vec::with_capacity(entries.len());
    for entry in entries {
        let compound = entry
            .as_compound()
            .ok_or_else(|| parse_err("palette entry is not a compound"))?;
        let name = require_str(compound, "Name")?;
        let mut properties = BTreeMap::new();
        if let Some(props) = compound.get("Properties") {
            let props = props
                .as_compound()
                .ok_or_else(|| parse_err("`Properties` is not a compound"))?;
            for (key, value) in props.iter() {
                let value = value.as_str().ok_or_else(|| {
                    parse_err(format!("property `{}` is not a string", key))
                })?;
                properties.insert(key.clone(), value.to_string());
            }
        }
        palette.push(BlockState::with_properties(name, properties));
    }
    Ok(palette)
}

pub fn serialize(schematic: &Schematic) -> Result<Vec<u8>, PortError> {
    schematic.validate()?;

    let d = schematic.dimensions;
    let grid = schematic.to_dense_grid();
    let bits = bits_for_palette(schematic.palette.len());
    let packed: Vec<i64> = pack(&grid, bits).into_iter().map(|w| w as i64).collect();
    let now = epoch_millis();

    let mut palette = Vec::with_capacity(schematic.palette.len());
    for state in &schematic.palette {
        let mut entry = Compound::new();
        entry.insert("Name", Tag::String(state.name.clone()));
        if !state.properties.is_empty() {
            let mut props = Compound::new();
            for (key, value) in &state.properties {
                props.insert(key.clone(), Tag::String(value.clone()));
            }
            entry.insert("Properties", Tag::Compound(props));
        }
        palette.push(Tag::Compound(entry));
    }

    let mut region = Compound::new();
    region.insert("Position", vec3(0, 0, 0));
    region.insert("Size", vec3(d.x, d.y, d.z));
    region.insert("BlockStatePalette", Tag::List(palette));
    region.insert("BlockStates", Tag::LongArray(packed));
    region.insert("Entities", Tag::List(vec![]));
    region.insert("TileEntities", Tag::List(vec![]));
    region.insert("PendingBlockTicks", Tag::List(vec![]));
    region.insert("PendingFluidTicks", Tag::List(vec![]));

    let mut regions = Compound::new();
    regions.insert(REGION_NAME, Tag::Compound(region));

    let mut metadata = Compound::new();
    metadata.insert("Name", Tag::String("Unnamed".to_string()));
    metadata.insert("Author", Tag::String("schemport".to_string()));
    metadata.insert("Description", Tag::String(String::new()));
    metadata.insert("EnclosingSize", vec3(d.x, d.y, d.z));
    metadata.insert("RegionCount", Tag::Int(1));
    metadata.insert("TotalVolume", Tag::Int(d.volume() as i32));
    metadata.insert("TotalBlocks", Tag::Int(schematic.block_count as i32));
    metadata.insert("TimeCreated", Tag::Long(now));
    metadata.insert("TimeModified", Tag::Long(now));

    let mut root = Compound::new();
    root.insert("MinecraftDataVersion", Tag::Int(MINECRAFT_DATA_VERSION));
    root.insert("Version", Tag::Int(LITEMATIC_VERSION));
    root.insert("Metadata", Tag::Compound(metadata));
    root.insert("Regions", Tag::Compound(regions));

    let file = NbtFile::new("", Tag::Compound(root));
    let mut out = Vec::new();
    file.write_gzip::<_, BigEndian>(&mut out).map_err(export_io)?;
    Ok(out)
}

fn vec3(x: i32, y: i32, z: i32) -> Tag {
    let mut compound = Compound::new();
    compound.insert("x", Tag::Int(x));
    compound.insert("y", Tag::Int(y));
    compound.insert("z", Tag::Int(z));
    Tag::Compound(compound)
}

fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
