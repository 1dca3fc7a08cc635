//! Sponge Schematic v2 (`.schem`): gzip-wrapped big-endian NBT with a
//! blockstate-string palette and a varint `BlockData` stream in YZX order.

use crate::{
    check_parse_volume, export_io, parse_err, read_java_root, require_byte_array,
    require_compound, require_i16,
};
use byteorder::BigEndian;
use schemport_codec::varint::{read_varint, write_varint};
use schemport_common::{Dimensions, PortError};
use schemport_model::{BlockState, Schematic, MAX_SPONGE_AXIS};
use schemport_nbt::{Compound, NbtFile, Tag};
use std::collections::HashMap;

pub const SPONGE_VERSION: i32 = 2;
pub const DATA_VERSION: i32 = 3700;

pub fn parse(bytes: &[u8]) -> Result<Schematic, PortError> {
    let file = read_java_root(bytes)?;
    let root = file
        .root
        .as_compound()
        .ok_or_else(|| parse_err("root tag is not a compound"))?;

    let width = require_i16(root, "Width")? as i32;
    let height = require_i16(root, "Height")? as i32;
    let length = require_i16(root, "Length")? as i32;
    if width <= 0 || height <= 0 || length <= 0 {
        return Err(parse_err(format!(
            "non-positive dimensions {}x{}x{}",
            width, height, length
        )));
    }
    let dimensions = Dimensions::new(width, height, length);
    let volume = check_parse_volume(dimensions.volume())?;

    let palette = read_palette(require_compound(root, "Palette")?)?;

    let data = require_byte_array(root, "BlockData")?;
    let data: Vec<u8> = data.iter().map(|&b| b as u8).collect();
    let mut cursor = 0;
    let mut grid = Vec::with_capacity(volume);
    for _ in 0..volume {
        grid.push(read_varint(&data, &mut cursor).map_err(|e| {
            parse_err(format!("bad block data stream: {}", e))
        })?);
    }
    if cursor != data.len() {
        return Err(parse_err(format!(
            "block data stream has {} trailing bytes",
            data.len() - cursor
        )));
    }

    Schematic::from_dense_grid(dimensions, palette, &grid)
}

/// The `Palette` compound maps canonical blockstate strings to indices. The
/// indices must cover 0..n-1 exactly; gaps and duplicates are parse errors.
fn read_palette(palette_tag: &Compound) -> Result<Vec<BlockState>, PortError> {
    let len = palette_tag.len();
    let mut slots: Vec<Option<BlockState>> = vec![None; len];
    for (key, tag) in palette_tag.iter() {
        let index = tag
            .as_i32()
            .ok_or_else(|| parse_err(format!("palette entry `{}` is not an int", key)))?;
        let slot = usize::try_from(index)
            .ok()
            .filter(|&i| i < len)
            .ok_or_else(|| parse_err(format!("palette index {} out of range", index)))?;
        if slots[slot].is_some() {
            return Err(parse_err(format!("duplicate palette index {}", index)));
        }
        slots[slot] = Some(BlockState::parse_key(key)?);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| slot.ok_or_else(|| parse_err(format!("palette is missing index {}", i))))
        .collect()
}

pub fn serialize(schematic: &Schematic) -> Result<Vec<u8>, PortError> {
    schematic.validate()?;

    let d = schematic.dimensions;
    if d.x > MAX_SPONGE_AXIS || d.y > MAX_SPONGE_AXIS || d.z > MAX_SPONGE_AXIS {
        return Err(PortError::ExportFailed(format!(
            "dimensions {}x{}x{} exceed the schematic axis limit of {}",
            d.x, d.y, d.z, MAX_SPONGE_AXIS
        )));
    }

    // Distinct model entries can share a canonical key (a Litematica upload
    // may carry duplicate palette entries). The compound keeps one slot per
    // key, so the grid is remapped through the surviving indices.
    let mut palette = Compound::new();
    let mut indices: HashMap<String, u32> = HashMap::new();
    let mut remap = Vec::with_capacity(schematic.palette.len());
    for state in &schematic.palette {
        let key = state.canonical_key();
        let index = match indices.get(&key) {
            Some(&index) => index,
            None => {
                let index = indices.len() as u32;
                palette.insert(key.clone(), Tag::Int(index as i32));
                indices.insert(key, index);
                index
            }
        };
        remap.push(index);
    }

    let mut data = Vec::new();
    for &index in &schematic.to_dense_grid() {
        write_varint(&mut data, remap[index as usize]);
    }

    let mut root = Compound::new();
    root.insert("Version", Tag::Int(SPONGE_VERSION));
    root.insert("DataVersion", Tag::Int(DATA_VERSION));
    root.insert("Width", Tag::Short(d.x as i16));
    root.insert("Height", Tag::Short(d.y as i16));
    root.insert("Length", Tag::Short(d.z as i16));
    root.insert("PaletteMax", Tag::Int(palette.len() as i32));
    root.insert("Palette", Tag::Compound(palette));
    root.insert(
        "BlockData",
        Tag::ByteArray(data.into_iter().map(|b| b as i8).collect()),
    );

    let file = NbtFile::new("Schematic", Tag::Compound(root));
    let mut out = Vec::new();
    file.write_gzip::<_, BigEndian>(&mut out).map_err(export_io)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use schemport_nbt::is_gzip;
    use std::collections::BTreeMap;

    fn sample() -> Schematic {
        let dimensions = Dimensions::new(3, 2, 2);
        let mut props = BTreeMap::new();
        props.insert("facing".to_string(), "north".to_string());
        props.insert("half".to_string(), "bottom".to_string());
        let palette = vec![
            BlockState::new("minecraft:air"),
            BlockState::new("minecraft:stone"),
            BlockState::with_properties("minecraft:oak_stairs", props),
        ];
        let mut grid = vec![0u32; 12];
        grid[0] = 1;
        grid[5] = 2;
        grid[11] = 1;
        Schematic::from_dense_grid(dimensions, palette, &grid).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let original = sample();
        let bytes = serialize(&original).unwrap();
        assert!(is_gzip(&bytes));

        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.dimensions, original.dimensions);
        assert_eq!(parsed.palette, original.palette);
        assert_eq!(parsed.block_count, original.block_count);
        assert_eq!(parsed.to_dense_grid(), original.to_dense_grid());
    }

    #[test]
    fn test_palette_keys_are_canonical() {
        let bytes = serialize(&sample()).unwrap();
        let file = read_java_root(&bytes).unwrap();
        let palette = require_compound(file.root.as_compound().unwrap(), "Palette").unwrap();
        assert!(palette
            .get("minecraft:oak_stairs[facing=north,half=bottom]")
            .is_some());
    }

    #[test]
    fn test_duplicate_palette_entries_collapse_and_remap() {
        // Two model entries resolving to the same canonical key share one
        // palette slot on disk; the block data must follow the remap.
        let dimensions = Dimensions::new(2, 1, 1);
        let palette = vec![
            BlockState::new("minecraft:air"),
            BlockState::new("minecraft:stone"),
            BlockState::new("minecraft:stone"),
        ];
        let grid = vec![1u32, 2];
        let model = Schematic::from_dense_grid(dimensions, palette, &grid).unwrap();
        assert!(model.validate().is_ok());

        let bytes = serialize(&model).unwrap();
        let file = read_java_root(&bytes).unwrap();
        let root = file.root.as_compound().unwrap();
        assert_eq!(root.get("PaletteMax"), Some(&Tag::Int(2)));

        let parsed = parse(&bytes).unwrap();
        assert_eq!(
            parsed.palette,
            vec![
                BlockState::new("minecraft:air"),
                BlockState::new("minecraft:stone"),
            ]
        );
        assert_eq!(parsed.to_dense_grid(), vec![1, 1]);
        assert_eq!(parsed.block_count, 2);
    }

    #[test]
    fn test_axis_limit() {
        let model = Schematic::new(
            Dimensions::new(40000, 1, 1),
            vec![BlockState::new("minecraft:air")],
        );
        assert_matches!(serialize(&model), Err(PortError::ExportFailed(_)));
    }

    #[test]
    fn test_missing_tag_is_parse_error() {
        let mut root = Compound::new();
        root.insert("Width", Tag::Short(1));
        let file = NbtFile::new("Schematic", Tag::Compound(root));
        let mut bytes = Vec::new();
        file.write_gzip::<_, BigEndian>(&mut bytes).unwrap();
        assert_matches!(parse(&bytes), Err(PortError::ParseError(_)));
    }

    #[test]
    fn test_palette_gap_is_parse_error() {
        let mut palette = Compound::new();
        palette.insert("minecraft:air", Tag::Int(0));
        palette.insert("minecraft:stone", Tag::Int(2));
        let mut root = Compound::new();
        root.insert("Width", Tag::Short(1));
        root.insert("Height", Tag::Short(1));
        root.insert("Length", Tag::Short(1));
        root.insert("Palette", Tag::Compound(palette));
        root.insert("BlockData", Tag::ByteArray(vec![0]));
        let file = NbtFile::new("Schematic", Tag::Compound(root));
        let mut bytes = Vec::new();
        file.write_gzip::<_, BigEndian>(&mut bytes).unwrap();
        assert_matches!(parse(&bytes), Err(PortError::ParseError(_)));
    }

    #[test]
    fn test_truncated_block_data_is_parse_error() {
        let mut palette = Compound::new();
        palette.insert("minecraft:air", Tag::Int(0));
        let mut root = Compound::new();
        root.insert("Width", Tag::Short(2));
        root.insert("Height", Tag::Short(2));
        root.insert("Length", Tag::Short(2));
        root.insert("Palette", Tag::Compound(palette));
        root.insert("BlockData", Tag::ByteArray(vec![0, 0, 0])); // needs 8
        let file = NbtFile::new("Schematic", Tag::Compound(root));
        let mut bytes = Vec::new();
        file.write_gzip::<_, BigEndian>(&mut bytes).unwrap();
        assert_matches!(parse(&bytes), Err(PortError::ParseError(_)));
    }
}
