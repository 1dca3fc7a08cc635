//! Bedrock structure block export (`.mcstructure`): uncompressed
//! little-endian NBT. Block indices come as a two-layer int-array list; only
//! layer 0 carries blocks here (layer 1 holds waterlogging and is dropped).

use crate::{
    check_parse_volume, export_io, parse_err, require_compound, require_list, require_str,
};
use byteorder::LittleEndian;
use schemport_common::{Dimensions, PortError};
use schemport_model::{BlockState, Schematic};
use schemport_nbt::{Compound, NbtFile, Tag};
use std::collections::BTreeMap;
use std::io::Cursor;

pub const FORMAT_VERSION: i32 = 1;
/// Block registry version Bedrock stamps on each palette entry (1.20.x).
pub const BLOCK_VERSION: i32 = 17959425;

pub fn parse(bytes: &[u8]) -> Result<Schematic, PortError> {
    let file = NbtFile::read::<_, LittleEndian>(&mut Cursor::new(bytes))
        .map_err(|e| parse_err(format!("invalid NBT: {}", e)))?;
    let root = file
        .root
        .as_compound()
        .ok_or_else(|| parse_err("root tag is not a compound"))?;

    let size = require_list(root, "size")?;
    if size.len() != 3 {
        return Err(parse_err(format!("`size` has {} entries, expected 3", size.len())));
    }
    let mut axes = [0i32; 3];
    for (i, tag) in size.iter().enumerate() {
        let value = tag
            .as_i32()
            .ok_or_else(|| parse_err("`size` entry is not an int"))?;
        if value <= 0 {
            return Err(parse_err(format!("non-positive size axis {}", value)));
        }
        axes[i] = value;
    }
    let dimensions = Dimensions::new(axes[0], axes[1], axes[2]);
    let volume = check_parse_volume(dimensions.volume())?;

    let structure = require_compound(root, "structure")?;

    let indices = require_list(structure, "block_indices")?;
    let layer0 = indices
        .first()
        .and_then(|tag| tag.as_int_array())
        .ok_or_else(|| parse_err("`block_indices` has no int-array layer"))?;
    if layer0.len() != volume {
        return Err(parse_err(format!(
            "layer 0 has {} indices, dimensions require {}",
            layer0.len(),
            volume
        )));
    }

    let palette_root = require_compound(structure, "palette")?;
    let default = require_compound(palette_root, "default")?;
    let palette = read_palette(require_list(default, "block_palette")?)?;

    // -1 marks "no block in this layer"; treat it as the implicit background.
    let mut grid = Vec::with_capacity(volume);
    for &index in layer0 {
        if index < 0 {
            grid.push(0);
        } else {
            grid.push(index as u32);
        }
    }

    Schematic::from_dense_grid(dimensions, palette, &grid)
}

fn read_palette(entries: &[Tag]) -> Result<Vec<BlockState>, PortError> {
    let mut palette = Vec::with_capacity(entries.len());
    for entry in entries {
        let compound = entry
            .as_compound()
            .ok_or_else(|| parse_err("palette entry is not a compound"))?;
        let name = require_str(compound, "name")?;
        let mut properties = BTreeMap::new();
        if let Some(states) = compound.get("states") {
            let states = states
                .as_compound()
                .ok_or_else(|| parse_err("`states` is not a compound"))?;
            for (key, value) in states.iter() {
                properties.insert(key.clone(), normalize_state_value(key, value)?);
            }
        }
        palette.push(BlockState::with_properties(name, properties));
    }
    Ok(palette)
}

/// Bedrock stores state values typed; the canonical model keeps them as
/// strings, mirroring Java block-state properties.
fn normalize_state_value(key: &str, value: &Tag) -> Result<String, PortError> {
    match value {
        Tag::Byte(b) => Ok(if *b != 0 { "true" } else { "false" }.to_string()),
        Tag::Int(i) => Ok(i.to_string()),
        Tag::String(s) => Ok(s.clone()),
        other => Err(parse_err(format!(
            "state `{}` has unsupported tag type {}",
            key,
            other.get_type_id()
        ))),
    }
}

/// Inverse of [`normalize_state_value`]: boolean-looking strings become
/// bytes, all-digit strings become ints, everything else stays a string.
fn typed_state_value(value: &str) -> Tag {
    match value {
        "true" => Tag::Byte(1),
        "false" => Tag::Byte(0),
        _ => {
            if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(i) = value.parse::<i32>() {
                    return Tag::Int(i);
                }
            }
            Tag::String(value.to_string())
        }
    }
}

pub fn serialize(schematic: &Schematic) -> Result<Vec<u8>, PortError> {
    schematic.validate()?;

    let d = schematic.dimensions;
    let grid = schematic.to_dense_grid();
    let layer0: Vec<i32> = grid.iter().map(|&i| i as i32).collect();
    let layer1 = vec![-1i32; grid.len()];

    let mut block_palette = Vec::with_capacity(schematic.palette.len());
    for state in &schematic.palette {
        let mut entry = Compound::new();
        entry.insert("name", Tag::String(state.name.clone()));
        let mut states = Compound::new();
        for (key, value) in &state.properties {
            states.insert(key.clone(), typed_state_value(value));
        }
        entry.insert("states", Tag::Compound(states));
        entry.insert("version", Tag::Int(BLOCK_VERSION));
        block_palette.push(Tag::Compound(entry));
    }

    let mut default = Compound::new();
    default.insert("block_palette", Tag::List(block_palette));
    default.insert("block_position_data", Tag::Compound(Compound::new()));

    let mut palette = Compound::new();
    palette.insert("default", Tag::Compound(default));

    let mut structure = Compound::new();
    structure.insert(
        "block_indices",
        Tag::List(vec![Tag::IntArray(layer0), Tag::IntArray(layer1)]),
    );
    structure.insert("entities", Tag::List(vec![]));
    structure.insert("palette", Tag::Compound(palette));

    let mut root = Compound::new();
    root.insert("format_version", Tag::Int(FORMAT_VERSION));
    root.insert(
        "size",
        Tag::List(vec![Tag::Int(d.x), Tag::Int(d.y), Tag::Int(d.z)]),
    );
    root.insert("structure", Tag::Compound(structure));
    root.insert(
        "structure_world_origin",
        Tag::List(vec![Tag::Int(0), Tag::Int(0), Tag::Int(0)]),
    );

    let file = NbtFile::new("", Tag::Compound(root));
    let mut out = Vec::new();
    file.write::<_, LittleEndian>(&mut out).map_err(export_io)?;
    Ok(out)
}
