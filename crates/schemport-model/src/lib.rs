//! The canonical, format-neutral structure representation. Every parser
//! produces a [`Schematic`] and every serializer consumes one; none of the
//! binary formats leak past this boundary.

use schemport_common::{Dimensions, PortError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hard cap on structure volume. Anything above this is rejected before any
/// dense grid or packed array is allocated.
pub const MAX_VOLUME: i64 = 512 * 512 * 512;

/// Sponge stores dimensions as signed NBT shorts.
pub const MAX_SPONGE_AXIS: i32 = i16::MAX as i32;

/// A block name plus optional state properties, e.g.
/// `minecraft:oak_stairs` with `facing=north, half=bottom`.
///
/// Properties live in a `BTreeMap` so the canonical key below is independent
/// of the order they were inserted in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockState {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl BlockState {
    pub fn new(name: impl Into<String>) -> Self {
        BlockState {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_properties(name: impl Into<String>, properties: BTreeMap<String, String>) -> Self {
        BlockState {
            name: name.into(),
            properties,
        }
    }

    pub fn is_air(&self) -> bool {
        self.name == "minecraft:air"
    }

    /// Deterministic identity key: `name` alone, or `name[k1=v1,k2=v2]` with
    /// keys in lexicographic order. Both the Sponge palette writer and the
    /// Sponge palette reader go through this pair of functions, so their
    /// agreement is structural rather than incidental.
    pub fn canonical_key(&self) -> String {
        if self.properties.is_empty() {
            return self.name.clone();
        }
        let props: Vec<String> = self
            .properties
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        format!("{}[{}]", self.name, props.join(","))
    }

    /// Inverse of [`BlockState::canonical_key`].
    pub fn parse_key(key: &str) -> Result<Self, PortError> {
        let open = match key.find('[') {
            Some(idx) => idx,
            None => return Ok(BlockState::new(key)),
        };

        if !key.ends_with(']') || open == 0 {
            return Err(PortError::ParseError(format!(
                "malformed block state key `{}`",
                key
            )));
        }

        let name = &key[..open];
        let body = &key[open + 1..key.len() - 1];
        let mut properties = BTreeMap::new();
        for pair in body.split(',') {
            let (k, v) = pair.split_once('=').ok_or_else(|| {
                PortError::ParseError(format!("malformed block state property `{}`", pair))
            })?;
            if k.is_empty() {
                return Err(PortError::ParseError(format!(
                    "empty property name in block state key `{}`",
                    key
                )));
            }
            properties.insert(k.to_string(), v.to_string());
        }

        Ok(BlockState::with_properties(name, properties))
    }
}

/// One explicitly-placed block. Positions absent from [`Schematic::blocks`]
/// are implicitly palette index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub palette_index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schematic {
    pub dimensions: Dimensions,
    /// Ordered: palette indices point into this list. Index 0 is the
    /// structure's implicit background block, typically air.
    pub palette: Vec<BlockState>,
    /// Sparse: only cells that deviate from palette index 0.
    pub blocks: Vec<Block>,
    pub block_count: u32,
}

impl Schematic {
    pub fn new(dimensions: Dimensions, palette: Vec<BlockState>) -> Self {
        Schematic {
            dimensions,
            palette,
            blocks: Vec::new(),
            block_count: 0,
        }
    }

    /// YZX linearization shared by all three formats.
    pub fn grid_index(dimensions: Dimensions, x: i32, y: i32, z: i32) -> usize {
        ((y as i64 * dimensions.z as i64 + z as i64) * dimensions.x as i64 + x as i64) as usize
    }

    /// Shared pre-serialization validation. Every serializer runs this before
    /// allocating anything sized by the dimensions.
    pub fn validate(&self) -> Result<(), PortError> {
        let d = self.dimensions;
        if d.x <= 0 || d.y <= 0 || d.z <= 0 {
            return Err(PortError::ExportFailed(format!(
                "dimensions must be positive, got {}x{}x{}",
                d.x, d.y, d.z
            )));
        }
        if d.volume() > MAX_VOLUME {
            return Err(PortError::ExportFailed(format!(
                "structure volume {} exceeds the {} cell limit",
                d.volume(),
                MAX_VOLUME
            )));
        }
        if self.palette.is_empty() {
            return Err(PortError::ExportFailed("palette is empty".to_string()));
        }
        for block in &self.blocks {
            if block.x < 0
                || block.x >= d.x
                || block.y < 0
                || block.y >= d.y
                || block.z < 0
                || block.z >= d.z
            {
                return Err(PortError::ExportFailed(format!(
                    "block at ({}, {}, {}) outside {}x{}x{}",
                    block.x, block.y, block.z, d.x, d.y, d.z
                )));
            }
            if block.palette_index as usize >= self.palette.len() {
                return Err(PortError::ExportFailed(format!(
                    "palette index {} out of range (palette has {} entries)",
                    block.palette_index,
                    self.palette.len()
                )));
            }
        }
        Ok(())
    }

    /// Flattens the sparse block list into a dense YZX grid, filling absent
    /// cells with palette index 0. Call [`Schematic::validate`] first; this
    /// trusts coordinates to be in range.
    pub fn to_dense_grid(&self) -> Vec<u32> {
        let mut grid = vec![0u32; self.dimensions.volume() as usize];
        for block in &self.blocks {
            grid[Self::grid_index(self.dimensions, block.x, block.y, block.z)] =
                block.palette_index;
        }
        grid
    }

    /// Builds a sparse schematic from a dense YZX grid, skipping background
    /// cells. Out-of-range indices and size mismatches are parse errors since
    /// this is the path every format reader funnels through.
    pub fn from_dense_grid(
        dimensions: Dimensions,
        palette: Vec<BlockState>,
        grid: &[u32],
    ) -> Result<Schematic, PortError> {
        let volume = dimensions.volume();
        if volume <= 0 || grid.len() as i64 != volume {
            return Err(PortError::ParseError(format!(
                "block grid has {} cells, dimensions require {}",
                grid.len(),
                volume
            )));
        }
        if palette.is_empty() {
            return Err(PortError::ParseError("palette is empty".to_string()));
        }

        let mut blocks = Vec::new();
        for y in 0..dimensions.y {
            for z in 0..dimensions.z {
                for x in 0..dimensions.x {
                    let index = grid[Self::grid_index(dimensions, x, y, z)];
                    if index as usize >= palette.len() {
                        return Err(PortError::ParseError(format!(
                            "palette index {} out of range (palette has {} entries)",
                            index,
                            palette.len()
                        )));
                    }
                    if index != 0 {
                        blocks.push(Block {
                            x,
                            y,
                            z,
                            palette_index: index,
                        });
                    }
                }
            }
        }

        let block_count = blocks.len() as u32;
        Ok(Schematic {
            dimensions,
            palette,
            blocks,
            block_count,
        })
    }
}
