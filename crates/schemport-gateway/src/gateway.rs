//! The conversion orchestrator: the only surface the rest of the system
//! talks to. Sequences parse -> cache -> export, enforces the version and
//! size policy, and never leaks a half-committed cache entry.

use crate::cache::{CachedStructure, StructureCache};
use schemport_common::{Dimensions, Edition, PortError, Result};
use schemport_format::StructureFormat;
use schemport_logger::{log, LogSeverity};
use schemport_model::Schematic;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// Structures older than Minecraft 1.12 predate the flattened block-state
/// palette and are rejected outright.
pub const MIN_SUPPORTED_MINOR: u32 = 12;

/// Lightweight summary returned to the upload flow; the full model stays
/// staged server-side until `register_parsed_data` commits it.
#[derive(Debug, Clone, Serialize)]
pub struct StructureMetadata {
    pub dimensions: Dimensions,
    pub block_count: u32,
    pub used_blocks: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ExportResult {
    pub data: Vec<u8>,
    pub format: StructureFormat,
    pub file_name: String,
    pub has_data_loss: bool,
    pub lost_blocks: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub data: Vec<u8>,
    pub format: StructureFormat,
    pub has_data_loss: bool,
    pub converted_blocks: u32,
}

struct StagedStructure {
    raw: Vec<u8>,
    format: StructureFormat,
    model: Schematic,
}

pub struct ConversionGateway {
    cache: StructureCache,
    staged: Mutex<Option<StagedStructure>>,
}

impl ConversionGateway {
    /// The cache is injected so its lifetime and eviction stay with the
    /// caller that owns structure records.
    pub fn new(cache: StructureCache) -> Self {
        ConversionGateway {
            cache,
            staged: Mutex::new(None),
        }
    }

    pub fn new_structure_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Parses an upload and stages it for a later `register_parsed_data`.
    /// Staging is last-write-wins: a second parse replaces the first.
    pub fn parse_structure(&self, bytes: &[u8], format_name: &str) -> Result<StructureMetadata> {
        let format = StructureFormat::from_name(format_name).ok_or_else(|| {
            PortError::InvalidFormat(format!("unknown structure format `{}`", format_name))
        })?;

        let model = schemport_format::parse(bytes, format)?;
        let metadata = StructureMetadata {
            dimensions: model.dimensions,
            block_count: model.block_count,
            used_blocks: used_blocks(&model),
        };

        log(
            &format!(
                "parsed {} structure: {}x{}x{}, {} blocks",
                format.extension(),
                model.dimensions.x,
                model.dimensions.y,
                model.dimensions.z,
                model.block_count
            ),
            LogSeverity::Info,
        );

        *self.staged.lock().unwrap_or_else(PoisonError::into_inner) = Some(StagedStructure {
            raw: bytes.to_vec(),
            format,
            model,
        });

        Ok(metadata)
    }

    /// Commits the staged parse into the cache under the given ID.
    pub fn register_parsed_data(&self, structure_id: &str) -> Result<()> {
        let staged = self
            .staged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| PortError::NotFound("no parsed structure staged".to_string()))?;

        self.cache.insert(
            structure_id,
            CachedStructure {
                raw: staged.raw,
                format: staged.format,
                model: staged.model,
            },
        );
        Ok(())
    }

    /// Exports a cached structure. Same-format exports return the original
    /// upload byte-for-byte; everything else goes through the serializer.
    pub fn export_structure(
        &self,
        structure_id: &str,
        target_format: &str,
        target_edition: Edition,
        target_version: &str,
    ) -> Result<ExportResult> {
        let format = StructureFormat::from_name(target_format).ok_or_else(|| {
            PortError::UnsupportedConversion(format!(
                "no serializer for target format `{}`",
                target_format
            ))
        })?;

        let entry = self.cache.get(structure_id).ok_or_else(|| {
            PortError::NotFound(format!("no structure cached under id `{}`", structure_id))
        })?;

        let data = if entry.format == format {
            entry.raw.clone()
        } else {
            schemport_format::serialize(&entry.model, format)?
        };

        log(
            &format!(
                "exported structure {} as {} ({} {})",
                structure_id,
                format.extension(),
                target_edition.name(),
                target_version
            ),
            LogSeverity::Info,
        );

        Ok(ExportResult {
            data,
            format,
            file_name: format!("{}.{}", structure_id, format.extension()),
            has_data_loss: false,
            lost_blocks: Vec::new(),
        })
    }

    /// One-shot conversion between editions. The version gate runs before
    /// any parsing so unsupported requests fail fast and cheap.
    pub fn convert(
        &self,
        source: &[u8],
        source_edition: Edition,
        source_version: &str,
        target_edition: Edition,
        target_version: &str,
    ) -> Result<ConversionResult> {
        check_version(source_version)?;
        check_version(target_version)?;

        let source_format =
            StructureFormat::sniff(source).unwrap_or_else(|| default_format(source_edition));
        let target_format = default_format(target_edition);

        let model = schemport_format::parse(source, source_format)
            .map_err(|e| PortError::ConversionFailed(e.to_string()))?;
        let data = schemport_format::serialize(&model, target_format)
            .map_err(|e| PortError::ConversionFailed(e.to_string()))?;

        // Block identity is carried over as-is: no cross-edition mapping
        // table exists yet, so nothing is reported lost.
        let converted_blocks = model.palette.len() as u32;

        log(
            &format!(
                "converted {} {} -> {} {} ({} palette entries)",
                source_edition.name(),
                source_version,
                target_edition.name(),
                target_version,
                converted_blocks
            ),
            LogSeverity::Info,
        );

        Ok(ConversionResult {
            data,
            format: target_format,
            has_data_loss: false,
            converted_blocks,
        })
    }
}

fn default_format(edition: Edition) -> StructureFormat {
    match edition {
        Edition::Java => StructureFormat::Schem,
        Edition::Bedrock => StructureFormat::Mcstructure,
    }
}

/// Distinct block names in palette order.
fn used_blocks(model: &Schematic) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for state in &model.palette {
        if seen.insert(state.name.as_str()) {
            names.push(state.name.clone());
        }
    }
    names
}

/// Accepts `1.<minor>` or `1.<minor>.<patch>`; anything else, or a minor
/// below 12, is an unsupported version.
fn check_version(version: &str) -> Result<()> {
    let minor = version_minor(version).ok_or_else(|| {
        PortError::UnsupportedVersion(format!("unrecognized Minecraft version `{}`", version))
    })?;
    if minor < MIN_SUPPORTED_MINOR {
        return Err(PortError::UnsupportedVersion(format!(
            "Minecraft {} is below the supported minimum 1.{}",
            version, MIN_SUPPORTED_MINOR
        )));
    }
    Ok(())
}

fn version_minor(version: &str) -> Option<u32> {
    let mut parts = version.trim().split('.');
    if parts.next()? != "1" {
        return None;
    }
    let minor = parts.next()?.parse().ok()?;
    if let Some(patch) = parts.next() {
        patch.parse::<u32>().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(minor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use schemport_model::BlockState;

    fn sample_model() -> Schematic {
        let dimensions = Dimensions::new(2, 2, 2);
        let palette = vec![
            BlockState::new("minecraft:air"),
            BlockState::new("minecraft:stone"),
        ];
        let mut grid = vec![0u32; 8];
        grid[0] = 1;
        grid[1] = 1;
        Schematic::from_dense_grid(dimensions, palette, &grid).unwrap()
    }

    fn sample_schem_bytes() -> Vec<u8> {
        schemport_format::serialize(&sample_model(), StructureFormat::Schem).unwrap()
    }

    fn gateway() -> ConversionGateway {
        ConversionGateway::new(StructureCache::new())
    }

    #[test]
    fn test_version_minor() {
        assert_eq!(version_minor("1.12"), Some(12));
        assert_eq!(version_minor("1.20.4"), Some(20));
        assert_eq!(version_minor("2.0"), None);
        assert_eq!(version_minor("1.x"), None);
        assert_eq!(version_minor("1.20.4.1"), None);
    }

    #[test]
    fn test_parse_then_register_then_export_same_format() {
        let gateway = gateway();
        let bytes = sample_schem_bytes();

        let metadata = gateway.parse_structure(&bytes, "schem").unwrap();
        assert_eq!(metadata.block_count, 2);
        assert_eq!(
            metadata.used_blocks,
            vec!["minecraft:air".to_string(), "minecraft:stone".to_string()]
        );

        gateway.register_parsed_data("abc").unwrap();

        let export = gateway
            .export_structure("abc", "schem", Edition::Java, "1.20")
            .unwrap();
        // Same format: the original upload comes back untouched.
        assert_eq!(export.data, bytes);
        assert!(!export.has_data_loss);
        assert_eq!(export.file_name, "abc.schem");
    }

    #[test]
    fn test_export_cross_format_reserializes() {
        let gateway = gateway();
        gateway
            .parse_structure(&sample_schem_bytes(), "schem")
            .unwrap();
        gateway.register_parsed_data("abc").unwrap();

        let export = gateway
            .export_structure("abc", "mcstructure", Edition::Bedrock, "1.20")
            .unwrap();
        assert_eq!(export.format, StructureFormat::Mcstructure);

        let parsed = schemport_format::parse(&export.data, StructureFormat::Mcstructure).unwrap();
        assert_eq!(parsed.to_dense_grid(), sample_model().to_dense_grid());
    }

    #[test]
    fn test_export_missing_id_is_not_found() {
        let gateway = gateway();
        assert_matches!(
            gateway.export_structure("missing-id", "schem", Edition::Java, "1.20"),
            Err(PortError::NotFound(_))
        );
    }

    #[test]
    fn test_export_unknown_format_is_unsupported_conversion() {
        let gateway = gateway();
        gateway
            .parse_structure(&sample_schem_bytes(), "schem")
            .unwrap();
        gateway.register_parsed_data("abc").unwrap();
        assert_matches!(
            gateway.export_structure("abc", "obj", Edition::Java, "1.20"),
            Err(PortError::UnsupportedConversion(_))
        );
    }

    #[test]
    fn test_register_without_parse_is_not_found() {
        let gateway = gateway();
        assert_matches!(
            gateway.register_parsed_data("abc"),
            Err(PortError::NotFound(_))
        );
    }

    #[test]
    fn test_parse_unknown_format_is_invalid_format() {
        let gateway = gateway();
        assert_matches!(
            gateway.parse_structure(&sample_schem_bytes(), "obj"),
            Err(PortError::InvalidFormat(_))
        );
    }

    #[test]
    fn test_convert_gates_version_before_parsing() {
        let gateway = gateway();
        // Garbage bytes: if the gate ran after parsing this would be a
        // ConversionFailed instead.
        assert_matches!(
            gateway.convert(&[0u8; 64], Edition::Java, "1.11", Edition::Java, "1.20"),
            Err(PortError::UnsupportedVersion(_))
        );
        assert_matches!(
            gateway.convert(&[0u8; 64], Edition::Java, "1.20", Edition::Java, "1.9"),
            Err(PortError::UnsupportedVersion(_))
        );
    }

    #[test]
    fn test_convert_java_to_bedrock() {
        let gateway = gateway();
        let result = gateway
            .convert(
                &sample_schem_bytes(),
                Edition::Java,
                "1.20",
                Edition::Bedrock,
                "1.20",
            )
            .unwrap();
        assert_eq!(result.format, StructureFormat::Mcstructure);
        assert!(!result.has_data_loss);
        assert_eq!(result.converted_blocks, 2);

        let parsed = schemport_format::parse(&result.data, StructureFormat::Mcstructure).unwrap();
        assert_eq!(parsed.to_dense_grid(), sample_model().to_dense_grid());
    }

    #[test]
    fn test_convert_garbage_is_conversion_failed() {
        let gateway = gateway();
        assert_matches!(
            gateway.convert(&[7u8; 64], Edition::Java, "1.20", Edition::Java, "1.20"),
            Err(PortError::ConversionFailed(_))
        );
    }

    #[test]
    fn test_staging_is_last_write_wins() {
        let gateway = gateway();
        let schem = sample_schem_bytes();
        let lite = schemport_format::serialize(&sample_model(), StructureFormat::Litematic).unwrap();

        gateway.parse_structure(&schem, "schem").unwrap();
        gateway.parse_structure(&lite, "litematic").unwrap();
        gateway.register_parsed_data("abc").unwrap();

        let export = gateway
            .export_structure("abc", "litematic", Edition::Java, "1.20")
            .unwrap();
        // The second parse won staging, so this is a same-format passthrough.
        assert_eq!(export.data, lite);
    }
}
