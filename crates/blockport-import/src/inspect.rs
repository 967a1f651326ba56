//! Structural report for schematic files, without decoding any voxels.

use crate::schematic::{classify, nested_container, schematic_root, SchematicFormat};
use blockport_logger::{log, systime, LogSeverity::Info};
use blockport_nbt::{NBTFile, NbtCompression, Tag};
use flate2::read::GzDecoder;
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

/// Extensions picked up when a directory is inspected.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["schem", "schematic", "litematic"];

/// Top-level keys covered by dedicated report fields.
const REPORTED_KEYS: [&str; 6] = ["Palette", "BlockData", "Blocks", "Data", "Regions", "Metadata"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Keys { keys: Vec<String> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegionReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_entities_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionsReport {
    pub width: i64,
    pub height: i64,
    pub length: i64,
    pub total_volume: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaletteEntryReport {
    pub name: String,
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BlockStatsReport {
    Palette {
        total_block_types: usize,
        blocks: Vec<PaletteEntryReport>,
    },
    Classic {
        total_blocks: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchematicReport {
    pub file_name: String,
    pub file_path: String,
    pub file_size: u64,
    pub analysis_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decompressed_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regions: Option<BTreeMap<String, RegionReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<DimensionsReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_stats: Option<BlockStatsReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_data_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile_entities_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, MetadataValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worldedit_metadata: Option<BTreeMap<String, MetadataValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_nbt_keys: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn supported_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Format name for the report. Layouts the decoder does not accept still get
/// a name when they look like a modern variant.
pub fn report_format(root: &Tag) -> &'static str {
    match classify(root) {
        Some(format @ (SchematicFormat::FlatModern | SchematicFormat::NestedModern)) => format.report_name(),
        _ if root.get("BlockData").is_some() || root.get("blocks").is_some() => "modern_alternate",
        Some(format) => format.report_name(),
        None => "unknown",
    }
}

fn scalar_text(tag: &Tag) -> String {
    match tag {
        Tag::String(s) => s.clone(),
        Tag::Float(f) => f.to_string(),
        Tag::Double(d) => d.to_string(),
        Tag::ByteArray(_) | Tag::IntArray(_) | Tag::LongArray(_) | Tag::List(_) => {
            let values: Vec<String> = match tag {
                Tag::List(items) => items.iter().map(scalar_text).collect(),
                _ => tag
                    .to_int_vec()
                    .unwrap_or_default()
                    .iter()
                    .map(i64::to_string)
                    .collect(),
            };
            format!("[{}]", values.join(", "))
        }
        other => other
            .as_number()
            .map(|n| n.to_string())
            .unwrap_or_else(|| other.type_name().to_string()),
    }
}

/// `x x y x z` from a compound with `x`, `y`, `z` fields.
fn format_coordinates(tag: &Tag) -> String {
    if !tag.is_compound() {
        return "unknown".to_string();
    }
    let axis = |key: &str| tag.get(key).map(scalar_text).unwrap_or_else(|| "?".to_string());
    format!("{} x {} x {}", axis("x"), axis("y"), axis("z"))
}

/// Millisecond timestamps get the local date appended.
fn format_timestamp(tag: &Tag) -> String {
    match tag.as_number() {
        Some(millis) => format!("{} ({})", millis, systime::format_local(millis.div_euclid(1000))),
        None => scalar_text(tag),
    }
}

fn compound_keys(tag: &Tag) -> Vec<String> {
    let mut keys: Vec<String> = tag
        .as_compound()
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default();
    keys.sort();
    keys
}

fn metadata_entries(metadata: &Tag, coordinate_key: &str, skip: Option<&str>) -> BTreeMap<String, MetadataValue> {
    let mut entries = BTreeMap::new();
    let Some(map) = metadata.as_compound() else {
        return entries;
    };
    for (key, value) in map {
        if Some(key.as_str()) == skip {
            continue;
        }
        let entry = if key == coordinate_key && value.is_compound() {
            MetadataValue::Text(format_coordinates(value))
        } else if key == "TimeCreated" || key == "TimeModified" {
            MetadataValue::Text(format_timestamp(value))
        } else if value.is_compound() {
            MetadataValue::Keys {
                keys: compound_keys(value),
            }
        } else {
            MetadataValue::Text(scalar_text(value))
        };
        entries.insert(key.clone(), entry);
    }
    entries
}

fn region_report(region: &Tag) -> RegionReport {
    let non_empty = |key: &str| region.get(key).and_then(Tag::array_len).filter(|len| *len > 0);
    RegionReport {
        size: region.get("Size").map(format_coordinates),
        position: region.get("Position").map(format_coordinates),
        block_entities_count: non_empty("BlockEntities").or_else(|| non_empty("TileEntities")),
        entities_count: non_empty("Entities"),
    }
}

fn palette_report(palette: &Tag) -> BlockStatsReport {
    let mut blocks: Vec<PaletteEntryReport> = palette
        .as_compound()
        .map(|map| {
            map.iter()
                .map(|(name, id)| PaletteEntryReport {
                    name: name.clone(),
                    id: id.as_number().unwrap_or(-1),
                })
                .collect()
        })
        .unwrap_or_default();
    blocks.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.name.cmp(&b.name)));
    BlockStatsReport::Palette {
        total_block_types: blocks.len(),
        blocks,
    }
}

fn describe(report: &mut SchematicReport, tree: &Tag) {
    let root = schematic_root(tree);
    let format = report_format(root);
    report.format = Some(format.to_string());

    if format == "litematica" {
        let regions = root
            .get("Regions")
            .and_then(Tag::as_compound)
            .map(|map| {
                map.iter()
                    .map(|(name, region)| (name.clone(), region_report(region)))
                    .collect()
            })
            .unwrap_or_default();
        report.regions = Some(regions);
    } else {
        let dimension = |keys: &[&str]| root.get_any(keys).and_then(Tag::as_number).unwrap_or(0);
        let width = dimension(&["Width", "width"]);
        let height = dimension(&["Height", "height"]);
        let length = dimension(&["Length", "length"]);
        report.dimensions = Some(DimensionsReport {
            width,
            height,
            length,
            total_volume: width.saturating_mul(height).saturating_mul(length),
        });
    }

    match format {
        "modern_worldedit" | "modern_worldedit_nested" => {
            let container = nested_container(root).unwrap_or(root);
            if let Some(palette) = container.get("Palette") {
                report.block_stats = Some(palette_report(palette));
            }
            report.block_data_size = container.get_any(&["BlockData", "Data"]).and_then(Tag::array_len);
        }
        "classic_worldedit" => {
            if let Some(total_blocks) = root.get("Blocks").and_then(Tag::array_len) {
                report.block_stats = Some(BlockStatsReport::Classic { total_blocks });
            }
            report.block_data_size = root.get("Data").and_then(Tag::array_len);
            report.tile_entities_count = root.get("TileEntities").and_then(Tag::array_len);
            report.entities_count = root.get("Entities").and_then(Tag::array_len);
        }
        _ => {}
    }

    if let Some(metadata) = root.get("Metadata") {
        report.metadata = Some(metadata_entries(metadata, "EnclosingSize", Some("WorldEdit")));
        if let Some(worldedit) = metadata.get("WorldEdit") {
            report.worldedit_metadata = Some(metadata_entries(worldedit, "Origin", None));
        }
    }

    let additional: Vec<String> = compound_keys(root)
        .into_iter()
        .filter(|key| !REPORTED_KEYS.contains(&key.as_str()))
        .collect();
    if !additional.is_empty() {
        report.additional_nbt_keys = Some(additional);
    }
}

/// Builds a report from file bytes. Failures are recorded in `error` rather
/// than returned.
pub fn analyze_bytes(bytes: &[u8], path: &Path) -> SchematicReport {
    let mut report = SchematicReport {
        file_name: path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        file_path: path.display().to_string(),
        file_size: bytes.len() as u64,
        analysis_time: systime::now(),
        ..SchematicReport::default()
    };

    let gzipped = NbtCompression::detect(bytes) == NbtCompression::Gzip;
    report.compression = Some(if gzipped { "gzipped" } else { "not gzipped" }.to_string());

    let data = if gzipped {
        let mut data = Vec::new();
        if let Err(e) = GzDecoder::new(bytes).read_to_end(&mut data) {
            report.error = Some(format!("Error decompressing file: {}", e));
            return report;
        }
        report.decompressed_size = Some(data.len());
        data
    } else {
        bytes.to_vec()
    };

    match NBTFile::read(&mut Cursor::new(&data)) {
        Ok(file) => describe(&mut report, &file.root),
        Err(e) => report.error = Some(format!("Error parsing NBT data: {}", e)),
    }
    report
}

pub async fn analyze_file(path: &Path) -> SchematicReport {
    match tokio::fs::read(path).await {
        Ok(bytes) => analyze_bytes(&bytes, path),
        Err(e) => SchematicReport {
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            file_path: path.display().to_string(),
            analysis_time: systime::now(),
            error: Some(format!("Error analyzing file: {}", e)),
            ..SchematicReport::default()
        },
    }
}

/// Supported files directly inside `dir`, sorted by name.
pub async fn supported_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut reader = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = reader.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && supported_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Reports for every supported file in `dir`, analyzed concurrently and
/// returned in file name order.
pub async fn inspect_directory(dir: &Path) -> std::io::Result<Vec<SchematicReport>> {
    let files = supported_files(dir).await?;
    log(format!("Inspecting {} schematic files in {}", files.len(), dir.display()), Info);
    Ok(join_all(files.iter().map(|path| analyze_file(path))).await)
}
