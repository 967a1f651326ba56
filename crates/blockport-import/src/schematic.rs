//! Schematic structure files.
//!
//! Four layouts are recognised. The shape of the tree is classified once by
//! [`classify`], then each layout is decoded into the same
//! [`SchematicDocument`]: one or more volumes with dimensions, an origin, a
//! palette and one palette index per voxel in `y, z, x` order.

use crate::identifier::palette_entry_name;
use crate::legacy::legacy_block_name;
use crate::palette::{nibble, unpack_indices, PackingLayout, MIN_BITS_PER_ENTRY};
use blockport_common::{BlockportError, Result, VoxelCoordinate};
use blockport_nbt::Tag;
use serde::{Serialize, Serializer};
use std::collections::HashMap;

/// Name of the wrapper compound newer writers put around the whole document.
pub const ROOT_WRAPPER: &str = "Schematic";

/// Region states follow the chunk-section rule first. The two-bit layouts
/// Litematica writes are accepted when only their word count fits.
pub const REGION_LAYOUTS: [(PackingLayout, u32); 4] = [
    (PackingLayout::Aligned, MIN_BITS_PER_ENTRY),
    (PackingLayout::Spanning, MIN_BITS_PER_ENTRY),
    (PackingLayout::Spanning, 2),
    (PackingLayout::Aligned, 2),
];

/// Largest region, in voxels, decoded into memory.
pub const MAX_REGION_VOLUME: usize = 1 << 27;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchematicFormat {
    /// Top-level name->index `Palette` with a `BlockData` array.
    FlatModern,
    /// `Blocks { Palette, Data }` under the root.
    NestedModern,
    /// Numeric `Blocks` and `Data` byte arrays.
    Classic,
    /// Named `Regions`, each with its own size, palette and packed states.
    MultiRegion,
}

impl SchematicFormat {
    /// Format name used in inspection reports.
    pub fn report_name(&self) -> &'static str {
        match self {
            SchematicFormat::FlatModern => "modern_worldedit",
            SchematicFormat::NestedModern => "modern_worldedit_nested",
            SchematicFormat::Classic => "classic_worldedit",
            SchematicFormat::MultiRegion => "litematica",
        }
    }
}

impl Serialize for SchematicFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.report_name())
    }
}

/// Unwraps the optional `Schematic` compound.
pub fn schematic_root(root: &Tag) -> &Tag {
    match root.get(ROOT_WRAPPER) {
        Some(inner) if inner.is_compound() => inner,
        _ => root,
    }
}

/// Classifies an (already unwrapped) document root.
pub fn classify(root: &Tag) -> Option<SchematicFormat> {
    let has = |key: &str| root.get(key).is_some();

    if root.get("Palette").is_some_and(Tag::is_compound) && has("BlockData") {
        return Some(SchematicFormat::FlatModern);
    }
    if nested_container(root).is_some() {
        return Some(SchematicFormat::NestedModern);
    }
    if root.get("Blocks").and_then(Tag::array_len).is_some() && has("Data") {
        return Some(SchematicFormat::Classic);
    }
    if root.get("Regions").is_some_and(Tag::is_compound) {
        return Some(SchematicFormat::MultiRegion);
    }
    None
}

pub(crate) fn nested_container(root: &Tag) -> Option<&Tag> {
    ["Blocks", "BlockData"]
        .iter()
        .filter_map(|key| root.get(key))
        .find(|tag| tag.is_compound() && tag.get("Palette").is_some())
}

/// One box of voxels with its own palette.
#[derive(Debug, Clone, PartialEq)]
pub struct SchematicVolume {
    pub name: Option<String>,
    pub width: usize,
    pub height: usize,
    pub length: usize,
    /// Offset declared by the file, or the minimum corner of a region.
    pub origin: VoxelCoordinate,
    pub palette: Vec<String>,
    pub indices: Vec<usize>,
}

impl SchematicVolume {
    pub fn volume(&self) -> usize {
        self.width.saturating_mul(self.height).saturating_mul(self.length)
    }

    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        y * self.width * self.length + z * self.width + x
    }

    pub fn block_at(&self, x: usize, y: usize, z: usize) -> Option<&str> {
        let palette_index = *self.indices.get(self.index(x, y, z))?;
        self.palette
            .get(palette_index)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    /// Visits every voxel with a resolvable palette entry, `y` outermost.
    /// Voxels past the end of the decoded indices are never visited.
    pub fn for_each_block<F>(&self, mut visit: F)
    where
        F: FnMut(VoxelCoordinate, &str),
    {
        let layer = self.width * self.length;
        if layer == 0 {
            return;
        }
        for (i, &palette_index) in self.indices.iter().take(self.volume()).enumerate() {
            let Some(name) = self.palette.get(palette_index).filter(|name| !name.is_empty()) else {
                continue;
            };
            let (y, rest) = (i / layer, i % layer);
            let (z, x) = (rest / self.width, rest % self.width);
            visit(VoxelCoordinate::new(x as i32, y as i32, z as i32), name);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchematicDocument {
    pub format: SchematicFormat,
    pub volumes: Vec<SchematicVolume>,
    /// Corner the centering is measured from. The origin for single-volume
    /// documents, the minimum region corner otherwise.
    pub anchor: VoxelCoordinate,
    pub width: usize,
    pub height: usize,
    pub length: usize,
}

/// Decodes a parsed tree. Fails with `UnsupportedFormat` when no layout matches.
pub fn decode_schematic(root: &Tag) -> Result<SchematicDocument> {
    let root = schematic_root(root);
    let format = classify(root).ok_or_else(|| {
        let mut keys: Vec<&String> = root.as_compound().map(|m| m.keys().collect()).unwrap_or_default();
        keys.sort();
        BlockportError::UnsupportedFormat(format!("no known schematic layout (top-level keys: {:?})", keys))
    })?;

    match format {
        SchematicFormat::FlatModern => {
            let volume = decode_modern(root, root)?;
            Ok(single_volume(format, volume))
        }
        SchematicFormat::NestedModern => {
            let container = nested_container(root)
                .ok_or_else(|| BlockportError::DecodeError("nested block container vanished".to_string()))?;
            let volume = decode_modern(root, container)?;
            Ok(single_volume(format, volume))
        }
        SchematicFormat::Classic => Ok(single_volume(format, decode_classic(root)?)),
        SchematicFormat::MultiRegion => decode_regions(root),
    }
}

fn single_volume(format: SchematicFormat, volume: SchematicVolume) -> SchematicDocument {
    SchematicDocument {
        format,
        anchor: VoxelCoordinate::ORIGIN,
        width: volume.width,
        height: volume.height,
        length: volume.length,
        volumes: vec![volume],
    }
}

fn dimension(root: &Tag, keys: &[&str]) -> usize {
    root.get_any(keys)
        .and_then(Tag::as_number)
        .map(|n| n as u16 as usize)
        .unwrap_or(0)
}

fn dimensions(root: &Tag) -> (usize, usize, usize) {
    (
        dimension(root, &["Width", "width"]),
        dimension(root, &["Height", "height"]),
        dimension(root, &["Length", "length"]),
    )
}

fn int_field(tag: &Tag, key: &str) -> i32 {
    tag.get(key).and_then(Tag::as_number).unwrap_or(0) as i32
}

/// `Offset` int array, else `WEOffsetX/Y/Z` at the root or in `Metadata`.
fn declared_offset(root: &Tag) -> VoxelCoordinate {
    if let Some(values) = root.get("Offset").and_then(Tag::to_int_vec) {
        if values.len() >= 3 {
            return VoxelCoordinate::new(values[0] as i32, values[1] as i32, values[2] as i32);
        }
    }
    for holder in [Some(root), root.get("Metadata")].into_iter().flatten() {
        if holder.get("WEOffsetX").is_some() {
            return VoxelCoordinate::new(
                int_field(holder, "WEOffsetX"),
                int_field(holder, "WEOffsetY"),
                int_field(holder, "WEOffsetZ"),
            );
        }
    }
    VoxelCoordinate::ORIGIN
}

/// Turns a name->index palette into an index->name one. Gaps stay empty.
pub fn invert_palette(palette: &Tag) -> Vec<String> {
    let Some(map) = palette.as_compound() else {
        return Vec::new();
    };
    let entries: Vec<(usize, &String)> = map
        .iter()
        .filter_map(|(name, index)| {
            let index = index.as_number()?;
            usize::try_from(index).ok().map(|i| (i, name))
        })
        .collect();
    let size = entries.iter().map(|(i, _)| i + 1).max().unwrap_or(0);
    let mut names = vec![String::new(); size];
    for (index, name) in entries {
        names[index] = name.clone();
    }
    names
}

/// Decodes unsigned LEB128 varints. `None` on a dangling continuation bit.
pub fn decode_varints(bytes: &[i64]) -> Option<Vec<usize>> {
    let mut values = Vec::with_capacity(bytes.len());
    let mut value = 0usize;
    let mut shift = 0u32;
    for &byte in bytes {
        let byte = byte as u8;
        if shift >= usize::BITS {
            return None;
        }
        value |= ((byte & 0x7f) as usize) << shift;
        if byte & 0x80 == 0 {
            values.push(value);
            value = 0;
            shift = 0;
        } else {
            shift += 7;
        }
    }
    (shift == 0).then_some(values)
}

fn block_indices(data: &Tag, volume: usize) -> Vec<usize> {
    match data {
        Tag::ByteArray(_) => {
            let bytes = data.to_int_vec().unwrap_or_default();
            match decode_varints(&bytes) {
                Some(values) if values.len() == volume => values,
                _ if bytes.len() == volume => bytes.into_iter().map(|b| b as usize).collect(),
                Some(values) => values,
                None => Vec::new(),
            }
        }
        other => other
            .to_int_vec()
            .unwrap_or_default()
            .into_iter()
            .map(|v| usize::try_from(v).unwrap_or(usize::MAX))
            .collect(),
    }
}

fn decode_modern(root: &Tag, container: &Tag) -> Result<SchematicVolume> {
    let (width, height, length) = dimensions(root);
    let palette = container.get("Palette").map(invert_palette).unwrap_or_default();
    let data = container
        .get_any(&["BlockData", "Data"])
        .ok_or_else(|| BlockportError::DecodeError("schematic has no block data".to_string()))?;
    let indices = block_indices(data, width * height * length);

    Ok(SchematicVolume {
        name: None,
        width,
        height,
        length,
        origin: declared_offset(root),
        palette,
        indices,
    })
}

/// Id table some writers embed: `SchematicaMapping` (name -> id) or
/// `BlockIDs` (id -> name).
fn embedded_id_table(root: &Tag) -> HashMap<u16, String> {
    let mut table = HashMap::new();
    if let Some(mapping) = root.get("SchematicaMapping").and_then(Tag::as_compound) {
        for (name, id) in mapping {
            if let Some(id) = id.as_number() {
                table.insert(id as u16, name.clone());
            }
        }
    }
    if let Some(ids) = root.get("BlockIDs").and_then(Tag::as_compound) {
        for (id, name) in ids {
            if let (Ok(id), Some(name)) = (id.parse::<u16>(), name.as_string()) {
                table.insert(id, name.clone());
            }
        }
    }
    table
}

fn decode_classic(root: &Tag) -> Result<SchematicVolume> {
    let (width, height, length) = dimensions(root);
    let blocks = root
        .get("Blocks")
        .and_then(Tag::to_int_vec)
        .ok_or_else(|| BlockportError::DecodeError("classic schematic has no Blocks array".to_string()))?;
    let data = root.get("Data").and_then(Tag::to_int_vec).unwrap_or_default();
    let add = root
        .get_any(&["AddBlocks", "Add"])
        .and_then(Tag::to_int_vec)
        .unwrap_or_default();
    let id_table = embedded_id_table(root);

    let mut palette: Vec<String> = Vec::new();
    let mut lookup: HashMap<(u16, u8), usize> = HashMap::new();
    let mut indices = Vec::with_capacity(blocks.len());
    for (i, &low) in blocks.iter().enumerate() {
        let id = low as u16 | (nibble(&add, i) as u16) << 8;
        let meta = data.get(i).map(|&d| (d & 0x0f) as u8).unwrap_or(0);
        let index = *lookup.entry((id, meta)).or_insert_with(|| {
            let name = match id_table.get(&id) {
                Some(name) => name.clone(),
                None => legacy_block_name(id, meta),
            };
            palette.push(name);
            palette.len() - 1
        });
        indices.push(index);
    }

    Ok(SchematicVolume {
        name: None,
        width,
        height,
        length,
        origin: declared_offset(root),
        palette,
        indices,
    })
}

/// Signed extent along one axis: length and the offset of the minimum corner
/// from `Position`. Negative sizes grow toward the negative axis.
fn extent(size: i32) -> (usize, i32) {
    if size < 0 {
        (size.unsigned_abs() as usize, size + 1)
    } else {
        (size as usize, 0)
    }
}

fn region_error(name: &str, reason: &str) -> BlockportError {
    BlockportError::DecodeError(format!("region {:?}: {}", name, reason))
}

fn decode_region(name: &str, region: &Tag) -> Result<SchematicVolume> {
    let empty = Tag::Compound(HashMap::new());
    let size = region.get("Size").unwrap_or(&empty);
    let position = region.get("Position").unwrap_or(&empty);

    let (width, dx) = extent(int_field(size, "x"));
    let (height, dy) = extent(int_field(size, "y"));
    let (length, dz) = extent(int_field(size, "z"));
    let corner = |axis: &str, delta: i32| {
        int_field(position, axis)
            .checked_add(delta)
            .ok_or_else(|| region_error(name, "position out of range"))
    };
    let origin = VoxelCoordinate::new(corner("x", dx)?, corner("y", dy)?, corner("z", dz)?);

    let count = width
        .checked_mul(height)
        .and_then(|area| area.checked_mul(length))
        .filter(|&count| count <= MAX_REGION_VOLUME)
        .ok_or_else(|| region_error(name, &format!("size {}x{}x{} is too large", width, height, length)))?;

    let palette: Vec<String> = region
        .get("BlockStatePalette")
        .and_then(Tag::as_list)
        .map(|entries| {
            entries
                .iter()
                .map(|entry| palette_entry_name(entry).unwrap_or_default())
                .collect()
        })
        .unwrap_or_default();
    let words = region
        .get("BlockStates")
        .and_then(Tag::to_int_vec)
        .unwrap_or_default();

    let indices = if palette.len() == 1 && words.is_empty() {
        vec![0; count]
    } else {
        unpack_indices(&words, palette.len(), count, &REGION_LAYOUTS)
    };

    Ok(SchematicVolume {
        name: Some(name.to_string()),
        width,
        height,
        length,
        origin,
        palette,
        indices,
    })
}

fn decode_regions(root: &Tag) -> Result<SchematicDocument> {
    let regions = root
        .get("Regions")
        .and_then(Tag::as_compound)
        .ok_or_else(|| BlockportError::DecodeError("Regions is not a compound".to_string()))?;

    let mut names: Vec<&String> = regions.keys().collect();
    names.sort();
    let volumes = names
        .into_iter()
        .filter(|name| regions[*name].is_compound())
        .map(|name| decode_region(name, &regions[name]))
        .collect::<Result<Vec<SchematicVolume>>>()?;

    // far corners can pass i32::MAX, so the union is measured in i64
    let mut min = [0i64; 3];
    let mut max = [0i64; 3];
    for (i, volume) in volumes.iter().enumerate() {
        let near = [volume.origin.x as i64, volume.origin.y as i64, volume.origin.z as i64];
        let sizes = [volume.width as i64, volume.height as i64, volume.length as i64];
        for axis in 0..3 {
            let far = near[axis] + sizes[axis];
            if i == 0 {
                min[axis] = near[axis];
                max[axis] = far;
            } else {
                min[axis] = min[axis].min(near[axis]);
                max[axis] = max[axis].max(far);
            }
        }
    }

    Ok(SchematicDocument {
        format: SchematicFormat::MultiRegion,
        volumes,
        anchor: VoxelCoordinate::new(min[0] as i32, min[1] as i32, min[2] as i32),
        width: (max[0] - min[0]) as usize,
        height: (max[1] - min[1]) as usize,
        length: (max[2] - min[2]) as usize,
    })
}
