//! Palette and packed block-state decoding for chunk sections.
//!
//! A section is a 16x16x16 cube. Its states are indices into a palette,
//! stored either one per voxel, or bit-packed into 64-bit words. Voxel order
//! is `y * 256 + z * 16 + x`.
//!
//! Two packing layouts exist. The aligned one keeps `64 / bits` entries per
//! word and never splits an entry between words. The spanning one writes
//! entries back to back across word boundaries. Which one a section uses is
//! decided from the word count.

use crate::identifier::{is_air, palette_entry_name};
use crate::legacy::legacy_block_name;
use crate::sections::{find_sections, section_y};
use blockport_common::VoxelCoordinate;
use blockport_nbt::Tag;

pub const SECTION_SIDE: usize = 16;
pub const SECTION_VOLUME: usize = SECTION_SIDE * SECTION_SIDE * SECTION_SIDE;
pub const MIN_BITS_PER_ENTRY: u32 = 4;

/// Smallest `b` with `2^b >= n`. Zero for `n <= 1`.
pub fn ceil_log2(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        usize::BITS - (n - 1).leading_zeros()
    }
}

/// Bits per packed entry for a palette of `palette_len` entries.
pub fn bits_per_entry(palette_len: usize) -> u32 {
    bits_with_minimum(palette_len, MIN_BITS_PER_ENTRY)
}

pub fn bits_with_minimum(palette_len: usize, minimum: u32) -> u32 {
    ceil_log2(palette_len).max(minimum)
}

pub fn aligned_word_count(count: usize, bits: u32) -> usize {
    let per_word = (64 / bits) as usize;
    count.div_ceil(per_word)
}

pub fn spanning_word_count(count: usize, bits: u32) -> usize {
    (count * bits as usize).div_ceil(64)
}

fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Unpacks up to `count` entries from the aligned layout. Stops early when the
/// words run out.
pub fn unpack_aligned(words: &[i64], bits: u32, count: usize) -> Vec<usize> {
    let per_word = (64 / bits) as usize;
    let mask = mask(bits);
    let mut indices = Vec::with_capacity(count.min(words.len().saturating_mul(per_word)));
    for i in 0..count {
        let Some(&word) = words.get(i / per_word) else {
            break;
        };
        let shift = (i % per_word) as u32 * bits;
        indices.push(((word as u64 >> shift) & mask) as usize);
    }
    indices
}

pub fn pack_aligned(indices: &[usize], bits: u32) -> Vec<i64> {
    let per_word = (64 / bits) as usize;
    let mask = mask(bits);
    let mut words = vec![0u64; aligned_word_count(indices.len(), bits)];
    for (i, &index) in indices.iter().enumerate() {
        let shift = (i % per_word) as u32 * bits;
        words[i / per_word] |= (index as u64 & mask) << shift;
    }
    words.into_iter().map(|w| w as i64).collect()
}

/// Unpacks up to `count` entries from the spanning layout.
pub fn unpack_spanning(words: &[i64], bits: u32, count: usize) -> Vec<usize> {
    let mask = mask(bits);
    let bits = bits as usize;
    let mut indices = Vec::with_capacity(count.min(words.len().saturating_mul(64) / bits));
    for i in 0..count {
        let start_bit = i * bits;
        let word_index = start_bit / 64;
        let bit_offset = start_bit % 64;
        let Some(&word) = words.get(word_index) else {
            break;
        };
        let mut value = (word as u64) >> bit_offset;
        if bit_offset + bits > 64 {
            let Some(&next) = words.get(word_index + 1) else {
                break;
            };
            value |= (next as u64) << (64 - bit_offset);
        }
        indices.push((value & mask) as usize);
    }
    indices
}

pub fn pack_spanning(indices: &[usize], bits: u32) -> Vec<i64> {
    let mask = mask(bits);
    let bits = bits as usize;
    let mut words = vec![0u64; spanning_word_count(indices.len(), bits as u32)];
    for (i, &index) in indices.iter().enumerate() {
        let value = index as u64 & mask;
        let start_bit = i * bits;
        let word_index = start_bit / 64;
        let bit_offset = start_bit % 64;
        words[word_index] |= value << bit_offset;
        if bit_offset + bits > 64 {
            words[word_index + 1] |= value >> (64 - bit_offset);
        }
    }
    words.into_iter().map(|w| w as i64).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackingLayout {
    Aligned,
    Spanning,
}

/// Chunk sections: aligned first, spanning when only its word count fits.
pub const SECTION_LAYOUTS: [(PackingLayout, u32); 2] = [
    (PackingLayout::Aligned, MIN_BITS_PER_ENTRY),
    (PackingLayout::Spanning, MIN_BITS_PER_ENTRY),
];

impl PackingLayout {
    pub fn word_count(&self, count: usize, bits: u32) -> usize {
        match self {
            PackingLayout::Aligned => aligned_word_count(count, bits),
            PackingLayout::Spanning => spanning_word_count(count, bits),
        }
    }

    pub fn unpack(&self, words: &[i64], bits: u32, count: usize) -> Vec<usize> {
        match self {
            PackingLayout::Aligned => unpack_aligned(words, bits, count),
            PackingLayout::Spanning => unpack_spanning(words, bits, count),
        }
    }
}

/// Unpacks with the first `(layout, minimum bits)` candidate whose expected
/// word count matches `words`. Falls back to a partial read with the first
/// candidate when nothing matches exactly.
pub fn unpack_indices(
    words: &[i64],
    palette_len: usize,
    count: usize,
    candidates: &[(PackingLayout, u32)],
) -> Vec<usize> {
    for &(layout, minimum) in candidates {
        let bits = bits_with_minimum(palette_len, minimum);
        if words.len() == layout.word_count(count, bits) {
            return layout.unpack(words, bits, count);
        }
    }
    let (layout, minimum) = candidates
        .first()
        .copied()
        .unwrap_or((PackingLayout::Aligned, MIN_BITS_PER_ENTRY));
    layout.unpack(words, bits_with_minimum(palette_len, minimum), count)
}

/// Block states of one section, before palette lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockStates {
    /// No state array and a single-entry palette: the whole section is that block.
    Uniform,
    /// One palette index per voxel.
    PerVoxel(Vec<usize>),
}

/// A section reduced to a palette plus a state layout.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSection {
    pub section_y: i32,
    pub palette: Vec<String>,
    pub states: BlockStates,
}

impl DecodedSection {
    /// Palette name at a local voxel index, if the index resolves.
    pub fn block_at(&self, index: usize) -> Option<&str> {
        let palette_index = match &self.states {
            BlockStates::Uniform => 0,
            BlockStates::PerVoxel(indices) => *indices.get(index)?,
        };
        self.palette.get(palette_index).map(String::as_str)
    }
}

/// Why a section produced no voxels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionSkip {
    MissingY,
    EmptyPalette,
    MissingStates,
}

/// Index of a local position inside a section.
pub fn section_index(x: usize, y: usize, z: usize) -> usize {
    y * SECTION_SIDE * SECTION_SIDE + z * SECTION_SIDE + x
}

fn decode_palette(palette: &Tag) -> Vec<String> {
    palette
        .as_list()
        .map(|entries| {
            entries
                .iter()
                .map(|entry| palette_entry_name(entry).unwrap_or_default())
                .collect()
        })
        .unwrap_or_default()
}

fn decode_states(data: Option<&Tag>, palette_len: usize) -> Option<BlockStates> {
    let values = data.and_then(Tag::to_int_vec).filter(|values| !values.is_empty());
    let Some(values) = values else {
        return (palette_len == 1).then_some(BlockStates::Uniform);
    };

    if values.len() == SECTION_VOLUME && !matches!(data, Some(Tag::LongArray(_))) {
        let indices = values
            .into_iter()
            .map(|v| usize::try_from(v).unwrap_or(usize::MAX))
            .collect();
        return Some(BlockStates::PerVoxel(indices));
    }

    Some(BlockStates::PerVoxel(unpack_indices(
        &values,
        palette_len,
        SECTION_VOLUME,
        &SECTION_LAYOUTS,
    )))
}

/// Pre-flattening sections: byte ids, a nibble data array and optional
/// `Add` high nibbles.
fn decode_legacy_section(section: &Tag, section_y: i32) -> Option<DecodedSection> {
    let blocks = section.get("Blocks")?.to_int_vec()?;
    let data = section.get("Data").and_then(Tag::to_int_vec).unwrap_or_default();
    let add = section.get("Add").and_then(Tag::to_int_vec).unwrap_or_default();

    let mut palette: Vec<String> = Vec::new();
    let mut lookup = std::collections::HashMap::new();
    let mut indices = Vec::with_capacity(blocks.len());
    for (i, &low) in blocks.iter().enumerate() {
        let id = low as u16 | (nibble(&add, i) as u16) << 8;
        let name = legacy_block_name(id, nibble(&data, i));
        let index = *lookup.entry(name.clone()).or_insert_with(|| {
            palette.push(name);
            palette.len() - 1
        });
        indices.push(index);
    }

    Some(DecodedSection {
        section_y,
        palette,
        states: BlockStates::PerVoxel(indices),
    })
}

/// Half-byte at `index` of a nibble array, low half first.
pub fn nibble(values: &[i64], index: usize) -> u8 {
    match values.get(index / 2) {
        Some(&byte) if index % 2 == 0 => (byte & 0x0f) as u8,
        Some(&byte) => ((byte >> 4) & 0x0f) as u8,
        None => 0,
    }
}

/// Reads one section record in any of the supported layouts.
pub fn decode_section(section: &Tag) -> Result<DecodedSection, SectionSkip> {
    let section_y = section_y(section).ok_or(SectionSkip::MissingY)?;

    // 1.18+: block_states { palette, data }
    // 1.13-1.17: Palette + BlockStates on the section itself
    let (palette_tag, data_tag) = match section.get("block_states") {
        Some(container) => (container.get("palette"), container.get("data")),
        None => (
            section.get_any(&["Palette", "palette"]),
            section.get_any(&["BlockStates", "data"]),
        ),
    };

    let Some(palette_tag) = palette_tag else {
        if section.get("Blocks").is_some() {
            return decode_legacy_section(section, section_y).ok_or(SectionSkip::MissingStates);
        }
        return Err(SectionSkip::EmptyPalette);
    };

    let palette = decode_palette(palette_tag);
    if palette.is_empty() {
        return Err(SectionSkip::EmptyPalette);
    }
    let states = decode_states(data_tag, palette.len()).ok_or(SectionSkip::MissingStates)?;
    Ok(DecodedSection {
        section_y,
        palette,
        states,
    })
}

/// Counters for one decoded chunk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSummary {
    pub sections: usize,
    pub skipped_sections: usize,
    pub emitted: usize,
}

/// Walks every section of a chunk tree in ascending Y and calls `emit` with
/// the world position and source name of each non-air voxel.
pub fn decode_chunk_blocks<F>(root: &Tag, chunk_x: i32, chunk_z: i32, mut emit: F) -> ChunkSummary
where
    F: FnMut(VoxelCoordinate, &str),
{
    let mut summary = ChunkSummary::default();
    let Some(sections) = find_sections(root) else {
        return summary;
    };

    let mut decoded: Vec<DecodedSection> = sections
        .iter()
        .filter_map(|section| match decode_section(section) {
            Ok(decoded) => Some(decoded),
            Err(_) => {
                summary.skipped_sections += 1;
                None
            }
        })
        .collect();
    decoded.sort_by_key(|section| section.section_y);
    summary.sections = decoded.len();

    for section in &decoded {
        // Skip air-only palettes without touching every voxel.
        if section.palette.iter().all(|name| name.is_empty() || is_air(name)) {
            continue;
        }
        let air: Vec<bool> = section.palette.iter().map(|name| name.is_empty() || is_air(name)).collect();
        let base_y = section.section_y * SECTION_SIDE as i32;

        for y in 0..SECTION_SIDE {
            for z in 0..SECTION_SIDE {
                for x in 0..SECTION_SIDE {
                    let index = section_index(x, y, z);
                    let palette_index = match &section.states {
                        BlockStates::Uniform => 0,
                        BlockStates::PerVoxel(indices) => match indices.get(index) {
                            Some(&i) => i,
                            None => continue,
                        },
                    };
                    let Some(name) = section.palette.get(palette_index) else {
                        continue;
                    };
                    if air[palette_index] {
                        continue;
                    }
                    let position = VoxelCoordinate::new(
                        chunk_x * SECTION_SIDE as i32 + x as i32,
                        base_y + y as i32,
                        chunk_z * SECTION_SIDE as i32 + z as i32,
                    );
                    emit(position, name);
                    summary.emitted += 1;
                }
            }
        }
    }
    summary
}
