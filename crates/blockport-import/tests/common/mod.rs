#![allow(dead_code)]

use blockport_nbt::{NBTFile, Tag};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const SECTOR: usize = 4096;

pub fn compound(entries: Vec<(&str, Tag)>) -> Tag {
    Tag::Compound(
        entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect::<HashMap<_, _>>(),
    )
}

pub fn palette_entry(name: &str) -> Tag {
    compound(vec![("Name", Tag::String(name.to_string()))])
}

/// 1.18+ section with a `block_states` container.
pub fn section(y: i8, palette: &[&str], data: Option<Vec<i64>>) -> Tag {
    let mut states = vec![(
        "palette",
        Tag::List(palette.iter().map(|name| palette_entry(name)).collect()),
    )];
    if let Some(words) = data {
        states.push(("data", Tag::LongArray(words)));
    }
    compound(vec![("Y", Tag::Byte(y)), ("block_states", compound(states))])
}

pub fn chunk(sections: Vec<Tag>) -> Tag {
    compound(vec![
        ("DataVersion", Tag::Int(3465)),
        ("Status", Tag::String("minecraft:full".to_string())),
        ("sections", Tag::List(sections)),
    ])
}

/// Region file with the given chunks at local slots, zlib compressed.
pub fn region_bytes(chunks: Vec<(usize, usize, Tag)>) -> Vec<u8> {
    let mut data = vec![0u8; 2 * SECTOR];
    for (local_x, local_z, tree) in chunks {
        let mut compressed = Vec::new();
        NBTFile::new(String::new(), tree).write_zlib(&mut compressed).unwrap();

        let mut payload = Vec::with_capacity(compressed.len() + 5);
        payload.extend_from_slice(&(compressed.len() as i32 + 1).to_be_bytes());
        payload.push(2);
        payload.extend_from_slice(&compressed);
        let sectors = payload.len().div_ceil(SECTOR);
        payload.resize(sectors * SECTOR, 0);

        let offset = data.len() / SECTOR;
        let slot = 4 * (local_x + local_z * 32);
        data[slot..slot + 3].copy_from_slice(&(offset as u32).to_be_bytes()[1..]);
        data[slot + 3] = sectors as u8;
        data.extend_from_slice(&payload);
    }
    data
}

pub fn gzipped(root: Tag) -> Vec<u8> {
    let mut bytes = Vec::new();
    NBTFile::new(String::new(), root).write_gzip(&mut bytes).unwrap();
    bytes
}

pub fn level_dat(name: &str) -> Vec<u8> {
    gzipped(compound(vec![(
        "Data",
        compound(vec![("LevelName", Tag::String(name.to_string()))]),
    )]))
}

pub fn zip_bytes(entries: Vec<(&str, Vec<u8>)>) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, data) in entries {
        writer.start_file(name, options).unwrap();
        writer.write_all(&data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Flat modern schematic: palette name->index and one varint byte per voxel.
pub fn flat_schematic(width: i16, height: i16, length: i16, palette: &[(&str, i32)], data: Vec<i8>) -> Tag {
    compound(vec![
        ("Version", Tag::Int(2)),
        ("Width", Tag::Short(width)),
        ("Height", Tag::Short(height)),
        ("Length", Tag::Short(length)),
        (
            "Palette",
            compound(palette.iter().map(|(name, index)| (*name, Tag::Int(*index))).collect()),
        ),
        ("BlockData", Tag::ByteArray(data)),
    ])
}
