//! Region file reader.
//!
//! A region holds a 32x32 grid of chunks. The first 4096 bytes are the
//! location table: one 4-byte entry per chunk at `4 * (x + z * 32)`, made of
//! a 3-byte big-endian sector offset and a 1-byte sector count. Sectors are
//! 4096 bytes. A chunk payload starts with a 4-byte big-endian length, then a
//! 1-byte compression tag, then `length - 1` bytes of compressed tree.

use crate::decompress::{decode_tree, decompress, ChunkCompression, HEADER_SKIP};
use blockport_common::{BlockportError, Result};
use blockport_logger::{log, LogSeverity::Debug};
use blockport_nbt::{NBTFile, Tag};
use byteorder::{BigEndian, ReadBytesExt};
use std::fmt;
use std::io::Cursor;
use std::ops::Range;

pub const SECTOR_SIZE: usize = 4096;
pub const CHUNKS_PER_AXIS: usize = 32;
pub const CHUNK_COUNT: usize = CHUNKS_PER_AXIS * CHUNKS_PER_AXIS;
const LOCATION_TABLE_SIZE: usize = CHUNK_COUNT * 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLocation {
    /// Offset in sectors from the start of the file. Zero means absent.
    pub sector_offset: u32,
    pub sector_count: u8,
}

impl ChunkLocation {
    pub fn is_present(&self) -> bool {
        self.sector_offset != 0
    }

    pub fn byte_offset(&self) -> usize {
        self.sector_offset as usize * SECTOR_SIZE
    }
}

/// Where a slot's compressed payload lives, before any decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkSlot {
    Absent,
    Payload { range: Range<usize>, compression: u8 },
    Invalid(String),
}

/// Outcome of reading one chunk slot.
#[derive(Debug)]
pub enum ChunkRead {
    Absent,
    Loaded(Tag),
    /// The slot points at data that could not be read or decoded.
    Skipped(String),
}

/// Borrowed view over the bytes of one region file.
pub struct RegionFile<'a> {
    data: &'a [u8],
    region_x: i32,
    region_z: i32,
}

impl fmt::Debug for RegionFile<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionFile")
            .field("region_x", &self.region_x)
            .field("region_z", &self.region_z)
            .field("len", &self.data.len())
            .finish()
    }
}

impl<'a> RegionFile<'a> {
    pub fn new(data: &'a [u8], region_x: i32, region_z: i32) -> Result<Self> {
        if data.len() < LOCATION_TABLE_SIZE {
            return Err(BlockportError::DecodeError(format!(
                "region file too small for its location table ({} bytes)",
                data.len()
            )));
        }
        Ok(RegionFile {
            data,
            region_x,
            region_z,
        })
    }

    pub fn region_x(&self) -> i32 {
        self.region_x
    }

    pub fn region_z(&self) -> i32 {
        self.region_z
    }

    pub fn location(&self, local_x: usize, local_z: usize) -> ChunkLocation {
        let index = 4 * (local_x + local_z * CHUNKS_PER_AXIS);
        let mut cursor = Cursor::new(&self.data[index..index + 4]);
        // The slice is exactly four bytes long, so these reads cannot fail.
        let sector_offset = cursor.read_u24::<BigEndian>().unwrap_or(0);
        let sector_count = cursor.read_u8().unwrap_or(0);
        ChunkLocation {
            sector_offset,
            sector_count,
        }
    }

    /// Local slot coordinates in `(z, x)` order.
    pub fn slots(&self) -> impl Iterator<Item = (usize, usize)> {
        (0..CHUNKS_PER_AXIS)
            .flat_map(|z| (0..CHUNKS_PER_AXIS).map(move |x| (x, z)))
    }

    pub fn present_chunk_count(&self) -> usize {
        self.slots()
            .filter(|&(x, z)| self.location(x, z).is_present())
            .count()
    }

    /// Absolute chunk coordinates of a local slot.
    pub fn chunk_coords(&self, local_x: usize, local_z: usize) -> (i32, i32) {
        (
            self.region_x * CHUNKS_PER_AXIS as i32 + local_x as i32,
            self.region_z * CHUNKS_PER_AXIS as i32 + local_z as i32,
        )
    }

    /// Bounds-checks one slot without decoding it.
    pub fn locate_chunk(&self, local_x: usize, local_z: usize) -> ChunkSlot {
        let location = self.location(local_x, local_z);
        if !location.is_present() {
            return ChunkSlot::Absent;
        }

        let start = location.byte_offset();
        if start + 5 > self.data.len() {
            return ChunkSlot::Invalid(format!(
                "chunk starts at byte {} past end of file ({} bytes)",
                start,
                self.data.len()
            ));
        }

        let mut cursor = Cursor::new(&self.data[start..start + 5]);
        let length = cursor.read_i32::<BigEndian>().unwrap_or(0);
        let compression = cursor.read_u8().unwrap_or(0);
        if length <= 0 {
            return ChunkSlot::Invalid(format!("invalid chunk length {}", length));
        }

        let end = start + 4 + length as usize;
        if end > self.data.len() {
            return ChunkSlot::Invalid(format!(
                "chunk data truncated: needs {} bytes, file has {}",
                end,
                self.data.len()
            ));
        }

        ChunkSlot::Payload {
            range: start + 5..end,
            compression,
        }
    }

    pub fn read_chunk(&self, local_x: usize, local_z: usize) -> ChunkRead {
        match self.locate_chunk(local_x, local_z) {
            ChunkSlot::Absent => ChunkRead::Absent,
            ChunkSlot::Invalid(reason) => ChunkRead::Skipped(reason),
            ChunkSlot::Payload { range, compression } => match decode_chunk(&self.data[range], compression) {
                Ok(tag) => ChunkRead::Loaded(tag),
                Err(e) => ChunkRead::Skipped(e.to_string()),
            },
        }
    }
}

fn parse_tree(bytes: &[u8]) -> std::io::Result<Tag> {
    NBTFile::read(&mut Cursor::new(bytes)).map(|file| file.root)
}

/// Decodes one chunk payload. The declared method is tried first, then again
/// past a short foreign header, then the generic strategy chain.
pub fn decode_chunk(payload: &[u8], compression: u8) -> Result<Tag> {
    let Some(method) = ChunkCompression::from_byte(compression) else {
        log(
            format!("Unknown chunk compression tag {}, probing payload", compression),
            Debug,
        );
        return decode_tree(payload).map(|(tag, _)| tag);
    };

    match decompress(payload, method).and_then(|bytes| parse_tree(&bytes)) {
        Ok(tag) => return Ok(tag),
        Err(e) => log(
            format!("{:?} chunk failed to decode ({}), retrying past header", method, e),
            Debug,
        ),
    }

    if payload.len() > HEADER_SKIP {
        if let Ok(tag) =
            decompress(&payload[HEADER_SKIP..], method).and_then(|bytes| parse_tree(&bytes))
        {
            return Ok(tag);
        }
    }

    decode_tree(payload).map(|(tag, _)| tag)
}

/// Reads the region coordinates out of a `r.<x>.<z>.mca` entry name. Any
/// leading directories are ignored.
pub fn parse_region_filename(name: &str) -> Option<(i32, i32)> {
    let file_name = name.rsplit(['/', '\\']).next()?;
    let mut parts = file_name.split('.');
    if parts.next()? != "r" {
        return None;
    }
    let x = parts.next()?.parse().ok()?;
    let z = parts.next()?.parse().ok()?;
    if parts.next()? != "mca" || parts.next().is_some() {
        return None;
    }
    Some((x, z))
}
