//! Decompression helpers and the ordered fallback chain used when a payload's
//! wrapping is unknown or damaged.

use blockport_common::{BlockportError, Result};
use blockport_logger::{log, LogSeverity::Debug};
use blockport_nbt::{NBTFile, NbtCompression, Tag};
use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use std::fmt;
use std::io::{self, Cursor, Read};

/// Bytes skipped on the retry pass. Some tools prepend a foreign header of
/// this size before the compressed stream.
pub const HEADER_SKIP: usize = 8;

/// Compression tag stored in front of every region chunk payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkCompression {
    Gzip,
    Zlib,
    Uncompressed,
    Lz4,
    Custom,
}

impl ChunkCompression {
    pub fn from_byte(b: u8) -> Option<Self> {
        // High bit flags an external .mcc file; the method is in the low bits.
        match b & 0x7f {
            1 => Some(ChunkCompression::Gzip),
            2 => Some(ChunkCompression::Zlib),
            3 => Some(ChunkCompression::Uncompressed),
            4 => Some(ChunkCompression::Lz4),
            127 => Some(ChunkCompression::Custom),
            _ => None,
        }
    }
}

/// Inflates a zlib or gzip stream, falling back to a bare deflate stream.
pub fn inflate(bytes: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    if NbtCompression::detect(bytes) == NbtCompression::Gzip {
        GzDecoder::new(bytes).read_to_end(&mut out)?;
        return Ok(out);
    }
    match ZlibDecoder::new(bytes).read_to_end(&mut out) {
        Ok(_) => Ok(out),
        Err(_) => {
            out.clear();
            DeflateDecoder::new(bytes).read_to_end(&mut out)?;
            Ok(out)
        }
    }
}

/// Decompresses a chunk payload with its declared method.
pub fn decompress(bytes: &[u8], method: ChunkCompression) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    match method {
        ChunkCompression::Gzip => {
            GzDecoder::new(bytes).read_to_end(&mut out)?;
        }
        ChunkCompression::Zlib => {
            ZlibDecoder::new(bytes).read_to_end(&mut out)?;
        }
        ChunkCompression::Uncompressed => out.extend_from_slice(bytes),
        ChunkCompression::Lz4 | ChunkCompression::Custom => {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{:?} chunk compression is not supported", method),
            ))
        }
    }
    Ok(out)
}

/// Strategy that produced a tree in [`decode_tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStrategy {
    DirectParse,
    InflateFromStart,
    InflateSkippingHeader,
    Raw,
}

impl fmt::Display for DecodeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeStrategy::DirectParse => write!(f, "direct parse"),
            DecodeStrategy::InflateFromStart => write!(f, "inflate"),
            DecodeStrategy::InflateSkippingHeader => {
                write!(f, "inflate after {} header bytes", HEADER_SKIP)
            }
            DecodeStrategy::Raw => write!(f, "raw"),
        }
    }
}

fn parse_uncompressed(bytes: &[u8]) -> io::Result<Tag> {
    NBTFile::read(&mut Cursor::new(bytes)).map(|file| file.root)
}

/// Tries each strategy in a fixed order and returns the first tree that parses.
///
/// 1. direct parse (outer gzip/zlib sniffed from magic bytes)
/// 2. inflate from the first byte
/// 3. inflate after skipping [`HEADER_SKIP`] bytes
/// 4. raw, uncompressed tree after the same header skip
pub fn decode_tree(bytes: &[u8]) -> Result<(Tag, DecodeStrategy)> {
    let mut failures = Vec::new();

    match NBTFile::from_bytes(bytes) {
        Ok(file) => return Ok((file.root, DecodeStrategy::DirectParse)),
        Err(e) => failures.push(format!("{}: {}", DecodeStrategy::DirectParse, e)),
    }

    match inflate(bytes).and_then(|inflated| parse_uncompressed(&inflated)) {
        Ok(tag) => return Ok((tag, DecodeStrategy::InflateFromStart)),
        Err(e) => failures.push(format!("{}: {}", DecodeStrategy::InflateFromStart, e)),
    }

    if bytes.len() > HEADER_SKIP {
        let tail = &bytes[HEADER_SKIP..];
        match inflate(tail).and_then(|inflated| parse_uncompressed(&inflated)) {
            Ok(tag) => return Ok((tag, DecodeStrategy::InflateSkippingHeader)),
            Err(e) => failures.push(format!("{}: {}", DecodeStrategy::InflateSkippingHeader, e)),
        }
        match parse_uncompressed(tail) {
            Ok(tag) => return Ok((tag, DecodeStrategy::Raw)),
            Err(e) => failures.push(format!("{}: {}", DecodeStrategy::Raw, e)),
        }
    }

    log(format!("All decode strategies failed: {}", failures.join("; ")), Debug);
    Err(BlockportError::DecodeError(format!(
        "could not decode tag tree ({} bytes): {}",
        bytes.len(),
        failures.join("; ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::collections::HashMap;
    use std::io::Write;

    fn sample_file() -> NBTFile {
        let mut map = HashMap::new();
        map.insert("DataVersion".to_string(), Tag::Int(3465));
        NBTFile::new(String::new(), Tag::Compound(map))
    }

    #[test]
    fn test_compression_tags() {
        assert_eq!(ChunkCompression::from_byte(1), Some(ChunkCompression::Gzip));
        assert_eq!(ChunkCompression::from_byte(2), Some(ChunkCompression::Zlib));
        assert_eq!(ChunkCompression::from_byte(0x82), Some(ChunkCompression::Zlib));
        assert_eq!(ChunkCompression::from_byte(3), Some(ChunkCompression::Uncompressed));
        assert_eq!(ChunkCompression::from_byte(9), None);
    }

    #[test]
    fn test_direct_parse_wins_for_plain_gzip() {
        let mut buffer = Vec::new();
        sample_file().write_gzip(&mut buffer).unwrap();
        let (tag, strategy) = decode_tree(&buffer).unwrap();
        assert_eq!(strategy, DecodeStrategy::DirectParse);
        assert_eq!(tag, sample_file().root);
    }

    #[test]
    fn test_foreign_header_is_skipped() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&sample_file().to_bytes().unwrap()).unwrap();
        let mut buffer = vec![0xAB; HEADER_SKIP];
        buffer.extend(encoder.finish().unwrap());

        let (tag, strategy) = decode_tree(&buffer).unwrap();
        assert_eq!(strategy, DecodeStrategy::InflateSkippingHeader);
        assert_eq!(tag, sample_file().root);
    }

    #[test]
    fn test_raw_tree_after_header() {
        let mut buffer = vec![0xCD; HEADER_SKIP];
        buffer.extend(sample_file().to_bytes().unwrap());
        let (_, strategy) = decode_tree(&buffer).unwrap();
        assert_eq!(strategy, DecodeStrategy::Raw);
    }

    #[test]
    fn test_garbage_fails_every_strategy() {
        let garbage = vec![0x42; 64];
        assert_matches!(decode_tree(&garbage), Err(BlockportError::DecodeError(_)));
    }

    #[test]
    fn test_declared_method_mismatch_is_error() {
        let raw = sample_file().to_bytes().unwrap();
        assert!(decompress(&raw, ChunkCompression::Zlib).is_err());
        assert_eq!(decompress(&raw, ChunkCompression::Uncompressed).unwrap(), raw);
        assert!(decompress(&raw, ChunkCompression::Lz4).is_err());
    }
}
