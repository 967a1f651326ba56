use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};

/// Compounds and lists nested deeper than this are rejected as malformed.
pub const MAX_NESTING_DEPTH: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    End,
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    List(Vec<Tag>),
    Compound(HashMap<String, Tag>),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Tag {
    pub fn get_type_id(&self) -> u8 {
        match self {
            Tag::End => 0,
            Tag::Byte(_) => 1,
            Tag::Short(_) => 2,
            Tag::Int(_) => 3,
            Tag::Long(_) => 4,
            Tag::Float(_) => 5,
            Tag::Double(_) => 6,
            Tag::ByteArray(_) => 7,
            Tag::String(_) => 8,
            Tag::List(_) => 9,
            Tag::Compound(_) => 10,
            Tag::IntArray(_) => 11,
            Tag::LongArray(_) => 12,
        }
    }

    /// Short human readable name of the tag type, used in inspection reports.
    pub fn type_name(&self) -> &'static str {
        match self {
            Tag::End => "end",
            Tag::Byte(_) => "byte",
            Tag::Short(_) => "short",
            Tag::Int(_) => "int",
            Tag::Long(_) => "long",
            Tag::Float(_) => "float",
            Tag::Double(_) => "double",
            Tag::ByteArray(_) => "byte_array",
            Tag::String(_) => "string",
            Tag::List(_) => "list",
            Tag::Compound(_) => "compound",
            Tag::IntArray(_) => "int_array",
            Tag::LongArray(_) => "long_array",
        }
    }

    pub fn read<R: Read>(reader: &mut R) -> io::Result<(String, Tag)> {
        Tag::read_named(reader, 0)
    }

    fn read_named<R: Read>(reader: &mut R, depth: usize) -> io::Result<(String, Tag)> {
        let type_id = reader.read_u8()?;
        if type_id == 0 {
            return Ok((String::new(), Tag::End));
        }

        let name_length = reader.read_u16::<BigEndian>()?;
        let mut name_bytes = vec![0u8; name_length as usize];
        reader.read_exact(&mut name_bytes)?;
        let name = String::from_utf8(name_bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let tag = Tag::read_payload(reader, type_id, depth)?;
        Ok((name, tag))
    }

    fn read_payload<R: Read>(reader: &mut R, type_id: u8, depth: usize) -> io::Result<Tag> {
        if depth > MAX_NESTING_DEPTH {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Tag nesting exceeds {} levels", MAX_NESTING_DEPTH),
            ));
        }

        match type_id {
            0 => Ok(Tag::End),
            1 => Ok(Tag::Byte(reader.read_i8()?)),
            2 => Ok(Tag::Short(reader.read_i16::<BigEndian>()?)),
            3 => Ok(Tag::Int(reader.read_i32::<BigEndian>()?)),
            4 => Ok(Tag::Long(reader.read_i64::<BigEndian>()?)),
            5 => Ok(Tag::Float(reader.read_f32::<BigEndian>()?)),
            6 => Ok(Tag::Double(reader.read_f64::<BigEndian>()?)),
            7 => {
                let length = read_length(reader)?;
                let mut bytes = Vec::with_capacity(length.min(1 << 16));
                reader.by_ref().take(length as u64).read_to_end(&mut bytes)?;
                if bytes.len() < length {
                    return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "Byte array is truncated"));
                }
                Ok(Tag::ByteArray(bytes.into_iter().map(|b| b as i8).collect()))
            }
            8 => {
                let length = reader.read_u16::<BigEndian>()?;
                let mut bytes = vec![0u8; length as usize];
                reader.read_exact(&mut bytes)?;
                // Modified UTF-8 from older writers is not always valid UTF-8; keep what we can.
                Ok(Tag::String(String::from_utf8_lossy(&bytes).into_owned()))
            }
            9 => {
                let list_type = reader.read_u8()?;
                let length = read_length(reader)?;
                let mut list = Vec::with_capacity(length.min(4096));
                for _ in 0..length {
                    list.push(Tag::read_payload(reader, list_type, depth + 1)?);
                }
                Ok(Tag::List(list))
            }
            10 => {
                let mut compound = HashMap::new();
                loop {
                    let (name, tag) = Tag::read_named(reader, depth + 1)?;
                    if let Tag::End = tag {
                        break;
                    }
                    compound.insert(name, tag);
                }
                Ok(Tag::Compound(compound))
            }
            11 => {
                let length = read_length(reader)?;
                let mut ints = Vec::with_capacity(length.min(65536));
                for _ in 0..length {
                    ints.push(reader.read_i32::<BigEndian>()?);
                }
                Ok(Tag::IntArray(ints))
            }
            12 => {
                let length = read_length(reader)?;
                let mut longs = Vec::with_capacity(length.min(65536));
                for _ in 0..length {
                    longs.push(reader.read_i64::<BigEndian>()?);
                }
                Ok(Tag::LongArray(longs))
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid tag type: {}", type_id),
            )),
        }
    }

    pub fn write<W: Write>(&self, writer: &mut W, name: &str) -> io::Result<()> {
        writer.write_u8(self.get_type_id())?;

        if !matches!(self, Tag::End) {
            writer.write_u16::<BigEndian>(name.len() as u16)?;
            writer.write_all(name.as_bytes())?;
        }

        self.write_payload(writer)
    }

    fn write_payload<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            Tag::End => Ok(()),
            Tag::Byte(v) => writer.write_i8(*v),
            Tag::Short(v) => writer.write_i16::<BigEndian>(*v),
            Tag::Int(v) => writer.write_i32::<BigEndian>(*v),
            Tag::Long(v) => writer.write_i64::<BigEndian>(*v),
            Tag::Float(v) => writer.write_f32::<BigEndian>(*v),
            Tag::Double(v) => writer.write_f64::<BigEndian>(*v),
            Tag::ByteArray(v) => {
                writer.write_i32::<BigEndian>(v.len() as i32)?;
                for &b in v {
                    writer.write_i8(b)?;
                }
                Ok(())
            }
            Tag::String(v) => {
                writer.write_u16::<BigEndian>(v.len() as u16)?;
                writer.write_all(v.as_bytes())
            }
            Tag::List(v) => {
                if v.is_empty() {
                    writer.write_u8(0)?; // TAG_End for empty lists
                } else {
                    writer.write_u8(v[0].get_type_id())?;
                }
                writer.write_i32::<BigEndian>(v.len() as i32)?;
                for tag in v {
                    tag.write_payload(writer)?;
                }
                Ok(())
            }
            Tag::Compound(v) => {
                for (name, tag) in v {
                    tag.write(writer, name)?;
                }
                Tag::End.write(writer, "")?;
                Ok(())
            }
            Tag::IntArray(v) => {
                writer.write_i32::<BigEndian>(v.len() as i32)?;
                for &i in v {
                    writer.write_i32::<BigEndian>(i)?;
                }
                Ok(())
            }
            Tag::LongArray(v) => {
                writer.write_i32::<BigEndian>(v.len() as i32)?;
                for &l in v {
                    writer.write_i64::<BigEndian>(l)?;
                }
                Ok(())
            }
        }
    }

    pub fn as_compound(&self) -> Option<&HashMap<String, Tag>> {
        match self {
            Tag::Compound(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Tag>> {
        match self {
            Tag::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&String> {
        match self {
            Tag::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Tag::Long(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Tag::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Any integral tag widened to `i64`. Schema writers disagree on whether a
    /// dimension is a Short or an Int, so lookups go through this.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Tag::Byte(n) => Some(*n as i64),
            Tag::Short(n) => Some(*n as i64),
            Tag::Int(n) => Some(*n as i64),
            Tag::Long(n) => Some(*n),
            _ => None,
        }
    }

    /// Any array-like tag flattened to `i64` values. Byte arrays are read as
    /// unsigned, which is how block-id and index arrays are meant.
    pub fn to_int_vec(&self) -> Option<Vec<i64>> {
        match self {
            Tag::ByteArray(v) => Some(v.iter().map(|&b| b as u8 as i64).collect()),
            Tag::IntArray(v) => Some(v.iter().map(|&i| i as i64).collect()),
            Tag::LongArray(v) => Some(v.clone()),
            Tag::List(v) => v.iter().map(Tag::as_number).collect(),
            _ => None,
        }
    }

    /// Length of an array-like tag without copying it.
    pub fn array_len(&self) -> Option<usize> {
        match self {
            Tag::ByteArray(v) => Some(v.len()),
            Tag::IntArray(v) => Some(v.len()),
            Tag::LongArray(v) => Some(v.len()),
            Tag::List(v) => Some(v.len()),
            _ => None,
        }
    }

    /// Field lookup on a compound. Returns `None` for non-compounds.
    pub fn get(&self, key: &str) -> Option<&Tag> {
        self.as_compound().and_then(|map| map.get(key))
    }

    /// First field present among `keys`, in order.
    pub fn get_any(&self, keys: &[&str]) -> Option<&Tag> {
        keys.iter().find_map(|key| self.get(key))
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, Tag::Compound(_))
    }
}

fn read_length<R: Read>(reader: &mut R) -> io::Result<usize> {
    let length = reader.read_i32::<BigEndian>()?;
    if length < 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Negative array length: {}", length),
        ));
    }
    Ok(length as usize)
}

/// Outer compression wrapping a serialized tag tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NbtCompression {
    None,
    Gzip,
    Zlib,
}

impl NbtCompression {
    /// Guesses the wrapping from the leading magic bytes.
    pub fn detect(bytes: &[u8]) -> Self {
        match bytes {
            [0x1f, 0x8b, ..] => NbtCompression::Gzip,
            [0x78, second, ..] if (0x7800u16 | *second as u16) % 31 == 0 => NbtCompression::Zlib,
            _ => NbtCompression::None,
        }
    }
}

// NBTFile represents a complete NBT file with compression support
#[derive(Debug, Clone, PartialEq)]
pub struct NBTFile {
    pub root: Tag,
    pub name: String,
}

impl NBTFile {
    pub fn new(name: String, root: Tag) -> Self {
        NBTFile { root, name }
    }

    pub fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        let (name, root) = Tag::read(reader)?;
        if !root.is_compound() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Root tag is a {}, expected compound", root.type_name()),
            ));
        }
        Ok(NBTFile { root, name })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.root.write(writer, &self.name)
    }

    pub fn read_gzip<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut decoder = GzDecoder::new(reader);
        Self::read(&mut decoder)
    }

    pub fn write_gzip<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        self.write(&mut encoder)?;
        encoder.finish()?;
        Ok(())
    }

    pub fn read_zlib<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut decoder = ZlibDecoder::new(reader);
        Self::read(&mut decoder)
    }

    pub fn write_zlib<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let mut encoder = ZlibEncoder::new(writer, Compression::default());
        self.write(&mut encoder)?;
        encoder.finish()?;
        Ok(())
    }

    /// Parses a tree whose outer compression is sniffed from the magic bytes.
    pub fn from_bytes(bytes: &[u8]) -> io::Result<Self> {
        let mut cursor = Cursor::new(bytes);
        match NbtCompression::detect(bytes) {
            NbtCompression::Gzip => Self::read_gzip(&mut cursor),
            NbtCompression::Zlib => Self::read_zlib(&mut cursor),
            NbtCompression::None => Self::read(&mut cursor),
        }
    }

    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write(&mut buffer)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_tag_type_ids() {
        assert_eq!(Tag::End.get_type_id(), 0);
        assert_eq!(Tag::Byte(0).get_type_id(), 1);
        assert_eq!(Tag::Short(0).get_type_id(), 2);
        assert_eq!(Tag::Int(0).get_type_id(), 3);
        assert_eq!(Tag::Long(0).get_type_id(), 4);
        assert_eq!(Tag::Float(0.0).get_type_id(), 5);
        assert_eq!(Tag::Double(0.0).get_type_id(), 6);
        assert_eq!(Tag::ByteArray(vec![]).get_type_id(), 7);
        assert_eq!(Tag::String("".to_string()).get_type_id(), 8);
        assert_eq!(Tag::List(vec![]).get_type_id(), 9);
        assert_eq!(Tag::Compound(HashMap::new()).get_type_id(), 10);
        assert_eq!(Tag::IntArray(vec![]).get_type_id(), 11);
        assert_eq!(Tag::LongArray(vec![]).get_type_id(), 12);
    }

    #[test]
    fn test_lenient_lookups() {
        let mut map = HashMap::new();
        map.insert("Width".to_string(), Tag::Short(7));
        map.insert("Blocks".to_string(), Tag::ByteArray(vec![-1, 2]));
        map.insert("Name".to_string(), Tag::String("stone".to_string()));
        let compound = Tag::Compound(map);

        assert_eq!(compound.get("Width").and_then(Tag::as_number), Some(7));
        assert_eq!(compound.get_any(&["width", "Width"]).and_then(Tag::as_number), Some(7));
        assert_eq!(compound.get("Blocks").and_then(Tag::to_int_vec), Some(vec![255, 2]));
        assert_eq!(compound.get("Blocks").and_then(Tag::array_len), Some(2));
        assert!(compound.get("missing").is_none());
        assert!(Tag::Int(3).get("Width").is_none());
        assert_eq!(Tag::Float(1.0).as_number(), None);
        assert_eq!(
            Tag::List(vec![Tag::Int(1), Tag::Byte(2)]).to_int_vec(),
            Some(vec![1, 2])
        );
        assert_eq!(Tag::List(vec![Tag::String("x".to_string())]).to_int_vec(), None);
    }

    #[test]
    fn test_compound_tag_read_write() {
        let mut compound = HashMap::new();
        compound.insert("byte".to_string(), Tag::Byte(42));
        compound.insert("string".to_string(), Tag::String("test".to_string()));
        compound.insert(
            "list".to_string(),
            Tag::List(vec![Tag::Int(1), Tag::Int(2)]),
        );
        compound.insert("longs".to_string(), Tag::LongArray(vec![-1, 0, i64::MAX]));

        let tag = Tag::Compound(compound);

        let mut buffer = Vec::new();
        tag.write(&mut buffer, "root").unwrap();

        let mut cursor = Cursor::new(buffer);
        let (name, read_tag) = Tag::read(&mut cursor).unwrap();

        assert_eq!(name, "root");
        assert_eq!(read_tag, tag);
    }

    #[test]
    fn test_nbt_file_compression_detection() {
        let mut compound = HashMap::new();
        compound.insert("name".to_string(), Tag::String("Test".to_string()));
        compound.insert("value".to_string(), Tag::Int(42));
        let original = NBTFile::new("test".to_string(), Tag::Compound(compound));

        let raw = original.to_bytes().unwrap();
        assert_eq!(NbtCompression::detect(&raw), NbtCompression::None);
        assert_eq!(NBTFile::from_bytes(&raw).unwrap(), original);

        let mut gzip_buffer = Vec::new();
        original.write_gzip(&mut gzip_buffer).unwrap();
        assert_eq!(NbtCompression::detect(&gzip_buffer), NbtCompression::Gzip);
        assert_eq!(NBTFile::from_bytes(&gzip_buffer).unwrap(), original);

        let mut zlib_buffer = Vec::new();
        original.write_zlib(&mut zlib_buffer).unwrap();
        assert_eq!(NbtCompression::detect(&zlib_buffer), NbtCompression::Zlib);
        assert_eq!(NBTFile::from_bytes(&zlib_buffer).unwrap(), original);
    }

    #[test]
    fn test_root_must_be_compound() {
        let mut buffer = Vec::new();
        Tag::Int(5).write(&mut buffer, "root").unwrap();
        assert!(NBTFile::read(&mut Cursor::new(buffer)).is_err());
    }

    #[test]
    fn test_invalid_tag_type() {
        let buffer = vec![255];
        let result = Tag::read_payload(&mut Cursor::new(buffer), 255, 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_array_length_rejected() {
        // TAG_Int_Array named "a" with length -1
        let buffer = vec![11, 0, 1, b'a', 0xff, 0xff, 0xff, 0xff];
        assert!(Tag::read(&mut Cursor::new(buffer)).is_err());
    }

    #[test]
    fn test_truncated_input_is_error() {
        let mut buffer = Vec::new();
        Tag::LongArray(vec![1, 2, 3]).write(&mut buffer, "data").unwrap();
        buffer.truncate(buffer.len() - 4);
        assert!(Tag::read(&mut Cursor::new(buffer)).is_err());
    }

    #[test]
    fn test_huge_byte_array_length_is_truncation_not_allocation() {
        // TAG_Byte_Array named "b" claiming i32::MAX bytes, followed by three
        let buffer = vec![7, 0, 1, b'b', 0x7f, 0xff, 0xff, 0xff, 1, 2, 3];
        let error = Tag::read(&mut Cursor::new(buffer)).unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::UnexpectedEof);

        let mut buffer = Vec::new();
        Tag::ByteArray(vec![-1, 0, 1]).write(&mut buffer, "b").unwrap();
        let (_, tag) = Tag::read(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(tag, Tag::ByteArray(vec![-1, 0, 1]));
    }

    #[test]
    fn test_excessive_nesting_rejected() {
        let mut tag = Tag::Int(0);
        for _ in 0..(MAX_NESTING_DEPTH + 2) {
            tag = Tag::List(vec![tag]);
        }
        let mut buffer = Vec::new();
        tag.write(&mut buffer, "deep").unwrap();
        assert!(Tag::read(&mut Cursor::new(buffer)).is_err());
    }

    #[test]
    fn test_empty_list() {
        let tag = Tag::List(vec![]);
        let mut buffer = Vec::new();
        tag.write(&mut buffer, "empty").unwrap();

        let mut cursor = Cursor::new(buffer);
        let (name, read_tag) = Tag::read(&mut cursor).unwrap();

        assert_eq!(name, "empty");
        assert_eq!(read_tag, tag);
    }
}
