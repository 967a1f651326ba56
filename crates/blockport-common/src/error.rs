use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum BlockportError {
    IoError(std::io::Error),
    /// The world archive could not be opened or listed.
    ArchiveError(String),
    /// No world descriptor entry was found in the archive.
    DescriptorMissing,
    /// A schematic tree matched none of the known layouts.
    UnsupportedFormat(String),
    /// A whole decode unit (file, tree) could not be decoded.
    DecodeError(String),
    MappingError(String),
    Cancelled,
}

impl fmt::Display for BlockportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockportError::IoError(err) => write!(f, "IO error: {}", err),
            BlockportError::ArchiveError(msg) => write!(f, "Archive error: {}", msg),
            BlockportError::DescriptorMissing => {
                write!(f, "Archive error: no world descriptor (level.dat) found")
            }
            BlockportError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            BlockportError::DecodeError(msg) => write!(f, "Decode error: {}", msg),
            BlockportError::MappingError(msg) => write!(f, "Mapping error: {}", msg),
            BlockportError::Cancelled => write!(f, "Import cancelled"),
        }
    }
}

impl Error for BlockportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BlockportError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BlockportError {
    fn from(err: std::io::Error) -> Self {
        BlockportError::IoError(err)
    }
}

impl From<serde_json::Error> for BlockportError {
    fn from(err: serde_json::Error) -> Self {
        BlockportError::MappingError(err.to_string())
    }
}
