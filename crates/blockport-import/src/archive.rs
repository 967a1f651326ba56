//! Access to world save containers: zip files, extracted directories, or
//! entries already held in memory.

use blockport_common::{BlockportError, Result};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Entry names checked for the world descriptor before falling back to a scan.
pub const DESCRIPTOR_CANDIDATES: [&str; 3] = ["level.dat", "world/level.dat", "saves/world/level.dat"];
pub const DESCRIPTOR_NAME: &str = "level.dat";

/// A container of named entries. Names use `/` separators.
#[allow(async_fn_in_trait)]
pub trait WorldArchive {
    fn list_entries(&self) -> Vec<String>;

    async fn read_entry(&mut self, name: &str) -> Result<Bytes>;
}

pub struct ZipWorldArchive {
    archive: ZipArchive<Cursor<Bytes>>,
}

impl fmt::Debug for ZipWorldArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipWorldArchive")
            .field("entries", &self.archive.len())
            .finish()
    }
}

impl ZipWorldArchive {
    pub fn new(data: Bytes) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(data))
            .map_err(|e| BlockportError::ArchiveError(format!("cannot open zip archive: {}", e)))?;
        Ok(ZipWorldArchive { archive })
    }

    pub async fn open(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| BlockportError::ArchiveError(format!("cannot read {}: {}", path.display(), e)))?;
        ZipWorldArchive::new(Bytes::from(data))
    }
}

impl WorldArchive for ZipWorldArchive {
    fn list_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(|name| name.replace('\\', "/"))
            .collect();
        names.sort();
        names
    }

    async fn read_entry(&mut self, name: &str) -> Result<Bytes> {
        let mut file = self
            .archive
            .by_name(name)
            .map_err(|e| BlockportError::ArchiveError(format!("cannot read entry {}: {}", name, e)))?;
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;
        Ok(Bytes::from(data))
    }
}

/// An extracted world folder on disk.
pub struct DirectoryArchive {
    root: PathBuf,
    entries: Vec<String>,
}

impl DirectoryArchive {
    pub async fn open(root: &Path) -> Result<Self> {
        let mut entries = Vec::new();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let mut reader = tokio::fs::read_dir(&dir).await.map_err(|e| {
                BlockportError::ArchiveError(format!("cannot list {}: {}", dir.display(), e))
            })?;
            while let Some(entry) = reader.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if let Ok(relative) = path.strip_prefix(root) {
                    let name: Vec<String> = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect();
                    entries.push(name.join("/"));
                }
            }
        }
        entries.sort();
        Ok(DirectoryArchive {
            root: root.to_path_buf(),
            entries,
        })
    }
}

impl WorldArchive for DirectoryArchive {
    fn list_entries(&self) -> Vec<String> {
        self.entries.clone()
    }

    async fn read_entry(&mut self, name: &str) -> Result<Bytes> {
        let path = self.root.join(name);
        let data = tokio::fs::read(&path).await?;
        Ok(Bytes::from(data))
    }
}

/// Entries held in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryArchive {
    entries: BTreeMap<String, Bytes>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        MemoryArchive::default()
    }

    pub fn insert(&mut self, name: &str, data: impl Into<Bytes>) {
        self.entries.insert(name.to_string(), data.into());
    }
}

impl WorldArchive for MemoryArchive {
    fn list_entries(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    async fn read_entry(&mut self, name: &str) -> Result<Bytes> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| BlockportError::ArchiveError(format!("no entry named {}", name)))
    }
}

/// Finds the world descriptor: known locations first, then the shallowest
/// entry whose name ends with `level.dat`.
pub fn find_descriptor(entries: &[String]) -> Result<String> {
    for candidate in DESCRIPTOR_CANDIDATES {
        if entries.iter().any(|entry| entry == candidate) {
            return Ok(candidate.to_string());
        }
    }
    entries
        .iter()
        .filter(|entry| entry.ends_with(DESCRIPTOR_NAME))
        .min_by(|a, b| {
            let depth = |name: &str| name.matches('/').count();
            depth(a).cmp(&depth(b)).then_with(|| a.cmp(b))
        })
        .cloned()
        .ok_or(BlockportError::DescriptorMissing)
}

/// Directory prefix of the world that owns `descriptor`, with trailing `/`.
pub fn world_prefix(descriptor: &str) -> &str {
    descriptor.strip_suffix(DESCRIPTOR_NAME).unwrap_or("")
}

/// Overworld region files directly under `<prefix>region/`.
pub fn region_entries(entries: &[String], prefix: &str) -> Vec<String> {
    let region_dir = format!("{}region/", prefix);
    let mut regions: Vec<String> = entries
        .iter()
        .filter(|entry| {
            entry
                .strip_prefix(&region_dir)
                .is_some_and(|rest| rest.ends_with(".mca") && !rest.contains('/'))
        })
        .cloned()
        .collect();
    regions.sort();
    regions
}
