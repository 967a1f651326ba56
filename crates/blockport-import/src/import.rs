//! Async entry points. Each call builds one [`ImportRun`], so concurrent
//! imports never share caches or statistics.
//!
//! Chunks of a region are decompressed and decoded on the blocking pool, at
//! most [`CHUNK_WORKERS`] at a time. Their voxels are merged into the run in
//! slot order, so the result does not depend on which worker finishes first.

use crate::archive::{find_descriptor, region_entries, world_prefix, DirectoryArchive, WorldArchive, ZipWorldArchive};
use crate::decompress::decode_tree;
use crate::mapping::BlockMappingTable;
use crate::palette::decode_chunk_blocks;
use crate::region::{decode_chunk, parse_region_filename, ChunkSlot, RegionFile};
use crate::run::{ImportOptions, ImportResult, ImportRun, SourceKind};
use crate::schematic::decode_schematic;
use blockport_common::{BlockportError, Result, VoxelCoordinate};
use blockport_logger::{log, LogSeverity::Info};
use blockport_nbt::Tag;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::path::Path;

/// Chunks decoded concurrently per region.
pub const CHUNK_WORKERS: usize = 4;

struct ChunkJob {
    chunk_x: i32,
    chunk_z: i32,
    payload: Bytes,
    compression: u8,
}

/// World-space voxels with their unresolved source names, or the reason the
/// chunk was dropped.
type ChunkOutcome = std::result::Result<Vec<(VoxelCoordinate, String)>, String>;

fn decode_job(job: &ChunkJob) -> ChunkOutcome {
    let tree = decode_chunk(&job.payload, job.compression).map_err(|e| e.to_string())?;
    let mut voxels = Vec::new();
    decode_chunk_blocks(&tree, job.chunk_x, job.chunk_z, |position, name| {
        voxels.push((position, name.to_string()))
    });
    Ok(voxels)
}

fn chunk_jobs(run: &mut ImportRun, region: &RegionFile<'_>, data: &Bytes) -> Vec<ChunkJob> {
    let mut jobs = Vec::new();
    for (local_x, local_z) in region.slots() {
        let (chunk_x, chunk_z) = region.chunk_coords(local_x, local_z);
        match region.locate_chunk(local_x, local_z) {
            ChunkSlot::Absent => {}
            ChunkSlot::Invalid(reason) => run.skip_chunk(chunk_x, chunk_z, reason),
            ChunkSlot::Payload { range, compression } => jobs.push(ChunkJob {
                chunk_x,
                chunk_z,
                payload: data.slice(range),
                compression,
            }),
        }
    }
    jobs
}

/// Decodes every chunk of one region file into `run`. Bad chunks are
/// recorded and skipped; a file too short for its header is an error.
async fn decode_region(run: &mut ImportRun, data: Bytes, region_x: i32, region_z: i32) -> Result<()> {
    let jobs = {
        let region = RegionFile::new(&data, region_x, region_z)?;
        chunk_jobs(run, &region, &data)
    };

    let mut decoded = stream::iter(jobs)
        .map(|job| {
            tokio::task::spawn_blocking(move || {
                let outcome = decode_job(&job);
                (job.chunk_x, job.chunk_z, outcome)
            })
        })
        .buffered(CHUNK_WORKERS);

    let mut loaded = 0;
    let mut emitted = 0;
    while let Some(joined) = decoded.next().await {
        run.check_cancelled()?;
        let (chunk_x, chunk_z, outcome) =
            joined.map_err(|e| BlockportError::DecodeError(format!("chunk worker failed: {}", e)))?;
        match outcome {
            Ok(voxels) => {
                loaded += 1;
                emitted += voxels.len();
                run.place_chunk(voxels);
            }
            Err(reason) => run.skip_chunk(chunk_x, chunk_z, reason),
        }
    }

    log(
        format!(
            "Region {},{}: {} chunks decoded, {} blocks emitted",
            region_x, region_z, loaded, emitted
        ),
        Info,
    );
    Ok(())
}

/// Imports the overworld of a world archive.
///
/// Only container-level problems fail the import: an archive that cannot be
/// listed, a missing descriptor, or cancellation. Unreadable regions and
/// chunks end up as warnings and skipped entries in the result.
pub async fn import_world<A: WorldArchive>(
    archive: &mut A,
    source: &str,
    table: BlockMappingTable,
    options: &ImportOptions,
) -> Result<ImportResult> {
    let entries = archive.list_entries();
    let descriptor = find_descriptor(&entries)?;
    log(format!("World descriptor found at {}", descriptor), Info);

    let mut run = ImportRun::new(source, table, options);
    if options.center == Some(true) {
        run.warn("Centering is not applied to world imports".to_string());
    }

    match archive.read_entry(&descriptor).await.and_then(|bytes| decode_tree(&bytes)) {
        Ok((tree, _)) => {
            if let Some(name) = level_name(&tree) {
                log(format!("Importing world '{}'", name), Info);
            }
        }
        Err(e) => run.warn(format!("Could not read {}: {}", descriptor, e)),
    }

    let regions = region_entries(&entries, world_prefix(&descriptor));
    if regions.is_empty() {
        run.warn(format!("No region files next to {}", descriptor));
    }

    for name in regions {
        run.check_cancelled()?;
        let bytes = match archive.read_entry(&name).await {
            Ok(bytes) => bytes,
            Err(e) => {
                run.warn(format!("Skipping region {}: {}", name, e));
                continue;
            }
        };
        let (region_x, region_z) = parse_region_filename(&name).unwrap_or((0, 0));
        match decode_region(&mut run, bytes, region_x, region_z).await {
            Ok(()) => {}
            Err(BlockportError::Cancelled) => return Err(BlockportError::Cancelled),
            Err(e) => run.warn(format!("Skipping region {}: {}", name, e)),
        }
    }

    Ok(run.finish(SourceKind::World))
}

fn level_name(tree: &Tag) -> Option<&String> {
    tree.get("Data")
        .unwrap_or(tree)
        .get("LevelName")
        .and_then(Tag::as_string)
}

/// Imports a single region file. Coordinates come from `source` when it is
/// named `r.<x>.<z>.mca`, otherwise the region is placed at 0,0.
pub async fn import_region_bytes(
    bytes: impl Into<Bytes>,
    source: &str,
    table: BlockMappingTable,
    options: &ImportOptions,
) -> Result<ImportResult> {
    let (region_x, region_z) = parse_region_filename(source).unwrap_or((0, 0));
    let mut run = ImportRun::new(source, table, options);
    if options.center == Some(true) {
        run.warn("Centering is not applied to region imports".to_string());
    }
    decode_region(&mut run, bytes.into(), region_x, region_z).await?;
    Ok(run.finish(SourceKind::Region))
}

/// Imports a schematic file of any supported layout. Centered unless
/// `options.center` is `Some(false)`.
pub fn import_schematic_bytes(
    bytes: &[u8],
    source: &str,
    table: BlockMappingTable,
    options: &ImportOptions,
) -> Result<ImportResult> {
    let (tree, strategy) = decode_tree(bytes)?;
    let document = decode_schematic(&tree)?;
    log(
        format!(
            "{} decoded via {} as {} ({}x{}x{}, {} volumes)",
            source,
            strategy,
            document.format.report_name(),
            document.width,
            document.height,
            document.length,
            document.volumes.len()
        ),
        Info,
    );

    let mut run = ImportRun::new(source, table, options);
    run.place_schematic(&document, options.center.unwrap_or(true))?;
    Ok(run.finish(SourceKind::Schematic(document.format)))
}

/// Picks the importer from the path: directories and `.zip` files are
/// worlds, `.mca` files are single regions, anything else is a schematic.
pub async fn import_path(path: &Path, table: BlockMappingTable, options: &ImportOptions) -> Result<ImportResult> {
    let source = path.display().to_string();
    let metadata = tokio::fs::metadata(path).await?;
    if metadata.is_dir() {
        let mut archive = DirectoryArchive::open(path).await?;
        return import_world(&mut archive, &source, table, options).await;
    }

    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "zip" => {
            let mut archive = ZipWorldArchive::open(path).await?;
            import_world(&mut archive, &source, table, options).await
        }
        "mca" => {
            let bytes = tokio::fs::read(path).await?;
            import_region_bytes(bytes, &source, table, options).await
        }
        _ => {
            let bytes = tokio::fs::read(path).await?;
            import_schematic_bytes(&bytes, &source, table, options)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryArchive;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    #[test]
    fn test_level_name_lookup() {
        let mut data = HashMap::new();
        data.insert("LevelName".to_string(), Tag::String("Island".to_string()));
        let mut root = HashMap::new();
        root.insert("Data".to_string(), Tag::Compound(data));
        assert_eq!(level_name(&Tag::Compound(root)).map(String::as_str), Some("Island"));
    }

    #[tokio::test]
    async fn test_missing_descriptor_is_fatal() {
        let mut archive = MemoryArchive::new();
        archive.insert("region/r.0.0.mca", vec![0u8; 8192]);
        let result = import_world(&mut archive, "w", BlockMappingTable::builtin(), &ImportOptions::default()).await;
        assert_matches!(result, Err(BlockportError::DescriptorMissing));
    }

    #[tokio::test]
    async fn test_bad_descriptor_and_short_region_are_warnings() {
        let mut archive = MemoryArchive::new();
        archive.insert("level.dat", vec![0xFFu8; 4]);
        archive.insert("region/r.0.0.mca", vec![0u8; 10]);
        let result = import_world(&mut archive, "w", BlockMappingTable::builtin(), &ImportOptions::default())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.block_count, 0);
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn test_undecodable_chunk_job() {
        let job = ChunkJob {
            chunk_x: 2,
            chunk_z: -1,
            payload: Bytes::from_static(&[0xAB; 32]),
            compression: 2,
        };
        assert!(decode_job(&job).is_err());
    }

    #[test]
    fn test_unsupported_schematic() {
        let mut root = HashMap::new();
        root.insert("Something".to_string(), Tag::Int(1));
        let bytes = blockport_nbt::NBTFile::new(String::new(), Tag::Compound(root))
            .to_bytes()
            .unwrap();
        assert_matches!(
            import_schematic_bytes(&bytes, "x.schem", BlockMappingTable::builtin(), &ImportOptions::default()),
            Err(BlockportError::UnsupportedFormat(_))
        );
    }
}
