//! Run context: everything owned by a single import, from the resolver cache
//! to the output voxel map.

use crate::identifier::{base_name, is_air};
use crate::mapping::BlockMappingTable;
use crate::resolver::{BlockResolver, UnmappedBlockRecord};
use crate::schematic::{SchematicDocument, SchematicFormat};
use crate::stats::{ImportStatistics, StatisticsCollector};
use crate::transform::{CoordinateTransform, VolumeFilter};
use blockport_common::{BlockportError, Bounds, Result, VoxelCoordinate};
use blockport_logger::{log, LogSeverity::{Info, Warning}};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub bounds: Option<Bounds>,
    /// Centering override. Schematics center by default, worlds do not.
    pub center: Option<bool>,
    pub cancel: Option<CancellationToken>,
    /// Replaces the mapping table's generic fallback.
    pub fallback_id: Option<String>,
}

impl ImportOptions {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// What produced the voxels of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    World,
    Region,
    Schematic(SchematicFormat),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedChunk {
    pub chunk_x: i32,
    pub chunk_z: i32,
    pub reason: String,
}

/// Decision for one unmapped source name after an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockOverride {
    Remap(String),
    Skip,
}

/// Run id derived from the source name, so reruns of the same source agree.
pub fn run_id(source: &str) -> Uuid {
    Uuid::new_v3(&Uuid::NAMESPACE_URL, source.as_bytes())
}

pub struct ImportRun {
    id: Uuid,
    source: String,
    resolver: BlockResolver,
    filter: VolumeFilter,
    stats: StatisticsCollector,
    voxels: HashMap<VoxelCoordinate, String>,
    /// Positions currently holding a category or fallback target, with the
    /// source name that put them there.
    unmapped_sources: HashMap<VoxelCoordinate, String>,
    skipped: Vec<SkippedChunk>,
    warnings: Vec<String>,
    cancel: Option<CancellationToken>,
    placed: u64,
}

impl ImportRun {
    pub fn new(source: &str, mut table: BlockMappingTable, options: &ImportOptions) -> Self {
        if let Some(fallback) = &options.fallback_id {
            table.set_fallback(fallback);
        }
        let id = run_id(source);
        log(format!("Starting import {} of {}", id, source), Info);
        ImportRun {
            id,
            source: source.to_string(),
            resolver: BlockResolver::new(table),
            filter: VolumeFilter::new(options.bounds),
            stats: StatisticsCollector::new(),
            voxels: HashMap::new(),
            unmapped_sources: HashMap::new(),
            skipped: Vec::new(),
            warnings: Vec::new(),
            cancel: options.cancel.clone(),
            placed: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn voxels(&self) -> &HashMap<VoxelCoordinate, String> {
        &self.voxels
    }

    pub fn warn(&mut self, message: String) {
        log(message.clone(), Warning);
        self.warnings.push(message);
    }

    pub fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => {
                log(format!("Import {} cancelled", self.id), Warning);
                Err(BlockportError::Cancelled)
            }
            _ => Ok(()),
        }
    }

    /// Places one decoded voxel. `local` is transformed, filtered, resolved
    /// and recorded, in that order. Air never reaches the map.
    pub fn place(&mut self, local: VoxelCoordinate, source_id: &str, transform: &CoordinateTransform) {
        if is_air(source_id) {
            return;
        }
        let position = transform.apply(local);
        if !self.filter.accepts(position) {
            return;
        }

        let resolution = self.resolver.resolve(source_id, position);
        if is_air(&resolution.target) {
            return;
        }

        if let Some(previous) = self.voxels.insert(position, resolution.target.clone()) {
            self.stats.forget(&previous, position.y);
        }
        self.stats.observe(&resolution.target, position.y);
        if resolution.kind.is_unmapped() {
            self.unmapped_sources.insert(position, base_name(source_id.trim()).to_string());
        } else {
            self.unmapped_sources.remove(&position);
        }
        self.placed += 1;
    }

    /// Places world-space voxels of one decoded chunk, in decode order.
    pub fn place_chunk(&mut self, voxels: Vec<(VoxelCoordinate, String)>) {
        let identity = CoordinateTransform::identity();
        for (position, name) in voxels {
            self.place(position, &name, &identity);
        }
    }

    pub fn skip_chunk(&mut self, chunk_x: i32, chunk_z: i32, reason: String) {
        log(format!("Skipping chunk {},{}: {}", chunk_x, chunk_z, reason), Warning);
        self.skipped.push(SkippedChunk {
            chunk_x,
            chunk_z,
            reason,
        });
    }

    /// Places every volume of a schematic. Centering is measured over the
    /// whole document.
    pub fn place_schematic(&mut self, document: &SchematicDocument, center: bool) -> Result<()> {
        for volume in &document.volumes {
            self.check_cancelled()?;
            let transform = if center {
                CoordinateTransform::centered(volume.origin, document.anchor, document.width, document.length)
            } else {
                CoordinateTransform::with_offset(volume.origin)
            };
            volume.for_each_block(|local, name| self.place(local, name, &transform));
        }
        Ok(())
    }

    pub fn finish(self, kind: SourceKind) -> ImportResult {
        let unmapped = self.resolver.unmapped().records();
        if !unmapped.is_empty() {
            log(
                format!(
                    "Import {}: {} unmapped block names, most common {}",
                    self.id,
                    unmapped.len(),
                    unmapped[0].source
                ),
                Info,
            );
        }
        log(
            format!(
                "Finished import {}: {} blocks, {} chunks skipped",
                self.id,
                self.voxels.len(),
                self.skipped.len()
            ),
            Info,
        );
        ImportResult {
            run_id: self.id,
            source: self.source,
            kind,
            success: true,
            block_count: self.voxels.len(),
            placed: self.placed,
            statistics: self.stats.report(),
            unmapped,
            skipped_chunks: self.skipped,
            warnings: self.warnings,
            voxels: self.voxels,
            unmapped_sources: self.unmapped_sources,
        }
    }
}

fn serialize_voxels<S: Serializer>(
    voxels: &HashMap<VoxelCoordinate, String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let ordered: BTreeMap<VoxelCoordinate, &String> = voxels.iter().map(|(k, v)| (*k, v)).collect();
    serializer.collect_map(ordered.into_iter().map(|(k, v)| (k.to_string(), v)))
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportResult {
    pub run_id: Uuid,
    pub source: String,
    pub kind: SourceKind,
    pub success: bool,
    /// Voxels in the final map.
    pub block_count: usize,
    /// Accepted placements, overwrites included.
    pub placed: u64,
    pub statistics: ImportStatistics,
    pub unmapped: Vec<UnmappedBlockRecord>,
    pub skipped_chunks: Vec<SkippedChunk>,
    pub warnings: Vec<String>,
    #[serde(serialize_with = "serialize_voxels")]
    pub voxels: HashMap<VoxelCoordinate, String>,
    #[serde(skip)]
    unmapped_sources: HashMap<VoxelCoordinate, String>,
}

impl ImportResult {
    pub fn has_unmapped(&self) -> bool {
        !self.unmapped.is_empty()
    }

    pub fn get(&self, position: VoxelCoordinate) -> Option<&str> {
        self.voxels.get(&position).map(String::as_str)
    }

    /// Rewrites every voxel that an overridden unmapped name produced, then
    /// recomputes the statistics. Returns how many voxels changed.
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, BlockOverride>) -> usize {
        let mut changed = 0;
        self.unmapped_sources.retain(|position, source| {
            let Some(decision) = overrides.get(source) else {
                return true;
            };
            match decision {
                BlockOverride::Remap(target) if !target.trim().is_empty() && !is_air(target) => {
                    self.voxels.insert(*position, target.trim().to_string());
                }
                _ => {
                    self.voxels.remove(position);
                }
            }
            changed += 1;
            false
        });

        self.unmapped.retain(|record| !overrides.contains_key(&record.source));
        self.block_count = self.voxels.len();
        self.statistics = StatisticsCollector::from_voxels(&self.voxels).report();
        log(
            format!("Import {}: overrides rewrote {} voxels", self.run_id, changed),
            Info,
        );
        changed
    }
}
