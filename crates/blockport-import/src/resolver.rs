//! Resolves source block identifiers to target catalog ids.
//!
//! Lookup order:
//! 1. the identifier exactly as written
//! 2. namespace normalised (prefix stripped, or the default one added)
//! 3. base name with states stripped, then lower-cased variants
//! 4. category substring rules on the lower-cased plain name
//! 5. the table's generic fallback
//!
//! Steps 4 and 5 are recorded as unmapped. Results are cached per
//! namespace-stripped name for the lifetime of the resolver.

use crate::identifier::{base_name, has_namespace, plain_name, strip_namespace, with_default_namespace};
use crate::mapping::{BlockMappingTable, GENERIC_FALLBACK_ID};
use blockport_common::VoxelCoordinate;
use serde::Serialize;
use std::collections::HashMap;

/// Sample positions kept per unmapped name.
pub const MAX_SAMPLE_POSITIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    Exact,
    Namespaced,
    BaseName,
    Category,
    Fallback,
}

impl ResolutionKind {
    pub fn is_unmapped(&self) -> bool {
        matches!(self, ResolutionKind::Category | ResolutionKind::Fallback)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub target: String,
    pub kind: ResolutionKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmappedBlockRecord {
    pub source: String,
    pub count: u64,
    pub sample_positions: Vec<VoxelCoordinate>,
    pub fallback_id: String,
    pub kind: ResolutionKind,
}

/// Unmapped names seen during one run.
#[derive(Debug, Default, Clone)]
pub struct UnmappedTracker {
    records: HashMap<String, UnmappedBlockRecord>,
}

impl UnmappedTracker {
    pub fn record(&mut self, source: &str, resolution: &Resolution, position: VoxelCoordinate) {
        let record = self
            .records
            .entry(source.to_string())
            .or_insert_with(|| UnmappedBlockRecord {
                source: source.to_string(),
                count: 0,
                sample_positions: Vec::new(),
                fallback_id: resolution.target.clone(),
                kind: resolution.kind,
            });
        record.count += 1;
        if record.sample_positions.len() < MAX_SAMPLE_POSITIONS {
            record.sample_positions.push(position);
        }
    }

    pub fn get(&self, source: &str) -> Option<&UnmappedBlockRecord> {
        self.records.get(source)
    }

    pub fn remove(&mut self, source: &str) -> Option<UnmappedBlockRecord> {
        self.records.remove(source)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Records by descending count, then name.
    pub fn records(&self) -> Vec<UnmappedBlockRecord> {
        let mut records: Vec<UnmappedBlockRecord> = self.records.values().cloned().collect();
        records.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.source.cmp(&b.source)));
        records
    }
}

pub struct BlockResolver {
    table: BlockMappingTable,
    cache: HashMap<String, Resolution>,
    unmapped: UnmappedTracker,
}

impl BlockResolver {
    pub fn new(table: BlockMappingTable) -> Self {
        BlockResolver {
            table,
            cache: HashMap::new(),
            unmapped: UnmappedTracker::default(),
        }
    }

    pub fn table(&self) -> &BlockMappingTable {
        &self.table
    }

    pub fn unmapped(&self) -> &UnmappedTracker {
        &self.unmapped
    }

    pub fn unmapped_mut(&mut self) -> &mut UnmappedTracker {
        &mut self.unmapped
    }

    /// Drops the cache and unmapped records.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.unmapped.clear();
    }

    /// Resolves `id` seen at `position`. Never fails and never returns an
    /// empty target.
    pub fn resolve(&mut self, id: &str, position: VoxelCoordinate) -> Resolution {
        let key = strip_namespace(id.trim());
        let resolution = match self.cache.get(key).cloned() {
            Some(cached) => cached,
            None => {
                let resolution = self.lookup(id.trim());
                self.cache.insert(key.to_string(), resolution.clone());
                resolution
            }
        };
        if resolution.kind.is_unmapped() {
            self.unmapped.record(base_name(id.trim()), &resolution, position);
        }
        resolution
    }

    /// Runs the lookup chain without touching the cache or the tracker.
    pub fn lookup(&self, id: &str) -> Resolution {
        let found = |target: &str, kind| Resolution {
            target: target.to_string(),
            kind,
        };

        if let Some(target) = self.table.get(id) {
            return found(target, ResolutionKind::Exact);
        }

        for candidate in namespace_variants(id) {
            if let Some(target) = self.table.get(&candidate) {
                return found(target, ResolutionKind::Namespaced);
            }
        }

        let base = base_name(id);
        let mut base_candidates = vec![base.to_string()];
        base_candidates.extend(namespace_variants(base));
        let lowered: Vec<String> = base_candidates.iter().map(|c| c.to_ascii_lowercase()).collect();
        base_candidates.extend(lowered);
        for candidate in base_candidates {
            if let Some(target) = self.table.get(&candidate) {
                return found(target, ResolutionKind::BaseName);
            }
        }

        if let Some(target) = self.table.category_for(&plain_name(id)) {
            return found(target, ResolutionKind::Category);
        }

        let fallback = self.table.fallback();
        let fallback = if fallback.is_empty() {
            GENERIC_FALLBACK_ID
        } else {
            fallback
        };
        found(fallback, ResolutionKind::Fallback)
    }
}

/// `mod:x` -> [`x`, `minecraft:x`]; `x` -> [`minecraft:x`].
fn namespace_variants(id: &str) -> Vec<String> {
    if has_namespace(id) {
        let stripped = strip_namespace(id);
        vec![stripped.to_string(), with_default_namespace(stripped).into_owned()]
    } else {
        vec![with_default_namespace(id).into_owned()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, &str)]) -> BlockMappingTable {
        let mut table = BlockMappingTable::empty();
        for (source, target) in entries {
            table.insert(source, target);
        }
        table
    }

    #[test]
    fn test_chain_order() {
        let resolver = BlockResolver::new(table(&[
            ("minecraft:oak_stairs[facing=north]", "stairs_north"),
            ("minecraft:stone", "stone"),
            ("minecraft:oak_stairs", "stairs"),
            ("Mod:Crystal", "gem"),
        ]));

        let exact = resolver.lookup("minecraft:oak_stairs[facing=north]");
        assert_eq!(exact.kind, ResolutionKind::Exact);
        assert_eq!(exact.target, "stairs_north");

        let namespaced = resolver.lookup("stone");
        assert_eq!(namespaced.kind, ResolutionKind::Namespaced);

        let other_namespace = resolver.lookup("othermod:stone");
        assert_eq!(other_namespace.kind, ResolutionKind::Namespaced);
        assert_eq!(other_namespace.target, "stone");

        let base = resolver.lookup("minecraft:oak_stairs[facing=south]");
        assert_eq!(base.kind, ResolutionKind::BaseName);
        assert_eq!(base.target, "stairs");

        let lowered = resolver.lookup("MINECRAFT:STONE[x=1]");
        assert_eq!(lowered.kind, ResolutionKind::BaseName);

        let category = resolver.lookup("mod:Jungle_Leaves");
        assert_eq!(category.kind, ResolutionKind::Category);
        assert_eq!(category.target, "leaves");

        let fallback = resolver.lookup("mod:beacon");
        assert_eq!(fallback.kind, ResolutionKind::Fallback);
        assert_eq!(fallback.target, GENERIC_FALLBACK_ID);
    }

    #[test]
    fn test_unmapped_counts_include_cache_hits() {
        let mut resolver = BlockResolver::new(BlockMappingTable::empty());
        for i in 0..7 {
            resolver.resolve("mod:leaf[age=1]", VoxelCoordinate::new(i, 0, 0));
        }
        resolver.resolve("minecraft:air_vent", VoxelCoordinate::ORIGIN);

        let record = resolver.unmapped().get("mod:leaf").unwrap();
        assert_eq!(record.count, 7);
        assert_eq!(record.sample_positions.len(), MAX_SAMPLE_POSITIONS);
        assert_eq!(record.fallback_id, "leaves");
        assert_eq!(resolver.unmapped().records()[0].source, "mod:leaf");
        assert_eq!(resolver.unmapped().len(), 2);

        resolver.reset();
        assert!(resolver.unmapped().is_empty());
    }

    #[test]
    fn test_mapped_names_are_not_tracked() {
        let mut resolver = BlockResolver::new(BlockMappingTable::builtin());
        let resolution = resolver.resolve("minecraft:stone", VoxelCoordinate::ORIGIN);
        assert_eq!(resolution.kind, ResolutionKind::Exact);
        assert!(resolver.unmapped().is_empty());
    }

    #[test]
    fn test_never_empty_with_empty_table() {
        let mut resolver = BlockResolver::new(BlockMappingTable::empty());
        let inputs = [
            "", " ", ":", "[", "]", "[]", "a:", ":b", "::", "minecraft:", "x[y", "é:ü[ß]",
            "\u{0}", "LEAF", "a:b:c[d=e]", "   padded   ",
        ];
        for (i, id) in inputs.iter().enumerate() {
            let resolution = resolver.resolve(id, VoxelCoordinate::new(i as i32, 0, 0));
            assert!(!resolution.target.is_empty(), "empty target for {:?}", id);
        }
    }

    /// xorshift64, fixed seed so failures reproduce
    struct Xorshift(u64);

    impl Xorshift {
        fn next(&mut self) -> u64 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            self.0
        }

        fn below(&mut self, n: usize) -> usize {
            (self.next() % n as u64) as usize
        }
    }

    fn random_identifier(rng: &mut Xorshift) -> String {
        const PIECES: [&str; 24] = [
            ":", ":", "[", "]", "=", ",", " ", "\t", "\n", "_", "minecraft", "mod", "LEAF", "log",
            "stone", "glass", "air", "é", "ü", "木", "🧱", "\u{0}", "facing", "north",
        ];
        let len = rng.below(8);
        (0..len).map(|_| PIECES[rng.below(PIECES.len())]).collect()
    }

    #[test]
    fn test_generated_identifiers_always_resolve() {
        let mut rng = Xorshift(0x9e37_79b9_7f4a_7c15);
        let mut resolver = BlockResolver::new(BlockMappingTable::empty());
        for i in 0..5000 {
            let id = random_identifier(&mut rng);
            let resolution = resolver.resolve(&id, VoxelCoordinate::new(i, 0, 0));
            assert!(!resolution.target.is_empty(), "empty target for {:?}", id);
        }
        assert!(resolver.unmapped().records().iter().all(|record| record.sample_positions.len() <= 5));
    }
}
