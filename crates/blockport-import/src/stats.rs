//! Block-type and height histograms for an import run.

use blockport_common::VoxelCoordinate;
use serde::Serialize;
use std::collections::HashMap;

pub const HEIGHT_BUCKET: i32 = 16;

/// Lower edge of the 16-block band containing `y`.
pub fn height_bucket(y: i32) -> i32 {
    y.div_euclid(HEIGHT_BUCKET) * HEIGHT_BUCKET
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockTypeCount {
    pub id: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeightBucketCount {
    pub bucket: i32,
    pub count: u64,
}

/// Finalized report. Ordering does not depend on the order voxels were seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStatistics {
    pub total_blocks: u64,
    pub block_types: Vec<BlockTypeCount>,
    pub height_distribution: Vec<HeightBucketCount>,
}

#[derive(Debug, Default, Clone)]
pub struct StatisticsCollector {
    block_counts: HashMap<String, u64>,
    height_counts: HashMap<i32, u64>,
    total: u64,
}

impl StatisticsCollector {
    pub fn new() -> Self {
        StatisticsCollector::default()
    }

    /// Rebuilds the counters from a finished voxel map.
    pub fn from_voxels<'a, I>(voxels: I) -> Self
    where
        I: IntoIterator<Item = (&'a VoxelCoordinate, &'a String)>,
    {
        let mut collector = StatisticsCollector::new();
        for (position, id) in voxels {
            collector.observe(id, position.y);
        }
        collector
    }

    pub fn reset(&mut self) {
        self.block_counts.clear();
        self.height_counts.clear();
        self.total = 0;
    }

    pub fn observe(&mut self, id: &str, y: i32) {
        *self.block_counts.entry(id.to_string()).or_insert(0) += 1;
        *self.height_counts.entry(height_bucket(y)).or_insert(0) += 1;
        self.total += 1;
    }

    /// Undoes one `observe`, used when a voxel is overwritten.
    pub fn forget(&mut self, id: &str, y: i32) {
        decrement(&mut self.block_counts, id.to_string());
        decrement(&mut self.height_counts, height_bucket(y));
        self.total = self.total.saturating_sub(1);
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn count_of(&self, id: &str) -> u64 {
        self.block_counts.get(id).copied().unwrap_or(0)
    }

    /// Block types by descending count then ascending id; heights by
    /// descending count then ascending bucket.
    pub fn report(&self) -> ImportStatistics {
        let mut block_types: Vec<BlockTypeCount> = self
            .block_counts
            .iter()
            .map(|(id, &count)| BlockTypeCount {
                id: id.clone(),
                count,
            })
            .collect();
        block_types.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.id.cmp(&b.id)));

        let mut height_distribution: Vec<HeightBucketCount> = self
            .height_counts
            .iter()
            .map(|(&bucket, &count)| HeightBucketCount { bucket, count })
            .collect();
        height_distribution.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.bucket.cmp(&b.bucket)));

        ImportStatistics {
            total_blocks: self.total,
            block_types,
            height_distribution,
        }
    }
}

fn decrement<K: std::hash::Hash + Eq>(counts: &mut HashMap<K, u64>, key: K) {
    if let Some(count) = counts.get_mut(&key) {
        *count -= 1;
        if *count == 0 {
            counts.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_height_buckets() {
        assert_eq!(height_bucket(0), 0);
        assert_eq!(height_bucket(15), 0);
        assert_eq!(height_bucket(16), 16);
        assert_eq!(height_bucket(79), 64);
        assert_eq!(height_bucket(-1), -16);
        assert_eq!(height_bucket(-64), -64);
    }

    #[test]
    fn test_report_ordering_is_stable() {
        let observations = [("dirt", 3), ("stone", 20), ("stone", 70), ("dirt", 4), ("air_duct", 4), ("glass", 100)];
        let mut forward = StatisticsCollector::new();
        let mut backward = StatisticsCollector::new();
        for (id, y) in observations {
            forward.observe(id, y);
        }
        for (id, y) in observations.iter().rev() {
            backward.observe(id, *y);
        }

        let report = forward.report();
        assert_eq!(report, backward.report());
        assert_eq!(report.total_blocks, 6);
        let ids: Vec<&str> = report.block_types.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["dirt", "stone", "air_duct", "glass"]);
        let buckets: Vec<i32> = report.height_distribution.iter().map(|h| h.bucket).collect();
        assert_eq!(buckets, vec![0, 16, 64, 96]);
    }

    #[test]
    fn test_forget_removes_empty_entries() {
        let mut collector = StatisticsCollector::new();
        collector.observe("stone", 5);
        collector.observe("dirt", 5);
        collector.forget("stone", 5);
        let report = collector.report();
        assert_eq!(report.total_blocks, 1);
        assert_eq!(report.block_types, vec![BlockTypeCount { id: "dirt".to_string(), count: 1 }]);
        assert_eq!(collector.count_of("stone"), 0);

        collector.reset();
        assert_eq!(collector.report(), ImportStatistics::default());
    }
}
