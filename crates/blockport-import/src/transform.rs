//! Positioning of decoded voxels and the optional bounding-box filter.

use blockport_common::{Bounds, VoxelCoordinate};

/// `final = local + offset - shift`.
///
/// When centering, `shift` is the anchor corner plus half the horizontal
/// extent, so `x` lands at `x + offset.x - floor(width / 2)`. The vertical
/// axis is never shifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateTransform {
    pub offset: VoxelCoordinate,
    pub shift: VoxelCoordinate,
}

impl Default for CoordinateTransform {
    fn default() -> Self {
        CoordinateTransform::identity()
    }
}

impl CoordinateTransform {
    pub fn identity() -> Self {
        CoordinateTransform {
            offset: VoxelCoordinate::ORIGIN,
            shift: VoxelCoordinate::ORIGIN,
        }
    }

    pub fn with_offset(offset: VoxelCoordinate) -> Self {
        CoordinateTransform {
            offset,
            shift: VoxelCoordinate::ORIGIN,
        }
    }

    /// Centers a `width x length` footprint that starts at `anchor`.
    pub fn centered(offset: VoxelCoordinate, anchor: VoxelCoordinate, width: usize, length: usize) -> Self {
        CoordinateTransform {
            offset,
            shift: VoxelCoordinate::new(
                anchor.x + (width / 2) as i32,
                0,
                anchor.z + (length / 2) as i32,
            ),
        }
    }

    pub fn apply(&self, local: VoxelCoordinate) -> VoxelCoordinate {
        VoxelCoordinate::new(
            local.x + self.offset.x - self.shift.x,
            local.y + self.offset.y - self.shift.y,
            local.z + self.offset.z - self.shift.z,
        )
    }
}

/// Drops voxels outside an inclusive box. Without a box everything passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VolumeFilter {
    bounds: Option<Bounds>,
}

impl VolumeFilter {
    pub fn new(bounds: Option<Bounds>) -> Self {
        VolumeFilter { bounds }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn accepts(&self, position: VoxelCoordinate) -> bool {
        self.bounds.map_or(true, |bounds| bounds.contains(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centering_floors_half_extent() {
        let transform = CoordinateTransform::centered(VoxelCoordinate::ORIGIN, VoxelCoordinate::ORIGIN, 5, 4);
        assert_eq!(transform.apply(VoxelCoordinate::new(0, 3, 0)), VoxelCoordinate::new(-2, 3, -2));
        assert_eq!(transform.apply(VoxelCoordinate::new(4, 0, 3)), VoxelCoordinate::new(2, 0, 1));

        let single = CoordinateTransform::centered(VoxelCoordinate::ORIGIN, VoxelCoordinate::ORIGIN, 1, 1);
        assert_eq!(single.apply(VoxelCoordinate::ORIGIN), VoxelCoordinate::ORIGIN);
    }

    #[test]
    fn test_offset_including_vertical() {
        let offset = VoxelCoordinate::new(10, -5, 3);
        let transform = CoordinateTransform::centered(offset, VoxelCoordinate::ORIGIN, 2, 2);
        assert_eq!(transform.apply(VoxelCoordinate::new(1, 1, 1)), VoxelCoordinate::new(10, -4, 3));
        assert_eq!(
            CoordinateTransform::with_offset(offset).apply(VoxelCoordinate::ORIGIN),
            offset
        );
        assert_eq!(
            CoordinateTransform::identity().apply(VoxelCoordinate::new(7, 8, 9)),
            VoxelCoordinate::new(7, 8, 9)
        );
    }

    #[test]
    fn test_anchor_of_multi_region_union() {
        // region corner at (4,1,-3), union starts at (0,0,-3) and is 7 x 5
        let transform = CoordinateTransform::centered(
            VoxelCoordinate::new(4, 1, -3),
            VoxelCoordinate::new(0, 0, -3),
            7,
            5,
        );
        assert_eq!(transform.apply(VoxelCoordinate::ORIGIN), VoxelCoordinate::new(1, 1, -2));
    }

    #[test]
    fn test_filter_is_inclusive() {
        let bounds = Bounds::new(VoxelCoordinate::new(0, 0, 0), VoxelCoordinate::new(2, 2, 2));
        let filter = VolumeFilter::new(Some(bounds));
        assert!(filter.accepts(VoxelCoordinate::new(2, 2, 2)));
        assert!(filter.accepts(VoxelCoordinate::new(0, 1, 0)));
        assert!(!filter.accepts(VoxelCoordinate::new(3, 0, 0)));
        assert!(!filter.accepts(VoxelCoordinate::new(0, -1, 0)));
        assert!(VolumeFilter::default().accepts(VoxelCoordinate::new(i32::MIN, 0, i32::MAX)));
    }
}
