//! Brick store: voxel bytes grouped per brick, each brick behind its own lock.
//!
//! Writers take per-brick write locks, so region uploads touching disjoint
//! bricks can run from several threads at once. Readers (traversal) take
//! per-brick read locks. Overlapping concurrent writes are not ordered.

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::error::{ConfigError, Error};
use crate::core::types::{IVec3, Result};
use crate::math::aabb::Region;
use crate::volume::layout::{brick_offset, BrickLayout, BRICK_VOXELS, BRICK_WIDTH};
use crate::volume::voxel_type::VoxelType;
use crate::volume::VOLUME_TYPE;

/// Minimum number of touched bricks before a region copy fans out to rayon.
const PARALLEL_MIN_BRICKS: usize = 8;

/// When brick memory is allocated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrickAllocation {
    /// Every brick is allocated (zeroed) when the store is created.
    #[default]
    Eager,
    /// Bricks are allocated on first write; unwritten bricks read as zero.
    Sparse,
}

impl BrickAllocation {
    pub fn name(&self) -> &'static str {
        match self {
            BrickAllocation::Eager => "eager",
            BrickAllocation::Sparse => "sparse",
        }
    }
}

impl FromStr for BrickAllocation {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "eager" => Ok(BrickAllocation::Eager),
            "sparse" => Ok(BrickAllocation::Sparse),
            other => Err(ConfigError::InvalidParameter {
                name: "brickAllocation",
                reason: format!("expected \"eager\" or \"sparse\", got \"{}\"", other),
            }),
        }
    }
}

type Brick = RwLock<Option<Box<[u8]>>>;

/// Brick-blocked voxel storage for one volume.
pub struct BrickStore {
    layout: BrickLayout,
    voxel_type: VoxelType,
    allocation: BrickAllocation,
    bricks: Vec<Brick>,
    allocated: AtomicUsize,
}

impl BrickStore {
    /// Create a store for `dimensions` (all components > 0).
    pub fn new(dimensions: IVec3, voxel_type: VoxelType, allocation: BrickAllocation) -> Self {
        let layout = BrickLayout::new(dimensions);
        let count = layout.brick_count();
        let brick_bytes = BRICK_VOXELS * voxel_type.size();

        let bricks: Vec<Brick> = match allocation {
            BrickAllocation::Eager => (0..count)
                .into_par_iter()
                .map(|_| RwLock::new(Some(vec![0u8; brick_bytes].into_boxed_slice())))
                .collect(),
            BrickAllocation::Sparse => (0..count).map(|_| RwLock::new(None)).collect(),
        };
        let allocated = match allocation {
            BrickAllocation::Eager => count,
            BrickAllocation::Sparse => 0,
        };

        log::debug!(
            "Created brick store: {} {}x{}x{}, {} bricks ({}), {}KB allocated",
            voxel_type,
            dimensions.x,
            dimensions.y,
            dimensions.z,
            count,
            allocation.name(),
            allocated * brick_bytes / 1024
        );

        Self {
            layout,
            voxel_type,
            allocation,
            bricks,
            allocated: AtomicUsize::new(allocated),
        }
    }

    pub fn layout(&self) -> &BrickLayout {
        &self.layout
    }

    pub fn dimensions(&self) -> IVec3 {
        self.layout.dimensions()
    }

    pub fn voxel_type(&self) -> VoxelType {
        self.voxel_type
    }

    pub fn allocation(&self) -> BrickAllocation {
        self.allocation
    }

    pub fn brick_count(&self) -> usize {
        self.bricks.len()
    }

    /// Bricks with physical storage.
    pub fn allocated_bricks(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Bytes of voxel storage currently allocated.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bricks() * BRICK_VOXELS * self.voxel_type.size()
    }

    /// Whether this store can be reused for the given configuration.
    pub fn matches(&self, dimensions: IVec3, voxel_type: VoxelType, allocation: BrickAllocation) -> bool {
        self.dimensions() == dimensions && self.voxel_type == voxel_type && self.allocation == allocation
    }

    /// Check a region write without touching memory.
    pub fn validate_region(&self, source_len: usize, origin: IVec3, count: IVec3) -> Result<Region> {
        let region = Region::new(origin, count);
        if region.is_empty() || !Region::from_dimensions(self.dimensions()).contains_region(&region) {
            return Err(Error::Range {
                object: VOLUME_TYPE,
                origin,
                count,
                dimensions: self.dimensions(),
            });
        }
        let expected = region.voxel_count() * self.voxel_type.size();
        if source_len < expected {
            return Err(Error::SourceSize {
                object: VOLUME_TYPE,
                expected,
                actual: source_len,
            });
        }
        Ok(region)
    }

    /// Copy `count` voxels of contiguous source data (x fastest, then y, then z)
    /// into the grid starting at `origin`.
    ///
    /// The region and source length are validated before any write; a failed
    /// call leaves the store unchanged.
    pub fn write_region(&self, source: &[u8], origin: IVec3, count: IVec3) -> Result<()> {
        let region = self.validate_region(source.len(), origin, count)?;
        let touched = self.layout.bricks_overlapping(&region);

        let copy = |&index: &usize| self.copy_into_brick(index, source, &region);
        if touched.len() >= PARALLEL_MIN_BRICKS {
            touched.par_iter().for_each(copy);
        } else {
            touched.iter().for_each(copy);
        }

        log::trace!(
            "Wrote region origin={} count={} ({} bricks)",
            origin,
            count,
            touched.len()
        );
        Ok(())
    }

    fn copy_into_brick(&self, index: usize, source: &[u8], region: &Region) {
        let Some(part) = self.layout.brick_region(index).intersection(region) else {
            return;
        };
        let size = self.voxel_type.size();
        let brick_origin = self.layout.brick_coord_of_index(index) * BRICK_WIDTH;
        let row = region.count.x as usize;
        let slice = row * region.count.y as usize;

        let mut guard = self.bricks[index].write();
        let data = guard.get_or_insert_with(|| {
            self.allocated.fetch_add(1, Ordering::Relaxed);
            vec![0u8; BRICK_VOXELS * size].into_boxed_slice()
        });

        for z in part.origin.z..part.origin.z + part.count.z {
            for y in part.origin.y..part.origin.y + part.count.y {
                let src_row = (z - region.origin.z) as usize * slice
                    + (y - region.origin.y) as usize * row;
                for x in part.origin.x..part.origin.x + part.count.x {
                    let src = (src_row + (x - region.origin.x) as usize) * size;
                    let dst = brick_offset(IVec3::new(x, y, z) - brick_origin) * size;
                    data[dst..dst + size].copy_from_slice(&source[src..src + size]);
                }
            }
        }
    }

    /// Decoded value at a grid coordinate, `None` outside the grid.
    pub fn voxel(&self, p: IVec3) -> Option<f32> {
        if p.cmplt(IVec3::ZERO).any() || p.cmpge(self.dimensions()).any() {
            return None;
        }
        let (brick, offset) = self.layout.locate(p);
        let size = self.voxel_type.size();
        let guard = self.bricks[brick].read();
        Some(match guard.as_ref() {
            Some(data) => self.voxel_type.decode(&data[offset * size..(offset + 1) * size]),
            None => 0.0,
        })
    }
}

impl std::fmt::Debug for BrickStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrickStore")
            .field("dimensions", &self.dimensions())
            .field("voxel_type", &self.voxel_type)
            .field("allocation", &self.allocation)
            .field("bricks", &self.bricks.len())
            .field("allocated", &self.allocated_bricks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(count: usize) -> Vec<u8> {
        (0..count).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_eager_allocates_everything() {
        let store = BrickStore::new(IVec3::new(16, 8, 9), VoxelType::Float, BrickAllocation::Eager);
        assert_eq!(store.brick_count(), 4);
        assert_eq!(store.allocated_bricks(), 4);
        assert_eq!(store.allocated_bytes(), 4 * BRICK_VOXELS * 4);
        assert_eq!(store.voxel(IVec3::new(15, 7, 8)), Some(0.0));
    }

    #[test]
    fn test_sparse_allocates_on_write() {
        let store = BrickStore::new(IVec3::splat(32), VoxelType::UChar, BrickAllocation::Sparse);
        assert_eq!(store.allocated_bricks(), 0);
        assert_eq!(store.voxel(IVec3::new(20, 20, 20)), Some(0.0));

        store.write_region(&[7], IVec3::new(9, 1, 1), IVec3::ONE).unwrap();
        assert_eq!(store.allocated_bricks(), 1);
        assert_eq!(store.voxel(IVec3::new(9, 1, 1)), Some(7.0));

        // Writing the same brick again does not allocate.
        store.write_region(&[8], IVec3::new(10, 1, 1), IVec3::ONE).unwrap();
        assert_eq!(store.allocated_bricks(), 1);
    }

    #[test]
    fn test_region_round_trip_across_bricks() {
        let dims = IVec3::new(20, 12, 10);
        let store = BrickStore::new(dims, VoxelType::UChar, BrickAllocation::Eager);
        let origin = IVec3::new(5, 3, 2);
        let count = IVec3::new(12, 7, 8);
        let data = ramp(count.x as usize * count.y as usize * count.z as usize);
        store.write_region(&data, origin, count).unwrap();

        for z in 0..count.z {
            for y in 0..count.y {
                for x in 0..count.x {
                    let i = (x + count.x * (y + count.y * z)) as usize;
                    assert_eq!(store.voxel(origin + IVec3::new(x, y, z)), Some(data[i] as f32));
                }
            }
        }
        // Outside the region stays zero.
        assert_eq!(store.voxel(IVec3::new(0, 0, 0)), Some(0.0));
    }

    #[test]
    fn test_out_of_range_write_is_rejected_without_side_effects() {
        let store = BrickStore::new(IVec3::splat(4), VoxelType::UChar, BrickAllocation::Sparse);
        let err = store
            .write_region(&[1; 8], IVec3::splat(3), IVec3::splat(2))
            .unwrap_err();
        assert!(matches!(err, Error::Range { .. }));
        assert_eq!(store.allocated_bricks(), 0);
        assert_eq!(store.voxel(IVec3::splat(3)), Some(0.0));
    }

    #[test]
    fn test_negative_origin_and_empty_count_rejected() {
        let store = BrickStore::new(IVec3::splat(4), VoxelType::UChar, BrickAllocation::Eager);
        assert!(store.write_region(&[1], IVec3::new(-1, 0, 0), IVec3::ONE).is_err());
        assert!(store.write_region(&[], IVec3::ZERO, IVec3::new(0, 1, 1)).is_err());
    }

    #[test]
    fn test_short_source_rejected() {
        let store = BrickStore::new(IVec3::splat(4), VoxelType::Float, BrickAllocation::Eager);
        let err = store.write_region(&[0; 7], IVec3::ZERO, IVec3::new(2, 1, 1)).unwrap_err();
        assert!(matches!(err, Error::SourceSize { expected: 8, actual: 7, .. }));
    }

    #[test]
    fn test_out_of_grid_read() {
        let store = BrickStore::new(IVec3::splat(4), VoxelType::UChar, BrickAllocation::Eager);
        assert_eq!(store.voxel(IVec3::new(4, 0, 0)), None);
        assert_eq!(store.voxel(IVec3::new(0, -1, 0)), None);
    }

    #[test]
    fn test_concurrent_disjoint_writes() {
        let dims = IVec3::new(8, 8, 64);
        let store = BrickStore::new(dims, VoxelType::UShort, BrickAllocation::Sparse);
        let slab = IVec3::new(8, 8, 8);

        std::thread::scope(|scope| {
            for k in 0..8 {
                let store = &store;
                let data = VoxelType::UShort.encode(&vec![k as f32 + 1.0; 512]);
                scope.spawn(move || {
                    store.write_region(&data, IVec3::new(0, 0, k * 8), slab).unwrap();
                });
            }
        });

        assert_eq!(store.allocated_bricks(), 8);
        for k in 0..8 {
            assert_eq!(store.voxel(IVec3::new(3, 3, k * 8 + 5)), Some(k as f32 + 1.0));
        }
    }

    #[test]
    fn test_allocation_parse() {
        assert_eq!("sparse".parse::<BrickAllocation>(), Ok(BrickAllocation::Sparse));
        assert!(matches!(
            "lazy".parse::<BrickAllocation>(),
            Err(ConfigError::InvalidParameter { name: "brickAllocation", .. })
        ));
    }
}
