//! Brick layout: the pure mapping from grid coordinates to brick storage.
//!
//! The grid is cut into 8x8x8 bricks. Bricks are numbered linearly (x fastest);
//! voxels inside a brick are stored in Morton order so that neighbours along
//! every axis tend to share cache lines during traversal. Edge bricks are
//! padded to full size, which keeps the mapping branch-free.

use crate::core::types::IVec3;
use crate::math::aabb::Region;

/// log2 of the brick edge length
pub const BRICK_WIDTH_LOG2: u32 = 3;

/// Voxels per brick edge
pub const BRICK_WIDTH: i32 = 1 << BRICK_WIDTH_LOG2;

/// Voxels per brick
pub const BRICK_VOXELS: usize = (BRICK_WIDTH * BRICK_WIDTH * BRICK_WIDTH) as usize;

/// Spread the low three bits of `v` into every third bit.
#[inline]
fn spread3(v: u32) -> u32 {
    (v & 1) | ((v & 2) << 2) | ((v & 4) << 4)
}

/// Morton offset of a voxel inside its brick (local coordinates 0..8 each axis).
#[inline]
pub fn brick_offset(local: IVec3) -> usize {
    debug_assert!(local.cmpge(IVec3::ZERO).all() && local.cmplt(IVec3::splat(BRICK_WIDTH)).all());
    (spread3(local.x as u32) | (spread3(local.y as u32) << 1) | (spread3(local.z as u32) << 2)) as usize
}

/// Bricks needed to cover `extent` voxels. Computed in i64 so extents near
/// `i32::MAX` cannot wrap.
#[inline]
fn bricks_for(extent: i32) -> i32 {
    ((extent.max(0) as i64 + (BRICK_WIDTH - 1) as i64) >> BRICK_WIDTH_LOG2) as i32
}

/// Grid partition for one volume. Immutable once built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BrickLayout {
    dimensions: IVec3,
    bricks: IVec3,
}

impl BrickLayout {
    /// Layout for a grid with strictly positive dimensions accepted by
    /// [`BrickLayout::try_new`].
    pub fn new(dimensions: IVec3) -> Self {
        debug_assert!(dimensions.min_element() > 0);
        let bricks = IVec3::new(bricks_for(dimensions.x), bricks_for(dimensions.y), bricks_for(dimensions.z));
        Self { dimensions, bricks }
    }

    /// Layout for `dimensions`, or `None` when an axis is non-positive, the
    /// padded grid does not fit `i32` coordinates, or the brick count does
    /// not fit `usize`.
    pub fn try_new(dimensions: IVec3) -> Option<Self> {
        let padded_max = i32::MAX - (BRICK_WIDTH - 1);
        if dimensions.min_element() <= 0 || dimensions.max_element() > padded_max {
            return None;
        }
        let layout = Self::new(dimensions);
        layout.checked_brick_count()?;
        Some(layout)
    }

    fn checked_brick_count(&self) -> Option<usize> {
        (self.bricks.x as usize)
            .checked_mul(self.bricks.y as usize)?
            .checked_mul(self.bricks.z as usize)
    }

    /// Bytes needed to back every brick with `voxel_size`-byte voxels, or
    /// `None` when that exceeds the largest possible allocation.
    pub fn storage_bytes(&self, voxel_size: usize) -> Option<usize> {
        self.checked_brick_count()?
            .checked_mul(BRICK_VOXELS)?
            .checked_mul(voxel_size)
            .filter(|&bytes| bytes <= isize::MAX as usize)
    }

    pub fn dimensions(&self) -> IVec3 {
        self.dimensions
    }

    /// Bricks along each axis
    pub fn bricks_per_axis(&self) -> IVec3 {
        self.bricks
    }

    pub fn brick_count(&self) -> usize {
        self.checked_brick_count().unwrap_or(usize::MAX)
    }

    /// Brick coordinate containing a voxel
    #[inline]
    pub fn brick_coord(voxel: IVec3) -> IVec3 {
        IVec3::new(
            voxel.x >> BRICK_WIDTH_LOG2,
            voxel.y >> BRICK_WIDTH_LOG2,
            voxel.z >> BRICK_WIDTH_LOG2,
        )
    }

    /// Linear index of a brick coordinate
    #[inline]
    pub fn brick_index(&self, brick: IVec3) -> usize {
        brick.x as usize
            + self.bricks.x as usize * (brick.y as usize + self.bricks.y as usize * brick.z as usize)
    }

    /// Brick coordinate of a linear index
    pub fn brick_coord_of_index(&self, index: usize) -> IVec3 {
        let bx = self.bricks.x as usize;
        let by = self.bricks.y as usize;
        IVec3::new(
            (index % bx) as i32,
            ((index / bx) % by) as i32,
            (index / (bx * by)) as i32,
        )
    }

    /// `(brick index, offset within brick)` for an in-grid voxel.
    #[inline]
    pub fn locate(&self, voxel: IVec3) -> (usize, usize) {
        let brick = Self::brick_coord(voxel);
        let local = voxel - brick * BRICK_WIDTH;
        (self.brick_index(brick), brick_offset(local))
    }

    /// Grid voxels covered by a brick, clipped to the grid.
    pub fn brick_region(&self, index: usize) -> Region {
        let origin = self.brick_coord_of_index(index) * BRICK_WIDTH;
        let count = (self.dimensions - origin).min(IVec3::splat(BRICK_WIDTH));
        Region::new(origin, count)
    }

    /// Indices of all bricks touched by an in-grid region.
    pub fn bricks_overlapping(&self, region: &Region) -> Vec<usize> {
        if region.is_empty() {
            return Vec::new();
        }
        let lo = Self::brick_coord(region.origin);
        let hi = Self::brick_coord(region.origin + region.count - IVec3::ONE);
        let mut indices = Vec::new();
        for z in lo.z..=hi.z {
            for y in lo.y..=hi.y {
                for x in lo.x..=hi.x {
                    indices.push(self.brick_index(IVec3::new(x, y, z)));
                }
            }
        }
        indices
    }
}
