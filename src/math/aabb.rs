//! Bounding boxes: float `Aabb` for continuous positions, integer `Region`
//! for voxel index ranges.

use crate::core::types::{IVec3, Vec3};

/// Axis-aligned bounding box defined by min and max corners
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create AABB from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Grid-space bounds of a volume with the given dimensions.
    ///
    /// Voxel centers sit on integer coordinates, so the last sample along
    /// each axis is at `dimensions - 1`.
    pub fn from_dimensions(dimensions: IVec3) -> Self {
        Self {
            min: Vec3::ZERO,
            max: (dimensions - IVec3::ONE).max(IVec3::ZERO).as_vec3(),
        }
    }

    /// Get size (max - min)
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Get center point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Check if point is inside AABB (inclusive)
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Clamp a point into the box
    pub fn clamp(&self, p: Vec3) -> Vec3 {
        p.clamp(self.min, self.max)
    }
}

/// Half-open box of voxel indices: `[origin, origin + count)` on every axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Region {
    pub origin: IVec3,
    pub count: IVec3,
}

impl Region {
    pub fn new(origin: IVec3, count: IVec3) -> Self {
        Self { origin, count }
    }

    /// The whole grid of a volume.
    pub fn from_dimensions(dimensions: IVec3) -> Self {
        Self { origin: IVec3::ZERO, count: dimensions }
    }

    /// Exclusive upper corner. Computed in i64 so huge counts cannot wrap.
    pub fn end(&self) -> [i64; 3] {
        [
            self.origin.x as i64 + self.count.x as i64,
            self.origin.y as i64 + self.count.y as i64,
            self.origin.z as i64 + self.count.z as i64,
        ]
    }

    /// Number of voxels in the region (0 if any axis is non-positive).
    pub fn voxel_count(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        self.count.x as usize * self.count.y as usize * self.count.z as usize
    }

    /// True when any axis has a non-positive count.
    pub fn is_empty(&self) -> bool {
        self.count.min_element() <= 0
    }

    /// Check if point lies in the region
    pub fn contains_point(&self, p: IVec3) -> bool {
        let end = self.end();
        p.cmpge(self.origin).all()
            && (p.x as i64) < end[0]
            && (p.y as i64) < end[1]
            && (p.z as i64) < end[2]
    }

    /// Check if `other` lies entirely inside this region.
    pub fn contains_region(&self, other: &Region) -> bool {
        let end = self.end();
        let other_end = other.end();
        other.origin.cmpge(self.origin).all()
            && (0..3).all(|axis| other_end[axis] <= end[axis])
    }

    /// Intersection of two regions, `None` if they do not overlap.
    pub fn intersection(&self, other: &Region) -> Option<Region> {
        let origin = self.origin.max(other.origin);
        let end = self.end();
        let other_end = other.end();
        let mut count = IVec3::ZERO;
        for axis in 0..3 {
            let hi = end[axis].min(other_end[axis]);
            count[axis] = (hi - origin[axis] as i64).max(0) as i32;
        }
        let region = Region::new(origin, count);
        if region.is_empty() { None } else { Some(region) }
    }
}
