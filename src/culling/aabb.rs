// src/culling/aabb.rs
//! Axis-aligned boxes and their world-space transform.

use glam::{Mat4, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// `min <= max` on every axis. Zero-volume boxes are valid.
    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ]
    }

    /// Corner furthest along `normal`: per axis, `max` where the normal
    /// component is `>= 0`, else `min`.
    #[inline]
    pub fn positive_vertex(&self, normal: Vec3) -> Vec3 {
        Vec3::select(normal.cmpge(Vec3::ZERO), self.max, self.min)
    }

    /// World-space bounds of this local box under `model`.
    ///
    /// All eight corners go through the transform; taking only `min`/`max`
    /// would be wrong as soon as `model` rotates.
    pub fn transformed(&self, model: &Mat4) -> Aabb {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for corner in self.corners() {
            let p = model.transform_point3(corner);
            min = min.min(p);
            max = max.max(p);
        }
        Aabb { min, max }
    }
}
