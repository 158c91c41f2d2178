// src/culling/frustum.rs
//! View-frustum plane extraction.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// A half-space boundary `normal · p + offset >= 0` (inside is non-negative).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub offset: f32,
}

impl Plane {
    /// Builds a plane from raw `(a, b, c, d)` coefficients, dividing by the
    /// length of `(a, b, c)` so signed distances are in world units.
    pub fn from_coefficients(coeffs: Vec4) -> Self {
        let normal = coeffs.truncate();
        let len = normal.length();
        debug_assert!(len > 0.0, "degenerate frustum plane {coeffs:?}");
        Self {
            normal: normal / len,
            offset: coeffs.w / len,
        }
    }

    #[inline]
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.offset
    }

    #[inline]
    pub fn to_vec4(self) -> Vec4 {
        self.normal.extend(self.offset)
    }
}

/// Six planes ordered near, far, left, right, top, bottom.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    pub const NEAR: usize = 0;
    pub const FAR: usize = 1;
    pub const LEFT: usize = 2;
    pub const RIGHT: usize = 3;
    pub const TOP: usize = 4;
    pub const BOTTOM: usize = 5;

    /// Extracts the planes of a world-to-clip transform.
    ///
    /// `view_proj` must map into a left-handed clip space with depth in
    /// `0..=1` (`Mat4::perspective_lh`), and must be invertible.
    pub fn from_view_projection(view_proj: &Mat4) -> Self {
        let r0 = view_proj.row(0);
        let r1 = view_proj.row(1);
        let r2 = view_proj.row(2);
        let r3 = view_proj.row(3);

        Self {
            planes: [
                Plane::from_coefficients(r2),
                Plane::from_coefficients(r3 - r2),
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 - r1),
                Plane::from_coefficients(r3 + r1),
            ],
        }
    }

    /// GPU upload form, one `vec4<f32>` per plane.
    pub fn to_gpu(&self) -> GpuFrustum {
        GpuFrustum {
            planes: self.planes.map(|p| p.to_vec4().to_array()),
        }
    }
}

/// Uniform layout of the frustum, `array<vec4<f32>, 6>` in WGSL.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuFrustum {
    pub planes: [[f32; 4]; 6],
}
