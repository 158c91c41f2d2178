// src/culling/visibility.rs
//! CPU visibility test and the bounded visible-ID arena it fills.

use serde::{Deserialize, Serialize};

use super::{Aabb, Frustum, InstanceId};

/// Positive-vertex test of a world-space box against all six planes.
///
/// Rejects only when the box lies strictly outside some plane; a box that
/// touches a plane (distance exactly zero) is visible. Conservative: a box
/// straddling a frustum corner may pass while being outside.
///
/// Mirrored in `shaders/cull_predicate.wgsl`; keep the two in lockstep.
#[inline]
pub fn is_box_visible(frustum: &Frustum, aabb: &Aabb) -> bool {
    frustum
        .planes
        .iter()
        .all(|plane| plane.signed_distance(aabb.positive_vertex(plane.normal)) >= 0.0)
}

// ---------------------------------------------------------------------------
// Anchor policy
// ---------------------------------------------------------------------------

/// Which instance, if any, skips the frustum test and is always drawn.
///
/// Applied identically by [`CpuVisibilityTester`] and the GPU kernel so the
/// two visible counts stay comparable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorPolicy {
    /// Every instance is tested.
    None,
    /// The given instance is accepted without testing.
    AlwaysVisible(InstanceId),
}

impl Default for AnchorPolicy {
    fn default() -> Self {
        AnchorPolicy::AlwaysVisible(InstanceId(0))
    }
}

impl AnchorPolicy {
    /// Sentinel for "no anchor" in the GPU header.
    pub const GPU_NONE: u32 = u32::MAX;

    #[inline]
    pub fn exempts(self, id: InstanceId) -> bool {
        matches!(self, AnchorPolicy::AlwaysVisible(anchor) if anchor == id)
    }

    pub fn to_gpu(self) -> u32 {
        match self {
            AnchorPolicy::None => Self::GPU_NONE,
            AnchorPolicy::AlwaysVisible(id) => id.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Visible set
// ---------------------------------------------------------------------------

/// Fixed-capacity, insertion-ordered list of visible instance IDs.
///
/// Overflow asserts in debug builds. In release builds the extra IDs are
/// dropped and [`push`](Self::push) returns `false`.
#[derive(Clone, Debug)]
pub struct VisibleSet {
    ids: Vec<InstanceId>,
    capacity: usize,
}

impl VisibleSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: Vec::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Appends `id`; returns `false` if the set was already full.
    pub fn push(&mut self, id: InstanceId) -> bool {
        debug_assert!(
            self.ids.len() < self.capacity,
            "visible set overflow: capacity {}",
            self.capacity
        );
        if self.ids.len() >= self.capacity {
            return false;
        }
        self.ids.push(id);
        true
    }

    #[inline]
    pub fn as_slice(&self) -> &[InstanceId] {
        &self.ids
    }

    /// Raw `u32` view for GPU upload.
    #[inline]
    pub fn as_raw(&self) -> &[u32] {
        bytemuck::cast_slice(&self.ids)
    }

    pub fn iter(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.ids.iter().copied()
    }
}

// ---------------------------------------------------------------------------
// Tester
// ---------------------------------------------------------------------------

/// Frame-by-frame CPU culling of a fixed population.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuVisibilityTester {
    pub anchor: AnchorPolicy,
}

impl CpuVisibilityTester {
    pub fn new(anchor: AnchorPolicy) -> Self {
        Self { anchor }
    }

    /// Clears `out` and refills it with every instance whose world box
    /// passes [`is_box_visible`], in ascending ID order. `world_boxes[i]`
    /// belongs to `InstanceId(i)`.
    pub fn run(&self, frustum: &Frustum, world_boxes: &[Aabb], out: &mut VisibleSet) {
        out.clear();
        let mut dropped = 0usize;

        for (index, aabb) in world_boxes.iter().enumerate() {
            let id = InstanceId(index as u32);
            if self.anchor.exempts(id) || is_box_visible(frustum, aabb) {
                if !out.push(id) {
                    dropped += 1;
                }
            }
        }

        if dropped > 0 {
            log::warn!(
                "visible set full at {}, dropped {} instance(s)",
                out.capacity(),
                dropped
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::culling::Plane;
    use glam::{Mat4, Vec3};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn forward_frustum() -> Frustum {
        let proj = Mat4::perspective_lh(std::f32::consts::FRAC_PI_3, 16.0 / 9.0, 0.1, 1000.0);
        Frustum::from_view_projection(&proj)
    }

    fn cube_at(center: Vec3) -> Aabb {
        Aabb::new(center - Vec3::splat(0.5), center + Vec3::splat(0.5))
    }

    fn half_space_x() -> Frustum {
        let plane = Plane {
            normal: Vec3::X,
            offset: 0.0,
        };
        Frustum { planes: [plane; 6] }
    }

    #[test]
    fn touching_box_is_visible() {
        let touching = Aabb::new(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 1.0));
        assert!(is_box_visible(&half_space_x(), &touching));

        let degenerate_on_plane = Aabb::new(Vec3::ZERO, Vec3::new(0.0, 1.0, 1.0));
        assert!(is_box_visible(&half_space_x(), &degenerate_on_plane));

        let just_outside = Aabb::new(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(-1e-3, 1.0, 1.0));
        assert!(!is_box_visible(&half_space_x(), &just_outside));
    }

    #[test]
    fn inside_and_outside_boxes() {
        let frustum = forward_frustum();
        assert!(is_box_visible(&frustum, &cube_at(Vec3::new(0.0, 0.0, 10.0))));
        assert!(!is_box_visible(&frustum, &cube_at(Vec3::new(0.0, 0.0, -10.0))));
        assert!(!is_box_visible(&frustum, &cube_at(Vec3::new(0.0, 0.0, 2000.0))));
        assert!(!is_box_visible(&frustum, &cube_at(Vec3::new(50.0, 0.0, 10.0))));
        // Straddling the left plane.
        assert!(is_box_visible(&frustum, &cube_at(Vec3::new(-10.5, 0.0, 10.0))));
    }

    #[test]
    fn predicate_matches_corner_brute_force() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut checked = 0;
        for _ in 0..2000 {
            let eye = Vec3::new(
                rng.gen_range(-20.0..20.0),
                rng.gen_range(-5.0..5.0),
                rng.gen_range(-20.0..20.0),
            );
            let target = Vec3::new(rng.gen_range(-1.0..1.0), 0.0, rng.gen_range(-1.0..1.0));
            if glam::Vec2::new(eye.x - target.x, eye.z - target.z).length() < 0.5 {
                continue;
            }
            let view = Mat4::look_at_lh(eye, target, Vec3::Y);
            let proj = Mat4::perspective_lh(rng.gen_range(0.3..2.0), 1.5, 0.1, 100.0);
            let frustum = Frustum::from_view_projection(&(proj * view));

            let center = Vec3::new(
                rng.gen_range(-30.0..30.0),
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-30.0..30.0),
            );
            let half = Vec3::new(
                rng.gen_range(0.0..3.0),
                rng.gen_range(0.0..3.0),
                rng.gen_range(0.0..3.0),
            );
            let aabb = Aabb::new(center - half, center + half);

            // Per plane, the furthest corner decides; skip near-ties.
            let margins: Vec<f32> = frustum
                .planes
                .iter()
                .map(|p| {
                    aabb.corners()
                        .iter()
                        .map(|c| p.signed_distance(*c))
                        .fold(f32::NEG_INFINITY, f32::max)
                })
                .collect();
            if margins.iter().any(|m| m.abs() < 1e-3) {
                continue;
            }
            let expected = margins.iter().all(|m| *m > 0.0);
            assert_eq!(is_box_visible(&frustum, &aabb), expected, "{aabb:?} vs {frustum:?}");
            checked += 1;
        }
        assert!(checked > 1500);
    }

    #[test]
    fn tester_orders_by_id_and_skips_hidden() {
        let frustum = forward_frustum();
        let boxes = [
            cube_at(Vec3::new(0.0, 0.0, 5.0)),
            cube_at(Vec3::new(0.0, 0.0, -5.0)),
            cube_at(Vec3::new(1.0, 0.0, 8.0)),
            cube_at(Vec3::new(0.0, 300.0, 8.0)),
            cube_at(Vec3::new(-1.0, 1.0, 20.0)),
        ];
        let mut out = VisibleSet::with_capacity(boxes.len());
        CpuVisibilityTester::new(AnchorPolicy::None).run(&frustum, &boxes, &mut out);
        assert_eq!(out.as_slice(), &[InstanceId(0), InstanceId(2), InstanceId(4)]);
        assert_eq!(out.as_raw(), &[0, 2, 4]);
    }

    #[test]
    fn anchor_is_exempt_from_the_test() {
        let frustum = forward_frustum();
        let boxes = [
            cube_at(Vec3::new(0.0, 0.0, -5.0)),
            cube_at(Vec3::new(0.0, 0.0, 5.0)),
        ];
        let mut out = VisibleSet::with_capacity(2);

        CpuVisibilityTester::new(AnchorPolicy::None).run(&frustum, &boxes, &mut out);
        assert_eq!(out.as_slice(), &[InstanceId(1)]);

        CpuVisibilityTester::default().run(&frustum, &boxes, &mut out);
        assert_eq!(out.as_slice(), &[InstanceId(0), InstanceId(1)]);

        // An anchor outside the population has no effect.
        CpuVisibilityTester::new(AnchorPolicy::AlwaysVisible(InstanceId(7)))
            .run(&frustum, &boxes, &mut out);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn empty_population_gives_empty_set() {
        let mut out = VisibleSet::with_capacity(4);
        assert!(out.push(InstanceId(3)));
        CpuVisibilityTester::default().run(&forward_frustum(), &[], &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn anchor_gpu_encoding() {
        assert_eq!(AnchorPolicy::None.to_gpu(), u32::MAX);
        assert_eq!(AnchorPolicy::AlwaysVisible(InstanceId(3)).to_gpu(), 3);
        assert!(AnchorPolicy::default().exempts(InstanceId(0)));
        assert!(!AnchorPolicy::None.exempts(InstanceId(0)));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "visible set overflow")]
    fn overflow_asserts_in_debug() {
        let mut set = VisibleSet::with_capacity(1);
        set.push(InstanceId(0));
        set.push(InstanceId(1));
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn overflow_clamps_in_release() {
        let frustum = forward_frustum();
        let boxes = [cube_at(Vec3::new(0.0, 0.0, 5.0)); 4];
        let mut out = VisibleSet::with_capacity(2);
        CpuVisibilityTester::new(AnchorPolicy::None).run(&frustum, &boxes, &mut out);
        assert_eq!(out.as_slice(), &[InstanceId(0), InstanceId(1)]);
    }
}
