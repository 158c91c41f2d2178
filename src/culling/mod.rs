// src/culling/mod.rs
//! # CPU culling core
//!
//! * **Frustum extraction** from a left-handed view-projection matrix.
//! * **AABB transform** of the shared local bounds into world space.
//! * **Positive-vertex visibility test** producing a bounded, ordered
//!   [`VisibleSet`], with an optional always-visible anchor.
//! * **Attribute compaction** so a dense instanced draw pairs every visible
//!   instance with its own attributes.
//!
//! The GPU mirror of the same test lives in [`crate::gpu`]; both paths call
//! one predicate, written once per target (`is_box_visible` here,
//! `shaders/cull_predicate.wgsl` there).

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

pub mod aabb;
pub mod compact;
pub mod frustum;
pub mod visibility;

pub use aabb::Aabb;
pub use compact::{compact_instance_data, InstanceAttributes};
pub use frustum::{Frustum, GpuFrustum, Plane};
pub use visibility::{is_box_visible, AnchorPolicy, CpuVisibilityTester, VisibleSet};

/// Identifier of an instance, stable for the lifetime of the population.
///
/// Doubles as the instance's index into every per-instance table.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct InstanceId(pub u32);

impl InstanceId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
