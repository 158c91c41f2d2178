// src/gpu/layout.rs
//! `#[repr(C)]` mirrors of the structs declared in `shaders/frustum_cull.wgsl`.

use bytemuck::{Pod, Zeroable};

use crate::culling::{Aabb, AnchorPolicy};

/// Bytes before `boxes` in the AABB storage buffer.
pub const AABB_HEADER_SIZE: u64 = std::mem::size_of::<AabbHeader>() as u64;

/// Bytes before `ids` in the visible-ID storage buffer.
pub const VISIBLE_HEADER_SIZE: u64 = std::mem::size_of::<u32>() as u64;

/// `AabbSet` header: population size, anchor (`u32::MAX` for none), and the
/// capacity of the visible-ID buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct AabbHeader {
    pub count: u32,
    pub anchor: u32,
    pub capacity: u32,
    pub _pad: u32,
}

impl AabbHeader {
    pub fn new(count: u32, anchor: AnchorPolicy, capacity: u32) -> Self {
        Self {
            count,
            anchor: anchor.to_gpu(),
            capacity,
            _pad: 0,
        }
    }
}

/// One world-space box, `vec4` aligned; `w` is unused.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GpuAabb {
    pub lo: [f32; 4],
    pub hi: [f32; 4],
}

impl From<&Aabb> for GpuAabb {
    fn from(aabb: &Aabb) -> Self {
        Self {
            lo: aabb.min.extend(0.0).to_array(),
            hi: aabb.max.extend(0.0).to_array(),
        }
    }
}

/// Indexed indirect draw record as consumed by `draw_indexed_indirect`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct IndirectDrawArgs {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}

impl IndirectDrawArgs {
    /// Per-frame reset value: instance count zero, all offsets zero.
    pub const fn template(index_count: u32) -> Self {
        Self {
            index_count,
            instance_count: 0,
            first_index: 0,
            base_vertex: 0,
            first_instance: 0,
        }
    }
}

pub const INDIRECT_ARGS_SIZE: u64 = std::mem::size_of::<IndirectDrawArgs>() as u64;
