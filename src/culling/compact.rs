// src/culling/compact.rs
//! Gathers per-instance attributes into visible-set order.
//!
//! The CPU path draws `0..visible.len()` instances, so slot `i` of the
//! attribute stream must belong to `visible[i]`, not to instance `i`.

use bytemuck::{Pod, Zeroable};

use super::InstanceId;

/// Per-instance render attributes, one instance-step vertex each.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct InstanceAttributes {
    pub texture_index: u32,
    /// Non-zero when the normal map is applied.
    pub normal_map: u32,
}

impl InstanceAttributes {
    pub const fn new(texture_index: u32, normal_map: bool) -> Self {
        Self {
            texture_index,
            normal_map: normal_map as u32,
        }
    }

    pub const ATTRIBS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![4 => Uint32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Clears `out` and fills it so `out[i] == table[visible[i]]`.
///
/// # Panics
/// If an ID indexes past `table`; visible IDs always come from the same
/// population the table describes.
pub fn compact_instance_data(
    visible: &[InstanceId],
    table: &[InstanceAttributes],
    out: &mut Vec<InstanceAttributes>,
) {
    out.clear();
    out.extend(visible.iter().map(|id| table[id.index()]));
}
