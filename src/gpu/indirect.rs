// src/gpu/indirect.rs
//! Indirect draw argument staging.
//!
//! Two buffers: the kernel mutates `staging` through a storage binding, then
//! a copy hands the finished record to `draw`, which is only ever bound as
//! an indirect argument source.

use wgpu::util::DeviceExt;

use super::layout::{IndirectDrawArgs, INDIRECT_ARGS_SIZE};

pub struct IndirectArgsBuilder {
    template: IndirectDrawArgs,
    staging: wgpu::Buffer,
    draw: wgpu::Buffer,
}

impl IndirectArgsBuilder {
    /// `index_count` is the per-instance index count of the drawn mesh.
    pub fn new(device: &wgpu::Device, index_count: u32) -> Self {
        let template = IndirectDrawArgs::template(index_count);

        let staging = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("indirect_args_staging"),
            contents: bytemuck::bytes_of(&template),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
        });
        let draw = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("indirect_args_draw"),
            contents: bytemuck::bytes_of(&template),
            usage: wgpu::BufferUsages::INDIRECT
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
        });

        Self {
            template,
            staging,
            draw,
        }
    }

    /// Overwrites the staging record with the template. Queue writes land
    /// before any command buffer of the same submit, so this always precedes
    /// the dispatch that increments `instance_count`.
    pub fn reset(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.staging, 0, bytemuck::bytes_of(&self.template));
    }

    /// Hands the kernel's result to the draw-bound buffer. Record after the
    /// culling dispatch and before the render pass.
    pub fn encode_copy(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.copy_buffer_to_buffer(&self.staging, 0, &self.draw, 0, INDIRECT_ARGS_SIZE);
    }

    #[inline]
    pub fn template(&self) -> IndirectDrawArgs {
        self.template
    }

    /// Storage binding for the culling kernel.
    #[inline]
    pub fn staging_buffer(&self) -> &wgpu::Buffer {
        &self.staging
    }

    /// Argument buffer for `draw_indexed_indirect`.
    #[inline]
    pub fn draw_buffer(&self) -> &wgpu::Buffer {
        &self.draw
    }
}
