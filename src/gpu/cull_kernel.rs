// src/gpu/cull_kernel.rs
//! Compute-shader frustum culling.
//!
//! Per frame: [`upload`](GpuCullingKernel::upload) the planes and world
//! boxes, reset the [`IndirectArgsBuilder`], then
//! [`encode`](GpuCullingKernel::encode) the dispatch and the args copy into
//! the same encoder as the draw that consumes them. Queue order is the only
//! synchronization needed.

use crate::culling::{Aabb, AnchorPolicy, Frustum, GpuFrustum, InstanceId};
use crate::error::Result;

use super::indirect::IndirectArgsBuilder;
use super::layout::{
    AabbHeader, GpuAabb, IndirectDrawArgs, AABB_HEADER_SIZE, INDIRECT_ARGS_SIZE,
    VISIBLE_HEADER_SIZE,
};
use super::map_read_blocking;

/// Must match `@workgroup_size` in `frustum_cull.wgsl`.
pub const WORKGROUP_SIZE: u32 = 64;

const PREDICATE_WGSL: &str = include_str!("../shaders/cull_predicate.wgsl");
const KERNEL_WGSL: &str = include_str!("../shaders/frustum_cull.wgsl");

/// Full kernel source: the shared predicate followed by the kernel body.
pub fn kernel_source() -> String {
    format!("{PREDICATE_WGSL}\n{KERNEL_WGSL}")
}

/// Number of workgroups covering `instances` invocations.
#[inline]
pub fn workgroup_count(instances: u32) -> u32 {
    instances.div_ceil(WORKGROUP_SIZE)
}

/// Kernel output copied back to the CPU.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelReadback {
    pub args: IndirectDrawArgs,
    /// Appended IDs in completion order, clamped to capacity.
    pub ids: Vec<InstanceId>,
}

pub struct GpuCullingKernel {
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    frustum_buffer: wgpu::Buffer,
    aabb_buffer: wgpu::Buffer,
    visible_buffer: wgpu::Buffer,
    capacity: u32,
    population: u32,
    scratch: Vec<u8>,
}

impl GpuCullingKernel {
    /// `capacity` bounds both the population and the visible-ID buffer.
    pub fn new(device: &wgpu::Device, capacity: u32, indirect: &IndirectArgsBuilder) -> Self {
        let capacity = capacity.max(1);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("frustum_cull_shader"),
            source: wgpu::ShaderSource::Wgsl(kernel_source().into()),
        });

        let frustum_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("cull_frustum"),
            size: std::mem::size_of::<GpuFrustum>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let aabb_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("cull_aabbs"),
            size: AABB_HEADER_SIZE + capacity as u64 * std::mem::size_of::<GpuAabb>() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let visible_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("cull_visible_ids"),
            size: VISIBLE_HEADER_SIZE + capacity as u64 * 4,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let storage = |read_only: bool| wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        };
        let entry = |binding: u32, ty: wgpu::BindingType| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty,
            count: None,
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frustum_cull_bgl"),
            entries: &[
                entry(
                    0,
                    wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                ),
                entry(1, storage(true)),
                entry(2, storage(false)),
                entry(3, storage(false)),
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frustum_cull_bg"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: frustum_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: aabb_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: indirect.staging_buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: visible_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("frustum_cull_pl"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("frustum_cull_pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: "cull",
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            pipeline,
            bind_group,
            frustum_buffer,
            aabb_buffer,
            visible_buffer,
            capacity,
            population: 0,
            scratch: Vec::new(),
        }
    }

    /// Writes this frame's planes, boxes and anchor. Boxes beyond capacity
    /// are dropped (debug builds assert).
    pub fn upload(
        &mut self,
        queue: &wgpu::Queue,
        frustum: &Frustum,
        world_boxes: &[Aabb],
        anchor: AnchorPolicy,
    ) {
        debug_assert!(
            world_boxes.len() <= self.capacity as usize,
            "{} boxes exceed kernel capacity {}",
            world_boxes.len(),
            self.capacity
        );
        let boxes = if world_boxes.len() > self.capacity as usize {
            log::warn!(
                "culling {} of {} instances, kernel capacity reached",
                self.capacity,
                world_boxes.len()
            );
            &world_boxes[..self.capacity as usize]
        } else {
            world_boxes
        };
        self.population = boxes.len() as u32;

        queue.write_buffer(&self.frustum_buffer, 0, bytemuck::bytes_of(&frustum.to_gpu()));

        let header = AabbHeader::new(self.population, anchor, self.capacity);
        self.scratch.clear();
        self.scratch.extend_from_slice(bytemuck::bytes_of(&header));
        for aabb in boxes {
            self.scratch
                .extend_from_slice(bytemuck::bytes_of(&GpuAabb::from(aabb)));
        }
        queue.write_buffer(&self.aabb_buffer, 0, &self.scratch);
    }

    /// Records the counter reset, the dispatch, and the indirect args
    /// hand-off. The caller resets `indirect` on the queue beforehand.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, indirect: &IndirectArgsBuilder) {
        encoder.clear_buffer(&self.visible_buffer, 0, Some(VISIBLE_HEADER_SIZE));

        if self.population > 0 {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("frustum_cull_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.dispatch_workgroups(workgroup_count(self.population), 1, 1);
        }

        indirect.encode_copy(encoder);
    }

    /// `{count, ids[capacity]}`, bound read-only by the vertex stage.
    #[inline]
    pub fn visible_buffer(&self) -> &wgpu::Buffer {
        &self.visible_buffer
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Blocking copy-out of the last submitted result. Stalls the CPU until
    /// the GPU is idle; never call it from the frame loop.
    pub fn read_back(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        indirect: &IndirectArgsBuilder,
    ) -> Result<KernelReadback> {
        let visible_size = self.visible_buffer.size();
        let ids_dst = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("cull_visible_readback"),
            size: visible_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let args_dst = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("cull_args_readback"),
            size: INDIRECT_ARGS_SIZE,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("cull_readback_encoder"),
        });
        encoder.copy_buffer_to_buffer(&self.visible_buffer, 0, &ids_dst, 0, visible_size);
        encoder.copy_buffer_to_buffer(indirect.draw_buffer(), 0, &args_dst, 0, INDIRECT_ARGS_SIZE);
        queue.submit(Some(encoder.finish()));

        let args_slice = args_dst.slice(..);
        map_read_blocking(device, args_slice)?;
        let args: IndirectDrawArgs = bytemuck::pod_read_unaligned(&args_slice.get_mapped_range());
        args_dst.unmap();

        let ids_slice = ids_dst.slice(..);
        map_read_blocking(device, ids_slice)?;
        let ids = {
            let mapped = ids_slice.get_mapped_range();
            let words: &[u32] = bytemuck::cast_slice(&mapped);
            let count = (words[0] as usize).min(self.capacity as usize);
            words[1..=count].iter().map(|&id| InstanceId(id)).collect()
        };
        ids_dst.unmap();

        Ok(KernelReadback { args, ids })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::culling::{CpuVisibilityTester, VisibleSet};
    use crate::gpu::test_support::headless_device;
    use glam::{Mat4, Vec3};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn workgroups_round_up() {
        assert_eq!(workgroup_count(0), 0);
        assert_eq!(workgroup_count(1), 1);
        assert_eq!(workgroup_count(64), 1);
        assert_eq!(workgroup_count(65), 2);
        assert_eq!(workgroup_count(200), 4);
    }

    #[test]
    fn kernel_source_includes_predicate() {
        let src = kernel_source();
        let predicate = src.find("fn plane_rejects").unwrap();
        let kernel = src.find("fn cull").unwrap();
        assert!(predicate < kernel);
    }

    /// Boxes whose per-plane margins are all clear of zero, so f32
    /// differences between CPU and GPU cannot flip a result.
    fn unambiguous_boxes(frustum: &Frustum, count: usize) -> Vec<Aabb> {
        let mut rng = StdRng::seed_from_u64(42);
        let mut boxes = Vec::with_capacity(count);
        while boxes.len() < count {
            let center = Vec3::new(
                rng.gen_range(-40.0..40.0),
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-20.0..60.0),
            );
            let half = Vec3::splat(rng.gen_range(0.1..2.0));
            let aabb = Aabb::new(center - half, center + half);
            let clear = frustum.planes.iter().all(|p| {
                p.signed_distance(aabb.positive_vertex(p.normal)).abs() > 1e-2
            });
            if clear {
                boxes.push(aabb);
            }
        }
        boxes
    }

    #[test]
    fn gpu_matches_cpu_visible_set() {
        let Some((device, queue)) = headless_device(wgpu::Features::empty()) else {
            eprintln!("skipping gpu_matches_cpu_visible_set: no GPU adapter");
            return;
        };

        let view = Mat4::look_at_lh(Vec3::new(0.0, 2.0, -10.0), Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_lh(std::f32::consts::FRAC_PI_3, 16.0 / 9.0, 0.1, 1000.0);
        let frustum = Frustum::from_view_projection(&(proj * view));
        let boxes = unambiguous_boxes(&frustum, 200);

        let indirect = IndirectArgsBuilder::new(&device, 36);
        let mut kernel = GpuCullingKernel::new(&device, boxes.len() as u32, &indirect);

        for anchor in [AnchorPolicy::None, AnchorPolicy::AlwaysVisible(InstanceId(0))] {
            let mut expected = VisibleSet::with_capacity(boxes.len());
            CpuVisibilityTester::new(anchor).run(&frustum, &boxes, &mut expected);
            assert!(!expected.is_empty() && expected.len() < boxes.len());

            indirect.reset(&queue);
            kernel.upload(&queue, &frustum, &boxes, anchor);
            let mut encoder = device.create_command_encoder(&Default::default());
            kernel.encode(&mut encoder, &indirect);
            queue.submit(Some(encoder.finish()));

            let readback = kernel.read_back(&device, &queue, &indirect).unwrap();
            assert_eq!(readback.args.index_count, 36);
            assert_eq!(readback.args.instance_count as usize, expected.len());

            let mut ids = readback.ids.clone();
            ids.sort();
            assert_eq!(ids.as_slice(), expected.as_slice());
        }
    }

    #[test]
    fn indirect_args_reset_each_frame() {
        let Some((device, queue)) = headless_device(wgpu::Features::empty()) else {
            eprintln!("skipping indirect_args_reset_each_frame: no GPU adapter");
            return;
        };

        let proj = Mat4::perspective_lh(std::f32::consts::FRAC_PI_3, 1.0, 0.1, 100.0);
        let frustum = Frustum::from_view_projection(&proj);
        let visible = Aabb::new(Vec3::new(-0.5, -0.5, 4.5), Vec3::new(0.5, 0.5, 5.5));
        let boxes = [visible; 3];

        let indirect = IndirectArgsBuilder::new(&device, 36);
        let mut kernel = GpuCullingKernel::new(&device, 3, &indirect);

        for _ in 0..3 {
            indirect.reset(&queue);
            kernel.upload(&queue, &frustum, &boxes, AnchorPolicy::None);
            let mut encoder = device.create_command_encoder(&Default::default());
            kernel.encode(&mut encoder, &indirect);
            queue.submit(Some(encoder.finish()));
        }

        let readback = kernel.read_back(&device, &queue, &indirect).unwrap();
        assert_eq!(readback.args.instance_count, 3);
        assert_eq!(readback.ids.len(), 3);
    }
}
