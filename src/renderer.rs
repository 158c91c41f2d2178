// src/renderer.rs
//! Device setup, per-frame culling, and the instanced cube pass.
//!
//! [`RenderContext`] owns the surface and device. [`DrawResources`] holds
//! what the draw binds, [`CullingResources`] what decides how many instances
//! it draws. [`render_frame`] runs one frame on either path.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::camera::{create_camera_gpu_resources, write_camera_buffer, OrbitCamera};
use crate::config::CullingConfig;
use crate::context::{bail, OptionContext};
use crate::culling::{
    compact_instance_data, AnchorPolicy, CpuVisibilityTester, Frustum, InstanceAttributes,
    VisibleSet,
};
use crate::error::{Error, Result};
use crate::gpu::layout::VISIBLE_HEADER_SIZE;
use crate::gpu::{
    GpuCullingKernel, IndirectArgsBuilder, PipelineStatsQueries, PipelineStatsQueryRing,
};
use crate::scene::Scene;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.08,
    g: 0.12,
    b: 0.18,
    a: 1.0,
};

/// Which path decides visibility this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CullPath {
    Cpu,
    Gpu,
}

impl CullPath {
    pub fn toggled(self) -> Self {
        match self {
            CullPath::Cpu => CullPath::Gpu,
            CullPath::Gpu => CullPath::Cpu,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CullPath::Cpu => "CPU",
            CullPath::Gpu => "GPU",
        }
    }
}

// ----------------------------------------------------------------------------
// Render context
// ----------------------------------------------------------------------------

pub struct RenderContext {
    pub surface: wgpu::Surface<'static>,
    pub device: Arc<wgpu::Device>,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub depth_view: wgpu::TextureView,
    /// `PIPELINE_STATISTICS_QUERY` was granted.
    pub pipeline_stats: bool,
}

impl RenderContext {
    /// Creates the surface for `window`, then an adapter and device that can
    /// present to it. Pipeline statistics are requested only if offered.
    pub fn new(window: Arc<Window>) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let size = window.inner_size();
        let surface = instance.create_surface(window)?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or(Error::AdapterUnavailable)?;

        let info = adapter.get_info();
        log::info!("adapter: {} ({:?})", info.name, info.backend);

        let pipeline_stats = adapter
            .features()
            .contains(wgpu::Features::PIPELINE_STATISTICS_QUERY);
        if !pipeline_stats {
            log::warn!("adapter lacks pipeline statistics, GPU visible count unavailable");
        }
        let required_features = if pipeline_stats {
            wgpu::Features::PIPELINE_STATISTICS_QUERY
        } else {
            wgpu::Features::empty()
        };

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("cull_device"),
                required_features,
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                memory_hints: Default::default(),
            },
            None,
        ))?;
        log::info!("device features: {:?}", device.features());

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no formats")?;
        let Some(&alpha_mode) = caps.alpha_modes.first() else {
            bail!("surface reports no alpha modes");
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        let depth_view = create_depth_view(&device, config.width, config.height);

        Ok(Self {
            surface,
            device: Arc::new(device),
            queue,
            config,
            depth_view,
            pipeline_stats,
        })
    }

    /// Context for a new window size: surface reconfigured, depth target
    /// rebuilt. A zero-sized window leaves everything as it was.
    pub fn resized(mut self, size: PhysicalSize<u32>) -> Self {
        if size.width == 0 || size.height == 0 {
            return self;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth_view = create_depth_view(&self.device, size.width, size.height);
        self
    }

    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }

    fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

// ----------------------------------------------------------------------------
// Mesh
// ----------------------------------------------------------------------------

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Six faces, two triangles each.
pub const CUBE_INDEX_COUNT: u32 = 36;

/// Unit cube centred on the origin: four vertices per face so every face
/// carries its own normal, two triangles per face.
pub fn cube_mesh() -> (Vec<Vertex>, Vec<u16>) {
    let faces = [
        (Vec3::X, Vec3::Y, Vec3::Z),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::Z, Vec3::X),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::Y, Vec3::X),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u16;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let p = (normal + u * su + v * sv) * 0.5;
            vertices.push(Vertex {
                position: p.to_array(),
                normal: normal.to_array(),
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

// ----------------------------------------------------------------------------
// Resource bundles
// ----------------------------------------------------------------------------

/// Everything the instanced draw binds.
pub struct DrawResources {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    pub index_count: u32,

    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,

    model_buffer: wgpu::Buffer,
    cpu_visible_buffer: wgpu::Buffer,
    compacted_buffer: wgpu::Buffer,
    cpu_bind_group: wgpu::BindGroup,
    gpu_bind_group: wgpu::BindGroup,

    cpu_pipeline: wgpu::RenderPipeline,
    gpu_pipeline: wgpu::RenderPipeline,

    visible_scratch: Vec<u32>,
}

impl DrawResources {
    /// `visible_ids` is the kernel's output buffer, bound by the GPU path.
    /// `format` is the color target the pipelines render into.
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        scene: &Scene,
        camera: &OrbitCamera,
        visible_ids: &wgpu::Buffer,
    ) -> Self {
        let population = scene.len().max(1) as u64;

        let (vertices, indices) = cube_mesh();
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("cube_vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("cube_indices"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let (camera_buffer, camera_bind_group, camera_bgl) =
            create_camera_gpu_resources(device, camera);

        let model_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("instance_models"),
            size: population * std::mem::size_of::<[[f32; 4]; 4]>() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let cpu_visible_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("cpu_visible_ids"),
            size: VISIBLE_HEADER_SIZE + population * 4,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let attribute_table = scene.attributes();
        let attribute_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("instance_attributes"),
            contents: bytemuck::cast_slice(&attribute_table),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let compacted_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("compacted_attributes"),
            size: population * std::mem::size_of::<InstanceAttributes>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let storage_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let instance_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("instance_bind_group_layout"),
            entries: &[storage_entry(0), storage_entry(1), storage_entry(2)],
        });
        let instance_bind_group = |label: &str, ids: &wgpu::Buffer| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &instance_bgl,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: model_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: ids.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: attribute_buffer.as_entire_binding(),
                    },
                ],
            })
        };
        let cpu_bind_group = instance_bind_group("cpu_instance_bind_group", &cpu_visible_buffer);
        let gpu_bind_group = instance_bind_group("gpu_instance_bind_group", visible_ids);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("instanced_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/instanced.wgsl").into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("instanced_pipeline_layout"),
            bind_group_layouts: &[&camera_bgl, &instance_bgl],
            push_constant_ranges: &[],
        });
        let cpu_pipeline = create_instanced_pipeline(
            device,
            &layout,
            &shader,
            format,
            "vs_compacted",
            &[Vertex::layout(), InstanceAttributes::layout()],
        );
        let gpu_pipeline =
            create_instanced_pipeline(device, &layout, &shader, format, "vs_remapped", &[Vertex::layout()]);

        Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
            camera_buffer,
            camera_bind_group,
            model_buffer,
            cpu_visible_buffer,
            compacted_buffer,
            cpu_bind_group,
            gpu_bind_group,
            cpu_pipeline,
            gpu_pipeline,
            visible_scratch: Vec::with_capacity(scene.len() + 1),
        }
    }

    /// Camera and model matrices for this frame.
    pub fn upload_frame(&mut self, queue: &wgpu::Queue, scene: &Scene, camera: &OrbitCamera) {
        write_camera_buffer(queue, &self.camera_buffer, camera);
        let models = scene.model_matrices();
        queue.write_buffer(&self.model_buffer, 0, bytemuck::cast_slice(&models));
    }

    fn upload_cpu_visible(
        &mut self,
        queue: &wgpu::Queue,
        visible: &VisibleSet,
        compacted: &[InstanceAttributes],
    ) {
        self.visible_scratch.clear();
        self.visible_scratch.push(visible.len() as u32);
        self.visible_scratch.extend_from_slice(visible.as_raw());
        queue.write_buffer(
            &self.cpu_visible_buffer,
            0,
            bytemuck::cast_slice(&self.visible_scratch),
        );
        if !compacted.is_empty() {
            queue.write_buffer(&self.compacted_buffer, 0, bytemuck::cast_slice(compacted));
        }
    }
}

fn create_instanced_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    vs_entry: &str,
    buffers: &[wgpu::VertexBufferLayout<'_>],
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(vs_entry),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: vs_entry,
            buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: "fs_main",
            targets: &[Some(format.into())],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Delayed pipeline-statistics read-back: wgpu queries plus ring bookkeeping.
pub struct StatsResources {
    pub queries: PipelineStatsQueries,
    pub ring: PipelineStatsQueryRing,
}

/// Everything that decides how many instances get drawn.
pub struct CullingResources {
    pub tester: CpuVisibilityTester,
    pub visible: VisibleSet,
    pub compacted: Vec<InstanceAttributes>,
    pub attributes: Vec<InstanceAttributes>,
    pub kernel: GpuCullingKernel,
    pub indirect: IndirectArgsBuilder,
    /// `None` when the device has no pipeline statistics.
    pub stats: Option<StatsResources>,
}

impl CullingResources {
    /// `pipeline_stats` says whether `device` was granted
    /// `PIPELINE_STATISTICS_QUERY`; without it the GPU count stays unavailable.
    pub fn new(
        device: &Arc<wgpu::Device>,
        pipeline_stats: bool,
        scene: &Scene,
        config: &CullingConfig,
        index_count: u32,
    ) -> Result<Self> {
        let population = scene.len();

        let stats = if pipeline_stats {
            // Ring first: it rejects sizes the query set cannot be built with.
            let ring = PipelineStatsQueryRing::new(config.query_ring_size, config.query_frame_delay)?;
            let queries = PipelineStatsQueries::new(Arc::clone(device), config.query_ring_size);
            Some(StatsResources { queries, ring })
        } else {
            None
        };

        let indirect = IndirectArgsBuilder::new(device, index_count);
        let kernel = GpuCullingKernel::new(device, population as u32, &indirect);

        Ok(Self {
            tester: CpuVisibilityTester::new(config.anchor),
            visible: VisibleSet::with_capacity(population),
            compacted: Vec::with_capacity(population),
            attributes: scene.attributes(),
            kernel,
            indirect,
            stats,
        })
    }

    #[inline]
    pub fn anchor(&self) -> AnchorPolicy {
        self.tester.anchor
    }

    /// Last statistics-derived instance count, if any has arrived.
    pub fn gpu_visible(&self) -> Option<u64> {
        self.stats.as_ref().and_then(|s| s.ring.latest_instances())
    }

    pub fn query_delay(&self) -> Option<u64> {
        self.stats.as_ref().map(|s| s.ring.delay())
    }

    /// Runs the CPU test for this frame and returns the frustum it used.
    pub fn cull_cpu(&mut self, scene: &Scene, camera: &OrbitCamera) -> Frustum {
        let frustum = Frustum::from_view_projection(&camera.view_proj_matrix());
        self.tester
            .run(&frustum, scene.world_boxes(), &mut self.visible);
        frustum
    }

    /// After submit: marks the frame's query as in flight and retires
    /// whatever results have arrived.
    pub fn finish_frame(&mut self, query_slot: Option<usize>) {
        if let Some(stats) = self.stats.as_mut() {
            if let Some(slot) = query_slot {
                stats.ring.end(slot);
            }
            stats.ring.drain(&mut stats.queries);
        }
    }

    fn report(&self, path: CullPath) -> FrameReport {
        FrameReport {
            cpu_visible: self.visible.len(),
            gpu_visible: self.gpu_visible(),
            path,
        }
    }
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// Counts produced by one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameReport {
    pub cpu_visible: usize,
    pub gpu_visible: Option<u64>,
    pub path: CullPath,
}

/// Attachments one frame renders into.
#[derive(Clone, Copy)]
pub struct FrameTargets<'a> {
    pub color: &'a wgpu::TextureView,
    pub depth: &'a wgpu::TextureView,
}

/// Per-frame inputs to [`encode_frame`].
#[derive(Clone, Copy)]
pub struct FrameInput<'a> {
    pub scene: &'a Scene,
    /// Frustum the CPU test ran against this frame.
    pub frustum: Frustum,
    pub path: CullPath,
}

/// Culls, draws and presents one frame.
///
/// The CPU test runs every frame so its count is always on display; the
/// kernel and the statistics query only run on the GPU path. Surface loss is
/// handled by reconfiguring and skipping the frame.
pub fn render_frame(
    ctx: &RenderContext,
    draw: &mut DrawResources,
    culling: &mut CullingResources,
    scene: &Scene,
    camera: &OrbitCamera,
    path: CullPath,
) -> FrameReport {
    let frustum = culling.cull_cpu(scene, camera);

    let frame = match ctx.surface.get_current_texture() {
        Ok(frame) => frame,
        Err(err) => {
            log::warn!("failed to acquire surface texture: {err:?}, reconfiguring");
            ctx.reconfigure();
            return culling.report(path);
        }
    };
    let view = frame
        .texture
        .create_view(&wgpu::TextureViewDescriptor::default());

    draw.upload_frame(&ctx.queue, scene, camera);

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame_encoder"),
        });
    let targets = FrameTargets {
        color: &view,
        depth: &ctx.depth_view,
    };
    let input = FrameInput {
        scene,
        frustum,
        path,
    };
    let query_slot = encode_frame(&ctx.queue, &mut encoder, targets, draw, culling, &input);

    ctx.queue.submit(Some(encoder.finish()));
    frame.present();
    culling.finish_frame(query_slot);

    culling.report(path)
}

/// Records one frame's culling and instanced pass into `encoder`.
///
/// Expects `culling.cull_cpu` and `draw.upload_frame` to have run for this
/// frame. Returns the statistics slot the draw recorded into, which the
/// caller hands to [`CullingResources::finish_frame`] once submitted.
pub fn encode_frame(
    queue: &wgpu::Queue,
    encoder: &mut wgpu::CommandEncoder,
    targets: FrameTargets<'_>,
    draw: &mut DrawResources,
    culling: &mut CullingResources,
    input: &FrameInput<'_>,
) -> Option<usize> {
    match input.path {
        CullPath::Cpu => {
            compact_instance_data(
                culling.visible.as_slice(),
                &culling.attributes,
                &mut culling.compacted,
            );
            draw.upload_cpu_visible(queue, &culling.visible, &culling.compacted);
        }
        CullPath::Gpu => {
            culling.indirect.reset(queue);
            let anchor = culling.anchor();
            culling
                .kernel
                .upload(queue, &input.frustum, input.scene.world_boxes(), anchor);
            culling.kernel.encode(encoder, &culling.indirect);
        }
    }

    let mut query_slot = None;
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("instanced_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: targets.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: targets.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        pass.set_bind_group(0, &draw.camera_bind_group, &[]);
        pass.set_vertex_buffer(0, draw.vertex_buffer.slice(..));
        pass.set_index_buffer(draw.index_buffer.slice(..), wgpu::IndexFormat::Uint16);

        match input.path {
            CullPath::Cpu => {
                pass.set_pipeline(&draw.cpu_pipeline);
                pass.set_bind_group(1, &draw.cpu_bind_group, &[]);
                pass.set_vertex_buffer(1, draw.compacted_buffer.slice(..));
                pass.draw_indexed(0..draw.index_count, 0, 0..culling.visible.len() as u32);
            }
            CullPath::Gpu => {
                pass.set_pipeline(&draw.gpu_pipeline);
                pass.set_bind_group(1, &draw.gpu_bind_group, &[]);

                if let Some(stats) = culling.stats.as_mut() {
                    query_slot = stats.ring.begin();
                    if let Some(slot) = query_slot {
                        pass.begin_pipeline_statistics_query(stats.queries.query_set(), slot as u32);
                    }
                }
                pass.draw_indexed_indirect(culling.indirect.draw_buffer(), 0);
                if query_slot.is_some() {
                    pass.end_pipeline_statistics_query();
                }
            }
        }
    }

    if let (Some(slot), Some(stats)) = (query_slot, culling.stats.as_ref()) {
        stats.queries.encode_resolve(encoder, slot);
    }

    query_slot
}

/// Window title / periodic log line.
pub fn status_line(report: &FrameReport, delay: Option<u64>) -> String {
    let gpu = match (report.gpu_visible, delay) {
        (Some(count), Some(delay)) => format!("{count} (stats, {delay} frames late)"),
        (None, Some(_)) => "pending".to_owned(),
        (_, None) => "n/a".to_owned(),
    };
    format!(
        "Frustum culling | path: {} | CPU visible: {} | GPU visible: {}",
        report.path.label(),
        report.cpu_visible,
        gpu
    )
}
