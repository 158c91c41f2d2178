// src/gpu/query_ring.rs
//! Frame-delayed pipeline-statistics read-back.
//!
//! [`PipelineStatsQueryRing`] is the bookkeeping: which slot records this
//! frame, which slots are in flight, which one to poll next. It never talks
//! to wgpu directly; results come through a [`StatsSource`], which
//! [`PipelineStatsQueries`] implements over a real query set. Polling is
//! non-blocking: a slot that is not ready stops the drain until next frame.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::ensure;
use crate::error::Result;

/// Triangles per drawn cube; converts primitive counts into instances.
pub const TRIANGLES_PER_INSTANCE: u64 = 12;

/// Outcome of a non-blocking poll of one slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryPoll {
    /// The GPU has not finished the frame that owns this slot.
    NotReady,
    /// Primitive count recorded by the slot.
    Ready(u64),
    /// The result can never arrive (e.g. the map failed). The slot is
    /// retired without a value.
    Lost,
}

/// Non-blocking access to per-slot query results.
pub trait StatsSource {
    fn try_read(&mut self, slot: usize) -> QueryPoll;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotState {
    Idle,
    Recording,
    /// Ended; owned by frame `.0`.
    Pending(u64),
}

/// Ring of query slots read back `delay` frames after they were recorded.
#[derive(Debug)]
pub struct PipelineStatsQueryRing {
    slots: Vec<SlotState>,
    delay: u64,
    /// Frame number the next `begin` records.
    next_frame: u64,
    /// Oldest frame whose result has not been retired.
    oldest_unread: u64,
    latest: Option<u64>,
}

impl PipelineStatsQueryRing {
    /// `ring_size` must exceed `delay`, otherwise a slot would be reused
    /// before it could ever be read.
    pub fn new(ring_size: u32, delay: u32) -> Result<Self> {
        ensure!(
            ring_size > delay,
            "query ring of {} slots cannot hold a delay of {} frames",
            ring_size,
            delay
        );
        Ok(Self {
            slots: vec![SlotState::Idle; ring_size as usize],
            delay: delay as u64,
            next_frame: 0,
            oldest_unread: 0,
            latest: None,
        })
    }

    #[inline]
    pub fn ring_size(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn delay(&self) -> u64 {
        self.delay
    }

    /// Frames recorded so far.
    #[inline]
    pub fn frames_recorded(&self) -> u64 {
        self.next_frame
    }

    /// Ended queries not yet retired.
    #[inline]
    pub fn in_flight(&self) -> u64 {
        self.next_frame - self.oldest_unread
    }

    /// Last retired result, in instances.
    #[inline]
    pub fn latest_instances(&self) -> Option<u64> {
        self.latest
    }

    fn slot_of(&self, frame: u64) -> usize {
        (frame % self.slots.len() as u64) as usize
    }

    /// Claims the slot for the next frame, or `None` when every slot is
    /// still in flight; the caller then draws without a query.
    pub fn begin(&mut self) -> Option<usize> {
        if self.in_flight() >= self.slots.len() as u64 {
            log::warn!(
                "all {} query slots in flight, skipping statistics this frame",
                self.slots.len()
            );
            return None;
        }
        let slot = self.slot_of(self.next_frame);
        debug_assert!(
            !matches!(self.slots[slot], SlotState::Pending(_)),
            "query slot {slot} reused while pending"
        );
        self.slots[slot] = SlotState::Recording;
        Some(slot)
    }

    /// Marks `slot` as submitted and advances the frame counter.
    pub fn end(&mut self, slot: usize) {
        debug_assert_eq!(self.slots[slot], SlotState::Recording, "end without begin");
        self.slots[slot] = SlotState::Pending(self.next_frame);
        self.next_frame += 1;
    }

    /// Retires, oldest first, every query whose delay has elapsed and whose
    /// result is available. Stops at the first not-ready slot so results
    /// are consumed in order. Returns the newest converted value, if any
    /// slot was retired with one.
    pub fn drain<S: StatsSource + ?Sized>(&mut self, source: &mut S) -> Option<u64> {
        let mut newest = None;

        while self.oldest_unread + self.delay < self.next_frame {
            let frame = self.oldest_unread;
            let slot = self.slot_of(frame);
            debug_assert_eq!(self.slots[slot], SlotState::Pending(frame));

            match source.try_read(slot) {
                QueryPoll::NotReady => break,
                QueryPoll::Ready(primitives) => {
                    let instances = primitives / TRIANGLES_PER_INSTANCE;
                    log::trace!("frame {frame}: {primitives} primitives, {instances} instances");
                    self.latest = Some(instances);
                    newest = Some(instances);
                }
                QueryPoll::Lost => {
                    log::warn!("pipeline statistics for frame {frame} lost");
                }
            }
            self.slots[slot] = SlotState::Idle;
            self.oldest_unread += 1;
        }

        newest
    }
}

// ---------------------------------------------------------------------------
// wgpu backend
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum MapStatus {
    Unmapped,
    Mapping,
    Mapped(std::result::Result<(), wgpu::BufferAsyncError>),
}

struct Readback {
    buffer: wgpu::Buffer,
    status: Arc<Mutex<MapStatus>>,
}

/// One `CLIPPER_INVOCATIONS` query per ring slot, resolved into a per-slot
/// `MAP_READ` buffer.
pub struct PipelineStatsQueries {
    device: Arc<wgpu::Device>,
    query_set: wgpu::QuerySet,
    resolve: wgpu::Buffer,
    readbacks: Vec<Readback>,
}

impl PipelineStatsQueries {
    const RESULT_SIZE: u64 = std::mem::size_of::<u64>() as u64;
    const STRIDE: u64 = wgpu::QUERY_RESOLVE_BUFFER_ALIGNMENT;

    /// Requires `Features::PIPELINE_STATISTICS_QUERY` on `device`.
    pub fn new(device: Arc<wgpu::Device>, ring_size: u32) -> Self {
        let query_set = device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some("cull_pipeline_stats"),
            ty: wgpu::QueryType::PipelineStatistics(
                wgpu::PipelineStatisticsTypes::CLIPPER_INVOCATIONS,
            ),
            count: ring_size,
        });
        let resolve = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("cull_pipeline_stats_resolve"),
            size: ring_size as u64 * Self::STRIDE,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readbacks = (0..ring_size)
            .map(|slot| Readback {
                buffer: device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("cull_pipeline_stats_readback_{slot}")),
                    size: Self::RESULT_SIZE,
                    usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                    mapped_at_creation: false,
                }),
                status: Arc::new(Mutex::new(MapStatus::Unmapped)),
            })
            .collect();

        Self {
            device,
            query_set,
            resolve,
            readbacks,
        }
    }

    #[inline]
    pub fn query_set(&self) -> &wgpu::QuerySet {
        &self.query_set
    }

    /// Resolves `slot` and copies it to its read-back buffer. Record after
    /// the render pass that ended the query.
    pub fn encode_resolve(&self, encoder: &mut wgpu::CommandEncoder, slot: usize) {
        let offset = slot as u64 * Self::STRIDE;
        let index = slot as u32;
        encoder.resolve_query_set(&self.query_set, index..index + 1, &self.resolve, offset);
        encoder.copy_buffer_to_buffer(
            &self.resolve,
            offset,
            &self.readbacks[slot].buffer,
            0,
            Self::RESULT_SIZE,
        );
    }
}

impl StatsSource for PipelineStatsQueries {
    /// First poll of a slot starts the map; later polls check it. The ring
    /// only polls slots whose frame was submitted `delay` frames ago.
    fn try_read(&mut self, slot: usize) -> QueryPoll {
        let readback = &self.readbacks[slot];

        let start_map = matches!(*readback.status.lock(), MapStatus::Unmapped);
        if start_map {
            *readback.status.lock() = MapStatus::Mapping;
            let status = Arc::clone(&readback.status);
            readback
                .buffer
                .slice(..)
                .map_async(wgpu::MapMode::Read, move |res| {
                    *status.lock() = MapStatus::Mapped(res);
                });
        }
        self.device.poll(wgpu::Maintain::Poll);

        let outcome = match &*readback.status.lock() {
            MapStatus::Unmapped | MapStatus::Mapping => return QueryPoll::NotReady,
            MapStatus::Mapped(res) => res.is_ok(),
        };

        *readback.status.lock() = MapStatus::Unmapped;
        if !outcome {
            return QueryPoll::Lost;
        }
        let value: u64 =
            bytemuck::pod_read_unaligned(&readback.buffer.slice(..).get_mapped_range());
        readback.buffer.unmap();
        QueryPoll::Ready(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Scripted source: slots answer `NotReady` until marked ready.
    #[derive(Default)]
    struct FakeSource {
        ready: HashMap<usize, u64>,
        lost: Vec<usize>,
        reads: Vec<usize>,
    }

    impl StatsSource for FakeSource {
        fn try_read(&mut self, slot: usize) -> QueryPoll {
            self.reads.push(slot);
            if self.lost.contains(&slot) {
                QueryPoll::Lost
            } else if let Some(&value) = self.ready.get(&slot) {
                QueryPoll::Ready(value)
            } else {
                QueryPoll::NotReady
            }
        }
    }

    fn run_frame(ring: &mut PipelineStatsQueryRing) -> Option<usize> {
        let slot = ring.begin()?;
        ring.end(slot);
        Some(slot)
    }

    #[test]
    fn ring_must_exceed_delay() {
        assert!(PipelineStatsQueryRing::new(3, 3).unwrap_err().is_config());
        assert!(PipelineStatsQueryRing::new(4, 3).is_ok());
    }

    #[test]
    fn not_polled_before_delay() {
        let mut ring = PipelineStatsQueryRing::new(10, 3).unwrap();
        let mut source = FakeSource::default();
        source.ready.insert(0, 120);

        for _ in 0..3 {
            run_frame(&mut ring);
            assert_eq!(ring.drain(&mut source), None);
        }
        assert!(source.reads.is_empty());

        run_frame(&mut ring);
        assert_eq!(ring.drain(&mut source), Some(10));
        assert_eq!(source.reads, vec![0]);
    }

    #[test]
    fn not_ready_keeps_fifo_order() {
        let mut ring = PipelineStatsQueryRing::new(10, 1).unwrap();
        let mut source = FakeSource::default();
        source.ready.insert(1, 24);

        run_frame(&mut ring);
        run_frame(&mut ring);
        run_frame(&mut ring);
        assert_eq!(ring.drain(&mut source), None);
        assert_eq!(source.reads, vec![0]);
        assert_eq!(ring.in_flight(), 3);

        // Polled again every frame until it completes.
        assert_eq!(ring.drain(&mut source), None);
        assert_eq!(source.reads, vec![0, 0]);

        source.ready.insert(0, 12);
        assert_eq!(ring.drain(&mut source), Some(2));
        assert_eq!(source.reads, vec![0, 0, 0, 1]);
        assert_eq!(ring.latest_instances(), Some(2));
        assert_eq!(ring.in_flight(), 1);
    }

    #[test]
    fn each_slot_retired_once() {
        let mut ring = PipelineStatsQueryRing::new(4, 2).unwrap();
        let mut source = FakeSource::default();
        for slot in 0..4 {
            source.ready.insert(slot, 60);
        }

        for _ in 0..3 {
            run_frame(&mut ring);
        }
        assert_eq!(ring.drain(&mut source), Some(5));
        assert_eq!(ring.drain(&mut source), None);
        assert_eq!(source.reads, vec![0]);
        assert_eq!(ring.latest_instances(), Some(5));
    }

    #[test]
    fn full_ring_skips_the_query() {
        let mut ring = PipelineStatsQueryRing::new(4, 3).unwrap();
        let mut source = FakeSource::default();

        for expected in 0..4 {
            assert_eq!(run_frame(&mut ring), Some(expected));
            ring.drain(&mut source);
        }
        assert_eq!(ring.begin(), None);
        assert_eq!(ring.frames_recorded(), 4);

        source.ready.insert(0, 36);
        assert_eq!(ring.drain(&mut source), Some(3));
        assert_eq!(run_frame(&mut ring), Some(0));
    }

    #[test]
    fn lost_results_are_retired_without_value() {
        let mut ring = PipelineStatsQueryRing::new(4, 0).unwrap();
        let mut source = FakeSource::default();
        source.lost.push(0);

        run_frame(&mut ring);
        assert_eq!(ring.drain(&mut source), None);
        assert_eq!(ring.in_flight(), 0);
        assert_eq!(ring.latest_instances(), None);
    }

    #[test]
    fn gpu_queries_count_drawn_primitives() {
        use crate::gpu::test_support::headless_device;

        let features = wgpu::Features::PIPELINE_STATISTICS_QUERY;
        let Some((device, queue)) = headless_device(features) else {
            eprintln!("skipping gpu_queries_count_drawn_primitives: no pipeline statistics");
            return;
        };
        let device = Arc::new(device);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("stats_test_shader"),
            source: wgpu::ShaderSource::Wgsl(
                r#"
@vertex
fn vs(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {
    var corners = array<vec2<f32>, 3>(
        vec2<f32>(-0.5, -0.5),
        vec2<f32>(0.5, -0.5),
        vec2<f32>(0.0, 0.5),
    );
    return vec4<f32>(corners[i % 3u], 0.5, 1.0);
}
@fragment
fn fs() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }
"#
                .into(),
            ),
        });
        let format = wgpu::TextureFormat::Rgba8Unorm;
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("stats_test_pipeline"),
            layout: None,
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: "vs",
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: "fs",
                targets: &[Some(format.into())],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("stats_test_target"),
            size: wgpu::Extent3d {
                width: 4,
                height: 4,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = target.create_view(&Default::default());

        let mut ring = PipelineStatsQueryRing::new(4, 1).unwrap();
        let mut queries = PipelineStatsQueries::new(Arc::clone(&device), 4);

        for _ in 0..2 {
            let slot = ring.begin().unwrap();
            let mut encoder = device.create_command_encoder(&Default::default());
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("stats_test_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations::default(),
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                pass.set_pipeline(&pipeline);
                pass.begin_pipeline_statistics_query(queries.query_set(), slot as u32);
                // 12 triangles, one cube's worth.
                pass.draw(0..36, 0..1);
                pass.end_pipeline_statistics_query();
            }
            queries.encode_resolve(&mut encoder, slot);
            queue.submit(Some(encoder.finish()));
            ring.end(slot);
        }

        device.poll(wgpu::Maintain::Wait);
        let mut result = None;
        for _ in 0..100 {
            result = result.or(ring.drain(&mut queries));
            if result.is_some() {
                break;
            }
            device.poll(wgpu::Maintain::Wait);
        }
        assert_eq!(result, Some(1));
    }
}
