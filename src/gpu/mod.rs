// src/gpu/mod.rs
//! # GPU culling path
//!
//! * [`GpuCullingKernel`]: one compute invocation per instance running the
//!   shared plane test and appending survivors to a visible-ID buffer.
//! * [`IndirectArgsBuilder`]: per-frame reset of the indirect draw record the
//!   kernel increments, and the copy into the draw-bound buffer.
//! * [`PipelineStatsQueryRing`]: delayed, non-blocking read-back of how many
//!   primitives the indirect draw actually produced.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};

pub mod cull_kernel;
pub mod indirect;
pub mod layout;
pub mod query_ring;

pub use cull_kernel::{GpuCullingKernel, KernelReadback};
pub use indirect::IndirectArgsBuilder;
pub use layout::{AabbHeader, GpuAabb, IndirectDrawArgs};
pub use query_ring::{PipelineStatsQueries, PipelineStatsQueryRing, QueryPoll, StatsSource};

/// Maps `slice` for reading and waits for it. Diagnostics and tests only:
/// this stalls until the GPU has drained everything submitted so far.
pub(crate) fn map_read_blocking(device: &wgpu::Device, slice: wgpu::BufferSlice<'_>) -> Result<()> {
    let outcome: Arc<Mutex<Option<std::result::Result<(), wgpu::BufferAsyncError>>>> =
        Arc::new(Mutex::new(None));
    let sink = Arc::clone(&outcome);
    slice.map_async(wgpu::MapMode::Read, move |res| {
        *sink.lock() = Some(res);
    });
    device.poll(wgpu::Maintain::Wait);

    let result = outcome.lock().take();
    match result {
        Some(res) => res.map_err(Error::from),
        None => Err(Error::msg("buffer map callback did not fire")),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    /// Headless device, or `None` when the machine has no usable adapter.
    pub fn headless_device(features: wgpu::Features) -> Option<(wgpu::Device, wgpu::Queue)> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            force_fallback_adapter: false,
            compatible_surface: None,
        }))?;
        if !adapter.features().contains(features) {
            return None;
        }
        pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("test_device"),
                required_features: features,
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))
        .ok()
    }
}
