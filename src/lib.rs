// src/lib.rs
//! View-frustum culling for instanced draws, on the CPU or on the GPU.
//!
//! The culling core lives in [`culling`] (frustum planes, world bounds,
//! visibility test, attribute compaction) and [`gpu`] (compute kernel,
//! indirect arguments, delayed pipeline-statistics read-back). The rest is
//! the demo application that drives both paths against a ring of cubes.

use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::*,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

pub mod camera;
pub mod config;
pub mod context;
pub mod culling;
pub mod error;
pub mod gpu;
pub mod input_system;
pub mod renderer;
pub mod scene;
pub mod time;

pub use config::AppConfig;
pub use error::{Error, Result};

use camera::OrbitCamera;
use input_system::InputState;
use renderer::{
    render_frame, status_line, CullPath, CullingResources, DrawResources, RenderContext,
    CUBE_INDEX_COUNT,
};
use scene::{Scene, SimulationState};
use time::FrameClock;

/// Opens the window and runs the demo until it is closed.
///
/// An invalid `config` is rejected before any window opens. Failures while
/// creating the window, device or GPU resources end the event loop and are
/// returned here.
pub fn run_native(config: AppConfig) -> Result<()> {
    config.validate()?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = CullApp::new(config);
    event_loop.run_app(&mut app)?;

    match app.startup_error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

// ----------------------------------------------------------------------------
// winit 0.30 + wgpu 22 App State
// ----------------------------------------------------------------------------
struct CullApp {
    config: AppConfig,
    // Created inside the `resumed` event
    state: Option<AppState>,
    startup_error: Option<Error>,
}

impl CullApp {
    fn new(config: AppConfig) -> Self {
        Self {
            config,
            state: None,
            startup_error: None,
        }
    }
}

struct AppState {
    window: Arc<Window>,
    ctx: RenderContext,
    draw: DrawResources,
    culling: CullingResources,

    scene: Scene,
    sim: SimulationState,
    camera: OrbitCamera,
    input: InputState,
    clock: FrameClock,
    path: CullPath,
    title: String,
}

impl AppState {
    fn new(event_loop: &ActiveEventLoop, config: &AppConfig) -> Result<Self> {
        let attrs = Window::default_attributes().with_title("Frustum culling");
        let window = Arc::new(event_loop.create_window(attrs)?);

        let ctx = RenderContext::new(Arc::clone(&window))?;
        let scene = Scene::new(&config.scene);
        let camera = OrbitCamera::from_config(&config.camera, ctx.aspect());
        let culling = CullingResources::new(
            &ctx.device,
            ctx.pipeline_stats,
            &scene,
            &config.culling,
            CUBE_INDEX_COUNT,
        )?;
        let draw = DrawResources::new(
            &ctx.device,
            ctx.config.format,
            &scene,
            &camera,
            culling.kernel.visible_buffer(),
        );

        let path = if config.culling.start_on_gpu {
            CullPath::Gpu
        } else {
            CullPath::Cpu
        };
        log::info!(
            "culling {} instances, anchor {:?}, starting on the {} path",
            scene.len(),
            culling.anchor(),
            path.label()
        );

        window.request_redraw();
        Ok(Self {
            window,
            ctx,
            draw,
            culling,
            scene,
            sim: SimulationState::new(config.scene.anchor_spin_speed),
            camera,
            input: InputState::new(),
            clock: FrameClock::new(),
            path,
            title: String::new(),
        })
    }

    fn resized(mut self, size: PhysicalSize<u32>) -> Self {
        self.ctx = self.ctx.resized(size);
        self.camera.set_aspect(self.ctx.aspect());
        self
    }

    fn frame(&mut self) {
        let time = self.clock.tick();

        self.camera.update(self.input.orbit_input(), time.delta);
        if self.input.take_path_toggle() {
            self.path = self.path.toggled();
            log::debug!("switched to the {} culling path", self.path.label());
        }
        self.sim.advance(time.delta);
        self.scene.update(&self.sim);

        let report = render_frame(
            &self.ctx,
            &mut self.draw,
            &mut self.culling,
            &self.scene,
            &self.camera,
            self.path,
        );

        let line = status_line(&report, self.culling.query_delay());
        if time.report_due {
            log::info!("{line} | {:.0} fps", time.fps);
        }
        if line != self.title {
            self.window.set_title(&line);
            self.title = line;
        }
    }
}

impl ApplicationHandler for CullApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match AppState::new(event_loop, &self.config) {
            Ok(state) => self.state = Some(state),
            Err(err) => {
                log::error!("startup failed: {err}");
                self.startup_error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = self.state.as_mut() else { return };
        if state.window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.state = self.state.take().map(|s| s.resized(new_size));
            }
            WindowEvent::Focused(false) => {
                state.input.clear();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    event_loop.exit();
                    return;
                }
                state.input.handle_event(&event);
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                log::debug!("Scale factor changed: {}", scale_factor);
            }
            WindowEvent::RedrawRequested => {
                state.frame();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.as_ref() {
            state.window.request_redraw();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_is_rejected_before_startup() {
        let mut config = AppConfig::default();
        config.camera.fov_y = 0.0;
        let err = run_native(config).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("fov_y"));
    }
}
