// src/camera.rs
//! Orbit camera around the origin and its GPU uniform.

use std::f32::consts::{FRAC_PI_2, TAU};

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use crate::config::CameraConfig;

const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.01;
const MIN_RADIUS: f32 = 0.5;
const MAX_RADIUS: f32 = 100.0;

/// Signed control axes for one frame, each in `-1.0..=1.0`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OrbitInput {
    pub yaw: f32,
    pub pitch: f32,
    /// Positive moves the camera closer.
    pub zoom: f32,
}

/// Left-handed perspective camera orbiting the origin with Y up.
#[derive(Clone, Debug, PartialEq)]
pub struct OrbitCamera {
    pub yaw: f32,
    pub pitch: f32,
    pub radius: f32,

    pub fovy: f32,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
    /// Translation along view +Z applied after the look-at.
    pub view_offset: f32,
    pub rotate_speed: f32,
}

impl OrbitCamera {
    pub fn from_config(config: &CameraConfig, aspect: f32) -> Self {
        Self {
            yaw: config.yaw,
            pitch: config.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            radius: config.radius.clamp(MIN_RADIUS, MAX_RADIUS),
            fovy: config.fov_y,
            aspect,
            znear: config.near,
            zfar: config.far,
            view_offset: config.view_offset,
            rotate_speed: config.rotate_speed,
        }
    }

    pub fn eye(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        self.radius * Vec3::new(sin_yaw * cos_pitch, sin_pitch, cos_yaw * cos_pitch)
    }

    pub fn view_matrix(&self) -> Mat4 {
        let look = Mat4::look_at_lh(self.eye(), Vec3::ZERO, Vec3::Y);
        Mat4::from_translation(Vec3::new(0.0, 0.0, self.view_offset)) * look
    }

    pub fn proj_matrix(&self) -> Mat4 {
        Mat4::perspective_lh(self.fovy, self.aspect, self.znear, self.zfar)
    }

    pub fn view_proj_matrix(&self) -> Mat4 {
        self.proj_matrix() * self.view_matrix()
    }

    /// Update aspect ratio (call on resize).
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    /// Applies one frame of input. Yaw wraps to `[0, 2π)`, pitch stops short
    /// of the poles, radius stays within `[0.5, 100]`.
    pub fn update(&mut self, input: OrbitInput, dt: f32) {
        let step = self.rotate_speed * dt;
        self.yaw = (self.yaw + input.yaw * step).rem_euclid(TAU);
        self.pitch = (self.pitch + input.pitch * step).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.radius = (self.radius - input.zoom * step * 2.0).clamp(MIN_RADIUS, MAX_RADIUS);
    }
}

/// GPU camera uniform (matches `Camera` in `instanced.wgsl`).
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct CameraUniform {
    /// Column-major 4x4 matrix
    pub view_proj: [[f32; 4]; 4],
    /// World-space eye, `w` unused.
    pub eye: [f32; 4],
}

impl CameraUniform {
    pub fn from_camera(camera: &OrbitCamera) -> Self {
        Self {
            view_proj: camera.view_proj_matrix().to_cols_array_2d(),
            eye: camera.eye().extend(1.0).to_array(),
        }
    }
}

/// Create camera GPU resources: buffer, bind group layout, bind group.
/// Returns (camera_buffer, camera_bind_group, camera_bind_group_layout).
pub fn create_camera_gpu_resources(
    device: &wgpu::Device,
    camera: &OrbitCamera,
) -> (wgpu::Buffer, wgpu::BindGroup, wgpu::BindGroupLayout) {
    let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("camera_buffer"),
        contents: bytemuck::bytes_of(&CameraUniform::from_camera(camera)),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });

    let camera_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("camera_bind_group_layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    });

    let camera_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("camera_bind_group"),
        layout: &camera_bgl,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: camera_buffer.as_entire_binding(),
        }],
    });

    (camera_buffer, camera_bg, camera_bgl)
}

/// Update the GPU camera buffer.
pub fn write_camera_buffer(queue: &wgpu::Queue, camera_buffer: &wgpu::Buffer, camera: &OrbitCamera) {
    queue.write_buffer(
        camera_buffer,
        0,
        bytemuck::bytes_of(&CameraUniform::from_camera(camera)),
    );
}
