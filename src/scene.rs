// src/scene.rs
//! Fixed demo population and the per-frame simulation state that moves it.
//!
//! Instance 0 sits at the origin and spins; the rest lie on a ring around
//! it, every even-indexed one at twice the radius. The population never
//! changes after startup, only the transforms and the world bounds do.

use std::f32::consts::TAU;

use glam::{Mat4, Vec3};

use crate::config::SceneConfig;
use crate::culling::{Aabb, InstanceAttributes, InstanceId};

/// Attribute pattern for the first ten instances; repeats beyond that.
const ATTRIBUTE_PATTERN: [InstanceAttributes; 10] = [
    InstanceAttributes::new(0, true),
    InstanceAttributes::new(1, false),
    InstanceAttributes::new(0, true),
    InstanceAttributes::new(1, false),
    InstanceAttributes::new(0, true),
    InstanceAttributes::new(0, true),
    InstanceAttributes::new(1, false),
    InstanceAttributes::new(0, true),
    InstanceAttributes::new(1, false),
    InstanceAttributes::new(0, true),
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instance {
    pub id: InstanceId,
    pub model: Mat4,
    pub attributes: InstanceAttributes,
}

/// Mutable state threaded through each update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationState {
    /// Spin of instance 0 about (1, 1, 1), radians in `[0, 2π)`.
    pub anchor_angle: f32,
    pub anchor_spin_speed: f32,
}

impl SimulationState {
    pub fn new(anchor_spin_speed: f32) -> Self {
        Self {
            anchor_angle: 0.0,
            anchor_spin_speed,
        }
    }

    pub fn advance(&mut self, dt: f32) {
        self.anchor_angle = (self.anchor_angle + self.anchor_spin_speed * dt).rem_euclid(TAU);
    }
}

/// Translation of ring instance `index` (1-based) in a population of
/// `count`, at angle `2π(index-1)/(count-1)`.
pub fn ring_transform(index: u32, count: u32, radius: f32) -> Mat4 {
    let slots = count.saturating_sub(1).max(1) as f32;
    let angle = TAU * (index - 1) as f32 / slots;
    let r = if index % 2 == 0 { radius * 2.0 } else { radius };
    Mat4::from_translation(Vec3::new(r * angle.cos(), 0.0, r * angle.sin()))
}

pub fn anchor_transform(angle: f32) -> Mat4 {
    Mat4::from_axis_angle(Vec3::ONE.normalize(), angle)
}

pub struct Scene {
    pub local_bounds: Aabb,
    instances: Vec<Instance>,
    world_boxes: Vec<Aabb>,
}

impl Scene {
    pub fn new(config: &SceneConfig) -> Self {
        let count = config.instance_count;
        let instances = (0..count)
            .map(|i| Instance {
                id: InstanceId(i),
                model: if i == 0 {
                    anchor_transform(0.0)
                } else {
                    ring_transform(i, count, config.ring_radius)
                },
                attributes: ATTRIBUTE_PATTERN[i as usize % ATTRIBUTE_PATTERN.len()],
            })
            .collect();

        let mut scene = Self {
            local_bounds: config.local_bounds(),
            instances,
            world_boxes: Vec::with_capacity(count as usize),
        };
        scene.refresh_bounds();
        scene
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// World bounds, indexed by instance ID.
    pub fn world_boxes(&self) -> &[Aabb] {
        &self.world_boxes
    }

    /// Attribute table, indexed by instance ID.
    pub fn attributes(&self) -> Vec<InstanceAttributes> {
        self.instances.iter().map(|i| i.attributes).collect()
    }

    /// Column-major model matrices for the storage buffer.
    pub fn model_matrices(&self) -> Vec<[[f32; 4]; 4]> {
        self.instances
            .iter()
            .map(|i| i.model.to_cols_array_2d())
            .collect()
    }

    pub fn update(&mut self, sim: &SimulationState) {
        if let Some(anchor) = self.instances.first_mut() {
            anchor.model = anchor_transform(sim.anchor_angle);
        }
        self.refresh_bounds();
    }

    fn refresh_bounds(&mut self) {
        let local = self.local_bounds;
        self.world_boxes.clear();
        self.world_boxes
            .extend(self.instances.iter().map(|i| local.transformed(&i.model)));
    }
}
