// src/config.rs
//! Runtime configuration.
//!
//! Everything has a default; a JSON file may override any subset of fields.
//!
//! ```json
//! {
//!   "culling": { "query_frame_delay": 2, "anchor": "none" },
//!   "camera":  { "radius": 4.0 }
//! }
//! ```

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::context::{ensure, Context};
use crate::culling::{Aabb, AnchorPolicy, InstanceId};
use crate::error::Result;

/// Culling-core knobs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullingConfig {
    /// Frames between ending a statistics query and first polling it.
    pub query_frame_delay: u32,
    /// Number of query slots. Must exceed `query_frame_delay`.
    pub query_ring_size: u32,
    /// Instance exempted from the frustum test on both paths.
    pub anchor: AnchorPolicy,
    /// Start on the GPU path instead of the CPU path.
    pub start_on_gpu: bool,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            query_frame_delay: 3,
            query_ring_size: 10,
            anchor: AnchorPolicy::AlwaysVisible(InstanceId(0)),
            start_on_gpu: false,
        }
    }
}

/// Demo population.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub instance_count: u32,
    pub ring_radius: f32,
    /// Spin of instance 0, radians per second.
    pub anchor_spin_speed: f32,
    pub local_min: [f32; 3],
    pub local_max: [f32; 3],
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            instance_count: 10,
            ring_radius: 3.0,
            anchor_spin_speed: 0.05,
            local_min: [-0.5; 3],
            local_max: [0.5; 3],
        }
    }
}

impl SceneConfig {
    /// Shared local-space bounds of the instanced mesh.
    pub fn local_bounds(&self) -> Aabb {
        Aabb::new(Vec3::from(self.local_min), Vec3::from(self.local_max))
    }
}

/// Orbit camera.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub radius: f32,
    pub yaw: f32,
    pub pitch: f32,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    /// Translation along view-space +Z applied after the look-at.
    pub view_offset: f32,
    /// Radians per second for arrow keys; W/S zoom at twice this.
    pub rotate_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            radius: 2.0,
            yaw: 0.0,
            pitch: 0.5,
            fov_y: std::f32::consts::FRAC_PI_3,
            near: 0.1,
            far: 1000.0,
            view_offset: 1.0,
            rotate_speed: 1.3,
        }
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub culling: CullingConfig,
    pub scene: SceneConfig,
    pub camera: CameraConfig,
}

impl AppConfig {
    /// Parse from JSON text and validate.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            log::info!("no config file given, using defaults");
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config =
            Self::from_json(&text).with_context(|| format!("parsing {}", path.display()))?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.culling;
        ensure!(
            c.query_ring_size > c.query_frame_delay,
            "query_ring_size ({}) must exceed query_frame_delay ({})",
            c.query_ring_size,
            c.query_frame_delay
        );

        let s = &self.scene;
        ensure!(s.instance_count >= 1, "instance_count must be at least 1");
        if let AnchorPolicy::AlwaysVisible(id) = c.anchor {
            ensure!(
                id.0 < s.instance_count,
                "anchor {} is outside the population of {}",
                id.0,
                s.instance_count
            );
        }
        ensure!(
            s.local_bounds().is_valid(),
            "local bounds min {:?} exceeds max {:?}",
            s.local_min,
            s.local_max
        );

        let cam = &self.camera;
        ensure!(
            cam.near > 0.0 && cam.near < cam.far,
            "near ({}) must be positive and below far ({})",
            cam.near,
            cam.far
        );
        ensure!(
            cam.fov_y > 0.0 && cam.fov_y < std::f32::consts::PI,
            "fov_y ({}) must be in (0, pi)",
            cam.fov_y
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.culling.query_frame_delay, 3);
        assert_eq!(config.culling.query_ring_size, 10);
        assert_eq!(config.scene.instance_count, 10);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config = AppConfig::from_json(
            r#"{ "culling": { "query_frame_delay": 2, "anchor": "none" }, "camera": { "radius": 4.0 } }"#,
        )
        .unwrap();
        assert_eq!(config.culling.query_frame_delay, 2);
        assert_eq!(config.culling.query_ring_size, 10);
        assert_eq!(config.culling.anchor, AnchorPolicy::None);
        assert_eq!(config.camera.radius, 4.0);
        assert_eq!(config.camera.pitch, 0.5);
    }

    #[test]
    fn anchor_parses_as_tagged_id() {
        let config =
            AppConfig::from_json(r#"{ "culling": { "anchor": { "always_visible": 4 } } }"#)
                .unwrap();
        assert_eq!(config.culling.anchor, AnchorPolicy::AlwaysVisible(InstanceId(4)));
    }

    #[test]
    fn ring_must_exceed_delay() {
        let err = AppConfig::from_json(
            r#"{ "culling": { "query_frame_delay": 4, "query_ring_size": 4 } }"#,
        )
        .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn anchor_outside_population_rejected() {
        let err = AppConfig::from_json(
            r#"{ "culling": { "anchor": { "always_visible": 10 } }, "scene": { "instance_count": 10 } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("anchor 10"));
    }

    #[test]
    fn bad_camera_rejected() {
        assert!(AppConfig::from_json(r#"{ "camera": { "near": 5.0, "far": 1.0 } }"#).is_err());
        assert!(AppConfig::from_json(r#"{ "camera": { "fov_y": 3.5 } }"#).is_err());
    }

    #[test]
    fn missing_file_is_io_error_with_path() {
        let err = AppConfig::load(Some(Path::new("/definitely/not/here.json"))).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
