mod camera;
mod light;
mod motion;
mod primitive;
mod render;

pub use camera::*;
pub use light::*;
pub use motion::*;
pub use primitive::*;
pub use render::*;

use std::collections::HashSet;

use anyhow::{Context, Result, anyhow};
use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SceneFile {
    pub cameras: Vec<Camera>,
    pub lights: Vec<Light>,

    #[serde(default)]
    pub primitives: Vec<Primitive>,

    pub render: Render,
}

impl SceneFile {
    pub fn load_json(path: &str) -> Result<Self> {
        let serialized = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read scene file '{path}'"))?;
        Self::from_json_str(&serialized)
            .with_context(|| format!("Unable to parse scene file '{path}'"))
    }

    pub fn from_json_str(serialized: &str) -> Result<Self> {
        let mut deserialized: Self = serde_json::from_str(serialized)?;
        deserialized.enforce_render_limits();
        deserialized.warn_duplicate_names();
        Ok(deserialized)
    }

    pub fn save_json(&self, path: &str) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        std::fs::write(path, serialized)
            .with_context(|| format!("Unable to write scene file '{path}'"))?;
        Ok(())
    }

    fn enforce_render_limits(&mut self) {
        if self.render.samples_per_pixel > MAX_SAMPLES_PER_PIXEL {
            info!(
                "Samples per pixel {} too high. Limiting to {MAX_SAMPLES_PER_PIXEL}.",
                self.render.samples_per_pixel
            );
            self.render.samples_per_pixel = MAX_SAMPLES_PER_PIXEL;
        }
        if self.render.max_depth > MAX_DEPTH_LIMIT {
            info!(
                "Max depth {} too high. Limiting to {MAX_DEPTH_LIMIT}.",
                self.render.max_depth
            );
            self.render.max_depth = MAX_DEPTH_LIMIT;
        }
    }

    fn warn_duplicate_names(&self) {
        let mut seen = HashSet::new();
        for name in self.primitives.iter().map(|p| p.get_name()) {
            if !seen.insert(name) {
                warn!("Primitive name '{name}' is used multiple times");
            }
        }
    }

    /// Returns the camera named by the render settings.
    pub fn get_camera(&self) -> Result<&Camera> {
        let name = &self.render.camera;
        self.cameras
            .iter()
            .find(|c| c.get_name() == name)
            .ok_or_else(|| anyhow!("Camera '{name}' is not specified in cameras"))
    }

    /// Returns the light named by the render settings.
    pub fn get_light(&self) -> Result<&Light> {
        let name = &self.render.light;
        self.lights
            .iter()
            .find(|l| l.get_name() == name)
            .ok_or_else(|| anyhow!("Light '{name}' is not specified in lights"))
    }
}
