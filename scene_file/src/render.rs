use serde::{Deserialize, Serialize};

pub const DEFAULT_SAMPLES_PER_PIXEL: u32 = 10;
pub const DEFAULT_MAX_DEPTH: u32 = 10;
pub const DEFAULT_WORLD_HEIGHT: f32 = 1.0;
pub const DEFAULT_BACKGROUND: [f32; 4] = [125.0 / 255.0, 206.0 / 255.0, 235.0 / 255.0, 1.0];

pub const MAX_SAMPLES_PER_PIXEL: u32 = 64;
pub const MAX_DEPTH_LIMIT: u32 = 32;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Render {
    /// Name of the camera to render from.
    pub camera: String,

    /// Name of the light used for shading.
    pub light: String,

    #[serde(default = "default_samples_per_pixel")]
    pub samples_per_pixel: u32,

    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Height of the screen plane in world units. Width follows the window aspect ratio.
    #[serde(default = "default_world_height")]
    pub world_height: f32,

    #[serde(default = "default_background")]
    pub background: [f32; 4],

    /// Seeds jitter generation so renders are reproducible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_samples_per_pixel() -> u32 {
    DEFAULT_SAMPLES_PER_PIXEL
}

fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

fn default_world_height() -> f32 {
    DEFAULT_WORLD_HEIGHT
}

fn default_background() -> [f32; 4] {
    DEFAULT_BACKGROUND
}
