use serde::{Deserialize, Serialize};

use crate::Motion;

pub const DEFAULT_ATTENUATION: f32 = 0.5;

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MaterialType {
    #[default]
    Lambertian,
    Glossy,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    Sphere {
        name: String,
        position: [f32; 3],

        /// Uniform scale; the sphere's diameter.
        scale: f32,

        colour: [f32; 4],

        #[serde(default)]
        material: MaterialType,

        #[serde(default = "default_attenuation")]
        attenuation: f32,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        motion: Option<Motion>,
    },
}

impl Primitive {
    pub fn get_name(&self) -> &str {
        match self {
            Self::Sphere { name, .. } => name,
        }
    }
}

fn default_attenuation() -> f32 {
    DEFAULT_ATTENUATION
}
