use glam::Vec4;
use shaders::{GpuMaterial, MAT_TYPE_GLOSSY, MAT_TYPE_LAMBERTIAN};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MaterialKind {
    #[default]
    Lambertian,
    Glossy,
}

impl MaterialKind {
    pub fn to_shader(self) -> u32 {
        match self {
            Self::Lambertian => MAT_TYPE_LAMBERTIAN,
            Self::Glossy => MAT_TYPE_GLOSSY,
        }
    }
}

/// Surface properties of a scene object, captured when the object is registered.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub kind: MaterialKind,
    pub base_colour: Vec4,

    /// Fraction of energy carried by a scattered ray, in `[0, 1]`.
    pub attenuation: f32,
}

impl Material {
    pub fn new(kind: MaterialKind, base_colour: Vec4, attenuation: f32) -> Self {
        Self {
            kind,
            base_colour,
            attenuation,
        }
    }

    pub fn to_shader(&self) -> GpuMaterial {
        GpuMaterial::new(
            self.kind.to_shader(),
            self.base_colour.to_array(),
            self.attenuation,
        )
    }
}
