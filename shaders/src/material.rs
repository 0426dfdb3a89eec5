use bytemuck::{Pod, Zeroable};

// NOTE: Update MaterialKind::to_shader() when adding new materials.
pub const MAT_TYPE_LAMBERTIAN: u32 = 0;
pub const MAT_TYPE_GLOSSY: u32 = 1;

/// Surface description read by the kernel for every hit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct GpuMaterial {
    pub kind: u32,
    pub _pad0: [u32; 3],
    pub base_colour: [f32; 4],
    pub attenuation: f32,
    pub _pad1: [u32; 3],
}

impl GpuMaterial {
    pub fn new(kind: u32, base_colour: [f32; 4], attenuation: f32) -> Self {
        Self {
            kind,
            base_colour,
            attenuation,
            ..Default::default()
        }
    }
}
