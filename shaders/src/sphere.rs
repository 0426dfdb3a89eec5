use bytemuck::{Pod, Zeroable};

use crate::GpuMaterial;

/// Kernel-declared stride of one element of the objects buffer.
pub const SPHERE_STRIDE: usize = 64;

const _: () = assert!(std::mem::size_of::<GpuSphere>() == SPHERE_STRIDE);

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct GpuSphere {
    pub center: [f32; 3],
    pub radius: f32,
    pub material: GpuMaterial,
}
