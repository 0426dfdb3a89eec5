use bytemuck::{Pod, Zeroable};

/// Kernel-declared size of the push constant block.
pub const PUSH_CONSTANTS_SIZE: usize = 80;

const _: () = assert!(std::mem::size_of::<RaytracePushConstants>() == PUSH_CONSTANTS_SIZE);

#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct RaytracePushConstants {
    // Per frame: 0–47
    pub background_colour: [f32; 4],
    pub camera_position: [f32; 4],
    pub light_position: [f32; 4],

    // Per epoch: 48–71
    pub screen_size_world: [f32; 2],
    pub screen_size_pixels: [u32; 2],
    pub samples_per_pixel: u32,
    pub max_depth: u32,

    // Per frame: 72–79
    pub object_count: u32,
    pub _pad: u32,
}

impl RaytracePushConstants {
    pub fn to_raw_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
