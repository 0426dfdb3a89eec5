//! Host-side mirrors of the compute kernel's data layouts and the compiled kernel itself.
//!
//! Every type here is `#[repr(C)]` and laid out to match the kernel's std430 declarations.
//! The kernel-declared sizes are published as constants so hosts can assert them before
//! allocating device memory.

mod material;
mod push_constants;
mod sample;
mod sphere;

pub use material::*;
pub use push_constants::*;
pub use sample::*;
pub use sphere::*;

/// Bumped whenever a field is added to, removed from or moved within a kernel-visible type.
pub const LAYOUT_VERSION: u32 = 1;

/// Edge length of the square workgroup tile. Passed to the kernel as specialization
/// constants 0 and 1 so `local_size_x`/`local_size_y` always match the host partitioning.
pub const WORKGROUP_SIZE: u32 = 16;

/// Descriptor binding of the sphere storage buffer.
pub const OBJECTS_BINDING: u32 = 0;

/// Descriptor binding of the jitter sample storage buffer.
pub const SAMPLES_BINDING: u32 = 1;

/// Descriptor binding of the `rgba32f` output image.
pub const OUTPUT_IMAGE_BINDING: u32 = 2;

/// SPIR-V for the ray tracing compute kernel. Entry point is `main`.
pub const RAYTRACE_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/raytrace.spv"));
