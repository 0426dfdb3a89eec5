use bytemuck::{Pod, Zeroable};

/// Kernel-declared stride of one element of the samples buffer.
pub const JITTER_SAMPLE_STRIDE: usize = 8;

const _: () = assert!(std::mem::size_of::<JitterSample>() == JITTER_SAMPLE_STRIDE);

/// World-space offset added to a pixel centre for one sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct JitterSample {
    pub dx: f32,
    pub dy: f32,
}
