use anyhow::Result;
use shaders::RaytracePushConstants;

use crate::{Extent, Workgroups};

/// Result of handing an output texture to the display target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,

    /// The display target no longer matches the surface and must be recreated by the host.
    TargetOutOfDate,
}

/// The resources bound to the kernel for one dispatch, in binding order.
pub struct KernelBindings<'a, D: ComputeDevice + ?Sized> {
    pub objects: &'a D::Buffer,
    pub samples: &'a D::Buffer,
    pub output: &'a mut D::Texture,
}

/// A device that can run the ray tracing kernel and show its output.
///
/// Release methods take their handle by value so a handle cannot be released twice.
pub trait ComputeDevice {
    type Buffer;
    type Texture;

    fn create_storage_buffer(&mut self, label: &'static str, size: u64) -> Result<Self::Buffer>;

    /// Copies `bytes` to the start of `buffer`. A zero-length write leaves it unchanged.
    fn write_buffer(&mut self, buffer: &mut Self::Buffer, bytes: &[u8]) -> Result<()>;

    fn release_buffer(&mut self, buffer: Self::Buffer);

    /// Creates an RGBA32F texture the kernel can write and the display can read.
    fn create_output_texture(&mut self, extent: Extent) -> Result<Self::Texture>;

    fn release_texture(&mut self, texture: Self::Texture);

    /// Runs the kernel over `workgroups` and blocks until it completes.
    fn dispatch(
        &mut self,
        bindings: KernelBindings<'_, Self>,
        push_constants: &RaytracePushConstants,
        workgroups: Workgroups,
    ) -> Result<()>;

    /// Copies `texture` into the display target and blocks until it is shown.
    fn present(&mut self, texture: &Self::Texture) -> Result<PresentOutcome>;
}
