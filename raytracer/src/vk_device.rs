use std::sync::Arc;

use anyhow::Result;
use ash::vk;
use log::debug;
use shaders::{
    OBJECTS_BINDING, OUTPUT_IMAGE_BINDING, RaytracePushConstants, SAMPLES_BINDING, WORKGROUP_SIZE,
};
use vulkan::{
    Buffer, CommandBuffer, DeviceRequirements, Fence, FrameSync, Image, LayoutTransition,
    Swapchain, SwapchainNextImage, SwapchainPresent, VulkanContext, new_storage_ds,
};
use winit::window::Window;

use crate::{ComputeDevice, ComputePipeline, Extent, KernelBindings, PresentOutcome, Workgroups};

const OUTPUT_FORMAT: vk::Format = vk::Format::R32G32B32A32_SFLOAT;

/// Runs the kernel on a Vulkan queue and presents through a window swapchain.
pub struct VulkanDevice {
    pipeline: ComputePipeline,
    frame_sync: FrameSync,
    fence: Fence,
    swapchain: Swapchain,
    context: Arc<VulkanContext>,
}

impl VulkanDevice {
    pub fn new(app_name: &str, window: &Window) -> Result<Self> {
        let requirements = DeviceRequirements {
            storage_image_format: OUTPUT_FORMAT,
            workgroup_size: [WORKGROUP_SIZE, WORKGROUP_SIZE],
        };
        let context = Arc::new(VulkanContext::new(app_name, window, &requirements)?);
        let swapchain = Swapchain::new(context.clone(), window)?;
        let pipeline = ComputePipeline::new(context.clone())?;

        Ok(Self {
            pipeline,
            frame_sync: FrameSync::new(context.clone())?,
            fence: Fence::new(context.clone(), "frame")?,
            swapchain,
            context,
        })
    }

    /// Size of the current swapchain images.
    pub fn display_extent(&self) -> Extent {
        let extent = self.swapchain.extent();
        Extent::new(extent.width, extent.height)
    }

    /// Replaces the swapchain with one matching the window's current surface.
    pub fn recreate_swapchain(&mut self, window: &Window) -> Result<()> {
        debug!("Recreating swapchain");
        self.swapchain.destroy()?;
        self.swapchain = Swapchain::new(self.context.clone(), window)?;
        Ok(())
    }
}

impl ComputeDevice for VulkanDevice {
    type Buffer = Buffer;
    type Texture = Image;

    fn create_storage_buffer(&mut self, label: &'static str, size: u64) -> Result<Buffer> {
        Buffer::new_storage(self.context.clone(), label, size)
    }

    fn write_buffer(&mut self, buffer: &mut Buffer, bytes: &[u8]) -> Result<()> {
        buffer.store(bytes)
    }

    fn release_buffer(&mut self, buffer: Buffer) {
        drop(buffer);
    }

    fn create_output_texture(&mut self, extent: Extent) -> Result<Image> {
        Image::new_storage_image(
            self.context.clone(),
            "output",
            extent.width,
            extent.height,
            OUTPUT_FORMAT,
        )
    }

    fn release_texture(&mut self, texture: Image) {
        drop(texture);
    }

    fn dispatch(
        &mut self,
        bindings: KernelBindings<'_, Self>,
        push_constants: &RaytracePushConstants,
        workgroups: Workgroups,
    ) -> Result<()> {
        let output = &*bindings.output;

        let descriptor_set = new_storage_ds(
            self.context.clone(),
            &self.pipeline.descriptor_set_layout,
            &[
                (OBJECTS_BINDING, bindings.objects),
                (SAMPLES_BINDING, bindings.samples),
            ],
            (OUTPUT_IMAGE_BINDING, output),
        )?;

        let command_buffer = CommandBuffer::begin(self.context.clone(), "dispatch")?;

        command_buffer.transition(output.image, LayoutTransition::COMPUTE_WRITE);
        self.pipeline.record_commands(
            &command_buffer,
            descriptor_set.set,
            push_constants,
            workgroups,
        );
        command_buffer.transition(output.image, LayoutTransition::COMPUTE_TO_BLIT_SOURCE);

        command_buffer.submit_and_wait(&[], &[], &self.fence)?;

        Ok(())
    }

    fn present(&mut self, texture: &Image) -> Result<PresentOutcome> {
        let image_index = match self
            .swapchain
            .acquire_next_image(u64::MAX, &self.frame_sync)?
        {
            SwapchainNextImage::Acquired(index) => index,
            SwapchainNextImage::RecreateSwapchain => return Ok(PresentOutcome::TargetOutOfDate),
        };

        let target = self.swapchain.get_image(image_index)?;

        let command_buffer = CommandBuffer::begin(self.context.clone(), "present")?;
        command_buffer.transition(target.image, LayoutTransition::BLIT_TARGET);
        command_buffer.blit_whole(texture, target);
        command_buffer.transition(target.image, LayoutTransition::BLIT_TARGET_TO_PRESENT);
        let sync = self.frame_sync.blit_submission();
        command_buffer.submit_and_wait(&sync.wait, &sync.signal, &self.fence)?;

        let presented = self.swapchain.present(image_index, &self.frame_sync)?;

        unsafe { self.context.device.queue_wait_idle(self.context.queue())? };

        Ok(match presented {
            SwapchainPresent::Presented => PresentOutcome::Presented,
            SwapchainPresent::RecreateSwapchain => PresentOutcome::TargetOutOfDate,
        })
    }
}
