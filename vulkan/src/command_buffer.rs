use std::sync::Arc;

use anyhow::Result;
use ash::vk;
use log::debug;

use crate::{Fence, Image, LayoutTransition, VulkanContext};

/// A primary command buffer recorded once, submitted once and freed on drop.
pub struct CommandBuffer {
    context: Arc<VulkanContext>,
    command_buffer: vk::CommandBuffer,
    name: String,
}

impl CommandBuffer {
    /// Allocates a command buffer and begins recording with `ONE_TIME_SUBMIT`.
    pub fn begin(context: Arc<VulkanContext>, name: &str) -> Result<Self> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_pool(context.command_pool)
            .command_buffer_count(1);

        let command_buffer = unsafe { context.device.allocate_command_buffers(&alloc_info)? }
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No command buffer allocated for {name}"))?;

        let recording = Self {
            context,
            command_buffer,
            name: name.to_string(),
        };

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            recording
                .context
                .device
                .begin_command_buffer(command_buffer, &begin_info)?;
        }

        debug!("Command buffer {name}: recording");
        Ok(recording)
    }

    /// Ends recording, submits to the context queue and blocks on `fence`. `wait` and `signal`
    /// are semaphores the submission waits on at the transfer stage and signals on completion.
    pub fn submit_and_wait(
        self,
        wait: &[vk::Semaphore],
        signal: &[vk::Semaphore],
        fence: &Fence,
    ) -> Result<()> {
        unsafe {
            self.context
                .device
                .end_command_buffer(self.command_buffer)?;
        }

        let command_buffers = [self.command_buffer];
        let wait_stages = vec![vk::PipelineStageFlags::TRANSFER; wait.len()];
        let submit_info = vk::SubmitInfo::default()
            .command_buffers(&command_buffers)
            .wait_semaphores(wait)
            .wait_dst_stage_mask(&wait_stages)
            .signal_semaphores(signal);

        debug!("Command buffer {}: submit", &self.name);
        unsafe {
            self.context
                .device
                .queue_submit(self.context.queue(), &[submit_info], fence.get())?;
        }

        fence.wait_and_reset()
    }

    /// Records an image layout barrier covering the single colour subresource of `image`.
    pub fn transition(&self, image: vk::Image, transition: LayoutTransition) {
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(transition.old_layout)
            .new_layout(transition.new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .level_count(1)
                    .layer_count(1),
            )
            .src_access_mask(transition.src_access)
            .dst_access_mask(transition.dst_access);

        unsafe {
            self.context.device.cmd_pipeline_barrier(
                self.command_buffer,
                transition.src_stage,
                transition.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }

    /// Binds a compute pipeline with one descriptor set and push constants at offset 0, then
    /// dispatches `groups` workgroups in x and y.
    pub fn dispatch_compute(
        &self,
        pipeline: vk::Pipeline,
        layout: vk::PipelineLayout,
        descriptor_set: vk::DescriptorSet,
        push_constants: &[u8],
        groups: [u32; 2],
    ) {
        debug!(
            "Command buffer {}: dispatch {}x{}",
            &self.name, groups[0], groups[1]
        );

        let device = &self.context.device;
        unsafe {
            device.cmd_bind_pipeline(self.command_buffer, vk::PipelineBindPoint::COMPUTE, pipeline);
            device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::COMPUTE,
                layout,
                0,
                &[descriptor_set],
                &[],
            );
            device.cmd_push_constants(
                self.command_buffer,
                layout,
                vk::ShaderStageFlags::COMPUTE,
                0,
                push_constants,
            );
            device.cmd_dispatch(self.command_buffer, groups[0], groups[1], 1);
        }
    }

    /// Scales the whole of `src` onto the whole of `dst`. `src` must be in `TRANSFER_SRC_OPTIMAL`
    /// and `dst` in `TRANSFER_DST_OPTIMAL`.
    pub fn blit_whole(&self, src: &Image, dst: &Image) {
        let corner = |image: &Image| vk::Offset3D {
            x: image.width as i32,
            y: image.height as i32,
            z: 1,
        };
        let subresource = vk::ImageSubresourceLayers::default()
            .aspect_mask(vk::ImageAspectFlags::COLOR)
            .layer_count(1);

        let blit = vk::ImageBlit::default()
            .src_subresource(subresource)
            .src_offsets([vk::Offset3D::default(), corner(src)])
            .dst_subresource(subresource)
            .dst_offsets([vk::Offset3D::default(), corner(dst)]);

        unsafe {
            self.context.device.cmd_blit_image(
                self.command_buffer,
                src.image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                dst.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[blit],
                vk::Filter::NEAREST,
            );
        }
    }
}

impl Drop for CommandBuffer {
    fn drop(&mut self) {
        debug!("Command buffer {}: free", &self.name);
        unsafe {
            self.context
                .device
                .free_command_buffers(self.context.command_pool, &[self.command_buffer]);
        }
    }
}
