use std::sync::Arc;

use anyhow::Result;
use ash::vk;
use log::debug;

use crate::{VulkanContext, get_memory_type_index};

/// Layout change plus the stages and accesses it synchronises.
#[derive(Clone, Copy, Debug)]
pub struct LayoutTransition {
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
}

impl LayoutTransition {
    /// Discards previous contents so a compute shader can write every texel.
    pub const COMPUTE_WRITE: Self = Self {
        old_layout: vk::ImageLayout::UNDEFINED,
        new_layout: vk::ImageLayout::GENERAL,
        src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
        dst_stage: vk::PipelineStageFlags::COMPUTE_SHADER,
        src_access: vk::AccessFlags::empty(),
        dst_access: vk::AccessFlags::SHADER_WRITE,
    };

    /// Compute output becomes a blit source.
    pub const COMPUTE_TO_BLIT_SOURCE: Self = Self {
        old_layout: vk::ImageLayout::GENERAL,
        new_layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        src_stage: vk::PipelineStageFlags::COMPUTE_SHADER,
        dst_stage: vk::PipelineStageFlags::TRANSFER,
        src_access: vk::AccessFlags::SHADER_WRITE,
        dst_access: vk::AccessFlags::TRANSFER_READ,
    };

    /// A freshly acquired swapchain image becomes a blit target.
    pub const BLIT_TARGET: Self = Self {
        old_layout: vk::ImageLayout::UNDEFINED,
        new_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        src_stage: vk::PipelineStageFlags::TRANSFER,
        dst_stage: vk::PipelineStageFlags::TRANSFER,
        src_access: vk::AccessFlags::empty(),
        dst_access: vk::AccessFlags::TRANSFER_WRITE,
    };

    /// Blit target is handed to the presentation engine.
    pub const BLIT_TARGET_TO_PRESENT: Self = Self {
        old_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        new_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        src_stage: vk::PipelineStageFlags::TRANSFER,
        dst_stage: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        src_access: vk::AccessFlags::TRANSFER_WRITE,
        dst_access: vk::AccessFlags::empty(),
    };
}

/// A 2D colour image. Owned images free their memory on drop; swapchain images only borrow
/// their handles.
pub struct Image {
    pub image: vk::Image,
    pub image_view: vk::ImageView,
    pub width: u32,
    pub height: u32,

    context: Arc<VulkanContext>,
    memory: Option<vk::DeviceMemory>,
}

impl Image {
    /// Wraps an image owned by someone else, such as the swapchain.
    pub fn borrowed(
        context: Arc<VulkanContext>,
        image: vk::Image,
        image_view: vk::ImageView,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            context,
            image,
            image_view,
            width,
            height,
            memory: None,
        }
    }

    /// Device-local image written by compute shaders through a storage binding and read back
    /// as a blit source.
    pub fn new_storage_image(
        context: Arc<VulkanContext>,
        name: &str,
        width: u32,
        height: u32,
        format: vk::Format,
    ) -> Result<Self> {
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::TRANSFER_SRC)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let device = &context.device;
        let image = unsafe { device.create_image(&image_info, None)? };
        let requirements = unsafe { device.get_image_memory_requirements(image) };

        let allocated = get_memory_type_index(
            context.device_memory_properties,
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
        .and_then(|memory_type_index| {
            let alloc_info = vk::MemoryAllocateInfo::default()
                .allocation_size(requirements.size)
                .memory_type_index(memory_type_index);
            Ok(unsafe { device.allocate_memory(&alloc_info, None)? })
        });

        let memory = match allocated {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e.into());
            }
        };

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .level_count(1)
                    .layer_count(1),
            );

        let image_view = unsafe {
            device
                .bind_image_memory(image, memory, 0)
                .and_then(|_| device.create_image_view(&view_info, None))
        };
        let image_view = match image_view {
            Ok(view) => view,
            Err(e) => {
                unsafe {
                    device.destroy_image(image, None);
                    device.free_memory(memory, None);
                }
                return Err(e.into());
            }
        };

        if let Err(e) = context.set_debug_utils_object_name(image, name) {
            debug!("Image {name}: unable to set debug name: {e}");
        }

        debug!("Image {name}: created {width}x{height} {format:?}");

        Ok(Self {
            context,
            image,
            image_view,
            width,
            height,
            memory: Some(memory),
        })
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        let Some(memory) = self.memory.take() else {
            return;
        };

        unsafe {
            let device = &self.context.device;
            device.destroy_image_view(self.image_view, None);
            device.destroy_image(self.image, None);
            device.free_memory(memory, None);
        }
    }
}
