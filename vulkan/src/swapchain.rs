use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use ash::vk;
use log::{debug, error};
use winit::window::Window;

use crate::{FrameSync, Image, VulkanContext};

pub enum SwapchainNextImage {
    Acquired(usize),
    RecreateSwapchain,
}

pub enum SwapchainPresent {
    Presented,
    RecreateSwapchain,
}

struct SurfaceProperties {
    format: vk::SurfaceFormatKHR,
    resolution: vk::Extent2D,
    capabilities: vk::SurfaceCapabilitiesKHR,
    present_mode: vk::PresentModeKHR,
}

/// Swapchain whose images are only ever written by blits, so they carry no image views.
pub struct Swapchain {
    context: Arc<VulkanContext>,
    swapchain: vk::SwapchainKHR,
    images: Vec<Image>,
    extent: vk::Extent2D,
    is_destroyed: bool,
}

impl Swapchain {
    pub fn new(context: Arc<VulkanContext>, window: &Window) -> Result<Self> {
        let properties = get_surface_properties(&context, window)?;

        if !properties
            .capabilities
            .supported_usage_flags
            .contains(vk::ImageUsageFlags::TRANSFER_DST)
        {
            bail!("Surface images cannot be used as blit targets");
        }

        let mut image_count = properties.capabilities.min_image_count + 1;
        if properties.capabilities.max_image_count > 0 {
            image_count = image_count.min(properties.capabilities.max_image_count);
        }

        let pre_transform = if properties
            .capabilities
            .supported_transforms
            .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
        {
            vk::SurfaceTransformFlagsKHR::IDENTITY
        } else {
            properties.capabilities.current_transform
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(context.surface)
            .min_image_count(image_count)
            .image_color_space(properties.format.color_space)
            .image_format(properties.format.format)
            .image_extent(properties.resolution)
            .image_usage(vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(properties.present_mode)
            .clipped(true)
            .image_array_layers(1);

        let swapchain = unsafe { context.swapchain_loader.create_swapchain(&create_info, None)? };

        let images = match unsafe { context.swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(images) => images
                .into_iter()
                .map(|image| {
                    Image::borrowed(
                        context.clone(),
                        image,
                        vk::ImageView::null(),
                        properties.resolution.width,
                        properties.resolution.height,
                    )
                })
                .collect::<Vec<_>>(),
            Err(e) => {
                unsafe { context.swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(e.into());
            }
        };

        debug!(
            "Swapchain: {} images, {:?}, {:?}, {}x{}",
            images.len(),
            properties.format.format,
            properties.present_mode,
            properties.resolution.width,
            properties.resolution.height
        );

        Ok(Self {
            context,
            swapchain,
            images,
            extent: properties.resolution,
            is_destroyed: false,
        })
    }

    pub fn get_image(&self, index: usize) -> Result<&Image> {
        self.images
            .get(index)
            .ok_or_else(|| anyhow!("Swapchain index {index} out of bounds"))
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Acquires the next image, signalling the frame's acquire semaphore when it is ready to be
    /// written.
    pub fn acquire_next_image(
        &self,
        timeout: u64,
        frame: &FrameSync,
    ) -> Result<SwapchainNextImage> {
        let result = unsafe {
            self.context.swapchain_loader.acquire_next_image(
                self.swapchain,
                timeout,
                frame.acquire_signal(),
                vk::Fence::null(),
            )
        };

        // Suboptimal images are still acquired; presentation reports them.
        match result {
            Ok((index, _suboptimal)) => Ok(SwapchainNextImage::Acquired(index as usize)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(SwapchainNextImage::RecreateSwapchain),
            Err(e) => Err(anyhow!("Unable to acquire swapchain image: {e:?}")),
        }
    }

    /// Queues `image_index` for presentation once the frame's blit has finished.
    pub fn present(&self, image_index: usize, frame: &FrameSync) -> Result<SwapchainPresent> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index as u32];
        let wait_semaphores = frame.present_wait();

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.context
                .swapchain_loader
                .queue_present(self.context.queue(), &present_info)
        };

        match result {
            Ok(false) => Ok(SwapchainPresent::Presented),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                Ok(SwapchainPresent::RecreateSwapchain)
            }
            Err(e) => Err(anyhow!("Unable to present: {e:?}")),
        }
    }

    /// Waits for the device and destroys the swapchain. Safe to call more than once.
    pub fn destroy(&mut self) -> Result<()> {
        if self.is_destroyed {
            return Ok(());
        }

        unsafe { self.context.device.device_wait_idle()? };

        self.images.clear();
        unsafe {
            self.context
                .swapchain_loader
                .destroy_swapchain(self.swapchain, None);
        }
        self.is_destroyed = true;

        debug!("Swapchain: destroyed");
        Ok(())
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            error!("Swapchain: {e}");
        }
    }
}

fn get_surface_properties(context: &VulkanContext, window: &Window) -> Result<SurfaceProperties> {
    let loader = &context.surface_loader;
    let (formats, capabilities, present_modes) = unsafe {
        (
            loader.get_physical_device_surface_formats(context.physical_device, context.surface)?,
            loader.get_physical_device_surface_capabilities(
                context.physical_device,
                context.surface,
            )?,
            loader.get_physical_device_surface_present_modes(
                context.physical_device,
                context.surface,
            )?,
        )
    };

    // sRGB targets get the transfer function applied by the blit.
    let format = formats
        .iter()
        .copied()
        .find(|f| {
            matches!(
                f.format,
                vk::Format::B8G8R8A8_SRGB | vk::Format::R8G8B8A8_SRGB
            )
        })
        .or_else(|| formats.first().copied())
        .ok_or_else(|| anyhow!("Surface reports no formats"))?;

    let resolution = match capabilities.current_extent.width {
        u32::MAX => {
            let size = window.inner_size();
            vk::Extent2D {
                width: size.width.clamp(
                    capabilities.min_image_extent.width,
                    capabilities.max_image_extent.width,
                ),
                height: size.height.clamp(
                    capabilities.min_image_extent.height,
                    capabilities.max_image_extent.height,
                ),
            }
        }
        _ => capabilities.current_extent,
    };

    let present_mode = if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    };

    Ok(SurfaceProperties {
        format,
        resolution,
        capabilities,
        present_mode,
    })
}
