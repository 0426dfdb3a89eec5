use std::sync::Arc;

use anyhow::Result;
use ash::vk;
use log::{debug, error};

use crate::VulkanContext;

/// Host-side wait for one queue submission at a time.
pub struct Fence {
    name: String,
    context: Arc<VulkanContext>,
    fence: vk::Fence,
}

impl Fence {
    /// Creates an unsignaled fence.
    pub fn new(context: Arc<VulkanContext>, name: &str) -> Result<Self> {
        let fence = unsafe {
            context
                .device
                .create_fence(&vk::FenceCreateInfo::default(), None)?
        };
        debug!("Fence {name}: created");

        Ok(Self {
            name: name.to_string(),
            context,
            fence,
        })
    }

    pub fn get(&self) -> vk::Fence {
        self.fence
    }

    /// Blocks until the fence is signaled, then returns it to the unsignaled state.
    pub fn wait_and_reset(&self) -> Result<()> {
        let fences = [self.fence];
        unsafe {
            self.context.device.wait_for_fences(&fences, true, u64::MAX)?;
            self.context.device.reset_fences(&fences)?;
        }
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        debug!("Fence {}: destroy", self.name);
        unsafe {
            if let Err(e) = self.context.device.device_wait_idle() {
                error!("Fence {}: device_wait_idle failed: {e:?}", self.name);
            }
            self.context.device.destroy_fence(self.fence, None);
        }
    }
}
