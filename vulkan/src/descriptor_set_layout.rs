use std::sync::Arc;

use anyhow::Result;
use ash::vk;
use log::{debug, error};

use crate::VulkanContext;

pub struct DescriptorSetLayout {
    context: Arc<VulkanContext>,
    pub layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Layout with one descriptor per `(binding, type)` pair, visible to `stage`.
    pub fn new(
        context: Arc<VulkanContext>,
        bindings: &[(u32, vk::DescriptorType)],
        stage: vk::ShaderStageFlags,
    ) -> Result<Self> {
        let bindings: Vec<_> = bindings
            .iter()
            .map(|&(binding, ty)| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(binding)
                    .descriptor_type(ty)
                    .descriptor_count(1)
                    .stage_flags(stage)
            })
            .collect();

        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let layout = unsafe {
            context
                .device
                .create_descriptor_set_layout(&create_info, None)?
        };
        debug!("Descriptor set layout with {} bindings", bindings.len());

        Ok(Self { context, layout })
    }

    pub fn get(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.context.device.device_wait_idle() {
                error!("DescriptorSetLayout: device_wait_idle failed: {e:?}");
            }

            self.context
                .device
                .destroy_descriptor_set_layout(self.layout, None);
        }
    }
}
