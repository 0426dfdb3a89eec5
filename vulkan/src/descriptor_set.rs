use std::{marker::PhantomData, sync::Arc};

use anyhow::{Context, Result};
use ash::vk;
use log::debug;

use crate::{Buffer, DescriptorSetLayout, Image, VulkanContext};

/// A descriptor set with its own pool. It borrows the resources it points at, so they cannot be
/// released while the set is alive.
pub struct DescriptorSet<'a> {
    pub set: vk::DescriptorSet,

    context: Arc<VulkanContext>,
    pool: vk::DescriptorPool,
    _resources: PhantomData<&'a ()>,
}

impl Drop for DescriptorSet<'_> {
    fn drop(&mut self) {
        debug!("DescriptorSet: destroy pool");
        // Destroying the pool frees the set.
        unsafe { self.context.device.destroy_descriptor_pool(self.pool, None) };
    }
}

/// Creates a set pointing each `(binding, buffer)` at a storage buffer and `image` at a storage
/// image in `GENERAL` layout.
pub fn new_storage_ds<'a>(
    context: Arc<VulkanContext>,
    descriptor_set_layout: &DescriptorSetLayout,
    buffers: &[(u32, &'a Buffer)],
    image: (u32, &'a Image),
) -> Result<DescriptorSet<'a>> {
    let (image_binding, image) = image;
    let pool_sizes = [
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::STORAGE_BUFFER,
            descriptor_count: (buffers.len() as u32).max(1),
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::STORAGE_IMAGE,
            descriptor_count: 1,
        },
    ];

    let pool_info = vk::DescriptorPoolCreateInfo::default()
        .pool_sizes(&pool_sizes)
        .max_sets(1);
    let pool = unsafe { context.device.create_descriptor_pool(&pool_info, None)? };

    // From here on the pool is owned by `descriptor_set` and destroyed on any early return.
    let mut descriptor_set = DescriptorSet {
        set: vk::DescriptorSet::null(),
        context,
        pool,
        _resources: PhantomData,
    };

    let layouts = [descriptor_set_layout.get()];
    let alloc_info = vk::DescriptorSetAllocateInfo::default()
        .descriptor_pool(pool)
        .set_layouts(&layouts);
    descriptor_set.set = unsafe {
        descriptor_set
            .context
            .device
            .allocate_descriptor_sets(&alloc_info)?
    }
    .into_iter()
    .next()
    .context("No descriptor set allocated")?;

    let buffer_infos: Vec<_> = buffers
        .iter()
        .map(|(binding, buffer)| {
            (
                *binding,
                [vk::DescriptorBufferInfo::default()
                    .buffer(buffer.buffer)
                    .range(vk::WHOLE_SIZE)],
            )
        })
        .collect();

    let image_info = [vk::DescriptorImageInfo::default()
        .image_layout(vk::ImageLayout::GENERAL)
        .image_view(image.image_view)];

    let image_write = vk::WriteDescriptorSet::default()
        .dst_set(descriptor_set.set)
        .dst_binding(image_binding)
        .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
        .image_info(&image_info);

    let writes: Vec<_> = buffer_infos
        .iter()
        .map(|(binding, info)| {
            vk::WriteDescriptorSet::default()
                .dst_set(descriptor_set.set)
                .dst_binding(*binding)
                .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                .buffer_info(info)
        })
        .chain([image_write])
        .collect();

    unsafe {
        descriptor_set
            .context
            .device
            .update_descriptor_sets(&writes, &[]);
    }

    Ok(descriptor_set)
}
