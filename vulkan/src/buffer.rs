use std::{ptr, slice, sync::Arc};

use anyhow::{Context, Result, ensure};
use ash::vk;
use log::debug;

use crate::VulkanContext;

/// Host-visible, host-coherent storage buffer that stays mapped for its whole life. Writes are
/// visible to the next queue submission without explicit flushes.
pub struct Buffer {
    pub buffer: vk::Buffer,

    context: Arc<VulkanContext>,
    memory: vk::DeviceMemory,
    mapped: *mut u8,
    size: vk::DeviceSize,
    name: String,
}

impl Buffer {
    pub fn new_storage(context: Arc<VulkanContext>, name: &str, size: vk::DeviceSize) -> Result<Self> {
        ensure!(size > 0, "Buffer {name} requested with size 0");

        let device = &context.device;
        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(vk::BufferUsageFlags::STORAGE_BUFFER)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None)? };
        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let memory_type_index = match get_memory_type_index(
            context.device_memory_properties,
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let allocate_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { device.allocate_memory(&allocate_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e.into());
            }
        };

        let mapped = unsafe {
            device
                .bind_buffer_memory(buffer, memory, 0)
                .and_then(|_| device.map_memory(memory, 0, size, vk::MemoryMapFlags::empty()))
        };
        let mapped = match mapped {
            Ok(mapped) => mapped.cast::<u8>(),
            Err(e) => {
                unsafe {
                    device.destroy_buffer(buffer, None);
                    device.free_memory(memory, None);
                }
                return Err(e.into());
            }
        };

        if let Err(e) = context.set_debug_utils_object_name(buffer, name) {
            debug!("Buffer {name}: unable to set debug name: {e}");
        }

        debug!("Buffer {name}: created with {size} bytes");

        Ok(Self {
            buffer,
            context,
            memory,
            mapped,
            size,
            name: name.to_string(),
        })
    }

    /// Copies `bytes` to the start of the buffer. An empty slice leaves the buffer unchanged.
    pub fn store(&mut self, bytes: &[u8]) -> Result<()> {
        ensure!(
            bytes.len() as u64 <= self.size,
            "{} bytes do not fit in buffer {} of {} bytes",
            bytes.len(),
            self.name,
            self.size
        );

        // `mapped` covers `size` bytes and is only written through `&mut self`.
        unsafe {
            let target = slice::from_raw_parts_mut(self.mapped, bytes.len());
            ptr::copy_nonoverlapping(bytes.as_ptr(), target.as_mut_ptr(), bytes.len());
        }

        Ok(())
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        debug!("Buffer {}: drop", self.name);
        unsafe {
            let device = &self.context.device;
            device.unmap_memory(self.memory);
            device.destroy_buffer(self.buffer, None);
            device.free_memory(self.memory, None);
        }
    }
}

/// Index of the first memory type allowed by `type_bits` that has all of `properties`.
pub fn get_memory_type_index(
    device_memory_properties: vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    properties: vk::MemoryPropertyFlags,
) -> Result<u32> {
    device_memory_properties.memory_types[..device_memory_properties.memory_type_count as usize]
        .iter()
        .enumerate()
        .position(|(i, memory_type)| {
            type_bits & (1 << i) != 0 && memory_type.property_flags.contains(properties)
        })
        .map(|i| i as u32)
        .with_context(|| format!("No memory type with {properties:?}"))
}
