use std::{io::Cursor, mem::size_of, sync::Arc};

use anyhow::{Context, Result};
use ash::vk;
use log::{debug, error};
use shaders::{
    OBJECTS_BINDING, OUTPUT_IMAGE_BINDING, PUSH_CONSTANTS_SIZE, RAYTRACE_SPV,
    RaytracePushConstants, SAMPLES_BINDING, WORKGROUP_SIZE,
};
use vulkan::{CommandBuffer, DescriptorSetLayout, VulkanContext};

use crate::Workgroups;

/// The ray tracing compute pipeline.
pub struct ComputePipeline {
    context: Arc<VulkanContext>,

    /// Objects, samples and output image at their kernel bindings.
    pub descriptor_set_layout: DescriptorSetLayout,

    pub layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,
}

impl ComputePipeline {
    pub fn new(context: Arc<VulkanContext>) -> Result<Self> {
        let descriptor_set_layout = DescriptorSetLayout::new(
            context.clone(),
            &[
                (OBJECTS_BINDING, vk::DescriptorType::STORAGE_BUFFER),
                (SAMPLES_BINDING, vk::DescriptorType::STORAGE_BUFFER),
                (OUTPUT_IMAGE_BINDING, vk::DescriptorType::STORAGE_IMAGE),
            ],
            vk::ShaderStageFlags::COMPUTE,
        )?;

        let set_layouts = [descriptor_set_layout.get()];
        let push_constant_ranges = [vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::COMPUTE)
            .offset(0)
            .size(PUSH_CONSTANTS_SIZE as u32)];

        let layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);

        let layout = unsafe { context.device.create_pipeline_layout(&layout_info, None)? };

        let pipeline = match create_pipeline(&context, layout) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                unsafe { context.device.destroy_pipeline_layout(layout, None) };
                return Err(e);
            }
        };

        debug!("Compute pipeline created with {WORKGROUP_SIZE}x{WORKGROUP_SIZE} workgroups");

        Ok(Self {
            context,
            descriptor_set_layout,
            layout,
            pipeline,
        })
    }

    /// Records binding, push constants and the dispatch into `command_buffer`.
    pub fn record_commands(
        &self,
        command_buffer: &CommandBuffer,
        descriptor_set: vk::DescriptorSet,
        push_constants: &RaytracePushConstants,
        workgroups: Workgroups,
    ) {
        command_buffer.dispatch_compute(
            self.pipeline,
            self.layout,
            descriptor_set,
            push_constants.to_raw_bytes(),
            [workgroups.x, workgroups.y],
        );
    }
}

impl Drop for ComputePipeline {
    fn drop(&mut self) {
        debug!("ComputePipeline::drop()");
        unsafe {
            if let Err(e) = self.context.device.device_wait_idle() {
                error!("ComputePipeline::drop(): device_wait_idle failed: {e:?}");
            }

            self.context.device.destroy_pipeline(self.pipeline, None);
            self.context
                .device
                .destroy_pipeline_layout(self.layout, None);
        }
    }
}

fn create_pipeline(context: &VulkanContext, layout: vk::PipelineLayout) -> Result<vk::Pipeline> {
    let code = ash::util::read_spv(&mut Cursor::new(RAYTRACE_SPV))
        .context("Unable to read ray tracing kernel SPIR-V")?;

    let module_info = vk::ShaderModuleCreateInfo::default().code(&code);
    let module = unsafe { context.device.create_shader_module(&module_info, None)? };

    // Constants 0 and 1 size the workgroup in x and y.
    let workgroup_size = [WORKGROUP_SIZE, WORKGROUP_SIZE];
    let map_entries = [
        vk::SpecializationMapEntry::default()
            .constant_id(0)
            .offset(0)
            .size(size_of::<u32>()),
        vk::SpecializationMapEntry::default()
            .constant_id(1)
            .offset(size_of::<u32>() as u32)
            .size(size_of::<u32>()),
    ];
    let specialization_info = vk::SpecializationInfo::default()
        .map_entries(&map_entries)
        .data(bytemuck::cast_slice(&workgroup_size));

    let stage = vk::PipelineShaderStageCreateInfo::default()
        .stage(vk::ShaderStageFlags::COMPUTE)
        .module(module)
        .name(c"main")
        .specialization_info(&specialization_info);

    let create_info = vk::ComputePipelineCreateInfo::default()
        .stage(stage)
        .layout(layout);

    let result = unsafe {
        context
            .device
            .create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
    };

    unsafe { context.device.destroy_shader_module(module, None) };

    let pipelines = result.map_err(|(_, e)| e)?;
    pipelines
        .into_iter()
        .next()
        .context("No compute pipeline was created")
}
