//! Compute pipeline: a single shader, no attachment state, created in one
//! step since dynamic rendering plays no part.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::context::DeviceContext;
use crate::error::{GraphicsError, Result};
use crate::pipeline::{
    create_pipeline_cache, create_shader_module, entry_point_cstring, load_shader_bytecode,
    PipelineLayout,
};
use crate::schematic::{PipelineSchematic, PipelineType, ShaderStage};

pub struct ComputePipeline {
    device: Arc<DeviceContext>,
    layout: Arc<PipelineLayout>,
    cache: vk::PipelineCache,
    pipeline: vk::Pipeline,
    work_group_size: Option<[u32; 3]>,
}

impl ComputePipeline {
    pub fn new(
        device: &Arc<DeviceContext>,
        layout: Arc<PipelineLayout>,
        schematic: &PipelineSchematic,
        blob: Option<&[u8]>,
    ) -> Result<Self> {
        assert_eq!(
            schematic.pipeline_type,
            PipelineType::Compute,
            "schematic must describe a compute pipeline"
        );

        let info = schematic
            .shader(ShaderStage::Compute)
            .ok_or(GraphicsError::MissingShaderStage("compute"))?;

        let cache = create_pipeline_cache(device)?;
        let bytecode = load_shader_bytecode(info, blob, "compute")?;
        let module = create_shader_module(device, &bytecode)?;
        let entry_point = entry_point_cstring(info);

        let stage_info = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(module)
            .name(&entry_point);

        let create_info = vk::ComputePipelineCreateInfo::builder()
            .stage(stage_info.build())
            .layout(layout.raw())
            .base_pipeline_index(-1);

        let result = unsafe {
            device
                .device()
                .create_compute_pipelines(cache, &[create_info.build()], None)
        };

        // The module is only needed for pipeline creation.
        unsafe { device.device().destroy_shader_module(module, None) };

        let pipeline = match result {
            Ok(pipelines) => pipelines[0],
            Err((_, err)) => {
                unsafe { device.device().destroy_pipeline_cache(cache, None) };
                return Err(GraphicsError::from(err));
            }
        };

        debug!("created compute pipeline");
        Ok(Self {
            device: Arc::clone(device),
            layout,
            cache,
            pipeline,
            work_group_size: info.work_group_size,
        })
    }

    pub fn bind(&self, cmd: vk::CommandBuffer, descriptor_sets: &[vk::DescriptorSet]) {
        unsafe {
            self.device.device().cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::COMPUTE,
                self.layout.raw(),
                0,
                descriptor_sets,
                &[],
            );
            self.device
                .device()
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::COMPUTE, self.pipeline);
        }
    }

    pub fn dispatch(&self, cmd: vk::CommandBuffer, group_count: [u32; 3]) {
        unsafe {
            self.device
                .device()
                .cmd_dispatch(cmd, group_count[0], group_count[1], group_count[2]);
        }
    }

    pub fn raw(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn layout(&self) -> &Arc<PipelineLayout> {
        &self.layout
    }

    pub fn work_group_size(&self) -> Option<[u32; 3]> {
        self.work_group_size
    }
}

impl Drop for ComputePipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.device().destroy_pipeline(self.pipeline, None);
            self.device.device().destroy_pipeline_cache(self.cache, None);
        }
    }
}
