//! Meshlet pipeline: optional task stage, mesh stage, fragment stage. No
//! vertex input or input assembly; geometry comes out of the mesh shader.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::context::DeviceContext;
use crate::error::{GraphicsError, Result};
use crate::pipeline::{
    create_pipeline_cache, create_shader_module, entry_point_cstring, load_shader_bytecode,
    PipelineLayout, PreparedStage, RenderingAttachments,
};
use crate::schematic::{PipelineSchematic, PipelineState, PipelineType, ShaderStage};

pub struct MeshletPipeline {
    device: Arc<DeviceContext>,
    layout: Arc<PipelineLayout>,
    cache: vk::PipelineCache,
    stages: Vec<PreparedStage>,
    state: PipelineState,
    pipeline: vk::Pipeline,
}

impl MeshletPipeline {
    pub fn new(
        device: &Arc<DeviceContext>,
        layout: Arc<PipelineLayout>,
        schematic: &PipelineSchematic,
        blob: Option<&[u8]>,
    ) -> Result<Self> {
        assert_eq!(
            schematic.pipeline_type,
            PipelineType::Meshlet,
            "schematic must describe a meshlet pipeline"
        );

        if schematic.shader(ShaderStage::Mesh).is_none() {
            return Err(GraphicsError::MissingShaderStage("mesh"));
        }
        if schematic.shader(ShaderStage::Fragment).is_none() {
            return Err(GraphicsError::MissingShaderStage("fragment"));
        }
        let state = schematic
            .state
            .clone()
            .ok_or_else(|| GraphicsError::Initialization("meshlet schematic carries no state block".into()))?;

        let cache = create_pipeline_cache(device)?;

        let stage_order = [
            (ShaderStage::Task, "task"),
            (ShaderStage::Mesh, "mesh"),
            (ShaderStage::Fragment, "fragment"),
        ];

        let mut stages = Vec::new();
        for (stage, stage_name) in stage_order {
            let Some(info) = schematic.shader(stage) else {
                continue;
            };
            let bytecode = load_shader_bytecode(info, blob, stage_name)?;
            stages.push(PreparedStage {
                stage: stage.to_vk(),
                module: create_shader_module(device, &bytecode)?,
                entry_point: entry_point_cstring(info),
            });
        }

        Ok(Self {
            device: Arc::clone(device),
            layout,
            cache,
            stages,
            state,
            pipeline: vk::Pipeline::null(),
        })
    }

    /// Creates the driver pipeline against `attachments`. Shader modules are
    /// freed afterwards, so a pipeline bakes exactly once.
    pub fn bake(&mut self, attachments: &RenderingAttachments) -> Result<()> {
        assert!(!self.stages.is_empty(), "pipeline has already been baked");

        let stage_infos: Vec<_> = self.stages.iter().map(PreparedStage::create_info).collect();

        let viewport = self.state.viewport.to_vk();
        let rasterization = self.state.rasterization.to_vk();
        let multisample = self.state.multisample.to_vk();
        let depth_stencil = self.state.depth_stencil.to_vk();

        let (mut color_blend, blend_attachments) = self.state.color_blend.to_vk();
        color_blend.attachment_count = blend_attachments.len() as u32;
        color_blend.p_attachments = blend_attachments.as_ptr();

        let mut dynamic_states = self.state.dynamic.to_vk();
        if dynamic_states.is_empty() {
            dynamic_states = vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        }
        let dynamic_state_info =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let mut rendering_info = vk::PipelineRenderingCreateInfo::builder()
            .color_attachment_formats(&attachments.color_formats)
            .depth_attachment_format(attachments.depth_format.unwrap_or(vk::Format::UNDEFINED))
            .stencil_attachment_format(attachments.stencil_format.unwrap_or(vk::Format::UNDEFINED));

        let create_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stage_infos)
            .viewport_state(&viewport)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .color_blend_state(&color_blend)
            .depth_stencil_state(&depth_stencil)
            .dynamic_state(&dynamic_state_info)
            .layout(self.layout.raw())
            .subpass(0)
            .base_pipeline_index(-1)
            .push_next(&mut rendering_info);

        let pipelines = unsafe {
            self.device
                .device()
                .create_graphics_pipelines(self.cache, &[create_info.build()], None)
        }
        .map_err(|(_, err)| GraphicsError::from(err))?;
        self.pipeline = pipelines[0];

        for stage in self.stages.drain(..) {
            unsafe { self.device.device().destroy_shader_module(stage.module, None) };
        }

        debug!("baked meshlet pipeline");
        Ok(())
    }

    pub fn bind(&self, cmd: vk::CommandBuffer, descriptor_sets: &[vk::DescriptorSet]) {
        unsafe {
            self.device.device().cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.layout.raw(),
                0,
                descriptor_sets,
                &[],
            );
            self.device
                .device()
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);
        }
    }

    pub fn raw(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn layout(&self) -> &Arc<PipelineLayout> {
        &self.layout
    }
}

impl Drop for MeshletPipeline {
    fn drop(&mut self) {
        unsafe {
            if self.pipeline != vk::Pipeline::null() {
                self.device.device().destroy_pipeline(self.pipeline, None);
            }
            for stage in self.stages.drain(..) {
                self.device.device().destroy_shader_module(stage.module, None);
            }
            self.device.device().destroy_pipeline_cache(self.cache, None);
        }
    }
}
