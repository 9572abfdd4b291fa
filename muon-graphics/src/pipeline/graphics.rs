//! Graphics pipeline: vertex + fragment with optional tessellation and
//! geometry stages, baked against dynamic-rendering attachment formats.

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
use crate::shader::reflection::{reflect_vertex_input, VertexInputDescription};

pub struct GraphicsPipeline {
    device: Arc<DeviceContext>,
    layout: Arc<PipelineLayout>,
    cache: vk::PipelineCache,
    stages: Vec<PreparedStage>,
    state: PipelineState,
    vertex_input: Option<VertexInputDescription>,
    pipeline: vk::Pipeline,
}

impl GraphicsPipeline {
    /// Builds shader modules and reflected vertex input from the schematic.
    /// The driver pipeline is produced later by [`Self::bake`].
    ///
    /// `blob` backs schematic shaders referenced by byte range.
    pub fn new(
        device: &Arc<DeviceContext>,
        layout: Arc<PipelineLayout>,
        schematic: &PipelineSchematic,
        blob: Option<&[u8]>,
    ) -> Result<Self> {
        assert_eq!(
            schematic.pipeline_type,
            PipelineType::Graphics,
            "schematic must describe a graphics pipeline"
        );

        if schematic.shader(ShaderStage::Vertex).is_none() {
            return Err(GraphicsError::MissingShaderStage("vertex"));
        }
        if schematic.shader(ShaderStage::Fragment).is_none() {
            return Err(GraphicsError::MissingShaderStage("fragment"));
        }
        let state = schematic
            .state
            .clone()
            .ok_or_else(|| GraphicsError::Initialization("graphics schematic carries no state block".into()))?;

        let cache = create_pipeline_cache(device)?;

        let stage_order = [
            (ShaderStage::Vertex, "vertex"),
            (ShaderStage::TessellationControl, "tessellation control"),
            (ShaderStage::TessellationEvaluation, "tessellation evaluation"),
            (ShaderStage::Geometry, "geometry"),
            (ShaderStage::Fragment, "fragment"),
        ];

        let mut stages = Vec::new();
        let mut vertex_input = None;
        for (stage, stage_name) in stage_order {
            let Some(info) = schematic.shader(stage) else {
                continue;
            };
            let bytecode = load_shader_bytecode(info, blob, stage_name)?;

            if stage == ShaderStage::Vertex {
                vertex_input = reflect_vertex_input(&bytecode)?;
            }

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
            vertex_input,
            pipeline: vk::Pipeline::null(),
        })
    }

    /// Creates the driver pipeline against `attachments`. Shader modules are
    /// freed afterwards, so a pipeline bakes exactly once.
    pub fn bake(&mut self, attachments: &RenderingAttachments) -> Result<()> {
        assert!(!self.stages.is_empty(), "pipeline has already been baked");

        let stage_infos: Vec<_> = self.stages.iter().map(PreparedStage::create_info).collect();

        let mut vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder();
        let binding_descriptions;
        if let Some(vertex_input) = &self.vertex_input {
            binding_descriptions = [vertex_input.binding];
            vertex_input_info = vertex_input_info
                .vertex_binding_descriptions(&binding_descriptions)
                .vertex_attribute_descriptions(&vertex_input.attributes);
        }

        let input_assembly = self.state.input_assembly.unwrap_or_default().to_vk();
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
            .vertex_input_state(&vertex_input_info)
            .input_assembly_state(&input_assembly)
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

        debug!("baked graphics pipeline");
        Ok(())
    }

    /// Binds layout, descriptor sets, and pipeline for graphics work.
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

    pub fn vertex_input(&self) -> Option<&VertexInputDescription> {
        self.vertex_input.as_ref()
    }
}

impl Drop for GraphicsPipeline {
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
