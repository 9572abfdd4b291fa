//! Pipeline construction from schematics.
//!
//! All pipeline kinds share the same lifecycle: a cache, shader modules built
//! from the schematic's SPIR-V references, a `bake` step that produces the
//! driver pipeline against dynamic-rendering attachment formats, and a `bind`
//! that attaches layout, descriptor sets, and pipeline to a command buffer.

pub mod compute;
pub mod graphics;
pub mod layout;
pub mod meshlet;

use std::ffi::CString;
use std::fs;
use std::io::Cursor;

use ash::vk;

use crate::context::DeviceContext;
use crate::error::{GraphicsError, Result};
use crate::schematic::ShaderInfo;

pub use compute::ComputePipeline;
pub use graphics::GraphicsPipeline;
pub use layout::PipelineLayout;
pub use meshlet::MeshletPipeline;

/// Attachment formats a graphics or meshlet pipeline is baked against when
/// rendering dynamically.
#[derive(Debug, Clone, Default)]
pub struct RenderingAttachments {
    pub color_formats: Vec<vk::Format>,
    pub depth_format: Option<vk::Format>,
    pub stencil_format: Option<vk::Format>,
}

/// A shader stage prepared for pipeline creation. The module is destroyed
/// once the pipeline has been baked.
pub(crate) struct PreparedStage {
    pub stage: vk::ShaderStageFlags,
    pub module: vk::ShaderModule,
    pub entry_point: CString,
}

impl PreparedStage {
    pub fn create_info(&self) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(self.stage)
            .module(self.module)
            .name(&self.entry_point)
            .build()
    }
}

/// Resolves a schematic shader reference to its SPIR-V bytes: either the
/// file at `path`, or a byte range into `blob`.
pub(crate) fn load_shader_bytecode(
    info: &ShaderInfo,
    blob: Option<&[u8]>,
    stage_name: &'static str,
) -> Result<Vec<u8>> {
    if let Some(path) = &info.path {
        return fs::read(path).map_err(|err| {
            GraphicsError::ShaderBytecode(stage_name, format!("{}: {err}", path.display()))
        });
    }

    let (Some(offset), Some(length)) = (info.byte_offset, info.byte_length) else {
        return Err(GraphicsError::ShaderBytecode(
            stage_name,
            "schematic names neither a path nor a byte range".into(),
        ));
    };

    let blob = blob.ok_or_else(|| {
        GraphicsError::ShaderBytecode(stage_name, "byte-range shader requires a binary blob".into())
    })?;

    let start = offset as usize;
    let end = start + length as usize;
    blob.get(start..end).map(<[u8]>::to_vec).ok_or_else(|| {
        GraphicsError::ShaderBytecode(
            stage_name,
            format!("byte range {start}..{end} exceeds blob of {} bytes", blob.len()),
        )
    })
}

pub(crate) fn create_shader_module(device: &DeviceContext, bytecode: &[u8]) -> Result<vk::ShaderModule> {
    let words = ash::util::read_spv(&mut Cursor::new(bytecode))
        .map_err(|err| GraphicsError::ShaderCompilation(format!("invalid SPIR-V: {err}")))?;

    let create_info = vk::ShaderModuleCreateInfo::builder().code(&words);
    unsafe { device.device().create_shader_module(&create_info, None) }.map_err(GraphicsError::from)
}

pub(crate) fn create_pipeline_cache(device: &DeviceContext) -> Result<vk::PipelineCache> {
    let create_info = vk::PipelineCacheCreateInfo::builder();
    unsafe { device.device().create_pipeline_cache(&create_info, None) }.map_err(GraphicsError::from)
}

pub(crate) fn entry_point_cstring(info: &ShaderInfo) -> CString {
    CString::new(info.entry_point.as_str()).unwrap_or_else(|_| CString::new("main").expect("static"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_range_resolves_against_blob() {
        let info = ShaderInfo::from_byte_range(4, 4, "main");
        let blob = [0_u8, 1, 2, 3, 4, 5, 6, 7, 8];

        let bytes = load_shader_bytecode(&info, Some(&blob), "vertex").unwrap();
        assert_eq!(bytes, vec![4, 5, 6, 7]);
    }

    #[test]
    fn byte_range_without_blob_fails() {
        let info = ShaderInfo::from_byte_range(0, 4, "vertex");
        assert!(load_shader_bytecode(&info, None, "vertex").is_err());
    }

    #[test]
    fn byte_range_out_of_bounds_fails() {
        let info = ShaderInfo::from_byte_range(8, 8, "vertex");
        let blob = [0_u8; 12];
        assert!(load_shader_bytecode(&info, Some(&blob), "vertex").is_err());
    }

    #[test]
    fn missing_file_reports_stage() {
        let info = ShaderInfo::from_path("/nonexistent/shader.spv", "main");
        let err = load_shader_bytecode(&info, None, "fragment").unwrap_err();
        assert!(matches!(err, GraphicsError::ShaderBytecode("fragment", _)));
    }
}
