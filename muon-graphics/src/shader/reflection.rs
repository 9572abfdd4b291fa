//! SPIR-V reflection for vertex input wiring.
//!
//! Pipelines with vertex input derive their binding and attribute
//! descriptions from the vertex shader: input variables are sorted by
//! location, packed into binding 0, and offsets accumulate the per-format
//! byte sizes.

use ash::vk;
use spirv_reflect::types::{ReflectDecorationFlags, ReflectFormat};
use spirv_reflect::ShaderModule;

use crate::error::{GraphicsError, Result};

/// Vertex input state reflected from a shader, ready to splice into a
/// graphics pipeline create info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexInputDescription {
    pub binding: vk::VertexInputBindingDescription,
    pub attributes: Vec<vk::VertexInputAttributeDescription>,
}

fn format_size(format: ReflectFormat) -> Result<(vk::Format, u32)> {
    match format {
        ReflectFormat::R32_UINT => Ok((vk::Format::R32_UINT, 4)),
        ReflectFormat::R32_SINT => Ok((vk::Format::R32_SINT, 4)),
        ReflectFormat::R32_SFLOAT => Ok((vk::Format::R32_SFLOAT, 4)),
        ReflectFormat::R32G32_UINT => Ok((vk::Format::R32G32_UINT, 8)),
        ReflectFormat::R32G32_SINT => Ok((vk::Format::R32G32_SINT, 8)),
        ReflectFormat::R32G32_SFLOAT => Ok((vk::Format::R32G32_SFLOAT, 8)),
        ReflectFormat::R32G32B32_UINT => Ok((vk::Format::R32G32B32_UINT, 12)),
        ReflectFormat::R32G32B32_SINT => Ok((vk::Format::R32G32B32_SINT, 12)),
        ReflectFormat::R32G32B32_SFLOAT => Ok((vk::Format::R32G32B32_SFLOAT, 12)),
        ReflectFormat::R32G32B32A32_UINT => Ok((vk::Format::R32G32B32A32_UINT, 16)),
        ReflectFormat::R32G32B32A32_SINT => Ok((vk::Format::R32G32B32A32_SINT, 16)),
        ReflectFormat::R32G32B32A32_SFLOAT => Ok((vk::Format::R32G32B32A32_SFLOAT, 16)),
        other => Err(GraphicsError::Reflection(format!(
            "unsupported vertex input format: {other:?}"
        ))),
    }
}

/// Reflects the vertex input interface of `spirv`. Returns `None` when the
/// shader consumes no vertex inputs.
pub fn reflect_vertex_input(spirv: &[u8]) -> Result<Option<VertexInputDescription>> {
    let module = ShaderModule::load_u8_data(spirv)
        .map_err(|err| GraphicsError::Reflection(err.to_string()))?;

    let mut inputs = module
        .enumerate_input_variables(None)
        .map_err(|err| GraphicsError::Reflection(err.to_string()))?;

    inputs.retain(|input| {
        !input
            .decoration_flags
            .contains(ReflectDecorationFlags::BUILT_IN)
            && input.location != u32::MAX
    });

    if inputs.is_empty() {
        return Ok(None);
    }

    inputs.sort_by_key(|input| input.location);

    let mut attributes = Vec::with_capacity(inputs.len());
    let mut offset = 0;
    for input in &inputs {
        let (format, size) = format_size(input.format)?;
        attributes.push(vk::VertexInputAttributeDescription {
            location: input.location,
            binding: 0,
            format,
            offset,
        });
        offset += size;
    }

    let binding = vk::VertexInputBindingDescription {
        binding: 0,
        stride: offset,
        input_rate: vk::VertexInputRate::VERTEX,
    };

    Ok(Some(VertexInputDescription { binding, attributes }))
}
