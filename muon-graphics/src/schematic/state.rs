//! Pipeline state blocks.
//!
//! Every `*_enable` flag gates its dependent fields: serialization emits them
//! only when present, deserialization fails when an enabled flag is missing a
//! dependent and silently drops dependents whose gate is off.

use ash::vk;
use serde::{Deserialize, Serialize};

use crate::schematic::common::{
    BlendFactor, BlendOp, CompareOp, CullMode, DynamicState, FrontFace, LogicOp, PolygonMode,
    PrimitiveTopology, SampleCount, StencilOp,
};
use crate::schematic::SchematicError;

fn default_count() -> u32 {
    1
}

fn full_write_mask() -> vk::ColorComponentFlags {
    vk::ColorComponentFlags::R
        | vk::ColorComponentFlags::G
        | vk::ColorComponentFlags::B
        | vk::ColorComponentFlags::A
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputAssemblyState {
    pub topology: PrimitiveTopology,
    #[serde(default)]
    pub primitive_restart_enable: bool,
}

impl InputAssemblyState {
    pub fn to_vk(&self) -> vk::PipelineInputAssemblyStateCreateInfo {
        vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(self.topology.to_vk())
            .primitive_restart_enable(self.primitive_restart_enable)
            .build()
    }
}

impl Default for InputAssemblyState {
    fn default() -> Self {
        Self {
            topology: PrimitiveTopology::TriangleList,
            primitive_restart_enable: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportState {
    #[serde(default = "default_count")]
    pub viewport_count: u32,
    #[serde(default = "default_count")]
    pub scissor_count: u32,
}

impl ViewportState {
    /// Concrete rectangles are set dynamically per frame; only the counts are
    /// static state.
    pub fn to_vk(&self) -> vk::PipelineViewportStateCreateInfo {
        let mut info = vk::PipelineViewportStateCreateInfo::default();
        info.viewport_count = self.viewport_count;
        info.scissor_count = self.scissor_count;
        info
    }
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            viewport_count: 1,
            scissor_count: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawRasterizationState")]
pub struct RasterizationState {
    pub polygon_mode: PolygonMode,
    /// Required iff `polygon_mode` is `Line`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_width: Option<f32>,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    #[serde(default)]
    pub rasterizer_discard_enable: bool,
    #[serde(default)]
    pub depth_clamp_enable: bool,
    #[serde(default)]
    pub depth_bias_enable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth_bias_constant_factor: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth_bias_clamp: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth_bias_slope_factor: Option<f32>,
}

impl RasterizationState {
    pub fn to_vk(&self) -> vk::PipelineRasterizationStateCreateInfo {
        let mut info = vk::PipelineRasterizationStateCreateInfo::builder()
            .polygon_mode(self.polygon_mode.to_vk())
            .cull_mode(self.cull_mode.to_vk())
            .front_face(self.front_face.to_vk())
            .rasterizer_discard_enable(self.rasterizer_discard_enable)
            .depth_clamp_enable(self.depth_clamp_enable)
            .depth_bias_enable(self.depth_bias_enable)
            .line_width(1.0);

        if self.polygon_mode == PolygonMode::Line {
            info = info.line_width(self.line_width.unwrap_or(1.0));
        }
        if self.depth_bias_enable {
            info = info
                .depth_bias_constant_factor(self.depth_bias_constant_factor.unwrap_or(0.0))
                .depth_bias_clamp(self.depth_bias_clamp.unwrap_or(0.0))
                .depth_bias_slope_factor(self.depth_bias_slope_factor.unwrap_or(0.0));
        }

        info.build()
    }
}

impl Default for RasterizationState {
    fn default() -> Self {
        Self {
            polygon_mode: PolygonMode::Fill,
            line_width: None,
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            rasterizer_discard_enable: false,
            depth_clamp_enable: false,
            depth_bias_enable: false,
            depth_bias_constant_factor: None,
            depth_bias_clamp: None,
            depth_bias_slope_factor: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRasterizationState {
    polygon_mode: PolygonMode,
    #[serde(default)]
    line_width: Option<f32>,
    cull_mode: CullMode,
    front_face: FrontFace,
    #[serde(default)]
    rasterizer_discard_enable: bool,
    #[serde(default)]
    depth_clamp_enable: bool,
    #[serde(default)]
    depth_bias_enable: bool,
    #[serde(default)]
    depth_bias_constant_factor: Option<f32>,
    #[serde(default)]
    depth_bias_clamp: Option<f32>,
    #[serde(default)]
    depth_bias_slope_factor: Option<f32>,
}

impl TryFrom<RawRasterizationState> for RasterizationState {
    type Error = SchematicError;

    fn try_from(raw: RawRasterizationState) -> Result<Self, Self::Error> {
        let line_width = if raw.polygon_mode == PolygonMode::Line {
            Some(raw.line_width.ok_or(SchematicError::MissingConditional {
                gate: "polygonMode = Line",
                field: "lineWidth",
            })?)
        } else {
            None
        };

        let (constant, clamp, slope) = if raw.depth_bias_enable {
            let require = |value: Option<f32>, field: &'static str| {
                value.ok_or(SchematicError::MissingConditional {
                    gate: "depthBiasEnable",
                    field,
                })
            };
            (
                Some(require(raw.depth_bias_constant_factor, "depthBiasConstantFactor")?),
                Some(require(raw.depth_bias_clamp, "depthBiasClamp")?),
                Some(require(raw.depth_bias_slope_factor, "depthBiasSlopeFactor")?),
            )
        } else {
            (None, None, None)
        };

        Ok(Self {
            polygon_mode: raw.polygon_mode,
            line_width,
            cull_mode: raw.cull_mode,
            front_face: raw.front_face,
            rasterizer_discard_enable: raw.rasterizer_discard_enable,
            depth_clamp_enable: raw.depth_clamp_enable,
            depth_bias_enable: raw.depth_bias_enable,
            depth_bias_constant_factor: constant,
            depth_bias_clamp: clamp,
            depth_bias_slope_factor: slope,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawMultisampleState")]
pub struct MultisampleState {
    pub rasterization_samples: SampleCount,
    #[serde(default)]
    pub sample_shading_enable: bool,
    /// Required iff `sample_shading_enable`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_sample_shading: Option<f32>,
    #[serde(default)]
    pub alpha_to_coverage_enable: bool,
    #[serde(default)]
    pub alpha_to_one_enable: bool,
}

impl MultisampleState {
    pub fn to_vk(&self) -> vk::PipelineMultisampleStateCreateInfo {
        let mut info = vk::PipelineMultisampleStateCreateInfo::builder()
            .rasterization_samples(self.rasterization_samples.to_vk())
            .sample_shading_enable(self.sample_shading_enable)
            .alpha_to_coverage_enable(self.alpha_to_coverage_enable)
            .alpha_to_one_enable(self.alpha_to_one_enable);

        if self.sample_shading_enable {
            info = info.min_sample_shading(self.min_sample_shading.unwrap_or(1.0));
        }

        info.build()
    }
}

impl Default for MultisampleState {
    fn default() -> Self {
        Self {
            rasterization_samples: SampleCount::One,
            sample_shading_enable: false,
            min_sample_shading: None,
            alpha_to_coverage_enable: false,
            alpha_to_one_enable: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMultisampleState {
    rasterization_samples: SampleCount,
    #[serde(default)]
    sample_shading_enable: bool,
    #[serde(default)]
    min_sample_shading: Option<f32>,
    #[serde(default)]
    alpha_to_coverage_enable: bool,
    #[serde(default)]
    alpha_to_one_enable: bool,
}

impl TryFrom<RawMultisampleState> for MultisampleState {
    type Error = SchematicError;

    fn try_from(raw: RawMultisampleState) -> Result<Self, Self::Error> {
        let min_sample_shading = if raw.sample_shading_enable {
            Some(raw.min_sample_shading.ok_or(SchematicError::MissingConditional {
                gate: "sampleShadingEnable",
                field: "minSampleShading",
            })?)
        } else {
            None
        };

        Ok(Self {
            rasterization_samples: raw.rasterization_samples,
            sample_shading_enable: raw.sample_shading_enable,
            min_sample_shading,
            alpha_to_coverage_enable: raw.alpha_to_coverage_enable,
            alpha_to_one_enable: raw.alpha_to_one_enable,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StencilOpState {
    pub fail_op: StencilOp,
    pub pass_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub compare_op: CompareOp,
    #[serde(default)]
    pub compare_mask: u32,
    #[serde(default)]
    pub write_mask: u32,
    #[serde(default)]
    pub reference: u32,
}

impl StencilOpState {
    pub fn to_vk(&self) -> vk::StencilOpState {
        vk::StencilOpState {
            fail_op: self.fail_op.to_vk(),
            pass_op: self.pass_op.to_vk(),
            depth_fail_op: self.depth_fail_op.to_vk(),
            compare_op: self.compare_op.to_vk(),
            compare_mask: self.compare_mask,
            write_mask: self.write_mask,
            reference: self.reference,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawColorBlendAttachment")]
pub struct ColorBlendAttachment {
    #[serde(default)]
    pub blend_enable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_color_blend_factor: Option<BlendFactor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_color_blend_factor: Option<BlendFactor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_blend_op: Option<BlendOp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_alpha_blend_factor: Option<BlendFactor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_alpha_blend_factor: Option<BlendFactor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha_blend_op: Option<BlendOp>,
    /// Four-bit RGBA write mask. Required iff `blend_enable`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_write_mask: Option<u8>,
}

impl ColorBlendAttachment {
    pub fn to_vk(&self) -> vk::PipelineColorBlendAttachmentState {
        let mut state = vk::PipelineColorBlendAttachmentState {
            blend_enable: self.blend_enable.into(),
            ..Default::default()
        };

        if self.blend_enable {
            state.src_color_blend_factor = self.src_color_blend_factor.unwrap_or(BlendFactor::One).to_vk();
            state.dst_color_blend_factor = self.dst_color_blend_factor.unwrap_or(BlendFactor::Zero).to_vk();
            state.color_blend_op = self.color_blend_op.unwrap_or(BlendOp::Add).to_vk();
            state.src_alpha_blend_factor = self.src_alpha_blend_factor.unwrap_or(BlendFactor::One).to_vk();
            state.dst_alpha_blend_factor = self.dst_alpha_blend_factor.unwrap_or(BlendFactor::Zero).to_vk();
            state.alpha_blend_op = self.alpha_blend_op.unwrap_or(BlendOp::Add).to_vk();
            state.color_write_mask =
                vk::ColorComponentFlags::from_raw(u32::from(self.color_write_mask.unwrap_or(0b1111)));
        } else {
            state.color_write_mask = full_write_mask();
        }

        state
    }
}

impl Default for ColorBlendAttachment {
    fn default() -> Self {
        Self {
            blend_enable: false,
            src_color_blend_factor: None,
            dst_color_blend_factor: None,
            color_blend_op: None,
            src_alpha_blend_factor: None,
            dst_alpha_blend_factor: None,
            alpha_blend_op: None,
            color_write_mask: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawColorBlendAttachment {
    #[serde(default)]
    blend_enable: bool,
    #[serde(default)]
    src_color_blend_factor: Option<BlendFactor>,
    #[serde(default)]
    dst_color_blend_factor: Option<BlendFactor>,
    #[serde(default)]
    color_blend_op: Option<BlendOp>,
    #[serde(default)]
    src_alpha_blend_factor: Option<BlendFactor>,
    #[serde(default)]
    dst_alpha_blend_factor: Option<BlendFactor>,
    #[serde(default)]
    alpha_blend_op: Option<BlendOp>,
    #[serde(default)]
    color_write_mask: Option<u8>,
}

impl TryFrom<RawColorBlendAttachment> for ColorBlendAttachment {
    type Error = SchematicError;

    fn try_from(raw: RawColorBlendAttachment) -> Result<Self, Self::Error> {
        if !raw.blend_enable {
            return Ok(Self {
                blend_enable: false,
                ..Default::default()
            });
        }

        fn require<T>(value: Option<T>, field: &'static str) -> Result<Option<T>, SchematicError> {
            value
                .map(Some)
                .ok_or(SchematicError::MissingConditional {
                    gate: "blendEnable",
                    field,
                })
        }

        Ok(Self {
            blend_enable: true,
            src_color_blend_factor: require(raw.src_color_blend_factor, "srcColorBlendFactor")?,
            dst_color_blend_factor: require(raw.dst_color_blend_factor, "dstColorBlendFactor")?,
            color_blend_op: require(raw.color_blend_op, "colorBlendOp")?,
            src_alpha_blend_factor: require(raw.src_alpha_blend_factor, "srcAlphaBlendFactor")?,
            dst_alpha_blend_factor: require(raw.dst_alpha_blend_factor, "dstAlphaBlendFactor")?,
            alpha_blend_op: require(raw.alpha_blend_op, "alphaBlendOp")?,
            color_write_mask: require(raw.color_write_mask, "colorWriteMask")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawColorBlendState")]
pub struct ColorBlendState {
    #[serde(default)]
    pub logic_op_enable: bool,
    /// Required iff `logic_op_enable`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logic_op: Option<LogicOp>,
    pub attachments: Vec<ColorBlendAttachment>,
    pub blend_constants: [f32; 4],
}

impl ColorBlendState {
    /// The attachment array is returned separately; the caller keeps it alive
    /// while the create info references it.
    pub fn to_vk(&self) -> (vk::PipelineColorBlendStateCreateInfo, Vec<vk::PipelineColorBlendAttachmentState>) {
        let attachments: Vec<_> = self.attachments.iter().map(ColorBlendAttachment::to_vk).collect();

        let mut info = vk::PipelineColorBlendStateCreateInfo::default();
        info.logic_op_enable = self.logic_op_enable.into();
        if self.logic_op_enable {
            info.logic_op = self.logic_op.unwrap_or(LogicOp::Copy).to_vk();
        }
        info.blend_constants = self.blend_constants;

        (info, attachments)
    }
}

impl Default for ColorBlendState {
    fn default() -> Self {
        Self {
            logic_op_enable: false,
            logic_op: None,
            attachments: vec![ColorBlendAttachment::default()],
            blend_constants: [0.0; 4],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawColorBlendState {
    #[serde(default)]
    logic_op_enable: bool,
    #[serde(default)]
    logic_op: Option<LogicOp>,
    #[serde(default)]
    attachments: Vec<ColorBlendAttachment>,
    blend_constants: [f32; 4],
}

impl TryFrom<RawColorBlendState> for ColorBlendState {
    type Error = SchematicError;

    fn try_from(raw: RawColorBlendState) -> Result<Self, Self::Error> {
        let logic_op = if raw.logic_op_enable {
            Some(raw.logic_op.ok_or(SchematicError::MissingConditional {
                gate: "logicOpEnable",
                field: "logicOp",
            })?)
        } else {
            None
        };

        Ok(Self {
            logic_op_enable: raw.logic_op_enable,
            logic_op,
            attachments: raw.attachments,
            blend_constants: raw.blend_constants,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawDepthStencilState")]
pub struct DepthStencilState {
    #[serde(default)]
    pub depth_test_enable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth_write_enable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth_compare_op: Option<CompareOp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth_bounds_test_enable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_depth_bounds: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth_bounds: Option<f32>,
    #[serde(default)]
    pub stencil_test_enable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub front: Option<StencilOpState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back: Option<StencilOpState>,
}

impl DepthStencilState {
    pub fn to_vk(&self) -> vk::PipelineDepthStencilStateCreateInfo {
        let mut info = vk::PipelineDepthStencilStateCreateInfo::default();

        info.depth_test_enable = self.depth_test_enable.into();
        if self.depth_test_enable {
            info.depth_write_enable = self.depth_write_enable.unwrap_or(true).into();
            info.depth_compare_op = self.depth_compare_op.unwrap_or(CompareOp::Less).to_vk();
            info.depth_bounds_test_enable = self.depth_bounds_test_enable.unwrap_or(false).into();
            info.min_depth_bounds = self.min_depth_bounds.unwrap_or(0.0);
            info.max_depth_bounds = self.max_depth_bounds.unwrap_or(1.0);
        }

        info.stencil_test_enable = self.stencil_test_enable.into();
        if self.stencil_test_enable {
            info.front = self.front.map(|state| state.to_vk()).unwrap_or_default();
            info.back = self.back.map(|state| state.to_vk()).unwrap_or_default();
        }

        info
    }
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test_enable: false,
            depth_write_enable: None,
            depth_compare_op: None,
            depth_bounds_test_enable: None,
            min_depth_bounds: None,
            max_depth_bounds: None,
            stencil_test_enable: false,
            front: None,
            back: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDepthStencilState {
    #[serde(default)]
    depth_test_enable: bool,
    #[serde(default)]
    depth_write_enable: Option<bool>,
    #[serde(default)]
    depth_compare_op: Option<CompareOp>,
    #[serde(default)]
    depth_bounds_test_enable: Option<bool>,
    #[serde(default)]
    min_depth_bounds: Option<f32>,
    #[serde(default)]
    max_depth_bounds: Option<f32>,
    #[serde(default)]
    stencil_test_enable: bool,
    #[serde(default)]
    front: Option<StencilOpState>,
    #[serde(default)]
    back: Option<StencilOpState>,
}

impl TryFrom<RawDepthStencilState> for DepthStencilState {
    type Error = SchematicError;

    fn try_from(raw: RawDepthStencilState) -> Result<Self, Self::Error> {
        fn require<T>(value: Option<T>, gate: &'static str, field: &'static str) -> Result<Option<T>, SchematicError> {
            value.map(Some).ok_or(SchematicError::MissingConditional { gate, field })
        }

        let (write, compare, bounds, min, max) = if raw.depth_test_enable {
            (
                require(raw.depth_write_enable, "depthTestEnable", "depthWriteEnable")?,
                require(raw.depth_compare_op, "depthTestEnable", "depthCompareOp")?,
                require(raw.depth_bounds_test_enable, "depthTestEnable", "depthBoundsTestEnable")?,
                require(raw.min_depth_bounds, "depthTestEnable", "minDepthBounds")?,
                require(raw.max_depth_bounds, "depthTestEnable", "maxDepthBounds")?,
            )
        } else {
            (None, None, None, None, None)
        };

        let (front, back) = if raw.stencil_test_enable {
            (
                require(raw.front, "stencilTestEnable", "front")?,
                require(raw.back, "stencilTestEnable", "back")?,
            )
        } else {
            (None, None)
        };

        Ok(Self {
            depth_test_enable: raw.depth_test_enable,
            depth_write_enable: write,
            depth_compare_op: compare,
            depth_bounds_test_enable: bounds,
            min_depth_bounds: min,
            max_depth_bounds: max,
            stencil_test_enable: raw.stencil_test_enable,
            front,
            back,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicStateInfo {
    #[serde(default)]
    pub states: Vec<DynamicState>,
}

impl DynamicStateInfo {
    pub fn to_vk(&self) -> Vec<vk::DynamicState> {
        self.states.iter().map(|state| state.to_vk()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rasterization_json() -> serde_json::Value {
        serde_json::json!({
            "polygonMode": 0,
            "cullMode": 2,
            "frontFace": 0,
            "rasterizerDiscardEnable": false,
            "depthClampEnable": false,
            "depthBiasEnable": false,
        })
    }

    #[test]
    fn rasterization_round_trips() {
        let state: RasterizationState = serde_json::from_value(rasterization_json()).unwrap();
        let json = serde_json::to_value(&state).unwrap();
        let back: RasterizationState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn line_polygon_mode_requires_line_width() {
        let mut json = rasterization_json();
        json["polygonMode"] = serde_json::json!(1);
        assert!(serde_json::from_value::<RasterizationState>(json.clone()).is_err());

        json["lineWidth"] = serde_json::json!(2.0);
        let state: RasterizationState = serde_json::from_value(json).unwrap();
        assert_eq!(state.line_width, Some(2.0));
    }

    #[test]
    fn depth_bias_requires_all_three_constants() {
        let mut json = rasterization_json();
        json["depthBiasEnable"] = serde_json::json!(true);
        json["depthBiasConstantFactor"] = serde_json::json!(1.0);
        json["depthBiasClamp"] = serde_json::json!(0.0);
        assert!(serde_json::from_value::<RasterizationState>(json.clone()).is_err());

        json["depthBiasSlopeFactor"] = serde_json::json!(0.5);
        assert!(serde_json::from_value::<RasterizationState>(json).is_ok());
    }

    #[test]
    fn sample_shading_requires_min_sample_shading() {
        let json = serde_json::json!({
            "rasterizationSamples": 4,
            "sampleShadingEnable": true,
        });
        assert!(serde_json::from_value::<MultisampleState>(json).is_err());
    }

    #[test]
    fn blend_enable_requires_factors() {
        let json = serde_json::json!({
            "blendEnable": true,
            "dstColorBlendFactor": 0,
            "colorBlendOp": 0,
            "srcAlphaBlendFactor": 1,
            "dstAlphaBlendFactor": 0,
            "alphaBlendOp": 0,
            "colorWriteMask": 15,
        });
        // srcColorBlendFactor missing.
        assert!(serde_json::from_value::<ColorBlendAttachment>(json).is_err());
    }

    #[test]
    fn disabled_blend_needs_no_factors() {
        let json = serde_json::json!({ "blendEnable": false });
        let attachment: ColorBlendAttachment = serde_json::from_value(json).unwrap();
        assert!(!attachment.blend_enable);
        assert_eq!(attachment.to_vk().color_write_mask, full_write_mask());
    }

    #[test]
    fn logic_op_gated_by_enable() {
        let json = serde_json::json!({
            "logicOpEnable": true,
            "attachments": [],
            "blendConstants": [0.0, 0.0, 0.0, 0.0],
        });
        assert!(serde_json::from_value::<ColorBlendState>(json).is_err());
    }

    #[test]
    fn depth_test_requires_dependents() {
        let json = serde_json::json!({
            "depthTestEnable": true,
            "depthWriteEnable": true,
            "depthCompareOp": 1,
            "depthBoundsTestEnable": false,
            "minDepthBounds": 0.0,
            // maxDepthBounds missing
        });
        assert!(serde_json::from_value::<DepthStencilState>(json).is_err());
    }

    #[test]
    fn stencil_test_requires_front_and_back() {
        let json = serde_json::json!({
            "stencilTestEnable": true,
            "front": {
                "failOp": 0, "passOp": 0, "depthFailOp": 0, "compareOp": 7,
            },
        });
        assert!(serde_json::from_value::<DepthStencilState>(json).is_err());
    }

    #[test]
    fn depth_stencil_round_trips() {
        let state = DepthStencilState {
            depth_test_enable: true,
            depth_write_enable: Some(true),
            depth_compare_op: Some(CompareOp::Less),
            depth_bounds_test_enable: Some(false),
            min_depth_bounds: Some(0.0),
            max_depth_bounds: Some(1.0),
            stencil_test_enable: false,
            front: None,
            back: None,
        };

        let json = serde_json::to_value(state).unwrap();
        assert!(json.get("front").is_none());
        let back: DepthStencilState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn dynamic_states_translate_to_driver_codes() {
        let dynamic = DynamicStateInfo {
            states: vec![DynamicState::Viewport, DynamicState::Scissor],
        };
        assert_eq!(dynamic.to_vk(), vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]);
    }
}
