//! The top-level pipeline schematic: pipeline type, shader map, and the
//! static-state block for pipelines that rasterize.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schematic::common::{PipelineType, ShaderStage};
use crate::schematic::shader::ShaderInfo;
use crate::schematic::state::{
    ColorBlendState, DepthStencilState, DynamicStateInfo, InputAssemblyState, MultisampleState,
    RasterizationState, ViewportState,
};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    /// Only used by graphics pipelines; meshlet pipelines have no input
    /// assembly.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub input_assembly: Option<InputAssemblyState>,
    #[serde(default)]
    pub viewport: ViewportState,
    #[serde(default)]
    pub rasterization: RasterizationState,
    #[serde(default)]
    pub multisample: MultisampleState,
    #[serde(default)]
    pub color_blend: ColorBlendState,
    #[serde(default)]
    pub depth_stencil: DepthStencilState,
    #[serde(default)]
    pub dynamic: DynamicStateInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawPipelineSchematic")]
pub struct PipelineSchematic {
    #[serde(rename = "type")]
    pub pipeline_type: PipelineType,
    pub shaders: BTreeMap<ShaderStage, ShaderInfo>,
    /// Absent for compute pipelines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<PipelineState>,
}

impl PipelineSchematic {
    pub fn shader(&self, stage: ShaderStage) -> Option<&ShaderInfo> {
        self.shaders.get(&stage)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPipelineSchematic {
    #[serde(rename = "type")]
    pipeline_type: PipelineType,
    #[serde(default)]
    shaders: BTreeMap<ShaderStage, ShaderInfo>,
    #[serde(default)]
    state: Option<PipelineState>,
}

impl TryFrom<RawPipelineSchematic> for PipelineSchematic {
    type Error = crate::schematic::SchematicError;

    fn try_from(raw: RawPipelineSchematic) -> Result<Self, Self::Error> {
        // Compute pipelines carry no rasterization state; drop it rather than
        // letting a stray block leak through.
        let state = if raw.pipeline_type == PipelineType::Compute {
            None
        } else {
            raw.state
        };

        Ok(Self {
            pipeline_type: raw.pipeline_type,
            shaders: raw.shaders,
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_schematic_round_trips() {
        let mut shader = ShaderInfo::from_path("x.comp", "main");
        shader.work_group_size = Some([3, 3, 1]);

        let schematic = PipelineSchematic {
            pipeline_type: PipelineType::Compute,
            shaders: BTreeMap::from([(ShaderStage::Compute, shader)]),
            state: None,
        };

        let json = serde_json::to_string(&schematic).unwrap();
        assert!(json.contains("\"type\":\"Compute\""));

        let back: PipelineSchematic = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schematic);
    }

    #[test]
    fn compute_schematic_json_shape() {
        let mut shader = ShaderInfo::from_path("foo", "main");
        shader.work_group_size = Some([3, 3, 1]);

        let schematic = PipelineSchematic {
            pipeline_type: PipelineType::Compute,
            shaders: BTreeMap::from([(ShaderStage::Compute, shader)]),
            state: None,
        };

        let json = serde_json::to_value(&schematic).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "Compute",
                "shaders": {
                    "Compute": {
                        "entryPoint": "main",
                        "path": "foo",
                        "workGroupSize": [3, 3, 1],
                    }
                }
            })
        );
    }

    #[test]
    fn graphics_schematic_round_trips_with_state() {
        let schematic = PipelineSchematic {
            pipeline_type: PipelineType::Graphics,
            shaders: BTreeMap::from([
                (ShaderStage::Vertex, ShaderInfo::from_path("tri.vert.spv", "main")),
                (ShaderStage::Fragment, ShaderInfo::from_path("tri.frag.spv", "main")),
            ]),
            state: Some(PipelineState {
                input_assembly: Some(InputAssemblyState::default()),
                ..Default::default()
            }),
        };

        let json = serde_json::to_string(&schematic).unwrap();
        let back: PipelineSchematic = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schematic);
    }

    #[test]
    fn stray_state_on_compute_schematic_is_dropped() {
        let json = serde_json::json!({
            "type": "Compute",
            "shaders": {
                "Compute": { "entryPoint": "main", "path": "x.comp" }
            },
            "state": { "blendConstants": [0, 0, 0, 0] },
        });

        let schematic: PipelineSchematic = serde_json::from_value(json).unwrap();
        assert!(schematic.state.is_none());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let json = serde_json::json!({
            "type": "Compute",
            "shaders": {
                "Compute": { "entryPoint": "main", "path": "x.comp" }
            },
            "futureKnob": 42,
        });
        assert!(serde_json::from_value::<PipelineSchematic>(json).is_ok());
    }

    #[test]
    fn missing_type_fails() {
        let json = serde_json::json!({ "shaders": {} });
        assert!(serde_json::from_value::<PipelineSchematic>(json).is_err());
    }
}
