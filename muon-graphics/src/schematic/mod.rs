//! JSON-serializable pipeline schematics.
//!
//! A schematic is a value-only description of a pipeline: its type, its
//! shaders, and (for pipelines that rasterize) a static-state block. Enabled
//! flags gate their dependent fields on both ends of serialization, and each
//! record knows how to translate itself into the matching driver structure.

pub mod common;
pub mod pipeline;
pub mod shader;
pub mod state;

use thiserror::Error;

pub use common::{
    BlendFactor, BlendOp, CompareOp, CullMode, DynamicState, FrontFace, LogicOp, PipelineType,
    PolygonMode, PrimitiveTopology, SampleCount, ShaderStage, StencilOp,
};
pub use pipeline::{PipelineSchematic, PipelineState};
pub use shader::ShaderInfo;
pub use state::{
    ColorBlendAttachment, ColorBlendState, DepthStencilState, DynamicStateInfo, InputAssemblyState,
    MultisampleState, RasterizationState, StencilOpState, ViewportState,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchematicError {
    #[error("`{field}` is required when `{gate}` is set")]
    MissingConditional {
        gate: &'static str,
        field: &'static str,
    },
    #[error("shader info must specify exactly one of `path` or `byteOffset` + `byteLength`")]
    AmbiguousShaderSource,
}
