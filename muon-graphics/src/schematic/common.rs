//! Enumerations shared across schematic records.
//!
//! Driver-level enums serialize by their raw Vulkan code so schematic files
//! stay stable against renames; the top-level pipeline type and shader stage
//! serialize by name.

use ash::vk;
use serde::{Deserialize, Serialize};

/// Defines a schematic enum backed by raw Vulkan codes, with numeric serde
/// and a `to_vk` translation.
macro_rules! driver_enum {
    ($(#[$meta:meta])* $name:ident => $vk:ty {
        $($variant:ident = $code:literal => $vkval:expr),+ $(,)?
    }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u32)]
        pub enum $name {
            $($variant = $code,)+
        }

        impl $name {
            pub fn to_vk(self) -> $vk {
                match self {
                    $(Self::$variant => $vkval,)+
                }
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_u32(*self as u32)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                match u32::deserialize(deserializer)? {
                    $($code => Ok(Self::$variant),)+
                    other => Err(serde::de::Error::custom(format!(
                        concat!("invalid ", stringify!($name), " code: {}"),
                        other
                    ))),
                }
            }
        }
    };
}

driver_enum! {
    PolygonMode => vk::PolygonMode {
        Fill = 0 => vk::PolygonMode::FILL,
        Line = 1 => vk::PolygonMode::LINE,
        Point = 2 => vk::PolygonMode::POINT,
    }
}

driver_enum! {
    CullMode => vk::CullModeFlags {
        None = 0 => vk::CullModeFlags::NONE,
        Front = 1 => vk::CullModeFlags::FRONT,
        Back = 2 => vk::CullModeFlags::BACK,
        FrontAndBack = 3 => vk::CullModeFlags::FRONT_AND_BACK,
    }
}

driver_enum! {
    FrontFace => vk::FrontFace {
        CounterClockwise = 0 => vk::FrontFace::COUNTER_CLOCKWISE,
        Clockwise = 1 => vk::FrontFace::CLOCKWISE,
    }
}

driver_enum! {
    CompareOp => vk::CompareOp {
        Never = 0 => vk::CompareOp::NEVER,
        Less = 1 => vk::CompareOp::LESS,
        Equal = 2 => vk::CompareOp::EQUAL,
        LessOrEqual = 3 => vk::CompareOp::LESS_OR_EQUAL,
        Greater = 4 => vk::CompareOp::GREATER,
        NotEqual = 5 => vk::CompareOp::NOT_EQUAL,
        GreaterOrEqual = 6 => vk::CompareOp::GREATER_OR_EQUAL,
        Always = 7 => vk::CompareOp::ALWAYS,
    }
}

driver_enum! {
    StencilOp => vk::StencilOp {
        Keep = 0 => vk::StencilOp::KEEP,
        Zero = 1 => vk::StencilOp::ZERO,
        Replace = 2 => vk::StencilOp::REPLACE,
        IncrementAndClamp = 3 => vk::StencilOp::INCREMENT_AND_CLAMP,
        DecrementAndClamp = 4 => vk::StencilOp::DECREMENT_AND_CLAMP,
        Invert = 5 => vk::StencilOp::INVERT,
        IncrementAndWrap = 6 => vk::StencilOp::INCREMENT_AND_WRAP,
        DecrementAndWrap = 7 => vk::StencilOp::DECREMENT_AND_WRAP,
    }
}

driver_enum! {
    BlendFactor => vk::BlendFactor {
        Zero = 0 => vk::BlendFactor::ZERO,
        One = 1 => vk::BlendFactor::ONE,
        SrcColor = 2 => vk::BlendFactor::SRC_COLOR,
        OneMinusSrcColor = 3 => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        DstColor = 4 => vk::BlendFactor::DST_COLOR,
        OneMinusDstColor = 5 => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        SrcAlpha = 6 => vk::BlendFactor::SRC_ALPHA,
        OneMinusSrcAlpha = 7 => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        DstAlpha = 8 => vk::BlendFactor::DST_ALPHA,
        OneMinusDstAlpha = 9 => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
        ConstantColor = 10 => vk::BlendFactor::CONSTANT_COLOR,
        OneMinusConstantColor = 11 => vk::BlendFactor::ONE_MINUS_CONSTANT_COLOR,
        ConstantAlpha = 12 => vk::BlendFactor::CONSTANT_ALPHA,
        OneMinusConstantAlpha = 13 => vk::BlendFactor::ONE_MINUS_CONSTANT_ALPHA,
        SrcAlphaSaturate = 14 => vk::BlendFactor::SRC_ALPHA_SATURATE,
        Src1Color = 15 => vk::BlendFactor::SRC1_COLOR,
        OneMinusSrc1Color = 16 => vk::BlendFactor::ONE_MINUS_SRC1_COLOR,
        Src1Alpha = 17 => vk::BlendFactor::SRC1_ALPHA,
        OneMinusSrc1Alpha = 18 => vk::BlendFactor::ONE_MINUS_SRC1_ALPHA,
    }
}

driver_enum! {
    BlendOp => vk::BlendOp {
        Add = 0 => vk::BlendOp::ADD,
        Subtract = 1 => vk::BlendOp::SUBTRACT,
        ReverseSubtract = 2 => vk::BlendOp::REVERSE_SUBTRACT,
        Min = 3 => vk::BlendOp::MIN,
        Max = 4 => vk::BlendOp::MAX,
    }
}

driver_enum! {
    LogicOp => vk::LogicOp {
        Clear = 0 => vk::LogicOp::CLEAR,
        And = 1 => vk::LogicOp::AND,
        AndReverse = 2 => vk::LogicOp::AND_REVERSE,
        Copy = 3 => vk::LogicOp::COPY,
        AndInverted = 4 => vk::LogicOp::AND_INVERTED,
        NoOp = 5 => vk::LogicOp::NO_OP,
        Xor = 6 => vk::LogicOp::XOR,
        Or = 7 => vk::LogicOp::OR,
        Nor = 8 => vk::LogicOp::NOR,
        Equivalent = 9 => vk::LogicOp::EQUIVALENT,
        Invert = 10 => vk::LogicOp::INVERT,
        OrReverse = 11 => vk::LogicOp::OR_REVERSE,
        CopyInverted = 12 => vk::LogicOp::COPY_INVERTED,
        OrInverted = 13 => vk::LogicOp::OR_INVERTED,
        Nand = 14 => vk::LogicOp::NAND,
        Set = 15 => vk::LogicOp::SET,
    }
}

driver_enum! {
    SampleCount => vk::SampleCountFlags {
        One = 1 => vk::SampleCountFlags::TYPE_1,
        Two = 2 => vk::SampleCountFlags::TYPE_2,
        Four = 4 => vk::SampleCountFlags::TYPE_4,
        Eight = 8 => vk::SampleCountFlags::TYPE_8,
        Sixteen = 16 => vk::SampleCountFlags::TYPE_16,
        ThirtyTwo = 32 => vk::SampleCountFlags::TYPE_32,
        SixtyFour = 64 => vk::SampleCountFlags::TYPE_64,
    }
}

driver_enum! {
    PrimitiveTopology => vk::PrimitiveTopology {
        PointList = 0 => vk::PrimitiveTopology::POINT_LIST,
        LineList = 1 => vk::PrimitiveTopology::LINE_LIST,
        LineStrip = 2 => vk::PrimitiveTopology::LINE_STRIP,
        TriangleList = 3 => vk::PrimitiveTopology::TRIANGLE_LIST,
        TriangleStrip = 4 => vk::PrimitiveTopology::TRIANGLE_STRIP,
        TriangleFan = 5 => vk::PrimitiveTopology::TRIANGLE_FAN,
        LineListWithAdjacency = 6 => vk::PrimitiveTopology::LINE_LIST_WITH_ADJACENCY,
        LineStripWithAdjacency = 7 => vk::PrimitiveTopology::LINE_STRIP_WITH_ADJACENCY,
        TriangleListWithAdjacency = 8 => vk::PrimitiveTopology::TRIANGLE_LIST_WITH_ADJACENCY,
        TriangleStripWithAdjacency = 9 => vk::PrimitiveTopology::TRIANGLE_STRIP_WITH_ADJACENCY,
        PatchList = 10 => vk::PrimitiveTopology::PATCH_LIST,
    }
}

driver_enum! {
    DynamicState => vk::DynamicState {
        Viewport = 0 => vk::DynamicState::VIEWPORT,
        Scissor = 1 => vk::DynamicState::SCISSOR,
        LineWidth = 2 => vk::DynamicState::LINE_WIDTH,
        DepthBias = 3 => vk::DynamicState::DEPTH_BIAS,
        BlendConstants = 4 => vk::DynamicState::BLEND_CONSTANTS,
        DepthBounds = 5 => vk::DynamicState::DEPTH_BOUNDS,
        StencilCompareMask = 6 => vk::DynamicState::STENCIL_COMPARE_MASK,
        StencilWriteMask = 7 => vk::DynamicState::STENCIL_WRITE_MASK,
        StencilReference = 8 => vk::DynamicState::STENCIL_REFERENCE,
    }
}

/// What kind of pipeline a schematic describes. Serializes by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineType {
    Graphics,
    Compute,
    Meshlet,
}

/// Shader stage key in a schematic's shader map. Serializes by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ShaderStage {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
    Task,
    Mesh,
    Compute,
}

impl ShaderStage {
    pub fn to_vk(self) -> vk::ShaderStageFlags {
        match self {
            Self::Vertex => vk::ShaderStageFlags::VERTEX,
            Self::TessellationControl => vk::ShaderStageFlags::TESSELLATION_CONTROL,
            Self::TessellationEvaluation => vk::ShaderStageFlags::TESSELLATION_EVALUATION,
            Self::Geometry => vk::ShaderStageFlags::GEOMETRY,
            Self::Fragment => vk::ShaderStageFlags::FRAGMENT,
            Self::Task => vk::ShaderStageFlags::TASK_EXT,
            Self::Mesh => vk::ShaderStageFlags::MESH_EXT,
            Self::Compute => vk::ShaderStageFlags::COMPUTE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_enums_serialize_numerically() {
        assert_eq!(serde_json::to_string(&PolygonMode::Line).unwrap(), "1");
        assert_eq!(serde_json::to_string(&BlendFactor::OneMinusSrcAlpha).unwrap(), "7");
        assert_eq!(serde_json::to_string(&SampleCount::Four).unwrap(), "4");
    }

    #[test]
    fn driver_enums_reject_unknown_codes() {
        assert!(serde_json::from_str::<PolygonMode>("9").is_err());
        assert!(serde_json::from_str::<SampleCount>("3").is_err());
    }

    #[test]
    fn top_level_enums_serialize_by_name() {
        assert_eq!(serde_json::to_string(&PipelineType::Compute).unwrap(), "\"Compute\"");
        assert_eq!(serde_json::to_string(&ShaderStage::Fragment).unwrap(), "\"Fragment\"");
    }

    #[test]
    fn driver_translation_matches_codes() {
        assert_eq!(PolygonMode::Line.to_vk(), vk::PolygonMode::LINE);
        assert_eq!(CullMode::FrontAndBack.to_vk(), vk::CullModeFlags::FRONT_AND_BACK);
        assert_eq!(SampleCount::Sixteen.to_vk(), vk::SampleCountFlags::TYPE_16);
        assert_eq!(DynamicState::Scissor.to_vk(), vk::DynamicState::SCISSOR);
    }
}
