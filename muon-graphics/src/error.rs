//! Error type shared by the Vulkan core.
//!
//! Raw `vk::Result` codes convert via `From`, with the out-of-date surface
//! result lifted into its own variant so the frame loop can react to it
//! without string matching.

use ash::vk;
use thiserror::Error;

use crate::schematic::SchematicError;

#[derive(Debug, Error)]
pub enum GraphicsError {
    #[error("vulkan api error: {0}")]
    Vk(vk::Result),
    #[error("surface is out of date and the swapchain needs a rebuild")]
    SurfaceOutOfDate,
    #[error("initialization failed: {0}")]
    Initialization(String),
    #[error("missing required extension: {0}")]
    MissingExtension(String),
    #[error("missing required device feature: {0}")]
    MissingFeature(&'static str),
    #[error("no suitable GPU available")]
    NoSuitableGpu,
    #[error("no {0} capable queue family available")]
    QueueFamilyUnavailable(&'static str),
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("missing required shader stage: {0}")]
    MissingShaderStage(&'static str),
    #[error("shader bytecode for {0} is unavailable: {1}")]
    ShaderBytecode(&'static str, String),
    #[error("shader reflection failed: {0}")]
    Reflection(String),
    #[error("shader compilation failed: {0}")]
    ShaderCompilation(String),
    #[error("no loader registered for file type: {0}")]
    NoLoader(String),
    #[error("asset decode failed: {0}")]
    AssetDecode(String),
    #[error(transparent)]
    Schematic(#[from] SchematicError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = GraphicsError> = std::result::Result<T, E>;

impl From<vk::Result> for GraphicsError {
    fn from(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_OUT_OF_DATE_KHR => Self::SurfaceOutOfDate,
            other => Self::Vk(other),
        }
    }
}
