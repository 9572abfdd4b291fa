//! Shader tooling: background compilation, the persistent hash store, and
//! SPIR-V reflection.

pub mod compiler;
pub mod hash_store;
pub mod reflection;

pub use compiler::{ShaderCompilationRequest, ShaderCompiler};
pub use hash_store::HashStore;
pub use reflection::{reflect_vertex_input, VertexInputDescription};
