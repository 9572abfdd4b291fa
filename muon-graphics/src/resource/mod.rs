//! Typed GPU memory resources.

pub mod buffer;
pub mod image;
pub mod mesh;
pub mod texture;

pub use buffer::{Buffer, BufferSpec};
pub use image::{aspect_mask_for_format, Image, ImageSpec};
pub use mesh::{Mesh, MeshSpec};
pub use texture::{Texture, TextureSpec};
