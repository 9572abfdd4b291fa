//! Asset loading: the loader contract and the batched upload manager.

pub mod loader;
pub mod manager;
pub mod png;

pub use loader::{AssetLoader, UploadSession};
pub use manager::AssetManager;
pub use png::PngLoader;
