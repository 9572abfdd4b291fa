//! Vulkan core of the Muon rendering engine.
//!
//! The crate is organised around a [`context::DeviceContext`] that owns all
//! device-scoped state. GPU resources ([`resource::Buffer`],
//! [`resource::Image`], [`resource::Texture`], [`resource::Mesh`]) hold an
//! `Arc` to it, the [`renderer::Renderer`] drives the swapchain frame loop on
//! top of it, and [`schematic`] records describe pipelines declaratively for
//! the [`pipeline`] constructors.

pub mod asset;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod renderer;
pub mod resource;
pub mod schematic;
pub mod shader;
pub mod swapchain;
pub mod window;

pub use context::DeviceContext;
pub use error::{GraphicsError, Result};
pub use renderer::{FrameBegin, Renderer};
pub use swapchain::{AcquireResult, Swapchain, MAX_FRAMES_IN_FLIGHT};

/// Every long GPU wait in the engine uses this timeout; exceeding it means a
/// hang and is fatal.
pub(crate) const GPU_WAIT_TIMEOUT_NS: u64 = 30_000_000_000;

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use ash::prelude::VkResult;
    use ash::vk;
    use muon_core::WindowSurface;
    use tracing::{info, warn};

    use crate::context::DeviceContext;

    /// Headless stand-in: advertises no extensions and refuses to create a
    /// surface, so context construction fails cleanly without a display.
    struct HeadlessWindow;

    impl WindowSurface for HeadlessWindow {
        fn required_extensions(&self) -> Vec<&'static CStr> {
            vec![ash::extensions::khr::Surface::name()]
        }

        fn create_surface(&self, _entry: &ash::Entry, _instance: &ash::Instance) -> VkResult<vk::SurfaceKHR> {
            Err(vk::Result::ERROR_INITIALIZATION_FAILED)
        }

        fn extent(&self) -> vk::Extent2D {
            vk::Extent2D { width: 1, height: 1 }
        }
    }

    #[test]
    fn device_context_without_a_display_fails_cleanly() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        match DeviceContext::new(&HeadlessWindow) {
            Ok(_) => info!("device context created unexpectedly; a display must be present"),
            Err(err) => warn!("device context creation failed as expected without a display: {err}"),
        }
    }
}
