//! Contract between the engine and whatever windowing layer hosts it.
//!
//! The engine never talks to a window system directly. A host supplies a
//! [`WindowSurface`] implementation (winit, SDL, a Wayland client, an
//! offscreen test double) and forwards its event stream as [`WindowEvent`]
//! values.

use std::ffi::CStr;
use std::path::PathBuf;

use ash::prelude::VkResult;
use ash::vk;

/// Surface provider the renderer is constructed against.
///
/// Implementations are expected to sit on top of `raw-window-handle` and
/// `ash-window`, but the engine only depends on these three capabilities.
pub trait WindowSurface {
    /// Instance extensions the window system needs, e.g. `VK_KHR_surface`
    /// plus the platform surface extension.
    fn required_extensions(&self) -> Vec<&'static CStr>;

    /// Creates the presentation surface for the given instance. The returned
    /// handle is owned by the caller and destroyed by it.
    fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> VkResult<vk::SurfaceKHR>;

    /// Current framebuffer dimensions in pixels.
    fn extent(&self) -> vk::Extent2D;
}

/// Key state for [`WindowEvent::Key`] and [`WindowEvent::MouseButton`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
    Pressed,
    Released,
}

/// Events forwarded from the host window system.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowEvent {
    CloseRequested,
    Resized { width: u32, height: u32 },
    Key { scancode: u32, state: ElementState },
    MouseButton { button: u32, state: ElementState },
    CursorMoved { x: f64, y: f64 },
    CursorEntered { entered: bool },
    MouseScrolled { delta_x: f64, delta_y: f64 },
    FileDropped(PathBuf),
}
