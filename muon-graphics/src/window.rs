//! `WindowSurface` adapter for raw-window-handle providers.
//!
//! Hosts that already expose `raw-window-handle` (winit, SDL) get an engine
//! window for free: surface creation and the extension list go through
//! `ash-window`, and the host pushes framebuffer size changes into
//! [`RawHandleWindow::set_extent`] as resize events arrive.

use std::cell::Cell;
use std::ffi::CStr;

use ash::prelude::VkResult;
use ash::vk;
use muon_core::WindowSurface;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};

pub struct RawHandleWindow<W> {
    window: W,
    extent: Cell<vk::Extent2D>,
}

impl<W> RawHandleWindow<W>
where
    W: HasRawWindowHandle + HasRawDisplayHandle,
{
    pub fn new(window: W, extent: vk::Extent2D) -> Self {
        Self {
            window,
            extent: Cell::new(extent),
        }
    }

    /// Called by the host when the framebuffer is resized.
    pub fn set_extent(&self, extent: vk::Extent2D) {
        self.extent.set(extent);
    }

    pub fn inner(&self) -> &W {
        &self.window
    }
}

impl<W> WindowSurface for RawHandleWindow<W>
where
    W: HasRawWindowHandle + HasRawDisplayHandle,
{
    fn required_extensions(&self) -> Vec<&'static CStr> {
        ash_window::enumerate_required_extensions(self.window.raw_display_handle())
            .map(|extensions| {
                extensions
                    .iter()
                    .map(|&pointer| unsafe { CStr::from_ptr(pointer) })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> VkResult<vk::SurfaceKHR> {
        unsafe {
            ash_window::create_surface(
                entry,
                instance,
                self.window.raw_display_handle(),
                self.window.raw_window_handle(),
                None,
            )
        }
    }

    fn extent(&self) -> vk::Extent2D {
        self.extent.get()
    }
}
