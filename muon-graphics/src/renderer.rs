//! The user-facing frame loop.
//!
//! The renderer probes the surface once at construction, partitions the
//! usable formats into HDR and SDR, and then drives acquire/submit/present
//! through the swapchain. An out-of-date surface surfaces as
//! [`FrameBegin::NeedsRebuild`]; the caller reacts with
//! [`Renderer::rebuild_swapchain`].

use std::collections::HashSet;
use std::sync::Arc;

use ash::vk;
use muon_core::WindowSurface;
use tracing::debug;

use crate::context::DeviceContext;
use crate::error::{GraphicsError, Result};
use crate::resource::{Buffer, BufferSpec};
use crate::swapchain::{AcquireResult, Swapchain, SwapchainSpec, MAX_FRAMES_IN_FLIGHT};

/// A surface format the engine is willing to present with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceFormat {
    pub is_hdr: bool,
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
}

/// Classifies a color space as HDR (`Some(true)`), SDR (`Some(false)`), or
/// unusable (`None`).
pub fn classify_color_space(color_space: vk::ColorSpaceKHR) -> Option<bool> {
    match color_space {
        vk::ColorSpaceKHR::BT2020_LINEAR_EXT
        | vk::ColorSpaceKHR::HDR10_ST2084_EXT
        | vk::ColorSpaceKHR::HDR10_HLG_EXT
        | vk::ColorSpaceKHR::DISPLAY_NATIVE_AMD => Some(true),
        vk::ColorSpaceKHR::BT709_NONLINEAR_EXT
        | vk::ColorSpaceKHR::BT709_LINEAR_EXT
        | vk::ColorSpaceKHR::SRGB_NONLINEAR => Some(false),
        _ => None,
    }
}

fn is_candidate_format(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::A2B10G10R10_UNORM_PACK32
            | vk::Format::A2R10G10B10_UNORM_PACK32
            | vk::Format::R8G8B8A8_SRGB
            | vk::Format::B8G8R8A8_SRGB
    )
}

/// Filters the driver's surface formats down to usable ones and reports
/// whether any of them is HDR.
pub fn filter_surface_formats(formats: &[vk::SurfaceFormatKHR]) -> (Vec<SurfaceFormat>, bool) {
    let mut usable = Vec::new();
    let mut hdr_support = false;

    for surface_format in formats {
        let Some(is_hdr) = classify_color_space(surface_format.color_space) else {
            continue;
        };
        if !is_candidate_format(surface_format.format) {
            continue;
        }

        hdr_support |= is_hdr;
        usable.push(SurfaceFormat {
            is_hdr,
            format: surface_format.format,
            color_space: surface_format.color_space,
        });
    }

    (usable, hdr_support)
}

/// Keeps only the present modes the engine understands.
pub fn filter_present_modes(modes: &[vk::PresentModeKHR]) -> HashSet<vk::PresentModeKHR> {
    modes
        .iter()
        .copied()
        .filter(|mode| {
            matches!(
                mode,
                vk::PresentModeKHR::MAILBOX | vk::PresentModeKHR::FIFO | vk::PresentModeKHR::FIFO_RELAXED
            )
        })
        .collect()
}

/// Picks the initially active format: the first HDR entry when HDR is
/// available, otherwise the first SDR entry.
pub fn initial_surface_format(formats: &[SurfaceFormat], hdr_support: bool) -> Option<usize> {
    if hdr_support {
        formats.iter().position(|format| format.is_hdr)
    } else {
        (!formats.is_empty()).then_some(0)
    }
}

/// Outcome of [`Renderer::begin_frame`].
pub enum FrameBegin {
    /// The frame's command buffer, begun and ready for recording.
    Frame(vk::CommandBuffer),
    /// The surface is out of date; call [`Renderer::rebuild_swapchain`].
    NeedsRebuild,
}

pub struct Renderer {
    device: Arc<DeviceContext>,
    window: Arc<dyn WindowSurface>,
    available_surface_formats: Vec<SurfaceFormat>,
    active_surface_format: usize,
    hdr_support: bool,
    available_present_modes: HashSet<vk::PresentModeKHR>,
    active_present_mode: vk::PresentModeKHR,
    swapchain: Swapchain,
    command_buffers: Vec<vk::CommandBuffer>,
    frame_in_progress: bool,
    pending_rebuild: bool,
    current_frame_index: usize,
    current_image_index: u32,
}

impl Renderer {
    pub fn new(window: Arc<dyn WindowSurface>, device: &Arc<DeviceContext>) -> Result<Self> {
        let raw_formats = unsafe {
            device
                .surface_loader()
                .get_physical_device_surface_formats(device.physical_device(), device.surface())
        }
        .map_err(GraphicsError::from)?;
        let (available_surface_formats, hdr_support) = filter_surface_formats(&raw_formats);
        let active_surface_format = initial_surface_format(&available_surface_formats, hdr_support)
            .ok_or_else(|| GraphicsError::Initialization("no usable surface format".into()))?;

        let raw_modes = unsafe {
            device
                .surface_loader()
                .get_physical_device_surface_present_modes(device.physical_device(), device.surface())
        }
        .map_err(GraphicsError::from)?;
        let available_present_modes = filter_present_modes(&raw_modes);
        let active_present_mode = if available_present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
            vk::PresentModeKHR::MAILBOX
        } else {
            vk::PresentModeKHR::FIFO
        };

        let format = available_surface_formats[active_surface_format];
        let swapchain = Swapchain::new(
            device,
            SwapchainSpec {
                window_extent: window.extent(),
                format: format.format,
                color_space: format.color_space,
                present_mode: active_present_mode,
                old_swapchain: None,
            },
        )?;

        let command_buffers = Self::allocate_command_buffers(device)?;

        Ok(Self {
            device: Arc::clone(device),
            window,
            available_surface_formats,
            active_surface_format,
            hdr_support,
            available_present_modes,
            active_present_mode,
            swapchain,
            command_buffers,
            frame_in_progress: false,
            pending_rebuild: false,
            current_frame_index: 0,
            current_image_index: 0,
        })
    }

    fn allocate_command_buffers(device: &Arc<DeviceContext>) -> Result<Vec<vk::CommandBuffer>> {
        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_pool(device.graphics_queue().command_pool())
            .command_buffer_count(MAX_FRAMES_IN_FLIGHT as u32);

        unsafe { device.device().allocate_command_buffers(&allocate_info) }.map_err(GraphicsError::from)
    }

    /// Starts a frame.
    ///
    /// # Panics
    ///
    /// Panics when a frame is already in progress.
    pub fn begin_frame(&mut self) -> Result<FrameBegin> {
        assert!(!self.frame_in_progress, "cannot begin frame while frame is in progress");

        if self.pending_rebuild {
            return Ok(FrameBegin::NeedsRebuild);
        }

        match self.swapchain.acquire_next_image()? {
            AcquireResult::NeedsRebuild => Ok(FrameBegin::NeedsRebuild),
            AcquireResult::Acquired(image_index) => {
                self.current_image_index = image_index;
                self.frame_in_progress = true;

                let cmd = self.command_buffers[self.current_frame_index];
                let begin_info = vk::CommandBufferBeginInfo::builder();
                unsafe { self.device.device().begin_command_buffer(cmd, &begin_info) }
                    .map_err(GraphicsError::from)?;

                Ok(FrameBegin::Frame(cmd))
            }
        }
    }

    /// Ends the frame: submit, present, advance the frame slot.
    ///
    /// # Panics
    ///
    /// Panics when no frame is in progress.
    pub fn end_frame(&mut self) -> Result<()> {
        assert!(self.frame_in_progress, "cannot end frame if a frame has not been started");

        let cmd = self.command_buffers[self.current_frame_index];
        unsafe { self.device.device().end_command_buffer(cmd) }.map_err(GraphicsError::from)?;

        let needs_rebuild = self.swapchain.submit_and_present(cmd, self.current_image_index)?;
        if needs_rebuild {
            self.pending_rebuild = true;
        }

        self.frame_in_progress = false;
        self.current_frame_index = (self.current_frame_index + 1) % MAX_FRAMES_IN_FLIGHT;
        Ok(())
    }

    /// Replaces the swapchain, handing the retired handle to the new one.
    ///
    /// # Panics
    ///
    /// Panics when a frame is in progress.
    pub fn rebuild_swapchain(&mut self) -> Result<()> {
        assert!(!self.frame_in_progress, "cannot rebuild swapchain while frame is in progress");

        self.device.graphics_queue().wait_idle()?;

        let format = self.available_surface_formats[self.active_surface_format];
        let swapchain = Swapchain::new(
            &self.device,
            SwapchainSpec {
                window_extent: self.window.extent(),
                format: format.format,
                color_space: format.color_space,
                present_mode: self.active_present_mode,
                old_swapchain: Some(self.swapchain.raw()),
            },
        )?;

        let old = std::mem::replace(&mut self.swapchain, swapchain);
        if !self.swapchain.compatible_with(&old) {
            debug!("new and old swapchain formats do not match");
        }
        drop(old);

        // Command buffers are per frame slot, and the slot count is a
        // compile-time constant, so no reallocation is needed here.
        self.pending_rebuild = false;
        self.current_frame_index = 0;
        Ok(())
    }

    pub fn has_hdr_support(&self) -> bool {
        self.hdr_support
    }

    /// Color spaces available on the surface, restricted to HDR or SDR.
    pub fn available_color_spaces(&self, hdr: bool) -> Vec<vk::ColorSpaceKHR> {
        self.available_surface_formats
            .iter()
            .filter(|format| format.is_hdr == hdr)
            .map(|format| format.color_space)
            .collect()
    }

    pub fn active_surface_format(&self) -> SurfaceFormat {
        self.available_surface_formats[self.active_surface_format]
    }

    /// Selects the surface format carrying `color_space`.
    ///
    /// # Panics
    ///
    /// Panics when the color space was not probed on this surface.
    pub fn set_active_surface_format(&mut self, color_space: vk::ColorSpaceKHR) {
        let index = self
            .available_surface_formats
            .iter()
            .position(|format| format.color_space == color_space)
            .expect("the requested color space must be available");
        self.active_surface_format = index;
    }

    pub fn is_hdr_enabled(&self) -> bool {
        self.active_surface_format().is_hdr
    }

    pub fn available_present_modes(&self) -> &HashSet<vk::PresentModeKHR> {
        &self.available_present_modes
    }

    pub fn active_present_mode(&self) -> vk::PresentModeKHR {
        self.active_present_mode
    }

    /// # Panics
    ///
    /// Panics when the present mode was not probed on this surface.
    pub fn set_active_present_mode(&mut self, present_mode: vk::PresentModeKHR) {
        assert!(
            self.available_present_modes.contains(&present_mode),
            "the requested present mode must be available"
        );
        self.active_present_mode = present_mode;
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.swapchain.aspect_ratio()
    }

    pub fn frame_in_progress(&self) -> bool {
        self.frame_in_progress
    }

    pub fn current_frame_index(&self) -> usize {
        self.current_frame_index
    }

    pub fn current_image_index(&self) -> u32 {
        self.current_image_index
    }

    /// Copies the swapchain image at `image_index` into a freshly allocated
    /// host-visible buffer and blocks until the copy completes. The caller
    /// feeds the bytes to an external encoder.
    pub fn copy_swapchain_image_to_buffer(&self, image_index: u32) -> Result<Buffer> {
        let extent = self.swapchain.extent();
        let image = self.swapchain.image(image_index as usize);

        let mut readback = Buffer::new(
            &self.device,
            BufferSpec {
                instance_size: 4,
                instance_count: extent.width * extent.height,
                usage: vk::BufferUsageFlags::TRANSFER_DST,
                memory_usage: vk_mem::MemoryUsage::AutoPreferHost,
                memory_flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM,
                ..Default::default()
            },
        )?;

        let queue = self.device.graphics_queue();
        let cmd = queue.begin_commands()?;

        let to_transfer = vk::ImageMemoryBarrier2::builder()
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .old_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .src_access_mask(vk::AccessFlags2::NONE)
            .src_stage_mask(vk::PipelineStageFlags2::TOP_OF_PIPE)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .new_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
            .dst_access_mask(vk::AccessFlags2::TRANSFER_READ)
            .dst_stage_mask(vk::PipelineStageFlags2::TRANSFER)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED);

        let barriers = [to_transfer.build()];
        let dependency_info = vk::DependencyInfo::builder().image_memory_barriers(&barriers);
        unsafe { self.device.device().cmd_pipeline_barrier2(cmd, &dependency_info) };

        let region = vk::BufferImageCopy::builder()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D::default())
            .image_extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            });

        unsafe {
            self.device.device().cmd_copy_image_to_buffer(
                cmd,
                image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                readback.raw(),
                &[region.build()],
            );
        }

        let to_present = vk::ImageMemoryBarrier2::builder()
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .old_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
            .src_access_mask(vk::AccessFlags2::TRANSFER_READ)
            .src_stage_mask(vk::PipelineStageFlags2::TRANSFER)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .dst_access_mask(vk::AccessFlags2::NONE)
            .dst_stage_mask(vk::PipelineStageFlags2::BOTTOM_OF_PIPE)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED);

        let barriers = [to_present.build()];
        let dependency_info = vk::DependencyInfo::builder().image_memory_barriers(&barriers);
        unsafe { self.device.device().cmd_pipeline_barrier2(cmd, &dependency_info) };

        queue.end_commands(cmd)?;

        readback.map()?;
        readback.invalidate(vk::WHOLE_SIZE, 0)?;
        Ok(readback)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        unsafe {
            self.device.device().free_command_buffers(
                self.device.graphics_queue().command_pool(),
                &self.command_buffers,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    #[test]
    fn hdr_color_spaces_classify_as_hdr() {
        for color_space in [
            vk::ColorSpaceKHR::BT2020_LINEAR_EXT,
            vk::ColorSpaceKHR::HDR10_ST2084_EXT,
            vk::ColorSpaceKHR::HDR10_HLG_EXT,
            vk::ColorSpaceKHR::DISPLAY_NATIVE_AMD,
        ] {
            assert_eq!(classify_color_space(color_space), Some(true));
        }
    }

    #[test]
    fn sdr_color_spaces_classify_as_sdr() {
        for color_space in [
            vk::ColorSpaceKHR::BT709_NONLINEAR_EXT,
            vk::ColorSpaceKHR::BT709_LINEAR_EXT,
            vk::ColorSpaceKHR::SRGB_NONLINEAR,
        ] {
            assert_eq!(classify_color_space(color_space), Some(false));
        }
    }

    #[test]
    fn unusable_color_spaces_are_rejected() {
        assert_eq!(classify_color_space(vk::ColorSpaceKHR::DOLBYVISION_EXT), None);
    }

    #[test]
    fn filtering_keeps_standard_formats_and_flags_hdr() {
        let formats = [
            surface_format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(
                vk::Format::A2B10G10R10_UNORM_PACK32,
                vk::ColorSpaceKHR::HDR10_ST2084_EXT,
            ),
        ];

        let (usable, hdr_support) = filter_surface_formats(&formats);
        assert!(hdr_support);
        assert_eq!(usable.len(), 2);
        assert!(!usable[0].is_hdr);
        assert!(usable[1].is_hdr);
    }

    #[test]
    fn initial_format_prefers_hdr_when_available() {
        let formats = [
            surface_format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(
                vk::Format::A2B10G10R10_UNORM_PACK32,
                vk::ColorSpaceKHR::HDR10_ST2084_EXT,
            ),
        ];
        let (usable, hdr_support) = filter_surface_formats(&formats);

        assert_eq!(initial_surface_format(&usable, hdr_support), Some(1));
    }

    #[test]
    fn initial_format_falls_back_to_first_sdr() {
        let formats = [surface_format(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR)];
        let (usable, hdr_support) = filter_surface_formats(&formats);

        assert_eq!(initial_surface_format(&usable, hdr_support), Some(0));
    }

    #[test]
    fn present_mode_filter_drops_unknown_modes() {
        let modes = [
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::FIFO_RELAXED,
        ];

        let filtered = filter_present_modes(&modes);
        assert_eq!(filtered.len(), 3);
        assert!(!filtered.contains(&vk::PresentModeKHR::IMMEDIATE));
    }
}
