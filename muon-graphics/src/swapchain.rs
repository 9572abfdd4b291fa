//! Swapchain with two pipelined frames in flight.
//!
//! Synchronization is split between frame slots and swapchain images: each of
//! the two in-flight slots owns an acquire semaphore and a fence, while each
//! swapchain image owns the semaphore presentation waits on, plus a record of
//! which slot's fence last wrote to it.

use std::sync::Arc;

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::vk;
use tracing::debug;

use crate::context::DeviceContext;
use crate::error::{GraphicsError, Result};
use crate::GPU_WAIT_TIMEOUT_NS;

pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Outcome of an acquire: either an image index or the signal that the
/// surface changed underneath the swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireResult {
    Acquired(u32),
    NeedsRebuild,
}

pub struct SwapchainSpec {
    pub window_extent: vk::Extent2D,
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub present_mode: vk::PresentModeKHR,
    /// Retired handle of the swapchain being replaced.
    pub old_swapchain: Option<vk::SwapchainKHR>,
}

pub struct Swapchain {
    device: Arc<DeviceContext>,
    loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    format: vk::Format,
    color_space: vk::ColorSpaceKHR,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    image_available: Vec<vk::Semaphore>,
    in_flight: Vec<vk::Fence>,
    render_finished: Vec<vk::Semaphore>,
    images_in_flight: Vec<vk::Fence>,
    current_frame: usize,
}

impl Swapchain {
    pub fn new(device: &Arc<DeviceContext>, spec: SwapchainSpec) -> Result<Self> {
        let loader = SwapchainLoader::new(device.instance(), device.device());

        let capabilities = unsafe {
            device
                .surface_loader()
                .get_physical_device_surface_capabilities(device.physical_device(), device.surface())
        }
        .map_err(GraphicsError::from)?;

        let extent = Self::choose_extent(&capabilities, spec.window_extent);

        let mut min_image_count = capabilities.min_image_count + 1;
        if capabilities.max_image_count > 0 && min_image_count > capabilities.max_image_count {
            min_image_count = capabilities.max_image_count;
        }

        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(device.surface())
            .min_image_count(min_image_count)
            .image_format(spec.format)
            .image_color_space(spec.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(spec.present_mode)
            .clipped(true);

        if let Some(old) = spec.old_swapchain {
            create_info = create_info.old_swapchain(old);
        }

        let swapchain = unsafe { loader.create_swapchain(&create_info, None) }.map_err(GraphicsError::from)?;
        let images = unsafe { loader.get_swapchain_images(swapchain) }.map_err(GraphicsError::from)?;

        let image_views = Self::create_image_views(device, &images, spec.format)?;
        let (image_available, in_flight, render_finished) = Self::create_sync_objects(device, images.len())?;
        let images_in_flight = vec![vk::Fence::null(); images.len()];

        if spec.old_swapchain.is_some() {
            debug!(
                "created swapchain with dimensions: {}x{} from old swapchain",
                extent.width, extent.height
            );
        } else {
            debug!("created swapchain with dimensions: {}x{}", extent.width, extent.height);
        }

        Ok(Self {
            device: Arc::clone(device),
            loader,
            swapchain,
            format: spec.format,
            color_space: spec.color_space,
            extent,
            images,
            image_views,
            image_available,
            in_flight,
            render_finished,
            images_in_flight,
            current_frame: 0,
        })
    }

    fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, window_extent: vk::Extent2D) -> vk::Extent2D {
        if capabilities.current_extent.width != u32::MAX {
            capabilities.current_extent
        } else {
            vk::Extent2D {
                width: window_extent.width.clamp(
                    capabilities.min_image_extent.width,
                    capabilities.max_image_extent.width,
                ),
                height: window_extent.height.clamp(
                    capabilities.min_image_extent.height,
                    capabilities.max_image_extent.height,
                ),
            }
        }
    }

    fn create_image_views(
        device: &Arc<DeviceContext>,
        images: &[vk::Image],
        format: vk::Format,
    ) -> Result<Vec<vk::ImageView>> {
        // BGRA-shaped formats present with red and blue exchanged; the view
        // swizzle folds that back.
        let swizzle_rb =
            format == vk::Format::B8G8R8A8_SRGB || format == vk::Format::A2B10G10R10_UNORM_PACK32;

        images
            .iter()
            .map(|&image| {
                let view_info = vk::ImageViewCreateInfo::builder()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(format)
                    .components(vk::ComponentMapping {
                        r: if swizzle_rb {
                            vk::ComponentSwizzle::B
                        } else {
                            vk::ComponentSwizzle::R
                        },
                        g: vk::ComponentSwizzle::G,
                        b: if swizzle_rb {
                            vk::ComponentSwizzle::R
                        } else {
                            vk::ComponentSwizzle::B
                        },
                        a: vk::ComponentSwizzle::A,
                    })
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });

                unsafe { device.device().create_image_view(&view_info, None) }.map_err(GraphicsError::from)
            })
            .collect()
    }

    #[allow(clippy::type_complexity)]
    fn create_sync_objects(
        device: &Arc<DeviceContext>,
        image_count: usize,
    ) -> Result<(Vec<vk::Semaphore>, Vec<vk::Fence>, Vec<vk::Semaphore>)> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        let mut image_available = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut in_flight = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            image_available.push(
                unsafe { device.device().create_semaphore(&semaphore_info, None) }
                    .map_err(GraphicsError::from)?,
            );
            in_flight.push(
                unsafe { device.device().create_fence(&fence_info, None) }.map_err(GraphicsError::from)?,
            );
        }

        let mut render_finished = Vec::with_capacity(image_count);
        for _ in 0..image_count {
            render_finished.push(
                unsafe { device.device().create_semaphore(&semaphore_info, None) }
                    .map_err(GraphicsError::from)?,
            );
        }

        Ok((image_available, in_flight, render_finished))
    }

    /// Waits for the current frame slot and acquires the next image,
    /// signalling the slot's acquire semaphore.
    pub fn acquire_next_image(&self) -> Result<AcquireResult> {
        unsafe {
            self.device
                .device()
                .wait_for_fences(&[self.in_flight[self.current_frame]], true, GPU_WAIT_TIMEOUT_NS)
        }
        .map_err(|err| match err {
            vk::Result::TIMEOUT => GraphicsError::Timeout("in flight fence"),
            other => GraphicsError::from(other),
        })?;

        let acquired = unsafe {
            self.loader.acquire_next_image(
                self.swapchain,
                GPU_WAIT_TIMEOUT_NS,
                self.image_available[self.current_frame],
                vk::Fence::null(),
            )
        };

        match acquired {
            Ok((image_index, _suboptimal)) => Ok(AcquireResult::Acquired(image_index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireResult::NeedsRebuild),
            Err(vk::Result::TIMEOUT) => Err(GraphicsError::Timeout("swapchain acquire")),
            Err(other) => Err(GraphicsError::from(other)),
        }
    }

    /// Submits the frame's command buffer and presents `image_index`.
    ///
    /// Returns `true` when the present reported the surface as suboptimal or
    /// out of date and the caller should schedule a rebuild.
    pub fn submit_and_present(&mut self, cmd: vk::CommandBuffer, image_index: u32) -> Result<bool> {
        let image = image_index as usize;

        // Another frame slot may still be rendering to this image.
        if self.images_in_flight[image] != vk::Fence::null() {
            unsafe {
                self.device
                    .device()
                    .wait_for_fences(&[self.images_in_flight[image]], true, GPU_WAIT_TIMEOUT_NS)
            }
            .map_err(|err| match err {
                vk::Result::TIMEOUT => GraphicsError::Timeout("image in flight fence"),
                other => GraphicsError::from(other),
            })?;
        }
        self.images_in_flight[image] = self.in_flight[self.current_frame];

        unsafe {
            self.device
                .device()
                .reset_fences(&[self.in_flight[self.current_frame]])
        }
        .map_err(GraphicsError::from)?;

        let wait_semaphores = [self.image_available[self.current_frame]];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.render_finished[image]];
        let command_buffers = [cmd];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.device().queue_submit(
                self.device.graphics_queue().raw(),
                &[submit_info.build()],
                self.in_flight[self.current_frame],
            )
        }
        .map_err(GraphicsError::from)?;

        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let present = unsafe {
            self.loader
                .queue_present(self.device.graphics_queue().raw(), &present_info)
        };

        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;

        match present {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(other) => Err(GraphicsError::from(other)),
        }
    }

    pub fn raw(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.color_space
    }

    pub fn is_hdr(&self) -> bool {
        matches!(
            self.color_space,
            vk::ColorSpaceKHR::BT2020_LINEAR_EXT
                | vk::ColorSpaceKHR::HDR10_ST2084_EXT
                | vk::ColorSpaceKHR::HDR10_HLG_EXT
                | vk::ColorSpaceKHR::DISPLAY_NATIVE_AMD
        )
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn image(&self, index: usize) -> vk::Image {
        self.images[index]
    }

    pub fn image_view(&self, index: usize) -> vk::ImageView {
        self.image_views[index]
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn width(&self) -> u32 {
        self.extent.width
    }

    pub fn height(&self) -> u32 {
        self.extent.height
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.extent.width as f32 / self.extent.height as f32
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Whether a rebuilt swapchain kept the same format and color space.
    pub fn compatible_with(&self, other: &Swapchain) -> bool {
        self.format == other.format && self.color_space == other.color_space
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &semaphore in &self.image_available {
                self.device.device().destroy_semaphore(semaphore, None);
            }
            for &fence in &self.in_flight {
                self.device.device().destroy_fence(fence, None);
            }
            for &semaphore in &self.render_finished {
                self.device.device().destroy_semaphore(semaphore, None);
            }
            for &view in &self.image_views {
                self.device.device().destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
        debug!("destroyed swapchain");
    }
}
