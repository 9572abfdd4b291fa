//! Device-local 2D image with a view and an explicit layout contract.
//!
//! The image is created in `UNDEFINED` layout and transitioned once, into the
//! layout declared by its spec, with the declared access and stage masks on
//! the destination side. After that the layout only changes through
//! [`Image::transition_layout`], keeping the descriptor info in lockstep.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::context::DeviceContext;
use crate::error::{GraphicsError, Result};

/// Derives the aspect mask an image view needs for `format`.
pub fn aspect_mask_for_format(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::UNDEFINED => vk::ImageAspectFlags::NONE,
        vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
            vk::ImageAspectFlags::DEPTH
        }
        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
        vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::COLOR,
    }
}

pub struct ImageSpec {
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    /// Layout the image is transitioned into at creation.
    pub layout: vk::ImageLayout,
    pub usage: vk::ImageUsageFlags,
    /// Destination access mask of the creation transition.
    pub access: vk::AccessFlags2,
    /// Destination stage mask of the creation transition.
    pub stages: vk::PipelineStageFlags2,
    /// Command buffer to record the transition into. When absent the
    /// transfer queue records and submits a one-time buffer.
    pub cmd: Option<vk::CommandBuffer>,
}

pub struct Image {
    device: Arc<DeviceContext>,
    image: vk::Image,
    allocation: vk_mem::Allocation,
    view: vk::ImageView,
    extent: vk::Extent2D,
    format: vk::Format,
    layout: vk::ImageLayout,
    usage: vk::ImageUsageFlags,
    access: vk::AccessFlags2,
    stages: vk::PipelineStageFlags2,
    aspect_mask: vk::ImageAspectFlags,
    descriptor_info: vk::DescriptorImageInfo,
}

impl Image {
    pub fn new(device: &Arc<DeviceContext>, spec: ImageSpec) -> Result<Self> {
        let (image, allocation) = Self::create_image(device, &spec)?;
        let aspect_mask = aspect_mask_for_format(spec.format);
        let view = Self::create_view(device, image, spec.format, aspect_mask)?;

        let descriptor_info = vk::DescriptorImageInfo {
            sampler: vk::Sampler::null(),
            image_view: view,
            image_layout: spec.layout,
        };

        let mut this = Self {
            device: Arc::clone(device),
            image,
            allocation,
            view,
            extent: spec.extent,
            format: spec.format,
            layout: vk::ImageLayout::UNDEFINED,
            usage: spec.usage,
            access: vk::AccessFlags2::NONE,
            stages: vk::PipelineStageFlags2::TOP_OF_PIPE,
            aspect_mask,
            descriptor_info,
        };

        match spec.cmd {
            Some(cmd) => this.transition_layout(cmd, spec.layout, spec.access, spec.stages),
            None => {
                let cmd = this.device.transfer_queue().begin_commands()?;
                this.transition_layout(cmd, spec.layout, spec.access, spec.stages);
                this.device.transfer_queue().end_commands(cmd)?;
            }
        }

        debug!(
            "created image with dimensions: {}x{}",
            this.extent.width, this.extent.height
        );
        Ok(this)
    }

    fn create_image(device: &Arc<DeviceContext>, spec: &ImageSpec) -> Result<(vk::Image, vk_mem::Allocation)> {
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(spec.format)
            .extent(vk::Extent3D {
                width: spec.extent.width,
                height: spec.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(spec.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let allocation_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            required_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            ..Default::default()
        };

        unsafe {
            device
                .allocator()
                .create_image(&image_info, &allocation_info)
        }
        .map_err(GraphicsError::from)
    }

    fn create_view(
        device: &Arc<DeviceContext>,
        image: vk::Image,
        format: vk::Format,
        aspect_mask: vk::ImageAspectFlags,
    ) -> Result<vk::ImageView> {
        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        unsafe { device.device().create_image_view(&view_info, None) }.map_err(GraphicsError::from)
    }

    /// Records a single barrier moving the image from its current layout to
    /// `layout`. The transition is recorded into `cmd`, not submitted.
    pub fn transition_layout(
        &mut self,
        cmd: vk::CommandBuffer,
        layout: vk::ImageLayout,
        access: vk::AccessFlags2,
        stages: vk::PipelineStageFlags2,
    ) {
        let barrier = vk::ImageMemoryBarrier2::builder()
            .image(self.image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: self.aspect_mask,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .old_layout(self.layout)
            .src_access_mask(self.access)
            .src_stage_mask(self.stages)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .new_layout(layout)
            .dst_access_mask(access)
            .dst_stage_mask(stages)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED);

        let barriers = [barrier.build()];
        let dependency_info = vk::DependencyInfo::builder().image_memory_barriers(&barriers);
        unsafe { self.device.device().cmd_pipeline_barrier2(cmd, &dependency_info) };

        self.layout = layout;
        self.access = access;
        self.stages = stages;
        self.descriptor_info.image_layout = layout;
    }

    pub fn raw(&self) -> vk::Image {
        self.image
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn layout(&self) -> vk::ImageLayout {
        self.layout
    }

    pub fn usage(&self) -> vk::ImageUsageFlags {
        self.usage
    }

    pub fn access(&self) -> vk::AccessFlags2 {
        self.access
    }

    pub fn stages(&self) -> vk::PipelineStageFlags2 {
        self.stages
    }

    pub fn aspect_mask(&self) -> vk::ImageAspectFlags {
        self.aspect_mask
    }

    pub fn descriptor_info(&self) -> &vk::DescriptorImageInfo {
        &self.descriptor_info
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.device.device().destroy_image_view(self.view, None);
            self.device
                .allocator()
                .destroy_image(self.image, &mut self.allocation);
        }
        debug!("destroyed image");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_formats_get_depth_aspect() {
        for format in [
            vk::Format::D16_UNORM,
            vk::Format::D32_SFLOAT,
            vk::Format::X8_D24_UNORM_PACK32,
        ] {
            assert_eq!(aspect_mask_for_format(format), vk::ImageAspectFlags::DEPTH);
        }
    }

    #[test]
    fn combined_formats_get_depth_and_stencil() {
        for format in [
            vk::Format::D16_UNORM_S8_UINT,
            vk::Format::D24_UNORM_S8_UINT,
            vk::Format::D32_SFLOAT_S8_UINT,
        ] {
            assert_eq!(
                aspect_mask_for_format(format),
                vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
            );
        }
    }

    #[test]
    fn stencil_only_and_color_and_undefined() {
        assert_eq!(aspect_mask_for_format(vk::Format::S8_UINT), vk::ImageAspectFlags::STENCIL);
        assert_eq!(
            aspect_mask_for_format(vk::Format::R8G8B8A8_SRGB),
            vk::ImageAspectFlags::COLOR
        );
        assert_eq!(aspect_mask_for_format(vk::Format::UNDEFINED), vk::ImageAspectFlags::NONE);
    }
}
