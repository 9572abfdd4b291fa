//! Sampled 2D texture with a staged upload.
//!
//! A texture always ends up in `SHADER_READ_ONLY_OPTIMAL`. The upload records
//! two barriers around a buffer-to-image copy; the staging buffer is handed
//! to a caller-supplied collection that must outlive the command buffer's
//! execution.

use std::collections::VecDeque;
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::context::DeviceContext;
use crate::error::{GraphicsError, Result};
use crate::resource::buffer::{Buffer, BufferSpec};

pub struct TextureSpec<'a> {
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    /// Bytes per pixel of `data`.
    pub pixel_size: u32,
    pub data: &'a [u8],
    /// Transfer command buffer the upload is recorded into.
    pub cmd: vk::CommandBuffer,
    /// Owns the staging buffer until the upload has executed.
    pub staging_buffers: &'a mut VecDeque<Buffer>,
}

pub struct Texture {
    device: Arc<DeviceContext>,
    image: vk::Image,
    allocation: vk_mem::Allocation,
    view: vk::ImageView,
    sampler: vk::Sampler,
    extent: vk::Extent2D,
    format: vk::Format,
    layout: vk::ImageLayout,
    descriptor_info: vk::DescriptorImageInfo,
}

impl Texture {
    pub fn new(device: &Arc<DeviceContext>, spec: TextureSpec<'_>) -> Result<Self> {
        let (image, allocation) = Self::create_image(device, spec.extent, spec.format)?;
        let view = Self::create_view(device, image, spec.format)?;
        let sampler = Self::create_sampler(device)?;

        let descriptor_info = vk::DescriptorImageInfo {
            sampler,
            image_view: view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        };

        let mut this = Self {
            device: Arc::clone(device),
            image,
            allocation,
            view,
            sampler,
            extent: spec.extent,
            format: spec.format,
            layout: vk::ImageLayout::UNDEFINED,
            descriptor_info,
        };
        this.upload(spec.cmd, spec.data, spec.pixel_size, spec.staging_buffers)?;

        debug!(
            "created texture with dimensions: {}x{}",
            this.extent.width, this.extent.height
        );
        Ok(this)
    }

    fn create_image(
        device: &Arc<DeviceContext>,
        extent: vk::Extent2D,
        format: vk::Format,
    ) -> Result<(vk::Image, vk_mem::Allocation)> {
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(
                vk::ImageUsageFlags::TRANSFER_DST
                    | vk::ImageUsageFlags::SAMPLED
                    | vk::ImageUsageFlags::COLOR_ATTACHMENT,
            )
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

    fn create_view(device: &Arc<DeviceContext>, image: vk::Image, format: vk::Format) -> Result<vk::ImageView> {
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
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        unsafe { device.device().create_image_view(&view_info, None) }.map_err(GraphicsError::from)
    }

    fn create_sampler(device: &Arc<DeviceContext>) -> Result<vk::Sampler> {
        let sampler_info = vk::SamplerCreateInfo::builder()
            .min_filter(vk::Filter::LINEAR)
            .mag_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .compare_enable(false)
            .compare_op(vk::CompareOp::NEVER)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(0.0)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE);

        unsafe { device.device().create_sampler(&sampler_info, None) }.map_err(GraphicsError::from)
    }

    fn upload(
        &mut self,
        cmd: vk::CommandBuffer,
        data: &[u8],
        pixel_size: u32,
        staging_buffers: &mut VecDeque<Buffer>,
    ) -> Result<()> {
        self.record_barrier(
            cmd,
            vk::ImageLayout::UNDEFINED,
            vk::AccessFlags2::NONE,
            vk::PipelineStageFlags2::TOP_OF_PIPE,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::AccessFlags2::TRANSFER_WRITE,
            vk::PipelineStageFlags2::TRANSFER,
        );

        let mut staging = Buffer::new(
            &self.device,
            BufferSpec {
                instance_size: vk::DeviceSize::from(pixel_size),
                instance_count: data.len() as u32 / pixel_size,
                usage: vk::BufferUsageFlags::TRANSFER_SRC,
                memory_usage: vk_mem::MemoryUsage::AutoPreferHost,
                memory_flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
                ..Default::default()
            },
        )?;
        staging.map()?;
        staging.write(data, vk::WHOLE_SIZE, 0);

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
                width: self.extent.width,
                height: self.extent.height,
                depth: 1,
            });

        unsafe {
            self.device.device().cmd_copy_buffer_to_image(
                cmd,
                staging.raw(),
                self.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region.build()],
            );
        }

        self.record_barrier(
            cmd,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::AccessFlags2::TRANSFER_WRITE,
            vk::PipelineStageFlags2::TRANSFER,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::AccessFlags2::SHADER_READ,
            vk::PipelineStageFlags2::FRAGMENT_SHADER | vk::PipelineStageFlags2::COMPUTE_SHADER,
        );

        // The staging buffer must live until the command buffer executes.
        staging_buffers.push_back(staging);

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn record_barrier(
        &mut self,
        cmd: vk::CommandBuffer,
        old_layout: vk::ImageLayout,
        src_access: vk::AccessFlags2,
        src_stages: vk::PipelineStageFlags2,
        new_layout: vk::ImageLayout,
        dst_access: vk::AccessFlags2,
        dst_stages: vk::PipelineStageFlags2,
    ) {
        let barrier = vk::ImageMemoryBarrier2::builder()
            .image(self.image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .old_layout(old_layout)
            .src_access_mask(src_access)
            .src_stage_mask(src_stages)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .new_layout(new_layout)
            .dst_access_mask(dst_access)
            .dst_stage_mask(dst_stages)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED);

        let barriers = [barrier.build()];
        let dependency_info = vk::DependencyInfo::builder().image_memory_barriers(&barriers);
        unsafe { self.device.device().cmd_pipeline_barrier2(cmd, &dependency_info) };

        self.layout = new_layout;
        self.descriptor_info.image_layout = new_layout;
    }

    pub fn raw(&self) -> vk::Image {
        self.image
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
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

    pub fn descriptor_info(&self) -> &vk::DescriptorImageInfo {
        &self.descriptor_info
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.device.device().destroy_sampler(self.sampler, None);
            self.device.device().destroy_image_view(self.view, None);
            self.device
                .allocator()
                .destroy_image(self.image, &mut self.allocation);
        }
        debug!("destroyed texture");
    }
}
