//! Indexed mesh: a device-local vertex buffer plus a `u32` index buffer,
//! both filled through staging copies recorded into a caller-supplied
//! transfer command buffer.

use std::collections::VecDeque;
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::context::DeviceContext;
use crate::error::Result;
use crate::resource::buffer::{Buffer, BufferSpec};

pub struct MeshSpec<'a> {
    /// Raw vertex bytes, `vertex_stride` bytes per vertex.
    pub vertex_data: &'a [u8],
    pub vertex_stride: u32,
    pub indices: &'a [u32],
    /// Transfer command buffer the copies are recorded into.
    pub cmd: vk::CommandBuffer,
    /// Owns the staging buffers until the upload has executed.
    pub staging_buffers: &'a mut VecDeque<Buffer>,
}

pub struct Mesh {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    vertex_count: u32,
    index_count: u32,
}

impl Mesh {
    pub fn new(device: &Arc<DeviceContext>, spec: MeshSpec<'_>) -> Result<Self> {
        let vertex_count = spec.vertex_data.len() as u32 / spec.vertex_stride;
        let vertex_buffer = Self::upload(
            device,
            spec.cmd,
            spec.staging_buffers,
            spec.vertex_data,
            vk::DeviceSize::from(spec.vertex_stride),
            vertex_count,
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;

        let index_count = spec.indices.len() as u32;
        let index_buffer = Self::upload(
            device,
            spec.cmd,
            spec.staging_buffers,
            bytemuck::cast_slice(spec.indices),
            std::mem::size_of::<u32>() as vk::DeviceSize,
            index_count,
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;

        debug!("created mesh with: {vertex_count} vertices");
        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_count,
            index_count,
        })
    }

    fn upload(
        device: &Arc<DeviceContext>,
        cmd: vk::CommandBuffer,
        staging_buffers: &mut VecDeque<Buffer>,
        data: &[u8],
        instance_size: vk::DeviceSize,
        instance_count: u32,
        usage: vk::BufferUsageFlags,
    ) -> Result<Buffer> {
        let mut staging = Buffer::new(
            device,
            BufferSpec {
                instance_size,
                instance_count,
                usage: vk::BufferUsageFlags::TRANSFER_SRC,
                memory_usage: vk_mem::MemoryUsage::AutoPreferHost,
                memory_flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
                ..Default::default()
            },
        )?;
        staging.map()?;
        staging.write(data, vk::WHOLE_SIZE, 0);

        let buffer = Buffer::new(
            device,
            BufferSpec {
                instance_size,
                instance_count,
                usage: usage | vk::BufferUsageFlags::TRANSFER_DST,
                memory_usage: vk_mem::MemoryUsage::AutoPreferDevice,
                ..Default::default()
            },
        )?;

        let copy = vk::BufferCopy::builder().size(staging.size());
        unsafe {
            device
                .device()
                .cmd_copy_buffer(cmd, staging.raw(), buffer.raw(), &[copy.build()]);
        }

        staging_buffers.push_back(staging);
        Ok(buffer)
    }

    pub fn bind(&self, device: &DeviceContext, cmd: vk::CommandBuffer) {
        let buffers = [self.vertex_buffer.raw()];
        let offsets = [0];
        unsafe {
            device.device().cmd_bind_vertex_buffers(cmd, 0, &buffers, &offsets);
            device
                .device()
                .cmd_bind_index_buffer(cmd, self.index_buffer.raw(), 0, vk::IndexType::UINT32);
        }
    }

    pub fn draw(&self, device: &DeviceContext, cmd: vk::CommandBuffer) {
        unsafe {
            device.device().cmd_draw_indexed(cmd, self.index_count, 1, 0, 0, 0);
        }
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn vertex_buffer(&self) -> &Buffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &Buffer {
        &self.index_buffer
    }
}
