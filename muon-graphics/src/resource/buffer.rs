//! GPU buffer with VMA-backed memory.
//!
//! A buffer is sized as `instance_count` copies of `instance_size`, each
//! rounded up to the minimum offset alignment so instances can be bound at
//! dynamic offsets. The descriptor info is computed once at creation and
//! never changes.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::context::DeviceContext;
use crate::error::{GraphicsError, Result};

/// Rounds `size` up to the next multiple of `alignment` (a power of two).
/// Zero alignment leaves the size untouched.
pub(crate) fn align_up(size: vk::DeviceSize, alignment: vk::DeviceSize) -> vk::DeviceSize {
    if alignment > 0 {
        (size + alignment - 1) & !(alignment - 1)
    } else {
        size
    }
}

pub struct BufferSpec {
    pub instance_size: vk::DeviceSize,
    pub instance_count: u32,
    pub usage: vk::BufferUsageFlags,
    pub memory_usage: vk_mem::MemoryUsage,
    pub memory_flags: vk_mem::AllocationCreateFlags,
    pub min_offset_alignment: vk::DeviceSize,
}

impl Default for BufferSpec {
    fn default() -> Self {
        Self {
            instance_size: 0,
            instance_count: 1,
            usage: vk::BufferUsageFlags::empty(),
            memory_usage: vk_mem::MemoryUsage::AutoPreferDevice,
            memory_flags: vk_mem::AllocationCreateFlags::empty(),
            min_offset_alignment: 0,
        }
    }
}

pub struct Buffer {
    device: Arc<DeviceContext>,
    buffer: vk::Buffer,
    allocation: vk_mem::Allocation,
    instance_size: vk::DeviceSize,
    instance_count: u32,
    alignment: vk::DeviceSize,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    mapped: Option<*mut u8>,
    device_address: Option<vk::DeviceAddress>,
    descriptor_info: vk::DescriptorBufferInfo,
}

impl Buffer {
    pub fn new(device: &Arc<DeviceContext>, spec: BufferSpec) -> Result<Self> {
        let alignment = align_up(spec.instance_size, spec.min_offset_alignment);
        let size = alignment * vk::DeviceSize::from(spec.instance_count);

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(spec.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let allocation_info = vk_mem::AllocationCreateInfo {
            usage: spec.memory_usage,
            flags: spec.memory_flags,
            ..Default::default()
        };

        let (buffer, allocation) = unsafe {
            device
                .allocator()
                .create_buffer(&buffer_info, &allocation_info)
        }
        .map_err(GraphicsError::from)?;

        let device_address = if spec.usage.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS) {
            let address_info = vk::BufferDeviceAddressInfo::builder().buffer(buffer);
            Some(unsafe { device.device().get_buffer_device_address(&address_info) })
        } else {
            None
        };

        let descriptor_info = vk::DescriptorBufferInfo {
            buffer,
            offset: 0,
            range: size,
        };

        debug!("created buffer with size: {size} bytes");
        Ok(Self {
            device: Arc::clone(device),
            buffer,
            allocation,
            instance_size: spec.instance_size,
            instance_count: spec.instance_count,
            alignment,
            size,
            usage: spec.usage,
            mapped: None,
            device_address,
            descriptor_info,
        })
    }

    /// Maps the allocation. Mapping an already-mapped buffer is a no-op.
    pub fn map(&mut self) -> Result<()> {
        if self.mapped.is_some() {
            return Ok(());
        }

        let pointer = unsafe { self.device.allocator().map_memory(&mut self.allocation) }
            .map_err(GraphicsError::from)?;
        self.mapped = Some(pointer);
        Ok(())
    }

    /// Unmaps the allocation. A no-op when not mapped.
    pub fn unmap(&mut self) {
        if self.mapped.take().is_some() {
            unsafe { self.device.allocator().unmap_memory(&mut self.allocation) };
        }
    }

    /// Copies `size` bytes of `data` to `offset`. `vk::WHOLE_SIZE` copies the
    /// buffer's full size.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is not mapped, or if `data` is shorter than the
    /// requested copy.
    pub fn write(&mut self, data: &[u8], size: vk::DeviceSize, offset: vk::DeviceSize) {
        let mapped = self.mapped.expect("buffer must be mapped before writing");

        let length = if size == vk::WHOLE_SIZE { self.size } else { size } as usize;
        assert!(data.len() >= length, "source slice shorter than requested write");

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.add(offset as usize), length);
        }
    }

    pub fn flush(&self, size: vk::DeviceSize, offset: vk::DeviceSize) -> Result<()> {
        self.device
            .allocator()
            .flush_allocation(&self.allocation, offset, size)
            .map_err(GraphicsError::from)
    }

    pub fn invalidate(&self, size: vk::DeviceSize, offset: vk::DeviceSize) -> Result<()> {
        self.device
            .allocator()
            .invalidate_allocation(&self.allocation, offset, size)
            .map_err(GraphicsError::from)
    }

    pub fn raw(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    pub fn alignment(&self) -> vk::DeviceSize {
        self.alignment
    }

    pub fn instance_size(&self) -> vk::DeviceSize {
        self.instance_size
    }

    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    pub fn mapped(&self) -> Option<*mut u8> {
        self.mapped
    }

    /// # Panics
    ///
    /// Panics when the buffer was not created with
    /// `SHADER_DEVICE_ADDRESS` usage.
    pub fn device_address(&self) -> vk::DeviceAddress {
        assert!(
            self.usage.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS),
            "buffer must be created with shader device address usage"
        );
        self.device_address.expect("device address cached at creation")
    }

    pub fn descriptor_info(&self) -> &vk::DescriptorBufferInfo {
        &self.descriptor_info
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.unmap();
        unsafe {
            self.device
                .allocator()
                .destroy_buffer(self.buffer, &mut self.allocation);
        }
        debug!("destroyed buffer");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_next_multiple() {
        assert_eq!(align_up(64, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
    }

    #[test]
    fn zero_alignment_is_identity() {
        assert_eq!(align_up(77, 0), 77);
    }
}
