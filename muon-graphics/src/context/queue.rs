//! A logical queue paired with its command pool.

use ash::vk;
use tracing::debug;

use crate::error::{GraphicsError, Result};

pub struct Queue {
    device: ash::Device,
    queue: vk::Queue,
    command_pool: vk::CommandPool,
    family_index: u32,
    queue_index: u32,
    name: &'static str,
}

impl Queue {
    /// Fetches the queue handle and creates a transient, per-buffer-resetable
    /// command pool on its family.
    pub fn new(device: &ash::Device, family_index: u32, queue_index: u32, name: &'static str) -> Result<Self> {
        let queue = unsafe { device.get_device_queue(family_index, queue_index) };

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(family_index)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let command_pool =
            unsafe { device.create_command_pool(&pool_info, None) }.map_err(GraphicsError::from)?;
        debug!("created {name} queue (family {family_index}, index {queue_index})");

        Ok(Self {
            device: device.clone(),
            queue,
            command_pool,
            family_index,
            queue_index,
            name,
        })
    }

    pub fn raw(&self) -> vk::Queue {
        self.queue
    }

    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    pub fn family_index(&self) -> u32 {
        self.family_index
    }

    pub fn queue_index(&self) -> u32 {
        self.queue_index
    }

    /// Allocates and begins a one-time-submit command buffer.
    pub fn begin_commands(&self) -> Result<vk::CommandBuffer> {
        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let cmd = unsafe { self.device.allocate_command_buffers(&allocate_info) }
            .map_err(GraphicsError::from)?[0];

        let begin_info =
            vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device.begin_command_buffer(cmd, &begin_info) }.map_err(GraphicsError::from)?;

        Ok(cmd)
    }

    /// Ends, submits, waits for the queue to drain, and frees the buffer.
    pub fn end_commands(&self, cmd: vk::CommandBuffer) -> Result<()> {
        unsafe {
            self.device.end_command_buffer(cmd).map_err(GraphicsError::from)?;

            let buffers = [cmd];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&buffers);
            self.device
                .queue_submit(self.queue, &[submit_info.build()], vk::Fence::null())
                .map_err(GraphicsError::from)?;
            self.device.queue_wait_idle(self.queue).map_err(GraphicsError::from)?;

            self.device.free_command_buffers(self.command_pool, &buffers);
        }

        Ok(())
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.queue_wait_idle(self.queue) }.map_err(GraphicsError::from)
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.command_pool, None);
        }
        debug!("destroyed {} queue", self.name);
    }
}
