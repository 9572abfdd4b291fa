//! Batched asset uploads over the transfer queue.
//!
//! The manager owns one transfer command buffer, one upload fence, and the
//! staging buffers of the current session. Loading is bracketed: between
//! `begin_loading` and `end_loading`, loaders record copies into the shared
//! command buffer; `end_loading` submits, waits on the fence, and releases
//! the staging buffers.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::asset::loader::{AssetLoader, LoaderRegistry, UploadSession};
use crate::context::DeviceContext;
use crate::error::{GraphicsError, Result};
use crate::resource::{Buffer, Mesh, Texture};
use crate::GPU_WAIT_TIMEOUT_NS;

pub struct AssetManager {
    device: Arc<DeviceContext>,
    command_buffer: vk::CommandBuffer,
    upload_fence: vk::Fence,
    loading_in_progress: bool,
    registry: LoaderRegistry,
    staging_buffers: VecDeque<Buffer>,
    textures: Vec<Texture>,
    meshes: Vec<Mesh>,
}

impl AssetManager {
    pub fn new(device: &Arc<DeviceContext>) -> Result<Self> {
        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(device.transfer_queue().command_pool())
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffer = unsafe { device.device().allocate_command_buffers(&allocate_info) }
            .map_err(GraphicsError::from)?[0];

        let fence_info = vk::FenceCreateInfo::builder();
        let upload_fence =
            unsafe { device.device().create_fence(&fence_info, None) }.map_err(GraphicsError::from)?;

        debug!("created asset manager");
        Ok(Self {
            device: Arc::clone(device),
            command_buffer,
            upload_fence,
            loading_in_progress: false,
            registry: LoaderRegistry::default(),
            staging_buffers: VecDeque::new(),
            textures: Vec::new(),
            meshes: Vec::new(),
        })
    }

    /// Registers a loader; duplicates by file-type set are skipped.
    pub fn register_loader(&mut self, loader: Box<dyn AssetLoader>) {
        self.registry.register(loader);
    }

    /// Opens an upload session.
    ///
    /// # Panics
    ///
    /// Panics when a session is already in progress.
    pub fn begin_loading(&mut self) -> Result<()> {
        assert!(
            !self.loading_in_progress,
            "cannot begin loading while loading is in progress"
        );

        let begin_info = vk::CommandBufferBeginInfo::builder();
        unsafe { self.device.device().begin_command_buffer(self.command_buffer, &begin_info) }
            .map_err(GraphicsError::from)?;

        self.loading_in_progress = true;
        Ok(())
    }

    /// Dispatches `path` to the loader registered for its extension. A loader
    /// failure leaves the session open; the failed asset is simply absent.
    ///
    /// # Panics
    ///
    /// Panics when no session is in progress.
    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        assert!(self.loading_in_progress, "cannot load from file if loading hasn't begun");
        let path = path.as_ref();

        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .ok_or_else(|| GraphicsError::NoLoader(path.display().to_string()))?
            .to_owned();

        let Self {
            device,
            command_buffer,
            registry,
            staging_buffers,
            textures,
            meshes,
            ..
        } = self;

        let loader = registry
            .get_mut(&extension)
            .ok_or(GraphicsError::NoLoader(extension))?;

        let mut session = UploadSession {
            device,
            cmd: *command_buffer,
            staging_buffers,
            textures,
            meshes,
        };
        loader.load_from_file(&mut session, path)
    }

    /// Feeds an in-memory blob to the loader registered for `file_type`.
    ///
    /// # Panics
    ///
    /// Panics when no session is in progress.
    pub fn load_from_memory(&mut self, data: &[u8], file_type: &str) -> Result<()> {
        assert!(self.loading_in_progress, "cannot load from memory if loading hasn't begun");

        let Self {
            device,
            command_buffer,
            registry,
            staging_buffers,
            textures,
            meshes,
            ..
        } = self;

        let loader = registry
            .get_mut(file_type)
            .ok_or_else(|| GraphicsError::NoLoader(file_type.to_owned()))?;

        let mut session = UploadSession {
            device,
            cmd: *command_buffer,
            staging_buffers,
            textures,
            meshes,
        };
        loader.load_from_memory(&mut session, data)
    }

    /// Closes the session: submit, wait on the upload fence, release staging
    /// buffers.
    ///
    /// # Panics
    ///
    /// Panics when no session is in progress.
    pub fn end_loading(&mut self) -> Result<()> {
        assert!(self.loading_in_progress, "cannot end loading if loading has not been started");

        unsafe { self.device.device().end_command_buffer(self.command_buffer) }
            .map_err(GraphicsError::from)?;

        let command_buffers = [self.command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
        unsafe {
            self.device.device().queue_submit(
                self.device.transfer_queue().raw(),
                &[submit_info.build()],
                self.upload_fence,
            )
        }
        .map_err(GraphicsError::from)?;

        self.loading_in_progress = false;

        unsafe {
            self.device
                .device()
                .wait_for_fences(&[self.upload_fence], true, GPU_WAIT_TIMEOUT_NS)
        }
        .map_err(|err| match err {
            vk::Result::TIMEOUT => GraphicsError::Timeout("upload fence"),
            other => GraphicsError::from(other),
        })?;

        unsafe { self.device.device().reset_fences(&[self.upload_fence]) }.map_err(GraphicsError::from)?;

        self.staging_buffers.clear();
        Ok(())
    }

    pub fn loading_in_progress(&self) -> bool {
        self.loading_in_progress
    }

    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    /// Hands ownership of every loaded texture to the caller.
    pub fn take_textures(&mut self) -> Vec<Texture> {
        std::mem::take(&mut self.textures)
    }

    pub fn take_meshes(&mut self) -> Vec<Mesh> {
        std::mem::take(&mut self.meshes)
    }
}

impl Drop for AssetManager {
    fn drop(&mut self) {
        unsafe {
            self.device.device().destroy_fence(self.upload_fence, None);
            self.device.device().free_command_buffers(
                self.device.transfer_queue().command_pool(),
                &[self.command_buffer],
            );
        }
        debug!("destroyed asset manager");
    }
}
