//! Bundled PNG loader. Decoding is delegated to the `image` crate; this
//! loader only normalizes to RGBA8 and stages the upload.

use ash::vk;

use crate::asset::loader::{AssetLoader, UploadSession};
use crate::error::{GraphicsError, Result};
use crate::resource::{Texture, TextureSpec};

pub struct PngLoader;

impl AssetLoader for PngLoader {
    fn file_types(&self) -> &[&'static str] {
        &[".png"]
    }

    fn load_from_memory(&mut self, session: &mut UploadSession<'_>, data: &[u8]) -> Result<()> {
        let decoded = image::load_from_memory_with_format(data, image::ImageFormat::Png)
            .map_err(|err| GraphicsError::AssetDecode(err.to_string()))?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();

        let texture = Texture::new(
            session.device,
            TextureSpec {
                extent: vk::Extent2D { width, height },
                format: vk::Format::R8G8B8A8_SRGB,
                pixel_size: 4,
                data: rgba.as_raw(),
                cmd: session.cmd,
                staging_buffers: &mut *session.staging_buffers,
            },
        )?;
        session.textures.push(texture);

        Ok(())
    }
}
