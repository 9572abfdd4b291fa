//! The loader contract and registry.
//!
//! A loader is any value that names its file types and can turn a blob into
//! engine resources, recording upload commands through the session handed to
//! it. Registration is idempotent by file-type set.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, warn};

use crate::context::DeviceContext;
use crate::error::Result;
use crate::resource::{Buffer, Mesh, Texture};

/// Everything a loader needs while an upload session is open: the transfer
/// command buffer, the staging-buffer deque that owns uploads until the fence
/// signals, and the manager's output collections.
pub struct UploadSession<'a> {
    pub device: &'a Arc<DeviceContext>,
    pub cmd: vk::CommandBuffer,
    pub staging_buffers: &'a mut VecDeque<Buffer>,
    pub textures: &'a mut Vec<Texture>,
    pub meshes: &'a mut Vec<Mesh>,
}

pub trait AssetLoader {
    /// Extensions this loader handles, dot included (e.g. `".png"`).
    fn file_types(&self) -> &[&'static str];

    fn load_from_memory(&mut self, session: &mut UploadSession<'_>, data: &[u8]) -> Result<()>;

    fn load_from_file(&mut self, session: &mut UploadSession<'_>, path: &Path) -> Result<()> {
        let data = fs::read(path)?;
        self.load_from_memory(session, &data)
    }
}

#[derive(Default)]
pub(crate) struct LoaderRegistry {
    loaders: Vec<Box<dyn AssetLoader>>,
    file_types: HashMap<String, usize>,
}

impl LoaderRegistry {
    /// Registers a loader. A loader whose file-type set is already covered is
    /// logged and skipped; returns whether the loader was added.
    pub fn register(&mut self, loader: Box<dyn AssetLoader>) -> bool {
        let duplicate = self
            .loaders
            .iter()
            .any(|existing| existing.file_types() == loader.file_types());
        if duplicate {
            warn!("skipping; loader already exists for: {} files", loader.file_types().join(", "));
            return false;
        }

        debug!("registered loader for: {} files", loader.file_types().join(", "));
        let index = self.loaders.len();
        for file_type in loader.file_types() {
            self.file_types.insert((*file_type).to_owned(), index);
        }
        self.loaders.push(loader);
        true
    }

    /// Looks a loader up by file type, with or without the leading dot.
    pub fn get_mut(&mut self, file_type: &str) -> Option<&mut Box<dyn AssetLoader>> {
        let key = if file_type.starts_with('.') {
            file_type.to_owned()
        } else {
            format!(".{file_type}")
        };
        let index = *self.file_types.get(&key)?;
        self.loaders.get_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullLoader(&'static [&'static str]);

    impl AssetLoader for NullLoader {
        fn file_types(&self) -> &[&'static str] {
            self.0
        }

        fn load_from_memory(&mut self, _session: &mut UploadSession<'_>, _data: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn registration_is_idempotent_by_file_type_set() {
        let mut registry = LoaderRegistry::default();
        assert!(registry.register(Box::new(NullLoader(&[".png"]))));
        assert!(!registry.register(Box::new(NullLoader(&[".png"]))));
        assert!(registry.register(Box::new(NullLoader(&[".obj", ".gltf"]))));
    }

    #[test]
    fn lookup_normalizes_leading_dot() {
        let mut registry = LoaderRegistry::default();
        registry.register(Box::new(NullLoader(&[".png"])));

        assert!(registry.get_mut("png").is_some());
        assert!(registry.get_mut(".png").is_some());
        assert!(registry.get_mut("jpg").is_none());
    }
}
