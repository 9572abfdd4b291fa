//! Pipeline layout shared between pipelines.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::context::DeviceContext;
use crate::error::{GraphicsError, Result};

/// Bundles descriptor-set layouts and an optional push-constant range.
///
/// Returned behind an `Arc`: pipelines commonly share one layout, and the
/// layout must outlive the last pipeline referencing it.
pub struct PipelineLayout {
    device: Arc<DeviceContext>,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    pub fn new(
        device: &Arc<DeviceContext>,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant: Option<vk::PushConstantRange>,
    ) -> Result<Arc<Self>> {
        let mut create_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(set_layouts);

        let ranges;
        if let Some(range) = push_constant {
            ranges = [range];
            create_info = create_info.push_constant_ranges(&ranges);
        }

        let layout = unsafe { device.device().create_pipeline_layout(&create_info, None) }
            .map_err(GraphicsError::from)?;
        debug!("created pipeline layout");

        Ok(Arc::new(Self {
            device: Arc::clone(device),
            layout,
        }))
    }

    pub fn raw(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.device().destroy_pipeline_layout(self.layout, None);
        }
        debug!("destroyed pipeline layout");
    }
}
