//! Physical device selection.
//!
//! Candidates must carry the required device extensions, the required feature
//! set, and a workable queue assignment. Survivors are ranked discrete-first,
//! then by device-local memory, with ties broken by enumeration order.

use std::collections::HashSet;
use std::ffi::CStr;

use ash::extensions::khr::Surface as SurfaceLoader;
use ash::vk;
use tracing::{debug, info};

use crate::context::queue_family::{QueueAssignment, QueueFamilyAnalyzer};
use crate::error::{GraphicsError, Result};

pub const REQUIRED_DEVICE_EXTENSIONS: [&CStr; 2] = [
    vk::KhrSwapchainFn::name(),
    vk::ExtMeshShaderFn::name(),
];

/// Feature bits the engine cannot run without, gathered from the
/// `vkGetPhysicalDeviceFeatures2` chain.
#[derive(Debug, Clone, Copy)]
pub struct DeviceFeatureSupport {
    pub synchronization2: bool,
    pub dynamic_rendering: bool,
    pub partially_bound: bool,
    pub runtime_descriptor_array: bool,
    pub uniform_update_after_bind: bool,
    pub storage_update_after_bind: bool,
    pub sampled_image_update_after_bind: bool,
    pub buffer_device_address: bool,
    pub mesh_shader: bool,
    pub task_shader: bool,
}

impl DeviceFeatureSupport {
    pub fn query(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Self {
        let mut sync2 = vk::PhysicalDeviceSynchronization2Features::default();
        let mut dynamic_rendering = vk::PhysicalDeviceDynamicRenderingFeatures::default();
        let mut indexing = vk::PhysicalDeviceDescriptorIndexingFeatures::default();
        let mut buffer_device_address = vk::PhysicalDeviceBufferDeviceAddressFeatures::default();
        let mut mesh_shader = vk::PhysicalDeviceMeshShaderFeaturesEXT::default();

        let mut features = vk::PhysicalDeviceFeatures2::builder()
            .push_next(&mut sync2)
            .push_next(&mut dynamic_rendering)
            .push_next(&mut indexing)
            .push_next(&mut buffer_device_address)
            .push_next(&mut mesh_shader);

        unsafe { instance.get_physical_device_features2(physical_device, &mut features) };

        Self {
            synchronization2: sync2.synchronization2 == vk::TRUE,
            dynamic_rendering: dynamic_rendering.dynamic_rendering == vk::TRUE,
            partially_bound: indexing.descriptor_binding_partially_bound == vk::TRUE,
            runtime_descriptor_array: indexing.runtime_descriptor_array == vk::TRUE,
            uniform_update_after_bind: indexing.descriptor_binding_uniform_buffer_update_after_bind == vk::TRUE,
            storage_update_after_bind: indexing.descriptor_binding_storage_buffer_update_after_bind == vk::TRUE,
            sampled_image_update_after_bind: indexing.descriptor_binding_sampled_image_update_after_bind
                == vk::TRUE,
            buffer_device_address: buffer_device_address.buffer_device_address == vk::TRUE,
            mesh_shader: mesh_shader.mesh_shader == vk::TRUE,
            task_shader: mesh_shader.task_shader == vk::TRUE,
        }
    }

    pub fn missing(&self) -> Option<&'static str> {
        if !self.synchronization2 {
            Some("synchronization2")
        } else if !self.dynamic_rendering {
            Some("dynamicRendering")
        } else if !self.partially_bound {
            Some("descriptorBindingPartiallyBound")
        } else if !self.runtime_descriptor_array {
            Some("runtimeDescriptorArray")
        } else if !self.uniform_update_after_bind {
            Some("descriptorBindingUniformBufferUpdateAfterBind")
        } else if !self.storage_update_after_bind {
            Some("descriptorBindingStorageBufferUpdateAfterBind")
        } else if !self.sampled_image_update_after_bind {
            Some("descriptorBindingSampledImageUpdateAfterBind")
        } else if !self.buffer_device_address {
            Some("bufferDeviceAddress")
        } else if !self.mesh_shader {
            Some("meshShader")
        } else if !self.task_shader {
            Some("taskShader")
        } else {
            None
        }
    }
}

/// The selected GPU together with everything device creation needs.
pub struct PhysicalDeviceInfo {
    pub physical_device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub queue_assignment: QueueAssignment,
}

impl PhysicalDeviceInfo {
    pub fn min_uniform_buffer_offset_alignment(&self) -> vk::DeviceSize {
        self.properties.limits.min_uniform_buffer_offset_alignment
    }
}

pub fn select_physical_device(
    instance: &ash::Instance,
    surface_loader: &SurfaceLoader,
    surface: vk::SurfaceKHR,
) -> Result<PhysicalDeviceInfo> {
    let physical_devices = unsafe { instance.enumerate_physical_devices() }.map_err(GraphicsError::from)?;
    if physical_devices.is_empty() {
        return Err(GraphicsError::NoSuitableGpu);
    }

    let mut best: Option<(PhysicalDeviceInfo, (bool, u64))> = None;

    for physical_device in physical_devices {
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy();

        if !supports_required_extensions(instance, physical_device)? {
            debug!("{name}: missing required device extensions");
            continue;
        }

        if let Some(feature) = DeviceFeatureSupport::query(instance, physical_device).missing() {
            debug!("{name}: missing required feature {feature}");
            continue;
        }

        let analyzer = QueueFamilyAnalyzer::from_device(instance, surface_loader, physical_device, surface)?;
        let queue_assignment = match analyzer.assign() {
            Ok(assignment) => assignment,
            Err(err) => {
                debug!("{name}: {err}");
                continue;
            }
        };

        let memory_properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };
        let score = (
            properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU,
            device_local_memory(&memory_properties),
        );
        debug!(
            "{name}: suitable (discrete: {}, device local bytes: {})",
            score.0, score.1
        );

        let candidate = PhysicalDeviceInfo {
            physical_device,
            properties,
            memory_properties,
            queue_assignment,
        };

        // Strict comparison keeps the earlier device on a tie.
        match &best {
            Some((_, best_score)) if score <= *best_score => {}
            _ => best = Some((candidate, score)),
        }
    }

    let (selected, _) = best.ok_or(GraphicsError::NoSuitableGpu)?;
    let name = unsafe { CStr::from_ptr(selected.properties.device_name.as_ptr()) }.to_string_lossy();
    info!("selected GPU: {name}");

    Ok(selected)
}

fn supports_required_extensions(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Result<bool> {
    let available = unsafe { instance.enumerate_device_extension_properties(physical_device) }
        .map_err(GraphicsError::from)?;

    let available: HashSet<_> = available
        .iter()
        .map(|extension| unsafe { CStr::from_ptr(extension.extension_name.as_ptr()) }.to_owned())
        .collect();

    Ok(REQUIRED_DEVICE_EXTENSIONS
        .iter()
        .all(|required| available.contains(*required)))
}

fn device_local_memory(memory_properties: &vk::PhysicalDeviceMemoryProperties) -> u64 {
    memory_properties.memory_heaps[..memory_properties.memory_heap_count as usize]
        .iter()
        .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
        .map(|heap| heap.size)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_local_memory_sums_only_device_local_heaps() {
        let mut memory_properties = vk::PhysicalDeviceMemoryProperties::default();
        memory_properties.memory_heap_count = 3;
        memory_properties.memory_heaps[0] = vk::MemoryHeap {
            size: 4096,
            flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
        };
        memory_properties.memory_heaps[1] = vk::MemoryHeap {
            size: 1024,
            flags: vk::MemoryHeapFlags::empty(),
        };
        memory_properties.memory_heaps[2] = vk::MemoryHeap {
            size: 2048,
            flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
        };

        assert_eq!(device_local_memory(&memory_properties), 6144);
    }
}
