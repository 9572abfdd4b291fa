//! The device context: instance, surface, physical device, logical device,
//! allocator, and the three logical queues.
//!
//! Construction follows a fixed order; destruction is strictly the reverse
//! (allocator, queues, device, surface, debug messenger, instance). Every GPU
//! resource in the crate holds an `Arc` to this type, so the device cannot be
//! torn down while a resource is alive.

use std::mem::ManuallyDrop;

use ash::extensions::khr::Surface as SurfaceLoader;
use ash::vk;
use muon_core::WindowSurface;
use tracing::debug;

use crate::context::instance::Instance;
use crate::context::physical_device::{self, PhysicalDeviceInfo, REQUIRED_DEVICE_EXTENSIONS};
use crate::context::queue::Queue;
use crate::error::{GraphicsError, Result};

pub struct DeviceContext {
    allocator: ManuallyDrop<vk_mem::Allocator>,
    graphics_queue: ManuallyDrop<Queue>,
    compute_queue: ManuallyDrop<Queue>,
    transfer_queue: ManuallyDrop<Queue>,
    device: ash::Device,
    surface: vk::SurfaceKHR,
    surface_loader: SurfaceLoader,
    physical_device: PhysicalDeviceInfo,
    instance: Instance,
}

impl DeviceContext {
    pub fn new(window: &dyn WindowSurface) -> Result<Self> {
        let instance = Instance::new(window)?;

        let surface = window
            .create_surface(instance.entry(), instance.raw())
            .map_err(GraphicsError::from)?;
        let surface_loader = SurfaceLoader::new(instance.entry(), instance.raw());

        let physical_device = physical_device::select_physical_device(instance.raw(), &surface_loader, surface)?;

        let device = Self::create_logical_device(&instance, &physical_device)?;
        let allocator = Self::create_allocator(&instance, &device, &physical_device)?;

        let assignment = physical_device.queue_assignment;
        let graphics_queue = Queue::new(&device, assignment.graphics.0, assignment.graphics.1, "graphics")?;
        let compute_queue = Queue::new(&device, assignment.compute.0, assignment.compute.1, "compute")?;
        let transfer_queue = Queue::new(&device, assignment.transfer.0, assignment.transfer.1, "transfer")?;

        debug!("created device context");
        Ok(Self {
            allocator: ManuallyDrop::new(allocator),
            graphics_queue: ManuallyDrop::new(graphics_queue),
            compute_queue: ManuallyDrop::new(compute_queue),
            transfer_queue: ManuallyDrop::new(transfer_queue),
            device,
            surface,
            surface_loader,
            physical_device,
            instance,
        })
    }

    fn create_logical_device(instance: &Instance, physical_device: &PhysicalDeviceInfo) -> Result<ash::Device> {
        let layout = physical_device.queue_assignment.queue_create_layout();
        let max_queues = layout.iter().map(|(_, count)| *count).max().unwrap_or(1);
        let priorities = vec![1.0_f32; max_queues as usize];

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = layout
            .iter()
            .map(|&(family, count)| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities[..count as usize])
                    .build()
            })
            .collect();

        let extension_names: Vec<*const std::os::raw::c_char> =
            REQUIRED_DEVICE_EXTENSIONS.iter().map(|name| name.as_ptr()).collect();

        let mut sync2 = vk::PhysicalDeviceSynchronization2Features::builder().synchronization2(true);
        let mut dynamic_rendering =
            vk::PhysicalDeviceDynamicRenderingFeatures::builder().dynamic_rendering(true);
        let mut indexing = vk::PhysicalDeviceDescriptorIndexingFeatures::builder()
            .descriptor_binding_partially_bound(true)
            .runtime_descriptor_array(true)
            .descriptor_binding_uniform_buffer_update_after_bind(true)
            .descriptor_binding_storage_buffer_update_after_bind(true)
            .descriptor_binding_sampled_image_update_after_bind(true);
        let mut buffer_device_address =
            vk::PhysicalDeviceBufferDeviceAddressFeatures::builder().buffer_device_address(true);
        let mut mesh_shader = vk::PhysicalDeviceMeshShaderFeaturesEXT::builder()
            .mesh_shader(true)
            .task_shader(true);

        let mut features = vk::PhysicalDeviceFeatures2::builder()
            .push_next(&mut sync2)
            .push_next(&mut dynamic_rendering)
            .push_next(&mut indexing)
            .push_next(&mut buffer_device_address)
            .push_next(&mut mesh_shader);

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .push_next(&mut features);

        let device = unsafe {
            instance
                .raw()
                .create_device(physical_device.physical_device, &create_info, None)
        }
        .map_err(GraphicsError::from)?;
        debug!("created logical device");

        Ok(device)
    }

    fn create_allocator(
        instance: &Instance,
        device: &ash::Device,
        physical_device: &PhysicalDeviceInfo,
    ) -> Result<vk_mem::Allocator> {
        let create_info = vk_mem::AllocatorCreateInfo::new(
            instance.raw(),
            device,
            physical_device.physical_device,
        )
        .vulkan_api_version(vk::API_VERSION_1_3)
        .flags(vk_mem::AllocatorCreateFlags::BUFFER_DEVICE_ADDRESS);

        let allocator = vk_mem::Allocator::new(create_info).map_err(GraphicsError::from)?;
        debug!("created allocator");

        Ok(allocator)
    }

    pub fn entry(&self) -> &ash::Entry {
        self.instance.entry()
    }

    pub fn instance(&self) -> &ash::Instance {
        self.instance.raw()
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn surface_loader(&self) -> &SurfaceLoader {
        &self.surface_loader
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device.physical_device
    }

    pub fn physical_device_info(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn allocator(&self) -> &vk_mem::Allocator {
        &self.allocator
    }

    pub fn graphics_queue(&self) -> &Queue {
        &self.graphics_queue
    }

    pub fn compute_queue(&self) -> &Queue {
        &self.compute_queue
    }

    pub fn transfer_queue(&self) -> &Queue {
        &self.transfer_queue
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.map_err(GraphicsError::from)
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            ManuallyDrop::drop(&mut self.allocator);
            ManuallyDrop::drop(&mut self.graphics_queue);
            ManuallyDrop::drop(&mut self.compute_queue);
            ManuallyDrop::drop(&mut self.transfer_queue);

            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
        }
        debug!("destroyed device context");
        // The instance field drops last, tearing down the debug messenger and
        // instance.
    }
}
