//! Device-scoped state: instance, physical device selection, logical device,
//! queues, allocator.

pub mod device;
pub mod instance;
pub mod physical_device;
pub mod queue;
pub mod queue_family;

pub use device::DeviceContext;
pub use instance::{Instance, DEBUG_ENABLED};
pub use physical_device::{DeviceFeatureSupport, PhysicalDeviceInfo};
pub use queue::Queue;
pub use queue_family::{QueueAssignment, QueueFamilyAnalyzer, QueueFamilyInfo};
