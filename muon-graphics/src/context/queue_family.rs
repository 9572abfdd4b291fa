//! Queue family classification and logical queue assignment.
//!
//! The analyzer reduces a physical device's queue families to plain capability
//! records, then maps the three logical queues (graphics, compute, transfer)
//! onto `(family index, queue index)` pairs. Collisions are allowed: on a
//! device with a single family all three queues share it, with distinct queue
//! indices when the family has spare queues and index 0 otherwise.

use ash::extensions::khr::Surface as SurfaceLoader;
use ash::vk;
use tracing::debug;

use crate::error::{GraphicsError, Result};

/// Capabilities of one queue family, decoupled from the driver so the
/// selection policy can be exercised with synthetic data.
#[derive(Debug, Clone, Copy)]
pub struct QueueFamilyInfo {
    pub index: u32,
    pub queue_count: u32,
    pub graphics: bool,
    pub compute: bool,
    pub transfer: bool,
    pub present: bool,
}

impl QueueFamilyInfo {
    fn from_properties(index: u32, properties: &vk::QueueFamilyProperties, present: bool) -> Self {
        let flags = properties.queue_flags;
        let graphics = flags.contains(vk::QueueFlags::GRAPHICS);
        let compute = flags.contains(vk::QueueFlags::COMPUTE);
        // Graphics and compute families support transfer even when the flag
        // is not advertised.
        let transfer = flags.contains(vk::QueueFlags::TRANSFER) || graphics || compute;

        Self {
            index,
            queue_count: properties.queue_count,
            graphics,
            compute,
            transfer,
            present,
        }
    }
}

/// Where each logical queue landed: `(family index, queue index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueAssignment {
    pub graphics: (u32, u32),
    pub compute: (u32, u32),
    pub transfer: (u32, u32),
}

impl QueueAssignment {
    /// Per-family queue counts for device creation, one entry per distinct
    /// family, count covering the highest assigned queue index.
    pub fn queue_create_layout(&self) -> Vec<(u32, u32)> {
        let mut layout: Vec<(u32, u32)> = Vec::new();
        for (family, queue) in [self.graphics, self.compute, self.transfer] {
            match layout.iter_mut().find(|(f, _)| *f == family) {
                Some((_, count)) => *count = (*count).max(queue + 1),
                None => layout.push((family, queue + 1)),
            }
        }
        layout
    }
}

#[derive(Debug)]
pub struct QueueFamilyAnalyzer {
    families: Vec<QueueFamilyInfo>,
}

impl QueueFamilyAnalyzer {
    pub fn new(families: Vec<QueueFamilyInfo>) -> Self {
        Self { families }
    }

    /// Builds capability records for every family of `physical_device`.
    pub fn from_device(
        instance: &ash::Instance,
        surface_loader: &SurfaceLoader,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Self> {
        let properties = unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

        let mut families = Vec::with_capacity(properties.len());
        for (index, family) in properties.iter().enumerate() {
            let index = index as u32;
            let present = unsafe {
                surface_loader.get_physical_device_surface_support(physical_device, index, surface)
            }
            .map_err(GraphicsError::from)?;

            families.push(QueueFamilyInfo::from_properties(index, family, present));
        }

        Ok(Self { families })
    }

    pub fn families(&self) -> &[QueueFamilyInfo] {
        &self.families
    }

    /// Resolves the three logical queues.
    ///
    /// Graphics requires a family that is both graphics and present capable.
    /// Compute prefers a dedicated (non-graphics) compute family, transfer a
    /// family that is neither graphics nor compute capable; both fall back to
    /// any capable family, preferring one with a spare queue slot.
    pub fn assign(&self) -> Result<QueueAssignment> {
        let mut used: Vec<u32> = vec![0; self.families.len()];

        let graphics_family = self
            .families
            .iter()
            .find(|family| family.graphics && family.present)
            .ok_or(GraphicsError::QueueFamilyUnavailable("graphics + present"))?;
        let graphics = (graphics_family.index, Self::take_slot(graphics_family, &mut used));

        let compute_family = self
            .select(&used, |family| family.compute && !family.graphics)
            .or_else(|| self.select(&used, |family| family.compute))
            .ok_or(GraphicsError::QueueFamilyUnavailable("compute"))?;
        let compute = (compute_family.index, Self::take_slot(compute_family, &mut used));

        let transfer_family = self
            .select(&used, |family| family.transfer && !family.graphics && !family.compute)
            .or_else(|| self.select(&used, |family| family.transfer))
            .ok_or(GraphicsError::QueueFamilyUnavailable("transfer"))?;
        let transfer = (transfer_family.index, Self::take_slot(transfer_family, &mut used));

        let assignment = QueueAssignment {
            graphics,
            compute,
            transfer,
        };
        debug!(?assignment, "resolved logical queue assignment");
        Ok(assignment)
    }

    /// First family matching the predicate with a spare queue slot, falling
    /// back to the first match regardless of remaining capacity.
    fn select(&self, used: &[u32], predicate: impl Fn(&QueueFamilyInfo) -> bool) -> Option<&QueueFamilyInfo> {
        self.families
            .iter()
            .find(|family| predicate(family) && used[family.index as usize] < family.queue_count)
            .or_else(|| self.families.iter().find(|family| predicate(family)))
    }

    fn take_slot(family: &QueueFamilyInfo, used: &mut [u32]) -> u32 {
        let slot = &mut used[family.index as usize];
        if *slot < family.queue_count {
            let index = *slot;
            *slot += 1;
            index
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(index: u32, queue_count: u32, graphics: bool, compute: bool, transfer: bool, present: bool) -> QueueFamilyInfo {
        QueueFamilyInfo {
            index,
            queue_count,
            graphics,
            compute,
            transfer,
            present,
        }
    }

    #[test]
    fn single_family_with_one_queue_aliases_everything_to_zero() {
        let analyzer = QueueFamilyAnalyzer::new(vec![family(0, 1, true, true, true, true)]);
        let assignment = analyzer.assign().unwrap();

        assert_eq!(assignment.graphics, (0, 0));
        assert_eq!(assignment.compute, (0, 0));
        assert_eq!(assignment.transfer, (0, 0));
    }

    #[test]
    fn single_family_with_three_queues_gets_distinct_indices() {
        let analyzer = QueueFamilyAnalyzer::new(vec![family(0, 3, true, true, true, true)]);
        let assignment = analyzer.assign().unwrap();

        assert_eq!(assignment.graphics, (0, 0));
        assert_eq!(assignment.compute, (0, 1));
        assert_eq!(assignment.transfer, (0, 2));
    }

    #[test]
    fn dedicated_compute_and_transfer_families_are_preferred() {
        let analyzer = QueueFamilyAnalyzer::new(vec![
            family(0, 16, true, true, true, true),
            family(1, 2, false, true, true, false),
            family(2, 1, false, false, true, false),
        ]);
        let assignment = analyzer.assign().unwrap();

        assert_eq!(assignment.graphics, (0, 0));
        assert_eq!(assignment.compute, (1, 0));
        assert_eq!(assignment.transfer, (2, 0));
    }

    #[test]
    fn transfer_falls_back_to_a_family_with_spare_queues() {
        let analyzer = QueueFamilyAnalyzer::new(vec![
            family(0, 1, true, true, true, true),
            family(1, 4, false, true, true, false),
        ]);
        let assignment = analyzer.assign().unwrap();

        assert_eq!(assignment.compute, (1, 0));
        // No transfer-only family; the graphics family is saturated, so the
        // async compute family donates its next queue.
        assert_eq!(assignment.transfer, (1, 1));
    }

    #[test]
    fn graphics_without_present_support_fails() {
        let analyzer = QueueFamilyAnalyzer::new(vec![family(0, 1, true, true, true, false)]);
        assert!(matches!(
            analyzer.assign(),
            Err(GraphicsError::QueueFamilyUnavailable("graphics + present"))
        ));
    }

    #[test]
    fn queue_create_layout_merges_shared_families() {
        let assignment = QueueAssignment {
            graphics: (0, 0),
            compute: (0, 1),
            transfer: (1, 0),
        };
        let mut layout = assignment.queue_create_layout();
        layout.sort_unstable();
        assert_eq!(layout, vec![(0, 2), (1, 1)]);
    }
}
