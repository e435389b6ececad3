//! Device memory allocation heuristics.

use crate::{device::BestPractices, message_ids, NonExhaustive, VendorChecks};
use ash::vk;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

/// Parameters of a memory allocation.
#[derive(Clone, Debug)]
pub struct MemoryAllocateInfo {
    pub allocation_size: vk::DeviceSize,
    pub memory_type_index: u32,
    /// Whether the allocation is dedicated to a single buffer or image.
    pub dedicated: bool,
    /// Whether the memory was imported from an external handle.
    pub imported: bool,
    /// The external handle types the memory can be exported to.
    pub export_handle_types: vk::ExternalMemoryHandleTypeFlags,
    pub _ne: NonExhaustive,
}

impl Default for MemoryAllocateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            allocation_size: 0,
            memory_type_index: 0,
            dedicated: false,
            imported: false,
            export_handle_types: vk::ExternalMemoryHandleTypeFlags::empty(),
            _ne: NonExhaustive(()),
        }
    }
}

/// The shadow state of a memory allocation.
#[derive(Debug)]
pub struct MemoryState {
    handle: vk::DeviceMemory,
    allocate_info: MemoryAllocateInfo,
}

impl MemoryState {
    #[inline]
    pub fn handle(&self) -> vk::DeviceMemory {
        self.handle
    }

    #[inline]
    pub fn allocate_info(&self) -> &MemoryAllocateInfo {
        &self.allocate_info
    }

    /// Returns whether the memory can be shared outside of the device, or is bound to a single
    /// resource. Such allocations can't be reused for anything else.
    fn is_special(&self) -> bool {
        let info = &self.allocate_info;

        info.dedicated || info.imported || !info.export_handle_types.is_empty()
    }
}

#[derive(Clone, Copy, Debug)]
struct MemoryFreeEvent {
    time: Instant,
    memory_type_index: u32,
    allocation_size: vk::DeviceSize,
}

/// The recently freed allocations of a device, oldest first.
#[derive(Debug, Default)]
pub(crate) struct MemoryFreeHistory {
    events: RwLock<VecDeque<MemoryFreeEvent>>,
}

impl MemoryFreeHistory {
    fn push(&self, event: MemoryFreeEvent) {
        self.events.write().push_back(event);
    }

    /// Drops the events older than `window`.
    fn prune(&self, now: Instant, window: Duration) {
        let is_stale = |event: &MemoryFreeEvent| now.saturating_duration_since(event.time) > window;

        let events = self.events.upgradable_read();

        if events.front().is_some_and(is_stale) {
            let mut events = RwLockUpgradableReadGuard::upgrade(events);

            while events.front().is_some_and(is_stale) {
                events.pop_front();
            }
        }
    }

    /// Returns the most recent event within `window` that freed memory of the same type that is
    /// at least `size` and at most `size + tolerance` bytes.
    fn find_reusable(
        &self,
        now: Instant,
        window: Duration,
        memory_type_index: u32,
        size: vk::DeviceSize,
        tolerance: vk::DeviceSize,
    ) -> Option<MemoryFreeEvent> {
        self.events
            .read()
            .iter()
            .rev()
            .take_while(|event| now.saturating_duration_since(event.time) <= window)
            .find(|event| {
                event.memory_type_index == memory_type_index
                    && event.allocation_size >= size
                    && event.allocation_size - size <= tolerance
            })
            .copied()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.events.read().len()
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    if elapsed < Duration::from_millis(5) {
        format!("{} microseconds", elapsed.as_micros())
    } else {
        format!(
            "{} seconds and {} milliseconds",
            elapsed.as_secs(),
            elapsed.subsec_millis(),
        )
    }
}

/// # Memory allocation
impl BestPractices {
    pub fn validate_allocate_memory(&self, allocate_info: &MemoryAllocateInfo) {
        self.validate_allocate_memory_at(allocate_info, Instant::now());
    }

    pub(crate) fn validate_allocate_memory_at(
        &self,
        allocate_info: &MemoryAllocateInfo,
        now: Instant,
    ) {
        const LOCATION: &str = "vkAllocateMemory";

        let num_memory_objects = self.memory.len();

        if num_memory_objects + 1 > self.config.max_memory_objects as usize {
            self.reporter.performance_warning(
                message_ids::ALLOCATE_MEMORY_TOO_MANY_OBJECTS,
                VendorChecks::empty(),
                LOCATION,
                &[],
                format_args!(
                    "this allocation would bring the number of live device memory objects to {}, \
                    above the recommended limit of {}; use an allocator that suballocates from \
                    larger blocks",
                    num_memory_objects + 1,
                    self.config.max_memory_objects,
                ),
            );
        }

        if allocate_info.allocation_size < self.config.min_allocation_size {
            self.reporter.performance_warning(
                message_ids::ALLOCATE_MEMORY_SMALL_ALLOCATION,
                VendorChecks::empty(),
                LOCATION,
                &[],
                format_args!(
                    "allocating {} bytes, which is smaller than the recommended minimum of {} \
                    bytes; suballocate small resources from larger allocations",
                    allocate_info.allocation_size, self.config.min_allocation_size,
                ),
            );
        }

        if self.reporter.vendor_enabled(VendorChecks::NVIDIA) && !allocate_info.dedicated {
            self.validate_memory_reuse(allocate_info, now);
        }
    }

    fn validate_memory_reuse(&self, allocate_info: &MemoryAllocateInfo, now: Instant) {
        let Some(event) = self.memory_free_history.find_reusable(
            now,
            self.config.memory_reuse_window,
            allocate_info.memory_type_index,
            allocate_info.allocation_size,
            self.config.memory_reuse_size_tolerance,
        ) else {
            return;
        };

        self.reporter.performance_warning(
            message_ids::ALLOCATE_MEMORY_REUSE_ALLOCATIONS,
            VendorChecks::NVIDIA,
            "vkAllocateMemory",
            &[],
            format_args!(
                "allocating {} bytes from memory type {}, but an allocation of {} bytes of the \
                same type was freed {} ago; reuse memory allocations instead of freeing and \
                allocating them again",
                allocate_info.allocation_size,
                allocate_info.memory_type_index,
                event.allocation_size,
                format_elapsed(now.saturating_duration_since(event.time)),
            ),
        );
    }

    pub fn record_allocate_memory(
        &self,
        memory: vk::DeviceMemory,
        allocate_info: MemoryAllocateInfo,
    ) {
        self.record_allocate_memory_at(memory, allocate_info, Instant::now());
    }

    pub(crate) fn record_allocate_memory_at(
        &self,
        memory: vk::DeviceMemory,
        allocate_info: MemoryAllocateInfo,
        now: Instant,
    ) {
        self.memory_free_history
            .prune(now, self.config.memory_reuse_window);
        self.memory.insert(
            memory,
            MemoryState {
                handle: memory,
                allocate_info,
            },
        );
    }

    pub fn record_free_memory(&self, memory: vk::DeviceMemory) {
        self.record_free_memory_at(memory, Instant::now());
    }

    pub(crate) fn record_free_memory_at(&self, memory: vk::DeviceMemory, now: Instant) {
        let Some(state) = self.memory.remove(memory) else {
            return;
        };

        if self.reporter.vendor_enabled(VendorChecks::NVIDIA) && !state.is_special() {
            self.memory_free_history.push(MemoryFreeEvent {
                time: now,
                memory_type_index: state.allocate_info.memory_type_index,
                allocation_size: state.allocate_info.allocation_size,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tests::test_layer_with, BestPracticesConfig};
    use ash::vk::Handle;

    const MIB: vk::DeviceSize = 1024 * 1024;

    fn allocation(size: vk::DeviceSize, memory_type_index: u32) -> MemoryAllocateInfo {
        MemoryAllocateInfo {
            allocation_size: size,
            memory_type_index,
            ..Default::default()
        }
    }

    #[test]
    fn small_allocation_and_object_count() {
        let (layer, messages) = test_layer_with(BestPracticesConfig {
            max_memory_objects: 2,
            ..Default::default()
        });

        layer.validate_allocate_memory(&allocation(1024, 0));
        assert_eq!(messages.ids(), [message_ids::ALLOCATE_MEMORY_SMALL_ALLOCATION]);
        messages.clear();

        for raw in 1..=2 {
            layer.validate_allocate_memory(&allocation(16 * MIB, 0));
            layer.record_allocate_memory(vk::DeviceMemory::from_raw(raw), allocation(16 * MIB, 0));
        }
        assert!(messages.ids().is_empty());

        layer.validate_allocate_memory(&allocation(16 * MIB, 0));
        assert_eq!(messages.ids(), [message_ids::ALLOCATE_MEMORY_TOO_MANY_OBJECTS]);
    }

    #[test]
    fn reuse_recently_freed_allocation() {
        let (layer, messages) = test_layer_with(BestPracticesConfig {
            vendor_checks: VendorChecks::NVIDIA,
            ..Default::default()
        });
        let start = Instant::now();
        let memory = vk::DeviceMemory::from_raw(1);

        layer.record_allocate_memory(memory, allocation(8 * MIB, 2));
        layer.record_free_memory_at(memory, start);

        // Different type, too small and too large freed allocations don't match.
        layer.validate_allocate_memory_at(&allocation(8 * MIB, 1), start);
        layer.validate_allocate_memory_at(&allocation(9 * MIB, 2), start);
        layer.validate_allocate_memory_at(&allocation(6 * MIB, 2), start);
        assert!(messages.ids().is_empty());

        layer.validate_allocate_memory_at(
            &allocation(8 * MIB - 4096, 2),
            start + Duration::from_millis(1),
        );
        assert_eq!(messages.ids(), [message_ids::ALLOCATE_MEMORY_REUSE_ALLOCATIONS]);
        assert!(messages.all()[0].description.contains("microseconds"));
        assert!(messages.all()[0].description.starts_with("[NVIDIA]"));
        messages.clear();

        layer.validate_allocate_memory_at(
            &allocation(8 * MIB, 2),
            start + Duration::from_millis(1500),
        );
        assert_eq!(messages.ids(), [message_ids::ALLOCATE_MEMORY_REUSE_ALLOCATIONS]);
        assert!(messages.all()[0].description.contains("1 seconds and 500 milliseconds"));
        messages.clear();

        // The event expires from the history.
        let later = start + Duration::from_secs(6);
        layer.validate_allocate_memory_at(&allocation(8 * MIB, 2), later);
        assert!(messages.ids().is_empty());
        assert_eq!(layer.memory_free_history.len(), 1);

        layer.record_allocate_memory_at(
            vk::DeviceMemory::from_raw(2),
            allocation(8 * MIB, 2),
            later,
        );
        assert_eq!(layer.memory_free_history.len(), 0);
    }

    #[test]
    fn dedicated_allocations_prune_history() {
        let (layer, messages) = crate::tests::test_layer(VendorChecks::NVIDIA);
        let start = Instant::now();

        for raw in 1..=100 {
            let memory = vk::DeviceMemory::from_raw(raw);
            layer.record_allocate_memory_at(memory, allocation(MIB, 0), start);
            layer.record_free_memory_at(memory, start);
        }
        assert_eq!(layer.memory_free_history.len(), 100);

        let dedicated = MemoryAllocateInfo {
            dedicated: true,
            ..allocation(MIB, 0)
        };
        let later = start + Duration::from_secs(60);
        layer.validate_allocate_memory_at(&dedicated, later);
        layer.record_allocate_memory_at(vk::DeviceMemory::from_raw(101), dedicated, later);

        assert!(messages.ids().is_empty());
        assert_eq!(layer.memory_free_history.len(), 0);
    }

    #[test]
    fn special_allocations_are_not_remembered() {
        let (layer, _) = crate::tests::test_layer(VendorChecks::NVIDIA);
        let now = Instant::now();

        for (raw, info) in [
            MemoryAllocateInfo {
                dedicated: true,
                ..allocation(MIB, 0)
            },
            MemoryAllocateInfo {
                imported: true,
                ..allocation(MIB, 0)
            },
            MemoryAllocateInfo {
                export_handle_types: vk::ExternalMemoryHandleTypeFlags::OPAQUE_FD,
                ..allocation(MIB, 0)
            },
            allocation(MIB, 0),
        ]
        .into_iter()
        .enumerate()
        {
            let memory = vk::DeviceMemory::from_raw(raw as u64 + 1);
            layer.record_allocate_memory(memory, info);
            layer.record_free_memory_at(memory, now);
        }

        assert_eq!(layer.memory_free_history.len(), 1);
    }
}
