//! Synchronization primitives: semaphores, fences and events.

use crate::{device::BestPractices, message_ids, VendorChecks};
use ash::vk;
use std::sync::atomic::{AtomicU32, Ordering};

fn decrement(counter: &AtomicU32) {
    let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
        count.checked_sub(1)
    });
}

/// # Semaphores and fences
impl BestPractices {
    pub fn validate_create_semaphore(&self) {
        if !self.reporter.vendor_enabled(VendorChecks::AMD) {
            return;
        }

        let num_semaphores = self.num_semaphores.load(Ordering::Relaxed);

        if num_semaphores > self.config.max_semaphores {
            self.reporter.performance_warning(
                message_ids::SYNC_OBJECTS_HIGH_NUMBER_OF_SEMAPHORES,
                VendorChecks::AMD,
                "vkCreateSemaphore",
                &[],
                format_args!(
                    "{} semaphores are already in use; minimize the amount of queue \
                    synchronization, every semaphore has a CPU and GPU cost",
                    num_semaphores,
                ),
            );
        }
    }

    pub fn record_create_semaphore(&self, _semaphore: vk::Semaphore) {
        self.num_semaphores.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_destroy_semaphore(&self, semaphore: vk::Semaphore) {
        if semaphore != vk::Semaphore::null() {
            decrement(&self.num_semaphores);
        }
    }

    pub fn validate_create_fence(&self) {
        if !self.reporter.vendor_enabled(VendorChecks::AMD) {
            return;
        }

        let num_fences = self.num_fences.load(Ordering::Relaxed);

        if num_fences > self.config.max_fences {
            self.reporter.performance_warning(
                message_ids::SYNC_OBJECTS_HIGH_NUMBER_OF_FENCES,
                VendorChecks::AMD,
                "vkCreateFence",
                &[],
                format_args!(
                    "{} fences are already in use; minimize the amount of CPU-GPU \
                    synchronization, every fence has a CPU and GPU cost",
                    num_fences,
                ),
            );
        }
    }

    pub fn record_create_fence(&self, _fence: vk::Fence) {
        self.num_fences.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_destroy_fence(&self, fence: vk::Fence) {
        if fence != vk::Fence::null() {
            decrement(&self.num_fences);
        }
    }
}

/// # Events
///
/// The device-wide signaled state of every event, as set by the host and by submitted command
/// buffers.
impl BestPractices {
    pub fn record_create_event(&self, event: vk::Event) {
        self.events.lock().insert(event, false);
    }

    pub fn record_destroy_event(&self, event: vk::Event) {
        self.events.lock().remove(&event);
    }

    /// Records `vkSetEvent`.
    pub fn record_set_event(&self, event: vk::Event) {
        if let Some(signaled) = self.events.lock().get_mut(&event) {
            *signaled = true;
        }
    }

    /// Records `vkResetEvent`.
    pub fn record_reset_event(&self, event: vk::Event) {
        if let Some(signaled) = self.events.lock().get_mut(&event) {
            *signaled = false;
        }
    }

    /// Returns whether a tracked event is signaled.
    pub(crate) fn is_event_signaled(&self, event: vk::Event) -> Option<bool> {
        self.events.lock().get(&event).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tests::test_layer_with, BestPracticesConfig};
    use ash::vk::Handle;

    #[test]
    fn too_many_semaphores_and_fences() {
        let (layer, messages) = test_layer_with(BestPracticesConfig {
            vendor_checks: VendorChecks::AMD,
            max_semaphores: 1,
            max_fences: 1,
            ..Default::default()
        });

        for raw in 1..=2 {
            layer.validate_create_semaphore();
            layer.record_create_semaphore(vk::Semaphore::from_raw(raw));
            layer.validate_create_fence();
            layer.record_create_fence(vk::Fence::from_raw(raw));
        }
        assert!(messages.ids().is_empty());

        layer.validate_create_semaphore();
        layer.validate_create_fence();
        assert_eq!(
            messages.ids(),
            [
                message_ids::SYNC_OBJECTS_HIGH_NUMBER_OF_SEMAPHORES,
                message_ids::SYNC_OBJECTS_HIGH_NUMBER_OF_FENCES,
            ],
        );
        messages.clear();

        layer.record_destroy_semaphore(vk::Semaphore::from_raw(1));
        layer.record_destroy_fence(vk::Fence::null());
        layer.validate_create_semaphore();
        layer.validate_create_fence();
        assert_eq!(messages.ids(), [message_ids::SYNC_OBJECTS_HIGH_NUMBER_OF_FENCES]);
    }

    #[test]
    fn host_event_state() {
        let (layer, _) = crate::tests::test_layer(VendorChecks::empty());
        let event = vk::Event::from_raw(5);

        assert_eq!(layer.is_event_signaled(event), None);
        layer.record_set_event(event);
        assert_eq!(layer.is_event_signaled(event), None);

        layer.record_create_event(event);
        assert_eq!(layer.is_event_signaled(event), Some(false));
        layer.record_set_event(event);
        assert_eq!(layer.is_event_signaled(event), Some(true));
        layer.record_reset_event(event);
        assert_eq!(layer.is_event_signaled(event), Some(false));

        layer.record_destroy_event(event);
        assert_eq!(layer.is_event_signaled(event), None);
    }
}
