//! Queues, submissions and presentation.
//!
//! Submitting a command buffer runs its [`QueueOperation`]s against the queue family of the
//! queue, in the order the command buffers appear in the submission.
//!
//! [`QueueOperation`]: crate::command_buffer::QueueOperation

use crate::{device::BestPractices, message_ids, NonExhaustive, VendorChecks};
use ash::vk;
use foldhash::HashMap;
use std::sync::atomic::Ordering;

/// The shadow state of a queue.
#[derive(Debug)]
pub struct QueueState {
    handle: vk::Queue,
    queue_family_index: u32,
}

impl QueueState {
    #[inline]
    pub fn handle(&self) -> vk::Queue {
        self.handle
    }

    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }
}

/// One batch of `vkQueueSubmit` or `vkQueueSubmit2`. Semaphores aren't tracked.
#[derive(Clone, Debug, Default)]
pub struct SubmitInfo {
    pub command_buffers: Vec<vk::CommandBuffer>,
    pub _ne: NonExhaustive,
}

/// # Queues
impl BestPractices {
    /// Records `vkGetDeviceQueue`.
    pub fn record_get_device_queue(
        &self,
        queue: vk::Queue,
        queue_family_index: u32,
        _queue_index: u32,
    ) {
        self.queues.insert(
            queue,
            QueueState {
                handle: queue,
                queue_family_index,
            },
        );
    }

    pub fn validate_queue_submit(&self, queue: vk::Queue, submits: &[SubmitInfo]) {
        // The state of the events as left by the earlier command buffers of this call.
        let mut signaled_events: HashMap<vk::Event, bool> = HashMap::default();

        for &command_buffer in submits.iter().flat_map(|submit| &submit.command_buffers) {
            let Some(state) = self.command_buffer(command_buffer) else {
                continue;
            };
            let state = state.lock();

            for (&event, event_state) in state.events() {
                if event_state.first_state_change_is_signal {
                    let signaled = signaled_events
                        .get(&event)
                        .copied()
                        .or_else(|| self.is_event_signaled(event))
                        .unwrap_or(false);

                    if signaled {
                        self.reporter.warning(
                            message_ids::EVENT_SIGNAL_SIGNALED_EVENT,
                            "vkQueueSubmit",
                            &[queue.into(), command_buffer.into(), event.into()],
                            format_args!(
                                "the command buffer signals an event that is already signaled \
                                when it executes; signaling a signaled event has no effect",
                            ),
                        );
                    }
                }

                signaled_events.insert(event, event_state.signaled);
            }
        }
    }

    pub fn record_queue_submit(&self, queue: vk::Queue, submits: &[SubmitInfo]) {
        let queue_family_index = match self.queues.get(queue) {
            Some(queue_state) => Some(queue_state.queue_family_index),
            None => {
                log::debug!(
                    "queue operations of a submission to untracked queue {:?} are skipped",
                    queue,
                );
                None
            }
        };

        for &command_buffer in submits.iter().flat_map(|submit| &submit.command_buffers) {
            let Some(state) = self.command_buffer(command_buffer) else {
                continue;
            };
            let mut state = state.lock();
            state.num_submits += 1;

            if let Some(queue_family_index) = queue_family_index {
                for operation in state.queue_operations() {
                    self.execute_queue_operation(operation, queue_family_index);
                }
            }

            let mut events = self.events.lock();

            for (&event, event_state) in state.events() {
                events.insert(event, event_state.signaled);
            }
        }

        let num_submits = u32::try_from(submits.len()).unwrap_or(u32::MAX);
        self.num_submissions_this_frame
            .fetch_add(num_submits, Ordering::Relaxed);
    }

    pub fn validate_queue_present(&self, queue: vk::Queue) {
        if !self.reporter.vendor_enabled(VendorChecks::AMD) {
            return;
        }

        let num_submissions = self.num_submissions_this_frame.load(Ordering::Relaxed);

        if num_submissions > self.config.max_submissions_per_frame {
            self.reporter.performance_warning(
                message_ids::SUBMISSION_REDUCE_NUMBER_OF_SUBMISSIONS,
                VendorChecks::AMD,
                "vkQueuePresentKHR",
                &[queue.into()],
                format_args!(
                    "{} submissions were made this frame, more than the recommended maximum of \
                    {}; each submission has a CPU and GPU cost, batch command buffers into fewer \
                    submissions",
                    num_submissions, self.config.max_submissions_per_frame,
                ),
            );
        }
    }

    /// Records `vkQueuePresentKHR`, which ends the frame.
    pub fn record_queue_present(&self, _queue: vk::Queue) {
        self.num_barriers_this_frame.store(0, Ordering::Relaxed);
        self.num_submissions_this_frame.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        command_buffer::tests::primary,
        image::{ImageCreateInfo, ImageSubresourceUsage},
        tests::{test_layer, test_layer_with},
        BestPracticesConfig,
    };
    use ash::vk::Handle;

    fn submit(command_buffers: &[vk::CommandBuffer]) -> Vec<SubmitInfo> {
        vec![SubmitInfo {
            command_buffers: command_buffers.to_vec(),
            ..Default::default()
        }]
    }

    #[test]
    fn event_state_across_batch() {
        let (layer, messages) = test_layer(VendorChecks::empty());
        let queue = vk::Queue::from_raw(1);
        let (first, second) = (primary(&layer, 1), primary(&layer, 2));
        let event = vk::Event::from_raw(3);
        layer.record_create_event(event);

        layer.record_cmd_set_event(first, event);
        layer.record_cmd_set_event(second, event);

        layer.validate_queue_submit(queue, &submit(&[first]));
        assert!(messages.ids().is_empty());

        layer.validate_queue_submit(queue, &submit(&[first, second]));
        assert_eq!(messages.ids(), [message_ids::EVENT_SIGNAL_SIGNALED_EVENT]);
        messages.clear();

        // Once submitted, the device-wide state is signaled.
        layer.record_queue_submit(queue, &submit(&[first]));
        assert_eq!(layer.is_event_signaled(event), Some(true));
        layer.validate_queue_submit(queue, &submit(&[second]));
        assert_eq!(messages.ids(), [message_ids::EVENT_SIGNAL_SIGNALED_EVENT]);
        messages.clear();

        layer.record_reset_event(event);
        layer.validate_queue_submit(queue, &submit(&[second]));
        assert!(messages.ids().is_empty());
    }

    #[test]
    fn submission_runs_queue_operations() {
        let (layer, _) = test_layer(VendorChecks::empty());
        let queue = vk::Queue::from_raw(1);
        let image = vk::Image::from_raw(4);
        let command_buffer = primary(&layer, 1);
        layer.record_get_device_queue(queue, 2, 0);
        layer.record_create_image(
            image,
            ImageCreateInfo {
                format: vk::Format::R8G8B8A8_UNORM,
                ..Default::default()
            },
        );
        layer.record_cmd_copy_buffer_to_image(
            command_buffer,
            image,
            &[vk::BufferImageCopy {
                image_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                },
                ..Default::default()
            }],
        );

        // Unknown queues don't run anything.
        layer.record_queue_submit(vk::Queue::from_raw(9), &submit(&[command_buffer]));
        let image_state = layer.images.get(image).unwrap();
        assert_eq!(image_state.usage_type(0, 0), ImageSubresourceUsage::Undefined);

        layer.record_queue_submit(queue, &submit(&[command_buffer]));
        assert_eq!(image_state.usage_type(0, 0), ImageSubresourceUsage::CopyWrite);
        assert_eq!(image_state.last_queue_family_index(0, 0), 2);
        assert_eq!(
            layer.command_buffer(command_buffer).unwrap().lock().num_submits(),
            2,
        );
    }

    #[test]
    fn too_many_submissions() {
        let (layer, messages) = test_layer_with(BestPracticesConfig {
            vendor_checks: VendorChecks::AMD,
            max_submissions_per_frame: 2,
            ..Default::default()
        });
        let queue = vk::Queue::from_raw(1);
        let command_buffer = primary(&layer, 1);

        for _ in 0..3 {
            layer.record_queue_submit(queue, &submit(&[command_buffer]));
        }
        layer.validate_queue_present(queue);
        assert_eq!(
            messages.ids(),
            [message_ids::SUBMISSION_REDUCE_NUMBER_OF_SUBMISSIONS],
        );
        messages.clear();

        layer.record_queue_present(queue);
        layer.validate_queue_present(queue);
        assert!(messages.ids().is_empty());
    }
}
