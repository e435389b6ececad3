use crate::{
    command_buffer::EventSignalingState, device::BestPractices, message_ids, NonExhaustive,
    VendorChecks,
};
use ash::vk;
use std::sync::atomic::Ordering;

/// # Synchronization commands
impl BestPractices {
    pub fn validate_cmd_pipeline_barrier(
        &self,
        command_buffer: vk::CommandBuffer,
        dependency_info: &DependencyInfo,
    ) {
        const LOCATION: &str = "vkCmdPipelineBarrier";

        if self.reporter.vendor_enabled(VendorChecks::AMD) {
            let num_barriers = self
                .num_barriers_this_frame
                .load(Ordering::Relaxed)
                .saturating_add(dependency_info.barrier_count());

            if num_barriers > self.config.max_barriers_per_frame {
                self.reporter.performance_warning(
                    message_ids::CMD_BUFFER_HIGH_BARRIER_COUNT,
                    VendorChecks::AMD,
                    LOCATION,
                    &[command_buffer.into()],
                    format_args!(
                        "{} barriers were recorded this frame, more than the recommended \
                        maximum of {}; batch barriers together and avoid redundant ones",
                        num_barriers, self.config.max_barriers_per_frame,
                    ),
                );
            }
        }

        if !self.reporter.vendor_enabled(VendorChecks::NVIDIA) {
            return;
        }

        let Some(state) = self.command_buffer(command_buffer) else {
            return;
        };
        let state = state.lock();

        for barrier in dependency_info
            .image_memory_barriers
            .iter()
            .filter(|barrier| barrier.discards_contents())
        {
            let Some(image) = self.images.get(barrier.image) else {
                continue;
            };

            self.validate_zcull(
                &state.zcull,
                command_buffer,
                barrier.image,
                &image.normalize_range(&barrier.subresource_range),
                LOCATION,
            );
        }
    }

    pub fn record_cmd_pipeline_barrier(
        &self,
        command_buffer: vk::CommandBuffer,
        dependency_info: &DependencyInfo,
    ) {
        self.num_barriers_this_frame
            .fetch_add(dependency_info.barrier_count(), Ordering::Relaxed);

        if !self.reporter.vendor_enabled(VendorChecks::NVIDIA) {
            return;
        }

        let Some(state) = self.command_buffer(command_buffer) else {
            return;
        };
        let mut state = state.lock();

        for barrier in dependency_info
            .image_memory_barriers
            .iter()
            .filter(|barrier| barrier.discards_contents())
        {
            if let Some(image) = self.images.get(barrier.image) {
                let range = image.normalize_range(&barrier.subresource_range);
                state.zcull.reset_direction(barrier.image, &range);
            }
        }
    }

    pub fn validate_cmd_set_event(&self, command_buffer: vk::CommandBuffer, event: vk::Event) {
        let Some(state) = self.command_buffer(command_buffer) else {
            return;
        };

        if state
            .lock()
            .events
            .get(&event)
            .is_some_and(|event_state| event_state.signaled)
        {
            self.reporter.warning(
                message_ids::EVENT_SIGNAL_SIGNALED_EVENT,
                "vkCmdSetEvent",
                &[command_buffer.into(), event.into()],
                format_args!(
                    "the event is signaled, it was already signaled by an earlier command of \
                    the command buffer; signaling a signaled event has no effect",
                ),
            );
        }
    }

    pub fn record_cmd_set_event(&self, command_buffer: vk::CommandBuffer, event: vk::Event) {
        if let Some(state) = self.command_buffer(command_buffer) {
            state
                .lock()
                .events
                .get_or_insert_with(event, || EventSignalingState::new(true))
                .signaled = true;
        }
    }

    pub fn record_cmd_reset_event(&self, command_buffer: vk::CommandBuffer, event: vk::Event) {
        if let Some(state) = self.command_buffer(command_buffer) {
            state
                .lock()
                .events
                .get_or_insert_with(event, || EventSignalingState::new(false))
                .signaled = false;
        }
    }
}

/// Parameters of `vkCmdPipelineBarrier` and `vkCmdPipelineBarrier2`.
///
/// Only image barriers are inspected. Buffer barriers are only counted.
#[derive(Clone, Debug, Default)]
pub struct DependencyInfo {
    pub buffer_memory_barrier_count: u32,
    pub image_memory_barriers: Vec<ImageMemoryBarrier>,
    pub _ne: NonExhaustive,
}

impl DependencyInfo {
    fn barrier_count(&self) -> u32 {
        let image_barriers = u32::try_from(self.image_memory_barriers.len()).unwrap_or(u32::MAX);

        self.buffer_memory_barrier_count
            .saturating_add(image_barriers)
    }
}

/// An image memory barrier.
#[derive(Clone, Debug)]
pub struct ImageMemoryBarrier {
    pub image: vk::Image,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_queue_family_index: u32,
    pub dst_queue_family_index: u32,
    pub subresource_range: vk::ImageSubresourceRange,
    pub _ne: NonExhaustive,
}

impl ImageMemoryBarrier {
    /// Returns whether the barrier transitions from `UNDEFINED`, which discards the contents.
    #[inline]
    fn discards_contents(&self) -> bool {
        self.old_layout == vk::ImageLayout::UNDEFINED
            && self.new_layout != vk::ImageLayout::UNDEFINED
    }
}

impl Default for ImageMemoryBarrier {
    #[inline]
    fn default() -> Self {
        Self {
            image: vk::Image::null(),
            old_layout: vk::ImageLayout::UNDEFINED,
            new_layout: vk::ImageLayout::UNDEFINED,
            src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::empty(),
                base_mip_level: 0,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: 0,
                layer_count: vk::REMAINING_ARRAY_LAYERS,
            },
            _ne: NonExhaustive(()),
        }
    }
}
