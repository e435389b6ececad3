use crate::{
    command_buffer::{
        is_full_clear, AttachmentTracker, CommandBufferSubState, EventSignalingState,
        QueueOperation,
    },
    device::BestPractices,
    linear_map::LinearMap,
    message_ids,
    zcull::ZcullState,
};
use ash::vk;

const LOCATION: &str = "vkCmdExecuteCommands";

/// # Secondary command buffers
impl BestPractices {
    pub fn validate_cmd_execute_commands(
        &self,
        command_buffer: vk::CommandBuffer,
        secondary_command_buffers: &[vk::CommandBuffer],
    ) {
        for &secondary in secondary_command_buffers {
            if secondary == command_buffer {
                continue;
            }

            let Some(secondary_state) = self.command_buffer(secondary) else {
                continue;
            };
            let (early_clears, events) = {
                let secondary_state = secondary_state.lock();

                (
                    secondary_state.attachments.early_clears.clone(),
                    secondary_state.events.clone(),
                )
            };

            let Some(state) = self.command_buffer(command_buffer) else {
                return;
            };
            let state = state.lock();

            if let Some(render_pass) = &state.render_pass {
                for clear in &early_clears {
                    if is_full_clear(state.is_secondary(), render_pass.render_area, &clear.rects) {
                        self.validate_clear_attachment(
                            &state,
                            clear.attachment,
                            clear.aspects,
                            LOCATION,
                        );
                    }
                }
            }

            for (&event, secondary_event) in events.iter() {
                let signaled = state
                    .events
                    .get(&event)
                    .is_some_and(|event_state| event_state.signaled);

                if signaled && secondary_event.first_state_change_is_signal {
                    self.reporter.warning(
                        message_ids::EVENT_SIGNAL_SIGNALED_EVENT,
                        LOCATION,
                        &[command_buffer.into(), secondary.into(), event.into()],
                        format_args!(
                            "the secondary command buffer signals the event, which the primary \
                            command buffer already signaled; signaling a signaled event has no \
                            effect",
                        ),
                    );
                }
            }
        }
    }

    pub fn record_cmd_execute_commands(
        &self,
        command_buffer: vk::CommandBuffer,
        secondary_command_buffers: &[vk::CommandBuffer],
    ) {
        for &secondary in secondary_command_buffers {
            if secondary == command_buffer {
                continue;
            }

            let Some(secondary_state) = self.command_buffer(secondary) else {
                continue;
            };
            let recording = SecondaryRecording::new(&secondary_state.lock());

            let Some(state) = self.command_buffer(command_buffer) else {
                return;
            };

            recording.merge_into(&mut state.lock());
        }
    }
}

/// What a primary command buffer inherits from a secondary one it executes.
struct SecondaryRecording {
    has_draw_cmd: bool,
    queue_operations: Vec<QueueOperation>,
    attachments: AttachmentTracker,
    events: LinearMap<vk::Event, EventSignalingState>,
    zcull: ZcullState,
}

impl SecondaryRecording {
    fn new(secondary: &CommandBufferSubState) -> Self {
        SecondaryRecording {
            has_draw_cmd: secondary.has_draw_cmd,
            queue_operations: secondary.queue_operations.clone(),
            attachments: secondary.attachments.clone(),
            events: secondary.events.clone(),
            zcull: secondary.zcull.clone(),
        }
    }

    fn merge_into(self, state: &mut CommandBufferSubState) {
        if state.is_secondary() && self.has_draw_cmd {
            state.has_draw_cmd = true;
        }

        state.queue_operations.extend(self.queue_operations);

        let is_secondary = state.is_secondary();

        if let Some(render_pass) = &state.render_pass {
            for clear in &self.attachments.early_clears {
                if is_full_clear(is_secondary, render_pass.render_area, &clear.rects) {
                    state.attachments.record_full_clear(
                        clear.attachment,
                        clear.color_attachment,
                        clear.aspects,
                        &clear.rects,
                        is_secondary,
                    );
                } else {
                    state
                        .attachments
                        .record_attachment_access(clear.attachment, clear.aspects);
                }
            }
        }

        let tracker = &mut state.attachments;
        tracker.merge_touches(&self.attachments);
        tracker.num_draw_calls_depth_only += self.attachments.num_draw_calls_depth_only;
        tracker.num_draw_calls_depth_equal_compare +=
            self.attachments.num_draw_calls_depth_equal_compare;

        for (&event, &secondary_event) in self.events.iter() {
            match state.events.get_mut(&event) {
                Some(event_state) => event_state.signaled = secondary_event.signaled,
                None => state.events.insert(event, secondary_event),
            }
        }

        state.zcull.merge_secondary(&self.zcull);
    }
}
