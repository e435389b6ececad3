//! Shadow state of command buffers.
//!
//! Each tracked command buffer owns a [`CommandBufferSubState`], which accumulates everything
//! the heuristics need to know about the commands recorded so far: the render pass instance being
//! recorded, the attachments touched in it, the Z-cull state, events, push constants, and the
//! [`QueueOperation`]s to run when the command buffer is submitted.

pub use self::{
    commands::{ClearAttachment, DependencyInfo, ImageMemoryBarrier},
    deferred::QueueOperation,
    events::EventSignalingState,
};
pub(crate) use self::{
    attachments::{is_full_clear, AttachmentTracker, EarlyClear},
    push_constants::{uncovered_bytes, PushConstantData},
};
use crate::{
    buffer::BufferState,
    descriptor_set::DescriptorSetState,
    device::BestPractices,
    image::{ImageState, ImageSubresourceUsage, SubresourceRange},
    linear_map::LinearMap,
    message_ids,
    pipeline::PipelineState,
    render_pass::{ActiveRenderPass, RenderingFormats},
    zcull::ZcullState,
    NonExhaustive, VendorChecks,
};
use ash::vk;
use parking_lot::Mutex;
use std::sync::Arc;

mod attachments;
mod commands;
mod deferred;
mod events;
mod push_constants;

/// The per-command-buffer state of the layer.
#[derive(Debug)]
pub struct CommandBufferSubState {
    pub(crate) handle: vk::CommandBuffer,
    pub(crate) pool: vk::CommandPool,
    pub(crate) level: vk::CommandBufferLevel,

    /// How many times the current recording was submitted.
    pub(crate) num_submits: u32,
    pub(crate) has_draw_cmd: bool,
    pub(crate) small_indexed_draw_call_count: u32,

    pub(crate) render_pass: Option<ActiveRenderPass>,
    pub(crate) attachments: AttachmentTracker,
    pub(crate) zcull: ZcullState,
    pub(crate) events: LinearMap<vk::Event, EventSignalingState>,
    pub(crate) push_constants: Vec<PushConstantData>,
    pub(crate) queue_operations: Vec<QueueOperation>,

    pub(crate) graphics: PipelineBinding,
    pub(crate) compute: PipelineBinding,
    pub(crate) index_buffer: Option<IndexBufferBinding>,
}

/// The pipeline and descriptor sets bound to one bind point.
#[derive(Clone, Debug, Default)]
pub(crate) struct PipelineBinding {
    pub(crate) pipeline: Option<Arc<PipelineState>>,
    /// Indexed by set number.
    pub(crate) descriptor_sets: Vec<Option<Arc<DescriptorSetState>>>,
}

#[derive(Clone, Debug)]
pub(crate) struct IndexBufferBinding {
    pub(crate) buffer: Arc<BufferState>,
    pub(crate) offset: vk::DeviceSize,
    pub(crate) index_type: vk::IndexType,
}

impl CommandBufferSubState {
    fn new(
        handle: vk::CommandBuffer,
        pool: vk::CommandPool,
        level: vk::CommandBufferLevel,
    ) -> Self {
        CommandBufferSubState {
            handle,
            pool,
            level,
            num_submits: 0,
            has_draw_cmd: false,
            small_indexed_draw_call_count: 0,
            render_pass: None,
            attachments: AttachmentTracker::default(),
            zcull: ZcullState::default(),
            events: LinearMap::new(),
            push_constants: Vec::new(),
            queue_operations: Vec::new(),
            graphics: PipelineBinding::default(),
            compute: PipelineBinding::default(),
            index_buffer: None,
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.handle
    }

    #[inline]
    pub fn level(&self) -> vk::CommandBufferLevel {
        self.level
    }

    #[inline]
    pub fn is_secondary(&self) -> bool {
        self.level == vk::CommandBufferLevel::SECONDARY
    }

    #[inline]
    pub fn num_submits(&self) -> u32 {
        self.num_submits
    }

    #[inline]
    pub fn has_draw_cmd(&self) -> bool {
        self.has_draw_cmd
    }

    /// Returns the operations that run when the command buffer is submitted, in recording order.
    #[inline]
    pub fn queue_operations(&self) -> &[QueueOperation] {
        &self.queue_operations
    }

    #[inline]
    pub fn events(&self) -> impl Iterator<Item = (&vk::Event, &EventSignalingState)> {
        self.events.iter()
    }

    /// Returns the command buffer to its initial state.
    ///
    /// The render pass state and the Z-cull state are kept: a render pass always begins before
    /// they are used again.
    pub(crate) fn reset(&mut self) {
        self.num_submits = 0;
        self.has_draw_cmd = false;
        self.small_indexed_draw_call_count = 0;
        self.events.clear();
        self.push_constants.clear();
        self.queue_operations.clear();
        self.graphics = PipelineBinding::default();
        self.compute = PipelineBinding::default();
        self.index_buffer = None;
    }

    pub(crate) fn binding(&self, bind_point: vk::PipelineBindPoint) -> Option<&PipelineBinding> {
        match bind_point {
            vk::PipelineBindPoint::GRAPHICS => Some(&self.graphics),
            vk::PipelineBindPoint::COMPUTE => Some(&self.compute),
            _ => None,
        }
    }

    pub(crate) fn binding_mut(
        &mut self,
        bind_point: vk::PipelineBindPoint,
    ) -> Option<&mut PipelineBinding> {
        match bind_point {
            vk::PipelineBindPoint::GRAPHICS => Some(&mut self.graphics),
            vk::PipelineBindPoint::COMPUTE => Some(&mut self.compute),
            _ => None,
        }
    }

    /// Queues a usage of every subresource of `range`.
    pub(crate) fn queue_image_usage(
        &mut self,
        command: &'static str,
        image: &Arc<ImageState>,
        range: &SubresourceRange,
        usage: ImageSubresourceUsage,
    ) {
        self.queue_operations
            .extend(
                range
                    .subresources()
                    .map(|(array_layer, mip_level)| QueueOperation::ImageUsage {
                        command,
                        image: image.clone(),
                        array_layer,
                        mip_level,
                        usage,
                    }),
            );
    }
}

/// Parameters of `vkBeginCommandBuffer`.
#[derive(Clone, Debug, Default)]
pub struct CommandBufferBeginInfo {
    pub flags: vk::CommandBufferUsageFlags,
    /// Required for secondary command buffers.
    pub inheritance_info: Option<CommandBufferInheritanceInfo>,
    pub _ne: NonExhaustive,
}

/// The render pass instance a secondary command buffer continues.
#[derive(Clone, Debug)]
pub struct CommandBufferInheritanceInfo {
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
    pub framebuffer: vk::Framebuffer,
    /// The attachment formats, when continuing a dynamic rendering instance.
    pub rendering: Option<RenderingFormats>,
    pub _ne: NonExhaustive,
}

impl Default for CommandBufferInheritanceInfo {
    #[inline]
    fn default() -> Self {
        Self {
            render_pass: vk::RenderPass::null(),
            subpass: 0,
            framebuffer: vk::Framebuffer::null(),
            rendering: None,
            _ne: NonExhaustive(()),
        }
    }
}

/// # Command buffer lifetime
impl BestPractices {
    pub fn record_allocate_command_buffers(
        &self,
        pool: vk::CommandPool,
        level: vk::CommandBufferLevel,
        command_buffers: &[vk::CommandBuffer],
    ) {
        for &command_buffer in command_buffers {
            self.command_buffers.insert(
                command_buffer,
                Mutex::new(CommandBufferSubState::new(command_buffer, pool, level)),
            );
        }
    }

    pub fn record_free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) {
        for &command_buffer in command_buffers {
            self.command_buffers.remove(command_buffer);
        }
    }

    pub fn record_reset_command_pool(&self, pool: vk::CommandPool) {
        for command_buffer in self
            .command_buffers
            .filter(|command_buffer| command_buffer.lock().pool == pool)
        {
            command_buffer.lock().reset();
        }
    }

    pub fn record_destroy_command_pool(&self, pool: vk::CommandPool) {
        self.command_buffers
            .remove_if(|command_buffer| command_buffer.lock().pool == pool);
    }

    pub fn record_reset_command_buffer(&self, command_buffer: vk::CommandBuffer) {
        if let Some(state) = self.command_buffer(command_buffer) {
            state.lock().reset();
        }
    }

    pub fn validate_begin_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        begin_info: &CommandBufferBeginInfo,
    ) {
        const LOCATION: &str = "vkBeginCommandBuffer";

        if begin_info
            .flags
            .contains(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE)
            && self.reporter.vendor_enabled(VendorChecks::ARM)
        {
            self.reporter.performance_warning(
                message_ids::BEGIN_COMMAND_BUFFER_SIMULTANEOUS_USE,
                VendorChecks::ARM,
                LOCATION,
                &[command_buffer.into()],
                format_args!(
                    "the command buffer is begun with SIMULTANEOUS_USE, which can disable \
                    optimizations in the driver; avoid it unless the command buffer really is \
                    pending on several queues at once",
                ),
            );
        }

        if !self.reporter.vendor_enabled(VendorChecks::NVIDIA) {
            return;
        }

        let Some(state) = self.command_buffer(command_buffer) else {
            return;
        };

        if state.lock().num_submits == 1
            && !begin_info
                .flags
                .contains(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)
        {
            self.reporter.performance_warning(
                message_ids::BEGIN_COMMAND_BUFFER_ONE_TIME_SUBMIT,
                VendorChecks::NVIDIA,
                LOCATION,
                &[command_buffer.into()],
                format_args!(
                    "the previous recording of the command buffer was submitted exactly once; \
                    use ONE_TIME_SUBMIT for command buffers that are only submitted once",
                ),
            );
        }
    }

    pub fn record_begin_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        begin_info: &CommandBufferBeginInfo,
    ) {
        let Some(state) = self.command_buffer(command_buffer) else {
            return;
        };
        let mut state = state.lock();

        state.reset();
        state.render_pass = None;

        if !state.is_secondary()
            || !begin_info
                .flags
                .contains(vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE)
        {
            return;
        }

        let Some(inheritance_info) = &begin_info.inheritance_info else {
            return;
        };

        state.attachments.reset();
        state.render_pass = if let Some(render_pass) =
            self.render_passes.get(inheritance_info.render_pass)
        {
            let image_views = self.framebuffer_attachments(inheritance_info.framebuffer, &[]);

            Some(ActiveRenderPass::new_inherited_render_pass(
                render_pass,
                inheritance_info.subpass,
                &image_views,
            ))
        } else {
            inheritance_info
                .rendering
                .as_ref()
                .map(ActiveRenderPass::new_inherited_rendering)
        };
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{image::ImageCreateInfo, tests::test_layer};
    use ash::vk::Handle;

    pub(crate) fn primary(layer: &BestPractices, raw: u64) -> vk::CommandBuffer {
        let command_buffer = vk::CommandBuffer::from_raw(raw);
        layer.record_allocate_command_buffers(
            vk::CommandPool::from_raw(1),
            vk::CommandBufferLevel::PRIMARY,
            &[command_buffer],
        );
        layer.record_begin_command_buffer(command_buffer, &CommandBufferBeginInfo::default());

        command_buffer
    }

    #[test]
    fn one_time_submit_hint() {
        let (layer, messages) = test_layer(VendorChecks::NVIDIA | VendorChecks::ARM);
        let command_buffer = primary(&layer, 1);

        layer.validate_begin_command_buffer(
            command_buffer,
            &CommandBufferBeginInfo {
                flags: vk::CommandBufferUsageFlags::SIMULTANEOUS_USE,
                ..Default::default()
            },
        );
        assert_eq!(
            messages.ids(),
            [message_ids::BEGIN_COMMAND_BUFFER_SIMULTANEOUS_USE],
        );
        messages.clear();

        layer.command_buffer(command_buffer).unwrap().lock().num_submits = 1;
        layer.validate_begin_command_buffer(
            command_buffer,
            &CommandBufferBeginInfo {
                flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
                ..Default::default()
            },
        );
        assert!(messages.ids().is_empty());

        layer.validate_begin_command_buffer(command_buffer, &CommandBufferBeginInfo::default());
        assert_eq!(messages.ids(), [message_ids::BEGIN_COMMAND_BUFFER_ONE_TIME_SUBMIT]);

        layer.record_begin_command_buffer(command_buffer, &CommandBufferBeginInfo::default());
        assert_eq!(layer.command_buffer(command_buffer).unwrap().lock().num_submits, 0);
    }

    #[test]
    fn reset_keeps_zcull_and_clears_operations() {
        let (layer, _) = test_layer(VendorChecks::empty());
        let command_buffer = primary(&layer, 1);
        let image = Arc::new(ImageState::new(
            vk::Image::from_raw(2),
            ImageCreateInfo {
                format: vk::Format::D16_UNORM,
                array_layers: 2,
                ..Default::default()
            },
        ));

        let state = layer.command_buffer(command_buffer).unwrap();
        {
            let mut state = state.lock();
            state.queue_image_usage(
                "vkCmdClearDepthStencilImage",
                &image,
                &image.full_range(),
                ImageSubresourceUsage::Cleared,
            );
            state.zcull.bind_scope(&image, image.full_range());
            state.has_draw_cmd = true;
            assert_eq!(state.queue_operations().len(), 2);
        }

        layer.record_reset_command_pool(vk::CommandPool::from_raw(1));

        let state = state.lock();
        assert!(state.queue_operations().is_empty());
        assert!(!state.has_draw_cmd());
        assert!(state.zcull.scope().is_some());
    }

    #[test]
    fn pool_destruction_frees_command_buffers() {
        let (layer, _) = test_layer(VendorChecks::empty());
        primary(&layer, 1);
        primary(&layer, 2);

        layer.record_free_command_buffers(&[vk::CommandBuffer::from_raw(1)]);
        assert_eq!(layer.command_buffers.len(), 1);

        layer.record_destroy_command_pool(vk::CommandPool::from_raw(1));
        assert_eq!(layer.command_buffers.len(), 0);
    }
}
