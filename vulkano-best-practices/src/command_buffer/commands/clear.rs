use crate::{
    clear_color::{ClearColorValue, ClearValue},
    command_buffer::{is_full_clear, CommandBufferSubState},
    device::BestPractices,
    image::ImageSubresourceUsage,
    message_ids, LogObject, NonExhaustive, VendorChecks,
};
use ash::vk;

/// # Clear commands
impl BestPractices {
    pub fn validate_cmd_clear_attachments(
        &self,
        command_buffer: vk::CommandBuffer,
        attachments: &[ClearAttachment],
        rects: &[vk::ClearRect],
    ) {
        const LOCATION: &str = "vkCmdClearAttachments";

        let Some(state) = self.command_buffer(command_buffer) else {
            return;
        };
        let state = state.lock();
        let Some(render_pass) = &state.render_pass else {
            return;
        };

        // A secondary command buffer doesn't know the render area. Its clears are checked when it
        // is executed.
        if !state.is_secondary() && is_full_clear(false, render_pass.render_area, rects) {
            for attachment in attachments {
                for (index, aspects) in
                    render_pass.clear_targets(attachment.aspects, attachment.color_attachment)
                {
                    self.validate_clear_attachment(&state, index, aspects, LOCATION);
                }
            }
        }

        if !self.reporter.vendor_enabled(VendorChecks::NVIDIA) {
            return;
        }

        for attachment in attachments {
            if !attachment.aspects.contains(vk::ImageAspectFlags::COLOR) {
                continue;
            }

            let Some(color) = attachment.clear_value.color() else {
                continue;
            };
            let Some(target) = render_pass
                .clear_targets(vk::ImageAspectFlags::COLOR, attachment.color_attachment)
                .first()
                .and_then(|&(index, _)| render_pass.attachment(index))
            else {
                continue;
            };

            self.validate_clear_color(LOCATION, &[command_buffer.into()], target.format, color);
        }
    }

    pub fn record_cmd_clear_attachments(
        &self,
        command_buffer: vk::CommandBuffer,
        attachments: &[ClearAttachment],
        rects: &[vk::ClearRect],
    ) {
        let Some(state) = self.command_buffer(command_buffer) else {
            return;
        };
        let mut state = state.lock();
        let state = &mut *state;
        let Some(render_pass) = &state.render_pass else {
            return;
        };

        if rects.is_empty() {
            return;
        }

        let is_secondary = state.is_secondary();
        let full_clear = is_full_clear(is_secondary, render_pass.render_area, rects);

        for attachment in attachments {
            for (index, aspects) in
                render_pass.clear_targets(attachment.aspects, attachment.color_attachment)
            {
                if full_clear {
                    state.attachments.record_full_clear(
                        index,
                        attachment.color_attachment,
                        aspects,
                        rects,
                        is_secondary,
                    );
                } else {
                    state.attachments.record_attachment_access(index, aspects);
                }
            }
        }

        if !self.reporter.vendor_enabled(VendorChecks::NVIDIA) {
            return;
        }

        for attachment in attachments {
            if attachment
                .aspects
                .intersects(vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL)
            {
                state.zcull.reset_scope_direction();
            }

            if !attachment.aspects.contains(vk::ImageAspectFlags::COLOR) {
                continue;
            }

            let target = render_pass
                .clear_targets(vk::ImageAspectFlags::COLOR, attachment.color_attachment)
                .first()
                .and_then(|&(index, _)| render_pass.attachment(index));

            if let (Some(target), Some(color)) = (target, attachment.clear_value.color()) {
                self.clear_colors.record(target.format, color);
            }
        }
    }

    /// Checks a clear of the whole render area of one attachment, in a primary command buffer.
    pub(crate) fn validate_clear_attachment(
        &self,
        state: &CommandBufferSubState,
        attachment: u32,
        aspects: vk::ImageAspectFlags,
        location: &'static str,
    ) {
        let Some(render_pass) = &state.render_pass else {
            return;
        };
        let Some(description) = render_pass.attachment(attachment) else {
            return;
        };

        let aspects = state.attachments.untouched_aspects(attachment, aspects);

        if aspects.is_empty() {
            return;
        }

        let objects = [LogObject::from(state.handle)];

        if !state.has_draw_cmd {
            self.reporter.performance_warning(
                message_ids::CLEAR_CMD_BEFORE_DRAW,
                VendorChecks::empty(),
                location,
                &objects,
                format_args!(
                    "attachment {} is cleared before any draw in the render pass; use \
                    LOAD_OP_CLEAR on the attachment instead",
                    attachment,
                ),
            );
        }

        let mut loaded = vk::ImageAspectFlags::empty();

        if description.load_op == vk::AttachmentLoadOp::LOAD {
            loaded |= aspects & (vk::ImageAspectFlags::COLOR | vk::ImageAspectFlags::DEPTH);
        }

        if description.stencil_load_op == vk::AttachmentLoadOp::LOAD {
            loaded |= aspects & vk::ImageAspectFlags::STENCIL;
        }

        if !loaded.is_empty() {
            self.reporter.performance_warning(
                message_ids::CLEAR_ATTACHMENT_CLEAR_AFTER_LOAD,
                VendorChecks::empty(),
                location,
                &objects,
                format_args!(
                    "the {:?} aspects of attachment {} are loaded with LOAD_OP_LOAD and then \
                    cleared entirely; use LOAD_OP_CLEAR or LOAD_OP_DONT_CARE instead",
                    loaded, attachment,
                ),
            );
        }
    }

    pub fn validate_cmd_clear_color_image(
        &self,
        command_buffer: vk::CommandBuffer,
        image: vk::Image,
        color: ClearColorValue,
        _ranges: &[vk::ImageSubresourceRange],
    ) {
        const LOCATION: &str = "vkCmdClearColorImage";

        self.validate_clear_image(command_buffer, image, LOCATION);

        if !self.reporter.vendor_enabled(VendorChecks::NVIDIA) {
            return;
        }

        if let Some(image_state) = self.images.get(image) {
            self.validate_clear_color(
                LOCATION,
                &[command_buffer.into(), image.into()],
                image_state.format(),
                color,
            );
        }
    }

    pub fn record_cmd_clear_color_image(
        &self,
        command_buffer: vk::CommandBuffer,
        image: vk::Image,
        color: ClearColorValue,
        ranges: &[vk::ImageSubresourceRange],
    ) {
        let Some(state) = self.command_buffer(command_buffer) else {
            return;
        };
        let Some(image) = self.images.get(image) else {
            return;
        };
        let mut state = state.lock();

        for range in ranges {
            state.queue_image_usage(
                "vkCmdClearColorImage",
                &image,
                &image.normalize_range(range),
                ImageSubresourceUsage::Cleared,
            );
        }

        if self.reporter.vendor_enabled(VendorChecks::NVIDIA) {
            self.clear_colors.record(image.format(), color);
        }
    }

    pub fn validate_cmd_clear_depth_stencil_image(
        &self,
        command_buffer: vk::CommandBuffer,
        image: vk::Image,
        ranges: &[vk::ImageSubresourceRange],
    ) {
        const LOCATION: &str = "vkCmdClearDepthStencilImage";

        self.validate_clear_image(command_buffer, image, LOCATION);

        let (Some(state), Some(image_state)) =
            (self.command_buffer(command_buffer), self.images.get(image))
        else {
            return;
        };
        let state = state.lock();

        for range in ranges {
            self.validate_zcull(
                &state.zcull,
                command_buffer,
                image,
                &image_state.normalize_range(range),
                LOCATION,
            );
        }
    }

    pub fn record_cmd_clear_depth_stencil_image(
        &self,
        command_buffer: vk::CommandBuffer,
        image: vk::Image,
        ranges: &[vk::ImageSubresourceRange],
    ) {
        let Some(state) = self.command_buffer(command_buffer) else {
            return;
        };
        let Some(image) = self.images.get(image) else {
            return;
        };
        let mut state = state.lock();
        let nvidia = self.reporter.vendor_enabled(VendorChecks::NVIDIA);

        for range in ranges {
            let range = image.normalize_range(range);
            state.queue_image_usage(
                "vkCmdClearDepthStencilImage",
                &image,
                &range,
                ImageSubresourceUsage::Cleared,
            );

            if nvidia {
                state.zcull.reset_direction(image.handle(), &range);
            }
        }
    }

    fn validate_clear_image(
        &self,
        command_buffer: vk::CommandBuffer,
        image: vk::Image,
        location: &'static str,
    ) {
        if self.reporter.vendor_enabled(VendorChecks::AMD) {
            self.reporter.performance_warning(
                message_ids::CLEAR_IMAGE_PREFER_LOAD_OP_CLEAR,
                VendorChecks::AMD,
                location,
                &[command_buffer.into(), image.into()],
                format_args!(
                    "clearing an image outside of a render pass is slow; prefer LOAD_OP_CLEAR \
                    when the image is used as an attachment",
                ),
            );
        }
    }
}

/// An entry of `vkCmdClearAttachments`.
#[derive(Clone, Debug)]
pub struct ClearAttachment {
    pub aspects: vk::ImageAspectFlags,
    /// The index of the color attachment in the current subpass, if `aspects` contains `COLOR`.
    pub color_attachment: u32,
    pub clear_value: ClearValue,
    pub _ne: NonExhaustive,
}

impl Default for ClearAttachment {
    #[inline]
    fn default() -> Self {
        Self {
            aspects: vk::ImageAspectFlags::empty(),
            color_attachment: 0,
            clear_value: ClearValue::default(),
            _ne: NonExhaustive(()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        command_buffer::tests::primary,
        image::{ImageCreateInfo, ImageViewCreateInfo},
        render_pass::{
            AttachmentDescription, FramebufferCreateInfo, RenderPassBeginInfo,
            RenderPassCreateInfo, SubpassDescription,
        },
        tests::test_layer,
    };
    use ash::vk::Handle;

    pub(crate) const RENDER_PASS: u64 = 0x10;
    pub(crate) const FRAMEBUFFER: u64 = 0x20;
    pub(crate) const COLOR_IMAGE: u64 = 0x30;
    pub(crate) const DEPTH_IMAGE: u64 = 0x31;

    pub(crate) fn extent() -> vk::Extent2D {
        vk::Extent2D {
            width: 64,
            height: 64,
        }
    }

    pub(crate) fn full_rect() -> vk::ClearRect {
        vk::ClearRect {
            rect: vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: extent(),
            },
            base_array_layer: 0,
            layer_count: 1,
        }
    }

    /// Creates a render pass with a color attachment 0 and a depth attachment 1, and a framebuffer
    /// for it.
    pub(crate) fn setup_render_pass(
        layer: &BestPractices,
        load_op: vk::AttachmentLoadOp,
        store_op: vk::AttachmentStoreOp,
    ) {
        for (image, view, format) in [
            (COLOR_IMAGE, COLOR_IMAGE + 0x100, vk::Format::R8G8B8A8_UNORM),
            (DEPTH_IMAGE, DEPTH_IMAGE + 0x100, vk::Format::D32_SFLOAT),
        ] {
            layer.record_create_image(
                vk::Image::from_raw(image),
                ImageCreateInfo {
                    format,
                    extent: vk::Extent3D {
                        width: 64,
                        height: 64,
                        depth: 1,
                    },
                    ..Default::default()
                },
            );
            layer.record_create_image_view(
                vk::ImageView::from_raw(view),
                &ImageViewCreateInfo {
                    image: vk::Image::from_raw(image),
                    ..Default::default()
                },
            );
        }

        let attachment = |format| AttachmentDescription {
            format,
            load_op,
            store_op,
            ..Default::default()
        };

        layer.record_create_render_pass(
            vk::RenderPass::from_raw(RENDER_PASS),
            RenderPassCreateInfo {
                attachments: vec![
                    attachment(vk::Format::R8G8B8A8_UNORM),
                    attachment(vk::Format::D32_SFLOAT),
                ],
                subpasses: vec![SubpassDescription {
                    color_attachments: vec![Some(0)],
                    depth_stencil_attachment: Some(1),
                    ..Default::default()
                }],
                ..Default::default()
            },
        );
        layer.record_create_framebuffer(
            vk::Framebuffer::from_raw(FRAMEBUFFER),
            FramebufferCreateInfo {
                render_pass: vk::RenderPass::from_raw(RENDER_PASS),
                attachments: vec![
                    vk::ImageView::from_raw(COLOR_IMAGE + 0x100),
                    vk::ImageView::from_raw(DEPTH_IMAGE + 0x100),
                ],
                width: 64,
                height: 64,
                layers: 1,
                ..Default::default()
            },
        );
    }

    pub(crate) fn begin_info() -> RenderPassBeginInfo {
        RenderPassBeginInfo {
            render_pass: vk::RenderPass::from_raw(RENDER_PASS),
            framebuffer: vk::Framebuffer::from_raw(FRAMEBUFFER),
            render_area: vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: extent(),
            },
            clear_values: vec![
                ClearValue::Color(ClearColorValue::Float([0.0; 4])),
                ClearValue::DepthStencil {
                    depth: 1.0,
                    stencil: 0,
                },
            ],
            ..Default::default()
        }
    }

    fn clear_color() -> ClearAttachment {
        ClearAttachment {
            aspects: vk::ImageAspectFlags::COLOR,
            color_attachment: 0,
            clear_value: ClearValue::Color(ClearColorValue::Float([0.0; 4])),
            ..Default::default()
        }
    }

    #[test]
    fn clear_after_load_before_draw() {
        let (layer, messages) = test_layer(VendorChecks::empty());
        setup_render_pass(
            &layer,
            vk::AttachmentLoadOp::LOAD,
            vk::AttachmentStoreOp::STORE,
        );
        let command_buffer = primary(&layer, 1);
        layer.record_cmd_begin_render_pass(command_buffer, &begin_info());

        layer.validate_cmd_clear_attachments(command_buffer, &[clear_color()], &[full_rect()]);
        assert_eq!(
            messages.ids(),
            [
                message_ids::CLEAR_CMD_BEFORE_DRAW,
                message_ids::CLEAR_ATTACHMENT_CLEAR_AFTER_LOAD,
            ],
        );
        messages.clear();

        // Once cleared, the attachment counts as touched.
        layer.record_cmd_clear_attachments(command_buffer, &[clear_color()], &[full_rect()]);
        layer.validate_cmd_clear_attachments(command_buffer, &[clear_color()], &[full_rect()]);
        assert!(messages.ids().is_empty());
    }

    #[test]
    fn partial_clears_are_ignored() {
        let (layer, messages) = test_layer(VendorChecks::empty());
        setup_render_pass(
            &layer,
            vk::AttachmentLoadOp::LOAD,
            vk::AttachmentStoreOp::STORE,
        );
        let command_buffer = primary(&layer, 1);
        layer.record_cmd_begin_render_pass(command_buffer, &begin_info());

        let mut rect = full_rect();
        rect.rect.extent.width = 32;
        layer.validate_cmd_clear_attachments(command_buffer, &[clear_color()], &[rect]);
        layer.record_cmd_clear_attachments(command_buffer, &[clear_color()], &[rect]);
        assert!(messages.ids().is_empty());

        let state = layer.command_buffer(command_buffer).unwrap();
        assert!(state
            .lock()
            .attachments
            .untouched_aspects(0, vk::ImageAspectFlags::COLOR)
            .is_empty());
    }

    #[test]
    fn clear_images() {
        let (layer, messages) = test_layer(VendorChecks::AMD | VendorChecks::NVIDIA);
        setup_render_pass(
            &layer,
            vk::AttachmentLoadOp::CLEAR,
            vk::AttachmentStoreOp::STORE,
        );
        let command_buffer = primary(&layer, 1);
        let image = vk::Image::from_raw(COLOR_IMAGE);
        let range = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };
        let color = ClearColorValue::Float([0.5, 0.0, 0.0, 1.0]);

        layer.validate_cmd_clear_color_image(command_buffer, image, color, &[range]);
        assert_eq!(messages.ids(), [message_ids::CLEAR_IMAGE_PREFER_LOAD_OP_CLEAR]);

        layer.record_cmd_clear_color_image(command_buffer, image, color, &[range]);
        let state = layer.command_buffer(command_buffer).unwrap();
        assert_eq!(state.lock().queue_operations().len(), 1);
    }

    #[test]
    fn uncompressed_clear_color() {
        let (layer, messages) = test_layer(VendorChecks::NVIDIA);
        let command_buffer = primary(&layer, 1);
        let image = vk::Image::from_raw(7);

        layer.record_create_image(
            image,
            ImageCreateInfo {
                format: vk::Format::R8G8_UNORM,
                ..Default::default()
            },
        );
        layer.validate_cmd_clear_color_image(
            command_buffer,
            image,
            ClearColorValue::Float([0.5; 4]),
            &[],
        );
        layer.validate_cmd_clear_color_image(
            command_buffer,
            image,
            ClearColorValue::Float([1.0; 4]),
            &[],
        );

        assert_eq!(messages.ids(), [message_ids::CLEAR_COLOR_NOT_COMPRESSED]);
    }
}
