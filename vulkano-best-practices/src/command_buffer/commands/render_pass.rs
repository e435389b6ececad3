use crate::{
    command_buffer::CommandBufferSubState,
    device::BestPractices,
    image::ImageSubresourceUsage,
    message_ids,
    render_pass::{ActiveRenderPass, RenderPassBeginInfo, RenderingInfo},
    LogObject, VendorChecks,
};
use ash::vk;

/// # Render pass commands
impl BestPractices {
    pub fn validate_cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        begin_info: &RenderPassBeginInfo,
    ) {
        if !self.reporter.vendor_enabled(VendorChecks::NVIDIA) {
            return;
        }

        if let Some(render_pass) = self.render_pass_instance(begin_info) {
            self.validate_load_op_clear_colors(
                command_buffer,
                &render_pass,
                "vkCmdBeginRenderPass",
            );
        }
    }

    pub fn record_cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        begin_info: &RenderPassBeginInfo,
    ) {
        let Some(state) = self.command_buffer(command_buffer) else {
            return;
        };
        let mut state = state.lock();

        let Some(render_pass) = self.render_pass_instance(begin_info) else {
            log::debug!(
                "render pass instance of untracked render pass {:?} is not checked",
                begin_info.render_pass,
            );
            state.render_pass = None;
            return;
        };

        self.begin_render_pass_instance(&mut state, render_pass, "vkCmdBeginRenderPass");
    }

    pub fn validate_cmd_begin_rendering(
        &self,
        command_buffer: vk::CommandBuffer,
        rendering_info: &RenderingInfo,
    ) {
        if !self.reporter.vendor_enabled(VendorChecks::NVIDIA) {
            return;
        }

        let render_pass =
            ActiveRenderPass::new_rendering(rendering_info, |view| self.image_views.get(view));
        self.validate_load_op_clear_colors(command_buffer, &render_pass, "vkCmdBeginRendering");
    }

    pub fn record_cmd_begin_rendering(
        &self,
        command_buffer: vk::CommandBuffer,
        rendering_info: &RenderingInfo,
    ) {
        let Some(state) = self.command_buffer(command_buffer) else {
            return;
        };
        let render_pass =
            ActiveRenderPass::new_rendering(rendering_info, |view| self.image_views.get(view));

        self.begin_render_pass_instance(&mut state.lock(), render_pass, "vkCmdBeginRendering");
    }

    pub fn validate_cmd_next_subpass(&self, command_buffer: vk::CommandBuffer) {
        if let Some(state) = self.command_buffer(command_buffer) {
            self.validate_zcull_scope(&state.lock().zcull, command_buffer, "vkCmdNextSubpass");
        }
    }

    pub fn record_cmd_next_subpass(&self, command_buffer: vk::CommandBuffer) {
        let Some(state) = self.command_buffer(command_buffer) else {
            return;
        };
        let mut state = state.lock();
        let state = &mut *state;
        let Some(render_pass) = &mut state.render_pass else {
            return;
        };

        render_pass.set_subpass(render_pass.subpass + 1);

        if self.reporter.vendor_enabled(VendorChecks::NVIDIA) {
            match render_pass.depth_view() {
                Some((view, range)) => state.zcull.bind_scope(view.image(), range),
                None => state.zcull.unbind_scope(),
            }
        }
    }

    pub fn validate_cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        if let Some(state) = self.command_buffer(command_buffer) {
            self.validate_end_render_pass_instance(&state.lock(), "vkCmdEndRenderPass");
        }
    }

    pub fn record_cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        if let Some(state) = self.command_buffer(command_buffer) {
            self.end_render_pass_instance(&mut state.lock(), "vkCmdEndRenderPass");
        }
    }

    pub fn validate_cmd_end_rendering(&self, command_buffer: vk::CommandBuffer) {
        if let Some(state) = self.command_buffer(command_buffer) {
            self.validate_end_render_pass_instance(&state.lock(), "vkCmdEndRendering");
        }
    }

    pub fn record_cmd_end_rendering(&self, command_buffer: vk::CommandBuffer) {
        if let Some(state) = self.command_buffer(command_buffer) {
            self.end_render_pass_instance(&mut state.lock(), "vkCmdEndRendering");
        }
    }

    fn render_pass_instance(&self, begin_info: &RenderPassBeginInfo) -> Option<ActiveRenderPass> {
        let render_pass = self.render_passes.get(begin_info.render_pass)?;
        let image_views =
            self.framebuffer_attachments(begin_info.framebuffer, &begin_info.attachments);

        Some(ActiveRenderPass::new_render_pass(
            render_pass,
            begin_info.render_area,
            &image_views,
            &begin_info.clear_values,
        ))
    }

    fn validate_load_op_clear_colors(
        &self,
        command_buffer: vk::CommandBuffer,
        render_pass: &ActiveRenderPass,
        location: &'static str,
    ) {
        for attachment in &render_pass.attachments {
            if !attachment.aspects.contains(vk::ImageAspectFlags::COLOR) || !attachment.clears() {
                continue;
            }

            if let Some(color) = attachment.clear_value.and_then(|value| value.color()) {
                self.validate_clear_color(
                    location,
                    &[command_buffer.into()],
                    attachment.format,
                    color,
                );
            }
        }
    }

    fn begin_render_pass_instance(
        &self,
        state: &mut CommandBufferSubState,
        render_pass: ActiveRenderPass,
        location: &'static str,
    ) {
        let (has_depth, has_color) = render_pass.has_depth_and_color_attachments();
        state.attachments.reset();
        state.attachments.has_depth_attachment = has_depth;
        state.attachments.has_color_attachment = has_color;
        state.has_draw_cmd = false;

        if !render_pass
            .rendering_flags
            .contains(vk::RenderingFlags::RESUMING)
        {
            for attachment in &render_pass.attachments {
                let Some(view) = &attachment.image_view else {
                    continue;
                };

                let usage = if attachment.loads() {
                    ImageSubresourceUsage::RenderPassReadToTile
                } else if attachment.clears() {
                    ImageSubresourceUsage::RenderPassCleared
                } else {
                    continue;
                };

                state.queue_image_usage(location, view.image(), view.subresource_range(), usage);
            }
        }

        if self.reporter.vendor_enabled(VendorChecks::NVIDIA) {
            match render_pass.depth_view() {
                Some((view, range)) => {
                    state.zcull.bind_scope(view.image(), range);

                    let load_op = render_pass
                        .depth_attachment
                        .and_then(|index| render_pass.attachment(index))
                        .map(|attachment| attachment.depth_stencil_load_op());

                    if matches!(
                        load_op,
                        Some(vk::AttachmentLoadOp::CLEAR | vk::AttachmentLoadOp::DONT_CARE),
                    ) {
                        state.zcull.reset_scope_direction();
                    }
                }
                None => state.zcull.unbind_scope(),
            }

            for attachment in &render_pass.attachments {
                if !attachment.aspects.contains(vk::ImageAspectFlags::COLOR) || !attachment.clears()
                {
                    continue;
                }

                if let Some(color) = attachment.clear_value.and_then(|value| value.color()) {
                    self.clear_colors.record(attachment.format, color);
                }
            }
        }

        state.render_pass = Some(render_pass);
    }

    fn validate_end_render_pass_instance(
        &self,
        state: &CommandBufferSubState,
        location: &'static str,
    ) {
        self.validate_zcull_scope(&state.zcull, state.handle, location);

        let Some(render_pass) = &state.render_pass else {
            return;
        };

        // A suspended instance continues in a later command buffer.
        if render_pass
            .rendering_flags
            .contains(vk::RenderingFlags::SUSPENDING)
        {
            return;
        }

        let tiler_vendors = VendorChecks::ARM | VendorChecks::IMG;

        if !self.reporter.vendor_enabled(tiler_vendors) {
            return;
        }

        let tracker = &state.attachments;
        let min_draws = self.config.depth_pre_pass_min_draws;

        if (tracker.has_depth_attachment || tracker.has_color_attachment)
            && tracker.num_draw_calls_depth_only >= min_draws
            && tracker.num_draw_calls_depth_equal_compare >= min_draws
        {
            self.reporter.performance_warning(
                message_ids::END_RENDER_PASS_DEPTH_PRE_PASS_USAGE,
                tiler_vendors,
                location,
                &[state.handle.into()],
                format_args!(
                    "the render pass contains {} depth-only draws and {} draws testing depth \
                    with EQUAL, which suggests a depth pre-pass; tile-based GPUs already reject \
                    hidden fragments, so depth pre-passes usually cost more than they save",
                    tracker.num_draw_calls_depth_only, tracker.num_draw_calls_depth_equal_compare,
                ),
            );
        }

        for (index, attachment) in (0..).zip(&render_pass.attachments) {
            let untouched = tracker.untouched_aspects(index, attachment.aspects_on_tile());

            if untouched.is_empty() {
                continue;
            }

            let objects: Vec<LogObject> = [state.handle.into()]
                .into_iter()
                .chain(attachment.image_view.as_ref().map(|view| view.handle().into()))
                .collect();

            self.reporter.performance_warning(
                message_ids::END_RENDER_PASS_REDUNDANT_ATTACHMENT_ON_TILE,
                tiler_vendors,
                location,
                &objects,
                format_args!(
                    "attachment {} (format {:?}) is loaded or stored, but its {:?} aspects were \
                    never accessed by a pipeline or a clear; LOAD_OP_LOAD and STORE_OP_STORE \
                    cost bandwidth on tile-based GPUs, remove the attachment or use DONT_CARE",
                    index, attachment.format, untouched,
                ),
            );
        }
    }

    fn end_render_pass_instance(&self, state: &mut CommandBufferSubState, location: &'static str) {
        let Some(render_pass) = state.render_pass.take() else {
            return;
        };

        if !render_pass
            .rendering_flags
            .contains(vk::RenderingFlags::SUSPENDING)
        {
            for attachment in &render_pass.attachments {
                let Some(view) = &attachment.image_view else {
                    continue;
                };

                let usage = if attachment.stores() {
                    ImageSubresourceUsage::RenderPassStored
                } else {
                    ImageSubresourceUsage::RenderPassDiscarded
                };

                state.queue_image_usage(location, view.image(), view.subresource_range(), usage);
            }
        }

        if self.reporter.vendor_enabled(VendorChecks::NVIDIA) {
            let store_op = render_pass
                .depth_attachment
                .and_then(|index| render_pass.attachment(index))
                .map(|attachment| attachment.depth_stencil_store_op());

            if matches!(
                store_op,
                Some(vk::AttachmentStoreOp::DONT_CARE | vk::AttachmentStoreOp::NONE),
            ) {
                state.zcull.reset_scope_direction();
            }

            state.zcull.unbind_scope();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::clear::tests::{
        begin_info, extent, setup_render_pass, COLOR_IMAGE, DEPTH_IMAGE, RENDER_PASS,
    };
    use crate::{
        clear_color::{ClearColorValue, ClearValue},
        command_buffer::{tests::primary, QueueOperation},
        image::ImageSubresourceUsage,
        message_ids,
        pipeline::{
            ColorBlendAttachmentState, ColorBlendState, DepthStencilState,
            GraphicsPipelineCreateInfo,
        },
        render_pass::{RenderingAttachmentInfo, RenderingInfo},
        tests::{test_layer, test_layer_with},
        BestPracticesConfig, VendorChecks,
    };
    use ash::vk::{self, Handle};

    fn usages(operations: &[QueueOperation]) -> Vec<(vk::Image, ImageSubresourceUsage)> {
        operations
            .iter()
            .map(|operation| match operation {
                QueueOperation::ImageUsage { image, usage, .. } => (image.handle(), *usage),
            })
            .collect()
    }

    #[test]
    fn load_and_store_usages() {
        let (layer, _) = test_layer(VendorChecks::empty());
        setup_render_pass(
            &layer,
            vk::AttachmentLoadOp::LOAD,
            vk::AttachmentStoreOp::DONT_CARE,
        );
        let command_buffer = primary(&layer, 1);

        layer.record_cmd_begin_render_pass(command_buffer, &begin_info());
        layer.record_cmd_end_render_pass(command_buffer);

        let state = layer.command_buffer(command_buffer).unwrap();
        let state = state.lock();
        let color = vk::Image::from_raw(COLOR_IMAGE);
        let depth = vk::Image::from_raw(DEPTH_IMAGE);

        assert_eq!(
            usages(state.queue_operations()),
            [
                (color, ImageSubresourceUsage::RenderPassReadToTile),
                (depth, ImageSubresourceUsage::RenderPassReadToTile),
                (color, ImageSubresourceUsage::RenderPassDiscarded),
                (depth, ImageSubresourceUsage::RenderPassDiscarded),
            ],
        );
        assert!(state.render_pass.is_none());
    }

    #[test]
    fn redundant_attachment_on_tile() {
        let (layer, messages) = test_layer(VendorChecks::ARM);
        setup_render_pass(
            &layer,
            vk::AttachmentLoadOp::LOAD,
            vk::AttachmentStoreOp::STORE,
        );
        let command_buffer = primary(&layer, 1);
        let pipeline = vk::Pipeline::from_raw(5);

        // The pipeline writes color but doesn't test depth.
        layer.record_create_graphics_pipelines(
            vk::PipelineCache::null(),
            &[GraphicsPipelineCreateInfo {
                render_pass: vk::RenderPass::from_raw(RENDER_PASS),
                ..Default::default()
            }],
            &[pipeline],
        );
        layer.record_cmd_begin_render_pass(command_buffer, &begin_info());
        layer.record_cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);
        layer.record_cmd_draw(command_buffer);
        layer.validate_cmd_end_render_pass(command_buffer);

        assert_eq!(
            messages.ids(),
            [message_ids::END_RENDER_PASS_REDUNDANT_ATTACHMENT_ON_TILE],
        );
        assert!(messages.all()[0].description.contains("attachment 1"));
    }

    #[test]
    fn depth_pre_pass() {
        let (layer, messages) = test_layer_with(BestPracticesConfig {
            vendor_checks: VendorChecks::IMG,
            depth_pre_pass_min_draws: 2,
            ..Default::default()
        });
        setup_render_pass(
            &layer,
            vk::AttachmentLoadOp::CLEAR,
            vk::AttachmentStoreOp::DONT_CARE,
        );
        let command_buffer = primary(&layer, 1);
        let depth_only = vk::Pipeline::from_raw(5);
        let depth_equal = vk::Pipeline::from_raw(6);
        let render_pass = vk::RenderPass::from_raw(RENDER_PASS);

        layer.record_create_graphics_pipelines(
            vk::PipelineCache::null(),
            &[
                GraphicsPipelineCreateInfo {
                    render_pass,
                    color_blend: Some(ColorBlendState {
                        attachments: vec![ColorBlendAttachmentState {
                            color_write_mask: vk::ColorComponentFlags::empty(),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                    depth_stencil: Some(DepthStencilState {
                        depth_test_enable: true,
                        depth_write_enable: true,
                        depth_compare_op: vk::CompareOp::LESS,
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                GraphicsPipelineCreateInfo {
                    render_pass,
                    depth_stencil: Some(DepthStencilState {
                        depth_test_enable: true,
                        depth_write_enable: false,
                        depth_compare_op: vk::CompareOp::EQUAL,
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ],
            &[depth_only, depth_equal],
        );
        layer.record_cmd_begin_render_pass(command_buffer, &begin_info());

        for pipeline in [depth_only, depth_equal] {
            layer.record_cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
            layer.record_cmd_draw(command_buffer);
            layer.record_cmd_draw(command_buffer);
        }

        layer.validate_cmd_end_render_pass(command_buffer);
        assert_eq!(messages.ids(), [message_ids::END_RENDER_PASS_DEPTH_PRE_PASS_USAGE]);
    }

    #[test]
    fn dynamic_rendering_suspend_and_resume() {
        let (layer, _) = test_layer(VendorChecks::empty());
        setup_render_pass(
            &layer,
            vk::AttachmentLoadOp::DONT_CARE,
            vk::AttachmentStoreOp::DONT_CARE,
        );
        let command_buffer = primary(&layer, 1);
        let color = |flags| RenderingInfo {
            flags,
            render_area: vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: extent(),
            },
            color_attachments: vec![Some(RenderingAttachmentInfo {
                image_view: vk::ImageView::from_raw(COLOR_IMAGE + 0x100),
                load_op: vk::AttachmentLoadOp::CLEAR,
                store_op: vk::AttachmentStoreOp::STORE,
                clear_value: ClearValue::Color(ClearColorValue::Float([0.0; 4])),
                ..Default::default()
            })],
            ..Default::default()
        };

        layer.record_cmd_begin_rendering(command_buffer, &color(vk::RenderingFlags::SUSPENDING));
        layer.record_cmd_end_rendering(command_buffer);
        layer.record_cmd_begin_rendering(command_buffer, &color(vk::RenderingFlags::RESUMING));
        layer.record_cmd_end_rendering(command_buffer);

        let state = layer.command_buffer(command_buffer).unwrap();
        let color_image = vk::Image::from_raw(COLOR_IMAGE);
        assert_eq!(
            usages(state.lock().queue_operations()),
            [
                (color_image, ImageSubresourceUsage::RenderPassCleared),
                (color_image, ImageSubresourceUsage::RenderPassStored),
            ],
        );
    }

    #[test]
    fn zcull_scope_follows_depth_attachment() {
        let (layer, messages) = test_layer(VendorChecks::NVIDIA);
        setup_render_pass(
            &layer,
            vk::AttachmentLoadOp::LOAD,
            vk::AttachmentStoreOp::STORE,
        );
        let command_buffer = primary(&layer, 1);
        let depth = vk::Image::from_raw(DEPTH_IMAGE);

        layer.record_cmd_begin_render_pass(command_buffer, &begin_info());
        layer.record_cmd_set_depth_test_enable(command_buffer, true);

        for op in [vk::CompareOp::LESS, vk::CompareOp::GREATER] {
            layer.record_cmd_set_depth_compare_op(command_buffer, op);
            for _ in 0..5 {
                layer.record_cmd_draw(command_buffer);
            }
        }

        {
            let state = layer.command_buffer(command_buffer).unwrap();
            let state = state.lock();
            assert_eq!(state.zcull.scope().unwrap().image, depth);
        }

        layer.validate_cmd_end_render_pass(command_buffer);
        assert_eq!(messages.ids(), [message_ids::ZCULL_LESS_GREATER_RATIO]);

        layer.record_cmd_end_render_pass(command_buffer);
        let state = layer.command_buffer(command_buffer).unwrap();
        assert!(state.lock().zcull.scope().is_none());
    }
}
