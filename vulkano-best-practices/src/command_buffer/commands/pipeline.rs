use crate::{
    command_buffer::{uncovered_bytes, CommandBufferSubState},
    device::BestPractices,
    image::ImageSubresourceUsage,
    message_ids,
    vertex_cache::{self, IndexUtilization},
    LogObject, VendorChecks,
};
use ash::vk;

const SPARSE_INDEX_UTILIZATION: f32 = 0.5;
const CACHE_THRASHING_HIT_RATE: f32 = 0.5;

/// # Draw and dispatch commands
impl BestPractices {
    pub fn validate_cmd_draw(
        &self,
        command_buffer: vk::CommandBuffer,
        _vertex_count: u32,
        instance_count: u32,
        _first_vertex: u32,
        _first_instance: u32,
    ) {
        const LOCATION: &str = "vkCmdDraw";

        self.validate_instance_count(command_buffer, LOCATION, instance_count);

        if let Some(state) = self.command_buffer(command_buffer) {
            self.validate_push_constants(&state.lock(), vk::PipelineBindPoint::GRAPHICS, LOCATION);
        }
    }

    pub fn record_cmd_draw(&self, command_buffer: vk::CommandBuffer) {
        if let Some(state) = self.command_buffer(command_buffer) {
            self.record_draw(&mut state.lock(), "vkCmdDraw");
        }
    }

    pub fn validate_cmd_draw_indexed(
        &self,
        command_buffer: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        _vertex_offset: i32,
        _first_instance: u32,
    ) {
        const LOCATION: &str = "vkCmdDrawIndexed";

        self.validate_instance_count(command_buffer, LOCATION, instance_count);

        let Some(state) = self.command_buffer(command_buffer) else {
            return;
        };
        let state = state.lock();
        let tiler_vendors = VendorChecks::ARM | VendorChecks::IMG;

        let small_indexed_draw_indices = self.config.small_indexed_draw_indices;

        if self.reporter.vendor_enabled(tiler_vendors)
            && is_small_indexed_draw(index_count, instance_count, small_indexed_draw_indices)
            && self.config.max_small_indexed_draws.checked_sub(1)
                == Some(state.small_indexed_draw_call_count)
        {
            self.reporter.performance_warning(
                message_ids::CMD_DRAW_INDEXED_MANY_SMALL_INDEXED_DRAWCALLS,
                tiler_vendors,
                LOCATION,
                &[command_buffer.into()],
                format_args!(
                    "the command buffer contains {} indexed draws with {} indices or fewer; such \
                    small draws are inefficient, batch them together",
                    self.config.max_small_indexed_draws, small_indexed_draw_indices,
                ),
            );
        }

        if self.reporter.vendor_enabled(VendorChecks::ARM) {
            self.validate_index_buffer(&state, LOCATION, index_count, first_index);
        }

        self.validate_push_constants(&state, vk::PipelineBindPoint::GRAPHICS, LOCATION);
    }

    pub fn record_cmd_draw_indexed(
        &self,
        command_buffer: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
    ) {
        let Some(state) = self.command_buffer(command_buffer) else {
            return;
        };
        let mut state = state.lock();

        let small_indexed_draw_indices = self.config.small_indexed_draw_indices;

        if is_small_indexed_draw(index_count, instance_count, small_indexed_draw_indices) {
            state.small_indexed_draw_call_count += 1;
        }

        self.record_draw(&mut state, "vkCmdDrawIndexed");
    }

    /// Validates `vkCmdDrawIndirect`, `vkCmdDrawIndexedIndirect` and their `Count` variants.
    pub fn validate_cmd_draw_indirect(
        &self,
        command_buffer: vk::CommandBuffer,
        location: &'static str,
    ) {
        if let Some(state) = self.command_buffer(command_buffer) {
            self.validate_push_constants(&state.lock(), vk::PipelineBindPoint::GRAPHICS, location);
        }
    }

    pub fn record_cmd_draw_indirect(
        &self,
        command_buffer: vk::CommandBuffer,
        location: &'static str,
    ) {
        if let Some(state) = self.command_buffer(command_buffer) {
            self.record_draw(&mut state.lock(), location);
        }
    }

    /// Validates `vkCmdDispatch`, `vkCmdDispatchIndirect` and `vkCmdDispatchBase`.
    pub fn validate_cmd_dispatch(&self, command_buffer: vk::CommandBuffer, location: &'static str) {
        if let Some(state) = self.command_buffer(command_buffer) {
            self.validate_push_constants(&state.lock(), vk::PipelineBindPoint::COMPUTE, location);
        }
    }

    pub fn record_cmd_dispatch(&self, command_buffer: vk::CommandBuffer, location: &'static str) {
        if let Some(state) = self.command_buffer(command_buffer) {
            queue_descriptor_accesses(&mut state.lock(), vk::PipelineBindPoint::COMPUTE, location);
        }
    }

    fn validate_instance_count(
        &self,
        command_buffer: vk::CommandBuffer,
        location: &'static str,
        instance_count: u32,
    ) {
        if instance_count == 0 {
            self.reporter.warning(
                message_ids::CMD_DRAW_INSTANCE_COUNT_ZERO,
                location,
                &[command_buffer.into()],
                format_args!("the draw has an instance count of zero and does nothing"),
            );
        }
    }

    /// Checks that every push constant range of the bound pipeline's layout was written.
    fn validate_push_constants(
        &self,
        state: &CommandBufferSubState,
        bind_point: vk::PipelineBindPoint,
        location: &'static str,
    ) {
        let Some(pipeline) = state
            .binding(bind_point)
            .and_then(|binding| binding.pipeline.as_ref())
        else {
            return;
        };
        let Some(layout) = pipeline.layout() else {
            return;
        };

        let is_compatible = |other: vk::PipelineLayout| {
            other == layout.handle()
                || self.pipeline_layouts.get(other).is_some_and(|other| {
                    same_push_constant_ranges(
                        other.push_constant_ranges(),
                        layout.push_constant_ranges(),
                    )
                })
        };
        let chunks: Vec<_> = state
            .push_constants
            .iter()
            .filter(|chunk| is_compatible(chunk.layout))
            .collect();

        for range in layout.push_constant_ranges() {
            let uncovered = uncovered_bytes(chunks.iter().copied(), range);

            if uncovered != 0 {
                self.reporter.warning(
                    message_ids::PUSH_CONSTANTS_NOT_SET,
                    location,
                    &[state.handle.into(), pipeline.handle().into()],
                    format_args!(
                        "the pipeline uses the push constant range at offset {} with size {} for \
                        stages {:?}, but {} of its bytes were never set with vkCmdPushConstants",
                        range.offset, range.size, range.stage_flags, uncovered,
                    ),
                );
            }
        }
    }

    /// Runs the Arm index buffer analysis on the known contents of the bound index buffer.
    fn validate_index_buffer(
        &self,
        state: &CommandBufferSubState,
        location: &'static str,
        index_count: u32,
        first_index: u32,
    ) {
        let Some(index_buffer) = &state.index_buffer else {
            return;
        };
        let Some(contents) = index_buffer.buffer.contents() else {
            return;
        };
        let Some(stride) = vertex_cache::index_size(index_buffer.index_type) else {
            return;
        };

        let stride = stride as u64;
        let Some((start, end)) = u64::from(first_index)
            .checked_mul(stride)
            .and_then(|first| index_buffer.offset.checked_add(first))
            .and_then(|start| {
                let end = u64::from(index_count)
                    .checked_mul(stride)
                    .and_then(|size| start.checked_add(size))?;

                Some((start, end))
            })
        else {
            return;
        };

        if end > contents.len() as u64 {
            return;
        }

        let primitive_restart = state
            .graphics
            .pipeline
            .as_ref()
            .filter(|pipeline| pipeline.primitive_restart_enable())
            .map(|_| vertex_cache::primitive_restart_index(index_buffer.index_type));
        let indices = vertex_cache::read_indices(
            &contents[start as usize..end as usize],
            index_buffer.index_type,
        );

        let Some(analysis) =
            vertex_cache::analyze_indices(indices, primitive_restart, self.config.vertex_cache_size)
        else {
            return;
        };

        let objects = [
            LogObject::from(state.handle),
            LogObject::from(index_buffer.buffer.handle()),
        ];

        let sparse_utilization = match analysis.utilization {
            IndexUtilization::SparseRange { utilization } => Some(utilization),
            IndexUtilization::Scanned { utilization, .. }
                if utilization < SPARSE_INDEX_UTILIZATION =>
            {
                Some(utilization)
            }
            IndexUtilization::Scanned { .. } => None,
        };

        if let Some(utilization) = sparse_utilization {
            self.reporter.performance_warning(
                message_ids::CMD_DRAW_INDEXED_SPARSE_INDEX_BUFFER,
                VendorChecks::ARM,
                location,
                &objects,
                format_args!(
                    "the indices span {}..={} but only {:.0}% of the vertices in that range are \
                    used; vertices are shaded per index range on tilers, compact the vertex data",
                    analysis.min_index,
                    analysis.max_index,
                    utilization * 100.0,
                ),
            );
        }

        if let Some(hit_rate) = analysis
            .cache_hit_rate()
            .filter(|&hit_rate| hit_rate <= CACHE_THRASHING_HIT_RATE)
        {
            self.reporter.performance_warning(
                message_ids::CMD_DRAW_INDEXED_POST_TRANSFORM_CACHE_THRASHING,
                VendorChecks::ARM,
                location,
                &objects,
                format_args!(
                    "the vertex shader runs {} times for {} indices, a post-transform cache hit \
                    rate of {:.0}%; reorder the indices to improve vertex reuse",
                    analysis.vertex_shade_count,
                    analysis.index_count,
                    hit_rate * 100.0,
                ),
            );
        }
    }

    fn record_draw(&self, state: &mut CommandBufferSubState, location: &'static str) {
        if state.render_pass.is_some() {
            let tracker = &mut state.attachments;

            if tracker.draw_touches_attachments {
                for (attachment, aspects) in tracker.next_draw_touches.clone() {
                    tracker.record_attachment_access(attachment, aspects);
                }

                tracker.draw_touches_attachments = false;
            }

            if tracker.depth_only {
                tracker.num_draw_calls_depth_only += 1;
            }

            if tracker.depth_equal_comparison {
                tracker.num_draw_calls_depth_equal_compare += 1;
            }
        }

        queue_descriptor_accesses(state, vk::PipelineBindPoint::GRAPHICS, location);

        if self.reporter.vendor_enabled(VendorChecks::NVIDIA) {
            state.zcull.record_draw();
        }

        state.has_draw_cmd = true;
    }
}

fn is_small_indexed_draw(index_count: u32, instance_count: u32, max_indices: u32) -> bool {
    u64::from(index_count) * u64::from(instance_count) <= u64::from(max_indices)
}

fn same_push_constant_ranges(a: &[vk::PushConstantRange], b: &[vk::PushConstantRange]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(a, b)| {
            a.stage_flags == b.stage_flags && a.offset == b.offset && a.size == b.size
        })
}

/// Queues a descriptor access of every image view bound through the descriptor sets of
/// `bind_point`.
fn queue_descriptor_accesses(
    state: &mut CommandBufferSubState,
    bind_point: vk::PipelineBindPoint,
    location: &'static str,
) {
    let Some(binding) = state.binding(bind_point) else {
        return;
    };

    let image_views: Vec<_> = binding
        .descriptor_sets
        .iter()
        .flatten()
        .flat_map(|set| set.accessed_image_views())
        .collect();

    for image_view in image_views {
        state.queue_image_usage(
            location,
            image_view.image(),
            image_view.subresource_range(),
            ImageSubresourceUsage::DescriptorAccess,
        );
    }
}
