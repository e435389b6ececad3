use crate::{
    command_buffer::{IndexBufferBinding, PushConstantData},
    device::BestPractices,
    VendorChecks,
};
use ash::vk;

/// # Bind and push commands
impl BestPractices {
    pub fn record_cmd_bind_pipeline(
        &self,
        command_buffer: vk::CommandBuffer,
        pipeline_bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    ) {
        let Some(state) = self.command_buffer(command_buffer) else {
            return;
        };
        let mut state = state.lock();
        let pipeline = self.pipelines.get(pipeline);

        if let Some(binding) = state.binding_mut(pipeline_bind_point) {
            binding.pipeline = pipeline.clone();
        }

        if pipeline_bind_point != vk::PipelineBindPoint::GRAPHICS {
            return;
        }

        let Some(pipeline) = pipeline else {
            return;
        };

        let tracker = &mut state.attachments;
        tracker.depth_only = pipeline.is_depth_only();
        tracker.depth_equal_comparison = pipeline.has_depth_equal_comparison();
        tracker.next_draw_touches = pipeline.attachment_accesses().to_vec();
        tracker.draw_touches_attachments = true;

        if self.reporter.vendor_enabled(VendorChecks::NVIDIA) {
            let depth_stencil = pipeline.depth_stencil();

            if !pipeline.dynamic_depth_compare_op() {
                if let Some(depth_stencil) = depth_stencil {
                    state.zcull.set_depth_compare_op(depth_stencil.depth_compare_op);
                }
            }

            if !pipeline.dynamic_depth_test_enable() {
                state.zcull.set_depth_test_enable(
                    depth_stencil.is_some_and(|depth_stencil| depth_stencil.depth_test_enable),
                );
            }
        }
    }

    /// Records `vkCmdBindDescriptorSets`. Sets that aren't tracked are bound as unknown.
    pub fn record_cmd_bind_descriptor_sets(
        &self,
        command_buffer: vk::CommandBuffer,
        pipeline_bind_point: vk::PipelineBindPoint,
        _layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
    ) {
        let Some(state) = self.command_buffer(command_buffer) else {
            return;
        };
        let mut state = state.lock();
        let Some(binding) = state.binding_mut(pipeline_bind_point) else {
            return;
        };

        let first_set = first_set as usize;
        let end = first_set + descriptor_sets.len();

        if binding.descriptor_sets.len() < end {
            binding.descriptor_sets.resize(end, None);
        }

        for (slot, &set) in binding.descriptor_sets[first_set..end]
            .iter_mut()
            .zip(descriptor_sets)
        {
            *slot = self.descriptor_sets.get(set);
        }
    }

    pub fn record_cmd_bind_index_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    ) {
        let Some(state) = self.command_buffer(command_buffer) else {
            return;
        };

        state.lock().index_buffer =
            self.buffers
                .get(buffer)
                .map(|buffer| IndexBufferBinding {
                    buffer,
                    offset,
                    index_type,
                });
    }

    /// Records `vkCmdPushConstants`. Every call is kept as a separate chunk until the command
    /// buffer is reset.
    pub fn record_cmd_push_constants(
        &self,
        command_buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        stage_flags: vk::ShaderStageFlags,
        offset: u32,
        values: &[u8],
    ) {
        let Some(state) = self.command_buffer(command_buffer) else {
            return;
        };

        state.lock().push_constants.push(PushConstantData {
            layout,
            stage_flags,
            offset,
            values: values.to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        buffer::BufferCreateInfo,
        command_buffer::tests::primary,
        pipeline::{DepthStencilState, GraphicsPipelineCreateInfo},
        tests::test_layer,
        VendorChecks,
    };
    use ash::vk::{self, Handle};

    #[test]
    fn bind_pipeline_sets_depth_state() {
        let (layer, _) = test_layer(VendorChecks::NVIDIA);
        let command_buffer = primary(&layer, 1);
        let pipeline = vk::Pipeline::from_raw(3);

        layer.record_create_graphics_pipelines(
            vk::PipelineCache::null(),
            &[GraphicsPipelineCreateInfo {
                depth_stencil: Some(DepthStencilState {
                    depth_test_enable: true,
                    depth_write_enable: true,
                    depth_compare_op: vk::CompareOp::GREATER,
                    ..Default::default()
                }),
                ..Default::default()
            }],
            &[pipeline],
        );
        layer.record_cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);

        let state = layer.command_buffer(command_buffer).unwrap();
        let state = state.lock();
        assert_eq!(state.graphics.pipeline.as_ref().unwrap().handle(), pipeline);
        assert!(state.compute.pipeline.is_none());
        assert!(state.attachments.draw_touches_attachments);
        assert!(state.zcull.depth_test_enable());
        assert_eq!(state.zcull.depth_compare_op(), Some(vk::CompareOp::GREATER));
    }

    #[test]
    fn bindings_and_push_constants() {
        let (layer, _) = test_layer(VendorChecks::empty());
        let command_buffer = primary(&layer, 1);
        let buffer = vk::Buffer::from_raw(4);

        layer.record_create_buffer(buffer, BufferCreateInfo::default());
        layer.record_cmd_bind_index_buffer(command_buffer, buffer, 16, vk::IndexType::UINT16);
        layer.record_cmd_bind_descriptor_sets(
            command_buffer,
            vk::PipelineBindPoint::COMPUTE,
            vk::PipelineLayout::null(),
            2,
            &[vk::DescriptorSet::from_raw(9)],
        );
        layer.record_cmd_push_constants(
            command_buffer,
            vk::PipelineLayout::from_raw(5),
            vk::ShaderStageFlags::COMPUTE,
            4,
            &[1, 2, 3, 4],
        );

        let state = layer.command_buffer(command_buffer).unwrap();
        let state = state.lock();
        let index_buffer = state.index_buffer.as_ref().unwrap();
        assert_eq!(index_buffer.offset, 16);
        assert_eq!(index_buffer.index_type, vk::IndexType::UINT16);
        assert_eq!(state.compute.descriptor_sets.len(), 3);
        assert!(state.graphics.descriptor_sets.is_empty());
        assert_eq!(state.push_constants.len(), 1);
        assert_eq!(state.push_constants[0].values, [1, 2, 3, 4]);
    }
}
