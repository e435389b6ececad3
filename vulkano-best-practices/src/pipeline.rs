//! Shadow state of pipeline layouts and pipelines, and the pipeline creation heuristics.

use crate::{
    descriptor_set::DescriptorSetLayoutState, device::BestPractices, message_ids,
    render_pass::RenderingFormats, LogObject, NonExhaustive, VendorChecks,
};
use ash::vk::{self, Handle};
use std::sync::{atomic::Ordering, Arc};

/// Parameters of a tracked pipeline layout.
#[derive(Clone, Debug, Default)]
pub struct PipelineLayoutCreateInfo {
    pub flags: vk::PipelineLayoutCreateFlags,
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    pub push_constant_ranges: Vec<vk::PushConstantRange>,
    pub _ne: NonExhaustive,
}

/// The shadow state of a pipeline layout.
#[derive(Debug)]
pub struct PipelineLayoutState {
    handle: vk::PipelineLayout,
    set_layouts: Vec<Option<Arc<DescriptorSetLayoutState>>>,
    push_constant_ranges: Vec<vk::PushConstantRange>,
}

impl PipelineLayoutState {
    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.handle
    }

    #[inline]
    pub fn set_layouts(&self) -> &[Option<Arc<DescriptorSetLayoutState>>] {
        &self.set_layouts
    }

    #[inline]
    pub fn push_constant_ranges(&self) -> &[vk::PushConstantRange] {
        &self.push_constant_ranges
    }
}

/// The input assembly state of a graphics pipeline.
#[derive(Clone, Debug)]
pub struct InputAssemblyState {
    pub topology: vk::PrimitiveTopology,
    pub primitive_restart_enable: bool,
    pub _ne: NonExhaustive,
}

impl Default for InputAssemblyState {
    #[inline]
    fn default() -> Self {
        Self {
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            primitive_restart_enable: false,
            _ne: NonExhaustive(()),
        }
    }
}

/// The depth/stencil state of a graphics pipeline.
#[derive(Clone, Debug)]
pub struct DepthStencilState {
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: vk::CompareOp,
    pub stencil_test_enable: bool,
    pub _ne: NonExhaustive,
}

impl Default for DepthStencilState {
    #[inline]
    fn default() -> Self {
        Self {
            depth_test_enable: false,
            depth_write_enable: false,
            depth_compare_op: vk::CompareOp::NEVER,
            stencil_test_enable: false,
            _ne: NonExhaustive(()),
        }
    }
}

/// The blend state of one color attachment of a graphics pipeline.
#[derive(Clone, Debug)]
pub struct ColorBlendAttachmentState {
    pub blend_enable: bool,
    pub color_write_mask: vk::ColorComponentFlags,
    pub _ne: NonExhaustive,
}

impl Default for ColorBlendAttachmentState {
    #[inline]
    fn default() -> Self {
        Self {
            blend_enable: false,
            color_write_mask: vk::ColorComponentFlags::RGBA,
            _ne: NonExhaustive(()),
        }
    }
}

/// The color blend state of a graphics pipeline.
#[derive(Clone, Debug, Default)]
pub struct ColorBlendState {
    pub attachments: Vec<ColorBlendAttachmentState>,
    pub _ne: NonExhaustive,
}

/// Parameters of a graphics pipeline.
#[derive(Clone, Debug)]
pub struct GraphicsPipelineCreateInfo {
    pub flags: vk::PipelineCreateFlags,
    pub layout: vk::PipelineLayout,
    /// The render pass, or `vk::RenderPass::null()` for dynamic rendering.
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
    /// The attachment formats used with dynamic rendering.
    pub rendering: Option<RenderingFormats>,
    pub input_assembly: InputAssemblyState,
    pub depth_stencil: Option<DepthStencilState>,
    pub color_blend: Option<ColorBlendState>,
    pub dynamic_states: Vec<vk::DynamicState>,
    pub _ne: NonExhaustive,
}

impl Default for GraphicsPipelineCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            flags: vk::PipelineCreateFlags::empty(),
            layout: vk::PipelineLayout::null(),
            render_pass: vk::RenderPass::null(),
            subpass: 0,
            rendering: None,
            input_assembly: InputAssemblyState::default(),
            depth_stencil: None,
            color_blend: None,
            dynamic_states: Vec::new(),
            _ne: NonExhaustive(()),
        }
    }
}

/// Parameters of a compute pipeline.
#[derive(Clone, Debug)]
pub struct ComputePipelineCreateInfo {
    pub flags: vk::PipelineCreateFlags,
    pub layout: vk::PipelineLayout,
    pub _ne: NonExhaustive,
}

impl Default for ComputePipelineCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            flags: vk::PipelineCreateFlags::empty(),
            layout: vk::PipelineLayout::null(),
            _ne: NonExhaustive(()),
        }
    }
}

/// The shadow state of a pipeline.
#[derive(Debug)]
pub struct PipelineState {
    handle: vk::Pipeline,
    bind_point: vk::PipelineBindPoint,
    layout: Option<Arc<PipelineLayoutState>>,
    depth_stencil: Option<DepthStencilState>,
    primitive_restart_enable: bool,
    dynamic_depth_compare_op: bool,
    dynamic_depth_test_enable: bool,
    /// The pipeline only writes depth.
    depth_only: bool,
    /// The pipeline tests depth with an op that lets equal depths pass.
    depth_equal_comparison: bool,
    /// The attachments that draws with this pipeline read or write on tile, with their aspects.
    attachment_accesses: Vec<(u32, vk::ImageAspectFlags)>,
}

impl PipelineState {
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.handle
    }

    #[inline]
    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        self.bind_point
    }

    #[inline]
    pub fn layout(&self) -> Option<&Arc<PipelineLayoutState>> {
        self.layout.as_ref()
    }

    #[inline]
    pub fn depth_stencil(&self) -> Option<&DepthStencilState> {
        self.depth_stencil.as_ref()
    }

    #[inline]
    pub fn primitive_restart_enable(&self) -> bool {
        self.primitive_restart_enable
    }

    #[inline]
    pub fn is_depth_only(&self) -> bool {
        self.depth_only
    }

    #[inline]
    pub fn has_depth_equal_comparison(&self) -> bool {
        self.depth_equal_comparison
    }

    #[inline]
    pub(crate) fn dynamic_depth_compare_op(&self) -> bool {
        self.dynamic_depth_compare_op
    }

    #[inline]
    pub(crate) fn dynamic_depth_test_enable(&self) -> bool {
        self.dynamic_depth_test_enable
    }

    #[inline]
    pub(crate) fn attachment_accesses(&self) -> &[(u32, vk::ImageAspectFlags)] {
        &self.attachment_accesses
    }
}

/// # Pipelines
impl BestPractices {
    pub fn record_create_pipeline_layout(
        &self,
        pipeline_layout: vk::PipelineLayout,
        create_info: &PipelineLayoutCreateInfo,
    ) {
        let set_layouts = create_info
            .set_layouts
            .iter()
            .map(|&layout| self.descriptor_set_layouts.get(layout))
            .collect();

        self.pipeline_layouts.insert(
            pipeline_layout,
            PipelineLayoutState {
                handle: pipeline_layout,
                set_layouts,
                push_constant_ranges: create_info.push_constant_ranges.clone(),
            },
        );
    }

    pub fn record_destroy_pipeline_layout(&self, pipeline_layout: vk::PipelineLayout) {
        self.pipeline_layouts.remove(pipeline_layout);
    }

    pub fn validate_create_graphics_pipelines(
        &self,
        pipeline_cache: vk::PipelineCache,
        create_infos: &[GraphicsPipelineCreateInfo],
    ) {
        const LOCATION: &str = "vkCreateGraphicsPipelines";

        self.validate_create_pipelines(LOCATION, pipeline_cache, create_infos.len());

        if self.reporter.vendor_enabled(VendorChecks::AMD) {
            for (index, create_info) in create_infos.iter().enumerate() {
                if create_info.input_assembly.primitive_restart_enable {
                    self.reporter.performance_warning(
                        message_ids::CREATE_PIPELINES_AVOID_PRIMITIVE_RESTART,
                        VendorChecks::AMD,
                        LOCATION,
                        &[],
                        format_args!(
                            "create_infos[{}] enables primitive restart, which can hurt \
                            performance",
                            index,
                        ),
                    );
                }
            }
        }
    }

    pub fn validate_create_compute_pipelines(
        &self,
        pipeline_cache: vk::PipelineCache,
        create_infos: &[ComputePipelineCreateInfo],
    ) {
        self.validate_create_pipelines(
            "vkCreateComputePipelines",
            pipeline_cache,
            create_infos.len(),
        );
    }

    fn validate_create_pipelines(
        &self,
        location: &'static str,
        pipeline_cache: vk::PipelineCache,
        count: usize,
    ) {
        if !self.reporter.vendor_enabled(VendorChecks::AMD) {
            return;
        }

        let num_pipelines = self.num_pipelines.load(Ordering::Relaxed) as usize;

        if num_pipelines + count > self.config.max_pipelines as usize {
            self.reporter.performance_warning(
                message_ids::CREATE_PIPELINES_TOO_MANY_PIPELINES,
                VendorChecks::AMD,
                location,
                &[],
                format_args!(
                    "{} pipelines already exist; keep the number of pipelines below {} and use \
                    dynamic state to reduce it",
                    num_pipelines, self.config.max_pipelines,
                ),
            );
        }

        let last_cache = vk::PipelineCache::from_raw(self.pipeline_cache.load(Ordering::Relaxed));

        if pipeline_cache != vk::PipelineCache::null()
            && last_cache != vk::PipelineCache::null()
            && pipeline_cache != last_cache
        {
            self.reporter.performance_warning(
                message_ids::CREATE_PIPELINES_MULTIPLE_PIPELINE_CACHES,
                VendorChecks::AMD,
                location,
                &[LogObject::from(pipeline_cache), LogObject::from(last_cache)],
                format_args!(
                    "a different pipeline cache was used to create earlier pipelines; use a \
                    single pipeline cache for all pipelines",
                ),
            );
        }
    }

    fn record_pipeline_cache(&self, pipeline_cache: vk::PipelineCache) {
        if pipeline_cache != vk::PipelineCache::null() {
            self.pipeline_cache
                .store(pipeline_cache.as_raw(), Ordering::Relaxed);
        }
    }

    /// Records `vkCreateGraphicsPipelines`. `pipelines` and `create_infos` correspond
    /// one-to-one; null pipelines failed to be created and are skipped.
    pub fn record_create_graphics_pipelines(
        &self,
        pipeline_cache: vk::PipelineCache,
        create_infos: &[GraphicsPipelineCreateInfo],
        pipelines: &[vk::Pipeline],
    ) {
        self.record_pipeline_cache(pipeline_cache);

        for (create_info, &pipeline) in create_infos.iter().zip(pipelines) {
            if pipeline == vk::Pipeline::null() {
                continue;
            }

            let state = self.graphics_pipeline_state(pipeline, create_info);
            self.pipelines.insert(pipeline, state);
            self.num_pipelines.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_create_compute_pipelines(
        &self,
        pipeline_cache: vk::PipelineCache,
        create_infos: &[ComputePipelineCreateInfo],
        pipelines: &[vk::Pipeline],
    ) {
        self.record_pipeline_cache(pipeline_cache);

        for (create_info, &pipeline) in create_infos.iter().zip(pipelines) {
            if pipeline == vk::Pipeline::null() {
                continue;
            }

            self.pipelines.insert(
                pipeline,
                PipelineState {
                    handle: pipeline,
                    bind_point: vk::PipelineBindPoint::COMPUTE,
                    layout: self.pipeline_layouts.get(create_info.layout),
                    depth_stencil: None,
                    primitive_restart_enable: false,
                    dynamic_depth_compare_op: false,
                    dynamic_depth_test_enable: false,
                    depth_only: false,
                    depth_equal_comparison: false,
                    attachment_accesses: Vec::new(),
                },
            );
            self.num_pipelines.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_destroy_pipeline(&self, pipeline: vk::Pipeline) {
        if self.pipelines.remove(pipeline).is_some() {
            let _ = self
                .num_pipelines
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
        }
    }

    fn graphics_pipeline_state(
        &self,
        pipeline: vk::Pipeline,
        create_info: &GraphicsPipelineCreateInfo,
    ) -> PipelineState {
        let depth_stencil = create_info.depth_stencil.clone();
        let depth_only = create_info.color_blend.as_ref().is_some_and(|color_blend| {
            color_blend
                .attachments
                .iter()
                .all(|attachment| attachment.color_write_mask.is_empty())
        });
        let depth_equal_comparison = depth_stencil.as_ref().is_some_and(|depth_stencil| {
            depth_stencil.depth_test_enable
                && matches!(
                    depth_stencil.depth_compare_op,
                    vk::CompareOp::EQUAL
                        | vk::CompareOp::GREATER_OR_EQUAL
                        | vk::CompareOp::LESS_OR_EQUAL,
                )
        });

        PipelineState {
            handle: pipeline,
            bind_point: vk::PipelineBindPoint::GRAPHICS,
            layout: self.pipeline_layouts.get(create_info.layout),
            primitive_restart_enable: create_info.input_assembly.primitive_restart_enable,
            dynamic_depth_compare_op: create_info
                .dynamic_states
                .contains(&vk::DynamicState::DEPTH_COMPARE_OP),
            dynamic_depth_test_enable: create_info
                .dynamic_states
                .contains(&vk::DynamicState::DEPTH_TEST_ENABLE),
            depth_only,
            depth_equal_comparison,
            attachment_accesses: self.attachment_accesses(create_info),
            depth_stencil,
        }
    }

    /// Returns the attachments that draws with a graphics pipeline access.
    ///
    /// Input attachments are always read, color attachments are written when their write mask
    /// isn't empty, and the depth/stencil attachment is accessed when the depth or stencil test
    /// is enabled.
    fn attachment_accesses(
        &self,
        create_info: &GraphicsPipelineCreateInfo,
    ) -> Vec<(u32, vk::ImageAspectFlags)> {
        let mut accesses = Vec::new();

        let writes_color = |index: usize| {
            create_info
                .color_blend
                .as_ref()
                .and_then(|color_blend| color_blend.attachments.get(index))
                .map_or(true, |attachment| !attachment.color_write_mask.is_empty())
        };
        let mut depth_stencil_aspects = vk::ImageAspectFlags::empty();

        if let Some(depth_stencil) = &create_info.depth_stencil {
            if depth_stencil.depth_test_enable {
                depth_stencil_aspects |= vk::ImageAspectFlags::DEPTH;
            }
            if depth_stencil.stencil_test_enable {
                depth_stencil_aspects |= vk::ImageAspectFlags::STENCIL;
            }
        }

        if create_info.render_pass != vk::RenderPass::null() {
            let Some(render_pass) = self.render_passes.get(create_info.render_pass) else {
                return accesses;
            };
            let Some(subpass) = render_pass.subpass(create_info.subpass) else {
                return accesses;
            };

            for &attachment in subpass.input_attachments.iter().flatten() {
                let aspects = render_pass
                    .attachment(attachment)
                    .map_or(vk::ImageAspectFlags::COLOR, |description| {
                        crate::format::format_aspects(description.format)
                    });
                accesses.push((attachment, aspects));
            }

            for (index, attachment) in subpass.color_attachments.iter().enumerate() {
                if let Some(attachment) = *attachment {
                    if writes_color(index) {
                        accesses.push((attachment, vk::ImageAspectFlags::COLOR));
                    }
                }
            }

            if let Some(attachment) = subpass.depth_stencil_attachment {
                if !depth_stencil_aspects.is_empty() {
                    accesses.push((attachment, depth_stencil_aspects));
                }
            }
        } else if let Some(rendering) = &create_info.rendering {
            let color_count = rendering.color_attachment_formats.len() as u32;

            for (index, &format) in rendering.color_attachment_formats.iter().enumerate() {
                if format != vk::Format::UNDEFINED && writes_color(index) {
                    accesses.push((index as u32, vk::ImageAspectFlags::COLOR));
                }
            }

            if depth_stencil_aspects.contains(vk::ImageAspectFlags::DEPTH)
                && rendering.depth_attachment_format != vk::Format::UNDEFINED
            {
                accesses.push((color_count, vk::ImageAspectFlags::DEPTH));
            }

            if depth_stencil_aspects.contains(vk::ImageAspectFlags::STENCIL)
                && rendering.stencil_attachment_format != vk::Format::UNDEFINED
            {
                accesses.push((color_count + 1, vk::ImageAspectFlags::STENCIL));
            }
        }

        accesses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        render_pass::{AttachmentDescription, RenderPassCreateInfo, SubpassDescription},
        tests::{test_layer, test_layer_with},
        BestPracticesConfig,
    };

    fn depth_state(op: vk::CompareOp) -> DepthStencilState {
        DepthStencilState {
            depth_test_enable: true,
            depth_write_enable: true,
            depth_compare_op: op,
            ..Default::default()
        }
    }

    #[test]
    fn pipeline_count_and_caches() {
        let (layer, messages) = test_layer_with(BestPracticesConfig {
            vendor_checks: VendorChecks::AMD,
            max_pipelines: 2,
            ..Default::default()
        });
        let cache_a = vk::PipelineCache::from_raw(1);
        let cache_b = vk::PipelineCache::from_raw(2);
        let infos = [
            GraphicsPipelineCreateInfo::default(),
            GraphicsPipelineCreateInfo::default(),
        ];

        layer.validate_create_graphics_pipelines(cache_a, &infos);
        layer.record_create_graphics_pipelines(
            cache_a,
            &infos,
            &[vk::Pipeline::from_raw(10), vk::Pipeline::from_raw(11)],
        );
        assert!(messages.ids().is_empty());

        layer.validate_create_compute_pipelines(
            cache_b,
            &[ComputePipelineCreateInfo::default()],
        );
        assert_eq!(
            messages.ids(),
            [
                message_ids::CREATE_PIPELINES_TOO_MANY_PIPELINES,
                message_ids::CREATE_PIPELINES_MULTIPLE_PIPELINE_CACHES,
            ],
        );
        messages.clear();

        // The last cache wins.
        layer.record_create_compute_pipelines(
            cache_b,
            &[ComputePipelineCreateInfo::default()],
            &[vk::Pipeline::null()],
        );
        layer.record_destroy_pipeline(vk::Pipeline::from_raw(10));
        layer.validate_create_compute_pipelines(
            cache_b,
            &[ComputePipelineCreateInfo::default()],
        );
        layer.validate_create_compute_pipelines(
            vk::PipelineCache::null(),
            &[ComputePipelineCreateInfo::default()],
        );
        assert!(messages.ids().is_empty());
    }

    #[test]
    fn primitive_restart() {
        let (layer, messages) = test_layer(VendorChecks::AMD);

        layer.validate_create_graphics_pipelines(
            vk::PipelineCache::null(),
            &[
                GraphicsPipelineCreateInfo::default(),
                GraphicsPipelineCreateInfo {
                    input_assembly: InputAssemblyState {
                        primitive_restart_enable: true,
                        ..Default::default()
                    },
                    ..Default::default()
                },
            ],
        );
        assert_eq!(
            messages.ids(),
            [message_ids::CREATE_PIPELINES_AVOID_PRIMITIVE_RESTART],
        );
    }

    #[test]
    fn depth_flags_and_render_pass_accesses() {
        let (layer, _) = test_layer(VendorChecks::empty());
        let render_pass = vk::RenderPass::from_raw(1);
        layer.record_create_render_pass(
            render_pass,
            RenderPassCreateInfo {
                attachments: vec![
                    AttachmentDescription {
                        format: vk::Format::R8G8B8A8_UNORM,
                        ..Default::default()
                    },
                    AttachmentDescription {
                        format: vk::Format::D16_UNORM,
                        ..Default::default()
                    },
                    AttachmentDescription {
                        format: vk::Format::R8G8B8A8_UNORM,
                        ..Default::default()
                    },
                ],
                subpasses: vec![SubpassDescription {
                    input_attachments: vec![Some(2)],
                    color_attachments: vec![Some(0)],
                    depth_stencil_attachment: Some(1),
                    ..Default::default()
                }],
                ..Default::default()
            },
        );

        let pipeline = vk::Pipeline::from_raw(9);
        layer.record_create_graphics_pipelines(
            vk::PipelineCache::null(),
            &[GraphicsPipelineCreateInfo {
                render_pass,
                depth_stencil: Some(depth_state(vk::CompareOp::LESS_OR_EQUAL)),
                color_blend: Some(ColorBlendState {
                    attachments: vec![ColorBlendAttachmentState {
                        color_write_mask: vk::ColorComponentFlags::empty(),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
                dynamic_states: vec![vk::DynamicState::DEPTH_COMPARE_OP],
                ..Default::default()
            }],
            &[pipeline],
        );

        let state = layer.pipelines.get(pipeline).unwrap();
        assert!(state.is_depth_only());
        assert!(state.has_depth_equal_comparison());
        assert!(state.dynamic_depth_compare_op());
        assert!(!state.dynamic_depth_test_enable());
        assert_eq!(
            state.attachment_accesses(),
            [
                (2, vk::ImageAspectFlags::COLOR),
                (1, vk::ImageAspectFlags::DEPTH),
            ],
        );
    }

    #[test]
    fn dynamic_rendering_accesses() {
        let (layer, _) = test_layer(VendorChecks::empty());
        let pipeline = vk::Pipeline::from_raw(9);

        layer.record_create_graphics_pipelines(
            vk::PipelineCache::null(),
            &[GraphicsPipelineCreateInfo {
                rendering: Some(RenderingFormats {
                    color_attachment_formats: vec![
                        vk::Format::R8G8B8A8_UNORM,
                        vk::Format::UNDEFINED,
                    ],
                    depth_attachment_format: vk::Format::D24_UNORM_S8_UINT,
                    stencil_attachment_format: vk::Format::D24_UNORM_S8_UINT,
                    ..Default::default()
                }),
                depth_stencil: Some(DepthStencilState {
                    stencil_test_enable: true,
                    ..depth_state(vk::CompareOp::GREATER)
                }),
                ..Default::default()
            }],
            &[pipeline],
        );

        let state = layer.pipelines.get(pipeline).unwrap();
        assert!(!state.is_depth_only());
        assert!(!state.has_depth_equal_comparison());
        assert_eq!(
            state.attachment_accesses(),
            [
                (0, vk::ImageAspectFlags::COLOR),
                (2, vk::ImageAspectFlags::DEPTH),
                (3, vk::ImageAspectFlags::STENCIL),
            ],
        );
    }
}
