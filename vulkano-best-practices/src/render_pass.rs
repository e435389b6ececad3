//! Shadow state of render passes and framebuffers, and the parameters of render pass instances.

use crate::{
    clear_color::ClearValue,
    device::BestPractices,
    format,
    image::{ImageViewState, SubresourceRange},
    NonExhaustive,
};
use ash::vk;
use smallvec::SmallVec;
use std::sync::Arc;

/// Describes one attachment of a render pass.
#[derive(Clone, Debug)]
pub struct AttachmentDescription {
    pub flags: vk::AttachmentDescriptionFlags,
    pub format: vk::Format,
    pub samples: vk::SampleCountFlags,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub stencil_load_op: vk::AttachmentLoadOp,
    pub stencil_store_op: vk::AttachmentStoreOp,
    pub initial_layout: vk::ImageLayout,
    pub final_layout: vk::ImageLayout,
    pub _ne: NonExhaustive,
}

impl Default for AttachmentDescription {
    #[inline]
    fn default() -> Self {
        Self {
            flags: vk::AttachmentDescriptionFlags::empty(),
            format: vk::Format::UNDEFINED,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::DONT_CARE,
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::GENERAL,
            _ne: NonExhaustive(()),
        }
    }
}

/// Describes one subpass of a render pass. Attachment references are indices into
/// [`RenderPassCreateInfo::attachments`], `None` for `VK_ATTACHMENT_UNUSED`.
#[derive(Clone, Debug, Default)]
pub struct SubpassDescription {
    pub input_attachments: Vec<Option<u32>>,
    pub color_attachments: Vec<Option<u32>>,
    pub resolve_attachments: Vec<Option<u32>>,
    pub depth_stencil_attachment: Option<u32>,
    pub preserve_attachments: Vec<u32>,
    pub _ne: NonExhaustive,
}

/// Parameters of a tracked render pass.
#[derive(Clone, Debug, Default)]
pub struct RenderPassCreateInfo {
    pub flags: vk::RenderPassCreateFlags,
    pub attachments: Vec<AttachmentDescription>,
    pub subpasses: Vec<SubpassDescription>,
    pub _ne: NonExhaustive,
}

/// The shadow state of a render pass.
#[derive(Debug)]
pub struct RenderPassState {
    handle: vk::RenderPass,
    create_info: RenderPassCreateInfo,
}

impl RenderPassState {
    #[inline]
    pub fn handle(&self) -> vk::RenderPass {
        self.handle
    }

    #[inline]
    pub fn create_info(&self) -> &RenderPassCreateInfo {
        &self.create_info
    }

    #[inline]
    pub fn subpass(&self, index: u32) -> Option<&SubpassDescription> {
        self.create_info.subpasses.get(index as usize)
    }

    #[inline]
    pub fn attachment(&self, index: u32) -> Option<&AttachmentDescription> {
        self.create_info.attachments.get(index as usize)
    }
}

/// Parameters of a tracked framebuffer.
#[derive(Clone, Debug)]
pub struct FramebufferCreateInfo {
    pub flags: vk::FramebufferCreateFlags,
    pub render_pass: vk::RenderPass,
    /// The attachments, empty for an imageless framebuffer.
    pub attachments: Vec<vk::ImageView>,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub _ne: NonExhaustive,
}

impl Default for FramebufferCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            flags: vk::FramebufferCreateFlags::empty(),
            render_pass: vk::RenderPass::null(),
            attachments: Vec::new(),
            width: 0,
            height: 0,
            layers: 1,
            _ne: NonExhaustive(()),
        }
    }
}

/// The shadow state of a framebuffer.
#[derive(Debug)]
pub struct FramebufferState {
    handle: vk::Framebuffer,
    create_info: FramebufferCreateInfo,
    attachments: Vec<Option<Arc<ImageViewState>>>,
}

impl FramebufferState {
    #[inline]
    pub fn handle(&self) -> vk::Framebuffer {
        self.handle
    }

    #[inline]
    pub fn create_info(&self) -> &FramebufferCreateInfo {
        &self.create_info
    }

    #[inline]
    pub fn is_imageless(&self) -> bool {
        self.create_info
            .flags
            .contains(vk::FramebufferCreateFlags::IMAGELESS)
    }
}

/// Parameters of `vkCmdBeginRenderPass`.
#[derive(Clone, Debug)]
pub struct RenderPassBeginInfo {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub render_area: vk::Rect2D,
    /// Clear values indexed by attachment. Only those of attachments cleared on load are read.
    pub clear_values: Vec<ClearValue>,
    /// The attachments of an imageless framebuffer.
    pub attachments: Vec<vk::ImageView>,
    pub _ne: NonExhaustive,
}

impl Default for RenderPassBeginInfo {
    #[inline]
    fn default() -> Self {
        Self {
            render_pass: vk::RenderPass::null(),
            framebuffer: vk::Framebuffer::null(),
            render_area: vk::Rect2D::default(),
            clear_values: Vec::new(),
            attachments: Vec::new(),
            _ne: NonExhaustive(()),
        }
    }
}

/// One attachment of `vkCmdBeginRendering`.
#[derive(Clone, Debug)]
pub struct RenderingAttachmentInfo {
    pub image_view: vk::ImageView,
    pub image_layout: vk::ImageLayout,
    pub resolve_mode: vk::ResolveModeFlags,
    pub resolve_image_view: vk::ImageView,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub clear_value: ClearValue,
    pub _ne: NonExhaustive,
}

impl Default for RenderingAttachmentInfo {
    #[inline]
    fn default() -> Self {
        Self {
            image_view: vk::ImageView::null(),
            image_layout: vk::ImageLayout::UNDEFINED,
            resolve_mode: vk::ResolveModeFlags::NONE,
            resolve_image_view: vk::ImageView::null(),
            load_op: vk::AttachmentLoadOp::DONT_CARE,
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            clear_value: ClearValue::default(),
            _ne: NonExhaustive(()),
        }
    }
}

/// Parameters of `vkCmdBeginRendering`.
#[derive(Clone, Debug)]
pub struct RenderingInfo {
    pub flags: vk::RenderingFlags,
    pub render_area: vk::Rect2D,
    pub layer_count: u32,
    pub view_mask: u32,
    pub color_attachments: Vec<Option<RenderingAttachmentInfo>>,
    pub depth_attachment: Option<RenderingAttachmentInfo>,
    pub stencil_attachment: Option<RenderingAttachmentInfo>,
    pub _ne: NonExhaustive,
}

impl Default for RenderingInfo {
    #[inline]
    fn default() -> Self {
        Self {
            flags: vk::RenderingFlags::empty(),
            render_area: vk::Rect2D::default(),
            layer_count: 1,
            view_mask: 0,
            color_attachments: Vec::new(),
            depth_attachment: None,
            stencil_attachment: None,
            _ne: NonExhaustive(()),
        }
    }
}

/// The attachment formats of a dynamic rendering instance, as declared by a pipeline or by the
/// inheritance info of a secondary command buffer.
#[derive(Clone, Debug, Default)]
pub struct RenderingFormats {
    pub color_attachment_formats: Vec<vk::Format>,
    pub depth_attachment_format: vk::Format,
    pub stencil_attachment_format: vk::Format,
    pub _ne: NonExhaustive,
}

/// One attachment of the render pass instance a command buffer is recording into.
#[derive(Clone, Debug)]
pub(crate) struct ActiveAttachment {
    pub(crate) image_view: Option<Arc<ImageViewState>>,
    pub(crate) format: vk::Format,
    /// The aspects this attachment stands for.
    pub(crate) aspects: vk::ImageAspectFlags,
    pub(crate) load_op: vk::AttachmentLoadOp,
    pub(crate) store_op: vk::AttachmentStoreOp,
    pub(crate) stencil_load_op: vk::AttachmentLoadOp,
    pub(crate) stencil_store_op: vk::AttachmentStoreOp,
    pub(crate) clear_value: Option<ClearValue>,
}

impl ActiveAttachment {
    fn unused() -> Self {
        ActiveAttachment {
            image_view: None,
            format: vk::Format::UNDEFINED,
            aspects: vk::ImageAspectFlags::empty(),
            load_op: vk::AttachmentLoadOp::DONT_CARE,
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            clear_value: None,
        }
    }

    /// Returns whether the contents of the attachment are loaded into tile memory.
    pub(crate) fn loads(&self) -> bool {
        self.aspects
            .intersects(vk::ImageAspectFlags::COLOR | vk::ImageAspectFlags::DEPTH)
            && self.load_op == vk::AttachmentLoadOp::LOAD
            || self.aspects.contains(vk::ImageAspectFlags::STENCIL)
                && self.stencil_load_op == vk::AttachmentLoadOp::LOAD
    }

    /// Returns whether the attachment is cleared on load.
    pub(crate) fn clears(&self) -> bool {
        self.aspects
            .intersects(vk::ImageAspectFlags::COLOR | vk::ImageAspectFlags::DEPTH)
            && self.load_op == vk::AttachmentLoadOp::CLEAR
            || self.aspects.contains(vk::ImageAspectFlags::STENCIL)
                && self.stencil_load_op == vk::AttachmentLoadOp::CLEAR
    }

    /// Returns whether the contents of the attachment are written back to memory.
    pub(crate) fn stores(&self) -> bool {
        self.aspects
            .intersects(vk::ImageAspectFlags::COLOR | vk::ImageAspectFlags::DEPTH)
            && self.store_op == vk::AttachmentStoreOp::STORE
            || self.aspects.contains(vk::ImageAspectFlags::STENCIL)
                && self.stencil_store_op == vk::AttachmentStoreOp::STORE
    }

    /// Returns the aspects that are loaded or stored.
    pub(crate) fn aspects_on_tile(&self) -> vk::ImageAspectFlags {
        let mut aspects = vk::ImageAspectFlags::empty();
        let color_depth =
            self.aspects & (vk::ImageAspectFlags::COLOR | vk::ImageAspectFlags::DEPTH);

        if self.load_op == vk::AttachmentLoadOp::LOAD
            || self.store_op == vk::AttachmentStoreOp::STORE
        {
            aspects |= color_depth;
        }

        if self.aspects.contains(vk::ImageAspectFlags::STENCIL)
            && (self.stencil_load_op == vk::AttachmentLoadOp::LOAD
                || self.stencil_store_op == vk::AttachmentStoreOp::STORE)
        {
            aspects |= vk::ImageAspectFlags::STENCIL;
        }

        aspects
    }

    /// Returns the depth load op for a depth attachment, the stencil one for stencil-only.
    pub(crate) fn depth_stencil_load_op(&self) -> vk::AttachmentLoadOp {
        if self.aspects.contains(vk::ImageAspectFlags::DEPTH) {
            self.load_op
        } else {
            self.stencil_load_op
        }
    }

    pub(crate) fn depth_stencil_store_op(&self) -> vk::AttachmentStoreOp {
        if self.aspects.contains(vk::ImageAspectFlags::DEPTH) {
            self.store_op
        } else {
            self.stencil_store_op
        }
    }
}

/// The render pass instance a command buffer is recording into.
///
/// For a render pass object, attachment indices are those of the render pass. For dynamic
/// rendering, the color attachments come first, followed by the depth attachment and then the
/// stencil attachment.
#[derive(Clone, Debug)]
pub(crate) struct ActiveRenderPass {
    /// `None` for dynamic rendering.
    pub(crate) render_pass: Option<Arc<RenderPassState>>,
    pub(crate) subpass: u32,
    pub(crate) render_area: vk::Rect2D,
    pub(crate) rendering_flags: vk::RenderingFlags,
    pub(crate) attachments: Vec<ActiveAttachment>,
    /// The attachment used by each color attachment of the current subpass.
    pub(crate) color_attachments: Vec<Option<u32>>,
    pub(crate) depth_attachment: Option<u32>,
    pub(crate) stencil_attachment: Option<u32>,
}

impl ActiveRenderPass {
    pub(crate) fn new_render_pass(
        render_pass: Arc<RenderPassState>,
        render_area: vk::Rect2D,
        image_views: &[Option<Arc<ImageViewState>>],
        clear_values: &[ClearValue],
    ) -> Self {
        let attachments = render_pass
            .create_info
            .attachments
            .iter()
            .enumerate()
            .map(|(index, description)| ActiveAttachment {
                image_view: image_views.get(index).cloned().flatten(),
                format: description.format,
                aspects: format::format_aspects(description.format),
                load_op: description.load_op,
                store_op: description.store_op,
                stencil_load_op: description.stencil_load_op,
                stencil_store_op: description.stencil_store_op,
                clear_value: clear_values.get(index).copied(),
            })
            .collect();

        let mut active = ActiveRenderPass {
            render_pass: Some(render_pass),
            subpass: 0,
            render_area,
            rendering_flags: vk::RenderingFlags::empty(),
            attachments,
            color_attachments: Vec::new(),
            depth_attachment: None,
            stencil_attachment: None,
        };
        active.set_subpass(0);

        active
    }

    pub(crate) fn new_rendering(
        rendering_info: &RenderingInfo,
        image_view: impl Fn(vk::ImageView) -> Option<Arc<ImageViewState>>,
    ) -> Self {
        let attachment = |info: &RenderingAttachmentInfo, aspects: vk::ImageAspectFlags| {
            let image_view = image_view(info.image_view);
            let format = image_view
                .as_ref()
                .map_or(vk::Format::UNDEFINED, |view| view.format());
            let (load_op, store_op, stencil_load_op, stencil_store_op) =
                if aspects == vk::ImageAspectFlags::STENCIL {
                    (
                        vk::AttachmentLoadOp::DONT_CARE,
                        vk::AttachmentStoreOp::DONT_CARE,
                        info.load_op,
                        info.store_op,
                    )
                } else {
                    (
                        info.load_op,
                        info.store_op,
                        vk::AttachmentLoadOp::DONT_CARE,
                        vk::AttachmentStoreOp::DONT_CARE,
                    )
                };

            ActiveAttachment {
                image_view,
                format,
                aspects,
                load_op,
                store_op,
                stencil_load_op,
                stencil_store_op,
                clear_value: Some(info.clear_value),
            }
        };

        let mut attachments: Vec<_> = rendering_info
            .color_attachments
            .iter()
            .map(|info| match info {
                Some(info) => attachment(info, vk::ImageAspectFlags::COLOR),
                None => ActiveAttachment::unused(),
            })
            .collect();
        let color_count = attachments.len() as u32;
        let color_attachments = (0..color_count)
            .map(|index| rendering_info.color_attachments[index as usize].as_ref().map(|_| index))
            .collect();

        let depth_attachment = rendering_info.depth_attachment.as_ref().map(|info| {
            attachments.push(attachment(info, vk::ImageAspectFlags::DEPTH));
            color_count
        });
        if depth_attachment.is_none() {
            attachments.push(ActiveAttachment::unused());
        }

        let stencil_attachment = rendering_info.stencil_attachment.as_ref().map(|info| {
            attachments.push(attachment(info, vk::ImageAspectFlags::STENCIL));
            color_count + 1
        });

        ActiveRenderPass {
            render_pass: None,
            subpass: 0,
            render_area: rendering_info.render_area,
            rendering_flags: rendering_info.flags,
            attachments,
            color_attachments,
            depth_attachment,
            stencil_attachment,
        }
    }

    /// Creates the render pass instance that a secondary command buffer continues.
    pub(crate) fn new_inherited_render_pass(
        render_pass: Arc<RenderPassState>,
        subpass: u32,
        image_views: &[Option<Arc<ImageViewState>>],
    ) -> Self {
        let mut active =
            ActiveRenderPass::new_render_pass(render_pass, vk::Rect2D::default(), image_views, &[]);
        active.set_subpass(subpass);

        active
    }

    /// Creates the dynamic rendering instance that a secondary command buffer continues.
    pub(crate) fn new_inherited_rendering(formats: &RenderingFormats) -> Self {
        let rendering_info = RenderingInfo {
            color_attachments: formats
                .color_attachment_formats
                .iter()
                .map(|&format| {
                    (format != vk::Format::UNDEFINED).then(RenderingAttachmentInfo::default)
                })
                .collect(),
            depth_attachment: (formats.depth_attachment_format != vk::Format::UNDEFINED)
                .then(RenderingAttachmentInfo::default),
            stencil_attachment: (formats.stencil_attachment_format != vk::Format::UNDEFINED)
                .then(RenderingAttachmentInfo::default),
            ..Default::default()
        };
        let mut active = ActiveRenderPass::new_rendering(&rendering_info, |_| None);

        for (attachment, &format) in active.attachments.iter_mut().zip(
            formats
                .color_attachment_formats
                .iter()
                .chain([&formats.depth_attachment_format, &formats.stencil_attachment_format]),
        ) {
            attachment.format = format;
        }

        active
    }

    /// Moves to `subpass` of the render pass object.
    pub(crate) fn set_subpass(&mut self, subpass: u32) {
        self.subpass = subpass;

        let Some(description) = self
            .render_pass
            .as_ref()
            .and_then(|render_pass| render_pass.subpass(subpass))
        else {
            return;
        };

        self.color_attachments = description.color_attachments.clone();
        self.depth_attachment = description.depth_stencil_attachment.filter(|&index| {
            self.attachments
                .get(index as usize)
                .is_some_and(|attachment| attachment.aspects.contains(vk::ImageAspectFlags::DEPTH))
        });
        self.stencil_attachment = description.depth_stencil_attachment.filter(|&index| {
            self.attachments
                .get(index as usize)
                .is_some_and(|attachment| {
                    attachment.aspects.contains(vk::ImageAspectFlags::STENCIL)
                })
        });
    }

    #[inline]
    pub(crate) fn attachment(&self, index: u32) -> Option<&ActiveAttachment> {
        self.attachments.get(index as usize)
    }

    /// Returns the attachment used as depth attachment of the current subpass, or failing that,
    /// as stencil attachment.
    pub(crate) fn depth_stencil_attachment(&self) -> Option<u32> {
        self.depth_attachment.or(self.stencil_attachment)
    }

    /// Returns whether any subpass of the render pass uses a depth/stencil attachment and any
    /// uses color attachments.
    pub(crate) fn has_depth_and_color_attachments(&self) -> (bool, bool) {
        match &self.render_pass {
            Some(render_pass) => render_pass.create_info.subpasses.iter().fold(
                (false, false),
                |(depth, color), subpass| {
                    (
                        depth || subpass.depth_stencil_attachment.is_some(),
                        color || !subpass.color_attachments.is_empty(),
                    )
                },
            ),
            None => (
                self.depth_stencil_attachment().is_some(),
                self.color_attachments.iter().any(Option::is_some),
            ),
        }
    }

    /// Returns the attachments that a `vkCmdClearAttachments` entry targets, with the aspects
    /// cleared in each.
    pub(crate) fn clear_targets(
        &self,
        aspects: vk::ImageAspectFlags,
        color_attachment: u32,
    ) -> SmallVec<[(u32, vk::ImageAspectFlags); 2]> {
        let mut targets = SmallVec::new();

        if aspects.contains(vk::ImageAspectFlags::COLOR) {
            if let Some(&Some(attachment)) = self.color_attachments.get(color_attachment as usize)
            {
                targets.push((attachment, vk::ImageAspectFlags::COLOR));
            }
        }

        let depth = aspects & vk::ImageAspectFlags::DEPTH;
        let stencil = aspects & vk::ImageAspectFlags::STENCIL;

        match (self.depth_attachment, self.stencil_attachment) {
            (Some(d), Some(s)) if d == s => {
                if !(depth | stencil).is_empty() {
                    targets.push((d, depth | stencil));
                }
            }
            (depth_attachment, stencil_attachment) => {
                if let Some(d) = depth_attachment.filter(|_| !depth.is_empty()) {
                    targets.push((d, depth));
                }
                if let Some(s) = stencil_attachment.filter(|_| !stencil.is_empty()) {
                    targets.push((s, stencil));
                }
            }
        }

        targets
    }

    /// Returns the image and subresources of the depth attachment of the current subpass.
    pub(crate) fn depth_view(&self) -> Option<(&Arc<ImageViewState>, SubresourceRange)> {
        let attachment = self.attachment(self.depth_attachment?)?;
        let view = attachment.image_view.as_ref()?;

        Some((view, view.subresource_range().clone()))
    }
}

/// # Render passes and framebuffers
impl BestPractices {
    pub fn record_create_render_pass(
        &self,
        render_pass: vk::RenderPass,
        create_info: RenderPassCreateInfo,
    ) {
        self.render_passes.insert(
            render_pass,
            RenderPassState {
                handle: render_pass,
                create_info,
            },
        );
    }

    pub fn record_destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.render_passes.remove(render_pass);
    }

    pub fn record_create_framebuffer(
        &self,
        framebuffer: vk::Framebuffer,
        create_info: FramebufferCreateInfo,
    ) {
        let attachments = create_info
            .attachments
            .iter()
            .map(|&view| self.image_views.get(view))
            .collect();

        self.framebuffers.insert(
            framebuffer,
            FramebufferState {
                handle: framebuffer,
                create_info,
                attachments,
            },
        );
    }

    pub fn record_destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.framebuffers.remove(framebuffer);
    }

    /// Returns the image views of a render pass instance, taken from the framebuffer or from the
    /// begin info for an imageless framebuffer.
    pub(crate) fn framebuffer_attachments(
        &self,
        framebuffer: vk::Framebuffer,
        imageless_attachments: &[vk::ImageView],
    ) -> Vec<Option<Arc<ImageViewState>>> {
        match self.framebuffers.get(framebuffer) {
            Some(framebuffer) if !framebuffer.is_imageless() => framebuffer.attachments.clone(),
            _ => imageless_attachments
                .iter()
                .map(|&view| self.image_views.get(view))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{ImageCreateInfo, ImageViewCreateInfo};
    use ash::vk::Handle;

    fn color_depth_render_pass() -> RenderPassCreateInfo {
        RenderPassCreateInfo {
            attachments: vec![
                AttachmentDescription {
                    format: vk::Format::R8G8B8A8_UNORM,
                    load_op: vk::AttachmentLoadOp::CLEAR,
                    store_op: vk::AttachmentStoreOp::STORE,
                    ..Default::default()
                },
                AttachmentDescription {
                    format: vk::Format::D24_UNORM_S8_UINT,
                    load_op: vk::AttachmentLoadOp::LOAD,
                    store_op: vk::AttachmentStoreOp::DONT_CARE,
                    stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
                    stencil_store_op: vk::AttachmentStoreOp::STORE,
                    ..Default::default()
                },
            ],
            subpasses: vec![SubpassDescription {
                color_attachments: vec![Some(0)],
                depth_stencil_attachment: Some(1),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn render_pass_attachments() {
        let (layer, _) = crate::tests::test_layer(Default::default());
        let render_pass = vk::RenderPass::from_raw(1);
        layer.record_create_render_pass(render_pass, color_depth_render_pass());

        let active = ActiveRenderPass::new_render_pass(
            layer.render_passes.get(render_pass).unwrap(),
            vk::Rect2D::default(),
            &[],
            &[],
        );

        assert_eq!(active.color_attachments, [Some(0)]);
        assert_eq!(active.depth_attachment, Some(1));
        assert_eq!(active.stencil_attachment, Some(1));
        assert_eq!(
            active.clear_targets(
                vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
                0,
            )
            .as_slice(),
            [(1, vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL)],
        );
        assert_eq!(
            active.clear_targets(vk::ImageAspectFlags::COLOR, 1).as_slice(),
            [],
        );

        let color = active.attachment(0).unwrap();
        assert!(color.clears() && color.stores() && !color.loads());
        let depth = active.attachment(1).unwrap();
        assert!(depth.loads() && depth.stores());
        assert_eq!(
            depth.aspects_on_tile(),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
        );
        assert_eq!(active.has_depth_and_color_attachments(), (true, true));
    }

    #[test]
    fn dynamic_rendering_layout() {
        let (layer, _) = crate::tests::test_layer(Default::default());
        let image = vk::Image::from_raw(1);
        let view = vk::ImageView::from_raw(2);
        layer.record_create_image(
            image,
            ImageCreateInfo {
                format: vk::Format::D32_SFLOAT_S8_UINT,
                ..Default::default()
            },
        );
        layer.record_create_image_view(
            view,
            &ImageViewCreateInfo {
                image,
                ..Default::default()
            },
        );

        let active = ActiveRenderPass::new_rendering(
            &RenderingInfo {
                color_attachments: vec![None, Some(RenderingAttachmentInfo::default())],
                depth_attachment: Some(RenderingAttachmentInfo {
                    image_view: view,
                    load_op: vk::AttachmentLoadOp::CLEAR,
                    ..Default::default()
                }),
                stencil_attachment: Some(RenderingAttachmentInfo {
                    image_view: view,
                    load_op: vk::AttachmentLoadOp::LOAD,
                    ..Default::default()
                }),
                ..Default::default()
            },
            |view| layer.image_views.get(view),
        );

        assert_eq!(active.attachments.len(), 4);
        assert_eq!(active.color_attachments, [None, Some(1)]);
        assert_eq!(active.depth_attachment, Some(2));
        assert_eq!(active.stencil_attachment, Some(3));
        assert!(active.attachment(2).unwrap().clears());
        assert!(active.attachment(3).unwrap().loads());
        assert_eq!(
            active.clear_targets(
                vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
                0,
            )
            .as_slice(),
            [
                (2, vk::ImageAspectFlags::DEPTH),
                (3, vk::ImageAspectFlags::STENCIL),
            ],
        );
        let (depth_view, range) = active.depth_view().unwrap();
        assert_eq!(depth_view.handle(), view);
        assert_eq!(range.array_layers, 0..1);
    }
}
