use crate::linear_map::LinearMap;
use ash::vk;
use smallvec::SmallVec;

/// Tracks which aspects of the attachments of the current render pass instance have been read or
/// written on tile, and the depth-only draws recorded in it.
#[derive(Clone, Debug)]
pub(crate) struct AttachmentTracker {
    pub(crate) has_color_attachment: bool,
    pub(crate) has_depth_attachment: bool,

    /// Whether the bound graphics pipeline writes only depth.
    pub(crate) depth_only: bool,
    /// Whether the bound graphics pipeline tests depth with `EQUAL`.
    pub(crate) depth_equal_comparison: bool,
    pub(crate) num_draw_calls_depth_only: u32,
    pub(crate) num_draw_calls_depth_equal_compare: u32,

    /// The aspects of each attachment that were touched since the render pass began.
    pub(crate) touches: LinearMap<u32, vk::ImageAspectFlags>,
    /// The attachments the bound graphics pipeline accesses.
    pub(crate) next_draw_touches: Vec<(u32, vk::ImageAspectFlags)>,
    /// Whether the next draw must mark `next_draw_touches` as touched. Cleared after the first
    /// draw with a given pipeline.
    pub(crate) draw_touches_attachments: bool,

    /// Clears recorded in a secondary command buffer before anything else touched the
    /// attachments. Their effect depends on the primary they are executed in.
    pub(crate) early_clears: Vec<EarlyClear>,
}

/// A `vkCmdClearAttachments` entry whose validation is deferred to `vkCmdExecuteCommands`.
#[derive(Clone, Debug)]
pub(crate) struct EarlyClear {
    pub(crate) attachment: u32,
    pub(crate) color_attachment: u32,
    pub(crate) aspects: vk::ImageAspectFlags,
    pub(crate) rects: SmallVec<[vk::ClearRect; 4]>,
}

impl Default for AttachmentTracker {
    fn default() -> Self {
        AttachmentTracker {
            has_color_attachment: false,
            has_depth_attachment: false,
            depth_only: false,
            depth_equal_comparison: false,
            num_draw_calls_depth_only: 0,
            num_draw_calls_depth_equal_compare: 0,
            touches: LinearMap::new(),
            next_draw_touches: Vec::new(),
            draw_touches_attachments: true,
            early_clears: Vec::new(),
        }
    }
}

impl AttachmentTracker {
    /// Prepares the tracker for a new render pass instance.
    ///
    /// The state derived from the bound pipeline survives, since the pipeline stays bound.
    pub(crate) fn reset(&mut self) {
        self.has_color_attachment = false;
        self.has_depth_attachment = false;
        self.num_draw_calls_depth_only = 0;
        self.num_draw_calls_depth_equal_compare = 0;
        self.touches.clear();
        self.draw_touches_attachments = true;
        self.early_clears.clear();
    }

    pub(crate) fn record_attachment_access(
        &mut self,
        attachment: u32,
        aspects: vk::ImageAspectFlags,
    ) {
        *self
            .touches
            .get_or_insert_with(attachment, vk::ImageAspectFlags::empty) |= aspects;
    }

    /// Returns the aspects in `aspects` that haven't been touched yet.
    pub(crate) fn untouched_aspects(
        &self,
        attachment: u32,
        aspects: vk::ImageAspectFlags,
    ) -> vk::ImageAspectFlags {
        let touched = self
            .touches
            .get(&attachment)
            .copied()
            .unwrap_or_else(vk::ImageAspectFlags::empty);

        aspects & !touched
    }

    /// Records a clear of the whole render area and returns the aspects it was the first to
    /// touch.
    ///
    /// In a secondary command buffer, such a clear is also kept so that it can be checked against
    /// the primary command buffer that executes it.
    pub(crate) fn record_full_clear(
        &mut self,
        attachment: u32,
        color_attachment: u32,
        aspects: vk::ImageAspectFlags,
        rects: &[vk::ClearRect],
        is_secondary: bool,
    ) -> vk::ImageAspectFlags {
        let new_aspects = self.untouched_aspects(attachment, aspects);
        self.record_attachment_access(attachment, aspects);

        if is_secondary && !new_aspects.is_empty() {
            self.early_clears.push(EarlyClear {
                attachment,
                color_attachment,
                aspects: new_aspects,
                rects: rects.iter().copied().collect(),
            });
        }

        new_aspects
    }

    /// Folds the touches of an executed secondary command buffer into this tracker.
    pub(crate) fn merge_touches(&mut self, secondary: &AttachmentTracker) {
        for (&attachment, &aspects) in secondary.touches.iter() {
            self.record_attachment_access(attachment, aspects);
        }
    }
}

/// Returns whether a `vkCmdClearAttachments` call clears the whole render area.
///
/// The render area of a secondary command buffer is unknown, so every clear in it counts as a
/// full clear.
pub(crate) fn is_full_clear(
    is_secondary: bool,
    render_area: vk::Rect2D,
    rects: &[vk::ClearRect],
) -> bool {
    is_secondary
        || rects.iter().any(|rect| {
            rect.rect.extent.width == render_area.extent.width
                && rect.rect.extent.height == render_area.extent.height
        })
}
