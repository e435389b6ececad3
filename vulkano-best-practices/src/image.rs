//! Shadow state of images and image views.
//!
//! Every tracked image owns a grid of [`SubresourceUsage`]s, one per array layer and mip level,
//! which remembers how each subresource was last used and on which queue family. The grid is
//! updated by the [`QueueOperation`]s of a command buffer when it is submitted, so that the usages
//! follow the order in which the device actually executes the commands.
//!
//! [`QueueOperation`]: crate::command_buffer::QueueOperation

use crate::{device::BestPractices, format, NonExhaustive};
use ash::vk;
use parking_lot::Mutex;
use std::{fmt, ops::Range, sync::Arc};

/// How an image subresource was used by a command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ImageSubresourceUsage {
    /// Not used since the image was created.
    #[default]
    Undefined,
    /// Cleared by a render pass with `AttachmentLoadOp::CLEAR`.
    RenderPassCleared,
    /// Loaded by a render pass with `AttachmentLoadOp::LOAD`.
    RenderPassReadToTile,
    /// Cleared by `vkCmdClearColorImage` or `vkCmdClearDepthStencilImage`.
    Cleared,
    /// Accessed through a bound descriptor.
    DescriptorAccess,
    /// Stored by a render pass with `AttachmentStoreOp::STORE`.
    RenderPassStored,
    /// Discarded by a render pass with `AttachmentStoreOp::DONT_CARE` or `NONE`.
    RenderPassDiscarded,
    BlitRead,
    BlitWrite,
    ResolveRead,
    ResolveWrite,
    CopyRead,
    CopyWrite,
}

impl ImageSubresourceUsage {
    /// Returns a short description of the operation, for messages.
    pub fn description(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::RenderPassCleared => "render pass cleared",
            Self::RenderPassReadToTile => "render pass loaded",
            Self::Cleared => "cleared with vkCmdClear*Image",
            Self::DescriptorAccess => "accessed through a descriptor",
            Self::RenderPassStored => "render pass stored",
            Self::RenderPassDiscarded => "render pass discarded",
            Self::BlitRead => "read by vkCmdBlitImage",
            Self::BlitWrite => "written by vkCmdBlitImage",
            Self::ResolveRead => "read by vkCmdResolveImage",
            Self::ResolveWrite => "written by vkCmdResolveImage",
            Self::CopyRead => "read by a copy command",
            Self::CopyWrite => "written by a copy command",
        }
    }
}

/// The last recorded usage of an image subresource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubresourceUsage {
    pub ty: ImageSubresourceUsage,
    /// The queue family the usage was submitted on, or `vk::QUEUE_FAMILY_IGNORED` if unused.
    pub queue_family_index: u32,
}

impl Default for SubresourceUsage {
    #[inline]
    fn default() -> Self {
        SubresourceUsage {
            ty: ImageSubresourceUsage::Undefined,
            queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        }
    }
}

/// Parameters of a tracked image.
#[derive(Clone, Debug)]
pub struct ImageCreateInfo {
    pub flags: vk::ImageCreateFlags,
    pub image_type: vk::ImageType,
    pub format: vk::Format,
    pub extent: vk::Extent3D,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub samples: vk::SampleCountFlags,
    pub tiling: vk::ImageTiling,
    pub usage: vk::ImageUsageFlags,
    pub sharing_mode: vk::SharingMode,
    pub _ne: NonExhaustive,
}

impl Default for ImageCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            flags: vk::ImageCreateFlags::empty(),
            image_type: vk::ImageType::TYPE_2D,
            format: vk::Format::UNDEFINED,
            extent: vk::Extent3D {
                width: 0,
                height: 0,
                depth: 1,
            },
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: vk::ImageUsageFlags::empty(),
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            _ne: NonExhaustive(()),
        }
    }
}

/// The shadow state of an image.
pub struct ImageState {
    handle: vk::Image,
    create_info: ImageCreateInfo,
    usages: Mutex<Vec<SubresourceUsage>>,
}

impl ImageState {
    /// Creates the shadow state of an image, with every subresource undefined.
    pub fn new(handle: vk::Image, create_info: ImageCreateInfo) -> Self {
        let count = create_info.array_layers as usize * create_info.mip_levels as usize;

        ImageState {
            handle,
            create_info,
            usages: Mutex::new(vec![SubresourceUsage::default(); count]),
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn create_info(&self) -> &ImageCreateInfo {
        &self.create_info
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.create_info.format
    }

    fn index(&self, array_layer: u32, mip_level: u32) -> Option<usize> {
        (array_layer < self.create_info.array_layers && mip_level < self.create_info.mip_levels)
            .then(|| {
                array_layer as usize * self.create_info.mip_levels as usize + mip_level as usize
            })
    }

    /// Stores a new usage of a subresource and returns the usage it replaces.
    ///
    /// A subresource outside of the image is ignored and reported as undefined.
    pub fn update_usage(
        &self,
        array_layer: u32,
        mip_level: u32,
        usage: ImageSubresourceUsage,
        queue_family_index: u32,
    ) -> SubresourceUsage {
        let Some(index) = self.index(array_layer, mip_level) else {
            return SubresourceUsage::default();
        };

        let mut usages = self.usages.lock();
        let previous = usages[index];
        usages[index] = SubresourceUsage {
            ty: usage,
            queue_family_index,
        };

        previous
    }

    /// Returns the last usage of a subresource.
    pub fn usage(&self, array_layer: u32, mip_level: u32) -> SubresourceUsage {
        self.index(array_layer, mip_level)
            .map(|index| self.usages.lock()[index])
            .unwrap_or_default()
    }

    #[inline]
    pub fn usage_type(&self, array_layer: u32, mip_level: u32) -> ImageSubresourceUsage {
        self.usage(array_layer, mip_level).ty
    }

    #[inline]
    pub fn last_queue_family_index(&self, array_layer: u32, mip_level: u32) -> u32 {
        self.usage(array_layer, mip_level).queue_family_index
    }

    /// Returns the subresource range covering the whole image.
    pub fn full_range(&self) -> SubresourceRange {
        SubresourceRange {
            aspects: format::format_aspects(self.create_info.format),
            mip_levels: 0..self.create_info.mip_levels,
            array_layers: 0..self.create_info.array_layers,
        }
    }

    /// Converts a Vulkan subresource range, which may use the `REMAINING` sentinels, to a concrete
    /// range clamped to the image.
    pub fn normalize_range(&self, range: &vk::ImageSubresourceRange) -> SubresourceRange {
        SubresourceRange::from_vk(
            range,
            self.create_info.mip_levels,
            self.create_info.array_layers,
        )
    }

    /// Converts the subresource layers of a copy, blit or resolve region to a range.
    pub fn normalize_layers(&self, layers: &vk::ImageSubresourceLayers) -> SubresourceRange {
        self.normalize_range(&vk::ImageSubresourceRange {
            aspect_mask: layers.aspect_mask,
            base_mip_level: layers.mip_level,
            level_count: 1,
            base_array_layer: layers.base_array_layer,
            layer_count: layers.layer_count,
        })
    }
}

impl fmt::Debug for ImageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageState")
            .field("handle", &self.handle)
            .field("create_info", &self.create_info)
            .finish_non_exhaustive()
    }
}

/// A concrete range of image subresources.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubresourceRange {
    pub aspects: vk::ImageAspectFlags,
    pub mip_levels: Range<u32>,
    pub array_layers: Range<u32>,
}

impl SubresourceRange {
    /// Translates `vk::REMAINING_MIP_LEVELS` and `vk::REMAINING_ARRAY_LAYERS` using the true
    /// extents of the image, and clamps the result to them.
    pub fn from_vk(
        range: &vk::ImageSubresourceRange,
        image_mip_levels: u32,
        image_array_layers: u32,
    ) -> Self {
        fn resolve(base: u32, count: u32, remaining: u32, total: u32) -> Range<u32> {
            let start = base.min(total);
            let end = if count == remaining {
                total
            } else {
                base.saturating_add(count).min(total)
            };

            start..end
        }

        SubresourceRange {
            aspects: range.aspect_mask,
            mip_levels: resolve(
                range.base_mip_level,
                range.level_count,
                vk::REMAINING_MIP_LEVELS,
                image_mip_levels,
            ),
            array_layers: resolve(
                range.base_array_layer,
                range.layer_count,
                vk::REMAINING_ARRAY_LAYERS,
                image_array_layers,
            ),
        }
    }

    /// Returns every `(array_layer, mip_level)` pair of the range, layer-major.
    pub fn subresources(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.array_layers
            .clone()
            .flat_map(move |layer| self.mip_levels.clone().map(move |level| (layer, level)))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mip_levels.is_empty() || self.array_layers.is_empty()
    }
}

/// Parameters of a tracked image view.
#[derive(Clone, Debug)]
pub struct ImageViewCreateInfo {
    pub image: vk::Image,
    pub view_type: vk::ImageViewType,
    /// The format of the view. `vk::Format::UNDEFINED` takes the image's format.
    pub format: vk::Format,
    pub subresource_range: vk::ImageSubresourceRange,
    pub _ne: NonExhaustive,
}

impl Default for ImageViewCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            image: vk::Image::null(),
            view_type: vk::ImageViewType::TYPE_2D,
            format: vk::Format::UNDEFINED,
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

/// The shadow state of an image view.
#[derive(Debug)]
pub struct ImageViewState {
    handle: vk::ImageView,
    image: Arc<ImageState>,
    format: vk::Format,
    subresource_range: SubresourceRange,
}

impl ImageViewState {
    #[inline]
    pub fn handle(&self) -> vk::ImageView {
        self.handle
    }

    #[inline]
    pub fn image(&self) -> &Arc<ImageState> {
        &self.image
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn subresource_range(&self) -> &SubresourceRange {
        &self.subresource_range
    }
}

impl BestPractices {
    pub fn record_create_image(&self, image: vk::Image, create_info: ImageCreateInfo) {
        self.images.insert(image, ImageState::new(image, create_info));
    }

    /// Forgets an image. Command buffers that already recorded uses of the image keep its shadow
    /// state alive until they are reset.
    pub fn record_destroy_image(&self, image: vk::Image) {
        self.images.remove(image);
    }

    pub fn record_create_image_view(
        &self,
        image_view: vk::ImageView,
        create_info: &ImageViewCreateInfo,
    ) {
        let Some(image) = self.images.get(create_info.image) else {
            log::debug!("image view {:?} created from an untracked image", image_view);
            return;
        };

        let format = if create_info.format == vk::Format::UNDEFINED {
            image.format()
        } else {
            create_info.format
        };
        let mut subresource_range = image.normalize_range(&create_info.subresource_range);

        if subresource_range.aspects.is_empty() {
            subresource_range.aspects = format::format_aspects(format);
        }

        self.image_views.insert(
            image_view,
            ImageViewState {
                handle: image_view,
                image,
                format,
                subresource_range,
            },
        );
    }

    pub fn record_destroy_image_view(&self, image_view: vk::ImageView) {
        self.image_views.remove(image_view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn image(array_layers: u32, mip_levels: u32) -> ImageState {
        ImageState::new(
            vk::Image::from_raw(1),
            ImageCreateInfo {
                format: vk::Format::R8G8B8A8_UNORM,
                mip_levels,
                array_layers,
                ..Default::default()
            },
        )
    }

    #[test]
    fn update_returns_previous() {
        let image = image(2, 3);
        assert_eq!(image.usage(1, 2), SubresourceUsage::default());

        let previous = image.update_usage(1, 2, ImageSubresourceUsage::CopyWrite, 0);
        assert_eq!(previous.ty, ImageSubresourceUsage::Undefined);
        assert_eq!(previous.queue_family_index, vk::QUEUE_FAMILY_IGNORED);

        let previous = image.update_usage(1, 2, ImageSubresourceUsage::BlitRead, 1);
        assert_eq!(previous.ty, ImageSubresourceUsage::CopyWrite);
        assert_eq!(previous.queue_family_index, 0);
        assert_eq!(image.usage_type(1, 2), ImageSubresourceUsage::BlitRead);
        assert_eq!(image.last_queue_family_index(1, 2), 1);

        // Neighbouring subresources are untouched.
        assert_eq!(image.usage_type(1, 1), ImageSubresourceUsage::Undefined);
        assert_eq!(image.usage_type(0, 2), ImageSubresourceUsage::Undefined);
    }

    #[test]
    fn out_of_bounds_is_ignored() {
        let image = image(1, 1);
        let previous = image.update_usage(3, 0, ImageSubresourceUsage::Cleared, 0);

        assert_eq!(previous, SubresourceUsage::default());
        assert_eq!(image.usage_type(3, 0), ImageSubresourceUsage::Undefined);
    }

    #[test]
    fn remaining_sentinels() {
        let image = image(6, 4);
        let range = image.normalize_range(&vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 1,
            level_count: vk::REMAINING_MIP_LEVELS,
            base_array_layer: 4,
            layer_count: vk::REMAINING_ARRAY_LAYERS,
        });

        assert_eq!(range.mip_levels, 1..4);
        assert_eq!(range.array_layers, 4..6);
        assert_eq!(
            range.subresources().collect::<Vec<_>>(),
            [(4, 1), (4, 2), (4, 3), (5, 1), (5, 2), (5, 3)],
        );

        let range = image.normalize_range(&vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 2,
            level_count: 10,
            base_array_layer: 0,
            layer_count: 1,
        });
        assert_eq!(range.mip_levels, 2..4);
        assert_eq!(range.array_layers, 0..1);
    }

    #[test]
    fn view_takes_image_format_and_aspects() {
        let (layer, _) = crate::tests::test_layer(Default::default());
        let image = vk::Image::from_raw(7);
        let view = vk::ImageView::from_raw(8);

        layer.record_create_image(
            image,
            ImageCreateInfo {
                format: vk::Format::D32_SFLOAT,
                mip_levels: 2,
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

        let view = layer.image_views.get(view).unwrap();
        assert_eq!(view.format(), vk::Format::D32_SFLOAT);
        assert_eq!(view.subresource_range().aspects, vk::ImageAspectFlags::DEPTH);
        assert_eq!(view.subresource_range().mip_levels, 0..2);
    }
}
