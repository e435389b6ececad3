use crate::{
    device::BestPractices,
    image::{ImageState, ImageSubresourceUsage, SubresourceUsage},
    message_ids, LogObject, VendorChecks,
};
use ash::vk;
use std::{fmt, sync::Arc};

/// An operation recorded into a command buffer that runs when the command buffer is submitted.
///
/// The operations of a command buffer run in recording order every time it's submitted, with the
/// queue family of the queue it's submitted to. They're kept until the command buffer is reset.
#[derive(Clone)]
pub enum QueueOperation {
    /// Applies a usage to one subresource of an image, and checks it against the usage it
    /// replaces.
    ImageUsage {
        /// The command that recorded the usage.
        command: &'static str,
        image: Arc<ImageState>,
        array_layer: u32,
        mip_level: u32,
        usage: ImageSubresourceUsage,
    },
}

impl fmt::Debug for QueueOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageUsage {
                command,
                image,
                array_layer,
                mip_level,
                usage,
            } => f
                .debug_struct("ImageUsage")
                .field("command", command)
                .field("image", &image.handle())
                .field("array_layer", array_layer)
                .field("mip_level", mip_level)
                .field("usage", usage)
                .finish(),
        }
    }
}

impl BestPractices {
    pub(crate) fn execute_queue_operation(
        &self,
        operation: &QueueOperation,
        queue_family_index: u32,
    ) {
        match operation {
            &QueueOperation::ImageUsage {
                command,
                ref image,
                array_layer,
                mip_level,
                usage,
            } => {
                let previous =
                    image.update_usage(array_layer, mip_level, usage, queue_family_index);
                self.validate_image_usage(
                    command,
                    image,
                    array_layer,
                    mip_level,
                    previous,
                    usage,
                    queue_family_index,
                );
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn validate_image_usage(
        &self,
        command: &'static str,
        image: &ImageState,
        array_layer: u32,
        mip_level: u32,
        previous: SubresourceUsage,
        usage: ImageSubresourceUsage,
        queue_family_index: u32,
    ) {
        let objects = [LogObject::from(image.handle())];

        if image.create_info().sharing_mode == vk::SharingMode::EXCLUSIVE
            && previous.ty != ImageSubresourceUsage::Undefined
            && previous.queue_family_index != vk::QUEUE_FAMILY_IGNORED
            && previous.queue_family_index != queue_family_index
            && matches!(
                usage,
                ImageSubresourceUsage::ResolveRead
                    | ImageSubresourceUsage::CopyRead
                    | ImageSubresourceUsage::DescriptorAccess
                    | ImageSubresourceUsage::BlitRead,
            )
        {
            self.reporter.warning(
                message_ids::CONCURRENT_USAGE_OF_EXCLUSIVE_IMAGE,
                command,
                &objects,
                format_args!(
                    "subresource (array layer {}, mip level {}) of an image with exclusive \
                    sharing mode was last used on queue family {} and is now {} on queue family \
                    {} without an ownership transfer, so its contents are undefined",
                    array_layer,
                    mip_level,
                    previous.queue_family_index,
                    usage.description(),
                    queue_family_index,
                ),
            );
        }

        let tiler_vendors = VendorChecks::ARM | VendorChecks::IMG;

        if self.reporter.vendor_enabled(tiler_vendors) {
            match (previous.ty, usage) {
                (
                    ImageSubresourceUsage::RenderPassStored,
                    ImageSubresourceUsage::RenderPassCleared,
                ) => {
                    self.reporter.performance_warning(
                        message_ids::RENDER_PASS_REDUNDANT_STORE,
                        tiler_vendors,
                        command,
                        &objects,
                        format_args!(
                            "subresource (array layer {}, mip level {}) was stored by a render \
                            pass and is now cleared on load; the store is redundant, use \
                            STORE_OP_DONT_CARE",
                            array_layer, mip_level,
                        ),
                    );
                }
                (ImageSubresourceUsage::Cleared, ImageSubresourceUsage::RenderPassCleared) => {
                    self.reporter.performance_warning(
                        message_ids::RENDER_PASS_REDUNDANT_CLEAR,
                        tiler_vendors,
                        command,
                        &objects,
                        format_args!(
                            "subresource (array layer {}, mip level {}) was cleared with \
                            vkCmdClear*Image and is now cleared again on load; the first clear is \
                            redundant",
                            array_layer, mip_level,
                        ),
                    );
                }
                (
                    previous @ (ImageSubresourceUsage::BlitWrite
                    | ImageSubresourceUsage::Cleared
                    | ImageSubresourceUsage::CopyWrite
                    | ImageSubresourceUsage::ResolveWrite),
                    ImageSubresourceUsage::RenderPassReadToTile,
                ) => {
                    self.reporter.performance_warning(
                        message_ids::RENDER_PASS_INEFFICIENT_CLEAR,
                        tiler_vendors,
                        command,
                        &objects,
                        format_args!(
                            "subresource (array layer {}, mip level {}) was last {} and is now \
                            loaded by a render pass; if the contents are a plain clear value, use \
                            LOAD_OP_CLEAR instead",
                            array_layer,
                            mip_level,
                            previous.description(),
                        ),
                    );
                }
                _ => {}
            }
        }

        if previous.ty == ImageSubresourceUsage::RenderPassDiscarded
            && usage == ImageSubresourceUsage::RenderPassReadToTile
        {
            self.reporter.warning(
                message_ids::STORE_OP_DONT_CARE_THEN_LOAD_OP_LOAD,
                command,
                &objects,
                format_args!(
                    "subresource (array layer {}, mip level {}) was discarded by the previous \
                    render pass and is now loaded, so its contents are undefined",
                    array_layer, mip_level,
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{image::ImageCreateInfo, tests::test_layer};
    use ash::vk::Handle;

    fn image(sharing_mode: vk::SharingMode) -> Arc<ImageState> {
        Arc::new(ImageState::new(
            vk::Image::from_raw(1),
            ImageCreateInfo {
                format: vk::Format::R8G8B8A8_UNORM,
                sharing_mode,
                ..Default::default()
            },
        ))
    }

    fn usage(image: &Arc<ImageState>, usage: ImageSubresourceUsage) -> QueueOperation {
        QueueOperation::ImageUsage {
            command: "vkCmdBeginRenderPass",
            image: image.clone(),
            array_layer: 0,
            mip_level: 0,
            usage,
        }
    }

    #[test]
    fn store_then_clear_is_redundant() {
        let (layer, messages) = test_layer(VendorChecks::ARM);
        let image = image(vk::SharingMode::EXCLUSIVE);

        layer.execute_queue_operation(&usage(&image, ImageSubresourceUsage::RenderPassStored), 0);
        assert!(messages.ids().is_empty());

        layer.execute_queue_operation(&usage(&image, ImageSubresourceUsage::RenderPassCleared), 0);
        assert_eq!(messages.ids(), [message_ids::RENDER_PASS_REDUNDANT_STORE]);
        assert!(messages.all()[0].description.starts_with("[Arm, IMG]"));
        assert_eq!(image.usage_type(0, 0), ImageSubresourceUsage::RenderPassCleared);
    }

    #[test]
    fn transfer_before_load() {
        let (layer, messages) = test_layer(VendorChecks::IMG);
        let image = image(vk::SharingMode::EXCLUSIVE);

        for (first, id) in [
            (ImageSubresourceUsage::Cleared, message_ids::RENDER_PASS_INEFFICIENT_CLEAR),
            (ImageSubresourceUsage::CopyWrite, message_ids::RENDER_PASS_INEFFICIENT_CLEAR),
            (
                ImageSubresourceUsage::RenderPassDiscarded,
                message_ids::STORE_OP_DONT_CARE_THEN_LOAD_OP_LOAD,
            ),
        ] {
            layer.execute_queue_operation(&usage(&image, first), 0);
            layer.execute_queue_operation(
                &usage(&image, ImageSubresourceUsage::RenderPassReadToTile),
                0,
            );
            assert_eq!(messages.ids(), [id]);
            messages.clear();
        }

        layer.execute_queue_operation(&usage(&image, ImageSubresourceUsage::Cleared), 0);
        layer.execute_queue_operation(&usage(&image, ImageSubresourceUsage::RenderPassCleared), 0);
        assert_eq!(messages.ids(), [message_ids::RENDER_PASS_REDUNDANT_CLEAR]);
    }

    #[test]
    fn vendor_checks_disabled() {
        let (layer, messages) = test_layer(VendorChecks::NVIDIA);
        let image = image(vk::SharingMode::EXCLUSIVE);

        layer.execute_queue_operation(&usage(&image, ImageSubresourceUsage::RenderPassStored), 0);
        layer.execute_queue_operation(&usage(&image, ImageSubresourceUsage::RenderPassCleared), 0);
        assert!(messages.ids().is_empty());
    }

    #[test]
    fn exclusive_image_on_other_queue_family() {
        let (layer, messages) = test_layer(VendorChecks::empty());
        let exclusive = image(vk::SharingMode::EXCLUSIVE);
        let concurrent = image(vk::SharingMode::CONCURRENT);

        for image in [&exclusive, &concurrent] {
            layer.execute_queue_operation(&usage(image, ImageSubresourceUsage::CopyWrite), 0);
            layer.execute_queue_operation(
                &usage(image, ImageSubresourceUsage::DescriptorAccess),
                1,
            );
            // Writes don't need the previous contents.
            layer.execute_queue_operation(&usage(image, ImageSubresourceUsage::CopyWrite), 0);
        }

        assert_eq!(
            messages.ids(),
            [message_ids::CONCURRENT_USAGE_OF_EXCLUSIVE_IMAGE],
        );
    }
}
