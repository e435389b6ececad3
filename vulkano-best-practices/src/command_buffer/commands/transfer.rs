use crate::{device::BestPractices, image::ImageSubresourceUsage, message_ids, VendorChecks};
use ash::vk;

/// # Transfer commands
///
/// Copies, blits and resolves don't have checks of their own, apart from resolves on Arm. They
/// queue the usage of the subresources they touch, which later commands are compared against.
impl BestPractices {
    pub fn record_cmd_copy_image(
        &self,
        command_buffer: vk::CommandBuffer,
        src_image: vk::Image,
        dst_image: vk::Image,
        regions: &[vk::ImageCopy],
    ) {
        self.queue_region_usages(
            command_buffer,
            "vkCmdCopyImage",
            src_image,
            ImageSubresourceUsage::CopyRead,
            regions.iter().map(|region| &region.src_subresource),
        );
        self.queue_region_usages(
            command_buffer,
            "vkCmdCopyImage",
            dst_image,
            ImageSubresourceUsage::CopyWrite,
            regions.iter().map(|region| &region.dst_subresource),
        );
    }

    pub fn record_cmd_copy_buffer_to_image(
        &self,
        command_buffer: vk::CommandBuffer,
        dst_image: vk::Image,
        regions: &[vk::BufferImageCopy],
    ) {
        self.queue_region_usages(
            command_buffer,
            "vkCmdCopyBufferToImage",
            dst_image,
            ImageSubresourceUsage::CopyWrite,
            regions.iter().map(|region| &region.image_subresource),
        );
    }

    pub fn record_cmd_copy_image_to_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        src_image: vk::Image,
        regions: &[vk::BufferImageCopy],
    ) {
        self.queue_region_usages(
            command_buffer,
            "vkCmdCopyImageToBuffer",
            src_image,
            ImageSubresourceUsage::CopyRead,
            regions.iter().map(|region| &region.image_subresource),
        );
    }

    pub fn record_cmd_blit_image(
        &self,
        command_buffer: vk::CommandBuffer,
        src_image: vk::Image,
        dst_image: vk::Image,
        regions: &[vk::ImageBlit],
    ) {
        self.queue_region_usages(
            command_buffer,
            "vkCmdBlitImage",
            src_image,
            ImageSubresourceUsage::BlitRead,
            regions.iter().map(|region| &region.src_subresource),
        );
        self.queue_region_usages(
            command_buffer,
            "vkCmdBlitImage",
            dst_image,
            ImageSubresourceUsage::BlitWrite,
            regions.iter().map(|region| &region.dst_subresource),
        );
    }

    pub fn validate_cmd_resolve_image(
        &self,
        command_buffer: vk::CommandBuffer,
        src_image: vk::Image,
        dst_image: vk::Image,
    ) {
        if !self.reporter.vendor_enabled(VendorChecks::ARM) {
            return;
        }

        self.reporter.performance_warning(
            message_ids::CMD_RESOLVE_IMAGE_RESOLVING_IMAGE,
            VendorChecks::ARM,
            "vkCmdResolveImage",
            &[command_buffer.into(), src_image.into(), dst_image.into()],
            format_args!(
                "resolving a multisampled image with vkCmdResolveImage, which is very \
                inefficient on tile-based GPUs; resolve in the render pass with resolve \
                attachments instead",
            ),
        );
    }

    pub fn record_cmd_resolve_image(
        &self,
        command_buffer: vk::CommandBuffer,
        src_image: vk::Image,
        dst_image: vk::Image,
        regions: &[vk::ImageResolve],
    ) {
        self.queue_region_usages(
            command_buffer,
            "vkCmdResolveImage",
            src_image,
            ImageSubresourceUsage::ResolveRead,
            regions.iter().map(|region| &region.src_subresource),
        );
        self.queue_region_usages(
            command_buffer,
            "vkCmdResolveImage",
            dst_image,
            ImageSubresourceUsage::ResolveWrite,
            regions.iter().map(|region| &region.dst_subresource),
        );
    }

    fn queue_region_usages<'a>(
        &self,
        command_buffer: vk::CommandBuffer,
        command: &'static str,
        image: vk::Image,
        usage: ImageSubresourceUsage,
        regions: impl IntoIterator<Item = &'a vk::ImageSubresourceLayers>,
    ) {
        let Some(state) = self.command_buffer(command_buffer) else {
            return;
        };
        let Some(image) = self.images.get(image) else {
            return;
        };
        let mut state = state.lock();

        for layers in regions {
            state.queue_image_usage(command, &image, &image.normalize_layers(layers), usage);
        }
    }
}
