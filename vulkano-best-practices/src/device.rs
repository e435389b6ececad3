use crate::{
    buffer::BufferState,
    clear_color::ClearColorRegistry,
    command_buffer::CommandBufferSubState,
    descriptor_set::{DescriptorSetLayoutState, DescriptorSetState},
    image::{ImageState, ImageViewState},
    memory::{MemoryFreeHistory, MemoryState},
    message_ids,
    object_map::ObjectMap,
    pipeline::{PipelineLayoutState, PipelineState},
    queue::QueueState,
    render_pass::{FramebufferState, RenderPassState},
    report::{MessageCallback, Reporter},
    BestPracticesConfig, ConfigError,
};
use ash::vk;
use foldhash::HashMap;
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicU32, AtomicU64},
    Arc,
};

/// The best-practices layer of one device.
///
/// All hooks take `&self`; the object can be shared between the threads that use the device.
/// Device-wide counters are atomics, object tables are guarded by reader/writer locks, and the
/// state of each command buffer has its own mutex, which the external synchronization rules of
/// Vulkan keep uncontended.
#[derive(Debug)]
pub struct BestPractices {
    pub(crate) config: BestPracticesConfig,
    pub(crate) reporter: Reporter,

    pub(crate) images: ObjectMap<vk::Image, ImageState>,
    pub(crate) image_views: ObjectMap<vk::ImageView, ImageViewState>,
    pub(crate) buffers: ObjectMap<vk::Buffer, BufferState>,
    pub(crate) memory: ObjectMap<vk::DeviceMemory, MemoryState>,
    pub(crate) render_passes: ObjectMap<vk::RenderPass, RenderPassState>,
    pub(crate) framebuffers: ObjectMap<vk::Framebuffer, FramebufferState>,
    pub(crate) pipeline_layouts: ObjectMap<vk::PipelineLayout, PipelineLayoutState>,
    pub(crate) pipelines: ObjectMap<vk::Pipeline, PipelineState>,
    pub(crate) descriptor_set_layouts: ObjectMap<vk::DescriptorSetLayout, DescriptorSetLayoutState>,
    pub(crate) descriptor_sets: ObjectMap<vk::DescriptorSet, DescriptorSetState>,
    pub(crate) queues: ObjectMap<vk::Queue, QueueState>,
    pub(crate) command_buffers: ObjectMap<vk::CommandBuffer, Mutex<CommandBufferSubState>>,
    pub(crate) events: Mutex<HashMap<vk::Event, bool>>,

    pub(crate) num_barriers_this_frame: AtomicU32,
    pub(crate) num_submissions_this_frame: AtomicU32,
    pub(crate) num_semaphores: AtomicU32,
    pub(crate) num_fences: AtomicU32,
    pub(crate) num_pipelines: AtomicU32,
    /// The raw handle of the last pipeline cache used to create pipelines.
    pub(crate) pipeline_cache: AtomicU64,

    pub(crate) memory_free_history: MemoryFreeHistory,
    pub(crate) clear_colors: ClearColorRegistry,
}

impl BestPractices {
    /// Creates the layer for a device.
    ///
    /// Returns an error if the configuration has thresholds outside of their valid range.
    pub fn new(
        config: BestPracticesConfig,
        callback: MessageCallback,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        log::debug!(
            "best practices enabled with vendor checks {:?}",
            config.vendor_checks,
        );

        Ok(BestPractices {
            reporter: Reporter::new(callback, config.vendor_checks),
            images: ObjectMap::new(),
            image_views: ObjectMap::new(),
            buffers: ObjectMap::new(),
            memory: ObjectMap::new(),
            render_passes: ObjectMap::new(),
            framebuffers: ObjectMap::new(),
            pipeline_layouts: ObjectMap::new(),
            pipelines: ObjectMap::new(),
            descriptor_set_layouts: ObjectMap::new(),
            descriptor_sets: ObjectMap::new(),
            queues: ObjectMap::new(),
            command_buffers: ObjectMap::new(),
            events: Mutex::new(HashMap::default()),
            num_barriers_this_frame: AtomicU32::new(0),
            num_submissions_this_frame: AtomicU32::new(0),
            num_semaphores: AtomicU32::new(0),
            num_fences: AtomicU32::new(0),
            num_pipelines: AtomicU32::new(0),
            pipeline_cache: AtomicU64::new(0),
            memory_free_history: MemoryFreeHistory::default(),
            clear_colors: ClearColorRegistry::new(config.max_clear_colors),
            config,
        })
    }

    /// Returns the configuration the layer was created with.
    #[inline]
    pub fn config(&self) -> &BestPracticesConfig {
        &self.config
    }

    /// Checks the API version requested for the device against the one of the instance.
    ///
    /// Versions are compared without their patch number.
    pub fn validate_create_device(&self, instance_api_version: u32, device_api_version: u32) {
        let truncate = |version: u32| {
            (
                vk::api_version_variant(version),
                vk::api_version_major(version),
                vk::api_version_minor(version),
            )
        };

        if truncate(instance_api_version) > truncate(device_api_version) {
            self.reporter.information(
                message_ids::CREATE_DEVICE_API_VERSION_MISMATCH,
                "vkCreateDevice",
                &[],
                format_args!(
                    "the instance was created with API version {}.{}, but the physical device \
                    only supports API version {}.{}",
                    vk::api_version_major(instance_api_version),
                    vk::api_version_minor(instance_api_version),
                    vk::api_version_major(device_api_version),
                    vk::api_version_minor(device_api_version),
                ),
            );
        }
    }

    /// Returns the state of a tracked command buffer.
    pub(crate) fn command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
    ) -> Option<Arc<Mutex<CommandBufferSubState>>> {
        let state = self.command_buffers.get(command_buffer);

        if state.is_none() {
            log::trace!("untracked command buffer {:?}", command_buffer);
        }

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tests::test_layer, VendorChecks};

    #[test]
    fn invalid_config_is_rejected() {
        let result = BestPractices::new(
            BestPracticesConfig {
                vertex_cache_size: 0,
                ..Default::default()
            },
            Arc::new(|_: &crate::Message<'_>| {}),
        );

        assert!(matches!(result, Err(ConfigError::ZeroVertexCacheSize)));
    }

    #[test]
    fn api_version_mismatch() {
        let (layer, messages) = test_layer(VendorChecks::empty());

        layer.validate_create_device(vk::API_VERSION_1_3, vk::make_api_version(0, 1, 3, 250));
        layer.validate_create_device(vk::make_api_version(0, 1, 2, 9), vk::API_VERSION_1_3);
        assert!(messages.ids().is_empty());

        layer.validate_create_device(vk::API_VERSION_1_3, vk::make_api_version(0, 1, 1, 0));
        assert_eq!(
            messages.ids(),
            [message_ids::CREATE_DEVICE_API_VERSION_MISMATCH],
        );
        assert_eq!(
            messages.all()[0].severity,
            crate::MessageSeverity::Information,
        );
    }
}
