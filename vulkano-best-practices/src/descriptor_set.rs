//! Shadow state of descriptor set layouts and descriptor sets.
//!
//! Only image descriptors are tracked: draws and dispatches turn every image view bound through a
//! descriptor into a [`DescriptorAccess`] usage of its subresources, applied when the command
//! buffer is submitted.
//!
//! [`DescriptorAccess`]: crate::image::ImageSubresourceUsage::DescriptorAccess

use crate::{device::BestPractices, image::ImageViewState, NonExhaustive};
use ash::vk;
use foldhash::HashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// One binding of a descriptor set layout.
#[derive(Clone, Debug)]
pub struct DescriptorSetLayoutBinding {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub descriptor_count: u32,
    pub stages: vk::ShaderStageFlags,
    /// The flags given through `VkDescriptorSetLayoutBindingFlagsCreateInfo`.
    pub binding_flags: vk::DescriptorBindingFlags,
    pub _ne: NonExhaustive,
}

impl Default for DescriptorSetLayoutBinding {
    #[inline]
    fn default() -> Self {
        Self {
            binding: 0,
            descriptor_type: vk::DescriptorType::SAMPLER,
            descriptor_count: 1,
            stages: vk::ShaderStageFlags::ALL,
            binding_flags: vk::DescriptorBindingFlags::empty(),
            _ne: NonExhaustive(()),
        }
    }
}

impl DescriptorSetLayoutBinding {
    /// Returns whether descriptors of this binding give access to an image.
    pub fn is_image(&self) -> bool {
        matches!(
            self.descriptor_type,
            vk::DescriptorType::SAMPLED_IMAGE
                | vk::DescriptorType::STORAGE_IMAGE
                | vk::DescriptorType::INPUT_ATTACHMENT
                | vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        )
    }

    /// Returns whether the contents of the binding may change after it's bound, or may be
    /// partially invalid. Such bindings can't tell which images a draw actually accesses.
    pub fn is_bindless(&self) -> bool {
        self.binding_flags.intersects(
            vk::DescriptorBindingFlags::PARTIALLY_BOUND
                | vk::DescriptorBindingFlags::UPDATE_AFTER_BIND
                | vk::DescriptorBindingFlags::UPDATE_UNUSED_WHILE_PENDING,
        )
    }
}

/// Parameters of a tracked descriptor set layout.
#[derive(Clone, Debug, Default)]
pub struct DescriptorSetLayoutCreateInfo {
    pub flags: vk::DescriptorSetLayoutCreateFlags,
    pub bindings: Vec<DescriptorSetLayoutBinding>,
    pub _ne: NonExhaustive,
}

/// The shadow state of a descriptor set layout.
#[derive(Debug)]
pub struct DescriptorSetLayoutState {
    handle: vk::DescriptorSetLayout,
    create_info: DescriptorSetLayoutCreateInfo,
}

impl DescriptorSetLayoutState {
    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.handle
    }

    #[inline]
    pub fn create_info(&self) -> &DescriptorSetLayoutCreateInfo {
        &self.create_info
    }

    pub fn binding(&self, binding: u32) -> Option<&DescriptorSetLayoutBinding> {
        self.create_info
            .bindings
            .iter()
            .find(|b| b.binding == binding)
    }
}

/// The shadow state of a descriptor set.
#[derive(Debug)]
pub struct DescriptorSetState {
    handle: vk::DescriptorSet,
    pool: vk::DescriptorPool,
    layout: Arc<DescriptorSetLayoutState>,
    /// The image views written to each image binding, indexed by array element.
    image_views: Mutex<HashMap<u32, Vec<Option<Arc<ImageViewState>>>>>,
}

impl DescriptorSetState {
    #[inline]
    pub fn handle(&self) -> vk::DescriptorSet {
        self.handle
    }

    #[inline]
    pub fn pool(&self) -> vk::DescriptorPool {
        self.pool
    }

    #[inline]
    pub fn layout(&self) -> &Arc<DescriptorSetLayoutState> {
        &self.layout
    }

    /// Returns the image views a draw may access through this set, skipping bindless bindings.
    pub(crate) fn accessed_image_views(&self) -> Vec<Arc<ImageViewState>> {
        let image_views = self.image_views.lock();

        self.layout
            .create_info
            .bindings
            .iter()
            .filter(|binding| binding.is_image() && !binding.is_bindless())
            .filter_map(|binding| image_views.get(&binding.binding))
            .flatten()
            .flatten()
            .cloned()
            .collect()
    }
}

/// A write of image descriptors, as in `VkWriteDescriptorSet`.
///
/// Array elements that overflow the destination binding continue in the next bindings.
#[derive(Clone, Debug)]
pub struct WriteDescriptorSet {
    pub dst_set: vk::DescriptorSet,
    pub dst_binding: u32,
    pub dst_array_element: u32,
    pub descriptor_type: vk::DescriptorType,
    /// The image view of each written descriptor. Non-image descriptors are written as
    /// `vk::ImageView::null()`.
    pub image_views: Vec<vk::ImageView>,
    pub _ne: NonExhaustive,
}

impl Default for WriteDescriptorSet {
    #[inline]
    fn default() -> Self {
        Self {
            dst_set: vk::DescriptorSet::null(),
            dst_binding: 0,
            dst_array_element: 0,
            descriptor_type: vk::DescriptorType::SAMPLED_IMAGE,
            image_views: Vec::new(),
            _ne: NonExhaustive(()),
        }
    }
}

/// A copy between descriptor sets, as in `VkCopyDescriptorSet`.
#[derive(Clone, Debug)]
pub struct CopyDescriptorSet {
    pub src_set: vk::DescriptorSet,
    pub src_binding: u32,
    pub src_array_element: u32,
    pub dst_set: vk::DescriptorSet,
    pub dst_binding: u32,
    pub dst_array_element: u32,
    pub descriptor_count: u32,
    pub _ne: NonExhaustive,
}

impl Default for CopyDescriptorSet {
    #[inline]
    fn default() -> Self {
        Self {
            src_set: vk::DescriptorSet::null(),
            src_binding: 0,
            src_array_element: 0,
            dst_set: vk::DescriptorSet::null(),
            dst_binding: 0,
            dst_array_element: 0,
            descriptor_count: 0,
            _ne: NonExhaustive(()),
        }
    }
}

/// # Descriptor sets
impl BestPractices {
    pub fn record_create_descriptor_set_layout(
        &self,
        layout: vk::DescriptorSetLayout,
        create_info: DescriptorSetLayoutCreateInfo,
    ) {
        self.descriptor_set_layouts.insert(
            layout,
            DescriptorSetLayoutState {
                handle: layout,
                create_info,
            },
        );
    }

    pub fn record_destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.descriptor_set_layouts.remove(layout);
    }

    /// Records `vkAllocateDescriptorSets`. `descriptor_sets` and `set_layouts` correspond
    /// one-to-one.
    pub fn record_allocate_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        descriptor_sets: &[vk::DescriptorSet],
        set_layouts: &[vk::DescriptorSetLayout],
    ) {
        for (&set, &layout) in descriptor_sets.iter().zip(set_layouts) {
            let Some(layout) = self.descriptor_set_layouts.get(layout) else {
                log::debug!("descriptor set {:?} allocated with an untracked layout", set);
                continue;
            };

            self.descriptor_sets.insert(
                set,
                DescriptorSetState {
                    handle: set,
                    pool,
                    layout,
                    image_views: Mutex::new(HashMap::default()),
                },
            );
        }
    }

    pub fn record_free_descriptor_sets(&self, descriptor_sets: &[vk::DescriptorSet]) {
        for &set in descriptor_sets {
            self.descriptor_sets.remove(set);
        }
    }

    pub fn record_reset_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.descriptor_sets.remove_if(|set| set.pool == pool);
    }

    pub fn record_destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.record_reset_descriptor_pool(pool);
    }

    pub fn record_update_descriptor_sets(
        &self,
        descriptor_writes: &[WriteDescriptorSet],
        descriptor_copies: &[CopyDescriptorSet],
    ) {
        for write in descriptor_writes {
            let Some(set) = self.descriptor_sets.get(write.dst_set) else {
                continue;
            };

            let image_views = write
                .image_views
                .iter()
                .map(|&view| self.image_views.get(view));
            set.write_elements(write.dst_binding, write.dst_array_element, image_views);
        }

        for copy in descriptor_copies {
            let (Some(src), Some(dst)) = (
                self.descriptor_sets.get(copy.src_set),
                self.descriptor_sets.get(copy.dst_set),
            ) else {
                continue;
            };

            let image_views = src.read_elements(
                copy.src_binding,
                copy.src_array_element,
                copy.descriptor_count,
            );
            dst.write_elements(copy.dst_binding, copy.dst_array_element, image_views);
        }
    }
}

impl DescriptorSetState {
    /// Returns the bindings of the layout, in binding order, starting at `binding`.
    fn bindings_from(&self, binding: u32) -> Vec<&DescriptorSetLayoutBinding> {
        let mut bindings: Vec<_> = self
            .layout
            .create_info
            .bindings
            .iter()
            .filter(|b| b.binding >= binding && b.descriptor_count != 0)
            .collect();
        bindings.sort_by_key(|b| b.binding);

        bindings
    }

    fn write_elements(
        &self,
        binding: u32,
        array_element: u32,
        elements: impl IntoIterator<Item = Option<Arc<ImageViewState>>>,
    ) {
        let mut image_views = self.image_views.lock();
        let mut elements = elements.into_iter().peekable();
        let mut array_element = array_element;

        for layout_binding in self.bindings_from(binding) {
            if elements.peek().is_none() {
                break;
            }

            let descriptor_count = layout_binding.descriptor_count as usize;
            let binding_views = image_views
                .entry(layout_binding.binding)
                .or_insert_with(|| vec![None; descriptor_count]);

            for index in array_element as usize..descriptor_count {
                let Some(element) = elements.next() else {
                    break;
                };

                if layout_binding.is_image() {
                    binding_views[index] = element;
                }
            }

            array_element = 0;
        }
    }

    fn read_elements(
        &self,
        binding: u32,
        array_element: u32,
        count: u32,
    ) -> Vec<Option<Arc<ImageViewState>>> {
        let image_views = self.image_views.lock();
        let mut elements = Vec::with_capacity(count as usize);
        let mut array_element = array_element;

        for layout_binding in self.bindings_from(binding) {
            for index in array_element..layout_binding.descriptor_count {
                if elements.len() == count as usize {
                    return elements;
                }

                elements.push(
                    image_views
                        .get(&layout_binding.binding)
                        .and_then(|views| views.get(index as usize).cloned().flatten()),
                );
            }

            array_element = 0;
        }

        elements
    }
}
