//! Index buffer analysis: index range utilization and a post-transform vertex cache model.
//!
//! GPUs cache the results of the vertex shader for recently used indices. How well an index
//! buffer makes use of that cache depends on the cache size and replacement policy of the
//! hardware, which aren't known here, so an LRU cache of a fixed size is modeled instead. In
//! practice, modeling more than 32 entries gives diminishing returns.

use ash::vk;
use bytemuck::pod_read_unaligned;

/// A fixed-capacity LRU model of a post-transform vertex cache.
#[derive(Clone, Debug)]
pub struct PostTransformLruCacheModel {
    entries: Vec<CacheEntry>,
    capacity: usize,
    iteration: u64,
}

#[derive(Clone, Copy, Debug)]
struct CacheEntry {
    value: u32,
    age: u64,
}

impl PostTransformLruCacheModel {
    /// Creates an empty cache with room for `capacity` vertices.
    pub fn new(capacity: usize) -> Self {
        PostTransformLruCacheModel {
            entries: Vec::with_capacity(capacity),
            capacity,
            iteration: 0,
        }
    }

    /// Looks up `value` in the cache, returning whether it was a hit.
    ///
    /// On a hit the entry becomes the most recently used. On a miss the value is inserted into the
    /// next free slot, or replaces the least recently used entry if the cache is full.
    pub fn query_cache(&mut self, value: u32) -> bool {
        let iteration = self.iteration;
        self.iteration += 1;

        if let Some(hit) = self.entries.iter_mut().find(|entry| entry.value == value) {
            hit.age = iteration;
            return true;
        }

        let new_entry = CacheEntry {
            value,
            age: iteration,
        };

        if self.entries.len() < self.capacity {
            self.entries.push(new_entry);
        } else if let Some(lru) = self.entries.iter_mut().min_by_key(|entry| entry.age) {
            *lru = new_entry;
        }

        false
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Returns the primitive restart index for `index_type`.
pub fn primitive_restart_index(index_type: vk::IndexType) -> u32 {
    match index_type {
        vk::IndexType::UINT8_EXT => 0xFF,
        vk::IndexType::UINT16 => 0xFFFF,
        _ => 0xFFFF_FFFF,
    }
}

/// Returns the size in bytes of one index of `index_type`, or `None` if it isn't an integer type.
pub fn index_size(index_type: vk::IndexType) -> Option<usize> {
    match index_type {
        vk::IndexType::UINT8_EXT => Some(1),
        vk::IndexType::UINT16 => Some(2),
        vk::IndexType::UINT32 => Some(4),
        _ => None,
    }
}

/// Decodes the indices stored in `data`. Trailing bytes that don't form a whole index are ignored.
pub fn read_indices(
    data: &[u8],
    index_type: vk::IndexType,
) -> impl Iterator<Item = u32> + Clone + '_ {
    let stride = index_size(index_type).unwrap_or(4);

    data.chunks_exact(stride).map(move |chunk| match stride {
        1 => u32::from(chunk[0]),
        2 => u32::from(pod_read_unaligned::<u16>(chunk)),
        _ => pod_read_unaligned::<u32>(chunk),
    })
}

/// How much of the index value range a draw makes use of.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum IndexUtilization {
    /// The range spanned by the indices is at least as large as the number of indices, so not
    /// every value in it can be referenced. Estimated cheaply as `index_count / (max - min)`,
    /// without looking at which values are actually referenced.
    SparseRange { utilization: f32 },

    /// Every index was scanned. `utilization` is the fraction of the values in `min..=max` that
    /// are referenced at least once.
    Scanned {
        referenced_vertex_count: u32,
        utilization: f32,
    },
}

/// The result of [`analyze_indices`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndexBufferAnalysis {
    pub min_index: u32,
    pub max_index: u32,
    /// The number of indices of the draw, primitive restart indices included.
    pub index_count: u32,
    /// The number of cache misses of the modeled post-transform cache, which estimates the number
    /// of times the vertex shader runs.
    pub vertex_shade_count: u32,
    pub utilization: IndexUtilization,
}

impl IndexBufferAnalysis {
    /// Returns the ratio of distinct vertices to vertex shader invocations, if the indices were
    /// fully scanned. A value of 1 means every vertex was shaded exactly once.
    pub fn cache_hit_rate(&self) -> Option<f32> {
        match self.utilization {
            IndexUtilization::Scanned {
                referenced_vertex_count,
                ..
            } if self.vertex_shade_count != 0 => {
                Some(referenced_vertex_count as f32 / self.vertex_shade_count as f32)
            }
            _ => None,
        }
    }
}

/// Analyzes the indices of a draw.
///
/// Indices equal to `primitive_restart` don't reference a vertex and are skipped, but still count
/// towards the index count of the draw. Returns `None` if no index references a vertex, or if they
/// all reference the same one.
pub fn analyze_indices<I>(
    indices: I,
    primitive_restart: Option<u32>,
    cache_size: usize,
) -> Option<IndexBufferAnalysis>
where
    I: IntoIterator<Item = u32>,
    I::IntoIter: Clone,
{
    let indices = indices.into_iter();
    let is_vertex = move |index: &u32| Some(*index) != primitive_restart;

    let mut cache = PostTransformLruCacheModel::new(cache_size);
    let mut index_count = 0u32;
    let mut vertex_shade_count = 0u32;
    let mut min_index = u32::MAX;
    let mut max_index = 0u32;

    for index in indices.clone() {
        index_count += 1;

        if !is_vertex(&index) {
            continue;
        }

        min_index = min_index.min(index);
        max_index = max_index.max(index);

        if !cache.query_cache(index) {
            vertex_shade_count += 1;
        }
    }

    if max_index <= min_index {
        return None;
    }

    let span = max_index - min_index;

    if span >= index_count {
        return Some(IndexBufferAnalysis {
            min_index,
            max_index,
            index_count,
            vertex_shade_count,
            utilization: IndexUtilization::SparseRange {
                utilization: index_count as f32 / span as f32,
            },
        });
    }

    // One bit per value in `min_index..=max_index`, 64 values per bucket.
    let value_count = span as usize + 1;
    let mut buckets = vec![0u64; value_count.div_ceil(64)];

    for index in indices.filter(is_vertex) {
        let offset = (index - min_index) as usize;
        buckets[offset / 64] |= 1 << (offset % 64);
    }

    let referenced_vertex_count: u32 = buckets.iter().map(|bucket| bucket.count_ones()).sum();

    Some(IndexBufferAnalysis {
        min_index,
        max_index,
        index_count,
        vertex_shade_count,
        utilization: IndexUtilization::Scanned {
            referenced_vertex_count,
            utilization: referenced_vertex_count as f32 / value_count as f32,
        },
    })
}
