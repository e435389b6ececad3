//! Tunable thresholds of the heuristics.

use crate::{NonExhaustive, VendorChecks};
use ash::vk::DeviceSize;
use std::{error::Error, fmt, time::Duration};

/// Parameters to create a [`BestPractices`](crate::BestPractices) object.
///
/// The configuration is read-only once the object is created.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BestPracticesConfig {
    /// The vendors whose specific heuristics are enabled.
    ///
    /// The default value is empty, which leaves only the vendor-independent heuristics.
    pub vendor_checks: VendorChecks,

    /// The number of live device memory allocations above which allocating reports a warning.
    ///
    /// The default value is `250`.
    pub max_memory_objects: u32,

    /// Allocations smaller than this report a warning.
    ///
    /// The default value is 256 KiB.
    pub min_allocation_size: DeviceSize,

    /// The number of pipeline barriers recorded in one frame above which every further barrier
    /// command reports a warning. Used by the AMD checks.
    ///
    /// The default value is `500`.
    pub max_barriers_per_frame: u32,

    /// The number of queue submissions in one frame above which presenting reports a warning.
    /// Used by the AMD checks.
    ///
    /// The default value is `20`.
    pub max_submissions_per_frame: u32,

    /// The number of live semaphores above which creating another one reports a warning. Used by
    /// the AMD checks.
    ///
    /// The default value is `10`.
    pub max_semaphores: u32,

    /// The number of live fences above which creating another one reports a warning. Used by the
    /// AMD checks.
    ///
    /// The default value is `3`.
    pub max_fences: u32,

    /// The number of live pipelines above which creating more reports a warning. Used by the AMD
    /// checks.
    ///
    /// The default value is `5000`.
    pub max_pipelines: u32,

    /// The percentage of draws that both Z-cull directions must exceed on a depth subresource
    /// before the direction is considered to be thrashing. Used by the NVIDIA checks.
    ///
    /// The value must not be greater than `100`. The default value is `20`.
    pub zcull_direction_balance_ratio: u32,

    /// The number of custom clear colors that can be remembered for fast clears. Used by the
    /// NVIDIA checks.
    ///
    /// The default value is `16`.
    pub max_clear_colors: usize,

    /// How long freed allocations are remembered to suggest reusing them. Used by the NVIDIA
    /// checks.
    ///
    /// The default value is 5 seconds.
    pub memory_reuse_window: Duration,

    /// How much larger than a new allocation a freed allocation can be for it to be considered
    /// reusable. Used by the NVIDIA checks.
    ///
    /// The default value is 1 MiB.
    pub memory_reuse_size_tolerance: DeviceSize,

    /// The number of entries of the modeled post-transform vertex cache. Used by the Arm checks.
    ///
    /// The value must not be zero. The default value is `32`.
    pub vertex_cache_size: usize,

    /// The number of depth-only draws, and of depth-equal draws, from which a render pass is
    /// considered to contain a depth pre-pass. Used by the Arm and IMG checks.
    ///
    /// The default value is `20`.
    pub depth_pre_pass_min_draws: u32,

    /// Indexed draws with at most this many indices count as small. Used by the Arm and IMG
    /// checks.
    ///
    /// The default value is `10`.
    pub small_indexed_draw_indices: u32,

    /// The number of small indexed draws in one command buffer at which a warning is reported.
    /// Used by the Arm and IMG checks.
    ///
    /// The default value is `10`.
    pub max_small_indexed_draws: u32,

    #[cfg_attr(feature = "serde", serde(skip))]
    pub _ne: NonExhaustive,
}

impl Default for BestPracticesConfig {
    #[inline]
    fn default() -> Self {
        Self {
            vendor_checks: VendorChecks::empty(),
            max_memory_objects: 250,
            min_allocation_size: 256 * 1024,
            max_barriers_per_frame: 500,
            max_submissions_per_frame: 20,
            max_semaphores: 10,
            max_fences: 3,
            max_pipelines: 5000,
            zcull_direction_balance_ratio: 20,
            max_clear_colors: 16,
            memory_reuse_window: Duration::from_secs(5),
            memory_reuse_size_tolerance: 1024 * 1024,
            vertex_cache_size: 32,
            depth_pre_pass_min_draws: 20,
            small_indexed_draw_indices: 10,
            max_small_indexed_draws: 10,
            _ne: NonExhaustive(()),
        }
    }
}

impl BestPracticesConfig {
    /// Checks that the thresholds are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.zcull_direction_balance_ratio > 100 {
            return Err(ConfigError::ZcullBalanceRatioOutOfRange {
                ratio: self.zcull_direction_balance_ratio,
            });
        }

        if self.vertex_cache_size == 0 {
            return Err(ConfigError::ZeroVertexCacheSize);
        }

        Ok(())
    }
}

/// Error that can happen when validating a [`BestPracticesConfig`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `zcull_direction_balance_ratio` is a percentage greater than 100.
    ZcullBalanceRatioOutOfRange { ratio: u32 },

    /// `vertex_cache_size` is zero.
    ZeroVertexCacheSize,
}

impl Error for ConfigError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZcullBalanceRatioOutOfRange { ratio } => write!(
                f,
                "the Z-cull direction balance ratio ({}%) is greater than 100%",
                ratio,
            ),
            Self::ZeroVertexCacheSize => f.write_str("the vertex cache size is zero"),
        }
    }
}
