//! Model of the Z-cull unit of NVIDIA GPUs.
//!
//! Z-cull rejects fragments early when it can tell from a coarse depth representation that they
//! would fail the depth test. The unit only works in one direction at a time: for a depth
//! attachment that has been drawn to with both `LESS`-like and `GREATER`-like compare ops, it is
//! disabled for one of them until the depth contents are reset. Each command buffer keeps its own
//! belief about the direction of every depth subresource it has drawn to.

use crate::{
    device::BestPractices,
    image::{ImageState, SubresourceRange},
    linear_map::LinearMap,
    message_ids, LogObject, VendorChecks,
};
use ash::vk;

/// The depth comparison direction that Z-cull is optimized for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ZcullDirection {
    #[default]
    Unknown,
    Less,
    Greater,
}

impl ZcullDirection {
    /// Returns the direction implied by a compare op, or `None` if the op doesn't imply one.
    pub fn from_compare_op(op: vk::CompareOp) -> Option<Self> {
        match op {
            vk::CompareOp::LESS | vk::CompareOp::LESS_OR_EQUAL => Some(ZcullDirection::Less),
            vk::CompareOp::GREATER | vk::CompareOp::GREATER_OR_EQUAL => {
                Some(ZcullDirection::Greater)
            }
            _ => None,
        }
    }
}

/// The Z-cull state of one depth subresource.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ZcullResourceState {
    pub direction: ZcullDirection,
    pub num_less_draws: u64,
    pub num_greater_draws: u64,
}

/// The Z-cull state of every subresource of a depth image, layer-major.
#[derive(Clone, Debug)]
pub(crate) struct ZcullTree {
    states: Vec<ZcullResourceState>,
    mip_levels: u32,
    array_layers: u32,
}

impl ZcullTree {
    fn new(array_layers: u32, mip_levels: u32) -> Self {
        ZcullTree {
            states: vec![
                ZcullResourceState::default();
                array_layers as usize * mip_levels as usize
            ],
            mip_levels,
            array_layers,
        }
    }

    fn index(&self, array_layer: u32, mip_level: u32) -> Option<usize> {
        (array_layer < self.array_layers && mip_level < self.mip_levels)
            .then(|| array_layer as usize * self.mip_levels as usize + mip_level as usize)
    }

    pub(crate) fn state(&self, array_layer: u32, mip_level: u32) -> Option<&ZcullResourceState> {
        self.index(array_layer, mip_level)
            .map(|index| &self.states[index])
    }

    fn states_mut<'a>(
        &'a mut self,
        range: &'a SubresourceRange,
    ) -> impl Iterator<Item = &'a mut ZcullResourceState> + 'a {
        let mip_levels = self.mip_levels as usize;

        self.states
            .iter_mut()
            .enumerate()
            .filter_map(move |(index, state)| {
                let layer = (index / mip_levels) as u32;
                let level = (index % mip_levels) as u32;

                (range.array_layers.contains(&layer) && range.mip_levels.contains(&level))
                    .then_some(state)
            })
    }
}

/// The depth image and subresources that draws are currently counted against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ZcullScope {
    pub(crate) image: vk::Image,
    pub(crate) range: SubresourceRange,
}

/// A depth subresource on which both directions were used a significant number of times.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZcullThrashing {
    pub array_layer: u32,
    pub mip_level: u32,
    /// The direction used by most draws.
    pub good_direction: ZcullDirection,
    /// The direction for which Z-cull was likely disabled.
    pub bad_direction: ZcullDirection,
}

/// The Z-cull state of a command buffer.
#[derive(Clone, Debug, Default)]
pub(crate) struct ZcullState {
    trees: LinearMap<vk::Image, ZcullTree>,
    scope: Option<ZcullScope>,
    direction: ZcullDirection,
    depth_compare_op: Option<vk::CompareOp>,
    depth_test_enable: bool,
}

impl ZcullState {
    /// Makes `range` of `image` the target of subsequent draws. The history of the image is kept.
    pub(crate) fn bind_scope(&mut self, image: &ImageState, range: SubresourceRange) {
        let create_info = image.create_info();
        self.trees.get_or_insert_with(image.handle(), || {
            ZcullTree::new(create_info.array_layers, create_info.mip_levels)
        });
        self.scope = Some(ZcullScope {
            image: image.handle(),
            range,
        });
    }

    pub(crate) fn unbind_scope(&mut self) {
        self.scope = None;
    }

    #[inline]
    pub(crate) fn scope(&self) -> Option<&ZcullScope> {
        self.scope.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn direction(&self) -> ZcullDirection {
        self.direction
    }

    #[inline]
    pub(crate) fn depth_test_enable(&self) -> bool {
        self.depth_test_enable
    }

    #[inline]
    pub(crate) fn depth_compare_op(&self) -> Option<vk::CompareOp> {
        self.depth_compare_op
    }

    /// Updates the depth test state. The direction only changes when the compare op changes to
    /// one that implies a direction.
    pub(crate) fn set_depth_test_state(&mut self, compare_op: vk::CompareOp, enable: bool) {
        self.set_depth_compare_op(compare_op);
        self.depth_test_enable = enable;
    }

    pub(crate) fn set_depth_compare_op(&mut self, compare_op: vk::CompareOp) {
        if self.depth_compare_op != Some(compare_op) {
            if let Some(direction) = ZcullDirection::from_compare_op(compare_op) {
                self.direction = direction;
            }
        }

        self.depth_compare_op = Some(compare_op);
    }

    pub(crate) fn set_depth_test_enable(&mut self, enable: bool) {
        self.depth_test_enable = enable;
    }

    /// Counts a draw against every subresource in scope.
    pub(crate) fn record_draw(&mut self) {
        if !self.depth_test_enable || self.direction == ZcullDirection::Unknown {
            return;
        }

        let Some(scope) = &self.scope else {
            return;
        };
        let Some(tree) = self.trees.get_mut(&scope.image) else {
            return;
        };
        let direction = self.direction;

        for state in tree.states_mut(&scope.range) {
            state.direction = direction;

            match direction {
                ZcullDirection::Less => state.num_less_draws += 1,
                ZcullDirection::Greater => state.num_greater_draws += 1,
                ZcullDirection::Unknown => {}
            }
        }
    }

    /// Forgets the direction and the draw counts of `range` of `image`.
    pub(crate) fn reset_direction(&mut self, image: vk::Image, range: &SubresourceRange) {
        if let Some(tree) = self.trees.get_mut(&image) {
            for state in tree.states_mut(range) {
                *state = ZcullResourceState::default();
            }
        }
    }

    pub(crate) fn reset_scope_direction(&mut self) {
        if let Some(scope) = self.scope.take() {
            self.reset_direction(scope.image, &scope.range);
            self.scope = Some(scope);
        }
    }

    /// Returns the first subresource of `range` of `image` on which both directions exceed
    /// `balance_ratio` percent of the draws.
    pub(crate) fn find_thrashing(
        &self,
        image: vk::Image,
        range: &SubresourceRange,
        balance_ratio: u32,
    ) -> Option<ZcullThrashing> {
        let tree = self.trees.get(&image)?;
        let balance_ratio = u64::from(balance_ratio);

        range.subresources().find_map(|(array_layer, mip_level)| {
            let state = tree.state(array_layer, mip_level)?;
            let num_draws = state.num_less_draws + state.num_greater_draws;

            if num_draws == 0 {
                return None;
            }

            let less_ratio = state.num_less_draws * 100 / num_draws;
            let greater_ratio = state.num_greater_draws * 100 / num_draws;

            if less_ratio <= balance_ratio || greater_ratio <= balance_ratio {
                return None;
            }

            let (good_direction, bad_direction) = if greater_ratio > less_ratio {
                (ZcullDirection::Greater, ZcullDirection::Less)
            } else {
                (ZcullDirection::Less, ZcullDirection::Greater)
            };

            Some(ZcullThrashing {
                array_layer,
                mip_level,
                good_direction,
                bad_direction,
            })
        })
    }

    /// Checks the subresources in scope, if the depth test is enabled.
    pub(crate) fn find_scope_thrashing(
        &self,
        balance_ratio: u32,
    ) -> Option<(vk::Image, ZcullThrashing)> {
        if !self.depth_test_enable {
            return None;
        }

        let scope = self.scope.as_ref()?;

        self.find_thrashing(scope.image, &scope.range, balance_ratio)
            .map(|thrashing| (scope.image, thrashing))
    }

    /// Folds the draws recorded by an executed secondary command buffer into this state.
    pub(crate) fn merge_secondary(&mut self, secondary: &ZcullState) {
        for (&image, secondary_tree) in secondary.trees.iter() {
            let tree = self.trees.get_or_insert_with(image, || {
                ZcullTree::new(secondary_tree.array_layers, secondary_tree.mip_levels)
            });

            if tree.states.len() != secondary_tree.states.len() {
                continue;
            }

            for (state, secondary_state) in tree.states.iter_mut().zip(&secondary_tree.states) {
                if secondary_state.direction != ZcullDirection::Unknown {
                    state.direction = secondary_state.direction;
                }
                state.num_less_draws += secondary_state.num_less_draws;
                state.num_greater_draws += secondary_state.num_greater_draws;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn tree(&self, image: vk::Image) -> Option<&ZcullTree> {
        self.trees.get(&image)
    }
}

impl BestPractices {
    /// Reports thrashing on `range` of `image`.
    pub(crate) fn validate_zcull(
        &self,
        zcull: &ZcullState,
        command_buffer: vk::CommandBuffer,
        image: vk::Image,
        range: &SubresourceRange,
        location: &'static str,
    ) {
        if !self.reporter.vendor_enabled(VendorChecks::NVIDIA) {
            return;
        }

        let balance_ratio = self.config.zcull_direction_balance_ratio;

        if let Some(thrashing) = zcull.find_thrashing(image, range, balance_ratio) {
            self.report_zcull_thrashing(command_buffer, image, thrashing, location);
        }
    }

    /// Reports thrashing on the subresources in scope.
    pub(crate) fn validate_zcull_scope(
        &self,
        zcull: &ZcullState,
        command_buffer: vk::CommandBuffer,
        location: &'static str,
    ) {
        if !self.reporter.vendor_enabled(VendorChecks::NVIDIA) {
            return;
        }

        let balance_ratio = self.config.zcull_direction_balance_ratio;

        if let Some((image, thrashing)) = zcull.find_scope_thrashing(balance_ratio) {
            self.report_zcull_thrashing(command_buffer, image, thrashing, location);
        }
    }

    fn report_zcull_thrashing(
        &self,
        command_buffer: vk::CommandBuffer,
        image: vk::Image,
        thrashing: ZcullThrashing,
        location: &'static str,
    ) {
        self.reporter.performance_warning(
            message_ids::ZCULL_LESS_GREATER_RATIO,
            VendorChecks::NVIDIA,
            location,
            &[LogObject::from(command_buffer), LogObject::from(image)],
            format_args!(
                "the depth subresource (array layer {}, mip level {}) is mostly rendered with \
                {:?} depth compare ops, but some draws use {:?} ones; Z-cull is disabled for the \
                least used direction. Reset the direction by clearing the image, transitioning it \
                from UNDEFINED, or loading or storing it with DONT_CARE",
                thrashing.array_layer,
                thrashing.mip_level,
                thrashing.good_direction,
                thrashing.bad_direction,
            ),
        );
    }
}
