//! Advisory best-practices diagnostics for Vulkan command streams.
//!
//! This crate shadows the state of a Vulkan device, its command buffers and its resources, and
//! reports usage patterns that are legal but known to perform poorly, either in general or on
//! specific hardware vendors. It never rejects or alters a call: its only observable effect is
//! the messages handed to the [`MessageCallback`].
//!
//! # Overview
//!
//! - The [`BestPractices`] object is the entry point. It is created once per device from a
//!   [`BestPracticesConfig`] and a callback, and owns all device-wide state.
//!
//! - An external dispatcher calls into it around every intercepted Vulkan entry point. Methods
//!   prefixed with `validate_` only read the shadow state and may report messages, methods
//!   prefixed with `record_` update the shadow state. The dispatcher calls `validate_*` before the
//!   real call and `record_*` after it.
//!
//! - Objects that the heuristics need to know about (images, render passes, pipelines, ...) are
//!   announced with `record_create_*` and forgotten with `record_destroy_*`. Commands referencing
//!   objects that were never announced are silently ignored.
//!
//! - Some checks can only be decided once a command buffer is submitted, because they depend on
//!   the queue family and on the order in which command buffers execute. These checks are stored
//!   in the command buffer as [`QueueOperation`]s and run during
//!   [`BestPractices::record_queue_submit`].
//!
//! # Vendor checks
//!
//! Heuristics that only apply to some hardware are gated behind [`VendorChecks`]. The message
//! description of a vendor-specific message starts with a tag like `[Arm, IMG]`.
//!
//! [`QueueOperation`]: crate::command_buffer::QueueOperation

pub use self::{
    config::{BestPracticesConfig, ConfigError},
    device::BestPractices,
    report::{log_callback, LogObject, Message, MessageCallback, MessageSeverity},
    vendor::{ParseVendorChecksError, VendorChecks},
};
pub use ash::vk;

pub mod buffer;
pub mod clear_color;
pub mod command_buffer;
pub mod config;
pub mod descriptor_set;
mod device;
pub mod format;
pub mod image;
mod linear_map;
pub mod memory;
pub mod message_ids;
mod object_map;
pub mod pipeline;
pub mod queue;
pub mod render_pass;
pub mod report;
pub mod sync;
pub mod vendor;
pub mod vertex_cache;
pub mod zcull;

/// A helper type for non-exhaustive structs.
///
/// This type cannot be constructed outside this crate. Structures that have a field of this type
/// can therefore not be constructed outside this crate either, except with the
/// `..Default::default()` update syntax.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NonExhaustive(pub(crate) ());

#[cfg(test)]
mod tests {
    use crate::{
        BestPractices, BestPracticesConfig, Message, MessageSeverity, VendorChecks,
    };
    use std::sync::{Arc, Mutex};

    /// An owned copy of a reported message.
    #[derive(Clone, Debug)]
    pub(crate) struct Captured {
        pub(crate) id: &'static str,
        pub(crate) severity: MessageSeverity,
        pub(crate) description: String,
    }

    #[derive(Clone, Default)]
    pub(crate) struct Messages(Arc<Mutex<Vec<Captured>>>);

    impl Messages {
        pub(crate) fn ids(&self) -> Vec<&'static str> {
            self.0.lock().unwrap().iter().map(|m| m.id).collect()
        }

        pub(crate) fn all(&self) -> Vec<Captured> {
            self.0.lock().unwrap().clone()
        }

        pub(crate) fn clear(&self) {
            self.0.lock().unwrap().clear();
        }
    }

    pub(crate) fn test_layer_with(config: BestPracticesConfig) -> (BestPractices, Messages) {
        let messages = Messages::default();
        let sink = messages.0.clone();
        let layer = BestPractices::new(
            config,
            Arc::new(move |message: &Message<'_>| {
                sink.lock().unwrap().push(Captured {
                    id: message.id,
                    severity: message.severity,
                    description: message.description.to_owned(),
                });
            }),
        )
        .unwrap();

        (layer, messages)
    }

    pub(crate) fn test_layer(vendor_checks: VendorChecks) -> (BestPractices, Messages) {
        test_layer_with(BestPracticesConfig {
            vendor_checks,
            ..Default::default()
        })
    }
}
