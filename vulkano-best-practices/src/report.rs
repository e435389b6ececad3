//! Delivery of diagnostic messages.
//!
//! Every heuristic that fires produces one [`Message`], which is handed synchronously to the
//! [`MessageCallback`] given to [`BestPractices::new`](crate::BestPractices::new). The callback is
//! called on whichever thread made the intercepted call.

use crate::vendor::{VendorChecks, VendorTagCache};
use ash::vk::{self, Handle};
use std::{
    fmt,
    panic::{catch_unwind, AssertUnwindSafe, RefUnwindSafe},
    sync::Arc,
};

/// The closure that receives messages.
///
/// If the closure panics, the panic is caught and ignored.
pub type MessageCallback = Arc<dyn Fn(&Message<'_>) + RefUnwindSafe + Send + Sync>;

/// A message reported by one of the heuristics.
#[derive(Debug)]
pub struct Message<'a> {
    /// Stable identifier of the heuristic, one of the constants in
    /// [`message_ids`](crate::message_ids).
    pub id: &'static str,
    /// Severity of the message.
    pub severity: MessageSeverity,
    /// The vendors the message is specific to, or empty if it applies to every vendor.
    pub vendors: VendorChecks,
    /// The Vulkan entry point during which the message was reported.
    pub location: &'static str,
    /// The objects the message is about.
    pub objects: &'a [LogObject],
    /// Human-readable description, starting with the vendor tag if `vendors` isn't empty.
    pub description: &'a str,
}

/// Severity of a [`Message`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageSeverity {
    /// A legal pattern that likely indicates a mistake in the application.
    Warning,
    /// A pattern with a known, more efficient alternative.
    PerformanceWarning,
    /// A neutral observation.
    Information,
}

/// A Vulkan object that a message refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LogObject {
    pub object_type: vk::ObjectType,
    pub handle: u64,
}

impl<H: Handle> From<H> for LogObject {
    #[inline]
    fn from(handle: H) -> Self {
        LogObject {
            object_type: H::TYPE,
            handle: handle.as_raw(),
        }
    }
}

impl fmt::Display for LogObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:#x}", self.object_type, self.handle)
    }
}

/// Returns a callback that forwards messages to the [`log`] crate.
///
/// Warnings are logged at the `warn` level and information at the `info` level, with the message
/// identifier as a prefix.
pub fn log_callback() -> MessageCallback {
    Arc::new(|message: &Message<'_>| match message.severity {
        MessageSeverity::Warning | MessageSeverity::PerformanceWarning => {
            log::warn!(
                target: "vulkano_best_practices",
                "[{}] {}: {}",
                message.id,
                message.location,
                message.description,
            );
        }
        MessageSeverity::Information => {
            log::info!(
                target: "vulkano_best_practices",
                "[{}] {}: {}",
                message.id,
                message.location,
                message.description,
            );
        }
    })
}

pub(crate) struct Reporter {
    callback: MessageCallback,
    vendor_checks: VendorChecks,
    tags: VendorTagCache,
}

impl Reporter {
    pub(crate) fn new(callback: MessageCallback, vendor_checks: VendorChecks) -> Self {
        Reporter {
            callback,
            vendor_checks,
            tags: VendorTagCache::default(),
        }
    }

    #[inline]
    pub(crate) fn vendor_enabled(&self, vendors: VendorChecks) -> bool {
        self.vendor_checks.intersects(vendors)
    }

    /// Returns the `[Vendor, ...]` tag for `vendors`.
    pub(crate) fn vendor_tag(&self, vendors: VendorChecks) -> Arc<str> {
        self.tags.tag(vendors)
    }

    pub(crate) fn warning(
        &self,
        id: &'static str,
        location: &'static str,
        objects: &[LogObject],
        description: fmt::Arguments<'_>,
    ) {
        self.emit(
            id,
            MessageSeverity::Warning,
            VendorChecks::empty(),
            location,
            objects,
            description,
        );
    }

    /// Reports a performance warning. If `vendors` isn't empty, the description is prefixed with
    /// the vendor tag.
    pub(crate) fn performance_warning(
        &self,
        id: &'static str,
        vendors: VendorChecks,
        location: &'static str,
        objects: &[LogObject],
        description: fmt::Arguments<'_>,
    ) {
        self.emit(
            id,
            MessageSeverity::PerformanceWarning,
            vendors,
            location,
            objects,
            description,
        );
    }

    pub(crate) fn information(
        &self,
        id: &'static str,
        location: &'static str,
        objects: &[LogObject],
        description: fmt::Arguments<'_>,
    ) {
        self.emit(
            id,
            MessageSeverity::Information,
            VendorChecks::empty(),
            location,
            objects,
            description,
        );
    }

    fn emit(
        &self,
        id: &'static str,
        severity: MessageSeverity,
        vendors: VendorChecks,
        location: &'static str,
        objects: &[LogObject],
        description: fmt::Arguments<'_>,
    ) {
        let description = if vendors.is_empty() {
            description.to_string()
        } else {
            format!("{} {}", self.vendor_tag(vendors), description)
        };

        let message = Message {
            id,
            severity,
            vendors,
            location,
            objects,
            description: &description,
        };

        if catch_unwind(AssertUnwindSafe(|| (self.callback)(&message))).is_err() {
            log::error!(
                target: "vulkano_best_practices",
                "message callback panicked while reporting `{}`",
                id,
            );
        }
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            callback: _,
            vendor_checks,
            tags: _,
        } = self;

        f.debug_struct("Reporter")
            .field("vendor_checks", vendor_checks)
            .finish_non_exhaustive()
    }
}
