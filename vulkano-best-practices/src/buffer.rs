//! Shadow state of buffers.

use crate::{device::BestPractices, NonExhaustive};
use ash::vk;
use parking_lot::RwLock;
use std::{fmt, sync::Arc};

/// Parameters of a tracked buffer.
#[derive(Clone, Debug)]
pub struct BufferCreateInfo {
    pub flags: vk::BufferCreateFlags,
    pub size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
    pub sharing_mode: vk::SharingMode,
    pub _ne: NonExhaustive,
}

impl Default for BufferCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            flags: vk::BufferCreateFlags::empty(),
            size: 0,
            usage: vk::BufferUsageFlags::empty(),
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            _ne: NonExhaustive(()),
        }
    }
}

/// The shadow state of a buffer.
pub struct BufferState {
    handle: vk::Buffer,
    create_info: BufferCreateInfo,
    contents: RwLock<Option<Arc<[u8]>>>,
}

impl BufferState {
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    pub fn create_info(&self) -> &BufferCreateInfo {
        &self.create_info
    }

    /// Returns the last snapshot of the host-visible contents of the buffer, if one was given.
    #[inline]
    pub fn contents(&self) -> Option<Arc<[u8]>> {
        self.contents.read().clone()
    }
}

impl fmt::Debug for BufferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferState")
            .field("handle", &self.handle)
            .field("create_info", &self.create_info)
            .field(
                "contents_len",
                &self.contents.read().as_ref().map(|contents| contents.len()),
            )
            .finish()
    }
}

impl BestPractices {
    pub fn record_create_buffer(&self, buffer: vk::Buffer, create_info: BufferCreateInfo) {
        self.buffers.insert(
            buffer,
            BufferState {
                handle: buffer,
                create_info,
                contents: RwLock::new(None),
            },
        );
    }

    pub fn record_destroy_buffer(&self, buffer: vk::Buffer) {
        self.buffers.remove(buffer);
    }

    /// Gives a snapshot of the contents of a host-visible buffer, as seen through its mapped
    /// memory.
    ///
    /// Index buffers are only analyzed when their contents are known. The snapshot replaces the
    /// previous one and is read by the draws validated after this call.
    pub fn record_buffer_contents(&self, buffer: vk::Buffer, contents: impl Into<Arc<[u8]>>) {
        let Some(state) = self.buffers.get(buffer) else {
            log::debug!("contents given for untracked buffer {:?}", buffer);
            return;
        };

        *state.contents.write() = Some(contents.into());
    }
}
