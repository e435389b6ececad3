//! Hooks for the commands recorded into command buffers.

pub use self::{
    clear::ClearAttachment,
    sync::{DependencyInfo, ImageMemoryBarrier},
};

mod bind_push;
mod clear;
mod dynamic_state;
mod pipeline;
mod render_pass;
mod secondary;
mod sync;
mod transfer;
