// SPDX-License-Identifier: CEPL-1.0
//! Backend-neutral frame pacing: the presentation state machine, its
//! synchronization set and the seams a GPU backend and a window plug into.

mod backend;
mod frame_loop;
mod signal;
mod sync;

#[cfg(test)]
mod mock;

pub use backend::{Acquire, FrameBackend, Present, Submission, WindowSurface};
pub use frame_loop::{FrameLoop, FrameState};
pub use signal::{resize_channel, ResizeNotifier, ResizeWatch};
pub use sync::FrameSync;

/// Framebuffer size in physical pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A surface with either dimension at zero cannot back a swapchain.
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for RenderSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
