// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;

use crate::RenderSize;

/// Outcome of acquiring the next presentable image.
///
/// Fatal acquisition failures are the `Err` side of the surrounding `Result`;
/// only the conditions the frame loop can recover from are tagged here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquire {
    /// An image is ready once the image-available semaphore signals.
    /// `suboptimal` images are still drawn to.
    Image { index: u32, suboptimal: bool },
    /// The swapchain no longer matches the surface.
    OutOfDate,
}

/// Outcome of queueing an image for presentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Present {
    Presented,
    /// Out-of-date or suboptimal: the swapchain must be rebuilt.
    Stale,
}

/// GPU-side ordering for one submission.
#[derive(Clone, Copy, Debug)]
pub struct Submission<S, F> {
    /// Waited on at the color-attachment-output stage.
    pub wait: S,
    pub signal: S,
    /// Signalled when the submission retires.
    pub fence: F,
}

/// The native operations the frame loop drives.
///
/// Implementors own the device context and the swapchain bundle; the loop owns
/// the synchronization handles it creates through this trait. Every method
/// returning `Err` is treated as unrecoverable.
pub trait FrameBackend {
    type Semaphore: Copy;
    type Fence: Copy;

    /// Number of images the presentation engine actually returned for the
    /// current swapchain.
    fn image_count(&self) -> usize;

    fn create_semaphore(&mut self) -> Result<Self::Semaphore>;
    fn create_fence(&mut self, signaled: bool) -> Result<Self::Fence>;
    fn destroy_semaphore(&mut self, semaphore: Self::Semaphore);
    fn destroy_fence(&mut self, fence: Self::Fence);

    /// Blocks without timeout until an image index is available.
    fn acquire(&mut self, image_available: Self::Semaphore) -> Result<Acquire>;
    /// Blocks without timeout until `fence` is signalled.
    fn wait_fence(&mut self, fence: Self::Fence) -> Result<()>;
    fn reset_fence(&mut self, fence: Self::Fence) -> Result<()>;
    /// Submits the pre-recorded command buffer for `image`.
    fn submit(&mut self, image: u32, sync: Submission<Self::Semaphore, Self::Fence>) -> Result<()>;
    fn present(&mut self, image: u32, render_finished: Self::Semaphore) -> Result<Present>;

    /// Full device-idle barrier.
    fn wait_idle(&mut self) -> Result<()>;
    /// Destroys the swapchain bundle and builds a new one for `size`.
    /// Callers guarantee the device is idle and `size` is non-empty.
    fn rebuild(&mut self, size: RenderSize) -> Result<()>;
}

/// What the frame loop needs from the windowing layer.
pub trait WindowSurface {
    /// Current framebuffer size in pixels (not logical window size).
    fn framebuffer_size(&self) -> RenderSize;
    /// Dispatches pending events without blocking.
    fn poll_events(&mut self);
    /// Blocks until at least one event has been dispatched.
    fn wait_events(&mut self);
    fn should_close(&self) -> bool;
}
