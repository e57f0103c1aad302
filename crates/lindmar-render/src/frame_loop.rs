// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::{Acquire, FrameBackend, FrameSync, Present, ResizeWatch, Submission, WindowSurface};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    Running,
    /// Zero-area framebuffer (e.g. minimised); blocks on window events.
    AwaitingValidSurface,
    Rebuilding,
    ShuttingDown,
}

/// Drives acquire -> wait fence -> submit -> present and rebuilds the
/// swapchain bundle whenever the surface goes stale.
///
/// Single-threaded: the backend and the sync set are only touched from the
/// thread calling [`FrameLoop::run`]. In-flight work is bounded by the image
/// count, one submission per image slot.
pub struct FrameLoop<B: FrameBackend> {
    backend: B,
    sync: FrameSync<B>,
    resize: ResizeWatch,
    state: FrameState,
    frames_presented: u64,
    rebuilds: u64,
}

impl<B: FrameBackend> FrameLoop<B> {
    pub fn new(mut backend: B, resize: ResizeWatch) -> Result<Self> {
        let image_count = backend.image_count();
        let sync = FrameSync::new(&mut backend, image_count)?;
        Ok(Self {
            backend,
            sync,
            resize,
            state: FrameState::Running,
            frames_presented: 0,
            rebuilds: 0,
        })
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn sync(&self) -> &FrameSync<B> {
        &self.sync
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    /// Blocks until the window asks to close, then drains the device.
    pub fn run<W: WindowSurface>(&mut self, window: &mut W) -> Result<()> {
        while self.state != FrameState::ShuttingDown {
            self.step(window)?;
        }
        self.backend
            .wait_idle()
            .context("device idle before shutdown")?;
        info!(
            "frame loop done: {} frames presented, {} swapchain rebuilds",
            self.frames_presented, self.rebuilds
        );
        Ok(())
    }

    /// Runs one iteration of the current state and returns the next one.
    pub fn step<W: WindowSurface>(&mut self, window: &mut W) -> Result<FrameState> {
        let next = match self.state {
            FrameState::Running => {
                // Close is only honoured between frames.
                if window.should_close() {
                    FrameState::ShuttingDown
                } else {
                    window.poll_events();
                    self.draw_frame()?
                }
            }
            FrameState::Rebuilding => self.rebuild(window)?,
            FrameState::AwaitingValidSurface => {
                window.wait_events();
                if window.should_close() {
                    FrameState::ShuttingDown
                } else if window.framebuffer_size().is_empty() {
                    FrameState::AwaitingValidSurface
                } else {
                    FrameState::Rebuilding
                }
            }
            FrameState::ShuttingDown => FrameState::ShuttingDown,
        };
        self.state = next;
        Ok(next)
    }

    fn draw_frame(&mut self) -> Result<FrameState> {
        let image = match self
            .backend
            .acquire(self.sync.image_available())
            .context("acquire next image")?
        {
            Acquire::OutOfDate => {
                info!("swapchain out of date on acquire -> rebuilding");
                return Ok(FrameState::Rebuilding);
            }
            Acquire::Image { index, .. } => index,
        };

        // The slot's previous submission must retire before its command
        // buffer and framebuffer are reused.
        let fence = self.sync.fence(image)?;
        self.backend
            .wait_fence(fence)
            .context("wait for in-flight fence")?;
        self.backend
            .reset_fence(fence)
            .context("reset in-flight fence")?;

        self.backend
            .submit(
                image,
                Submission {
                    wait: self.sync.image_available(),
                    signal: self.sync.render_finished(),
                    fence,
                },
            )
            .context("submit frame")?;

        let presented = self
            .backend
            .present(image, self.sync.render_finished())
            .context("present frame")?;
        self.frames_presented += 1;

        if presented == Present::Stale || self.resize.is_pending() {
            info!("surface stale after present ({presented:?}) -> rebuilding");
            Ok(FrameState::Rebuilding)
        } else {
            Ok(FrameState::Running)
        }
    }

    fn rebuild<W: WindowSurface>(&mut self, window: &W) -> Result<FrameState> {
        self.resize.take();

        let size = window.framebuffer_size();
        if size.is_empty() {
            info!("framebuffer is {size} -> awaiting a valid surface");
            return Ok(FrameState::AwaitingValidSurface);
        }

        self.backend
            .wait_idle()
            .context("device idle before swapchain rebuild")?;
        self.backend.rebuild(size).context("rebuild swapchain")?;
        let image_count = self.backend.image_count();
        self.sync.resize(&mut self.backend, image_count)?;
        self.rebuilds += 1;
        Ok(FrameState::Running)
    }

    /// Releases the synchronization set and hands the backend back for its
    /// own teardown. Drains the device first, since a fatal error can leave
    /// `run` before its final idle wait.
    pub fn destroy(self) -> B {
        let FrameLoop {
            mut backend, sync, ..
        } = self;
        if let Err(e) = backend.wait_idle() {
            warn!("device idle before releasing sync objects failed: {e:#}");
        }
        sync.destroy(&mut backend);
        backend
    }
}
