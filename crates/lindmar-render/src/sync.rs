// SPDX-License-Identifier: CEPL-1.0
use anyhow::{anyhow, Context, Result};
use tracing::debug;

use crate::FrameBackend;

/// The two long-lived semaphores plus one fence per swapchain image.
///
/// Only one acquire and one submission are outstanding on the semaphores at a
/// time, so they never scale with the image count; the fences do, and bound
/// in-flight work to one submission per image slot.
pub struct FrameSync<B: FrameBackend> {
    image_available: B::Semaphore,
    render_finished: B::Semaphore,
    fences: Vec<B::Fence>,
}

impl<B: FrameBackend> FrameSync<B> {
    pub fn new(backend: &mut B, image_count: usize) -> Result<Self> {
        let image_available = backend
            .create_semaphore()
            .context("create image-available semaphore")?;
        let render_finished = backend
            .create_semaphore()
            .context("create render-finished semaphore")?;
        let fences = create_fences(backend, image_count)?;
        Ok(Self {
            image_available,
            render_finished,
            fences,
        })
    }

    /// Matches the fence array to a rebuilt swapchain. Callers must have
    /// drained the device first.
    pub fn resize(&mut self, backend: &mut B, image_count: usize) -> Result<()> {
        if self.fences.len() == image_count {
            return Ok(());
        }
        debug!(
            "frame sync: {} -> {} fences",
            self.fences.len(),
            image_count
        );
        for fence in self.fences.drain(..) {
            backend.destroy_fence(fence);
        }
        self.fences = create_fences(backend, image_count)?;
        Ok(())
    }

    pub fn destroy(self, backend: &mut B) {
        for fence in self.fences {
            backend.destroy_fence(fence);
        }
        backend.destroy_semaphore(self.render_finished);
        backend.destroy_semaphore(self.image_available);
    }

    pub fn image_available(&self) -> B::Semaphore {
        self.image_available
    }

    pub fn render_finished(&self) -> B::Semaphore {
        self.render_finished
    }

    pub fn fence(&self, image: u32) -> Result<B::Fence> {
        self.fences.get(image as usize).copied().ok_or_else(|| {
            anyhow!(
                "image index {image} out of range for {} fences",
                self.fences.len()
            )
        })
    }

    pub fn fence_count(&self) -> usize {
        self.fences.len()
    }
}

// Signalled so the first wait on each slot returns immediately.
fn create_fences<B: FrameBackend>(backend: &mut B, count: usize) -> Result<Vec<B::Fence>> {
    (0..count)
        .map(|_| backend.create_fence(true).context("create in-flight fence"))
        .collect()
}
