//! Vulkan backend for the frame loop.
//!
//! `VkRenderer` owns the device context and the current swapchain bundle and
//! implements [`FrameBackend`]. The semaphores and fences it hands out belong
//! to the caller's `FrameSync`.

use anyhow::{Context, Result};
use ash::vk;
use lindmar_render::{Acquire, FrameBackend, Present, RenderSize, Submission};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{info, warn};

mod bundle;
mod context;
mod debug;
mod error;
mod pipeline;
pub mod policy;
mod status;

pub use bundle::SwapchainInfo;
pub use context::{find_queue_families, QueueFamilies, SwapchainDetails};
pub use error::VkError;
pub use policy::PresentPreference;

use bundle::SwapchainBundle;
use context::DeviceContext;
use error::VkResultExt;
use status::{classify_acquire, classify_present};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VkConfig {
    pub clear_color: [f32; 4],
    pub present: PresentPreference,
    /// Only honoured in debug builds.
    pub validation: bool,
}

impl Default for VkConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            present: PresentPreference::Mailbox,
            validation: true,
        }
    }
}

pub struct VkRenderer {
    // `None` only between teardown and rebuild, or after a failed rebuild.
    bundle: Option<SwapchainBundle>,
    ctx: DeviceContext,
    cfg: VkConfig,
}

impl VkRenderer {
    /// Creates the device context and the first bundle for `size`.
    ///
    /// # Safety
    /// The window behind `window` and `display` must outlive the renderer.
    pub unsafe fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        cfg: VkConfig,
    ) -> Result<Self> {
        let ctx = DeviceContext::new(window, display, cfg.validation)?;
        let details = ctx.query_details()?;
        let bundle = SwapchainBundle::build(&ctx, &details, size, &cfg)
            .context("build swapchain bundle")?;
        Ok(Self {
            bundle: Some(bundle),
            ctx,
            cfg,
        })
    }

    pub fn swapchain_info(&self) -> Option<SwapchainInfo> {
        self.bundle.as_ref().and_then(|b| b.info)
    }

    pub fn queue_families(&self) -> QueueFamilies {
        self.ctx.families
    }

    /// Per-image array lengths of the current bundle: images, views,
    /// framebuffers, command buffers.
    pub fn bundle_lengths(&self) -> Option<[usize; 4]> {
        self.bundle.as_ref().map(|b| {
            [
                b.images.len(),
                b.views.len(),
                b.framebuffers.len(),
                b.command_buffers.len(),
            ]
        })
    }

    fn bundle(&self) -> Result<&SwapchainBundle, VkError> {
        self.bundle.as_ref().ok_or(VkError::NoBundle)
    }
}

impl FrameBackend for VkRenderer {
    type Semaphore = vk::Semaphore;
    type Fence = vk::Fence;

    fn image_count(&self) -> usize {
        self.bundle.as_ref().map_or(0, SwapchainBundle::image_count)
    }

    fn create_semaphore(&mut self) -> Result<vk::Semaphore> {
        let ci = vk::SemaphoreCreateInfo {
            s_type: vk::StructureType::SEMAPHORE_CREATE_INFO,
            ..Default::default()
        };
        Ok(unsafe { self.ctx.device.create_semaphore(&ci, None) }.op("vkCreateSemaphore")?)
    }

    fn create_fence(&mut self, signaled: bool) -> Result<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let ci = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags,
            ..Default::default()
        };
        Ok(unsafe { self.ctx.device.create_fence(&ci, None) }.op("vkCreateFence")?)
    }

    fn destroy_semaphore(&mut self, semaphore: vk::Semaphore) {
        unsafe { self.ctx.device.destroy_semaphore(semaphore, None) };
    }

    fn destroy_fence(&mut self, fence: vk::Fence) {
        unsafe { self.ctx.device.destroy_fence(fence, None) };
    }

    fn acquire(&mut self, image_available: vk::Semaphore) -> Result<Acquire> {
        let swapchain = self.bundle()?.swapchain;
        let result = unsafe {
            self.ctx.swapchain_loader.acquire_next_image(
                swapchain,
                u64::MAX,
                image_available,
                vk::Fence::null(),
            )
        };
        Ok(classify_acquire(result)?)
    }

    fn wait_fence(&mut self, fence: vk::Fence) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .wait_for_fences(std::slice::from_ref(&fence), true, u64::MAX)
        }
        .op("vkWaitForFences")?;
        Ok(())
    }

    fn reset_fence(&mut self, fence: vk::Fence) -> Result<()> {
        unsafe { self.ctx.device.reset_fences(std::slice::from_ref(&fence)) }
            .op("vkResetFences")?;
        Ok(())
    }

    fn submit(&mut self, image: u32, sync: Submission<vk::Semaphore, vk::Fence>) -> Result<()> {
        let cmd = self.bundle()?.command_buffer(image)?;
        let wait_stage = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &sync.wait,
            p_wait_dst_stage_mask: &wait_stage,
            command_buffer_count: 1,
            p_command_buffers: &cmd,
            signal_semaphore_count: 1,
            p_signal_semaphores: &sync.signal,
            ..Default::default()
        };
        unsafe {
            self.ctx.device.queue_submit(
                self.ctx.graphics_queue,
                std::slice::from_ref(&submit),
                sync.fence,
            )
        }
        .op("vkQueueSubmit")?;
        Ok(())
    }

    fn present(&mut self, image: u32, render_finished: vk::Semaphore) -> Result<Present> {
        let swapchain = self.bundle()?.swapchain;
        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &render_finished,
            swapchain_count: 1,
            p_swapchains: &swapchain,
            p_image_indices: &image,
            ..Default::default()
        };
        let result = unsafe {
            self.ctx
                .swapchain_loader
                .queue_present(self.ctx.present_queue, &present)
        };
        Ok(classify_present(result)?)
    }

    fn wait_idle(&mut self) -> Result<()> {
        Ok(self.ctx.wait_idle()?)
    }

    fn rebuild(&mut self, size: RenderSize) -> Result<()> {
        if let Some(old) = self.bundle.take() {
            unsafe { old.destroy(&self.ctx) };
        }
        let details = self.ctx.query_details()?;
        let bundle = unsafe { SwapchainBundle::build(&self.ctx, &details, size, &self.cfg) }
            .with_context(|| format!("rebuild swapchain bundle at {size}"))?;
        info!("swapchain rebuilt for {size}");
        self.bundle = Some(bundle);
        Ok(())
    }
}

impl Drop for VkRenderer {
    fn drop(&mut self) {
        if let Err(e) = self.ctx.wait_idle() {
            warn!("device wait before teardown failed: {e}");
        }
        if let Some(bundle) = self.bundle.take() {
            unsafe { bundle.destroy(&self.ctx) };
        }
        // `ctx` drops after this, tearing down device, surface and instance.
    }
}
