//! Everything that depends on the swapchain: the swapchain itself, its
//! images and views, the render pass and pipeline, framebuffers, and one
//! pre-recorded command buffer per image.

use anyhow::Result;
use ash::vk;
use lindmar_render::RenderSize;
use tracing::info;

use crate::context::{DeviceContext, SwapchainDetails};
use crate::error::{VkError, VkResultExt};
use crate::pipeline::{create_pipeline, create_render_pass};
use crate::policy::{
    format_name, present_mode_name, select_extent, select_image_count, select_present_mode,
    select_sharing, select_surface_format,
};
use crate::VkConfig;

/// What a bundle build settled on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainInfo {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    /// Images requested from the presentation engine.
    pub requested_images: u32,
    /// Images actually returned; every per-image array has this length.
    pub image_count: usize,
}

#[derive(Default)]
pub(crate) struct SwapchainBundle {
    pub swapchain: vk::SwapchainKHR,
    pub info: Option<SwapchainInfo>,
    pub images: Vec<vk::Image>,
    pub views: Vec<vk::ImageView>,
    pub render_pass: vk::RenderPass,
    pub pipeline_layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,
    pub framebuffers: Vec<vk::Framebuffer>,
    pub command_buffers: Vec<vk::CommandBuffer>,
}

impl SwapchainBundle {
    /// Builds a complete bundle. On failure everything created so far is
    /// destroyed before the error is returned.
    pub unsafe fn build(
        ctx: &DeviceContext,
        details: &SwapchainDetails,
        size: RenderSize,
        cfg: &VkConfig,
    ) -> Result<Self> {
        let mut bundle = Self::default();
        if let Err(e) = bundle.populate(ctx, details, size, cfg) {
            bundle.destroy(ctx);
            return Err(e);
        }
        Ok(bundle)
    }

    unsafe fn populate(
        &mut self,
        ctx: &DeviceContext,
        details: &SwapchainDetails,
        size: RenderSize,
        cfg: &VkConfig,
    ) -> Result<()> {
        let caps = &details.capabilities;
        let format = select_surface_format(&details.formats).ok_or(VkError::NoSurfaceFormat)?;
        let present_mode = select_present_mode(&details.present_modes, cfg.present);
        let extent = select_extent(caps, size);
        let requested_images = select_image_count(caps);
        let (sharing, family_indices) = select_sharing(ctx.families);

        let swap_info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: ctx.surface,
            min_image_count: requested_images,
            image_format: format.format,
            image_color_space: format.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: sharing,
            queue_family_index_count: family_indices.len() as u32,
            p_queue_family_indices: family_indices.as_ptr(),
            pre_transform: caps.current_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode,
            clipped: vk::TRUE,
            old_swapchain: vk::SwapchainKHR::null(),
            ..Default::default()
        };
        self.swapchain = ctx
            .swapchain_loader
            .create_swapchain(&swap_info, None)
            .op("vkCreateSwapchainKHR")?;
        self.images = ctx
            .swapchain_loader
            .get_swapchain_images(self.swapchain)
            .op("vkGetSwapchainImagesKHR")?;
        let image_count = self.images.len();

        for &image in &self.images {
            let view_ci = vk::ImageViewCreateInfo {
                s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
                image,
                view_type: vk::ImageViewType::TYPE_2D,
                format: format.format,
                components: vk::ComponentMapping::default(),
                subresource_range: vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                },
                ..Default::default()
            };
            let view = ctx
                .device
                .create_image_view(&view_ci, None)
                .op("vkCreateImageView")?;
            self.views.push(view);
        }

        self.render_pass = create_render_pass(&ctx.device, format.format)?;
        let (layout, pipeline) = create_pipeline(&ctx.device, self.render_pass, extent)?;
        self.pipeline_layout = layout;
        self.pipeline = pipeline;

        let alloc = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: ctx.command_pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: image_count as u32,
            ..Default::default()
        };
        self.command_buffers = ctx
            .device
            .allocate_command_buffers(&alloc)
            .op("vkAllocateCommandBuffers")?;

        for &view in &self.views {
            let fb_ci = vk::FramebufferCreateInfo {
                s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
                render_pass: self.render_pass,
                attachment_count: 1,
                p_attachments: &view,
                width: extent.width,
                height: extent.height,
                layers: 1,
                ..Default::default()
            };
            let fb = ctx
                .device
                .create_framebuffer(&fb_ci, None)
                .op("vkCreateFramebuffer")?;
            self.framebuffers.push(fb);
        }

        debug_assert_eq!(self.views.len(), image_count);
        debug_assert_eq!(self.framebuffers.len(), image_count);
        debug_assert_eq!(self.command_buffers.len(), image_count);

        let info = SwapchainInfo {
            format,
            present_mode,
            extent,
            requested_images,
            image_count,
        };
        self.info = Some(info);
        self.record(ctx, extent, cfg.clear_color)?;

        info!(
            "swapchain: format {} ({:?}), present mode {}, extent {}x{}, images {} (requested {})",
            format_name(format.format),
            format.color_space,
            present_mode_name(present_mode),
            extent.width,
            extent.height,
            image_count,
            requested_images
        );
        Ok(())
    }

    /// Records every command buffer once. They are never re-recorded.
    unsafe fn record(
        &self,
        ctx: &DeviceContext,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) -> Result<(), VkError> {
        let device = &ctx.device;
        let clear = vk::ClearValue {
            color: vk::ClearColorValue {
                float32: clear_color,
            },
        };

        for (&cmd, &framebuffer) in self.command_buffers.iter().zip(&self.framebuffers) {
            let begin = vk::CommandBufferBeginInfo {
                s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
                ..Default::default()
            };
            device
                .begin_command_buffer(cmd, &begin)
                .op("vkBeginCommandBuffer")?;

            let rp_begin = vk::RenderPassBeginInfo {
                s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
                render_pass: self.render_pass,
                framebuffer,
                render_area: vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                },
                clear_value_count: 1,
                p_clear_values: &clear,
                ..Default::default()
            };
            device.cmd_begin_render_pass(cmd, &rp_begin, vk::SubpassContents::INLINE);
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);
            device.cmd_draw(cmd, 3, 1, 0, 0);
            device.cmd_end_render_pass(cmd);

            device.end_command_buffer(cmd).op("vkEndCommandBuffer")?;
        }
        Ok(())
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn command_buffer(&self, image: u32) -> Result<vk::CommandBuffer, VkError> {
        self.command_buffers
            .get(image as usize)
            .copied()
            .ok_or(VkError::ImageIndex {
                index: image,
                count: self.command_buffers.len(),
            })
    }

    /// Reverse dependency order. The device must be idle. Null handles and
    /// empty arrays are skipped, so a half-built bundle tears down cleanly.
    pub unsafe fn destroy(self, ctx: &DeviceContext) {
        let device = &ctx.device;
        for fb in self.framebuffers {
            device.destroy_framebuffer(fb, None);
        }
        if !self.command_buffers.is_empty() {
            device.free_command_buffers(ctx.command_pool, &self.command_buffers);
        }
        device.destroy_pipeline(self.pipeline, None);
        device.destroy_pipeline_layout(self.pipeline_layout, None);
        device.destroy_render_pass(self.render_pass, None);
        for view in self.views {
            device.destroy_image_view(view, None);
        }
        ctx.swapchain_loader.destroy_swapchain(self.swapchain, None);
    }
}
