// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lindmar_core::{exit_fatal, init_tracing};
use lindmar_platform::PlatformWindow;
use lindmar_render::{resize_channel, FrameLoop, WindowSurface};
use lindmar_render_vk::VkRenderer;
use tracing::info;

mod config;

use config::{AppCfg, PresentModeCfg};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(long, default_value = "lindmar.toml")]
    config: PathBuf,
    /// Initial window width (logical pixels)
    #[arg(long)]
    width: Option<u32>,
    /// Initial window height (logical pixels)
    #[arg(long)]
    height: Option<u32>,
    /// Present mode: mailbox falls back to fifo when unsupported
    #[arg(long, value_enum)]
    present_mode: Option<PresentModeCfg>,
}

impl Args {
    fn apply(&self, cfg: &mut AppCfg) {
        if let Some(w) = self.width {
            cfg.window.width = w;
        }
        if let Some(h) = self.height {
            cfg.window.height = h;
        }
        if let Some(mode) = self.present_mode {
            cfg.render.present_mode = mode;
        }
    }
}

/// Window, Vulkan backend and frame loop as one unit.
struct Renderer {
    // Dropped before the window the surface was created from.
    frame_loop: FrameLoop<VkRenderer>,
    window: PlatformWindow,
}

impl Renderer {
    /// `None` when the window was closed before it ever had a drawable size.
    fn create(cfg: &AppCfg) -> Result<Option<Self>> {
        let (notifier, watch) = resize_channel();
        let mut window = PlatformWindow::new(&cfg.window_config(), notifier)?;

        while window.framebuffer_size().is_empty() {
            if window.should_close() {
                return Ok(None);
            }
            window.wait_events();
        }
        let size = window.framebuffer_size();

        // SAFETY: `window` is stored next to the renderer and outlives it.
        let backend = unsafe { VkRenderer::new(&window, &window, size, cfg.vk_config()) }
            .context("create Vulkan renderer")?;
        let frame_loop = FrameLoop::new(backend, watch)?;
        info!("renderer ready at {size}");
        Ok(Some(Self { frame_loop, window }))
    }

    fn run(&mut self) -> Result<()> {
        self.frame_loop.run(&mut self.window)
    }

    /// Sync objects, then swapchain bundle and device context, then the window.
    fn destroy(self) {
        let Self { frame_loop, window } = self;
        let backend = frame_loop.destroy();
        drop(backend);
        window.destroy();
    }
}

fn run(args: Args) -> Result<()> {
    let mut cfg = AppCfg::load(&args.config)?;
    args.apply(&mut cfg);
    info!(
        "window {}x{}, present mode {:?}",
        cfg.window.width, cfg.window.height, cfg.render.present_mode
    );

    let Some(mut renderer) = Renderer::create(&cfg)? else {
        info!("window closed before the first frame");
        return Ok(());
    };
    let result = renderer.run();
    renderer.destroy();
    result
}

fn main() {
    init_tracing();
    let args = Args::parse();
    if let Err(err) = run(args) {
        exit_fatal(&err);
    }
}
