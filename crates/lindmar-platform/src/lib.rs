// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Window and event pumping on top of winit.
//!
//! winit's `run_app` owns the thread; the frame loop instead wants to pull
//! events at iteration boundaries, so events are pumped with
//! `pump_app_events`: a zero timeout polls, no timeout blocks.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use lindmar_render::{RenderSize, ResizeNotifier, WindowSurface};
use tracing::{debug, info};

pub use winit;

use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    raw_window_handle::{
        DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
    },
    window::{Window, WindowAttributes, WindowId},
};

#[derive(Clone, Debug)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Lindmar".to_owned(),
            width: 1280,
            height: 720,
            resizable: true,
        }
    }
}

struct WindowState {
    attributes: Option<WindowAttributes>,
    window: Option<Window>,
    resize: ResizeNotifier,
    close_requested: bool,
    exited: bool,
    error: Option<anyhow::Error>,
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let Some(attributes) = self.attributes.take() else {
            return;
        };
        match event_loop.create_window(attributes) {
            Ok(window) => {
                let size = window.inner_size();
                info!("window created ({}x{} px)", size.width, size.height);
                self.window = Some(window);
            }
            Err(e) => self.error = Some(anyhow::Error::new(e)),
        }
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            // The window itself stays alive until the renderer has released
            // the surface built on it.
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                debug!("Resized → {}x{}", size.width, size.height);
                self.resize.notify();
            }
            _ => {}
        }
    }
}

/// A single window plus the event loop feeding it.
pub struct PlatformWindow {
    // Dropped before the event loop.
    state: WindowState,
    event_loop: EventLoop<()>,
}

impl PlatformWindow {
    pub fn new(cfg: &WindowConfig, resize: ResizeNotifier) -> Result<Self> {
        let event_loop = EventLoop::new().context("create event loop")?;
        let attributes = Window::default_attributes()
            .with_title(cfg.title.clone())
            .with_inner_size(LogicalSize::new(cfg.width, cfg.height))
            .with_resizable(cfg.resizable);

        let mut platform = Self {
            state: WindowState {
                attributes: Some(attributes),
                window: None,
                resize,
                close_requested: false,
                exited: false,
                error: None,
            },
            event_loop,
        };

        // Windows can only be created once the loop reports `resumed`.
        while platform.state.window.is_none() {
            platform.pump(Some(Duration::ZERO));
            if let Some(err) = platform.state.error.take() {
                return Err(err.context("create window"));
            }
            if platform.state.exited {
                return Err(anyhow!("event loop exited before the window was created"));
            }
        }
        Ok(platform)
    }

    pub fn window(&self) -> Option<&Window> {
        self.state.window.as_ref()
    }

    fn pump(&mut self, timeout: Option<Duration>) {
        if let PumpStatus::Exit(code) = self
            .event_loop
            .pump_app_events(timeout, &mut self.state)
        {
            debug!("event loop exited with code {code}");
            self.state.exited = true;
        }
    }

    /// Destroys the window. Anything presenting to it must be gone by now.
    pub fn destroy(self) {
        drop(self);
    }
}

impl WindowSurface for PlatformWindow {
    fn framebuffer_size(&self) -> RenderSize {
        self.state
            .window
            .as_ref()
            .map(|w| {
                let size = w.inner_size();
                RenderSize::new(size.width, size.height)
            })
            .unwrap_or_default()
    }

    fn poll_events(&mut self) {
        self.pump(Some(Duration::ZERO));
    }

    fn wait_events(&mut self) {
        self.pump(None);
    }

    fn should_close(&self) -> bool {
        self.state.close_requested || self.state.exited
    }
}

impl HasWindowHandle for PlatformWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.state
            .window
            .as_ref()
            .ok_or(HandleError::Unavailable)?
            .window_handle()
    }
}

impl HasDisplayHandle for PlatformWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.state
            .window
            .as_ref()
            .ok_or(HandleError::Unavailable)?
            .display_handle()
    }
}
