// SPDX-License-Identifier: CEPL-1.0
use std::{fs, io, path::Path};

use anyhow::{Context, Result};
use lindmar_platform::WindowConfig;
use lindmar_render_vk::{PresentPreference, VkConfig};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct AppCfg {
    pub window: WindowCfg,
    pub render: RenderCfg,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct RenderCfg {
    pub clear_color: [f32; 4],
    pub present_mode: PresentModeCfg,
    pub validation: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeCfg {
    #[default]
    Mailbox,
    Fifo,
}

impl Default for WindowCfg {
    fn default() -> Self {
        let w = WindowConfig::default();
        Self {
            title: w.title,
            width: w.width,
            height: w.height,
            resizable: w.resizable,
        }
    }
}

impl Default for RenderCfg {
    fn default() -> Self {
        let vk = VkConfig::default();
        Self {
            clear_color: vk.clear_color,
            present_mode: PresentModeCfg::Mailbox,
            validation: vk.validation,
        }
    }
}

impl AppCfg {
    /// A missing file means defaults; anything unreadable or malformed is an
    /// error naming the path.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(s) => Self::parse(&s).with_context(|| format!("parse {}", path.display())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("no {} found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn window_config(&self) -> WindowConfig {
        WindowConfig {
            title: self.window.title.clone(),
            width: self.window.width,
            height: self.window.height,
            resizable: self.window.resizable,
        }
    }

    pub fn vk_config(&self) -> VkConfig {
        VkConfig {
            clear_color: self.render.clear_color,
            present: match self.render.present_mode {
                PresentModeCfg::Mailbox => PresentPreference::Mailbox,
                PresentModeCfg::Fifo => PresentPreference::Fifo,
            },
            validation: self.render.validation,
        }
    }
}
