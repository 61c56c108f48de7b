use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use embedded_graphics::framebuffer::{Framebuffer, buffer_size};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::pixelcolor::raw::BigEndian;
use embedded_graphics::prelude::*;
use log::{debug, error};

use kiosk::navigation::DashboardView;
use kiosk::{SCREEN_HEIGHT, SCREEN_WIDTH};

use crate::config::DashboardConfig;

mod screens;
mod status;

const WIDTH: usize = SCREEN_WIDTH as usize;
const HEIGHT: usize = SCREEN_HEIGHT as usize;

pub type Canvas = Framebuffer<
    Rgb888,
    <Rgb888 as PixelColor>::Raw,
    BigEndian,
    WIDTH,
    HEIGHT,
    { buffer_size::<Rgb888>(WIDTH, HEIGHT) },
>;

/// Where finished frames go. Frames are packed RGB888, row-major.
#[async_trait]
pub trait FramebufferSink: Send {
    async fn write_frame(&mut self, rgb888: &[u8]) -> anyhow::Result<()>;
}

/// A Linux framebuffer device taking RGB565 little endian.
pub struct DeviceFramebuffer {
    path: PathBuf,
    rotate_180: bool,
}

impl DeviceFramebuffer {
    pub fn new(path: PathBuf, rotate_180: bool) -> Self {
        Self { path, rotate_180 }
    }
}

#[async_trait]
impl FramebufferSink for DeviceFramebuffer {
    async fn write_frame(&mut self, rgb888: &[u8]) -> anyhow::Result<()> {
        let raw = to_rgb565(rgb888, self.rotate_180);
        tokio::fs::write(&self.path, &raw)
            .await
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

fn to_rgb565(rgb888: &[u8], rotate_180: bool) -> Vec<u8> {
    let mut raw = Vec::with_capacity(rgb888.len() / 3 * 2);
    let pixels = rgb888.chunks_exact(3);
    // turning the panel by 180 degrees is the same as reversing the pixels
    let pixels: Box<dyn Iterator<Item = &[u8]>> = if rotate_180 {
        Box::new(pixels.rev())
    } else {
        Box::new(pixels)
    };
    for chunk in pixels {
        let (r, g, b) = (chunk[0], chunk[1], chunk[2]);
        let mut rgb565: u16 = (r as u16 & 0b11111000) << 8;
        rgb565 |= (g as u16 & 0b11111100) << 3;
        rgb565 |= (b as u16) >> 3;
        raw.extend(rgb565.to_le_bytes());
    }
    raw
}

#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Dashboard(DashboardView),
    LaunchFailed(String),
    /// Nothing is running.
    Idle,
}

pub struct Renderer<F> {
    fb: F,
    canvas: Box<Canvas>,
    dashboard: DashboardConfig,
}

impl<F: FramebufferSink> Renderer<F> {
    pub fn new(fb: F, dashboard: DashboardConfig) -> Self {
        Self {
            fb,
            canvas: Box::new(Canvas::new()),
            dashboard,
        }
    }

    pub async fn show(&mut self, screen: &Screen) {
        debug!("drawing {screen:?}");
        match screen {
            Screen::Dashboard(DashboardView::TopMenu) => screens::top_menu(&mut self.canvas),
            Screen::Dashboard(DashboardView::LogsMenu) => screens::logs_menu(&mut self.canvas),
            Screen::Dashboard(DashboardView::Detail(page)) => {
                let content = status::gather(*page, &self.dashboard).await;
                screens::detail(&mut self.canvas, *page, &content);
            }
            Screen::LaunchFailed(message) => screens::launch_failed(&mut self.canvas, message),
            Screen::Idle => screens::idle(&mut self.canvas),
        }
        if let Err(e) = self.fb.write_frame(self.canvas.data()).await {
            error!("failed to draw: {e:#}");
        }
    }
}
