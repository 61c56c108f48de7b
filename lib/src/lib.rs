use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Initialize logging with the given default level. Respects `RUST_LOG`
/// overrides.
pub fn init_logging(default_level: log::LevelFilter) {
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();
}

pub mod gesture;
pub mod input;
pub mod navigation;

// process groups and evdev ioctls only exist on unix
#[cfg(target_family = "unix")]
pub mod supervisor;
#[cfg(target_family = "unix")]
pub mod touch_device;

/// Logical width of the kiosk panel, in pixels.
pub const SCREEN_WIDTH: u32 = 480;
/// Logical height of the kiosk panel, in pixels.
pub const SCREEN_HEIGHT: u32 = 320;

/// The apps that can own the display. Exactly the three the kiosk knows how to
/// start; anything else is rejected at the boundary.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum App {
    Dashboard,
    Photos,
    Video,
}

impl App {
    pub const ALL: [App; 3] = [App::Dashboard, App::Photos, App::Video];

    pub fn name(self) -> &'static str {
        match self {
            App::Dashboard => "dashboard",
            App::Photos => "photos",
            App::Video => "video",
        }
    }
}

impl fmt::Display for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown app: {0:?}")]
pub struct UnknownApp(pub String);

impl FromStr for App {
    type Err = UnknownApp;

    /// Accepts the canonical names as well as the script names older remotes
    /// still send (`rpi`, `immich`, `yt`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dashboard" | "rpi" => Ok(App::Dashboard),
            "photos" | "immich" => Ok(App::Photos),
            "video" | "yt" => Ok(App::Video),
            _ => Err(UnknownApp(s.to_string())),
        }
    }
}
