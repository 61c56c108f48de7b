use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use kiosk::App;
use kiosk::gesture::GestureConfig;
use kiosk::supervisor::{AppCommands, SupervisorConfig};

use crate::error::KioskError;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    pub touch_device: PathBuf,
    pub framebuffer_device: PathBuf,
    /// The panel is mounted upside down on the stock enclosure.
    pub rotate_180: bool,
    pub initial_app: App,
    pub gestures: GestureConfig,
    pub supervisor: SupervisorConfig,
    pub apps: AppCommands,
    pub dashboard: DashboardConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            touch_device: PathBuf::from("/dev/input/event0"),
            framebuffer_device: PathBuf::from("/dev/fb1"),
            rotate_180: true,
            initial_app: App::Photos,
            gestures: GestureConfig::default(),
            supervisor: SupervisorConfig::default(),
            apps: AppCommands::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

/// What the dashboard pages report on.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    pub services: Vec<String>,
    pub storage_paths: Vec<PathBuf>,
    pub nginx_unit: String,
    pub squid_unit: String,
    pub immich_container: String,
    pub log_lines: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            services: ["squid", "nginx", "docker", "cron", "ssh"]
                .map(String::from)
                .to_vec(),
            storage_paths: ["/", "/mnt/raidbox", "/mnt/router_hdd"]
                .map(PathBuf::from)
                .to_vec(),
            nginx_unit: "nginx".to_string(),
            squid_unit: "squid".to_string(),
            immich_container: "immich_server".to_string(),
            log_lines: 20,
        }
    }
}

pub async fn parse_config<P>(path: P) -> Result<Config, KioskError>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => parse_config_str(&contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("{} not found, using defaults", path.display());
            Ok(Config::default())
        }
        Err(e) => Err(KioskError::ConfigFileRead(path.to_path_buf(), e)),
    }
}

fn parse_config_str(contents: &str) -> Result<Config, KioskError> {
    Ok(toml::from_str(contents)?)
}
