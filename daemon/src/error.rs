use std::path::PathBuf;

use kiosk::touch_device::TouchDeviceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KioskError {
    #[error("Failed to read config file {0}: {1}")]
    ConfigFileRead(PathBuf, std::io::Error),
    #[error("Config file parsing error: {0}")]
    ConfigFileParsing(#[from] toml::de::Error),
    #[error("Touch device error: {0}")]
    TouchDevice(#[from] TouchDeviceError),
    #[error("Failed to bind HTTP remote to port {0}: {1}")]
    Bind(u16, std::io::Error),
    #[error("Tokio error: {0}")]
    TokioError(#[from] tokio::io::Error),
}
