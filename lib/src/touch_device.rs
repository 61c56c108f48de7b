//! The evdev touch panel: calibration via `EVIOCGABS` and a stream of
//! recognized gestures.

use std::io;
use std::path::{Path, PathBuf};

use futures::Stream;
use log::{info, warn};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::gesture::{
    AxisRange, Calibration, CalibrationError, Gesture, GestureConfig, GestureRecognizer,
};
use crate::input::{ABS_X, ABS_Y, INPUT_EVENT_SIZE, InputEvent};

#[derive(Error, Debug)]
pub enum TouchDeviceError {
    #[error("failed to open touch device {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read from touch device: {0}")]
    Read(#[source] io::Error),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}

pub struct TouchDevice {
    path: PathBuf,
    file: File,
}

impl TouchDevice {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, TouchDeviceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .await
            .map_err(|source| TouchDeviceError::Open {
                path: path.clone(),
                source,
            })?;
        info!("opened touch device {}", path.display());
        Ok(Self { path, file })
    }

    /// Ask the driver for its axis ranges. Falls back to `0..=4095` for an
    /// axis the driver won't report, but a range it does report has to be
    /// usable.
    pub fn calibration(&self, config: &GestureConfig) -> Result<Calibration, TouchDeviceError> {
        let x = self.axis_range(ABS_X, "ABS_X");
        let y = self.axis_range(ABS_Y, "ABS_Y");
        info!("touch ranges: x {}..{}, y {}..{}", x.min, x.max, y.min, y.max);
        Ok(Calibration::new(x, y, config)?)
    }

    fn axis_range(&self, axis: u16, name: &str) -> AxisRange {
        match query_axis(&self.file, axis) {
            Ok(range) => range,
            Err(e) => {
                warn!(
                    "couldn't read {name} range from {}, assuming the default: {e}",
                    self.path.display()
                );
                AxisRange::default()
            }
        }
    }

    pub async fn next_event(&mut self) -> Result<InputEvent, TouchDeviceError> {
        let mut buf = [0u8; INPUT_EVENT_SIZE];
        self.file
            .read_exact(&mut buf)
            .await
            .map_err(TouchDeviceError::Read)?;
        Ok(InputEvent::decode(&buf))
    }

    /// Consume the device as an endless stream of gestures. A read error is
    /// yielded once and ends the stream.
    pub fn gestures(
        self,
        recognizer: GestureRecognizer,
    ) -> impl Stream<Item = Result<Gesture, TouchDeviceError>> {
        futures::stream::unfold(Some((self, recognizer)), |state| async move {
            let (mut device, mut recognizer) = state?;
            loop {
                match device.next_event().await {
                    Ok(event) => {
                        if let Some(gesture) = recognizer.feed(&event) {
                            return Some((Ok(gesture), Some((device, recognizer))));
                        }
                    }
                    Err(e) => return Some((Err(e), None)),
                }
            }
        })
    }
}

#[cfg(target_os = "linux")]
mod ioctl {
    // EVIOCGABS(abs) is _IOR('E', 0x40 + abs, struct input_absinfo)
    nix::ioctl_read!(eviocgabs_x, b'E', 0x40, libc::input_absinfo);
    nix::ioctl_read!(eviocgabs_y, b'E', 0x41, libc::input_absinfo);
}

#[cfg(target_os = "linux")]
fn query_axis(file: &File, axis: u16) -> io::Result<AxisRange> {
    use std::os::fd::AsRawFd;

    let fd = file.as_raw_fd();
    let mut info = libc::input_absinfo {
        value: 0,
        minimum: 0,
        maximum: 0,
        fuzz: 0,
        flat: 0,
        resolution: 0,
    };
    // SAFETY: fd is open for the lifetime of `file` and `info` is a valid
    // input_absinfo for the kernel to fill in.
    let result = unsafe {
        match axis {
            ABS_X => ioctl::eviocgabs_x(fd, &mut info),
            ABS_Y => ioctl::eviocgabs_y(fd, &mut info),
            _ => return Err(io::Error::new(io::ErrorKind::InvalidInput, "unsupported axis")),
        }
    };
    result.map_err(io::Error::from)?;
    Ok(AxisRange::new(info.minimum, info.maximum))
}

#[cfg(not(target_os = "linux"))]
fn query_axis(_file: &File, _axis: u16) -> io::Result<AxisRange> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "EVIOCGABS needs Linux"))
}
