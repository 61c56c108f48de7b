//! Turns raw touch-panel samples into taps and horizontal swipes.
//!
//! The panel is mounted rotated: the screen's horizontal axis is the raw Y
//! axis, inverted, and the screen's vertical axis is the raw X axis.
//! Classification only happens once a contact is released, using the kernel
//! timestamps carried by the events so the same input always yields the same
//! gesture.

use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::input::{InputEvent, TouchEvent};
use crate::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// Axis maximum assumed when the device can't be asked for its ranges.
pub const DEFAULT_AXIS_MAX: i32 = 4095;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct GestureConfig {
    /// Fraction of the horizontal raw range a swipe has to cover.
    pub swipe_fraction: f64,
    /// Fraction of the raw range a tap may drift before it stops being a tap.
    pub jitter_fraction: f64,
    pub max_swipe_ms: u64,
    /// Contact-down edges this soon after a release are treated as bounce.
    pub debounce_ms: u64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            swipe_fraction: 1.0 / 3.0,
            jitter_fraction: 0.25,
            max_swipe_ms: 500,
            debounce_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
}

impl AxisRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    fn width(&self) -> i64 {
        self.max as i64 - self.min as i64
    }
}

impl Default for AxisRange {
    fn default() -> Self {
        Self::new(0, DEFAULT_AXIS_MAX)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("touch axis {axis} reports a degenerate range {min}..{max}")]
    DegenerateRange { axis: &'static str, min: i32, max: i32 },
}

/// A position in raw device units (`x` = ABS_X, `y` = ABS_Y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawPoint {
    pub x: i32,
    pub y: i32,
}

/// A position in logical screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Tap(Point),
    Swipe(Direction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Swipe(Direction),
    Tap,
    /// Moved too much for a tap, too little (or too diagonally) for a swipe.
    Ambiguous,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    x: AxisRange,
    y: AxisRange,
    swipe_threshold: f64,
    /// Maximum vertical drift, raw X units.
    jitter_threshold: f64,
    /// Maximum horizontal drift for a tap, raw Y units.
    horizontal_jitter: f64,
    max_swipe: Duration,
    debounce: Duration,
}

impl Calibration {
    pub fn new(
        x: AxisRange,
        y: AxisRange,
        config: &GestureConfig,
    ) -> Result<Self, CalibrationError> {
        if x.width() <= 0 {
            return Err(CalibrationError::DegenerateRange {
                axis: "ABS_X",
                min: x.min,
                max: x.max,
            });
        }
        if y.width() <= 0 {
            return Err(CalibrationError::DegenerateRange {
                axis: "ABS_Y",
                min: y.min,
                max: y.max,
            });
        }
        Ok(Self {
            x,
            y,
            swipe_threshold: y.width() as f64 * config.swipe_fraction,
            jitter_threshold: x.width() as f64 * config.jitter_fraction,
            horizontal_jitter: y.width() as f64 * config.jitter_fraction,
            max_swipe: Duration::from_millis(config.max_swipe_ms),
            debounce: Duration::from_millis(config.debounce_ms),
        })
    }

    pub fn swipe_threshold(&self) -> f64 {
        self.swipe_threshold
    }

    pub fn jitter_threshold(&self) -> f64 {
        self.jitter_threshold
    }

    pub fn classify(
        &self,
        origin: RawPoint,
        release: RawPoint,
        elapsed: Duration,
    ) -> Classification {
        // raw Y runs right-to-left across the screen
        let horizontal = (origin.y as i64 - release.y as i64) as f64;
        let vertical = (release.x as i64 - origin.x as i64) as f64;

        if elapsed < self.max_swipe {
            if horizontal.abs() > self.swipe_threshold && vertical.abs() < self.jitter_threshold {
                return if horizontal > 0.0 {
                    Classification::Swipe(Direction::Right)
                } else {
                    Classification::Swipe(Direction::Left)
                };
            }
            if horizontal.abs() > self.horizontal_jitter
                || vertical.abs() >= self.jitter_threshold
            {
                return Classification::Ambiguous;
            }
        }
        Classification::Tap
    }

    /// Scale a raw position to screen pixels, clamped to the panel.
    pub fn to_screen(&self, raw: RawPoint) -> Point {
        let x = (self.y.max as i64 - raw.y as i64) * SCREEN_WIDTH as i64 / self.y.width();
        let y = (raw.x as i64 - self.x.min as i64) * SCREEN_HEIGHT as i64 / self.x.width();
        Point {
            x: x.clamp(0, SCREEN_WIDTH as i64 - 1) as u32,
            y: y.clamp(0, SCREEN_HEIGHT as i64 - 1) as u32,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TouchDown {
    origin: RawPoint,
    at: Duration,
}

/// Stateful recognizer fed one decoded input event at a time.
///
/// Contact edges are applied at the end of their event frame (`SYN_REPORT`),
/// once the frame's axis updates are in, so the origin and release positions
/// belong to the contact and not to the previous touch.
pub struct GestureRecognizer {
    calibration: Calibration,
    current: RawPoint,
    pending: Option<(bool, Duration)>,
    touch: Option<TouchDown>,
    last_release: Option<Duration>,
    bouncing: bool,
}

impl GestureRecognizer {
    pub fn new(calibration: Calibration) -> Self {
        Self {
            calibration,
            current: RawPoint::default(),
            pending: None,
            touch: None,
            last_release: None,
            bouncing: false,
        }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn feed(&mut self, event: &InputEvent) -> Option<Gesture> {
        match event.touch()? {
            TouchEvent::AbsX(value) => {
                self.current.x = value;
                None
            }
            TouchEvent::AbsY(value) => {
                self.current.y = value;
                None
            }
            TouchEvent::Contact(down) => {
                self.pending = Some((down, event.time));
                None
            }
            TouchEvent::Sync => {
                let (down, at) = self.pending.take()?;
                if down {
                    self.press(at);
                    None
                } else {
                    self.release(at)
                }
            }
        }
    }

    fn press(&mut self, at: Duration) {
        if self.touch.is_some() {
            debug!("contact-down while already down, keeping original origin");
            return;
        }
        if let Some(last) = self.last_release
            && at.saturating_sub(last) < self.calibration.debounce
        {
            debug!("contact-down {:?} after release, ignoring as bounce", at.saturating_sub(last));
            self.bouncing = true;
            return;
        }
        self.touch = Some(TouchDown {
            origin: self.current,
            at,
        });
    }

    fn release(&mut self, at: Duration) -> Option<Gesture> {
        let Some(down) = self.touch.take() else {
            if self.bouncing {
                self.bouncing = false;
                self.last_release = Some(at);
            }
            return None;
        };
        self.last_release = Some(at);

        let elapsed = at.saturating_sub(down.at);
        let release = self.current;
        let classification = self.calibration.classify(down.origin, release, elapsed);
        debug!(
            "gesture released after {elapsed:?}: {:?} -> {:?} = {classification:?}",
            down.origin, release
        );
        match classification {
            Classification::Swipe(direction) => Some(Gesture::Swipe(direction)),
            Classification::Tap => Some(Gesture::Tap(self.calibration.to_screen(release))),
            Classification::Ambiguous => None,
        }
    }
}
