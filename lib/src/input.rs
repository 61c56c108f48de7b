//! Decoding of Linux evdev `struct input_event` records.
//!
//! The record is a kernel `timeval` followed by `u16 type`, `u16 code` and
//! `i32 value`, all in native byte order. The size of the timeval depends on
//! the width of `long` on the target.

use std::mem::size_of;
use std::time::Duration;

const LONG_SIZE: usize = size_of::<libc::c_long>();
const TIMEVAL_SIZE: usize = 2 * LONG_SIZE;

/// Size in bytes of one `struct input_event` on this target.
pub const INPUT_EVENT_SIZE: usize = TIMEVAL_SIZE + 8;

pub const EV_SYN: u16 = 0x00;
pub const EV_KEY: u16 = 0x01;
pub const EV_ABS: u16 = 0x03;

pub const ABS_X: u16 = 0x00;
pub const ABS_Y: u16 = 0x01;

pub const SYN_REPORT: u16 = 0x00;

pub const BTN_TOUCH: u16 = 0x14a;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    /// Kernel timestamp of the event, relative to the clock the device uses.
    pub time: Duration,
    pub kind: u16,
    pub code: u16,
    pub value: i32,
}

/// The subset of events the gesture recognizer cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchEvent {
    AbsX(i32),
    AbsY(i32),
    Contact(bool),
    /// End of a frame of events that belong to the same instant.
    Sync,
}

impl InputEvent {
    pub fn decode(buf: &[u8; INPUT_EVENT_SIZE]) -> Self {
        let secs = read_long(&buf[0..LONG_SIZE]);
        let usecs = read_long(&buf[LONG_SIZE..TIMEVAL_SIZE]);
        let rest = &buf[TIMEVAL_SIZE..];
        Self {
            time: Duration::from_secs(secs.max(0) as u64)
                + Duration::from_micros(usecs.clamp(0, 999_999) as u64),
            kind: u16::from_ne_bytes([rest[0], rest[1]]),
            code: u16::from_ne_bytes([rest[2], rest[3]]),
            value: i32::from_ne_bytes([rest[4], rest[5], rest[6], rest[7]]),
        }
    }

    pub fn touch(&self) -> Option<TouchEvent> {
        match (self.kind, self.code) {
            (EV_ABS, ABS_X) => Some(TouchEvent::AbsX(self.value)),
            (EV_ABS, ABS_Y) => Some(TouchEvent::AbsY(self.value)),
            (EV_KEY, BTN_TOUCH) => Some(TouchEvent::Contact(self.value != 0)),
            (EV_SYN, SYN_REPORT) => Some(TouchEvent::Sync),
            _ => None,
        }
    }
}

fn read_long(bytes: &[u8]) -> i64 {
    let mut raw = [0u8; LONG_SIZE];
    raw.copy_from_slice(bytes);
    libc::c_long::from_ne_bytes(raw) as i64
}

#[cfg(test)]
pub(crate) fn encode(time: Duration, kind: u16, code: u16, value: i32) -> [u8; INPUT_EVENT_SIZE] {
    let mut buf = [0u8; INPUT_EVENT_SIZE];
    let secs = time.as_secs() as libc::c_long;
    let usecs = time.subsec_micros() as libc::c_long;
    buf[0..LONG_SIZE].copy_from_slice(&secs.to_ne_bytes());
    buf[LONG_SIZE..TIMEVAL_SIZE].copy_from_slice(&usecs.to_ne_bytes());
    buf[TIMEVAL_SIZE..TIMEVAL_SIZE + 2].copy_from_slice(&kind.to_ne_bytes());
    buf[TIMEVAL_SIZE + 2..TIMEVAL_SIZE + 4].copy_from_slice(&code.to_ne_bytes());
    buf[TIMEVAL_SIZE + 4..].copy_from_slice(&value.to_ne_bytes());
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn test_event_size_matches_libc() {
        assert_eq!(INPUT_EVENT_SIZE, size_of::<libc::input_event>());
    }

    #[test]
    fn test_decode_touch_down() {
        let buf = encode(Duration::from_millis(1_500), EV_KEY, BTN_TOUCH, 1);
        let event = InputEvent::decode(&buf);
        assert_eq!(event.time, Duration::from_millis(1_500));
        assert_eq!(event.touch(), Some(TouchEvent::Contact(true)));
    }

    #[test]
    fn test_decode_axes() {
        let x = InputEvent::decode(&encode(Duration::ZERO, EV_ABS, ABS_X, 2048));
        let y = InputEvent::decode(&encode(Duration::ZERO, EV_ABS, ABS_Y, -3));
        assert_eq!(x.touch(), Some(TouchEvent::AbsX(2048)));
        assert_eq!(y.touch(), Some(TouchEvent::AbsY(-3)));
    }

    #[test]
    fn test_decode_sync() {
        let syn = InputEvent::decode(&encode(Duration::ZERO, EV_SYN, SYN_REPORT, 0));
        assert_eq!(syn.touch(), Some(TouchEvent::Sync));
    }

    #[test]
    fn test_irrelevant_events_ignored() {
        // SYN_MT_REPORT
        let mt = InputEvent::decode(&encode(Duration::ZERO, EV_SYN, 2, 0));
        assert_eq!(mt.touch(), None);
        // ABS_PRESSURE
        let pressure = InputEvent::decode(&encode(Duration::ZERO, EV_ABS, 0x18, 200));
        assert_eq!(pressure.touch(), None);
    }
}
