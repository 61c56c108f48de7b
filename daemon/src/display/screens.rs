use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::{FONT_6X10, FONT_7X13, FONT_9X15, FONT_10X20};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Circle, PrimitiveStyle, Rectangle, RoundedRectangle};
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};

use kiosk::navigation::{BACK_BUTTON, Page};
use kiosk::{SCREEN_HEIGHT, SCREEN_WIDTH};

use super::Canvas;
use super::status::{Bar, PageContent, ServiceState};

const BACKGROUND: Rgb888 = Rgb888::new(20, 20, 22);
const TEXT: Rgb888 = Rgb888::new(240, 240, 240);
pub(super) const PRIMARY: Rgb888 = Rgb888::new(10, 132, 255);
const SECONDARY: Rgb888 = Rgb888::new(142, 142, 147);
const BUTTON: Rgb888 = Rgb888::new(44, 44, 46);
const TRACK: Rgb888 = Rgb888::new(50, 50, 50);
const GREEN: Rgb888 = Rgb888::new(52, 199, 89);
const RED: Rgb888 = Rgb888::new(255, 69, 58);
const YELLOW: Rgb888 = Rgb888::new(255, 214, 10);
const ORANGE: Rgb888 = Rgb888::new(255, 159, 10);

const PADDING: i32 = 20;
const GAP: i32 = 8;
const CORNER: Size = Size::new(10, 10);
const CONTENT_TOP: i32 = 70;
const LOG_LINE_HEIGHT: i32 = 12;
const LOG_COLUMNS: usize = (SCREEN_WIDTH as usize - 2 * PADDING as usize) / 6;

const W: i32 = SCREEN_WIDTH as i32;
const H: i32 = SCREEN_HEIGHT as i32;

fn clear(fb: &mut Canvas) {
    fb.clear(BACKGROUND).ok();
}

fn rounded(fb: &mut Canvas, top_left: Point, size: Size, color: Rgb888) {
    RoundedRectangle::with_equal_corners(Rectangle::new(top_left, size), CORNER)
        .into_styled(PrimitiveStyle::with_fill(color))
        .draw(fb)
        .ok();
}

fn label(fb: &mut Canvas, text: &str, at: Point, style: MonoTextStyle<Rgb888>) {
    Text::with_baseline(text, at, style, Baseline::Top).draw(fb).ok();
}

fn label_right(fb: &mut Canvas, text: &str, at: Point, style: MonoTextStyle<Rgb888>) {
    let text_style = TextStyleBuilder::new()
        .alignment(Alignment::Right)
        .baseline(Baseline::Top)
        .build();
    Text::with_text_style(text, at, style, text_style).draw(fb).ok();
}

/// Four buttons, one per quadrant, in reading order. `None` leaves a slot
/// empty.
fn quadrant_menu(fb: &mut Canvas, labels: [Option<&str>; 4]) {
    clear(fb);
    let half_w = W / 2;
    let half_h = H / 2;
    let size = Size::new(
        (half_w - PADDING - GAP / 2) as u32,
        (half_h - PADDING - GAP / 2) as u32,
    );
    let origins = [
        Point::new(PADDING, PADDING),
        Point::new(half_w + GAP / 2, PADDING),
        Point::new(PADDING, half_h + GAP / 2),
        Point::new(half_w + GAP / 2, half_h + GAP / 2),
    ];
    let style = MonoTextStyle::new(&FONT_10X20, TEXT);
    for (origin, text) in origins.into_iter().zip(labels) {
        let Some(text) = text else { continue };
        rounded(fb, origin, size, BUTTON);
        let middle = origin.y + size.height as i32 / 2 - 10;
        label(fb, text, Point::new(origin.x + 20, middle), style);
    }
}

fn back_button(fb: &mut Canvas) {
    let origin = Point::new(BACK_BUTTON.left as i32, BACK_BUTTON.top as i32);
    rounded(
        fb,
        origin,
        Size::new(BACK_BUTTON.width, BACK_BUTTON.height),
        PRIMARY,
    );
    label(
        fb,
        "< Home",
        origin + Point::new(20, 10),
        MonoTextStyle::new(&FONT_9X15, TEXT),
    );
}

fn header(fb: &mut Canvas, title: &str) {
    clear(fb);
    label(
        fb,
        title,
        Point::new(PADDING, PADDING),
        MonoTextStyle::new(&FONT_10X20, TEXT),
    );
    back_button(fb);
}

pub(super) fn top_menu(fb: &mut Canvas) {
    quadrant_menu(
        fb,
        [
            Some(Page::Storage.title()),
            Some(Page::Services.title()),
            Some("Logs"),
            Some(Page::Performance.title()),
        ],
    );
}

pub(super) fn logs_menu(fb: &mut Canvas) {
    quadrant_menu(
        fb,
        [
            Some(Page::SquidLogs.title()),
            Some(Page::NginxLogs.title()),
            Some(Page::ImmichLogs.title()),
            None,
        ],
    );
    back_button(fb);
}

pub(super) fn detail(fb: &mut Canvas, page: Page, content: &PageContent) {
    header(fb, page.title());
    match content {
        PageContent::Bars(bars) => {
            for (i, bar) in bars.iter().take(3).enumerate() {
                progress_bar(fb, CONTENT_TOP + 80 * i as i32, bar);
            }
        }
        PageContent::Health(services) => {
            let style = MonoTextStyle::new(&FONT_9X15, TEXT);
            for (i, (name, state)) in services.iter().enumerate() {
                let y = CONTENT_TOP + 30 * i as i32;
                if y + 15 > H {
                    break;
                }
                let color = match state {
                    ServiceState::Active => GREEN,
                    ServiceState::Inactive => RED,
                    ServiceState::Unknown => ORANGE,
                };
                Circle::new(Point::new(PADDING + 5, y + 2), 10)
                    .into_styled(PrimitiveStyle::with_fill(color))
                    .draw(fb)
                    .ok();
                label(fb, name, Point::new(PADDING + 25, y), style);
            }
        }
        PageContent::Log(lines) => {
            let style = MonoTextStyle::new(&FONT_6X10, TEXT);
            let rows = ((H - CONTENT_TOP - GAP) / LOG_LINE_HEIGHT) as usize;
            // newest lines are the interesting ones
            let skip = lines.len().saturating_sub(rows);
            for (i, line) in lines.iter().skip(skip).enumerate() {
                let shown: String = line.chars().take(LOG_COLUMNS).collect();
                let y = CONTENT_TOP + LOG_LINE_HEIGHT * i as i32;
                label(fb, &shown, Point::new(PADDING, y), style);
            }
        }
    }
}

fn progress_bar(fb: &mut Canvas, y: i32, bar: &Bar) {
    let width = (W - 2 * PADDING) as u32;
    let style = MonoTextStyle::new(&FONT_9X15, TEXT);
    label(fb, &bar.label, Point::new(PADDING, y), style);
    label_right(
        fb,
        &format!("{:.1}%", bar.percent),
        Point::new(W - PADDING, y),
        MonoTextStyle::new(&FONT_9X15, PRIMARY),
    );

    let track_y = y + 22;
    rounded(fb, Point::new(PADDING, track_y), Size::new(width, 25), TRACK);
    let color = if bar.percent > 85.0 {
        RED
    } else if bar.percent > 65.0 {
        YELLOW
    } else {
        GREEN
    };
    let filled = (bar.percent.clamp(0.0, 100.0) / 100.0 * width as f32) as u32;
    if filled > 0 {
        rounded(fb, Point::new(PADDING, track_y), Size::new(filled, 25), color);
    }
    label_right(
        fb,
        &bar.detail,
        Point::new(W - PADDING, track_y + 28),
        MonoTextStyle::new(&FONT_7X13, SECONDARY),
    );
}

pub(super) fn launch_failed(fb: &mut Canvas, message: &str) {
    clear(fb);
    label(
        fb,
        "Launch failed",
        Point::new(PADDING, PADDING),
        MonoTextStyle::new(&FONT_10X20, RED),
    );
    let style = MonoTextStyle::new(&FONT_7X13, TEXT);
    let columns = (W - 2 * PADDING) as usize / 7;
    let chars: Vec<char> = message.chars().collect();
    for (i, row) in chars.chunks(columns.max(1)).enumerate() {
        let row: String = row.iter().collect();
        label(fb, &row, Point::new(PADDING, CONTENT_TOP + 16 * i as i32), style);
    }
    label(
        fb,
        "Swipe to pick another app",
        Point::new(PADDING, H - PADDING - 13),
        MonoTextStyle::new(&FONT_7X13, SECONDARY),
    );
}

pub(super) fn idle(fb: &mut Canvas) {
    clear(fb);
}
