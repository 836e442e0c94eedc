use std::f32::consts::TAU;

use chrono::{Duration, Timelike};
use image::{Rgb, RgbImage};
use marquee_core::countdown;
use marquee_core::types::Timestamp;

use super::{Frame, FrameSource, RenderError};

const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Fractional seconds into the current minute.
fn second_of_minute(at: Timestamp) -> f32 {
    at.second() as f32 + at.nanosecond() as f32 / 1_000_000_000.0
}

fn scale(color: Rgb<u8>, factor: f32) -> Rgb<u8> {
    let f = factor.clamp(0.0, 1.0);
    Rgb(color.0.map(|c| (c as f32 * f) as u8))
}

/// Plot a ray from the frame center at `angle` (radians, 0 = up, clockwise).
fn ray(img: &mut RgbImage, angle: f32, length: f32, color: Rgb<u8>) {
    let cx = img.width() as f32 / 2.0;
    let cy = img.height() as f32 / 2.0;
    let (sin, cos) = angle.sin_cos();
    let mut r = 0.0;
    while r <= length {
        let x = cx + sin * r;
        let y = cy - cos * r;
        if x >= 0.0 && y >= 0.0 && (x as u32) < img.width() && (y as u32) < img.height() {
            img.put_pixel(x as u32, y as u32, color);
        }
        r += 0.5;
    }
}

fn fill_rect(img: &mut RgbImage, x0: i64, y0: i64, w: i64, h: i64, color: Rgb<u8>) {
    let x_end = (x0 + w).min(img.width() as i64);
    let y_end = (y0 + h).min(img.height() as i64);
    for y in y0.max(0)..y_end {
        for x in x0.max(0)..x_end {
            img.put_pixel(x as u32, y as u32, color);
        }
    }
}

/// Twelve rays around the center; the one nearest the second hand is lit and
/// every ray pulses once per second.
#[derive(Debug)]
pub struct ClockPulse {
    width: u32,
    height: u32,
}

impl ClockPulse {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl FrameSource for ClockPulse {
    fn next_frame(&mut self, at: Timestamp) -> Result<Frame, RenderError> {
        let mut img = RgbImage::from_pixel(self.width, self.height, BLACK);
        let seconds = second_of_minute(at);
        let pulse = 1.0 - seconds.fract();
        let lit = ((seconds / 5.0) as usize) % 12;
        let length = self.width.max(self.height) as f32;
        for i in 0..12 {
            let angle = i as f32 * TAU / 12.0;
            let color = if i == lit {
                Rgb([255, 255, 255])
            } else {
                scale(Rgb([255, 140, 0]), 0.25 + 0.5 * pulse)
            };
            ray(&mut img, angle, length, color);
        }
        Ok(img)
    }
}

/// A sweeping line leaving a fading trail; one revolution every four seconds.
#[derive(Debug)]
pub struct RadarSweep {
    trail: RgbImage,
}

impl RadarSweep {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            trail: RgbImage::from_pixel(width, height, BLACK),
        }
    }
}

impl FrameSource for RadarSweep {
    fn next_frame(&mut self, at: Timestamp) -> Result<Frame, RenderError> {
        for pixel in self.trail.pixels_mut() {
            *pixel = scale(*pixel, 0.8);
        }
        let angle = (second_of_minute(at) / 4.0).fract() * TAU;
        let length = self.trail.width().max(self.trail.height()) as f32;
        ray(&mut self.trail, angle, length, Rgb([0, 255, 64]));
        Ok(self.trail.clone())
    }
}

/// Horizontal bar shrinking towards the end of a timer; blinks once the
/// countdown turns important.
#[derive(Debug)]
pub struct CountdownBar {
    width: u32,
    height: u32,
    ends_at: Timestamp,
    total: Duration,
}

impl CountdownBar {
    pub fn new(width: u32, height: u32, ends_at: Timestamp, total: Duration) -> Self {
        Self {
            width,
            height,
            ends_at,
            total,
        }
    }
}

impl FrameSource for CountdownBar {
    fn next_frame(&mut self, at: Timestamp) -> Result<Frame, RenderError> {
        let mut img = RgbImage::from_pixel(self.width, self.height, BLACK);
        let remaining = countdown::remaining(self.ends_at, at);
        let total_ms = self.total.num_milliseconds().max(1) as f32;
        let fraction = remaining.num_milliseconds() as f32 / total_ms;
        let important = countdown::is_important(remaining);
        let blink_off = important && at.nanosecond() >= 500_000_000;
        if !blink_off {
            let color = if important {
                Rgb([255, 32, 32])
            } else {
                Rgb([32, 200, 255])
            };
            let bar = (self.width as f32 * fraction).ceil() as i64;
            let h = i64::from(self.height);
            fill_rect(&mut img, 0, h / 3, bar, h / 3, color);
        }
        Ok(img)
    }
}

/// A door sliding across the display, one pixel per frame.
#[derive(Debug)]
pub struct SlidingDoor {
    width: u32,
    height: u32,
    frame: u64,
}

impl SlidingDoor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame: 0,
        }
    }
}

impl FrameSource for SlidingDoor {
    fn next_frame(&mut self, _at: Timestamp) -> Result<Frame, RenderError> {
        let mut img = RgbImage::from_pixel(self.width, self.height, BLACK);
        let door_w = i64::from((self.width / 4).max(1));
        let span = i64::from(self.width) + door_w;
        let x = (self.frame as i64 % span) - door_w;
        fill_rect(&mut img, x, 2, door_w, i64::from(self.height) - 2, Rgb([150, 90, 40]));
        fill_rect(&mut img, x + door_w - 3, i64::from(self.height) / 2, 1, 1, Rgb([255, 215, 0]));
        self.frame += 1;
        Ok(img)
    }
}

/// A scrolling stripe in a color derived from the item identity.
#[derive(Debug)]
pub struct TitleCard {
    width: u32,
    height: u32,
    color: Rgb<u8>,
    frame: u64,
}

impl TitleCard {
    pub fn new(width: u32, height: u32, item_id: &str) -> Self {
        // FNV-1a
        let hash = item_id
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325_u64, |h, b| (h ^ u64::from(b)).wrapping_mul(0x100_0000_01b3));
        let [r, g, b, ..] = hash.to_le_bytes();
        Self {
            width,
            height,
            color: Rgb([r | 0x40, g | 0x40, b | 0x40]),
            frame: 0,
        }
    }
}

impl FrameSource for TitleCard {
    fn next_frame(&mut self, _at: Timestamp) -> Result<Frame, RenderError> {
        let mut img = RgbImage::from_pixel(self.width, self.height, scale(self.color, 0.2));
        let x = (self.frame % u64::from(self.width)) as i64;
        fill_rect(&mut img, x, 0, 4, i64::from(self.height), self.color);
        self.frame += 1;
        Ok(img)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 11, 12, 0, 0).unwrap()
    }

    fn lit(img: &RgbImage) -> usize {
        img.pixels().filter(|p| p.0 != [0, 0, 0]).count()
    }

    #[test]
    fn clock_pulse_is_a_pure_function_of_time() {
        let mut a = ClockPulse::new(64, 32);
        let mut b = ClockPulse::new(64, 32);
        let at = t0() + Duration::milliseconds(2_300);
        assert_eq!(a.next_frame(at).unwrap(), b.next_frame(at).unwrap());
    }

    #[test]
    fn radar_keeps_a_trail() {
        let mut radar = RadarSweep::new(64, 32);
        let first = radar.next_frame(t0()).unwrap();
        let second = radar.next_frame(t0() + Duration::milliseconds(500)).unwrap();
        assert!(lit(&second) > lit(&first));
    }

    #[test]
    fn countdown_bar_empties_at_the_end() {
        let end = t0() + Duration::minutes(5);
        let mut bar = CountdownBar::new(64, 32, end, Duration::minutes(10));
        assert!(lit(&bar.next_frame(t0()).unwrap()) > 0);
        assert_eq!(lit(&bar.next_frame(end).unwrap()), 0);
    }

    #[test]
    fn door_moves_between_frames() {
        let mut door = SlidingDoor::new(64, 32);
        let a = door.next_frame(t0()).unwrap();
        let b = door.next_frame(t0()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn title_card_color_depends_on_item() {
        let a = TitleCard::new(64, 32, "track-a");
        let b = TitleCard::new(64, 32, "track-b");
        assert_ne!(a.color, b.color);
    }
}
