// Color sampler
//
// Maps pointer positions into palette pixel space and emits the sampled
// color, throttled to one emission per minimum interval and suppressed
// when the color has not changed. This throttle is the only backpressure
// between the pointer event stream and the light update path — pointer
// positions are never queued, each tick samples only the latest one.

use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::color::Rgb;

/// An owned palette bitmap.
#[derive(Debug, Clone)]
pub struct PaletteImage {
    width: u32,
    height: u32,
    pixels: Vec<Rgb>,
}

impl PaletteImage {
    /// Create a palette from row-major pixel data.
    ///
    /// # Panics
    /// Panics if `pixels.len() != width * height`.
    pub fn new(width: u32, height: u32, pixels: Vec<Rgb>) -> Self {
        assert_eq!(
            pixels.len(),
            (width as usize) * (height as usize),
            "pixel buffer does not match dimensions"
        );
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn pixel(&self, x: u32, y: u32) -> Rgb {
        self.pixels[(y as usize) * (self.width as usize) + (x as usize)]
    }
}

/// The palette's current display transform: pixel space scaled and
/// translated into screen space.
#[derive(Debug, Clone, Copy)]
pub struct DisplayTransform {
    pub scale_x: f32,
    pub scale_y: f32,
    pub translate_x: f32,
    pub translate_y: f32,
}

impl Default for DisplayTransform {
    fn default() -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
        }
    }
}

impl DisplayTransform {
    /// Map a screen position back into pixel space (inverse transform).
    fn to_pixel_space(self, position: (f32, f32)) -> (f32, f32) {
        (
            (position.0 - self.translate_x) / self.scale_x,
            (position.1 - self.translate_y) / self.scale_y,
        )
    }
}

/// Samples colors from a palette under a minimum-interval throttle.
#[derive(Debug)]
pub struct ColorSampler {
    palette: PaletteImage,
    transform: DisplayTransform,
    min_interval: Duration,
    last_emit: Option<Instant>,
    previous: Rgb,
}

impl ColorSampler {
    pub fn new(palette: PaletteImage, min_interval: Duration) -> Self {
        Self {
            palette,
            transform: DisplayTransform::default(),
            min_interval,
            last_emit: None,
            previous: Rgb::WHITE,
        }
    }

    /// Update the palette's display transform (e.g. after a layout pass).
    pub fn set_transform(&mut self, transform: DisplayTransform) {
        self.transform = transform;
    }

    /// Sample the color under `position`.
    ///
    /// Returns `Some(color)` when the color changed and the minimum
    /// interval has elapsed since the last emission; `None` otherwise.
    /// Positions outside the palette sample the neutral default (white).
    pub fn extract(&mut self, position: (f32, f32)) -> Option<Rgb> {
        let now = Instant::now();

        if let Some(last) = self.last_emit {
            if now.duration_since(last) < self.min_interval {
                return None;
            }
        }

        let color = self.color_at(position);
        if color == self.previous {
            return None;
        }

        trace!(?color, "color sampled");
        self.previous = color;
        self.last_emit = Some(now);
        Some(color)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn color_at(&self, position: (f32, f32)) -> Rgb {
        let (px, py) = self.transform.to_pixel_space(position);

        if px > 0.0
            && py > 0.0
            && (px as u32) < self.palette.width()
            && (py as u32) < self.palette.height()
        {
            self.palette.pixel(px as u32, py as u32)
        } else {
            Rgb::WHITE
        }
    }
}
