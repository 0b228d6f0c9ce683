//! Rendering of normalized detections onto images.
//!
//! Every detection becomes a hollow rectangle plus a `label: score` caption
//! anchored at the box's first corner. Drawing always happens on a copy, so
//! the caller's image is never touched.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::Context;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::{debug, info};

use crate::models::{AnnotatedDetection, Rectangle};

pub const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

pub const DEFAULT_THICKNESS: u32 = 2;

pub const DEFAULT_FONT_SCALE: f32 = 12.0;

const CAPTION_MARGIN: i64 = 1 << 16;

const SYSTEM_FONT_PATHS: [&str; 5] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// How boxes and captions look.
pub struct AnnotationStyle {
    pub color: Rgb<u8>,
    /// Outline width in pixels, growing inward from the box edge
    pub thickness: u32,
    /// Captions are skipped when no font is available
    pub font: Option<FontVec>,
    pub font_scale: f32,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            color: BOX_COLOR,
            thickness: DEFAULT_THICKNESS,
            font: None,
            font_scale: DEFAULT_FONT_SCALE,
        }
    }
}

impl AnnotationStyle {
    pub fn with_font_path(mut self, font_path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read(font_path)
            .with_context(|| format!("Failed to read font {}", font_path.display()))?;
        let font = FontVec::try_from_vec(data)
            .map_err(|_| anyhow::anyhow!("Failed to parse font file: {}", font_path.display()))?;
        self.font = Some(font);
        Ok(self)
    }

    /// Try a few well-known system font locations
    pub fn with_system_font(mut self) -> Self {
        for path in SYSTEM_FONT_PATHS {
            if let Ok(data) = std::fs::read(path)
                && let Ok(font) = FontVec::try_from_vec(data)
            {
                info!("Loaded system font: {}", path);
                self.font = Some(font);
                return self;
            }
        }
        debug!("No system font found, captions will be skipped");
        self
    }

    pub fn with_thickness(mut self, thickness: u32) -> Self {
        self.thickness = thickness;
        self
    }

    pub fn with_font_scale(mut self, font_scale: f32) -> Self {
        self.font_scale = font_scale;
        self
    }
}

/// Draws detections onto copies of images.
#[derive(Default)]
pub struct Annotator {
    style: AnnotationStyle,
}

impl Annotator {
    pub fn new(style: AnnotationStyle) -> Self {
        Self { style }
    }

    /// Return an annotated copy of `image`, drawing detections in order
    pub fn annotate(&self, image: &RgbImage, detections: &[AnnotatedDetection]) -> RgbImage {
        let mut canvas = image.clone();
        for detection in detections {
            self.draw_box(&mut canvas, &detection.rect);
            self.draw_caption(&mut canvas, detection);
        }
        canvas
    }

    fn draw_box(&self, canvas: &mut RgbImage, rect: &Rectangle) {
        let ((x0, y0), (x1, y1)) = rect.ordered();

        // Coordinates far off-canvas are pulled in just past the edge so the
        // visible result is unchanged and line drawing stays bounded.
        let margin = self.style.thickness as i64 + 1;
        let x0 = clamp_axis(x0, canvas.width(), margin);
        let x1 = clamp_axis(x1, canvas.width(), margin);
        let y0 = clamp_axis(y0, canvas.height(), margin);
        let y1 = clamp_axis(y1, canvas.height(), margin);

        for inset in 0..self.style.thickness as i32 {
            let width = x1 - x0 + 1 - 2 * inset;
            let height = y1 - y0 + 1 - 2 * inset;
            if width <= 0 || height <= 0 {
                break;
            }
            let outline = Rect::at(x0 + inset, y0 + inset).of_size(width as u32, height as u32);
            draw_hollow_rect_mut(canvas, outline, self.style.color);
        }
    }

    fn draw_caption(&self, canvas: &mut RgbImage, detection: &AnnotatedDetection) {
        let Some(font) = &self.style.font else {
            return;
        };
        // Glyphs are clipped by `draw_text_mut`; the wide bound only keeps its
        // i32 glyph arithmetic from overflowing.
        let x = clamp_axis(detection.rect.xmin, canvas.width(), CAPTION_MARGIN);
        let y = clamp_axis(detection.rect.ymin, canvas.height(), CAPTION_MARGIN);
        draw_text_mut(
            canvas,
            self.style.color,
            x,
            y,
            PxScale::from(self.style.font_scale),
            font,
            &detection.caption(),
        );
    }
}

fn clamp_axis(value: i64, extent: u32, margin: i64) -> i32 {
    value.clamp(-margin, extent as i64 + margin) as i32
}
