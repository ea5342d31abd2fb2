//! Draws detections onto a copy of the input image.

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::common::Detection;

const FONT_SIZE: f32 = 16.0;
const CAPTION_PADDING: i32 = 2;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Fonts tried, in order, when no font file is configured.
const SYSTEM_FONTS: [&str; 6] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Clone)]
pub struct Annotator {
    font: Option<FontArc>,
    scale: PxScale,
}

impl std::fmt::Debug for Annotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Annotator")
            .field("font", &self.font.is_some())
            .field("scale", &self.scale.y)
            .finish()
    }
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new()
    }
}

impl Annotator {
    /// Uses the first readable system font. Captions fall back to plain bars
    /// when none is found.
    pub fn new() -> Self {
        let font = SYSTEM_FONTS
            .iter()
            .find_map(|p| load_font(Path::new(p)).ok());
        if font.is_none() {
            log::warn!("No caption font found; captions are drawn without text");
        }
        Self {
            font,
            scale: PxScale::from(FONT_SIZE),
        }
    }

    /// Annotator that never draws caption text.
    pub fn without_font() -> Self {
        Self {
            font: None,
            scale: PxScale::from(FONT_SIZE),
        }
    }

    pub fn with_font_file(mut self, path: &Path) -> anyhow::Result<Self> {
        self.font = Some(load_font(path)?);
        Ok(self)
    }

    pub fn with_font_size(mut self, size: f32) -> Self {
        self.scale = PxScale::from(size);
        self
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Returns a copy of `image` with every detection drawn on it.
    ///
    /// Each box is a 2 pixel outline whose outer corners are the rounded box
    /// corners, with a `"{label} {confidence:.2}"` caption bar above it. The
    /// input is left untouched.
    pub fn render(&self, image: &RgbImage, detections: &[Detection]) -> RgbImage {
        let mut canvas = image.clone();
        for detection in detections {
            self.draw_detection(&mut canvas, detection);
        }
        canvas
    }

    fn draw_detection(&self, image: &mut RgbImage, detection: &Detection) {
        let color = class_color(detection.class_id);
        let (x1, y1, x2, y2) = detection.bbox.as_x1y1_x2y2_i32();
        // two pixels past each edge keeps both outline rings off-canvas
        let (max_x, max_y) = (image.width() as i32 + 1, image.height() as i32 + 1);
        let (x1, x2) = (x1.clamp(-2, max_x), x2.clamp(-2, max_x));
        let (y1, y2) = (y1.clamp(-2, max_y), y2.clamp(-2, max_y));
        let width = x2.saturating_sub(x1).max(0) as u32 + 1;
        let height = y2.saturating_sub(y1).max(0) as u32 + 1;

        draw_hollow_rect_mut(image, Rect::at(x1, y1).of_size(width, height), color);
        if width > 2 && height > 2 {
            draw_hollow_rect_mut(image, Rect::at(x1 + 1, y1 + 1).of_size(width - 2, height - 2), color);
        }

        self.draw_caption(image, &detection.caption(), x1, y1, color);
    }

    fn draw_caption(&self, image: &mut RgbImage, caption: &str, x1: i32, y1: i32, color: Rgb<u8>) {
        let (text_w, text_h) = match &self.font {
            Some(font) => text_size(self.scale, font, caption),
            None => (
                (caption.chars().count() as f32 * self.scale.x * 0.6) as u32,
                self.scale.y as u32,
            ),
        };
        let bar_w = text_w + 2 * CAPTION_PADDING as u32;
        let bar_h = text_h + 2 * CAPTION_PADDING as u32;

        // above the box, or just inside it when there is no room
        let bar_y = if y1 >= bar_h as i32 { y1 - bar_h as i32 } else { y1.max(0) };
        let bar_x = x1.max(0);

        draw_filled_rect_mut(image, Rect::at(bar_x, bar_y).of_size(bar_w.max(1), bar_h.max(1)), color);
        if let Some(font) = &self.font {
            draw_text_mut(
                image,
                TEXT_COLOR,
                bar_x + CAPTION_PADDING,
                bar_y + CAPTION_PADDING,
                self.scale,
                font,
                caption,
            );
        }
    }
}

fn load_font(path: &Path) -> anyhow::Result<FontArc> {
    let bytes = std::fs::read(path)?;
    let font = FontArc::try_from_vec(bytes)
        .map_err(|e| anyhow::anyhow!("invalid font {}: {e}", path.display()))?;
    log::debug!("Caption font: {}", path.display());
    Ok(font)
}

/// Stable colour for a class index, spread around the hue circle.
pub fn class_color(class_id: usize) -> Rgb<u8> {
    let hue = (class_id as f32 * 0.618_034).fract() * 360.0;
    hsv_to_rgb(hue, 0.8, 0.9)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    Rgb([
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::DetectionBox;

    fn detection(class_id: usize, bbox: DetectionBox) -> Detection {
        Detection {
            label: "table".to_string(),
            class_id,
            confidence: 0.81,
            bbox,
        }
    }

    #[test]
    fn no_detections_is_pixel_identical() {
        let image = RgbImage::from_fn(40, 30, |x, y| Rgb([x as u8, y as u8, 7]));
        let out = Annotator::new().render(&image, &[]);
        assert_eq!(out, image);
    }

    #[test]
    fn outline_corners_match_rounded_box() {
        let image = RgbImage::new(100, 100);
        let det = detection(9, DetectionBox::new(10.4, 40.6, 50.5, 80.2));
        let out = Annotator::without_font().render(&image, &[det]);
        let color = class_color(9);

        // round(10.4)=10, round(40.6)=41, round(50.5)=51, round(80.2)=80
        assert_eq!(*out.get_pixel(10, 41), color);
        assert_eq!(*out.get_pixel(51, 80), color);
        assert_eq!(*out.get_pixel(11, 42), color);
        assert_eq!(*out.get_pixel(50, 79), color);
        // outside and inside the 2 pixel outline stay untouched
        assert_eq!(*out.get_pixel(52, 80), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(51, 81), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(30, 60), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(12, 60), Rgb([0, 0, 0]));
        // caption bar sits above the box
        assert_eq!(*out.get_pixel(11, 39), color);
        // input is untouched
        assert_eq!(image, RgbImage::new(100, 100));
    }

    #[test]
    fn boxes_touching_the_border_are_clipped() {
        let image = RgbImage::new(20, 20);
        let det = detection(1, DetectionBox::new(0., 0., 20., 20.));
        let out = Annotator::without_font().render(&image, &[det]);
        assert_eq!(out.dimensions(), (20, 20));
        assert_eq!(*out.get_pixel(0, 19), class_color(1));
    }

    #[test]
    fn huge_boxes_draw_only_their_visible_edges() {
        let image = RgbImage::new(60, 60);
        let color = class_color(2);

        let everywhere = detection(2, DetectionBox::new(-1e20, -1e20, 1e20, 1e20));
        let out = Annotator::without_font().render(&image, &[everywhere]);
        assert_eq!(out.dimensions(), (60, 60));
        assert_eq!(*out.get_pixel(30, 59), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(59, 30), Rgb([0, 0, 0]));

        let wide = detection(2, DetectionBox::new(5., 30., 1e20, 50.));
        let out = Annotator::without_font().render(&image, &[wide]);
        assert_eq!(*out.get_pixel(5, 40), color);
        assert_eq!(*out.get_pixel(6, 40), color);
        assert_eq!(*out.get_pixel(7, 40), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(59, 40), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(30, 50), color);
        assert_eq!(*out.get_pixel(30, 49), color);
    }

    #[test]
    fn colours_differ_between_neighbouring_classes() {
        assert_ne!(class_color(0), class_color(1));
        assert_eq!(class_color(12), class_color(12));
    }
}
