use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, Rgba};
use ratatui::{
    style::{Color, Style},
    text::{Line, Span},
};
use std::path::Path;

use crate::error::{CaptureError, Result};
use crate::session::Phase;

/// Largest edge kept after decoding; terminal cells never need more
const MAX_EDGE_PX: u32 = 256;
const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// A decoded class image with its desaturated rest variant
#[derive(Debug, Clone)]
pub struct PromptImage {
    colour: DynamicImage,
    rest: DynamicImage,
}

impl PromptImage {
    pub fn load(path: &Path) -> Result<Self> {
        let decoded = decode(path).map_err(|source| CaptureError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        let colour = if decoded.width() > MAX_EDGE_PX || decoded.height() > MAX_EDGE_PX {
            decoded.thumbnail(MAX_EDGE_PX, MAX_EDGE_PX)
        } else {
            decoded
        };
        let rest = colour.grayscale();
        Ok(Self { colour, rest })
    }

    pub fn for_phase(&self, phase: Phase) -> &DynamicImage {
        match phase {
            Phase::Rest => &self.rest,
            Phase::Active => &self.colour,
        }
    }

    pub fn halfblock_lines(
        &self,
        phase: Phase,
        max_width: u16,
        max_height: u16,
    ) -> Vec<Line<'static>> {
        halfblock_lines(self.for_phase(phase), max_width, max_height)
    }
}

fn decode(path: &Path) -> image::ImageResult<DynamicImage> {
    ImageReader::open(path)?.with_guessed_format()?.decode()
}

/// Renders two pixel rows per cell with `▀`, fitted into `max_width × max_height` cells
pub fn halfblock_lines(image: &DynamicImage, max_width: u16, max_height: u16) -> Vec<Line<'static>> {
    if max_width == 0 || max_height == 0 || image.width() == 0 || image.height() == 0 {
        return Vec::new();
    }

    let (pw, ph) = (image.width() as f64, image.height() as f64);
    let scale = (max_width as f64 / pw).min(max_height as f64 * 2.0 / ph);
    let render_w = ((pw * scale).round() as u32).clamp(1, max_width as u32);
    let render_h = ((ph * scale).round() as u32).clamp(1, max_height as u32 * 2);

    let resized =
        image::imageops::resize(&image.to_rgba8(), render_w, render_h, FilterType::Triangle);

    (0..render_h)
        .step_by(2)
        .map(|y| {
            let spans: Vec<Span> = (0..render_w)
                .map(|x| {
                    let top = resized.get_pixel(x, y);
                    let bottom = if y + 1 < render_h {
                        *resized.get_pixel(x, y + 1)
                    } else {
                        BACKGROUND
                    };
                    Span::styled(
                        "▀",
                        Style::default()
                            .fg(Color::Rgb(top[0], top[1], top[2]))
                            .bg(Color::Rgb(bottom[0], bottom[1], bottom[2])),
                    )
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}
