use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::error::VisualizationError;
use crate::pipeline::traits::{ArtifactRenderer, RenderRequest};

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Viridis anchors, low to high.
const COLORMAP: [[f32; 3]; 5] = [
    [68.0, 1.0, 84.0],
    [59.0, 82.0, 139.0],
    [33.0, 145.0, 140.0],
    [94.0, 201.0, 98.0],
    [253.0, 231.0, 37.0],
];

/// PNG text keyword holding the artifact name.
pub const TITLE_KEY: &str = "Title";
/// PNG text keyword holding the reference caption.
pub const REFERENCE_KEY: &str = "Reference";
/// PNG text keyword holding the row labels as a JSON array, top row first.
pub const LABELS_KEY: &str = "Labels";

/// Draws the attention matrix (one band per decoded symbol) above the input
/// spectrogram, both sharing the frame axis. Row labels and the reference
/// travel inside the PNG as text chunks.
#[derive(Debug, Clone)]
pub struct HeatmapRenderer {
    pub frame_width_px: u32,
    pub symbol_height_px: u32,
    pub channel_height_px: u32,
    pub panel_gap_px: u32,
}

impl Default for HeatmapRenderer {
    fn default() -> Self {
        Self {
            frame_width_px: 4,
            symbol_height_px: 16,
            channel_height_px: 4,
            panel_gap_px: 8,
        }
    }
}

impl HeatmapRenderer {
    pub fn draw(&self, attention: &[Vec<f32>], spectrogram: &[Vec<f32>]) -> RgbImage {
        let attention_cols = attention.first().map_or(0, Vec::len);
        let channels = spectrogram.first().map_or(0, Vec::len);
        let frames = attention_cols.max(spectrogram.len());

        let attention_height = attention.len() as u32 * self.symbol_height_px;
        let spectrogram_height = channels as u32 * self.channel_height_px;
        let width = (frames as u32 * self.frame_width_px).max(1);
        let height = (attention_height + self.panel_gap_px + spectrogram_height).max(1);
        let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);

        let attention_max = attention
            .iter()
            .flatten()
            .copied()
            .filter(|v| v.is_finite())
            .fold(0.0f32, f32::max);
        for (row, weights) in attention.iter().enumerate() {
            for (frame, &weight) in weights.iter().enumerate() {
                let level = if attention_max > 0.0 {
                    weight / attention_max
                } else {
                    0.0
                };
                self.fill(
                    &mut canvas,
                    frame as u32 * self.frame_width_px,
                    row as u32 * self.symbol_height_px,
                    self.frame_width_px,
                    self.symbol_height_px,
                    colormap(level),
                );
            }
        }

        let (low, high) = spectrogram
            .iter()
            .flatten()
            .copied()
            .filter(|v| v.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        let range = high - low;
        let top = attention_height + self.panel_gap_px;
        for (frame, values) in spectrogram.iter().enumerate() {
            for (channel, &value) in values.iter().take(channels).enumerate() {
                let level = if range > 0.0 { (value - low) / range } else { 0.0 };
                // Channel 0 at the bottom of the panel.
                let y = top + (channels - 1 - channel) as u32 * self.channel_height_px;
                self.fill(
                    &mut canvas,
                    frame as u32 * self.frame_width_px,
                    y,
                    self.frame_width_px,
                    self.channel_height_px,
                    colormap(level),
                );
            }
        }
        canvas
    }

    fn fill(&self, canvas: &mut RgbImage, x0: u32, y0: u32, w: u32, h: u32, color: Rgb<u8>) {
        if w == 0 || h == 0 {
            return;
        }
        draw_filled_rect_mut(canvas, Rect::at(x0 as i32, y0 as i32).of_size(w, h), color);
    }
}

impl ArtifactRenderer for HeatmapRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> Result<(), VisualizationError> {
        if request.attention.len() != request.labels.len() {
            return Err(VisualizationError::invalid_input(format!(
                "{} attention rows for {} labels",
                request.attention.len(),
                request.labels.len()
            )));
        }
        let canvas = self.draw(request.attention, request.spectrogram);
        let title = request
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let labels = serde_json::to_string(request.labels)
            .map_err(|e| VisualizationError::json("serialize axis labels", e))?;
        write_png(
            request.path,
            &canvas,
            &[
                (TITLE_KEY, title),
                (REFERENCE_KEY, request.reference.to_string()),
                (LABELS_KEY, labels),
            ],
        )
    }
}

/// Encodes `canvas` as PNG with UTF-8 text chunks ahead of the pixel data.
fn write_png(
    path: &Path,
    canvas: &RgbImage,
    text: &[(&str, String)],
) -> Result<(), VisualizationError> {
    let file = File::create(path).map_err(|e| VisualizationError::io("create attention plot", e))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), canvas.width(), canvas.height());
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    for (key, value) in text {
        encoder
            .add_itxt_chunk(key.to_string(), value.clone())
            .map_err(|e| VisualizationError::encode("attach plot text", e))?;
    }
    let mut writer = encoder
        .write_header()
        .map_err(|e| VisualizationError::encode("write plot header", e))?;
    writer
        .write_image_data(canvas.as_raw())
        .map_err(|e| VisualizationError::encode("write plot pixels", e))?;
    writer
        .finish()
        .map_err(|e| VisualizationError::encode("finish attention plot", e))
}

fn colormap(level: f32) -> Rgb<u8> {
    let level = if level.is_finite() {
        level.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let scaled = level * (COLORMAP.len() - 1) as f32;
    let lower = (scaled.floor() as usize).min(COLORMAP.len() - 2);
    let t = scaled - lower as f32;
    let (a, b) = (COLORMAP[lower], COLORMAP[lower + 1]);
    Rgb([
        (a[0] + (b[0] - a[0]) * t).round() as u8,
        (a[1] + (b[1] - a[1]) * t).round() as u8,
        (a[2] + (b[2] - a[2]) * t).round() as u8,
    ])
}
