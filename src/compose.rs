//! Per-frame and still-image compositing.
//!
//! Frames are processed strictly sequentially so one base canvas allocation
//! is reused across the whole batch. Media placement (crop/scale/grid) is
//! done here with the `image` crate; the static text overlay (author, body,
//! date) is applied once at mux time through a drawtext filter chain built
//! by [`drawtext_filter`].

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{PostframeError, Result};
use crate::layout::{MediaPlacement, PostLayout, FOOTER_HEIGHT, LINE_HEIGHT};
use crate::post::Post;

/// Dark-theme canvas background.
const BACKGROUND: Rgba<u8> = Rgba([21, 32, 43, 255]);

/// Reusable drawing surface for one pipeline run.
pub struct FrameCompositor {
    base: RgbaImage,
    placement: MediaPlacement,
}

impl FrameCompositor {
    /// Build the base canvas: background fill plus the avatar, which stays
    /// identical across every frame.
    pub fn new(layout: &PostLayout, avatar: &DynamicImage) -> Result<Self> {
        let placement = layout
            .placements
            .first()
            .cloned()
            .ok_or_else(|| PostframeError::Pipeline("layout has no media placement".to_string()))?;

        let mut base = RgbaImage::from_pixel(layout.canvas_width, layout.canvas_height, BACKGROUND);
        draw_avatar(&mut base, avatar, layout);

        Ok(Self { base, placement })
    }

    /// Composite one extracted frame and overwrite it at `output`.
    pub fn compose_frame<P: AsRef<Path>, Q: AsRef<Path>>(&self, frame: P, output: Q) -> Result<()> {
        let frame_path = frame.as_ref();
        debug!("Compositing frame {}", frame_path.display());

        let frame_image = image::open(frame_path)?;
        let mut canvas = self.base.clone();
        place_media(&mut canvas, &frame_image, &self.placement);

        canvas.save(output.as_ref())?;
        Ok(())
    }

    /// Composite a batch of frames sequentially into `canvassed` paths.
    pub fn compose_all(&self, frames: &[(std::path::PathBuf, std::path::PathBuf)]) -> Result<()> {
        info!("Compositing {} frames", frames.len());
        for (input, output) in frames {
            self.compose_frame(input, output)?;
        }
        Ok(())
    }
}

/// Render the still-image variant of a post: 1-4 photos on one canvas.
pub fn compose_still(
    layout: &PostLayout,
    avatar: &DynamicImage,
    images: &[DynamicImage],
) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(layout.canvas_width, layout.canvas_height, BACKGROUND);
    draw_avatar(&mut canvas, avatar, layout);

    for (image, placement) in images.iter().zip(&layout.placements) {
        place_media(&mut canvas, image, placement);
    }

    canvas
}

/// Crop (if the placement asks for it), scale to the destination rectangle,
/// and overlay onto the canvas.
fn place_media(canvas: &mut RgbaImage, source: &DynamicImage, placement: &MediaPlacement) {
    let cropped = match placement.source_crop {
        Some(crop) => source.crop_imm(crop.x, crop.y, crop.width, crop.height),
        None => source.clone(),
    };

    let scaled = cropped.resize_exact(
        placement.dest.width,
        placement.dest.height,
        FilterType::Triangle,
    );

    imageops::overlay(
        canvas,
        &scaled.to_rgba8(),
        placement.dest.x as i64,
        placement.dest.y as i64,
    );
}

/// Scale the avatar into its header slot and apply a circular mask.
fn draw_avatar(canvas: &mut RgbaImage, avatar: &DynamicImage, layout: &PostLayout) {
    let slot = layout.avatar;
    let mut scaled = avatar
        .resize_exact(slot.width, slot.height, FilterType::Triangle)
        .to_rgba8();

    let radius = slot.width as f32 / 2.0;
    let center = radius - 0.5;
    for (x, y, pixel) in scaled.enumerate_pixels_mut() {
        let dx = x as f32 - center;
        let dy = y as f32 - center;
        if dx * dx + dy * dy > radius * radius {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    imageops::overlay(canvas, &scaled, slot.x as i64, slot.y as i64);
}

/// Build the drawtext filter chain for the final mux: author line, wrapped
/// body text, and the display date at the footer.
pub fn drawtext_filter(post: &Post, layout: &PostLayout) -> String {
    let mut filters = Vec::new();

    let author_x = layout.avatar.x + layout.avatar.width + 20;
    let author_y = layout.avatar.y + 8;
    filters.push(drawtext(
        &post.author,
        author_x,
        author_y,
        28,
        "white",
    ));
    filters.push(drawtext(
        &format!("@{}", post.handle),
        author_x,
        author_y + 36,
        22,
        "0x8899A6",
    ));

    let (text_x, text_y) = layout.text_origin;
    for (index, line) in layout.lines.iter().enumerate() {
        filters.push(drawtext(
            line,
            text_x,
            text_y + index as u32 * LINE_HEIGHT,
            26,
            "white",
        ));
    }

    let (date_x, date_y) = layout.date_origin;
    filters.push(drawtext(
        &post.display_date(),
        date_x,
        date_y + FOOTER_HEIGHT / 4,
        20,
        "0x8899A6",
    ));

    filters.join(",")
}

fn drawtext(text: &str, x: u32, y: u32, size: u32, color: &str) -> String {
    format!(
        "drawtext=font=Sans:text='{}':x={}:y={}:fontsize={}:fontcolor={}",
        escape_drawtext(text),
        x,
        y,
        size,
        color
    )
}

/// Escape the characters drawtext treats specially inside a filter graph.
fn escape_drawtext(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\\\\\'"),
            ':' => escaped.push_str("\\:"),
            ',' => escaped.push_str("\\,"),
            '%' => escaped.push_str("\\%"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
