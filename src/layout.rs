//! Fixed layout rules for composited posts.
//!
//! These are hand-tuned pixel constants, not a general layout algorithm:
//! canvas height follows the wrapped text line count, a single landscape
//! image scales to fit the media width, a single portrait or square image is
//! center-cropped, and 2-4 images fall into fixed half/quadrant grids.

use crate::post::MediaItem;

pub const CANVAS_WIDTH: u32 = 1000;
pub const PADDING: u32 = 40;
pub const HEADER_HEIGHT: u32 = 120;
pub const AVATAR_SIZE: u32 = 80;
pub const LINE_HEIGHT: u32 = 44;
pub const FOOTER_HEIGHT: u32 = 60;
pub const MAX_LINE_CHARS: usize = 52;
pub const GUTTER: u32 = 4;

/// Width available to media between the side paddings.
pub const MEDIA_WIDTH: u32 = CANVAS_WIDTH - 2 * PADDING;
/// Fixed height of the cropped media box for portrait and grid layouts.
pub const MEDIA_BOX_HEIGHT: u32 = 690;
/// Half-width slot used by the 2-4 image grids.
pub const GRID_SLOT_WIDTH: u32 = (MEDIA_WIDTH - GUTTER) / 2;
/// Half-height slot used for the asymmetric third/fourth grid positions.
pub const GRID_SLOT_HEIGHT: u32 = (MEDIA_BOX_HEIGHT - GUTTER) / 2;

/// Empirical vertical offset compensating for media aspect ratio.
pub fn height_shim(width: u32, height: u32) -> u32 {
    if height > width { 30 } else { 16 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Where one media item lands on the canvas, and how it gets there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPlacement {
    /// Crop window in source pixels; `None` means scale the whole image.
    pub source_crop: Option<Rect>,
    /// Destination rectangle on the canvas.
    pub dest: Rect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostLayout {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub avatar: Rect,
    /// Wrapped body text, one entry per rendered line.
    pub lines: Vec<String>,
    /// Baseline origin of the first text line.
    pub text_origin: (u32, u32),
    pub date_origin: (u32, u32),
    pub placements: Vec<MediaPlacement>,
}

/// Compute the full canvas layout for a post body plus its media.
///
/// `media` carries the display dimensions of each attachment; for the video
/// path it holds the single video's frame dimensions.
pub fn layout_post(text: &str, media: &[&MediaItem]) -> PostLayout {
    let lines = wrap_text(text, MAX_LINE_CHARS);
    let text_height = lines.len() as u32 * LINE_HEIGHT;
    let media_origin_y = HEADER_HEIGHT + text_height + PADDING / 2;

    let (placements, media_height) = place_media(media, media_origin_y);

    let shim = media
        .first()
        .map(|m| height_shim(m.width, m.height))
        .unwrap_or(0);
    let canvas_height = media_origin_y + media_height + FOOTER_HEIGHT + shim;

    PostLayout {
        canvas_width: CANVAS_WIDTH,
        canvas_height,
        avatar: Rect {
            x: PADDING,
            y: (HEADER_HEIGHT - AVATAR_SIZE) / 2,
            width: AVATAR_SIZE,
            height: AVATAR_SIZE,
        },
        lines,
        text_origin: (PADDING, HEADER_HEIGHT),
        date_origin: (PADDING, media_origin_y + media_height + shim),
        placements,
    }
}

fn place_media(media: &[&MediaItem], origin_y: u32) -> (Vec<MediaPlacement>, u32) {
    match media {
        [] => (Vec::new(), 0),
        [only] => {
            let placement = place_single(only, origin_y);
            let height = placement.dest.height;
            (vec![placement], height)
        }
        [left, right] => {
            let slots = [
                Rect { x: PADDING, y: origin_y, width: GRID_SLOT_WIDTH, height: MEDIA_BOX_HEIGHT },
                Rect {
                    x: PADDING + GRID_SLOT_WIDTH + GUTTER,
                    y: origin_y,
                    width: GRID_SLOT_WIDTH,
                    height: MEDIA_BOX_HEIGHT,
                },
            ];
            let placements = vec![cover_crop(left, slots[0]), cover_crop(right, slots[1])];
            (placements, MEDIA_BOX_HEIGHT)
        }
        [first, second, third] => {
            // Full-height left slot, third slot shares the right column
            let slots = [
                Rect { x: PADDING, y: origin_y, width: GRID_SLOT_WIDTH, height: MEDIA_BOX_HEIGHT },
                Rect {
                    x: PADDING + GRID_SLOT_WIDTH + GUTTER,
                    y: origin_y,
                    width: GRID_SLOT_WIDTH,
                    height: GRID_SLOT_HEIGHT,
                },
                Rect {
                    x: PADDING + GRID_SLOT_WIDTH + GUTTER,
                    y: origin_y + GRID_SLOT_HEIGHT + GUTTER,
                    width: GRID_SLOT_WIDTH,
                    height: GRID_SLOT_HEIGHT,
                },
            ];
            let placements = vec![
                cover_crop(first, slots[0]),
                cover_crop(second, slots[1]),
                cover_crop(third, slots[2]),
            ];
            (placements, MEDIA_BOX_HEIGHT)
        }
        items => {
            // Four quadrants; extra attachments beyond four are dropped
            let slots = [
                Rect { x: PADDING, y: origin_y, width: GRID_SLOT_WIDTH, height: GRID_SLOT_HEIGHT },
                Rect {
                    x: PADDING + GRID_SLOT_WIDTH + GUTTER,
                    y: origin_y,
                    width: GRID_SLOT_WIDTH,
                    height: GRID_SLOT_HEIGHT,
                },
                Rect {
                    x: PADDING,
                    y: origin_y + GRID_SLOT_HEIGHT + GUTTER,
                    width: GRID_SLOT_WIDTH,
                    height: GRID_SLOT_HEIGHT,
                },
                Rect {
                    x: PADDING + GRID_SLOT_WIDTH + GUTTER,
                    y: origin_y + GRID_SLOT_HEIGHT + GUTTER,
                    width: GRID_SLOT_WIDTH,
                    height: GRID_SLOT_HEIGHT,
                },
            ];
            let placements = items
                .iter()
                .take(4)
                .zip(slots)
                .map(|(item, slot)| cover_crop(item, slot))
                .collect();
            (placements, MEDIA_BOX_HEIGHT)
        }
    }
}

/// Landscape scales to fit the media width; portrait and square center-crop
/// into the fixed media box.
fn place_single(item: &MediaItem, origin_y: u32) -> MediaPlacement {
    if item.width > item.height {
        let scaled_height =
            ((MEDIA_WIDTH as u64 * item.height as u64) / item.width as u64) as u32;
        MediaPlacement {
            source_crop: None,
            dest: Rect {
                x: PADDING,
                y: origin_y,
                width: MEDIA_WIDTH,
                height: scaled_height,
            },
        }
    } else {
        cover_crop(
            item,
            Rect { x: PADDING, y: origin_y, width: MEDIA_WIDTH, height: MEDIA_BOX_HEIGHT },
        )
    }
}

/// Centered crop window in source pixels that covers `dest` without
/// distortion, like CSS `object-fit: cover`.
fn cover_crop(item: &MediaItem, dest: Rect) -> MediaPlacement {
    let src_w = item.width.max(1) as f64;
    let src_h = item.height.max(1) as f64;
    let scale = (dest.width as f64 / src_w).max(dest.height as f64 / src_h);

    let crop_w = (dest.width as f64 / scale).round().min(src_w) as u32;
    let crop_h = (dest.height as f64 / scale).round().min(src_h) as u32;
    // Declared dimensions can be zero on malformed metadata; never underflow
    let crop_x = item.width.saturating_sub(crop_w) / 2;
    let crop_y = item.height.saturating_sub(crop_h) / 2;

    MediaPlacement {
        source_crop: Some(Rect { x: crop_x, y: crop_y, width: crop_w, height: crop_h }),
        dest,
    }
}

/// Greedy word wrap; words longer than the limit get their own line.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
        } else if current.chars().count() + 1 + word.chars().count() <= max_chars {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::{MediaItem, MediaKind};

    fn item(width: u32, height: u32) -> MediaItem {
        MediaItem {
            url: "https://pbs.example.com/img.jpg".to_string(),
            width,
            height,
            kind: MediaKind::Photo,
        }
    }

    #[test]
    fn test_wrap_text_respects_limit() {
        let lines = wrap_text("the quick brown fox jumps over the lazy dog", 15);
        assert_eq!(lines, vec!["the quick brown", "fox jumps over", "the lazy dog"]);
        for line in &lines {
            assert!(line.chars().count() <= 15);
        }
    }

    #[test]
    fn test_wrap_text_empty() {
        assert!(wrap_text("", 20).is_empty());
        assert!(wrap_text("   ", 20).is_empty());
    }

    #[test]
    fn test_single_landscape_scales_to_fit_width() {
        let media = item(1280, 720);
        let layout = layout_post("caption", &[&media]);

        let placement = &layout.placements[0];
        assert!(placement.source_crop.is_none());
        assert_eq!(placement.dest.width, MEDIA_WIDTH);
        assert_eq!(placement.dest.height, 920 * 720 / 1280);
    }

    #[test]
    fn test_single_portrait_center_crops() {
        let media = item(720, 1280);
        let layout = layout_post("caption", &[&media]);

        let placement = &layout.placements[0];
        let crop = placement.source_crop.expect("portrait must crop");
        assert_eq!(placement.dest.width, MEDIA_WIDTH);
        assert_eq!(placement.dest.height, MEDIA_BOX_HEIGHT);
        // Crop window is centered and inside the source
        assert_eq!(crop.width, 720);
        assert!(crop.height < 1280);
        assert_eq!(crop.y, (1280 - crop.height) / 2);
    }

    #[test]
    fn test_square_image_center_crops() {
        let media = item(1000, 1000);
        let layout = layout_post("", &[&media]);
        assert!(layout.placements[0].source_crop.is_some());
    }

    #[test]
    fn test_two_images_split_width_in_half() {
        let a = item(800, 600);
        let b = item(800, 600);
        let layout = layout_post("", &[&a, &b]);

        let [left, right] = &layout.placements[..] else {
            panic!("expected two placements");
        };
        assert_eq!(left.dest.x, PADDING);
        assert_eq!(left.dest.width, GRID_SLOT_WIDTH);
        assert_eq!(right.dest.x, PADDING + GRID_SLOT_WIDTH + GUTTER);
        assert_eq!(left.dest.height, MEDIA_BOX_HEIGHT);
        assert_eq!(right.dest.height, MEDIA_BOX_HEIGHT);
    }

    #[test]
    fn test_three_images_asymmetric_grid() {
        let imgs = [item(800, 600), item(800, 600), item(800, 600)];
        let refs: Vec<&MediaItem> = imgs.iter().collect();
        let layout = layout_post("", &refs);

        assert_eq!(layout.placements[0].dest.height, MEDIA_BOX_HEIGHT);
        assert_eq!(layout.placements[1].dest.height, GRID_SLOT_HEIGHT);
        assert_eq!(layout.placements[2].dest.height, GRID_SLOT_HEIGHT);
        assert_eq!(
            layout.placements[2].dest.y,
            layout.placements[1].dest.y + GRID_SLOT_HEIGHT + GUTTER
        );
    }

    #[test]
    fn test_four_images_quadrants() {
        let imgs = [item(800, 600), item(800, 600), item(800, 600), item(800, 600)];
        let refs: Vec<&MediaItem> = imgs.iter().collect();
        let layout = layout_post("", &refs);

        assert_eq!(layout.placements.len(), 4);
        for placement in &layout.placements {
            assert_eq!(placement.dest.width, GRID_SLOT_WIDTH);
            assert_eq!(placement.dest.height, GRID_SLOT_HEIGHT);
        }
        assert_eq!(layout.placements[0].dest.x, layout.placements[2].dest.x);
        assert_eq!(layout.placements[1].dest.x, layout.placements[3].dest.x);
    }

    #[test]
    fn test_zero_dimension_media_is_tolerated() {
        for media in [item(0, 100), item(100, 0), item(0, 0)] {
            let layout = layout_post("caption", &[&media]);
            assert_eq!(layout.placements.len(), 1);
            if let Some(crop) = layout.placements[0].source_crop {
                // Crop window never escapes the (floor-of-one) source extent
                assert!(crop.x + crop.width <= media.width.max(1));
                assert!(crop.y + crop.height <= media.height.max(1));
            }
        }
    }

    #[test]
    fn test_zero_dimension_media_in_grid_is_tolerated() {
        let degenerate = item(0, 0);
        let normal = item(800, 600);
        let layout = layout_post("", &[&degenerate, &normal]);

        assert_eq!(layout.placements.len(), 2);
        let crop = layout.placements[0].source_crop.expect("grid slots crop");
        assert_eq!(crop.x, 0);
        assert_eq!(crop.y, 0);
    }

    #[test]
    fn test_canvas_height_tracks_line_count() {
        let media = item(1280, 720);
        let short = layout_post("one line", &[&media]);
        let long = layout_post(
            "a much longer description that will certainly wrap onto \
             several rendered lines once the greedy word wrap runs",
            &[&media],
        );
        assert!(long.lines.len() > short.lines.len());
        assert_eq!(
            long.canvas_height - short.canvas_height,
            (long.lines.len() - short.lines.len()) as u32 * LINE_HEIGHT
        );
    }

    #[test]
    fn test_height_shim_by_aspect() {
        assert_eq!(height_shim(1280, 720), 16);
        assert_eq!(height_shim(720, 1280), 30);
        assert_eq!(height_shim(800, 800), 16);
    }
}
