use image::RgbImage;
use tracing::debug;

use crate::{
    draw::{draw_rectangle, fill_rect},
    error::AnnotateError,
    style::{AnnotationStyle, DEFAULT_FONT_SIZE_PX},
    types::{BoundingBox, CoordinateMode, Detection, PixelRect},
};

/// Draw every detection onto a copy of `image`.
///
/// Detections are drawn in order, so later labels paint over earlier ones.
/// Boxes that are inverted, empty after clamping, or carry non-finite
/// coordinates are skipped; they never fail the call. The caller's image is
/// left untouched.
pub fn annotate(
    image: &RgbImage,
    detections: &[Detection],
    style: &AnnotationStyle,
) -> Result<RgbImage, AnnotateError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(AnnotateError::InvalidImage { width, height });
    }

    let font_size = effective_font_size(style.font_size_px, width, height);
    let padding = style.label_padding_px.min(width.max(height));
    let mut canvas = image.clone();
    for (idx, detection) in detections.iter().enumerate() {
        let Some(rect) = resolve_box(&detection.bbox, style.coordinate_mode, width, height) else {
            debug!(
                "skipping detection #{idx} ({}): degenerate box {:?}",
                detection.label, detection.bbox
            );
            continue;
        };

        draw_rectangle(
            &mut canvas,
            rect.left,
            rect.top,
            rect.right.min(width as i32 - 1),
            rect.bottom.min(height as i32 - 1),
            style.box_thickness_px,
            style.box_color,
        );

        let caption = detection.caption();
        let text_size = style.font.measure(&caption, font_size);
        let placement = label_placement(&rect, text_size, padding);
        fill_rect(
            &mut canvas,
            placement.background.left,
            placement.background.top,
            placement.background.right - 1,
            placement.background.bottom - 1,
            style.label_background(),
        );
        style.font.draw(
            &mut canvas,
            placement.text_x,
            placement.text_y,
            &caption,
            font_size,
            style.label_text_color,
        );
    }

    Ok(canvas)
}

/// Map a box to clamped pixel space, or `None` when nothing would be drawn.
pub fn resolve_box(
    bbox: &BoundingBox,
    mode: CoordinateMode,
    width: u32,
    height: u32,
) -> Option<PixelRect> {
    let (w, h) = (width as f64, height as f64);
    let (sx, sy) = match mode {
        CoordinateMode::Normalized => (w, h),
        CoordinateMode::Absolute => (1.0, 1.0),
    };
    let x1 = bbox.x1 as f64 * sx;
    let y1 = bbox.y1 as f64 * sy;
    let x2 = bbox.x2 as f64 * sx;
    let y2 = bbox.y2 as f64 * sy;
    if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
        return None;
    }

    let rect = PixelRect {
        left: x1.round().clamp(0.0, w) as i32,
        top: y1.round().clamp(0.0, h) as i32,
        right: x2.round().clamp(0.0, w) as i32,
        bottom: y2.round().clamp(0.0, h) as i32,
    };
    if rect.right <= rect.left || rect.bottom <= rect.top {
        return None;
    }
    Some(rect)
}

/// Where a label goes relative to its box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LabelPlacement {
    /// Filled background; `right`/`bottom` are exclusive.
    pub background: PixelRect,
    pub text_x: i32,
    pub text_y: i32,
    /// True when the label sits inside the box because there was no room
    /// above it.
    pub inside: bool,
}

/// Place a label of `text_size` directly above `rect`, or just below its top
/// edge when the background would cross `y = 0`.
pub fn label_placement(rect: &PixelRect, text_size: (u32, u32), padding: u32) -> LabelPlacement {
    let pad = i64::from(padding);
    let left = i64::from(rect.left);
    let bg_width = i64::from(text_size.0) + 2 * pad;
    let bg_height = i64::from(text_size.1) + 2 * pad;

    let above = i64::from(rect.top) - bg_height;
    let (top, inside) = if above < 0 {
        (i64::from(rect.top), true)
    } else {
        (above, false)
    };

    LabelPlacement {
        background: PixelRect {
            left: rect.left,
            top: saturate(top),
            right: saturate(left + bg_width),
            bottom: saturate(top + bg_height),
        },
        text_x: saturate(left + pad),
        text_y: saturate(top + pad),
        inside,
    }
}

fn saturate(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Font size actually used for labels; never larger than the image.
fn effective_font_size(size_px: f32, width: u32, height: u32) -> f32 {
    let limit = width.max(height) as f32;
    if size_px.is_nan() {
        DEFAULT_FONT_SIZE_PX.min(limit)
    } else {
        size_px.clamp(1.0, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_box_scales_and_rounds() {
        let rect = resolve_box(
            &BoundingBox::new(0.1, 0.1, 0.5, 0.5),
            CoordinateMode::Normalized,
            100,
            100,
        )
        .unwrap();
        assert_eq!(
            rect,
            PixelRect {
                left: 10,
                top: 10,
                right: 50,
                bottom: 50
            }
        );
    }

    #[test]
    fn absolute_box_is_clamped_to_image() {
        let rect = resolve_box(
            &BoundingBox::new(-20.0, 5.4, 140.0, 99.6),
            CoordinateMode::Absolute,
            100,
            80,
        )
        .unwrap();
        assert_eq!(
            rect,
            PixelRect {
                left: 0,
                top: 5,
                right: 100,
                bottom: 80
            }
        );
    }

    #[test]
    fn inverted_and_collapsed_boxes_resolve_to_none() {
        let mode = CoordinateMode::Normalized;
        assert!(resolve_box(&BoundingBox::new(0.6, 0.1, 0.4, 0.5), mode, 100, 100).is_none());
        assert!(resolve_box(&BoundingBox::new(0.1, 0.5, 0.4, 0.2), mode, 100, 100).is_none());
        assert!(resolve_box(&BoundingBox::new(1.2, 0.1, 1.5, 0.5), mode, 100, 100).is_none());
        assert!(resolve_box(&BoundingBox::new(0.2, 0.2, 0.204, 0.5), mode, 100, 100).is_none());
    }

    #[test]
    fn non_finite_coordinates_resolve_to_none() {
        let mode = CoordinateMode::Absolute;
        assert!(resolve_box(&BoundingBox::new(f32::NAN, 0.0, 5.0, 5.0), mode, 10, 10).is_none());
        assert!(
            resolve_box(&BoundingBox::new(0.0, 0.0, f32::INFINITY, 5.0), mode, 10, 10).is_none()
        );
    }

    #[test]
    fn label_goes_above_when_there_is_room() {
        let rect = PixelRect {
            left: 10,
            top: 40,
            right: 60,
            bottom: 90,
        };
        let placement = label_placement(&rect, (30, 14), 2);
        assert!(!placement.inside);
        assert_eq!(placement.background.bottom, 40);
        assert_eq!(placement.background.top, 22);
        assert_eq!(placement.background.left, 10);
        assert_eq!(placement.background.right, 44);
        assert_eq!((placement.text_x, placement.text_y), (12, 24));
    }

    #[test]
    fn huge_padding_saturates_instead_of_overflowing() {
        let rect = PixelRect {
            left: 10,
            top: 40,
            right: 60,
            bottom: 90,
        };
        let placement = label_placement(&rect, (u32::MAX, u32::MAX), u32::MAX);
        assert!(placement.inside);
        assert_eq!(placement.background.top, 40);
        assert_eq!(placement.background.right, i32::MAX);
        assert_eq!(placement.background.bottom, i32::MAX);
        assert_eq!(placement.text_x, i32::MAX);
    }

    #[test]
    fn font_size_is_bounded_by_the_image() {
        assert_eq!(effective_font_size(1e9, 100, 60), 100.0);
        assert_eq!(effective_font_size(f32::INFINITY, 40, 80), 80.0);
        assert_eq!(effective_font_size(f32::NAN, 100, 100), DEFAULT_FONT_SIZE_PX);
        assert_eq!(effective_font_size(0.0, 100, 100), 1.0);
        assert_eq!(effective_font_size(18.0, 100, 100), 18.0);
    }

    #[test]
    fn label_moves_inside_near_the_top_edge() {
        let rect = PixelRect {
            left: 0,
            top: 5,
            right: 30,
            bottom: 20,
        };
        let placement = label_placement(&rect, (30, 14), 2);
        assert!(placement.inside);
        assert_eq!(placement.background.top, 5);
        assert_eq!(placement.background.bottom, 23);
    }

    #[test]
    fn zero_area_image_is_rejected() {
        let image = RgbImage::new(0, 10);
        let err = annotate(&image, &[], &AnnotationStyle::default()).unwrap_err();
        assert_eq!(
            err,
            AnnotateError::InvalidImage {
                width: 0,
                height: 10
            }
        );
    }
}
