//! Rectangle primitives clipped to the image bounds.
//!
//! Coordinates are inclusive on both ends and may lie partly or entirely
//! outside the image; only the visible part is painted.

use image::{Rgb, RgbImage};

pub(crate) fn fill_rect(
    image: &mut RgbImage,
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    color: Rgb<u8>,
) {
    let width = image.width() as i32;
    let height = image.height() as i32;
    let left = left.max(0);
    let top = top.max(0);
    let right = right.min(width - 1);
    let bottom = bottom.min(height - 1);
    if left > right || top > bottom {
        return;
    }

    for y in top..=bottom {
        for x in left..=right {
            image.put_pixel(x as u32, y as u32, color);
        }
    }
}

/// Outline `left..=right` × `top..=bottom` with bands `thickness` pixels wide.
///
/// Bands wider than the rectangle fill it.
pub(crate) fn draw_rectangle(
    image: &mut RgbImage,
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    thickness: u32,
    color: Rgb<u8>,
) {
    if left > right || top > bottom {
        return;
    }
    let span = (i64::from(right) - i64::from(left) + 1).max(i64::from(bottom) - i64::from(top) + 1);
    let t = i64::from(thickness).clamp(1, span) as i32;
    fill_rect(image, left, top, right, (top + t - 1).min(bottom), color);
    fill_rect(image, left, (bottom - t + 1).max(top), right, bottom, color);
    fill_rect(image, left, top, (left + t - 1).min(right), bottom, color);
    fill_rect(image, (right - t + 1).max(left), top, right, bottom, color);
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);

    #[test]
    fn fill_outside_image_is_a_no_op() {
        let mut image = RgbImage::new(8, 8);
        fill_rect(&mut image, -10, -10, -1, -1, RED);
        fill_rect(&mut image, 8, 8, 20, 20, RED);
        assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn fill_is_clipped() {
        let mut image = RgbImage::new(8, 8);
        fill_rect(&mut image, -3, 6, 2, 12, RED);
        let painted = image.pixels().filter(|p| **p == RED).count();
        assert_eq!(painted, 3 * 2);
    }

    #[test]
    fn outline_leaves_interior_untouched() {
        let mut image = RgbImage::new(20, 20);
        draw_rectangle(&mut image, 2, 2, 17, 17, 2, RED);
        assert_eq!(*image.get_pixel(2, 2), RED);
        assert_eq!(*image.get_pixel(3, 10), RED);
        assert_eq!(*image.get_pixel(17, 17), RED);
        assert_eq!(*image.get_pixel(4, 4), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(1, 1), Rgb([0, 0, 0]));
    }

    #[test]
    fn oversized_thickness_fills_the_rectangle() {
        let mut image = RgbImage::new(20, 20);
        draw_rectangle(&mut image, 2, 2, 17, 17, u32::MAX, RED);
        assert_eq!(*image.get_pixel(10, 10), RED);
        assert_eq!(*image.get_pixel(1, 1), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(18, 18), Rgb([0, 0, 0]));
    }
}
