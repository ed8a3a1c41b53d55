//! Label fonts.
//!
//! `LabelFont::Builtin` is a 5×7 bitmap face compiled into the crate and is
//! always available. TrueType faces are optional and loaded from disk by
//! [`LabelFont::resolve`], which degrades to the bitmap face when none of the
//! candidates can be used.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use tracing::{debug, warn};

use crate::error::FontError;

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const GLYPH_ADVANCE: u32 = GLYPH_WIDTH + 1;
/// Largest integer magnification of the bitmap glyphs.
const MAX_BITMAP_SCALE: u32 = 256;

/// Well-known locations tried after the caller's own candidates.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Clone, Default)]
pub enum LabelFont {
    #[default]
    Builtin,
    TrueType(FontArc),
}

impl fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelFont::Builtin => f.write_str("LabelFont::Builtin"),
            LabelFont::TrueType(_) => f.write_str("LabelFont::TrueType(..)"),
        }
    }
}

impl LabelFont {
    /// Load a TrueType/OpenType face from `path`.
    pub fn from_file(path: &Path) -> Result<Self, FontError> {
        let bytes = std::fs::read(path).map_err(|source| FontError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let font = FontArc::try_from_vec(bytes).map_err(|_| FontError::Invalid {
            path: path.to_path_buf(),
        })?;
        Ok(LabelFont::TrueType(font))
    }

    /// Try `preferred` in order, then common system fonts, then fall back to
    /// the built-in bitmap face. Never fails.
    pub fn resolve(preferred: &[PathBuf]) -> Self {
        for path in preferred {
            match Self::from_file(path) {
                Ok(font) => {
                    debug!("label font loaded from {}", path.display());
                    return font;
                }
                Err(err) => warn!("{err}; trying next label font"),
            }
        }

        for candidate in SYSTEM_FONT_CANDIDATES {
            let path = Path::new(candidate);
            if !path.is_file() {
                continue;
            }
            if let Ok(font) = Self::from_file(path) {
                debug!("label font loaded from {}", path.display());
                return font;
            }
        }

        debug!("no TrueType label font available, using built-in bitmap font");
        LabelFont::Builtin
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, LabelFont::Builtin)
    }

    /// Rendered `(width, height)` of `text` at `size_px`.
    pub fn measure(&self, text: &str, size_px: f32) -> (u32, u32) {
        match self {
            LabelFont::Builtin => {
                let scale = bitmap_scale(size_px);
                let glyphs = text.chars().count() as u32;
                if glyphs == 0 {
                    return (0, GLYPH_HEIGHT * scale);
                }
                (
                    glyphs
                        .saturating_mul(GLYPH_ADVANCE)
                        .saturating_sub(1)
                        .saturating_mul(scale),
                    GLYPH_HEIGHT * scale,
                )
            }
            LabelFont::TrueType(font) => text_size(PxScale::from(size_px), font, text),
        }
    }

    /// Draw `text` with its top-left corner at `(x, y)`, clipped to the image.
    pub fn draw(
        &self,
        image: &mut RgbImage,
        x: i32,
        y: i32,
        text: &str,
        size_px: f32,
        color: Rgb<u8>,
    ) {
        match self {
            LabelFont::Builtin => draw_bitmap_text(image, x, y, text, bitmap_scale(size_px), color),
            LabelFont::TrueType(font) => {
                draw_text_mut(image, color, x, y, PxScale::from(size_px), font, text)
            }
        }
    }
}

/// Integer magnification applied to the 7-pixel-tall bitmap glyphs.
fn bitmap_scale(size_px: f32) -> u32 {
    ((size_px / GLYPH_HEIGHT as f32).floor() as u32).clamp(1, MAX_BITMAP_SCALE)
}

fn draw_bitmap_text(
    image: &mut RgbImage,
    x: i32,
    y: i32,
    text: &str,
    scale: u32,
    color: Rgb<u8>,
) {
    let width = i64::from(image.width());
    let height = i64::from(image.height());
    let scale = i64::from(scale);
    let advance = i64::from(GLYPH_ADVANCE) * scale;
    let mut x = i64::from(x);
    let y = i64::from(y);
    for ch in text.chars() {
        if x >= width {
            break;
        }
        let upper = ch.to_uppercase().next().unwrap_or(ch);
        if let Some(glyph) = glyph_bits(upper) {
            for (row, pattern) in glyph.iter().enumerate() {
                for col in 0..i64::from(GLYPH_WIDTH) {
                    if (pattern >> (i64::from(GLYPH_WIDTH) - 1 - col)) & 1 == 0 {
                        continue;
                    }
                    let top = y + row as i64 * scale;
                    let left = x + col * scale;
                    for py in top.max(0)..(top + scale).min(height) {
                        for px in left.max(0)..(left + scale).min(width) {
                            image.put_pixel(px as u32, py as u32, color);
                        }
                    }
                }
            }
        }
        x += advance;
    }
}

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    match ch {
        'A' => Some([
            0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001,
        ]),
        'B' => Some([
            0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110,
        ]),
        'C' => Some([
            0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110,
        ]),
        'D' => Some([
            0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100,
        ]),
        'E' => Some([
            0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b11111,
        ]),
        'F' => Some([
            0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b10000,
        ]),
        'G' => Some([
            0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111,
        ]),
        'H' => Some([
            0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001,
        ]),
        'I' => Some([
            0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110,
        ]),
        'J' => Some([
            0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100,
        ]),
        'K' => Some([
            0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001,
        ]),
        'L' => Some([
            0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111,
        ]),
        'M' => Some([
            0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001,
        ]),
        'N' => Some([
            0b10001, 0b11001, 0b10101, 0b10101, 0b10011, 0b10001, 0b10001,
        ]),
        'O' => Some([
            0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110,
        ]),
        'P' => Some([
            0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000,
        ]),
        'Q' => Some([
            0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101,
        ]),
        'R' => Some([
            0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001,
        ]),
        'S' => Some([
            0b01111, 0b10000, 0b01110, 0b00001, 0b00001, 0b10001, 0b01110,
        ]),
        'T' => Some([
            0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100,
        ]),
        'U' => Some([
            0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110,
        ]),
        'V' => Some([
            0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100,
        ]),
        'W' => Some([
            0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010,
        ]),
        'X' => Some([
            0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001,
        ]),
        'Y' => Some([
            0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100,
        ]),
        'Z' => Some([
            0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111,
        ]),
        '0' => Some([
            0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110,
        ]),
        '1' => Some([
            0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110,
        ]),
        '2' => Some([
            0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111,
        ]),
        '3' => Some([
            0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110,
        ]),
        '4' => Some([
            0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010,
        ]),
        '5' => Some([
            0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110,
        ]),
        '6' => Some([
            0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110,
        ]),
        '7' => Some([
            0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000,
        ]),
        '8' => Some([
            0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110,
        ]),
        '9' => Some([
            0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100,
        ]),
        '%' => Some([
            0b10001, 0b10010, 0b00100, 0b01000, 0b10010, 0b10001, 0b00000,
        ]),
        '-' => Some([0, 0, 0, 0b11111, 0, 0, 0]),
        '_' => Some([0, 0, 0, 0, 0, 0, 0b11111]),
        '+' => Some([0, 0b00100, 0b00100, 0b11111, 0b00100, 0b00100, 0]),
        ':' => Some([0, 0b01100, 0b01100, 0, 0b01100, 0b01100, 0]),
        '(' => Some([
            0b00010, 0b00100, 0b01000, 0b01000, 0b01000, 0b00100, 0b00010,
        ]),
        ')' => Some([
            0b01000, 0b00100, 0b00010, 0b00010, 0b00010, 0b00100, 0b01000,
        ]),
        '/' => Some([
            0b00001, 0b00010, 0b00010, 0b00100, 0b01000, 0b01000, 0b10000,
        ]),
        '#' => Some([
            0b01010, 0b01010, 0b11111, 0b01010, 0b11111, 0b01010, 0b01010,
        ]),
        '!' => Some([0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0, 0b00100]),
        '?' => Some([0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0, 0b00100]),
        '\'' => Some([0b00100, 0b00100, 0b01000, 0, 0, 0, 0]),
        ',' => Some([0, 0, 0, 0, 0b00110, 0b00100, 0b01000]),
        '.' => Some([0, 0, 0, 0, 0, 0b00110, 0b00110]),
        ' ' => Some([0, 0, 0, 0, 0, 0, 0]),
        _ => None,
    }
}
