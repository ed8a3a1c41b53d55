use image::Rgb;

use crate::{font::LabelFont, types::CoordinateMode};

pub const DEFAULT_BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const DEFAULT_TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
pub const DEFAULT_BOX_THICKNESS_PX: u32 = 4;
pub const DEFAULT_FONT_SIZE_PX: f32 = 18.0;
pub const DEFAULT_LABEL_PADDING_PX: u32 = 2;

/// Drawing options applied to every detection of a single `annotate` call.
#[derive(Clone, Debug)]
pub struct AnnotationStyle {
    /// Outline colour of each box.
    pub box_color: Rgb<u8>,
    /// Outline width, grown inward from the box edges.
    pub box_thickness_px: u32,
    /// Fill behind the label; `None` reuses `box_color`.
    pub label_background_color: Option<Rgb<u8>>,
    pub label_text_color: Rgb<u8>,
    pub font_size_px: f32,
    /// Space between the label text and its background edge, on every side.
    pub label_padding_px: u32,
    pub coordinate_mode: CoordinateMode,
    pub font: LabelFont,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            box_color: DEFAULT_BOX_COLOR,
            box_thickness_px: DEFAULT_BOX_THICKNESS_PX,
            label_background_color: None,
            label_text_color: DEFAULT_TEXT_COLOR,
            font_size_px: DEFAULT_FONT_SIZE_PX,
            label_padding_px: DEFAULT_LABEL_PADDING_PX,
            coordinate_mode: CoordinateMode::Normalized,
            font: LabelFont::Builtin,
        }
    }
}

impl AnnotationStyle {
    pub fn with_coordinate_mode(mut self, mode: CoordinateMode) -> Self {
        self.coordinate_mode = mode;
        self
    }

    pub fn with_font(mut self, font: LabelFont) -> Self {
        self.font = font;
        self
    }

    pub fn label_background(&self) -> Rgb<u8> {
        self.label_background_color.unwrap_or(self.box_color)
    }
}
