use serde::{Deserialize, Serialize};

/// How the coordinates of a [`BoundingBox`] are expressed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateMode {
    /// Fractions of the image width/height in `[0, 1]`.
    #[default]
    Normalized,
    /// Pixel coordinates in the source image.
    Absolute,
}

/// Axis-aligned rectangle `(x1, y1)`-`(x2, y2)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Area of the rectangle, zero for inverted boxes.
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Intersection over union with another box in the same coordinate space.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let intersection = w * h;
        let union = self.area() + other.area() - intersection;
        if union > 0.0 { intersection / union } else { 0.0 }
    }
}

/// One recognised object instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }

    /// Text drawn next to the box, e.g. `deer 0.87`.
    pub fn caption(&self) -> String {
        format!("{} {:.2}", self.label, self.confidence)
    }

    /// Line used when listing detections, e.g. `deer (0.87)`.
    pub fn summary_line(&self) -> String {
        format!("{} ({:.2})", self.label, self.confidence)
    }
}

/// Rectangle in image pixels. `right`/`bottom` may equal the image
/// width/height; drawing clips them to the last row/column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl PixelRect {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_uses_two_decimals() {
        let det = Detection::new("deer", 0.873, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(det.caption(), "deer 0.87");
        assert_eq!(det.summary_line(), "deer (0.87)");
    }

    #[test]
    fn iou_of_disjoint_and_identical_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&b), 0.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn detection_uses_box_key_on_the_wire() {
        let det = Detection::new("fox", 0.5, BoundingBox::new(0.1, 0.2, 0.3, 0.4));
        let json = serde_json::to_value(&det).unwrap();
        assert!(json.get("box").is_some());
        assert_eq!(json["label"], "fox");
    }
}
