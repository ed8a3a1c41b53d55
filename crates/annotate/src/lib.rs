//! Detection overlay rendering.
//!
//! The crate turns an RGB image plus a list of detections into a freshly
//! allocated, annotated copy of that image:
//! - `types`: detections, bounding boxes and the coordinate convention.
//! - `style`: colours, line thickness and label font used while drawing.
//! - `font`: built-in bitmap glyphs and optional TrueType label fonts.
//! - `draw`: clipped rectangle primitives.
//! - `annotator`: the `annotate` entry point.
//!
//! Nothing here performs I/O except [`LabelFont::resolve`], which callers run
//! once before handing the resolved font to every annotation call.

pub use annotator::{LabelPlacement, annotate, label_placement, resolve_box};
pub use error::{AnnotateError, FontError};
pub use font::LabelFont;
pub use style::AnnotationStyle;
pub use types::{BoundingBox, CoordinateMode, Detection, PixelRect};

mod annotator;
mod draw;
mod error;
mod font;
mod style;
mod types;
