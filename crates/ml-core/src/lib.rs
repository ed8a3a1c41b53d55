//! Detection backends feeding the annotator.
//!
//! Every backend implements [`Detector`]: it takes an RGB image plus the
//! confidence/IOU thresholds and returns a [`DetectionSet`] whose boxes are
//! tagged with the coordinate convention they use.

use annotate::{CoordinateMode, Detection};
use image::RgbImage;
use serde::Serialize;

pub mod error;
pub mod labels;
pub mod remote;
pub mod slot;
pub mod suppression;

#[cfg(feature = "with-tch")]
pub mod detector;

pub use error::DetectError;
pub use labels::ClassNames;
pub use remote::{RemoteConfig, RemoteDetector, parse_response};
pub use slot::{LazyDetector, ModelSlot};
pub use suppression::{Candidate, suppress_overlaps};

#[cfg(feature = "with-tch")]
pub use tch;

/// Thresholds forwarded to a backend for a single call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectParams {
    pub confidence: f32,
    pub iou: f32,
    /// Inference edge length requested from the remote service.
    pub image_size: u32,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            confidence: 0.25,
            iou: 0.45,
            image_size: 640,
        }
    }
}

/// Detections returned by one backend call.
#[derive(Clone, Debug, Default, Serialize)]
pub struct DetectionSet {
    pub mode: CoordinateMode,
    pub detections: Vec<Detection>,
    /// Backend response as received, when the backend has one.
    pub raw: Option<serde_json::Value>,
}

/// A source of detections. Implementations are synchronous and may block.
pub trait Detector: Send + Sync {
    /// Short backend name used in logs and metrics labels.
    fn name(&self) -> &'static str;

    fn detect(&self, image: &RgbImage, params: &DetectParams) -> Result<DetectionSet, DetectError>;
}

impl<T: Detector + ?Sized> Detector for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn detect(&self, image: &RgbImage, params: &DetectParams) -> Result<DetectionSet, DetectError> {
        (**self).detect(image, params)
    }
}
