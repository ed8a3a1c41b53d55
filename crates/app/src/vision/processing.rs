//! Detect-then-annotate step shared by the CLI and the preview server.
//!
//! The detector backend supplies boxes in its own coordinate convention; the
//! style is switched to that convention before the annotator draws them.

use std::time::Instant;

use annotate::{AnnotateError, AnnotationStyle, annotate, resolve_box};
use chrono::Utc;
use image::RgbImage;
use ml_core::{DetectError, DetectParams, DetectionSet, Detector};
use thiserror::Error;
use tracing::{debug, info_span};

use crate::vision::{
    data::{ImageSource, ResultPacket},
    encoding::{decode_image, encode_jpeg},
};

#[derive(Debug, Error)]
pub(crate) enum ProcessError {
    #[error("could not decode image")]
    Decode(#[source] image::ImageError),
    #[error(transparent)]
    Detect(#[from] DetectError),
    #[error(transparent)]
    Annotate(#[from] AnnotateError),
    #[error("could not encode result image")]
    Encode(#[source] image::ImageError),
}

impl ProcessError {
    /// True when the caller sent something unusable, as opposed to a backend fault.
    pub(crate) fn is_client_error(&self) -> bool {
        matches!(self, ProcessError::Decode(_) | ProcessError::Annotate(_))
    }
}

/// Detections plus the annotated copy of the input.
pub(crate) struct Annotated {
    pub(crate) set: DetectionSet,
    pub(crate) image: RgbImage,
}

/// Run `detector` on `image` and draw its detections.
pub(crate) fn detect_and_annotate(
    detector: &dyn Detector,
    style: &AnnotationStyle,
    image: &RgbImage,
    params: &DetectParams,
) -> Result<Annotated, ProcessError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(AnnotateError::InvalidImage { width, height }.into());
    }

    let backend = detector.name();
    let span = info_span!("detect", backend, width, height);
    let _guard = span.enter();

    let detect_start = Instant::now();
    let result = detector.detect(image, params);
    metrics::histogram!("wildlife_detect_seconds", "backend" => backend)
        .record(detect_start.elapsed().as_secs_f64());
    let set = match result {
        Ok(set) => set,
        Err(err) => {
            metrics::counter!("wildlife_detect_errors_total", "backend" => backend).increment(1);
            return Err(err.into());
        }
    };

    let drawable = set
        .detections
        .iter()
        .filter(|d| resolve_box(&d.bbox, set.mode, width, height).is_some())
        .count();
    let skipped = set.detections.len() - drawable;
    metrics::counter!("wildlife_boxes_drawn_total").increment(drawable as u64);
    metrics::counter!("wildlife_boxes_skipped_total").increment(skipped as u64);
    debug!(
        "{} detection(s), {drawable} drawable, {skipped} skipped",
        set.detections.len()
    );

    let style = style.clone().with_coordinate_mode(set.mode);
    let annotate_start = Instant::now();
    let annotated = annotate(image, &set.detections, &style)?;
    metrics::histogram!("wildlife_annotate_seconds")
        .record(annotate_start.elapsed().as_secs_f64());

    Ok(Annotated {
        set,
        image: annotated,
    })
}

/// Decode an uploaded photo, detect, annotate, and package both JPEGs.
pub(crate) fn process_upload(
    detector: &dyn Detector,
    style: &AnnotationStyle,
    bytes: &[u8],
    params: &DetectParams,
    source: ImageSource,
    frame_number: u64,
    jpeg_quality: u8,
) -> Result<ResultPacket, ProcessError> {
    let image = decode_image(bytes).map_err(ProcessError::Decode)?;
    let Annotated { set, image: annotated } = detect_and_annotate(detector, style, &image, params)?;

    let input_jpeg = encode_jpeg(&image, jpeg_quality).map_err(ProcessError::Encode)?;
    let annotated_jpeg = encode_jpeg(&annotated, jpeg_quality).map_err(ProcessError::Encode)?;

    Ok(ResultPacket {
        frame_number,
        timestamp_ms: Utc::now().timestamp_millis(),
        source,
        backend: detector.name(),
        input_jpeg,
        annotated_jpeg,
        detections: set.detections,
        raw: set.raw,
    })
}
