use std::{convert::TryFrom, path::Path, sync::Mutex};

use annotate::{BoundingBox, CoordinateMode, Detection};
use image::{RgbImage, imageops::FilterType};
use tch::{self, Device, Kind, Tensor};
use tracing::debug;

use crate::{
    ClassNames, DetectError, DetectParams, DetectionSet, Detector,
    suppression::{Candidate, suppress_overlaps},
};

const MAX_CANDIDATES: usize = 512;

/// TorchScript-backed detector wrapper.
///
/// The module is expected to return `[1, C, N]` with rows
/// `x1, y1, x2, y2, score[, class]` in model-input pixels.
pub struct TorchDetector {
    module: Mutex<tch::CModule>,
    device: Device,
    input_size: (i64, i64),
    names: ClassNames,
}

impl TorchDetector {
    /// Load a TorchScript module onto `device`.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        names: ClassNames,
        device: Device,
        input_size: (i64, i64),
    ) -> Result<Self, DetectError> {
        let module = tch::CModule::load_on_device(model_path.as_ref(), device)
            .map_err(|err| DetectError::Model(err.to_string()))?;
        Ok(Self {
            module: Mutex::new(module),
            device,
            input_size,
            names,
        })
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Resize an RGB image to the model input and build a normalized NCHW tensor.
    pub fn rgb_to_tensor(&self, image: &RgbImage) -> Result<Tensor, DetectError> {
        let (in_w, in_h) = self.input_size;
        if in_w <= 0 || in_h <= 0 {
            return Err(DetectError::Config(format!(
                "detector input size must be positive, got {in_w}x{in_h}"
            )));
        }
        let resized = image::imageops::resize(image, in_w as u32, in_h as u32, FilterType::Triangle);
        let tensor = Tensor::from_slice(resized.as_raw())
            .to_device(self.device)
            .to_kind(Kind::Float)
            .view([1, in_h, in_w, 3])
            .permute([0, 3, 1, 2])
            / 255.0;
        Ok(tensor)
    }

    /// Run the module and keep rows above the confidence threshold.
    fn infer(&self, input: &Tensor, confidence: f32) -> Result<Vec<Candidate>, DetectError> {
        let output = {
            let module = self
                .module
                .lock()
                .map_err(|_| DetectError::Model("detector module poisoned".into()))?;
            module
                .forward_ts(&[input])
                .map_err(|err| DetectError::Model(err.to_string()))?
        };
        let shape = output.size();
        if shape.len() != 3 {
            return Err(DetectError::Model(format!(
                "unexpected detector output shape: {shape:?}"
            )));
        }
        if shape[0] != 1 {
            return Err(DetectError::Model(format!(
                "detector expected batch=1 but received {}",
                shape[0]
            )));
        }
        if shape[1] < 5 {
            return Err(DetectError::Model(format!(
                "detector output requires at least 5 channels (x1,y1,x2,y2,conf), got {}",
                shape[1]
            )));
        }

        let preds = output
            .to_device(Device::Cpu)
            .to_kind(Kind::Float)
            .squeeze_dim(0)
            .permute([1, 0])
            .contiguous();
        let rows: Vec<Vec<f32>> =
            Vec::<Vec<f32>>::try_from(&preds).map_err(|err| DetectError::Model(err.to_string()))?;

        let mut candidates = Vec::new();
        for row in rows {
            if row.len() < 5 || row[4] < confidence {
                continue;
            }
            candidates.push(Candidate {
                bbox: BoundingBox::new(row[0], row[1], row[2], row[3]),
                score: row[4],
                class_id: if row.len() > 5 { row[5] as i64 } else { 0 },
            });
            if candidates.len() >= MAX_CANDIDATES {
                break;
            }
        }
        Ok(candidates)
    }
}

impl Detector for TorchDetector {
    fn name(&self) -> &'static str {
        "local"
    }

    fn detect(&self, image: &RgbImage, params: &DetectParams) -> Result<DetectionSet, DetectError> {
        let input = self.rgb_to_tensor(image)?;
        let candidates = self.infer(&input, params.confidence)?;
        let kept = suppress_overlaps(candidates, params.iou);
        debug!("torch detector kept {} candidate(s)", kept.len());

        let (in_w, in_h) = self.input_size;
        let scale_x = image.width() as f32 / in_w as f32;
        let scale_y = image.height() as f32 / in_h as f32;
        let detections = kept
            .into_iter()
            .map(|c| {
                Detection::new(
                    self.names.name(c.class_id),
                    c.score,
                    BoundingBox::new(
                        c.bbox.x1 * scale_x,
                        c.bbox.y1 * scale_y,
                        c.bbox.x2 * scale_x,
                        c.bbox.y2 * scale_y,
                    ),
                )
            })
            .collect();

        Ok(DetectionSet {
            mode: CoordinateMode::Absolute,
            detections,
            raw: None,
        })
    }
}
