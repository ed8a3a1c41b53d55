//! Turns a validated [`BackendConfig`] into a shared detector.

use std::sync::Arc;

use anyhow::{Context, Result};
use ml_core::{Detector, LazyDetector, RemoteDetector};
use tracing::info;

use crate::vision::config::{BackendConfig, LocalModelConfig};

/// Build the detector for `config`.
///
/// The remote client is created eagerly; the local model is loaded on the
/// first detection so the server can start before weights are read.
pub(crate) fn build_detector(config: &BackendConfig) -> Result<Arc<dyn Detector>> {
    match config {
        BackendConfig::Remote(remote) => {
            let detector =
                RemoteDetector::new(remote.clone()).context("Failed to set up remote detector")?;
            info!("using remote detector at {}", detector.endpoint());
            Ok(Arc::new(detector))
        }
        BackendConfig::Local(local) => {
            info!("using local model {}", local.model_path.display());
            let local = local.clone();
            Ok(Arc::new(LazyDetector::new("local", move || {
                load_local(&local)
            })))
        }
    }
}

#[cfg(feature = "with-tch")]
fn load_local(config: &LocalModelConfig) -> Result<Box<dyn Detector>, ml_core::DetectError> {
    use ml_core::{
        ClassNames,
        detector::TorchDetector,
        tch::{Cuda, Device},
    };

    let names = match config.names_path.as_deref() {
        Some(path) => ClassNames::from_file(path)?,
        None => ClassNames::default(),
    };
    let device = if config.use_cpu {
        Device::Cpu
    } else {
        Device::cuda_if_available()
    };
    tracing::debug!(
        "CUDA available: {} (devices: {}), using {:?}",
        Cuda::is_available(),
        Cuda::device_count(),
        device
    );
    let size = i64::from(config.input_size);
    let detector = TorchDetector::new(&config.model_path, names, device, (size, size))?;
    Ok(Box::new(detector))
}

#[cfg(not(feature = "with-tch"))]
fn load_local(config: &LocalModelConfig) -> Result<Box<dyn Detector>, ml_core::DetectError> {
    Err(ml_core::DetectError::Config(format!(
        "cannot load {}: built without the `with-tch` feature",
        config.model_path.display()
    )))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use image::RgbImage;
    use ml_core::{DetectParams, RemoteConfig};

    use super::*;

    #[test]
    fn remote_config_builds_a_remote_detector() {
        let config = BackendConfig::Remote(RemoteConfig::new("http://127.0.0.1:9/predict", "key"));
        let detector = build_detector(&config).unwrap();
        assert_eq!(detector.name(), "remote");
    }

    #[test]
    fn local_model_is_not_read_until_first_detection() {
        let config = BackendConfig::Local(LocalModelConfig {
            model_path: PathBuf::from("/nonexistent/model.pt"),
            names_path: None,
            input_size: 640,
            use_cpu: true,
        });
        let detector = build_detector(&config).unwrap();
        assert_eq!(detector.name(), "local");
        let result = detector.detect(&RgbImage::new(8, 8), &DetectParams::default());
        let err = result.err().unwrap();
        if !cfg!(feature = "with-tch") {
            assert!(err.to_string().contains("model.pt"));
        }
    }
}
