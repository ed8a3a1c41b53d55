//! Load-once model holders.
//!
//! Models are expensive to load, so they are created on the first request
//! that needs them and then shared for the rest of the process.

use std::sync::{Arc, Mutex, OnceLock};

use image::RgbImage;
use tracing::info;

use crate::{DetectError, DetectParams, DetectionSet, Detector};

/// Holds a value initialised at most once, on first use.
pub struct ModelSlot<T> {
    cell: OnceLock<Arc<T>>,
    init: Mutex<()>,
}

impl<T> Default for ModelSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ModelSlot<T> {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().cloned()
    }

    /// Return the stored value, running `load` if the slot is still empty.
    ///
    /// Concurrent callers wait for the first loader instead of loading twice.
    /// A failed load leaves the slot empty so a later call can retry.
    pub fn get_or_try_init<E>(&self, load: impl FnOnce() -> Result<T, E>) -> Result<Arc<T>, E> {
        if let Some(value) = self.cell.get() {
            return Ok(value.clone());
        }
        let _guard = self.init.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(value) = self.cell.get() {
            return Ok(value.clone());
        }
        let value = Arc::new(load()?);
        let _ = self.cell.set(value.clone());
        Ok(value)
    }
}

type Loader = Box<dyn Fn() -> Result<Box<dyn Detector>, DetectError> + Send + Sync>;

/// Detector that builds its backend on the first `detect` call.
pub struct LazyDetector {
    name: &'static str,
    slot: ModelSlot<Box<dyn Detector>>,
    loader: Loader,
}

impl LazyDetector {
    pub fn new(
        name: &'static str,
        loader: impl Fn() -> Result<Box<dyn Detector>, DetectError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            slot: ModelSlot::new(),
            loader: Box::new(loader),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.get().is_some()
    }
}

impl Detector for LazyDetector {
    fn name(&self) -> &'static str {
        self.name
    }

    fn detect(&self, image: &RgbImage, params: &DetectParams) -> Result<DetectionSet, DetectError> {
        let detector = self.slot.get_or_try_init(|| {
            info!("loading {} detector", self.name);
            (self.loader)()
        })?;
        detector.detect(image, params)
    }
}
