use std::path::PathBuf;

use thiserror::Error;

/// Failure modes of [`crate::annotate`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnnotateError {
    #[error("image must have a non-zero area (got {width}x{height})")]
    InvalidImage { width: u32, height: u32 },
}

/// Raised when a TrueType label font cannot be loaded.
#[derive(Debug, Error)]
pub enum FontError {
    #[error("failed to read font file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("font file {path:?} could not be parsed")]
    Invalid { path: PathBuf },
}
