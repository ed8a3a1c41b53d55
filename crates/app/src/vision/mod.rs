//! Photo detection front end: one-shot CLI commands and the preview server.
//!
//! The module is split into focused submodules:
//! - `config`: CLI configuration parsing.
//! - `backend`: Builds the configured detector.
//! - `pipeline`: Command runners for `serve`, `detect`, and `annotate`.
//! - `processing`: Detect-then-annotate step shared by every command.
//! - `encoding`: Image decode and JPEG encode helpers.
//! - `server`: Actix Web page and API endpoints.
//! - `telemetry`: Tracing subscriber and metrics recorder setup.
//! - `data`: Shared structs passed between stages.

/// Re-export command settings so callers can configure runs without reaching
/// into submodules.
pub use config::{
    AnnotateArgs, AnnotateConfig, DetectArgs, DetectConfig, ServeArgs, ServeConfig,
    TelemetryOptions,
};
/// Command entry points.
pub use pipeline::{annotate_file, detect_file, serve};
pub(crate) use telemetry::init as init_telemetry;

mod backend;
mod config;
mod data;
mod encoding;
mod pipeline;
mod processing;
mod server;
mod telemetry;
