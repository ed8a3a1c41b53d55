//! Configuration parsing for the detection commands.
//!
//! CLI argument groups are declared with clap and converted into validated
//! config structs, so downstream stages never re-check flags.

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use annotate::{AnnotationStyle, CoordinateMode, LabelFont};
use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, ValueEnum};
use image::Rgb;
use ml_core::{DetectParams, RemoteConfig, remote::DEFAULT_RESPONSE_KEYS};

/// Default IOU when the remote service does the suppression.
pub const REMOTE_DEFAULT_IOU: f32 = 0.70;
/// Default IOU for the local model's suppression pass.
pub const LOCAL_DEFAULT_IOU: f32 = 0.45;

const MAX_FONT_SIZE_PX: f32 = 512.0;
const MAX_THICKNESS_PX: u32 = 1024;
const MAX_LABEL_PADDING_PX: u32 = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
/// Where detections come from.
pub enum BackendKind {
    /// Hosted inference endpoint (multipart upload, bearer token).
    Remote,
    /// TorchScript model loaded in-process.
    Local,
}

/// Backend selection and detection thresholds.
#[derive(Debug, Clone, Args)]
pub struct BackendArgs {
    /// Detection backend.
    #[arg(long = "backend", value_enum, default_value_t = BackendKind::Remote)]
    pub backend: BackendKind,
    /// Inference endpoint URL (remote backend).
    #[arg(long = "endpoint", env = "ULTRALYTICS_DEPLOY_URL", value_name = "URL")]
    pub endpoint: Option<String>,
    /// Bearer token for the inference endpoint (remote backend).
    #[arg(
        long = "api-key",
        env = "ULTRALYTICS_DEPLOY_API_KEY",
        hide_env_values = true,
        value_name = "KEY"
    )]
    pub api_key: Option<String>,
    /// Request timeout in seconds (remote backend).
    #[arg(long = "timeout-secs", default_value_t = 90, value_name = "SECS")]
    pub timeout_secs: u64,
    /// Response key holding the detection list; repeat to set fallbacks in order.
    #[arg(long = "response-key", value_name = "KEY")]
    pub response_keys: Vec<String>,
    /// TorchScript model path (local backend).
    #[arg(long = "model", value_name = "PATH")]
    pub model_path: Option<PathBuf>,
    /// Class names file, one per line (local backend).
    #[arg(long = "names", value_name = "PATH")]
    pub names_path: Option<PathBuf>,
    /// Square model input edge in pixels (local backend).
    #[arg(long = "detector-size", default_value_t = 640, value_name = "PX")]
    pub detector_size: u32,
    /// Force CPU inference (local backend).
    #[arg(long = "cpu", action = clap::ArgAction::SetTrue)]
    pub use_cpu: bool,
    /// Minimum confidence.
    #[arg(long = "conf", default_value_t = 0.25, value_name = "0-1")]
    pub confidence: f32,
    /// Overlap threshold for duplicate suppression [default: 0.70 remote, 0.45 local].
    #[arg(long = "iou", value_name = "0-1")]
    pub iou: Option<f32>,
    /// Inference image size sent to the remote service.
    #[arg(long = "imgsz", default_value_t = 640, value_name = "PX")]
    pub image_size: u32,
}

/// Label and box appearance.
#[derive(Debug, Clone, Args)]
pub struct StyleArgs {
    /// Box outline colour (#rrggbb).
    #[arg(long = "box-color", default_value = "#00ff00", value_parser = parse_color)]
    pub box_color: Rgb<u8>,
    /// Label background colour (#rrggbb) [default: box colour].
    #[arg(long = "label-color", value_parser = parse_color)]
    pub label_color: Option<Rgb<u8>>,
    /// Label text colour (#rrggbb).
    #[arg(long = "text-color", default_value = "#000000", value_parser = parse_color)]
    pub text_color: Rgb<u8>,
    /// Box outline thickness in pixels.
    #[arg(long = "thickness", default_value_t = 4, value_name = "PX")]
    pub thickness: u32,
    /// Label font size in pixels.
    #[arg(long = "font-size", default_value_t = 18.0, value_name = "PX")]
    pub font_size: f32,
    /// Padding around label text in pixels.
    #[arg(long = "label-padding", default_value_t = 2, value_name = "PX")]
    pub label_padding: u32,
    /// TrueType font for labels; repeat to list fallbacks. Common system
    /// fonts are tried next, then the built-in bitmap font.
    #[arg(long = "font", value_name = "PATH")]
    pub fonts: Vec<PathBuf>,
    /// Always draw labels with the built-in bitmap font.
    #[arg(long = "builtin-font", action = clap::ArgAction::SetTrue, conflicts_with = "fonts")]
    pub builtin_font: bool,
}

/// Runtime instrumentation options.
#[derive(Debug, Clone, Default, Args)]
pub struct TelemetryOptions {
    /// Write a Chrome trace JSON file capturing spans.
    #[arg(long = "chrome-trace", value_name = "PATH", global = true)]
    pub chrome_trace_path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
#[cfg_attr(not(feature = "with-tch"), allow(dead_code))]
pub struct LocalModelConfig {
    pub model_path: PathBuf,
    pub names_path: Option<PathBuf>,
    pub input_size: u32,
    pub use_cpu: bool,
}

#[derive(Clone, Debug)]
pub enum BackendConfig {
    Remote(RemoteConfig),
    Local(LocalModelConfig),
}

/// Validated backend choice plus the default thresholds for each call.
#[derive(Clone, Debug)]
pub struct BackendSettings {
    pub backend: BackendConfig,
    pub params: DetectParams,
}

impl TryFrom<BackendArgs> for BackendSettings {
    type Error = anyhow::Error;

    fn try_from(args: BackendArgs) -> Result<Self> {
        let iou = args.iou.unwrap_or(match args.backend {
            BackendKind::Remote => REMOTE_DEFAULT_IOU,
            BackendKind::Local => LOCAL_DEFAULT_IOU,
        });
        let params = DetectParams {
            confidence: args.confidence,
            iou,
            image_size: args.image_size,
        };
        validate_params(&params)?;

        let backend = match args.backend {
            BackendKind::Remote => {
                let endpoint = args.endpoint.filter(|e| !e.trim().is_empty()).ok_or_else(|| {
                    anyhow!("Missing endpoint. Provide --endpoint <url> or set ULTRALYTICS_DEPLOY_URL.")
                })?;
                let api_key = args.api_key.filter(|k| !k.trim().is_empty()).ok_or_else(|| {
                    anyhow!("Missing API key. Provide --api-key or set ULTRALYTICS_DEPLOY_API_KEY.")
                })?;
                if args.timeout_secs == 0 {
                    bail!("--timeout-secs must be at least 1");
                }
                let mut remote = RemoteConfig::new(endpoint, api_key);
                remote.timeout = Duration::from_secs(args.timeout_secs);
                if !args.response_keys.is_empty() {
                    remote.response_keys = args.response_keys;
                }
                BackendConfig::Remote(remote)
            }
            BackendKind::Local => {
                if !cfg!(feature = "with-tch") {
                    bail!("The local backend requires building with `--features with-tch`");
                }
                let model_path = args
                    .model_path
                    .ok_or_else(|| anyhow!("Missing model path. Provide --model <path>."))?;
                if args.detector_size == 0 {
                    bail!("--detector-size must be a positive integer");
                }
                BackendConfig::Local(LocalModelConfig {
                    model_path,
                    names_path: args.names_path,
                    input_size: args.detector_size,
                    use_cpu: args.use_cpu,
                })
            }
        };

        Ok(Self { backend, params })
    }
}

impl BackendSettings {
    /// Coordinate convention the configured backend reports boxes in.
    pub fn default_mode(&self) -> CoordinateMode {
        match self.backend {
            BackendConfig::Remote(_) => CoordinateMode::Normalized,
            BackendConfig::Local(_) => CoordinateMode::Absolute,
        }
    }

    /// Apply per-request overrides on top of the configured thresholds.
    pub fn params_with(&self, confidence: Option<f32>, iou: Option<f32>) -> Result<DetectParams> {
        let params = DetectParams {
            confidence: confidence.unwrap_or(self.params.confidence),
            iou: iou.unwrap_or(self.params.iou),
            image_size: self.params.image_size,
        };
        validate_params(&params)?;
        Ok(params)
    }
}

fn validate_params(params: &DetectParams) -> Result<()> {
    if !(params.confidence > 0.0 && params.confidence < 1.0) {
        bail!("confidence must be between 0 and 1 (got {})", params.confidence);
    }
    if !(params.iou > 0.0 && params.iou < 1.0) {
        bail!("IOU must be between 0 and 1 (got {})", params.iou);
    }
    if params.image_size == 0 {
        bail!("--imgsz must be a positive integer");
    }
    Ok(())
}

impl StyleArgs {
    /// Build the drawing style, resolving the label font once.
    pub fn into_style(self, mode: CoordinateMode) -> Result<AnnotationStyle> {
        if !(self.font_size > 0.0 && self.font_size <= MAX_FONT_SIZE_PX) {
            bail!("--font-size must be between 0 and {MAX_FONT_SIZE_PX}");
        }
        if !(1..=MAX_THICKNESS_PX).contains(&self.thickness) {
            bail!("--thickness must be between 1 and {MAX_THICKNESS_PX}");
        }
        if self.label_padding > MAX_LABEL_PADDING_PX {
            bail!("--label-padding must be at most {MAX_LABEL_PADDING_PX}");
        }
        let font = if self.builtin_font {
            LabelFont::Builtin
        } else {
            LabelFont::resolve(&self.fonts)
        };
        Ok(AnnotationStyle {
            box_color: self.box_color,
            box_thickness_px: self.thickness,
            label_background_color: self.label_color,
            label_text_color: self.text_color,
            font_size_px: self.font_size,
            label_padding_px: self.label_padding,
            coordinate_mode: mode,
            font,
        })
    }
}

/// Preview server settings.
#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub jpeg_quality: u8,
    pub backend: BackendSettings,
    pub style: AnnotationStyle,
}

/// `serve` subcommand arguments.
#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address the preview server listens on.
    #[arg(long = "bind", default_value = "0.0.0.0:8080", value_name = "ADDR")]
    pub bind: SocketAddr,
    /// JPEG quality for stored input/annotated images (1-100).
    #[arg(long = "jpeg-quality", default_value_t = 85, value_name = "Q")]
    pub jpeg_quality: i32,
    #[command(flatten)]
    pub backend: BackendArgs,
    #[command(flatten)]
    pub style: StyleArgs,
}

impl TryFrom<ServeArgs> for ServeConfig {
    type Error = anyhow::Error;

    fn try_from(args: ServeArgs) -> Result<Self> {
        let backend = BackendSettings::try_from(args.backend)?;
        Ok(Self {
            bind: args.bind,
            jpeg_quality: parse_jpeg_quality(args.jpeg_quality)?,
            style: args.style.into_style(backend.default_mode())?,
            backend,
        })
    }
}

/// `detect` subcommand arguments.
#[derive(Debug, Clone, Args)]
pub struct DetectArgs {
    /// Photo to run detection on.
    #[arg(long = "image", value_name = "PATH")]
    pub image: PathBuf,
    /// Where to write the annotated image [default: <image>_annotated.<ext>].
    #[arg(long = "out", short = 'o', value_name = "PATH")]
    pub out: Option<PathBuf>,
    /// Print the full detection set as JSON instead of summary lines.
    #[arg(long = "json", action = clap::ArgAction::SetTrue)]
    pub json: bool,
    #[command(flatten)]
    pub backend: BackendArgs,
    #[command(flatten)]
    pub style: StyleArgs,
}

/// One-shot detection settings.
#[derive(Clone, Debug)]
pub struct DetectConfig {
    pub image: PathBuf,
    pub out: PathBuf,
    pub json: bool,
    pub backend: BackendSettings,
    pub style: AnnotationStyle,
}

impl TryFrom<DetectArgs> for DetectConfig {
    type Error = anyhow::Error;

    fn try_from(args: DetectArgs) -> Result<Self> {
        let backend = BackendSettings::try_from(args.backend)?;
        Ok(Self {
            out: args.out.unwrap_or_else(|| annotated_path(&args.image)),
            image: args.image,
            json: args.json,
            style: args.style.into_style(backend.default_mode())?,
            backend,
        })
    }
}

/// `annotate` subcommand arguments.
#[derive(Debug, Clone, Args)]
pub struct AnnotateArgs {
    /// Photo to draw on.
    #[arg(long = "image", value_name = "PATH")]
    pub image: PathBuf,
    /// Detections JSON: a bare list or an object holding one under a response key.
    #[arg(long = "detections", value_name = "PATH")]
    pub detections: PathBuf,
    /// Where to write the annotated image [default: <image>_annotated.<ext>].
    #[arg(long = "out", short = 'o', value_name = "PATH")]
    pub out: Option<PathBuf>,
    /// Boxes are pixel coordinates rather than fractions of the image size.
    #[arg(long = "absolute", action = clap::ArgAction::SetTrue)]
    pub absolute: bool,
    /// Key holding the detection list; repeat to set fallbacks in order.
    #[arg(long = "response-key", value_name = "KEY")]
    pub response_keys: Vec<String>,
    #[command(flatten)]
    pub style: StyleArgs,
}

/// Offline annotation settings.
#[derive(Clone, Debug)]
pub struct AnnotateConfig {
    pub image: PathBuf,
    pub detections: PathBuf,
    pub out: PathBuf,
    pub response_keys: Vec<String>,
    pub style: AnnotationStyle,
}

impl TryFrom<AnnotateArgs> for AnnotateConfig {
    type Error = anyhow::Error;

    fn try_from(args: AnnotateArgs) -> Result<Self> {
        let mode = if args.absolute {
            CoordinateMode::Absolute
        } else {
            CoordinateMode::Normalized
        };
        let response_keys = if args.response_keys.is_empty() {
            DEFAULT_RESPONSE_KEYS.iter().map(|key| key.to_string()).collect()
        } else {
            args.response_keys
        };
        Ok(Self {
            out: args.out.unwrap_or_else(|| annotated_path(&args.image)),
            image: args.image,
            detections: args.detections,
            response_keys,
            style: args.style.into_style(mode)?,
        })
    }
}

/// `photo.jpg` → `photo_annotated.jpg`, next to the input.
pub fn annotated_path(image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let ext = image
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_else(|| "jpg".to_string());
    image.with_file_name(format!("{stem}_annotated.{ext}"))
}

/// Parse `#rrggbb` / `rrggbb` into an RGB colour.
pub fn parse_color(value: &str) -> std::result::Result<Rgb<u8>, String> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("expected a colour like #00ff00, got {value:?}"));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map_err(|err| err.to_string())
    };
    Ok(Rgb([channel(0..2)?, channel(2..4)?, channel(4..6)?]))
}

pub fn parse_jpeg_quality(value: i32) -> Result<u8> {
    if !(1..=100).contains(&value) {
        bail!("--jpeg-quality must be an integer between 1 and 100");
    }
    u8::try_from(value).context("--jpeg-quality out of range")
}
