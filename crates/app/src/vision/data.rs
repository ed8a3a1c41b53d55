use std::{
    collections::VecDeque,
    fmt,
    sync::{Arc, Mutex},
};

use annotate::Detection;
use serde::{Deserialize, Serialize};

pub(crate) const RESULT_HISTORY_CAPACITY: usize = 16;

/// How the photo was acquired in the page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    Camera,
    #[default]
    Upload,
}

impl ImageSource {
    pub(crate) fn label(self) -> &'static str {
        match self {
            ImageSource::Camera => "camera",
            ImageSource::Upload => "upload",
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One completed detection run as served by the preview server.
#[derive(Clone, Debug)]
pub(crate) struct ResultPacket {
    pub(crate) frame_number: u64,
    pub(crate) timestamp_ms: i64,
    pub(crate) source: ImageSource,
    pub(crate) backend: &'static str,
    pub(crate) input_jpeg: Vec<u8>,
    pub(crate) annotated_jpeg: Vec<u8>,
    pub(crate) detections: Vec<Detection>,
    pub(crate) raw: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub(crate) struct DetectionsResponse<'a> {
    pub(crate) frame_number: u64,
    pub(crate) timestamp_ms: i64,
    pub(crate) source: ImageSource,
    pub(crate) backend: &'static str,
    pub(crate) detections: &'a [Detection],
    pub(crate) lines: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<&'static str>,
    pub(crate) raw: Option<&'a serde_json::Value>,
}

impl<'a> From<&'a ResultPacket> for DetectionsResponse<'a> {
    fn from(packet: &'a ResultPacket) -> Self {
        Self {
            frame_number: packet.frame_number,
            timestamp_ms: packet.timestamp_ms,
            source: packet.source,
            backend: packet.backend,
            detections: &packet.detections,
            lines: packet.detections.iter().map(Detection::summary_line).collect(),
            message: packet
                .detections
                .is_empty()
                .then_some(NO_DETECTIONS_MESSAGE),
            raw: packet.raw.as_ref(),
        }
    }
}

pub(crate) const NO_DETECTIONS_MESSAGE: &str = "No detections found";

pub(crate) type SharedResult = Arc<Mutex<Option<ResultPacket>>>;
pub(crate) type ResultHistory = Arc<Mutex<VecDeque<ResultPacket>>>;
