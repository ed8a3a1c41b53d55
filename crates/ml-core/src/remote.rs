//! Client for a hosted inference endpoint.
//!
//! The image is uploaded as a JPEG in a multipart form next to the `conf`,
//! `iou` and `imgsz` fields, authenticated with a bearer token. The JSON reply
//! carries a list of detections with boxes normalised to `[0, 1]`.

use std::{fmt, time::Duration};

use annotate::{BoundingBox, CoordinateMode, Detection};
use image::{RgbImage, codecs::jpeg::JpegEncoder};
use reqwest::blocking::{
    Client,
    multipart::{Form, Part},
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{DetectError, DetectParams, DetectionSet, Detector};

pub const DEFAULT_RESPONSE_KEYS: &[&str] = &["predictions", "results"];

#[derive(Clone)]
pub struct RemoteConfig {
    pub endpoint: String,
    pub api_key: String,
    pub timeout: Duration,
    /// Keys tried in order for the detection list; the first non-empty wins.
    pub response_keys: Vec<String>,
    pub jpeg_quality: u8,
}

impl RemoteConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(90),
            response_keys: DEFAULT_RESPONSE_KEYS.iter().map(|k| k.to_string()).collect(),
            jpeg_quality: 90,
        }
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("response_keys", &self.response_keys)
            .field("jpeg_quality", &self.jpeg_quality)
            .finish()
    }
}

pub struct RemoteDetector {
    client: Client,
    config: RemoteConfig,
}

impl RemoteDetector {
    pub fn new(config: RemoteConfig) -> Result<Self, DetectError> {
        if config.api_key.trim().is_empty() {
            return Err(DetectError::Config("API key is empty".into()));
        }
        if config.endpoint.trim().is_empty() {
            return Err(DetectError::Config("endpoint URL is empty".into()));
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn build_form(&self, image: &RgbImage, params: &DetectParams) -> Result<Form, DetectError> {
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.config.jpeg_quality.clamp(1, 100))
            .encode_image(image)?;
        let file = Part::bytes(jpeg)
            .file_name("image.jpg")
            .mime_str("image/jpeg")?;
        Ok(Form::new()
            .part("file", file)
            .text("conf", params.confidence.to_string())
            .text("iou", params.iou.to_string())
            .text("imgsz", params.image_size.to_string()))
    }
}

impl Detector for RemoteDetector {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn detect(&self, image: &RgbImage, params: &DetectParams) -> Result<DetectionSet, DetectError> {
        let form = self.build_form(image, params)?;
        debug!(
            "POST {} (conf={}, iou={}, imgsz={})",
            self.config.endpoint, params.confidence, params.iou, params.image_size
        );
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(DetectError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let raw: Value = serde_json::from_str(&body)?;
        let detections = parse_response(&raw, &self.config.response_keys);
        Ok(DetectionSet {
            mode: CoordinateMode::Normalized,
            detections,
            raw: Some(raw),
        })
    }
}

#[derive(Deserialize)]
struct WireDetection {
    #[serde(default = "unknown_name", alias = "label")]
    name: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default, rename = "box")]
    bbox: WireBox,
}

#[derive(Deserialize)]
#[serde(default)]
struct WireBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl Default for WireBox {
    fn default() -> Self {
        Self {
            x1: 0.0,
            y1: 0.0,
            x2: 1.0,
            y2: 1.0,
        }
    }
}

fn unknown_name() -> String {
    "unknown".to_string()
}

/// Extract detections from a response body.
///
/// Accepts either a bare array or an object holding the list under one of
/// `keys`. Missing fields take the defaults `name = "unknown"`,
/// `confidence = 0` and a full-frame box; entries that are not objects are
/// dropped.
pub fn parse_response(raw: &Value, keys: &[String]) -> Vec<Detection> {
    let items = match raw {
        Value::Array(items) => Some(items),
        Value::Object(map) => keys.iter().find_map(|key| match map.get(key) {
            Some(Value::Array(items)) if !items.is_empty() => Some(items),
            _ => None,
        }),
        _ => None,
    };
    let Some(items) = items else {
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(
            |(idx, item)| match WireDetection::deserialize(item) {
                Ok(wire) => Some(Detection::new(
                    wire.name,
                    wire.confidence,
                    BoundingBox::new(wire.bbox.x1, wire.bbox.y1, wire.bbox.x2, wire.bbox.y2),
                )),
                Err(err) => {
                    warn!("dropping malformed detection #{idx}: {err}");
                    None
                }
            },
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use std::{
        io::{Read, Write},
        net::{TcpListener, TcpStream},
        thread::{self, JoinHandle},
    };

    use serde_json::json;

    use super::*;

    /// Accept one request on a local port, answer it, and hand back the
    /// request bytes.
    fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/predict", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            let reply = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(reply.as_bytes()).unwrap();
            String::from_utf8_lossy(&request).to_ascii_lowercase()
        });
        (url, handle)
    }

    fn read_request(stream: &mut TcpStream) -> Vec<u8> {
        let mut request = Vec::new();
        let mut chunk = [0u8; 8192];
        while !request_complete(&request) {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..n]);
        }
        request
    }

    fn request_complete(request: &[u8]) -> bool {
        let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let head = String::from_utf8_lossy(&request[..end]).to_ascii_lowercase();
        let body = &request[end + 4..];
        match head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
        {
            Some(len) => body.len() >= len.trim().parse::<usize>().unwrap_or(0),
            None => body.ends_with(b"0\r\n\r\n"),
        }
    }

    fn detector_for(url: String) -> RemoteDetector {
        let mut config = RemoteConfig::new(url, "test-key");
        config.timeout = Duration::from_secs(10);
        RemoteDetector::new(config).unwrap()
    }

    fn params() -> DetectParams {
        DetectParams {
            confidence: 0.25,
            iou: 0.7,
            image_size: 640,
        }
    }

    fn keys() -> Vec<String> {
        DEFAULT_RESPONSE_KEYS.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn parses_predictions_key() {
        let raw = json!({
            "predictions": [
                {"name": "deer", "confidence": 0.87, "box": {"x1": 0.1, "y1": 0.1, "x2": 0.5, "y2": 0.5}}
            ]
        });
        let dets = parse_response(&raw, &keys());
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].label, "deer");
        assert_eq!(dets[0].bbox, BoundingBox::new(0.1, 0.1, 0.5, 0.5));
    }

    #[test]
    fn falls_back_to_results_when_predictions_empty() {
        let raw = json!({
            "predictions": [],
            "results": [{"name": "fox", "confidence": 0.4, "box": {"x1": 0.2, "y1": 0.2, "x2": 0.3, "y2": 0.3}}]
        });
        let dets = parse_response(&raw, &keys());
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].label, "fox");
    }

    #[test]
    fn key_order_is_configurable() {
        let raw = json!({
            "predictions": [{"name": "a"}],
            "results": [{"name": "b"}]
        });
        let dets = parse_response(&raw, &["results".to_string(), "predictions".to_string()]);
        assert_eq!(dets[0].label, "b");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let raw = json!({"predictions": [{}, {"box": {"x1": 0.5}}]});
        let dets = parse_response(&raw, &keys());
        assert_eq!(dets[0].label, "unknown");
        assert_eq!(dets[0].confidence, 0.0);
        assert_eq!(dets[0].bbox, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(dets[1].bbox, BoundingBox::new(0.5, 0.0, 1.0, 1.0));
    }

    #[test]
    fn bare_arrays_and_label_alias_are_accepted() {
        let raw = json!([{"label": "boar", "confidence": 0.66, "box": {"x1": 0.0, "y1": 0.0, "x2": 0.2, "y2": 0.2}}]);
        let dets = parse_response(&raw, &keys());
        assert_eq!(dets[0].label, "boar");
    }

    #[test]
    fn malformed_entries_are_dropped() {
        let raw = json!({"predictions": [42, {"name": "deer", "confidence": 0.9}]});
        let dets = parse_response(&raw, &keys());
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].label, "deer");
    }

    #[test]
    fn missing_keys_yield_no_detections() {
        assert!(parse_response(&json!({"status": "ok"}), &keys()).is_empty());
        assert!(parse_response(&json!("nope"), &keys()).is_empty());
    }

    #[test]
    fn upload_carries_image_fields_and_bearer_key() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"predictions": [{"name": "deer", "confidence": 0.87, "box": {"x1": 0.1, "y1": 0.1, "x2": 0.5, "y2": 0.5}}]}"#,
        );
        let set = detector_for(url)
            .detect(&RgbImage::new(32, 24), &params())
            .unwrap();
        let request = server.join().unwrap();

        assert!(request.starts_with("post /predict "));
        assert!(request.contains("authorization: bearer test-key\r\n"));
        assert!(request.contains("content-type: multipart/form-data; boundary="));
        assert!(request.contains(r#"name="file"; filename="image.jpg""#));
        assert!(request.contains("content-type: image/jpeg\r\n"));
        assert!(request.contains("name=\"conf\"\r\n\r\n0.25\r\n"));
        assert!(request.contains("name=\"iou\"\r\n\r\n0.7\r\n"));
        assert!(request.contains("name=\"imgsz\"\r\n\r\n640\r\n"));

        assert_eq!(set.mode, CoordinateMode::Normalized);
        assert_eq!(set.detections.len(), 1);
        assert_eq!(set.detections[0].label, "deer");
        assert_eq!(set.detections[0].bbox, BoundingBox::new(0.1, 0.1, 0.5, 0.5));
        assert!(set.raw.is_some());
    }

    #[test]
    fn error_status_keeps_the_body() {
        let (url, server) = serve_once("503 Service Unavailable", "busy");
        let err = detector_for(url)
            .detect(&RgbImage::new(8, 8), &params())
            .unwrap_err();
        server.join().unwrap();
        match err {
            DetectError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "busy");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_json_success_is_an_error() {
        let (url, server) = serve_once("200 OK", "<html>");
        let result = detector_for(url).detect(&RgbImage::new(8, 8), &params());
        server.join().unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let err = RemoteDetector::new(RemoteConfig::new("http://localhost/predict", " "));
        assert!(matches!(err, Err(DetectError::Config(_))));
    }
}
