//! Actix Web preview server: the capture/upload page and the detection API.
//!
//! The server runs on a dedicated thread with its own Actix system. Detection
//! requests are pushed onto the blocking pool since backends block on network
//! or model inference.

use std::{
    net::SocketAddr,
    sync::{
        Arc, mpsc,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use actix_web::{
    App, HttpResponse, HttpServer,
    http::header,
    web::{self, Bytes},
};
use annotate::AnnotationStyle;
use anyhow::{Context, Result, anyhow};
use ml_core::Detector;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::vision::{
    config::BackendSettings,
    data::{
        DetectionsResponse, ImageSource, RESULT_HISTORY_CAPACITY, ResultHistory, ResultPacket,
        SharedResult,
    },
    processing::process_upload,
    telemetry,
};

/// Largest accepted upload body.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Shared state backing HTTP handlers.
pub(crate) struct ServerState {
    pub(crate) latest: SharedResult,
    pub(crate) history: ResultHistory,
    pub(crate) detector: Arc<dyn Detector>,
    pub(crate) style: Arc<AnnotationStyle>,
    pub(crate) settings: BackendSettings,
    pub(crate) jpeg_quality: u8,
    pub(crate) next_frame: AtomicU64,
}

impl ServerState {
    pub(crate) fn new(
        detector: Arc<dyn Detector>,
        style: AnnotationStyle,
        settings: BackendSettings,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            latest: SharedResult::default(),
            history: ResultHistory::default(),
            detector,
            style: Arc::new(style),
            settings,
            jpeg_quality,
            next_frame: AtomicU64::new(0),
        }
    }

    /// Publish a finished result as the latest one and append it to history.
    fn record(&self, packet: ResultPacket) {
        if let Ok(mut buffer) = self.history.lock() {
            if buffer.len() >= RESULT_HISTORY_CAPACITY {
                buffer.pop_front();
            }
            buffer.push_back(packet.clone());
        }
        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(packet);
        }
    }
}

#[derive(Default)]
/// Handle for the preview server thread.
pub(crate) struct PreviewServer {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl PreviewServer {
    /// Signal the server to stop and block until the thread exits.
    pub(crate) fn stop(self) {
        if let Some(tx) = self.shutdown {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle {
            let _ = handle.join();
        }
    }

    /// Block until the server thread exits on its own.
    pub(crate) fn wait(self) {
        // A dropped sender stops the server, so hold it across the join.
        let PreviewServer {
            shutdown: _shutdown,
            handle,
        } = self;
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

#[derive(Deserialize)]
struct DetectQuery {
    conf: Option<f32>,
    iou: Option<f32>,
    #[serde(default)]
    source: ImageSource,
}

#[derive(Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum FrameKind {
    Input,
    #[default]
    Annotated,
}

#[derive(Deserialize)]
struct FrameQuery {
    frame: Option<u64>,
    #[serde(default)]
    kind: FrameKind,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Register the page, API routes, and upload limit.
pub(crate) fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(MAX_UPLOAD_BYTES))
        .route("/", web::get().to(index_route))
        .route("/detect", web::post().to(detect_handler))
        .route("/frame.jpg", web::get().to(frame_handler))
        .route("/detections", web::get().to(detections_handler))
        .route("/metrics", web::get().to(metrics_handler));
}

/// Spawn the preview server thread and return a handle that can stop it.
///
/// Returns once the listener is bound, so bind failures surface here.
pub(crate) fn spawn_preview_server(
    bind: SocketAddr,
    state: web::Data<ServerState>,
) -> Result<PreviewServer> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let (ready_tx, ready_rx) = mpsc::channel::<std::io::Result<Vec<SocketAddr>>>();
    let handle = std::thread::Builder::new()
        .name("preview-server".into())
        .spawn(move || {
            if let Err(err) = actix_web::rt::System::new().block_on(async move {
                let bound = HttpServer::new(move || {
                    App::new().app_data(state.clone()).configure(configure)
                })
                .disable_signals()
                .bind(bind);
                let server = match bound {
                    Ok(server) => {
                        let _ = ready_tx.send(Ok(server.addrs()));
                        server.run()
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return Ok(());
                    }
                };

                let srv_handle = server.handle();
                actix_web::rt::spawn(async move {
                    let _ = shutdown_rx.await;
                    srv_handle.stop(true).await;
                });

                server.await
            }) {
                error!("HTTP server error: {err}");
            }
        })
        .context("Failed to spawn preview server thread")?;

    let preview = PreviewServer {
        shutdown: Some(shutdown_tx),
        handle: Some(handle),
    };
    match ready_rx.recv() {
        Ok(Ok(addrs)) => {
            for addr in addrs {
                info!("preview server listening on http://{addr}");
            }
            Ok(preview)
        }
        Ok(Err(err)) => {
            preview.stop();
            Err(err).with_context(|| format!("Failed to bind preview server to {bind}"))
        }
        Err(_) => {
            preview.stop();
            Err(anyhow!("preview server thread exited before binding"))
        }
    }
}

fn error_response(mut builder: actix_web::HttpResponseBuilder, message: String) -> HttpResponse {
    builder.json(ErrorBody { error: message })
}

/// Serve the page with this server's default thresholds filled in.
async fn index_route(state: web::Data<ServerState>) -> HttpResponse {
    let params = &state.settings.params;
    let page = crate::html::index::INDEX_HTML
        .replace("{{DEFAULT_CONF}}", &format!("{:.2}", params.confidence))
        .replace("{{DEFAULT_IOU}}", &format!("{:.2}", params.iou))
        .replace("{{BACKEND}}", state.detector.name());
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(page)
}

/// Detect on the uploaded photo, store the result, and return its detections.
async fn detect_handler(
    query: web::Query<DetectQuery>,
    body: Bytes,
    state: web::Data<ServerState>,
) -> HttpResponse {
    let started = Instant::now();
    let query = query.into_inner();
    if body.is_empty() {
        metrics::counter!("wildlife_requests_total", "outcome" => "rejected").increment(1);
        return error_response(HttpResponse::BadRequest(), "No image received".into());
    }
    let params = match state.settings.params_with(query.conf, query.iou) {
        Ok(params) => params,
        Err(err) => {
            metrics::counter!("wildlife_requests_total", "outcome" => "rejected").increment(1);
            return error_response(HttpResponse::BadRequest(), err.to_string());
        }
    };

    let frame_number = state.next_frame.fetch_add(1, Ordering::Relaxed) + 1;
    let source = query.source;
    let worker = state.clone();
    let outcome = web::block(move || {
        process_upload(
            worker.detector.as_ref(),
            &worker.style,
            &body,
            &params,
            source,
            frame_number,
            worker.jpeg_quality,
        )
    })
    .await;

    let packet = match outcome {
        Ok(Ok(packet)) => packet,
        Ok(Err(err)) if err.is_client_error() => {
            warn!("rejected {source} image #{frame_number}: {err}");
            metrics::counter!("wildlife_requests_total", "outcome" => "rejected").increment(1);
            return error_response(
                HttpResponse::BadRequest(),
                format!("{:#}", anyhow::Error::from(err)),
            );
        }
        Ok(Err(err)) => {
            let err = anyhow::Error::from(err);
            error!("detection failed for {source} image #{frame_number}: {err:#}");
            metrics::counter!("wildlife_requests_total", "outcome" => "failed").increment(1);
            return error_response(HttpResponse::BadGateway(), format!("{err:#}"));
        }
        Err(err) => {
            error!("detection worker failed: {err}");
            metrics::counter!("wildlife_requests_total", "outcome" => "failed").increment(1);
            return error_response(HttpResponse::InternalServerError(), err.to_string());
        }
    };

    info!(
        "{source} image #{frame_number}: {} detection(s) via {}",
        packet.detections.len(),
        packet.backend
    );
    metrics::counter!("wildlife_requests_total", "outcome" => "ok").increment(1);
    metrics::histogram!("wildlife_request_seconds").record(started.elapsed().as_secs_f64());

    let response = HttpResponse::Ok().json(DetectionsResponse::from(&packet));
    state.record(packet);
    response
}

/// Fetch the latest result from the shared pointer.
fn latest_result(shared: &SharedResult) -> Option<ResultPacket> {
    match shared.lock() {
        Ok(guard) => guard.clone(),
        Err(_) => None,
    }
}

/// Retrieve a historical result by sequence number.
fn history_result(history: &ResultHistory, frame_number: u64) -> Option<ResultPacket> {
    match history.lock() {
        Ok(buffer) => buffer
            .iter()
            .find(|packet| packet.frame_number == frame_number)
            .cloned(),
        Err(_) => None,
    }
}

fn jpeg_of(packet: ResultPacket, kind: FrameKind) -> Vec<u8> {
    match kind {
        FrameKind::Input => packet.input_jpeg,
        FrameKind::Annotated => packet.annotated_jpeg,
    }
}

/// Return a stored JPEG by sequence number or the latest one.
async fn frame_handler(
    query: web::Query<FrameQuery>,
    state: web::Data<ServerState>,
) -> HttpResponse {
    if let Some(requested) = query.frame {
        if let Some(packet) = history_result(&state.history, requested) {
            return HttpResponse::Ok()
                .content_type("image/jpeg")
                .body(jpeg_of(packet, query.kind));
        } else if let Some(latest) = latest_result(&state.latest) {
            return HttpResponse::Ok()
                .append_header((
                    header::WARNING,
                    format!(
                        "299 wildlife \"frame {} not buffered; returning latest {}\"",
                        requested, latest.frame_number
                    ),
                ))
                .content_type("image/jpeg")
                .body(jpeg_of(latest, query.kind));
        } else {
            return HttpResponse::NoContent().finish();
        }
    }

    match latest_result(&state.latest) {
        Some(packet) => HttpResponse::Ok()
            .content_type("image/jpeg")
            .body(jpeg_of(packet, query.kind)),
        None => HttpResponse::NoContent().finish(),
    }
}

/// Return the most recent detection result as JSON.
async fn detections_handler(state: web::Data<ServerState>) -> HttpResponse {
    let guard = match state.latest.lock() {
        Ok(guard) => guard,
        Err(err) => return HttpResponse::InternalServerError().body(err.to_string()),
    };
    match guard.as_ref() {
        Some(packet) => HttpResponse::Ok().json(DetectionsResponse::from(packet)),
        None => HttpResponse::NoContent().finish(),
    }
}

/// Prometheus text exposition.
async fn metrics_handler() -> HttpResponse {
    match telemetry::prometheus_handle() {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::ServiceUnavailable().body("metrics recorder not installed"),
    }
}
