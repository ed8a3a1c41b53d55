//! Command runners wiring configuration, backends, the annotator, and the
//! preview server together.

use std::{
    fs,
    sync::{Once, mpsc},
};

use actix_web::web;
use annotate::{Detection, annotate};
use anyhow::{Context, Result};
use tracing::{info, info_span, warn};

use crate::vision::{
    backend::build_detector,
    config::{AnnotateConfig, DetectConfig, ServeConfig},
    data::NO_DETECTIONS_MESSAGE,
    processing::{Annotated, detect_and_annotate},
    server::{PreviewServer, ServerState, spawn_preview_server},
    telemetry,
};

/// Run the preview server until Ctrl+C.
pub fn serve(config: ServeConfig) -> Result<()> {
    static CTRL_HANDLER: Once = Once::new();

    let _ = telemetry::init_metrics_recorder();
    let span = info_span!(
        "wildlife.serve",
        bind = %config.bind,
        jpeg_quality = config.jpeg_quality,
        conf = config.backend.params.confidence,
        iou = config.backend.params.iou
    );
    let _span_guard = span.enter();

    let detector = build_detector(&config.backend.backend)?;
    let state = web::Data::new(ServerState::new(
        detector.clone(),
        config.style,
        config.backend,
        config.jpeg_quality,
    ));
    let server = spawn_preview_server(config.bind, state)?;

    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let mut installed = false;
    CTRL_HANDLER.call_once(|| {
        match ctrlc::set_handler(move || {
            let _ = stop_tx.send(());
        }) {
            Ok(()) => installed = true,
            Err(err) => warn!("Failed to install Ctrl+C handler: {err}"),
        }
    });

    info!("Serving {} detector, press Ctrl+C to stop", detector.name());
    wait_for_shutdown(server, installed.then_some(stop_rx));

    // The blocking HTTP client must be dropped outside the Actix runtime.
    drop(detector);
    Ok(())
}

/// Stop the server on the first signal, or wait for it to exit when no
/// signal source exists.
fn wait_for_shutdown(server: PreviewServer, stop_rx: Option<mpsc::Receiver<()>>) {
    match stop_rx {
        Some(stop_rx) => {
            let _ = stop_rx.recv();
            info!("Shutting down preview server");
            server.stop();
        }
        None => {
            warn!("No Ctrl+C handler; running until the server exits");
            server.wait();
        }
    }
}

/// Detect on one photo, write the annotated copy, and print the results.
pub fn detect_file(config: DetectConfig) -> Result<()> {
    let image = image::open(&config.image)
        .with_context(|| format!("Failed to open {}", config.image.display()))?
        .to_rgb8();
    let detector = build_detector(&config.backend.backend)?;
    let Annotated { set, image: annotated } =
        detect_and_annotate(detector.as_ref(), &config.style, &image, &config.backend.params)
            .with_context(|| format!("Detection failed for {}", config.image.display()))?;

    annotated
        .save(&config.out)
        .with_context(|| format!("Failed to write {}", config.out.display()))?;
    info!("wrote {}", config.out.display());

    if config.json {
        println!("{}", serde_json::to_string_pretty(&set)?);
    } else {
        print_summary(&set.detections);
    }
    Ok(())
}

/// Draw detections read from a JSON file onto a photo.
pub fn annotate_file(config: AnnotateConfig) -> Result<()> {
    let image = image::open(&config.image)
        .with_context(|| format!("Failed to open {}", config.image.display()))?
        .to_rgb8();
    let text = fs::read_to_string(&config.detections)
        .with_context(|| format!("Failed to read {}", config.detections.display()))?;
    let raw: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", config.detections.display()))?;
    let detections = ml_core::parse_response(&raw, &config.response_keys);

    let annotated = annotate(&image, &detections, &config.style)?;
    annotated
        .save(&config.out)
        .with_context(|| format!("Failed to write {}", config.out.display()))?;
    info!("wrote {}", config.out.display());

    print_summary(&detections);
    Ok(())
}

fn print_summary(detections: &[Detection]) {
    if detections.is_empty() {
        println!("{NO_DETECTIONS_MESSAGE}");
        return;
    }
    for detection in detections {
        println!("{}", detection.summary_line());
    }
}

#[cfg(test)]
mod tests {
    use std::{
        net::{SocketAddr, TcpStream},
        sync::Arc,
        thread,
        time::Duration,
    };

    use super::*;
    use crate::vision::{processing::tests::StubDetector, server::tests::state_with};

    fn local_server() -> PreviewServer {
        let bind: SocketAddr = "127.0.0.1:0".parse().unwrap();
        spawn_preview_server(bind, state_with(Arc::new(StubDetector::deer()))).unwrap()
    }

    #[test]
    fn stop_signal_shuts_the_server_down() {
        let server = local_server();
        let (stop_tx, stop_rx) = mpsc::channel();
        stop_tx.send(()).unwrap();
        wait_for_shutdown(server, Some(stop_rx));
    }

    #[test]
    fn without_a_signal_source_the_server_keeps_running() {
        let server = local_server();
        let waiter = thread::spawn(move || wait_for_shutdown(server, None));
        thread::sleep(Duration::from_millis(300));
        assert!(!waiter.is_finished());
    }

    #[test]
    fn stopped_server_releases_its_port() {
        let bind: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let reserved = std::net::TcpListener::bind(bind).unwrap();
        let addr = reserved.local_addr().unwrap();
        drop(reserved);
        let server =
            spawn_preview_server(addr, state_with(Arc::new(StubDetector::deer()))).unwrap();
        assert!(TcpStream::connect(addr).is_ok());
        let (stop_tx, stop_rx) = mpsc::channel();
        stop_tx.send(()).unwrap();
        wait_for_shutdown(server, Some(stop_rx));
        assert!(TcpStream::connect(addr).is_err());
    }
}
