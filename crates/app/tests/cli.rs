//! Integration tests for the `wildlife` binary.

use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use image::{Rgb, RgbImage};
use predicates::prelude::*;
use tempfile::tempdir;

const BACKGROUND: Rgb<u8> = Rgb([30, 30, 30]);

fn write_photo(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("deer.png");
    RgbImage::from_pixel(100, 100, BACKGROUND).save(&path).unwrap();
    path
}

#[test]
fn annotate_writes_image_and_prints_lines() {
    let dir = tempdir().unwrap();
    let photo = write_photo(dir.path());
    let detections = dir.path().join("detections.json");
    fs::write(
        &detections,
        r#"{"predictions": [{"name": "deer", "confidence": 0.87,
            "box": {"x1": 0.1, "y1": 0.1, "x2": 0.5, "y2": 0.5}}]}"#,
    )
    .unwrap();
    let out = dir.path().join("out.png");

    let mut cmd = cargo_bin_cmd!("wildlife");
    cmd.arg("annotate")
        .arg("--image")
        .arg(&photo)
        .arg("--detections")
        .arg(&detections)
        .arg("--out")
        .arg(&out);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("deer (0.87)"));

    let annotated = image::open(&out).unwrap().to_rgb8();
    assert_eq!(annotated.dimensions(), (100, 100));
    assert_eq!(*annotated.get_pixel(10, 45), Rgb([0, 255, 0]));
    assert_eq!(*annotated.get_pixel(30, 45), BACKGROUND);
}

#[test]
fn annotate_defaults_output_next_to_input() {
    let dir = tempdir().unwrap();
    let photo = write_photo(dir.path());
    let detections = dir.path().join("empty.json");
    fs::write(&detections, r#"{"predictions": []}"#).unwrap();

    let mut cmd = cargo_bin_cmd!("wildlife");
    cmd.arg("annotate")
        .arg("--image")
        .arg(&photo)
        .arg("--detections")
        .arg(&detections);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("No detections found"));

    let annotated = image::open(dir.path().join("deer_annotated.png"))
        .unwrap()
        .to_rgb8();
    assert_eq!(annotated, RgbImage::from_pixel(100, 100, BACKGROUND));
}

#[test]
fn annotate_rejects_missing_detections_file() {
    let dir = tempdir().unwrap();
    let photo = write_photo(dir.path());

    let mut cmd = cargo_bin_cmd!("wildlife");
    cmd.arg("annotate")
        .arg("--image")
        .arg(&photo)
        .arg("--detections")
        .arg(dir.path().join("missing.json"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("missing.json"));
}

#[test]
fn detect_without_credentials_fails() {
    let dir = tempdir().unwrap();
    let photo = write_photo(dir.path());

    let mut cmd = cargo_bin_cmd!("wildlife");
    cmd.env_remove("ULTRALYTICS_DEPLOY_URL")
        .env_remove("ULTRALYTICS_DEPLOY_API_KEY")
        .arg("detect")
        .arg("--image")
        .arg(&photo)
        .arg("--endpoint")
        .arg("http://127.0.0.1:9/predict");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("API key"));
}

#[test]
fn help_lists_subcommands() {
    let mut cmd = cargo_bin_cmd!("wildlife");
    cmd.arg("--help");
    cmd.assert().success().stdout(
        predicate::str::contains("serve")
            .and(predicate::str::contains("detect"))
            .and(predicate::str::contains("annotate")),
    );
}
