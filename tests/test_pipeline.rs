extern crate woody_detect;

use std::sync::Arc;

use image::{Rgb, RgbImage};

use woody_detect::{
    Annotator, ClassLabelTable, DetectionBox, DetectionPipeline, InferenceError, LoadError, ModelCache,
    ModelProvisioner,
};

mod stubs;
use stubs::{raw, FixedDetector, StubFetcher, StubLoader};

fn artifact_dir() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("best.onnx");
    std::fs::write(&path, b"weights").unwrap();
    (dir, path)
}

fn pipeline_with(loader: Arc<StubLoader>, path: &std::path::Path) -> DetectionPipeline {
    let provisioner = ModelProvisioner::new("stub://model").with_fetcher(Arc::new(StubFetcher::offline()));
    let cache = ModelCache::new(provisioner, loader, path);
    DetectionPipeline::new(Arc::new(cache), ClassLabelTable::default(), Annotator::without_font())
}

fn test_image() -> RgbImage {
    RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 3) as u8, (y * 3) as u8, 90]))
}

#[test]
fn labels_detections_at_default_threshold() {
    let (_dir, path) = artifact_dir();
    let detector = FixedDetector::new(vec![
        raw(9, 0.81, (10., 10., 50., 50.)),
        raw(99, 0.20, (5., 5., 8., 8.)),
    ]);
    let pipeline = pipeline_with(Arc::new(StubLoader::new(detector)), &path);

    let image = test_image();
    let (annotated, detections) = pipeline.detect(&image, 0.25).unwrap();

    assert_eq!(detections.len(), 1);
    let det = &detections.as_slice()[0];
    assert_eq!(det.label, "table");
    assert_eq!(det.class_id, 9);
    assert!((det.confidence - 0.81).abs() < 1e-6);
    assert_eq!(det.bbox, DetectionBox::new(10., 10., 50., 50.));

    assert_eq!(annotated.dimensions(), image.dimensions());
    assert_ne!(annotated, image);
    assert_eq!(image, test_image());
}

#[test]
fn unknown_class_index_gets_fallback_label() {
    let (_dir, path) = artifact_dir();
    let detector = FixedDetector::new(vec![raw(99, 0.20, (5., 5., 8., 8.))]);
    let pipeline = pipeline_with(Arc::new(StubLoader::new(detector)), &path);

    let (_, detections) = pipeline.detect(&test_image(), 0.1).unwrap();
    assert_eq!(detections.as_slice()[0].label, "Class 99");
}

#[test]
fn empty_result_leaves_image_untouched() {
    let (_dir, path) = artifact_dir();
    let pipeline = pipeline_with(Arc::new(StubLoader::new(FixedDetector::new(Vec::new()))), &path);

    let image = test_image();
    let (annotated, detections) = pipeline.detect(&image, 0.25).unwrap();
    assert!(detections.is_empty());
    assert_eq!(annotated, image);
    assert_eq!(detections.summary().mean_confidence, None);
}

#[test]
fn preserves_detector_order() {
    let (_dir, path) = artifact_dir();
    let detector = FixedDetector::new(vec![
        raw(0, 0.30, (1., 1., 5., 5.)),
        raw(10, 0.90, (20., 20., 30., 30.)),
        raw(10, 0.60, (21., 21., 31., 31.)),
    ]);
    let pipeline = pipeline_with(Arc::new(StubLoader::new(detector)), &path);

    let (_, detections) = pipeline.detect(&test_image(), 0.25).unwrap();
    let confidences: Vec<f32> = detections.iter().map(|d| d.confidence).collect();
    assert_eq!(confidences, vec![0.30, 0.90, 0.60]);
    let labels: Vec<&str> = detections.iter().map(|d| d.label.as_str()).collect();
    assert_eq!(labels, vec!["Chair", "wood", "wood"]);
}

#[test]
fn raising_threshold_gives_a_subset() {
    let (_dir, path) = artifact_dir();
    let detector = FixedDetector::new(vec![
        raw(1, 0.15, (0., 0., 10., 10.)),
        raw(2, 0.45, (10., 10., 20., 20.)),
        raw(3, 0.75, (20., 20., 30., 30.)),
        raw(4, 0.95, (30., 30., 40., 40.)),
    ]);
    let pipeline = pipeline_with(Arc::new(StubLoader::new(detector)), &path);
    let image = test_image();

    let (_, low) = pipeline.detect(&image, 0.2).unwrap();
    let (_, high) = pipeline.detect(&image, 0.7).unwrap();

    assert!(high.len() <= low.len());
    for det in &high {
        assert!(det.confidence >= 0.7);
        assert!(low.iter().any(|l| l == det));
    }
    assert!(low.iter().all(|d| d.confidence >= 0.2));
}

#[test]
fn out_of_range_thresholds_are_clamped_and_nan_rejected() {
    let (_dir, path) = artifact_dir();
    let detector = Arc::new(FixedDetector::new(vec![raw(9, 1.0, (0., 0., 4., 4.))]));
    let loader = StubLoader {
        handle: detector.clone(),
        ..StubLoader::new(FixedDetector::new(Vec::new()))
    };
    let pipeline = pipeline_with(Arc::new(loader), &path);
    let image = test_image();

    let (_, dets) = pipeline.detect(&image, 7.0).unwrap();
    assert_eq!(dets.len(), 1);
    pipeline.detect(&image, -1.0).unwrap();
    assert_eq!(*detector.thresholds.lock(), vec![1.0, 0.0]);

    assert!(matches!(
        pipeline.detect(&image, f32::NAN),
        Err(InferenceError::InvalidThreshold(_))
    ));
}

#[test]
fn empty_image_is_rejected() {
    let (_dir, path) = artifact_dir();
    let loader = Arc::new(StubLoader::new(FixedDetector::new(Vec::new())));
    let pipeline = pipeline_with(loader.clone(), &path);

    assert!(matches!(
        pipeline.detect(&RgbImage::new(0, 0), 0.25),
        Err(InferenceError::InvalidImage { width: 0, height: 0 })
    ));
    assert_eq!(loader.calls(), 0);
}

#[test]
fn load_failure_surfaces_and_a_later_call_recovers() {
    let (_dir, path) = artifact_dir();
    let detector = FixedDetector::new(vec![raw(6, 0.5, (2., 2., 9., 9.))]);
    let loader = Arc::new(StubLoader::new(detector).failing_first(1));
    let pipeline = pipeline_with(loader.clone(), &path);
    let image = test_image();

    match pipeline.detect(&image, 0.25) {
        Err(InferenceError::Load(LoadError::InvalidModel { .. })) => {}
        other => panic!("expected a load failure, got {:?}", other.map(|(_, d)| d)),
    }
    assert!(!pipeline.cache().is_loaded());

    let (_, detections) = pipeline.detect(&image, 0.25).unwrap();
    assert_eq!(detections.as_slice()[0].label, "coaster");
    assert_eq!(loader.calls(), 2);
    assert!(pipeline.cache().is_loaded());
}
