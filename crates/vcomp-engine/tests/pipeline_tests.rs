//! End-to-end composition tests against generated media.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tempfile::TempDir;
use vcomp_engine::{CompositionEngine, EngineConfig, RenderStatus, TemplateRegistry};
use vcomp_media::{probe_video, EvaluatorConfig, QualityEvaluator};
use vcomp_models::{
    AudioTrack, Caption, CompositionRequest, QualityThresholds, RenderMetadata, Resolution,
    TemplateConfig, VideoSegment,
};

fn ffmpeg(args: &[&str]) {
    let status = Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-loglevel", "error"])
        .args(args)
        .status()
        .expect("Failed to run ffmpeg");
    assert!(status.success(), "ffmpeg {:?} failed", args);
}

fn test_clip(dir: &Path, name: &str, pattern: &str, seconds: u32) -> PathBuf {
    let path = dir.join(name);
    let source = format!("{pattern}=size=1280x720:rate=30:duration={seconds}");
    ffmpeg(&[
        "-f", "lavfi", "-i", &source,
        "-c:v", "libx264", "-pix_fmt", "yuv420p",
        path.to_str().unwrap(),
    ]);
    path
}

fn test_audio(dir: &Path, seconds: u32) -> PathBuf {
    let path = dir.join("voice.m4a");
    let source = format!("sine=frequency=440:duration={seconds}");
    ffmpeg(&["-f", "lavfi", "-i", &source, "-c:a", "aac", path.to_str().unwrap()]);
    path
}

fn engine(work_dir: &Path, max_retries: u32, thresholds: QualityThresholds) -> CompositionEngine {
    let config = EngineConfig {
        work_dir: work_dir.to_path_buf(),
        max_retries,
        thresholds,
        ..Default::default()
    };
    CompositionEngine::new(Arc::new(config), Arc::new(TemplateRegistry::with_builtins()))
}

fn request(dir: &Path) -> CompositionRequest {
    let clip_a = test_clip(dir, "a.mp4", "testsrc2", 6);
    let clip_b = test_clip(dir, "b.mp4", "mandelbrot", 6);
    let audio = test_audio(dir, 8);

    CompositionRequest::new(
        AudioTrack {
            path: audio,
            duration: 8.0,
        },
        vec![VideoSegment::new(clip_a, 5.0), VideoSegment::new(clip_b, 5.0)],
        dir.join("out/final.mp4"),
    )
    .with_captions(vec![
        Caption::new("First line", 0.5, 3.0),
        Caption::new("Second line", 3.5, 7.5),
    ])
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_compose_approved_with_exports() {
    let dir = TempDir::new().unwrap();
    let req = request(dir.path()).with_platforms(vec!["tiktok".to_string()]);

    let result = engine(dir.path(), 2, QualityThresholds::permissive())
        .compose(req)
        .await
        .expect("composition failed");

    assert_eq!(result.status, RenderStatus::Approved);
    assert!(result.quality_validated);
    assert_eq!(result.retry_count, 0);

    let info = probe_video(&result.output_path).await.unwrap();
    assert_eq!((info.width, info.height), (1080, 1920));
    let video_duration = info.video_duration.unwrap_or(info.duration);
    assert!(
        (video_duration - 8.0).abs() <= 1.0 / 30.0 + 1e-3,
        "video duration {}",
        video_duration
    );

    assert_eq!(result.exports.len(), 1);
    assert!(result.exports[0].path.as_ref().unwrap().exists());

    assert!(result.thumbnail.as_ref().unwrap().exists());

    let raw = std::fs::read_to_string(&result.metadata_path).unwrap();
    let metadata: RenderMetadata = serde_json::from_str(&raw).unwrap();
    assert!(metadata.quality_validated);
    assert_eq!(metadata.segments.len(), 2);
    assert_eq!(metadata.scheduled.len(), 2);
    assert_eq!(metadata.exports.len(), 1);
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_unreachable_gate_exhausts_and_skips_export() {
    let dir = TempDir::new().unwrap();
    let req = request(dir.path()).with_platforms(vec!["instagram_reels".to_string()]);
    let thresholds = QualityThresholds {
        overall: 1.01,
        ..QualityThresholds::permissive()
    };

    let result = engine(dir.path(), 1, thresholds)
        .compose(req)
        .await
        .expect("composition failed");

    assert_eq!(result.status, RenderStatus::Exhausted);
    assert!(!result.quality_validated);
    assert_eq!(result.attempts, 2);
    assert_eq!(result.retry_count, 1);
    assert!(result.output_path.exists());
    assert!(result.exports.is_empty());

    let raw = std::fs::read_to_string(&result.metadata_path).unwrap();
    assert!(raw.contains("\"quality_validated\": false"));
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_evaluation_is_deterministic_and_bounded() {
    let dir = TempDir::new().unwrap();
    let result = engine(dir.path(), 0, QualityThresholds::permissive())
        .compose(request(dir.path()))
        .await
        .expect("composition failed");

    let evaluator = QualityEvaluator::new(EvaluatorConfig::default());
    let first = evaluator.evaluate(&result.output_path).await.unwrap();
    let second = evaluator.evaluate(&result.output_path).await.unwrap();
    assert_eq!(first, second);

    for (gate, score) in first.components() {
        assert!((0.0..=1.0).contains(&score), "{gate} = {score}");
    }
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_square_template_scored_against_its_own_size() {
    let dir = TempDir::new().unwrap();
    let mut templates = TemplateRegistry::with_builtins();
    let mut square = TemplateConfig::named("square");
    square.resolution = Resolution::new(1080, 1080);
    templates.register(square).unwrap();

    let config = EngineConfig {
        work_dir: dir.path().to_path_buf(),
        max_retries: 0,
        thresholds: QualityThresholds::permissive(),
        ..Default::default()
    };
    let engine = CompositionEngine::new(Arc::new(config), Arc::new(templates));
    let result = engine
        .compose(request(dir.path()).with_template("square"))
        .await
        .expect("composition failed");

    let metrics = result.metrics.unwrap();
    assert_eq!(metrics.resolution_score, 1.0);
    assert!(metrics.platform_compliance);
}
