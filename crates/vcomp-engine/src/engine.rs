//! Composition engine: one request from inputs to approved output.
//!
//! Validation and scheduling run first and fail fast. Rendering runs under
//! the retry controller. Export, thumbnail and sidecar follow once a file
//! exists.

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, Instrument};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::logging::RenderLogger;
use crate::metadata::{build_metadata, summarize_export, write_sidecar};
use crate::metrics;
use crate::retry::{AttemptRecord, AttemptRunner, RenderStatus, RetryController};
use crate::scheduler::{filter_segments, SegmentScheduler};
use crate::templates::TemplateRegistry;
use vcomp_media::thumbnail::{generate_thumbnail, thumbnail_name};
use vcomp_media::{
    probe_duration, probe_video, CompositionInput, Compositor, MediaError, MediaResult,
    PlatformExporter, QualityEvaluator, Renderer, SourceInfo,
};
use vcomp_models::{
    AudioTrack, Caption, CompositionRequest, ExportSummary, PlatformProfile, QualityMetrics,
    RequestId, TemplateConfig, VideoSegment,
};

/// Declared and probed audio lengths further apart than this are logged.
const AUDIO_DRIFT_WARN_SECS: f64 = 0.25;

/// What the caller gets back for a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionResult {
    pub request_id: RequestId,
    pub status: RenderStatus,
    pub quality_validated: bool,
    pub output_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<QualityMetrics>,
    pub attempts: u32,
    pub retry_count: u32,
    pub exports: Vec<ExportSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<PathBuf>,
    pub metadata_path: PathBuf,
    pub history: Vec<AttemptRecord>,
}

/// Renders attempts for one scheduled request.
struct PipelineRunner<'a> {
    compositor: Compositor,
    renderer: &'a Renderer,
    evaluator: &'a QualityEvaluator,
    segments: &'a [VideoSegment],
    sources: &'a [SourceInfo],
    audio: &'a AudioTrack,
    captions: &'a [Caption],
    attempt_dir: &'a Path,
    stem: &'a str,
}

#[async_trait]
impl<'a> AttemptRunner for PipelineRunner<'a> {
    async fn render(&self, template: &TemplateConfig, attempt: u32) -> EngineResult<PathBuf> {
        let timeline = self.compositor.compose(CompositionInput {
            segments: self.segments,
            sources: self.sources,
            audio: self.audio,
            captions: self.captions,
            template,
            fps: self.renderer.settings().fps,
        })?;

        let output = self
            .attempt_dir
            .join(format!("{}.attempt{}.mp4", self.stem, attempt));
        let rendered = self.renderer.render(&timeline, &output).await?;
        metrics::record_render_duration(&template.name, rendered.elapsed.as_secs_f64());
        Ok(rendered.path)
    }

    async fn evaluate(&self, path: &Path) -> EngineResult<QualityMetrics> {
        Ok(self.evaluator.evaluate(path).await?)
    }
}

/// Composition engine.
///
/// Cheap to clone; configuration and templates are shared read-only.
#[derive(Debug, Clone)]
pub struct CompositionEngine {
    config: Arc<EngineConfig>,
    templates: Arc<TemplateRegistry>,
    scheduler: SegmentScheduler,
    renderer: Renderer,
    evaluator: QualityEvaluator,
    exporter: PlatformExporter,
}

impl CompositionEngine {
    pub fn new(config: Arc<EngineConfig>, templates: Arc<TemplateRegistry>) -> Self {
        let renderer = Renderer::new(config.render_settings());
        let evaluator = QualityEvaluator::new(config.evaluator_config());
        let exporter = PlatformExporter::new()
            .with_timeout(config.render_timeout_secs)
            .with_concurrency(config.export_concurrency)
            .with_preset(config.preset.clone());
        Self {
            config,
            templates,
            scheduler: SegmentScheduler::new(),
            renderer,
            evaluator,
            exporter,
        }
    }

    /// Build config and templates from the environment.
    pub fn from_env() -> EngineResult<Self> {
        let config = EngineConfig::from_env()?;
        let templates = TemplateRegistry::load(config.templates_file.as_deref())?;
        Ok(Self::new(Arc::new(config), Arc::new(templates)))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    /// Compose, render, validate and distribute one request.
    pub async fn compose(&self, request: CompositionRequest) -> EngineResult<CompositionResult> {
        let logger = RenderLogger::new(&request.id, "compose");
        let span = logger.create_span();
        self.compose_inner(request, logger).instrument(span).await
    }

    async fn compose_inner(
        &self,
        request: CompositionRequest,
        logger: RenderLogger,
    ) -> EngineResult<CompositionResult> {
        let started = Instant::now();
        logger.log_start(&format!(
            "{} segments, template '{}', output {}",
            request.segments.len(),
            request.template,
            request.output_path.display()
        ));

        // Input validation: nothing renders until every input checks out
        if !request.audio.path.exists() {
            return Err(EngineError::MissingInput(request.audio.path.clone()));
        }
        if !request.has_valid_audio_duration() {
            return Err(EngineError::invalid_input(format!(
                "audio duration must be positive, got {}",
                request.audio.duration
            )));
        }
        request.validate_captions()?;
        let template = self.templates.get(&request.template)?;
        let profiles = request
            .platforms
            .iter()
            .map(|id| PlatformProfile::builtin(id))
            .collect::<Result<Vec<_>, _>>()?;

        let candidates = filter_segments(request.segments.clone());
        let schedule = self.scheduler.schedule(request.audio.duration, candidates)?;
        logger.log_progress(&format!(
            "scheduled {} segments ({} dropped) over {:.2}s",
            schedule.segments.len(),
            schedule.dropped,
            request.audio.duration
        ));

        let probed = audio_duration(&request.audio.path, probe_duration(&request.audio.path).await)?;
        if (probed - request.audio.duration).abs() > AUDIO_DRIFT_WARN_SECS {
            logger.log_warning(&format!(
                "declared audio duration {:.3}s differs from probed {:.3}s",
                request.audio.duration, probed
            ));
        }

        let mut sources = Vec::with_capacity(schedule.segments.len());
        for segment in &schedule.segments {
            let info = probe_video(&segment.path).await?;
            sources.push(SourceInfo::from(&info));
        }

        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        let attempt_dir = tempfile::Builder::new()
            .prefix(&format!("vcomp-{}-", request.id))
            .tempdir_in(&self.config.work_dir)?;
        let stem = request.output_stem();

        let evaluator = self
            .evaluator
            .clone()
            .with_reference_resolution(template.resolution);
        let runner = PipelineRunner {
            compositor: Compositor::new(attempt_dir.path()),
            renderer: &self.renderer,
            evaluator: &evaluator,
            segments: &schedule.segments,
            sources: &sources,
            audio: &request.audio,
            captions: &request.captions,
            attempt_dir: attempt_dir.path(),
            stem: &stem,
        };

        let thresholds = request.thresholds.unwrap_or(self.config.thresholds);
        let max_retries = request.max_retries.unwrap_or(self.config.max_retries);
        let outcome = RetryController::new(Arc::clone(&template), thresholds, max_retries)
            .with_request_id(request.id.to_string())
            .run(&runner)
            .await?;

        let rendered = outcome
            .output_path
            .clone()
            .ok_or(EngineError::NoRenderedOutput {
                attempts: outcome.attempts,
            })?;
        let output = request.output_path.clone();
        move_file(&rendered, &output).await?;

        if outcome.quality_validated() {
            logger.log_progress(&format!(
                "approved after {} attempt(s)",
                outcome.attempts
            ));
        } else {
            logger.log_warning(&format!(
                "returning unapproved render after {} attempt(s)",
                outcome.attempts
            ));
        }

        let exports = self
            .export(&output, &profiles, outcome.quality_validated(), &logger)
            .await;

        let thumbnail = match &request.thumbnail {
            Some(options) => {
                let path = output.with_file_name(thumbnail_name(&stem));
                match generate_thumbnail(&output, &path, options).await {
                    Ok(thumb) => Some(thumb.path),
                    Err(e) => {
                        logger.log_warning(&format!("thumbnail extraction failed: {e}"));
                        None
                    }
                }
            }
            None => None,
        };

        let mut metadata = build_metadata(
            &request.id,
            &template.name,
            &request.segments,
            &schedule.segments,
            schedule.total_duration(),
            &outcome,
        );
        metadata.exports = exports.clone();
        metadata.thumbnail = thumbnail.clone();
        let metadata_path = write_sidecar(&metadata, &output).await?;

        logger.log_completion(&format!(
            "{} in {:.1}s (validated: {})",
            output.display(),
            started.elapsed().as_secs_f64(),
            outcome.quality_validated()
        ));

        Ok(CompositionResult {
            request_id: request.id,
            status: outcome.status,
            quality_validated: outcome.quality_validated(),
            output_path: output,
            metrics: outcome.metrics,
            attempts: outcome.attempts,
            retry_count: outcome.retry_count,
            exports,
            thumbnail,
            metadata_path,
            history: outcome.history,
        })
    }

    async fn export(
        &self,
        master: &Path,
        profiles: &[PlatformProfile],
        approved: bool,
        logger: &RenderLogger,
    ) -> Vec<ExportSummary> {
        if profiles.is_empty() {
            return Vec::new();
        }
        if !approved && !self.config.export_unapproved {
            logger.log_warning("skipping platform export for unapproved render");
            return Vec::new();
        }

        let logger = logger.for_operation("export");
        let export_dir = master
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        logger.log_start(&format!("{} profiles", profiles.len()));

        let results = self.exporter.export_all(master, profiles, export_dir).await;
        let summaries: Vec<ExportSummary> = results
            .iter()
            .map(|result| {
                let summary = summarize_export(result);
                metrics::record_compliance_warnings(&summary.profile, summary.issues.len());
                if let Some(error) = &summary.error {
                    logger.log_error(&format!("{} export failed: {}", summary.profile, error));
                }
                summary
            })
            .collect();

        let exported = summaries.iter().filter(|s| s.path.is_some()).count();
        logger.log_completion(&format!("{}/{} profiles exported", exported, profiles.len()));
        summaries
    }
}

/// Classify an audio probe. A file ffprobe cannot read is an input error;
/// a missing or stuck ffprobe is not.
fn audio_duration(path: &Path, probed: MediaResult<f64>) -> EngineResult<f64> {
    match probed {
        Ok(duration) if duration.is_finite() && duration > 0.0 => Ok(duration),
        Ok(duration) => Err(EngineError::invalid_input(format!(
            "audio {} reports duration {}",
            path.display(),
            duration
        ))),
        Err(e @ (MediaError::FfprobeNotFound | MediaError::Timeout(_))) => Err(e.into()),
        Err(e) => Err(EngineError::invalid_input(format!(
            "unreadable audio {}: {}",
            path.display(),
            e
        ))),
    }
}

/// Move `from` to `to`, copying when a rename crosses filesystems.
async fn move_file(from: &Path, to: &Path) -> EngineResult<()> {
    if let Some(parent) = to.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    if tokio::fs::rename(from, to).await.is_err() {
        debug!(from = %from.display(), to = %to.display(), "Rename failed, copying");
        tokio::fs::copy(from, to).await?;
        tokio::fs::remove_file(from).await?;
    }
    Ok(())
}
