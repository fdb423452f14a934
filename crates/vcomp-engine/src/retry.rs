//! Retry Controller.
//!
//! Drives render attempts through a small state machine:
//!
//! ```text
//! Rendering{n} -> Evaluating{n} -> Approved
//!                              \-> Retrying{n} -> Rendering{n+1}
//!                              \-> Exhausted
//! ```
//!
//! A failed or timed-out render counts as a failed evaluation. Each retry
//! renders a private clone of the template with bounded improvements; the
//! shared template is never touched.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};
use crate::metrics;
use vcomp_models::{Effect, QualityGate, QualityMetrics, QualityThresholds, TemplateConfig};

/// Renders and scores one attempt.
#[async_trait]
pub trait AttemptRunner: Send + Sync {
    /// Render `template` and return the produced file.
    async fn render(&self, template: &TemplateConfig, attempt: u32) -> EngineResult<PathBuf>;

    /// Score a rendered file.
    async fn evaluate(&self, path: &Path) -> EngineResult<QualityMetrics>;
}

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RenderState {
    Rendering { attempt: u32 },
    Evaluating { attempt: u32 },
    Retrying { attempt: u32 },
    Approved,
    Exhausted,
}

impl RenderState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RenderState::Approved | RenderState::Exhausted)
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderState::Rendering { attempt } => write!(f, "rendering({attempt})"),
            RenderState::Evaluating { attempt } => write!(f, "evaluating({attempt})"),
            RenderState::Retrying { attempt } => write!(f, "retrying({attempt})"),
            RenderState::Approved => f.write_str("approved"),
            RenderState::Exhausted => f.write_str("exhausted"),
        }
    }
}

/// Terminal status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStatus {
    Approved,
    Exhausted,
}

/// One render attempt as recorded in the outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<QualityMetrics>,
    pub failures: Vec<QualityGate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Template text size used for this attempt
    pub font_size: u32,
    /// Sharpen effects on the template used for this attempt
    pub sharpen_count: usize,
}

impl AttemptRecord {
    pub fn passed(&self) -> bool {
        self.error.is_none() && self.metrics.is_some() && self.failures.is_empty()
    }
}

/// Result of the retry loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetryOutcome {
    pub status: RenderStatus,
    pub attempts: u32,
    pub retry_count: u32,
    /// Approved file, or the last rendered file when exhausted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<QualityMetrics>,
    pub history: Vec<AttemptRecord>,
}

impl RetryOutcome {
    pub fn quality_validated(&self) -> bool {
        self.status == RenderStatus::Approved
    }
}

/// Improvements already applied across retries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedImprovements {
    pub sharpen_added: u32,
    pub contrast_added: bool,
}

/// Bounded template adjustments made before each retry.
#[derive(Debug, Clone, PartialEq)]
pub struct ImprovementPolicy {
    pub font_step: u32,
    pub font_cap: u32,
    pub sharpen_amount: f32,
    pub max_added_sharpen: u32,
    pub contrast_factor: f32,
}

impl Default for ImprovementPolicy {
    fn default() -> Self {
        Self {
            font_step: 4,
            font_cap: 72,
            sharpen_amount: 0.8,
            max_added_sharpen: 3,
            contrast_factor: 1.05,
        }
    }
}

impl ImprovementPolicy {
    /// Derive the next attempt's template from `current`.
    pub fn improve(
        &self,
        current: &TemplateConfig,
        failures: &[QualityGate],
        applied: &mut AppliedImprovements,
    ) -> TemplateConfig {
        let mut next = current.clone();

        next.text_style.size = self.bump_font(next.text_style.size);
        if let Some(size) = next.caption_defaults.font_size {
            next.caption_defaults.font_size = Some(self.bump_font(size));
        }

        if applied.sharpen_added < self.max_added_sharpen {
            next.effects.push(Effect::Sharpen {
                amount: self.sharpen_amount,
            });
            applied.sharpen_added += 1;
        }

        if failures.contains(&QualityGate::Clarity) && !applied.contrast_added {
            next.effects.push(Effect::Contrast {
                factor: self.contrast_factor,
            });
            applied.contrast_added = true;
        }

        next
    }

    fn bump_font(&self, size: u32) -> u32 {
        if size >= self.font_cap {
            size
        } else {
            (size + self.font_step).min(self.font_cap)
        }
    }
}

/// Quality-gated render loop over a shared base template.
#[derive(Debug)]
pub struct RetryController {
    base: Arc<TemplateConfig>,
    current: TemplateConfig,
    thresholds: QualityThresholds,
    policy: ImprovementPolicy,
    max_retries: u32,
    state: RenderState,
    retry_count: u32,
    applied: AppliedImprovements,
    pending_output: Option<PathBuf>,
    history: Vec<AttemptRecord>,
    request_id: String,
}

impl RetryController {
    pub fn new(base: Arc<TemplateConfig>, thresholds: QualityThresholds, max_retries: u32) -> Self {
        let current = (*base).clone();
        Self {
            base,
            current,
            thresholds,
            policy: ImprovementPolicy::default(),
            max_retries,
            state: RenderState::Rendering { attempt: 1 },
            retry_count: 0,
            applied: AppliedImprovements::default(),
            pending_output: None,
            history: Vec::new(),
            request_id: String::new(),
        }
    }

    pub fn with_policy(mut self, policy: ImprovementPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Tag log lines with a request ID.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Template the next render uses.
    pub fn current_template(&self) -> &TemplateConfig {
        &self.current
    }

    pub fn history(&self) -> &[AttemptRecord] {
        &self.history
    }

    fn attempt(&self) -> u32 {
        self.retry_count + 1
    }

    fn record(&self, attempt: u32) -> AttemptRecord {
        AttemptRecord {
            attempt,
            output_path: None,
            metrics: None,
            failures: Vec::new(),
            error: None,
            font_size: self.current.text_style.size,
            sharpen_count: self.current.sharpen_count(),
        }
    }

    /// `Rendering -> Evaluating` after a render produced `path`.
    pub fn on_rendered(&mut self, path: PathBuf) -> RenderState {
        if let RenderState::Rendering { attempt } = self.state {
            self.pending_output = Some(path);
            self.state = RenderState::Evaluating { attempt };
        }
        self.state
    }

    /// A failed render is a failed evaluation.
    pub fn on_render_failed(&mut self, error: &EngineError) -> RenderState {
        let RenderState::Rendering { attempt } = self.state else {
            return self.state;
        };
        warn!(
            request_id = %self.request_id,
            attempt,
            error = %error,
            "Render attempt failed"
        );
        let mut record = self.record(attempt);
        record.error = Some(error.to_string());
        record.metrics = Some(QualityMetrics::failed());
        record.failures = vec![QualityGate::Overall];
        self.conclude(record, vec![QualityGate::Overall])
    }

    /// `Evaluating -> Approved | Retrying | Exhausted`.
    pub fn on_evaluated(&mut self, metrics: QualityMetrics) -> RenderState {
        let RenderState::Evaluating { attempt } = self.state else {
            return self.state;
        };
        let failures = self.thresholds.failures(&metrics);
        let mut record = self.record(attempt);
        record.output_path = self.pending_output.take();
        record.metrics = Some(metrics);
        record.failures = failures.clone();
        self.conclude(record, failures)
    }

    /// Scoring failed; the file exists but cannot be approved.
    pub fn on_evaluation_failed(&mut self, error: &EngineError) -> RenderState {
        let RenderState::Evaluating { attempt } = self.state else {
            return self.state;
        };
        warn!(
            request_id = %self.request_id,
            attempt,
            error = %error,
            "Evaluation failed"
        );
        let mut record = self.record(attempt);
        record.output_path = self.pending_output.take();
        record.metrics = Some(QualityMetrics::failed());
        record.failures = vec![QualityGate::Overall];
        record.error = Some(error.to_string());
        self.conclude(record, vec![QualityGate::Overall])
    }

    fn conclude(&mut self, record: AttemptRecord, failures: Vec<QualityGate>) -> RenderState {
        let attempt = record.attempt;
        let metrics = record.metrics.unwrap_or_else(QualityMetrics::failed);
        let passed = record.error.is_none() && failures.is_empty();
        self.history.push(record);

        if passed {
            info!(
                request_id = %self.request_id,
                attempt,
                metrics = %metrics,
                "Render approved"
            );
            self.state = RenderState::Approved;
        } else if self.retry_count < self.max_retries {
            let gates: Vec<String> = failures.iter().map(ToString::to_string).collect();
            self.current = self
                .policy
                .improve(&self.current, &failures, &mut self.applied);
            self.retry_count += 1;
            info!(
                request_id = %self.request_id,
                attempt,
                retry = self.retry_count,
                failed_gates = %gates.join(","),
                metrics = %metrics,
                font_size = self.current.text_style.size,
                sharpen = self.current.sharpen_count(),
                "Quality gate failed, retrying with improved template"
            );
            self.state = RenderState::Retrying { attempt };
        } else {
            warn!(
                request_id = %self.request_id,
                attempt,
                metrics = %metrics,
                "Retry budget exhausted, returning unapproved render"
            );
            self.state = RenderState::Exhausted;
        }
        self.state
    }

    /// `Retrying -> Rendering` with the next attempt number.
    pub fn begin_next_attempt(&mut self) -> RenderState {
        if let RenderState::Retrying { .. } = self.state {
            self.state = RenderState::Rendering {
                attempt: self.attempt(),
            };
        }
        self.state
    }

    /// Build the outcome once a terminal state is reached.
    pub fn finish(self) -> EngineResult<RetryOutcome> {
        let status = match self.state {
            RenderState::Approved => RenderStatus::Approved,
            RenderState::Exhausted => RenderStatus::Exhausted,
            other => {
                return Err(EngineError::invalid_input(format!(
                    "retry loop finished in non-terminal state {other}"
                )))
            }
        };
        let attempts = self.history.len() as u32;

        // Approved: the last attempt. Exhausted: the latest attempt with a file.
        let chosen = self
            .history
            .iter()
            .rev()
            .find(|record| record.output_path.is_some())
            .cloned();
        let Some(chosen) = chosen else {
            return Err(EngineError::NoRenderedOutput { attempts });
        };

        Ok(RetryOutcome {
            status,
            attempts,
            retry_count: self.retry_count,
            output_path: chosen.output_path,
            metrics: chosen.metrics,
            history: self.history,
        })
    }

    /// Run the loop to a terminal state.
    pub async fn run<R>(mut self, runner: &R) -> EngineResult<RetryOutcome>
    where
        R: AttemptRunner + ?Sized,
    {
        let template_name = self.base.name.clone();
        loop {
            match self.state {
                RenderState::Rendering { attempt } => {
                    match runner.render(&self.current, attempt).await {
                        Ok(path) => {
                            metrics::record_render_attempt(&template_name, true);
                            self.on_rendered(path);
                        }
                        Err(e) => {
                            metrics::record_render_attempt(&template_name, false);
                            self.on_render_failed(&e);
                        }
                    }
                }
                RenderState::Evaluating { .. } => {
                    let Some(path) = self.pending_output.clone() else {
                        let missing = EngineError::invalid_input("no rendered file to evaluate");
                        self.on_evaluation_failed(&missing);
                        continue;
                    };
                    match runner.evaluate(&path).await {
                        Ok(metrics) => self.on_evaluated(metrics),
                        Err(e) => self.on_evaluation_failed(&e),
                    };
                }
                RenderState::Retrying { .. } => {
                    self.begin_next_attempt();
                }
                RenderState::Approved => {
                    metrics::record_render_approved(&template_name, self.retry_count);
                    return self.finish();
                }
                RenderState::Exhausted => {
                    metrics::record_render_exhausted(&template_name);
                    return self.finish();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use vcomp_media::MediaError;

    enum Step {
        Render(QualityMetrics),
        RenderFails,
    }

    struct ScriptedRunner {
        steps: Mutex<VecDeque<Step>>,
        pending: Mutex<Option<QualityMetrics>>,
        seen: Mutex<Vec<TemplateConfig>>,
    }

    impl ScriptedRunner {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                pending: Mutex::new(None),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<TemplateConfig> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AttemptRunner for ScriptedRunner {
        async fn render(&self, template: &TemplateConfig, attempt: u32) -> EngineResult<PathBuf> {
            self.seen.lock().unwrap().push(template.clone());
            let step = self.steps.lock().unwrap().pop_front().expect("unscripted attempt");
            match step {
                Step::Render(metrics) => {
                    *self.pending.lock().unwrap() = Some(metrics);
                    Ok(PathBuf::from(format!("attempt{attempt}.mp4")))
                }
                Step::RenderFails => Err(MediaError::Timeout(600).into()),
            }
        }

        async fn evaluate(&self, _path: &Path) -> EngineResult<QualityMetrics> {
            Ok(self.pending.lock().unwrap().take().expect("evaluate before render"))
        }
    }

    fn good() -> QualityMetrics {
        QualityMetrics::from_components(1.0, 1.0, 0.9, 1.0, 0.5, true)
    }

    fn blurry() -> QualityMetrics {
        QualityMetrics::from_components(0.9, 0.9, 0.5, 0.0, 0.0, true)
    }

    fn scenario_thresholds() -> QualityThresholds {
        QualityThresholds {
            resolution: 0.8,
            audio_sync: 0.85,
            clarity: 0.75,
            overall: 0.8,
            ..QualityThresholds::permissive()
        }
    }

    #[tokio::test]
    async fn test_approved_first_attempt() {
        let runner = ScriptedRunner::new(vec![Step::Render(good())]);
        let outcome = RetryController::new(Arc::new(TemplateConfig::default()), scenario_thresholds(), 2)
            .run(&runner)
            .await
            .unwrap();

        assert_eq!(outcome.status, RenderStatus::Approved);
        assert!(outcome.quality_validated());
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.retry_count, 0);
        assert_eq!(outcome.output_path, Some(PathBuf::from("attempt1.mp4")));
    }

    #[tokio::test]
    async fn test_low_clarity_retries_once_then_exhausts() {
        let runner = ScriptedRunner::new(vec![Step::Render(blurry()), Step::Render(blurry())]);
        let outcome = RetryController::new(Arc::new(TemplateConfig::default()), scenario_thresholds(), 1)
            .run(&runner)
            .await
            .unwrap();

        assert!(blurry().overall_score < 0.8);
        assert_eq!(outcome.status, RenderStatus::Exhausted);
        assert!(!outcome.quality_validated());
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.retry_count, 1);
        // Last rendered file is still returned
        assert_eq!(outcome.output_path, Some(PathBuf::from("attempt2.mp4")));
        assert!(outcome.history[0].failures.contains(&QualityGate::Clarity));
    }

    #[tokio::test]
    async fn test_retry_then_approve() {
        let runner = ScriptedRunner::new(vec![Step::Render(blurry()), Step::Render(good())]);
        let outcome = RetryController::new(Arc::new(TemplateConfig::default()), scenario_thresholds(), 1)
            .run(&runner)
            .await
            .unwrap();

        assert_eq!(outcome.status, RenderStatus::Approved);
        assert_eq!(outcome.retry_count, 1);
        assert_eq!(outcome.metrics, Some(good()));
    }

    #[tokio::test]
    async fn test_render_failure_counts_as_failed_attempt() {
        let runner = ScriptedRunner::new(vec![Step::RenderFails, Step::Render(good())]);
        let outcome = RetryController::new(
            Arc::new(TemplateConfig::default()),
            QualityThresholds::permissive(),
            2,
        )
        .run(&runner)
        .await
        .unwrap();

        assert_eq!(outcome.status, RenderStatus::Approved);
        assert_eq!(outcome.attempts, 2);
        assert!(outcome.history[0].error.is_some());
        assert!(!outcome.history[0].passed());
    }

    #[tokio::test]
    async fn test_no_output_when_every_render_fails() {
        let runner = ScriptedRunner::new(vec![Step::RenderFails, Step::RenderFails]);
        let err = RetryController::new(Arc::new(TemplateConfig::default()), scenario_thresholds(), 1)
            .run(&runner)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NoRenderedOutput { attempts: 2 }));
    }

    #[tokio::test]
    async fn test_exhausted_returns_last_file_after_failed_render() {
        let runner = ScriptedRunner::new(vec![Step::Render(blurry()), Step::RenderFails]);
        let outcome = RetryController::new(Arc::new(TemplateConfig::default()), scenario_thresholds(), 1)
            .run(&runner)
            .await
            .unwrap();
        assert_eq!(outcome.status, RenderStatus::Exhausted);
        assert_eq!(outcome.output_path, Some(PathBuf::from("attempt1.mp4")));
        assert_eq!(outcome.metrics, Some(blurry()));
    }

    #[tokio::test]
    async fn test_attempts_are_monotonic_and_bounded() {
        let steps = (0..4).map(|_| Step::Render(blurry())).collect();
        let runner = ScriptedRunner::new(steps);
        let max_retries = 3;
        let outcome = RetryController::new(
            Arc::new(TemplateConfig::default()),
            scenario_thresholds(),
            max_retries,
        )
        .run(&runner)
        .await
        .unwrap();

        let attempts: Vec<u32> = outcome.history.iter().map(|r| r.attempt).collect();
        assert_eq!(attempts, vec![1, 2, 3, 4]);
        assert_eq!(outcome.retry_count, max_retries);
        assert_eq!(outcome.status, RenderStatus::Exhausted);
    }

    #[tokio::test]
    async fn test_base_template_is_never_mutated() {
        let base = Arc::new(TemplateConfig::default());
        let snapshot = (*base).clone();
        let steps = (0..3).map(|_| Step::Render(blurry())).collect();
        let runner = ScriptedRunner::new(steps);

        RetryController::new(Arc::clone(&base), scenario_thresholds(), 2)
            .run(&runner)
            .await
            .unwrap();

        assert_eq!(*base, snapshot);
        let seen = runner.seen();
        assert_eq!(seen[0], snapshot);
        assert_eq!(seen[1].text_style.size, 60);
        assert_eq!(seen[2].text_style.size, 64);
        assert_eq!(seen[2].sharpen_count(), 2);
    }

    #[test]
    fn test_improvement_policy_bounds() {
        let policy = ImprovementPolicy::default();
        let mut applied = AppliedImprovements::default();
        let mut template = TemplateConfig::default();
        template.text_style.size = 70;
        template.caption_defaults.font_size = Some(40);

        for _ in 0..5 {
            template = policy.improve(&template, &[QualityGate::Clarity], &mut applied);
        }

        assert_eq!(template.text_style.size, 72);
        assert_eq!(template.caption_defaults.font_size, Some(60));
        assert_eq!(template.sharpen_count(), 3);
        let contrasts = template
            .effects
            .iter()
            .filter(|e| matches!(e, Effect::Contrast { .. }))
            .count();
        assert_eq!(contrasts, 1);
    }

    #[test]
    fn test_contrast_only_for_clarity() {
        let policy = ImprovementPolicy::default();
        let mut applied = AppliedImprovements::default();
        let next = policy.improve(&TemplateConfig::default(), &[QualityGate::AudioSync], &mut applied);
        assert!(!applied.contrast_added);
        assert_eq!(next.effects, vec![Effect::Sharpen { amount: 0.8 }]);
    }

    #[test]
    fn test_out_of_order_events_are_ignored() {
        let mut controller =
            RetryController::new(Arc::new(TemplateConfig::default()), scenario_thresholds(), 1);
        assert_eq!(controller.on_evaluated(good()), RenderState::Rendering { attempt: 1 });
        assert_eq!(controller.begin_next_attempt(), RenderState::Rendering { attempt: 1 });
        assert!(controller.history().is_empty());
    }

    #[test]
    fn test_state_transitions() {
        let mut controller =
            RetryController::new(Arc::new(TemplateConfig::default()), scenario_thresholds(), 1);
        assert_eq!(
            controller.on_rendered(PathBuf::from("a.mp4")),
            RenderState::Evaluating { attempt: 1 }
        );
        assert_eq!(controller.on_evaluated(blurry()), RenderState::Retrying { attempt: 1 });
        assert_eq!(controller.begin_next_attempt(), RenderState::Rendering { attempt: 2 });
        assert_eq!(controller.retry_count(), 1);
        assert!(!controller.state().is_terminal());
    }
}
