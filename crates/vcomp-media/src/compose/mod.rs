//! Layout Compositor.
//!
//! Turns scheduled segments, captions, branding and a template into one
//! FFmpeg filter graph:
//!
//! ```text
//! [i:v] -> trim/loop -> blurred fill + letterbox + fitted foreground -> effects -> fades  (per segment)
//!       -> concat -> intro/outro fades -> branding -> captions -> [vout]
//! ```
//!
//! The composed duration is the scheduler's total; nothing in the graph
//! changes segment timing. Segments are cut to whole frames on the output
//! grid from rounded timeline boundaries, so the per-segment frame counts add
//! up to the rounded total.

pub mod captions;
pub mod layout;

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

use crate::branding::build_branding_filters;
use crate::command::FfmpegInput;
use crate::error::{MediaError, MediaResult};
use crate::filters::fade_chain;
use crate::probe::VideoInfo;
use vcomp_models::{AudioTrack, Caption, TemplateConfig, VideoSegment};

pub use captions::{wrap_text, CaptionLayout};
pub use layout::{frame_count, SegmentLayout};

/// Label of the final video stream in the composed graph.
pub const VIDEO_OUTPUT_LABEL: &str = "vout";

/// Tolerance when checking the schedule against the audio duration.
const DURATION_EPSILON: f64 = 1e-6;

/// Probed properties of a segment source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub duration: f64,
}

impl From<&VideoInfo> for SourceInfo {
    fn from(info: &VideoInfo) -> Self {
        Self {
            width: info.width,
            height: info.height,
            duration: info.duration,
        }
    }
}

/// Everything the compositor reads for one attempt.
#[derive(Debug, Clone, Copy)]
pub struct CompositionInput<'a> {
    /// Scheduled segments, contiguous from 0
    pub segments: &'a [VideoSegment],
    /// One entry per segment
    pub sources: &'a [SourceInfo],
    pub audio: &'a AudioTrack,
    pub captions: &'a [Caption],
    pub template: &'a TemplateConfig,
    pub fps: u32,
}

/// A renderable timeline.
#[derive(Debug)]
pub struct ComposedTimeline {
    /// Segment inputs followed by the audio input
    pub inputs: Vec<FfmpegInput>,
    pub filter_graph: String,
    pub video_label: String,
    /// `-i` index of the audio track
    pub audio_input: usize,
    /// Total duration, equal to the scheduled total
    pub duration: f64,
    /// Number of captions drawn
    pub caption_count: usize,
    /// Caption panels and text files; removed when the timeline is dropped
    pub assets: TempDir,
}

impl ComposedTimeline {
    pub fn asset_dir(&self) -> &Path {
        self.assets.path()
    }
}

/// Builds composed timelines under a working directory.
#[derive(Debug, Clone)]
pub struct Compositor {
    work_dir: PathBuf,
}

impl Compositor {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    /// Compose one attempt.
    pub fn compose(&self, input: CompositionInput<'_>) -> MediaResult<ComposedTimeline> {
        let CompositionInput {
            segments,
            sources,
            audio,
            captions,
            template,
            fps,
        } = input;

        if segments.is_empty() {
            return Err(MediaError::invalid_composition("no segments to compose"));
        }
        if segments.len() != sources.len() {
            return Err(MediaError::invalid_composition(format!(
                "{} segments but {} probed sources",
                segments.len(),
                sources.len()
            )));
        }
        let duration: f64 = segments.iter().map(|s| s.duration).sum();
        if (duration - audio.duration).abs() > DURATION_EPSILON * audio.duration.max(1.0) {
            return Err(MediaError::invalid_composition(format!(
                "segments cover {:.6}s but audio lasts {:.6}s",
                duration, audio.duration
            )));
        }

        std::fs::create_dir_all(&self.work_dir)?;
        let assets = tempfile::Builder::new()
            .prefix("vcomp-assets-")
            .tempdir_in(&self.work_dir)?;

        let count = segments.len();
        let mut inputs = Vec::with_capacity(count + 1);
        let mut chains = Vec::with_capacity(count + 4);
        let mut concat_inputs = String::new();

        for (index, (segment, source)) in segments.iter().zip(sources).enumerate() {
            let layout = SegmentLayout::plan(index, count, segment, source, template, fps);
            let mut media = FfmpegInput::new(&segment.path);
            if layout.needs_loop {
                media = media.looped();
            }
            inputs.push(media);

            let label = format!("seg{index}");
            chains.push(layout.build_filter(template, &segment.effects, fps, &label));
            concat_inputs.push_str(&format!("[{label}]"));
        }

        let audio_input = inputs.len();
        inputs.push(FfmpegInput::new(&audio.path));

        chains.push(format!("{concat_inputs}concat=n={count}:v=1:a=0[vcat]"));
        let mut label = "vcat".to_string();

        let intro = template.intro_duration.min(duration);
        let outro = template.outro_duration.min(duration);
        let bookends = fade_chain(duration, intro, outro, Some(&template.background_color));
        if !bookends.is_empty() {
            chains.push(format!("[{label}]{}[vfaded]", bookends.join(",")));
            label = "vfaded".to_string();
        }

        if let Some(branding) = &template.branding {
            if let Some((filters, branded)) =
                build_branding_filters(branding, &template.text_style, assets.path(), &label)?
            {
                chains.extend(filters);
                label = branded;
            }
        }

        let (caption_pass, captioned) = captions::build_caption_pass(
            captions,
            &template.caption_defaults,
            &template.text_style,
            template.resolution,
            duration,
            assets.path(),
            &label,
        )?;
        chains.extend(caption_pass.filters);
        chains.push(format!("[{captioned}]format=yuv420p[{VIDEO_OUTPUT_LABEL}]"));

        let filter_graph = chains.join(";");
        debug!(
            segments = count,
            captions = caption_pass.count,
            duration,
            graph_len = filter_graph.len(),
            "Composed timeline"
        );

        Ok(ComposedTimeline {
            inputs,
            filter_graph,
            video_label: VIDEO_OUTPUT_LABEL.to_string(),
            audio_input,
            duration,
            caption_count: caption_pass.count,
            assets,
        })
    }
}
