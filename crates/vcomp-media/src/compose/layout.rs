//! Per-segment frame layout: blurred fill, letterbox bars, fitted foreground.

use crate::filters::{
    center_offset, color_with_alpha, drawbox, effects_chain, fade_chain, fill_and_blur, fit_within,
};
use vcomp_models::{Effect, TemplateConfig, VideoSegment};

use super::SourceInfo;

/// Cloned tail appended to every source so a slightly short decode still
/// fills its frame count.
const TAIL_PAD_SECS: f64 = 0.5;

/// Frames in `[start, end)` on a grid of `fps`, from rounded boundaries so
/// consecutive slots add up to the rounded total.
pub fn frame_count(start: f64, end: f64, fps: u32) -> u64 {
    let first = (start * fps as f64).round().max(0.0) as u64;
    let last = (end * fps as f64).round().max(0.0) as u64;
    last.saturating_sub(first).max(1)
}

/// Geometry and timing of one segment in the composed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentLayout {
    /// `-i` index of the segment source
    pub input_index: usize,
    /// Foreground size after scale-to-fit
    pub fit_width: u32,
    pub fit_height: u32,
    /// Foreground position
    pub x: u32,
    pub y: u32,
    /// Exact slot length, `frames / fps`
    pub duration: f64,
    /// Output frames for the slot
    pub frames: u64,
    /// Source must be looped to fill the slot
    pub needs_loop: bool,
    pub fade_in: f64,
    pub fade_out: f64,
}

impl SegmentLayout {
    /// Plan segment `index` of `count`.
    pub fn plan(
        index: usize,
        count: usize,
        segment: &VideoSegment,
        source: &SourceInfo,
        template: &TemplateConfig,
        fps: u32,
    ) -> Self {
        let frame = template.resolution;
        let frames = frame_count(segment.start_time, segment.end_time, fps);
        let duration = frames as f64 / fps.max(1) as f64;
        let (fit_width, fit_height) =
            fit_within(source.width, source.height, frame.width, frame.height);

        // Symmetric fades at inter-segment boundaries only
        let fade = template
            .transition
            .fade_duration()
            .min(duration / 2.0)
            .max(0.0);
        let fade_in = if index > 0 { fade } else { 0.0 };
        let fade_out = if index + 1 < count { fade } else { 0.0 };

        Self {
            input_index: index,
            fit_width,
            fit_height,
            x: center_offset(frame.width, fit_width),
            y: center_offset(frame.height, fit_height),
            duration,
            frames,
            needs_loop: source.duration < duration,
            fade_in,
            fade_out,
        }
    }

    /// Letterbox bars covering the blurred fill around the foreground.
    fn letterbox_bars(&self, template: &TemplateConfig) -> Vec<String> {
        if template.letterbox_opacity <= 0.0 {
            return Vec::new();
        }
        let frame = template.resolution;
        let color = color_with_alpha(&template.background_color, template.letterbox_opacity);
        let mut bars = Vec::new();

        if self.fit_height < frame.height {
            let bottom = self.y + self.fit_height;
            if self.y > 0 {
                bars.push(drawbox(0, 0, frame.width, self.y, &color));
            }
            if bottom < frame.height {
                bars.push(drawbox(0, bottom, frame.width, frame.height - bottom, &color));
            }
        }
        if self.fit_width < frame.width {
            let right = self.x + self.fit_width;
            if self.x > 0 {
                bars.push(drawbox(0, self.y, self.x, self.fit_height, &color));
            }
            if right < frame.width {
                bars.push(drawbox(right, self.y, frame.width - right, self.fit_height, &color));
            }
        }
        bars
    }

    /// Filter chain from the raw input to `[output_label]`.
    ///
    /// Segment effects run before template effects; both go through the
    /// same fixed-order mapping.
    pub fn build_filter(
        &self,
        template: &TemplateConfig,
        segment_effects: &[Effect],
        fps: u32,
        output_label: &str,
    ) -> String {
        let frame = template.resolution;
        let i = self.input_index;

        let mut background = vec![fill_and_blur(frame.width, frame.height, template.background_blur)];
        background.extend(self.letterbox_bars(template));

        let effects: Vec<Effect> = segment_effects
            .iter()
            .chain(template.effects.iter())
            .copied()
            .collect();

        let mut composed = vec![
            format!("overlay={}:{}:format=auto", self.x, self.y),
            "setsar=1".to_string(),
            "format=yuv420p".to_string(),
        ];
        if let Some(chain) = effects_chain(&effects) {
            composed.push(chain);
        }
        composed.extend(fade_chain(self.duration, self.fade_in, self.fade_out, None));

        format!(
            "[{i}:v]setpts=PTS-STARTPTS,fps={fps},tpad=stop_mode=clone:stop_duration={pad},\
             trim=end_frame={frames},setpts=PTS-STARTPTS,split=2[s{i}bg][s{i}fg];\
             [s{i}bg]{bg}[s{i}b];\
             [s{i}fg]scale={fw}:{fh}:flags=lanczos[s{i}f];\
             [s{i}b][s{i}f]{composed}[{out}]",
            i = i,
            pad = TAIL_PAD_SECS,
            frames = self.frames,
            fps = fps,
            bg = background.join(","),
            fw = self.fit_width,
            fh = self.fit_height,
            composed = composed.join(","),
            out = output_label,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcomp_models::{Resolution, TransitionType};

    fn landscape() -> SourceInfo {
        SourceInfo {
            width: 1920,
            height: 1080,
            duration: 20.0,
        }
    }

    fn scheduled(duration: f64) -> VideoSegment {
        let mut segment = VideoSegment::new("clip.mp4", duration);
        segment.place(0.0, duration);
        segment
    }

    #[test]
    fn test_landscape_layout_is_centred() {
        let layout = SegmentLayout::plan(0, 1, &scheduled(5.0), &landscape(), &TemplateConfig::default(), 30);
        assert_eq!((layout.fit_width, layout.fit_height), (1080, 606));
        assert_eq!(layout.x, 0);
        assert_eq!(layout.y, 657);
        assert!(!layout.needs_loop);
    }

    #[test]
    fn test_fades_only_on_inner_boundaries() {
        let template = TemplateConfig::default();
        let first = SegmentLayout::plan(0, 3, &scheduled(5.0), &landscape(), &template, 30);
        let middle = SegmentLayout::plan(1, 3, &scheduled(5.0), &landscape(), &template, 30);
        let last = SegmentLayout::plan(2, 3, &scheduled(5.0), &landscape(), &template, 30);

        assert_eq!((first.fade_in, first.fade_out), (0.0, 0.5));
        assert_eq!((middle.fade_in, middle.fade_out), (0.5, 0.5));
        assert_eq!((last.fade_in, last.fade_out), (0.5, 0.0));

        let single = SegmentLayout::plan(0, 1, &scheduled(5.0), &landscape(), &template, 30);
        assert_eq!((single.fade_in, single.fade_out), (0.0, 0.0));
    }

    #[test]
    fn test_fade_capped_for_short_segments() {
        let layout = SegmentLayout::plan(1, 3, &scheduled(0.6), &landscape(), &TemplateConfig::default(), 30);
        assert!((layout.fade_in - 0.3).abs() < 1e-9);

        let cut = TemplateConfig {
            transition: TransitionType::Cut,
            ..Default::default()
        };
        let layout = SegmentLayout::plan(1, 3, &scheduled(5.0), &landscape(), &cut, 30);
        assert_eq!(layout.fade_in, 0.0);
    }

    #[test]
    fn test_short_source_loops() {
        let short = SourceInfo {
            width: 1080,
            height: 1920,
            duration: 3.0,
        };
        let layout = SegmentLayout::plan(0, 1, &scheduled(8.0), &short, &TemplateConfig::default(), 30);
        assert!(layout.needs_loop);
    }

    #[test]
    fn test_letterbox_bars() {
        let template = TemplateConfig::default();
        let layout = SegmentLayout::plan(0, 1, &scheduled(5.0), &landscape(), &template, 30);
        let bars = layout.letterbox_bars(&template);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0], "drawbox=x=0:y=0:w=1080:h=657:color=black@0.35:t=fill");
        assert_eq!(bars[1], "drawbox=x=0:y=1263:w=1080:h=657:color=black@0.35:t=fill");

        let portrait = SourceInfo {
            width: 1080,
            height: 1920,
            duration: 10.0,
        };
        let full = SegmentLayout::plan(0, 1, &scheduled(5.0), &portrait, &template, 30);
        assert!(full.letterbox_bars(&template).is_empty());

        let square = TemplateConfig {
            resolution: Resolution::new(1080, 1080),
            ..Default::default()
        };
        let pillar = SegmentLayout::plan(0, 1, &scheduled(5.0), &portrait, &square, 30);
        assert_eq!(pillar.letterbox_bars(&square).len(), 2);
    }

    #[test]
    fn test_segment_filter_graph() {
        let template = TemplateConfig::default();
        let layout = SegmentLayout::plan(1, 2, &scheduled(4.0), &landscape(), &template, 30);
        let filter = layout.build_filter(&template, &[Effect::sharpen()], 30, "seg1");

        assert!(filter.starts_with(
            "[1:v]setpts=PTS-STARTPTS,fps=30,tpad=stop_mode=clone:stop_duration=0.5,trim=end_frame=120,"
        ));
        assert!(filter.contains("gblur=sigma=30"));
        assert!(filter.contains("scale=1080:606:flags=lanczos"));
        assert!(filter.contains("overlay=0:657"));
        assert!(filter.contains("unsharp"));
        assert!(filter.contains("fade=t=in:st=0:d=0.500"));
        assert!(!filter.contains("fade=t=out"));
        assert!(filter.ends_with("[seg1]"));
    }

    #[test]
    fn test_nearly_long_enough_source_still_loops() {
        let almost = SourceInfo {
            width: 1080,
            height: 1920,
            duration: 4.96,
        };
        let template = TemplateConfig::default();
        let layout = SegmentLayout::plan(0, 1, &scheduled(5.0), &almost, &template, 30);
        assert!(layout.needs_loop);
        assert_eq!(layout.frames, 150);

        let filter = layout.build_filter(&template, &[], 30, "seg0");
        assert!(filter.contains("tpad=stop_mode=clone"));
        assert!(filter.contains("trim=end_frame=150"));
    }

    #[test]
    fn test_frame_counts_add_up_to_total() {
        let template = TemplateConfig::default();
        let bounds = [0.0, 3.337, 7.019, 10.51, 14.999, 20.011];
        let mut total = 0;
        for (index, pair) in bounds.windows(2).enumerate() {
            let mut segment = VideoSegment::new("clip.mp4", pair[1] - pair[0]);
            segment.place(pair[0], pair[1] - pair[0]);
            let layout = SegmentLayout::plan(index, bounds.len() - 1, &segment, &landscape(), &template, 30);
            assert!((layout.duration - layout.frames as f64 / 30.0).abs() < 1e-12);
            total += layout.frames;
        }
        assert_eq!(total, (20.011f64 * 30.0).round() as u64);
        assert_eq!(frame_count(0.0, 20.011, 30), total);
    }
}
