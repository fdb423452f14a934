//! Caption overlay pass: word wrap, rounded panels and `drawtext` lines.

use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};

use crate::error::MediaResult;
use crate::filters::{escape_filter_path, font_arg};
use vcomp_models::template::parse_rgb;
use vcomp_models::{Caption, CaptionAnchor, CaptionStyle, Resolution, TextStyle};

/// Average glyph advance as a fraction of the font size.
pub const GLYPH_WIDTH_RATIO: f64 = 0.55;

/// Greedy word wrap to at most `max_chars` characters per line.
///
/// Words longer than a full line are split across lines.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let word: String = word.into_iter().collect();
        if word.is_empty() {
            continue;
        }
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Pixel geometry of one caption.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLayout {
    pub lines: Vec<String>,
    pub font_size: u32,
    pub line_height: u32,
    pub panel_x: u32,
    pub panel_y: u32,
    pub panel_width: u32,
    pub panel_height: u32,
    pub padding: u32,
    pub start: f64,
    pub end: f64,
}

impl CaptionLayout {
    /// Lay out a caption, clipping its timing to `[0, timeline]`.
    ///
    /// Returns `None` for empty text or captions entirely outside the timeline.
    pub fn plan(
        caption: &Caption,
        style: &CaptionStyle,
        text_style: &TextStyle,
        frame: Resolution,
        timeline: f64,
    ) -> Option<Self> {
        let start = caption.start_time.max(0.0);
        let end = caption.end_time.min(timeline);
        if caption.text.trim().is_empty() || end <= start {
            return None;
        }

        let font_size = style.font_size.unwrap_or(text_style.size).max(1);
        let glyph = (font_size as f64 * GLYPH_WIDTH_RATIO).max(1.0);
        let max_panel_width = (frame.width as f64 * style.max_width_ratio.clamp(0.1, 1.0)).floor();
        let text_width = (max_panel_width - 2.0 * style.padding as f64).max(glyph);
        let max_chars = (text_width / glyph).floor() as usize;

        let lines = wrap_text(&caption.text, max_chars);
        let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let line_height = (font_size as f64 * style.line_spacing.max(1.0) as f64).round() as u32;

        let panel_width = ((longest as f64 * glyph).ceil() as u32 + 2 * style.padding)
            .min(max_panel_width as u32)
            .min(frame.width);
        let panel_height =
            (lines.len() as u32 * line_height + 2 * style.padding).min(frame.height);

        let margin = (frame.height as f64 * style.margin_ratio.clamp(0.0, 0.5)).round() as u32;
        let panel_y = match style.anchor {
            CaptionAnchor::Top => margin,
            CaptionAnchor::Center => frame.height.saturating_sub(panel_height) / 2,
            CaptionAnchor::Bottom => frame.height.saturating_sub(margin + panel_height),
        }
        .min(frame.height.saturating_sub(panel_height));
        let panel_x = frame.width.saturating_sub(panel_width) / 2;

        Some(Self {
            lines,
            font_size,
            line_height,
            panel_x,
            panel_y,
            panel_width: panel_width.max(1),
            panel_height: panel_height.max(1),
            padding: style.padding,
            start,
            end,
        })
    }

    fn enable_expr(&self) -> String {
        format!("between(t,{:.3},{:.3})", self.start, self.end)
    }

    /// Top edge of line `index`.
    pub fn line_y(&self, index: usize) -> u32 {
        self.panel_y + self.padding + index as u32 * self.line_height
    }
}

/// Render a rounded-rectangle panel as RGBA.
pub fn render_panel(width: u32, height: u32, radius: u32, color: [u8; 3], opacity: f32) -> RgbaImage {
    let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
    let radius = radius.min(width / 2).min(height / 2) as f64;
    let [r, g, b] = color;

    RgbaImage::from_fn(width, height, |x, y| {
        // Distance from the pixel centre to the nearest corner-circle centre
        let px = x as f64 + 0.5;
        let py = y as f64 + 0.5;
        let cx = px.clamp(radius, width as f64 - radius);
        let cy = py.clamp(radius, height as f64 - radius);
        let inside = (px - cx).powi(2) + (py - cy).powi(2) <= radius * radius;
        if inside {
            Rgba([r, g, b, alpha])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

/// Filter fragments and files produced for the caption pass.
#[derive(Debug, Default)]
pub struct CaptionPass {
    pub filters: Vec<String>,
    pub files: Vec<PathBuf>,
    pub count: usize,
}

/// Build the caption overlay chain from `input_label`, ending at the
/// returned label. Panel images and line text files are written to `asset_dir`.
pub fn build_caption_pass(
    captions: &[Caption],
    defaults: &CaptionStyle,
    text_style: &TextStyle,
    frame: Resolution,
    timeline: f64,
    asset_dir: &Path,
    input_label: &str,
) -> MediaResult<(CaptionPass, String)> {
    let mut pass = CaptionPass::default();
    let mut label = input_label.to_string();
    let font = font_arg(&text_style.font, text_style.is_font_file());

    for (index, caption) in captions.iter().enumerate() {
        let style = caption.style_or(defaults);
        let Some(layout) = CaptionLayout::plan(caption, style, text_style, frame, timeline) else {
            continue;
        };

        let panel_color = parse_rgb(&style.panel_color).unwrap_or([0, 0, 0]);
        let panel = render_panel(
            layout.panel_width,
            layout.panel_height,
            style.corner_radius,
            panel_color,
            style.panel_opacity,
        );
        let panel_path = asset_dir.join(format!("caption_{index:03}.png"));
        panel.save(&panel_path)?;
        pass.files.push(panel_path.clone());

        let enable = layout.enable_expr();
        let panel_label = format!("cp{index}");
        let overlaid = format!("cpo{index}");
        pass.filters.push(format!(
            "movie='{}',format=rgba[{}]",
            escape_filter_path(&panel_path),
            panel_label
        ));
        pass.filters.push(format!(
            "[{}][{}]overlay=x={}:y={}:format=auto:enable='{}'[{}]",
            label, panel_label, layout.panel_x, layout.panel_y, enable, overlaid
        ));
        label = overlaid;

        for (line_index, line) in layout.lines.iter().enumerate() {
            // Text is read from a file with expansion off, so it reaches the frame verbatim
            let text_path = asset_dir.join(format!("caption_{index:03}_{line_index:02}.txt"));
            std::fs::write(&text_path, line)?;
            pass.files.push(text_path.clone());

            let next = format!("ct{index}_{line_index}");
            pass.filters.push(format!(
                "[{}]drawtext=textfile='{}':expansion=none:{}:fontsize={}:fontcolor={}:borderw={}:bordercolor={}:x=(w-tw)/2:y={}:enable='{}'[{}]",
                label,
                escape_filter_path(&text_path),
                font,
                layout.font_size,
                text_style.color,
                text_style.stroke_width,
                text_style.stroke_color,
                layout.line_y(line_index),
                enable,
                next
            ));
            label = next;
        }

        pass.count += 1;
    }

    Ok((pass, label))
}
