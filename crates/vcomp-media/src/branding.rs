//! Branding overlay: a corner logo and/or text tag shown for the full duration.
//!
//! The logo is pulled in with the `movie` source filter so the render keeps
//! a single filter graph without an extra `-i` input.

use std::path::Path;
use tracing::warn;

use crate::error::MediaResult;
use crate::filters::{color_with_alpha, drawtext_position, escape_filter_path, font_arg, overlay_position};
use vcomp_models::{BrandingConfig, TextStyle};

/// Gap between the logo and the text tag.
const LOGO_TEXT_GAP: u32 = 12;

/// Build branding filters from `input_label`.
///
/// Returns the filter fragments and the label of the branded stream, or
/// `None` when there is nothing to draw.
pub fn build_branding_filters(
    config: &BrandingConfig,
    text_style: &TextStyle,
    asset_dir: &Path,
    input_label: &str,
) -> MediaResult<Option<(Vec<String>, String)>> {
    let logo = config.logo_path.as_deref().filter(|path| {
        let exists = path.exists();
        if !exists {
            warn!(logo = %path.display(), "Branding logo not found, skipping logo overlay");
        }
        exists
    });
    let text = config.text.as_deref().filter(|t| !t.trim().is_empty());

    if logo.is_none() && text.is_none() {
        return Ok(None);
    }

    let mut filters = Vec::new();
    let mut label = input_label.to_string();
    let opacity = config.opacity.clamp(0.0, 1.0);

    if let Some(logo) = logo {
        let size = config.logo_width.max(2);
        let (x, y) = overlay_position(config.corner, config.margin);
        // Logo fits a square box so the text offset below is always enough
        filters.push(format!(
            "movie='{}',scale={s}:{s}:force_original_aspect_ratio=decrease,format=rgba,colorchannelmixer=aa={:.2}[brand_logo]",
            escape_filter_path(logo),
            opacity,
            s = size
        ));
        filters.push(format!(
            "[{}][brand_logo]overlay={}:{}:format=auto[branded_logo]",
            label, x, y
        ));
        label = "branded_logo".to_string();
    }

    if let Some(text) = text {
        let text_path = asset_dir.join("branding.txt");
        std::fs::write(&text_path, text)?;

        let margin = if logo.is_some() {
            config.margin + config.logo_width + LOGO_TEXT_GAP
        } else {
            config.margin
        };
        let (x, _) = drawtext_position(config.corner, config.margin);
        let (_, y) = drawtext_position(config.corner, margin);
        let font_size = (text_style.size * 2 / 3).max(12);

        filters.push(format!(
            "[{}]drawtext=textfile='{}':expansion=none:{}:fontsize={}:fontcolor={}:borderw={}:bordercolor={}:x={}:y={}[branded]",
            label,
            escape_filter_path(&text_path),
            font_arg(&text_style.font, text_style.is_font_file()),
            font_size,
            color_with_alpha(&text_style.color, opacity),
            text_style.stroke_width.min(2),
            color_with_alpha(&text_style.stroke_color, opacity),
            x,
            y
        ));
        label = "branded".to_string();
    }

    Ok(Some((filters, label)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vcomp_models::Corner;

    #[test]
    fn test_empty_branding_draws_nothing() {
        let dir = TempDir::new().unwrap();
        let result =
            build_branding_filters(&BrandingConfig::default(), &TextStyle::default(), dir.path(), "v")
                .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_missing_logo_is_skipped() {
        let dir = TempDir::new().unwrap();
        let config = BrandingConfig {
            logo_path: Some(dir.path().join("missing.png")),
            ..Default::default()
        };
        let result = build_branding_filters(&config, &TextStyle::default(), dir.path(), "v").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_logo_and_text() {
        let dir = TempDir::new().unwrap();
        let logo = dir.path().join("logo.png");
        image::RgbaImage::new(4, 4).save(&logo).unwrap();

        let config = BrandingConfig {
            logo_path: Some(logo),
            text: Some("@channel".to_string()),
            corner: Corner::TopLeft,
            ..Default::default()
        };
        let (filters, label) =
            build_branding_filters(&config, &TextStyle::default(), dir.path(), "cat")
                .unwrap()
                .unwrap();

        assert_eq!(label, "branded");
        let graph = filters.join(";");
        assert!(graph.contains("colorchannelmixer=aa=0.70"));
        assert!(graph.contains("[cat][brand_logo]overlay=40:40"));
        // Text sits below the logo in a top corner
        assert!(graph.contains(&format!("y={}", 40 + 180 + LOGO_TEXT_GAP)));
        assert!(dir.path().join("branding.txt").exists());
    }

    #[test]
    fn test_branding_text_is_not_expanded() {
        let dir = TempDir::new().unwrap();
        let config = BrandingConfig {
            text: Some(r"100% \ real".to_string()),
            ..Default::default()
        };
        let (filters, _) = build_branding_filters(&config, &TextStyle::default(), dir.path(), "v")
            .unwrap()
            .unwrap();

        assert!(filters.join(";").contains("drawtext=textfile='"));
        assert!(filters.join(";").contains(":expansion=none:"));
        let written = std::fs::read_to_string(dir.path().join("branding.txt")).unwrap();
        assert_eq!(written, r"100% \ real");
    }
}
