//! FFmpeg filter primitives shared by the compositor, exporter and branding.

use std::path::Path;

use vcomp_models::{Corner, Effect};

/// Maximum `unsharp` luma amount accepted by FFmpeg.
const MAX_UNSHARP_AMOUNT: f32 = 1.5;

/// Escape a path for use inside a quoted filter argument.
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
}

/// Round down to an even value (H.264 chroma subsampling).
pub fn even(value: u32) -> u32 {
    value - (value % 2)
}

/// Largest even size that fits `src` inside `out` without distortion.
pub fn fit_within(src_width: u32, src_height: u32, out_width: u32, out_height: u32) -> (u32, u32) {
    if src_width == 0 || src_height == 0 {
        return (even(out_width), even(out_height));
    }
    let scale = f64::min(
        out_width as f64 / src_width as f64,
        out_height as f64 / src_height as f64,
    );
    let width = even(((src_width as f64 * scale).floor() as u32).min(out_width)).max(2);
    let height = even(((src_height as f64 * scale).floor() as u32).min(out_height)).max(2);
    (width, height)
}

/// Offset that centres `inner` within `outer`.
pub fn center_offset(outer: u32, inner: u32) -> u32 {
    outer.saturating_sub(inner) / 2
}

/// FFmpeg color with an alpha suffix.
pub fn color_with_alpha(color: &str, opacity: f32) -> String {
    format!("{}@{:.2}", color, opacity.clamp(0.0, 1.0))
}

/// Scale-to-fill and centre crop.
pub fn fill_crop(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}",
        w = width,
        h = height
    )
}

/// Scale-to-fill, centre crop and blur: the background layer.
pub fn fill_and_blur(width: u32, height: u32, sigma: f32) -> String {
    let mut filter = fill_crop(width, height);
    if sigma > 0.0 {
        filter.push_str(&format!(",gblur=sigma={}", sigma));
    }
    filter
}

/// Solid box drawn over a region.
pub fn drawbox(x: u32, y: u32, width: u32, height: u32, color: &str) -> String {
    format!("drawbox=x={}:y={}:w={}:h={}:color={}:t=fill", x, y, width, height, color)
}

/// Map effects to a filter chain with a fixed filter order.
///
/// Brightness deltas add, contrast and saturation factors multiply, so the
/// declared order of effects never changes the result.
pub fn effects_chain(effects: &[Effect]) -> Option<String> {
    if effects.is_empty() {
        return None;
    }

    let mut brightness = 0.0f32;
    let mut contrast = 1.0f32;
    let mut saturation = 1.0f32;
    let mut grayscale = false;
    let mut vignette = false;
    let mut sharpen: Vec<f32> = Vec::new();

    for effect in effects {
        match *effect {
            Effect::Brightness { delta } => brightness += delta,
            Effect::Contrast { factor } => contrast *= factor,
            Effect::Saturation { factor } => saturation *= factor,
            Effect::Sharpen { amount } => sharpen.push(amount.clamp(0.0, MAX_UNSHARP_AMOUNT)),
            Effect::Vignette => vignette = true,
            Effect::Grayscale => grayscale = true,
        }
    }

    let mut filters = Vec::new();

    let eq_changed = brightness != 0.0 || contrast != 1.0 || saturation != 1.0;
    if eq_changed {
        filters.push(format!(
            "eq=brightness={:.3}:contrast={:.3}:saturation={:.3}",
            brightness.clamp(-1.0, 1.0),
            contrast.clamp(0.0, 10.0),
            saturation.clamp(0.0, 3.0)
        ));
    }
    if grayscale {
        filters.push("hue=s=0".to_string());
    }
    sharpen.sort_by(|a, b| a.total_cmp(b));
    for amount in sharpen {
        filters.push(format!("unsharp=5:5:{:.2}:5:5:0.0", amount));
    }
    if vignette {
        filters.push("vignette=PI/5".to_string());
    }

    if filters.is_empty() {
        None
    } else {
        Some(filters.join(","))
    }
}

/// Fade in over the first `fade_in` seconds and out over the last `fade_out`
/// seconds of a clip lasting `duration`.
pub fn fade_chain(duration: f64, fade_in: f64, fade_out: f64, color: Option<&str>) -> Vec<String> {
    let color_arg = color.map(|c| format!(":color={}", c)).unwrap_or_default();
    let mut filters = Vec::new();
    if fade_in > 0.0 {
        filters.push(format!("fade=t=in:st=0:d={:.3}{}", fade_in, color_arg));
    }
    if fade_out > 0.0 {
        let start = (duration - fade_out).max(0.0);
        filters.push(format!("fade=t=out:st={:.3}:d={:.3}{}", start, fade_out, color_arg));
    }
    filters
}

/// Overlay position expressions (`x`, `y`) for a corner.
pub fn overlay_position(corner: Corner, margin: u32) -> (String, String) {
    match corner {
        Corner::TopLeft => (margin.to_string(), margin.to_string()),
        Corner::TopRight => (format!("W-w-{}", margin), margin.to_string()),
        Corner::BottomLeft => (margin.to_string(), format!("H-h-{}", margin)),
        Corner::BottomRight => (format!("W-w-{}", margin), format!("H-h-{}", margin)),
    }
}

/// `drawtext` position expressions (`x`, `y`) for a corner.
pub fn drawtext_position(corner: Corner, margin: u32) -> (String, String) {
    match corner {
        Corner::TopLeft => (margin.to_string(), margin.to_string()),
        Corner::TopRight => (format!("w-tw-{}", margin), margin.to_string()),
        Corner::BottomLeft => (margin.to_string(), format!("h-th-{}", margin)),
        Corner::BottomRight => (format!("w-tw-{}", margin), format!("h-th-{}", margin)),
    }
}

/// Font selection argument for `drawtext`.
pub fn font_arg(font: &str, is_file: bool) -> String {
    if is_file {
        format!("fontfile='{}'", escape_filter_path(Path::new(font)))
    } else {
        format!("font='{}'", font.replace('\'', ""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_landscape_into_portrait() {
        // 1080 * (1080/1920) = 607.5, floored to 607, even 606
        assert_eq!(fit_within(1920, 1080, 1080, 1920), (1080, 606));
    }

    #[test]
    fn test_fit_never_distorts() {
        let (w, h) = fit_within(720, 1280, 1080, 1920);
        assert_eq!((w, h), (1080, 1920));

        let (w, h) = fit_within(1000, 3000, 1080, 1920);
        assert_eq!(h, 1920);
        assert_eq!(w, 640);
        assert!(w % 2 == 0 && h % 2 == 0);
    }

    #[test]
    fn test_center_offset() {
        assert_eq!(center_offset(1920, 606), 657);
        assert_eq!(center_offset(100, 200), 0);
    }

    #[test]
    fn test_background_filter() {
        let filter = fill_and_blur(1080, 1920, 30.0);
        assert!(filter.contains("force_original_aspect_ratio=increase"));
        assert!(filter.contains("crop=1080:1920"));
        assert!(filter.contains("gblur=sigma=30"));
        assert!(!fill_and_blur(1080, 1920, 0.0).contains("gblur"));
    }

    #[test]
    fn test_effects_are_order_independent() {
        let a = effects_chain(&[
            Effect::Brightness { delta: 0.1 },
            Effect::sharpen(),
            Effect::Contrast { factor: 1.2 },
        ]);
        let b = effects_chain(&[
            Effect::Contrast { factor: 1.2 },
            Effect::Brightness { delta: 0.1 },
            Effect::sharpen(),
        ]);
        assert_eq!(a, b);
        let chain = a.unwrap();
        assert!(chain.starts_with("eq=brightness=0.100:contrast=1.200"));
        assert!(chain.contains("unsharp=5:5:0.80"));
    }

    #[test]
    fn test_effects_chain_variants() {
        assert!(effects_chain(&[]).is_none());
        let chain = effects_chain(&[Effect::Grayscale, Effect::Vignette]).unwrap();
        assert_eq!(chain, "hue=s=0,vignette=PI/5");
        let sharp = effects_chain(&[Effect::Sharpen { amount: 9.0 }]).unwrap();
        assert!(sharp.contains("1.50"));
    }

    #[test]
    fn test_fade_chain() {
        let fades = fade_chain(10.0, 0.5, 0.5, None);
        assert_eq!(fades, vec!["fade=t=in:st=0:d=0.500", "fade=t=out:st=9.500:d=0.500"]);
        assert!(fade_chain(10.0, 0.0, 0.0, None).is_empty());
        let colored = fade_chain(4.0, 1.0, 0.0, Some("white"));
        assert_eq!(colored, vec!["fade=t=in:st=0:d=1.000:color=white"]);
    }

    #[test]
    fn test_positions() {
        assert_eq!(
            overlay_position(Corner::BottomRight, 40),
            ("W-w-40".to_string(), "H-h-40".to_string())
        );
        assert_eq!(
            drawtext_position(Corner::TopLeft, 10),
            ("10".to_string(), "10".to_string())
        );
    }

    #[test]
    fn test_escape_filter_path() {
        assert_eq!(
            escape_filter_path(Path::new("C:/it's/logo.png")),
            "C\\:/it\\'s/logo.png"
        );
    }
}
