//! Pure scoring primitives over decoded frames and probe data.
//!
//! Shared by the quality evaluator and thumbnail candidate selection.

use crate::frames::GrayFrame;
use vcomp_models::Resolution;

/// Variance of the 4-neighbour Laplacian response over interior pixels.
///
/// Higher values mean more edge energy (a sharper frame). Frames smaller
/// than 3x3 score 0.
pub fn laplacian_variance(frame: &GrayFrame) -> f64 {
    if frame.width < 3 || frame.height < 3 {
        return 0.0;
    }

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0u64;

    for y in 1..frame.height - 1 {
        for x in 1..frame.width - 1 {
            let center = frame.get(x, y) as f64;
            let response = frame.get(x - 1, y) as f64
                + frame.get(x + 1, y) as f64
                + frame.get(x, y - 1) as f64
                + frame.get(x, y + 1) as f64
                - 4.0 * center;
            sum += response;
            sum_sq += response * response;
            count += 1;
        }
    }

    let n = count as f64;
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

/// Mean absolute per-pixel difference on the 0-255 scale.
///
/// `None` when the frames differ in size.
pub fn mean_abs_diff(a: &GrayFrame, b: &GrayFrame) -> Option<f64> {
    if a.width != b.width || a.height != b.height || a.data.is_empty() {
        return None;
    }
    let total: u64 = a
        .data
        .iter()
        .zip(&b.data)
        .map(|(&p, &q)| p.abs_diff(q) as u64)
        .sum();
    Some(total as f64 / a.data.len() as f64)
}

/// Average difference between consecutive frames.
pub fn motion_between(frames: &[GrayFrame]) -> f64 {
    let diffs: Vec<f64> = frames
        .windows(2)
        .filter_map(|pair| mean_abs_diff(&pair[0], &pair[1]))
        .collect();
    if diffs.is_empty() {
        return 0.0;
    }
    diffs.iter().sum::<f64>() / diffs.len() as f64
}

/// Map `value` onto `[0, 1]` against an empirical ceiling.
pub fn normalize(value: f64, ceiling: f64) -> f64 {
    if !value.is_finite() || ceiling <= 0.0 {
        return 0.0;
    }
    (value / ceiling).clamp(0.0, 1.0)
}

/// `min(1, rendered area / reference area)`.
pub fn resolution_score(rendered: Resolution, reference: Resolution) -> f64 {
    let reference_area = reference.pixel_area();
    if reference_area == 0 {
        return 0.0;
    }
    (rendered.pixel_area() as f64 / reference_area as f64).min(1.0)
}

/// Effective bitrate in bits per second.
pub fn effective_bitrate(size_bytes: u64, duration_secs: f64) -> Option<f64> {
    if size_bytes == 0 || !duration_secs.is_finite() || duration_secs <= 0.0 {
        return None;
    }
    Some(size_bytes as f64 * 8.0 / duration_secs)
}

/// 1.0 at or under the target bitrate, `target / effective` above it.
pub fn compression_score(size_bytes: u64, duration_secs: f64, target_bps: u64) -> f64 {
    let Some(effective) = effective_bitrate(size_bytes, duration_secs) else {
        return 0.0;
    };
    if target_bps == 0 {
        return 0.0;
    }
    let target = target_bps as f64;
    if effective <= target {
        1.0
    } else {
        target / effective
    }
}

/// Score the drift between audio and video stream lengths.
///
/// `max(0, 1 - drift / tolerance)`; 0 without an audio stream.
pub fn audio_sync_score(video_duration: f64, audio_duration: Option<f64>, tolerance_secs: f64) -> f64 {
    let Some(audio) = audio_duration else {
        return 0.0;
    };
    if tolerance_secs <= 0.0 {
        return if (audio - video_duration).abs() == 0.0 { 1.0 } else { 0.0 };
    }
    (1.0 - (audio - video_duration).abs() / tolerance_secs).max(0.0)
}

/// Exact resolution match and frame rate within ±10% of the target.
pub fn is_compliant(rendered: Resolution, fps: f64, reference: Resolution, target_fps: u32) -> bool {
    let target = target_fps as f64;
    rendered == reference && fps >= target * 0.9 && fps <= target * 1.1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(width: u32, height: u32, value: u8) -> GrayFrame {
        GrayFrame::new(width, height, vec![value; (width * height) as usize]).unwrap()
    }

    fn checkerboard(width: u32, height: u32) -> GrayFrame {
        let data = (0..height)
            .flat_map(|y| (0..width).map(move |x| if (x + y) % 2 == 0 { 255 } else { 0 }))
            .collect();
        GrayFrame::new(width, height, data).unwrap()
    }

    #[test]
    fn test_laplacian_flat_vs_sharp() {
        assert_eq!(laplacian_variance(&flat(16, 16, 128)), 0.0);
        let sharp = laplacian_variance(&checkerboard(16, 16));
        assert!(sharp > 1000.0);
        assert_eq!(laplacian_variance(&flat(2, 2, 0)), 0.0);
    }

    #[test]
    fn test_laplacian_is_deterministic() {
        let frame = checkerboard(32, 24);
        assert_eq!(laplacian_variance(&frame), laplacian_variance(&frame));
    }

    #[test]
    fn test_mean_abs_diff() {
        let a = flat(4, 4, 10);
        let b = flat(4, 4, 40);
        assert_eq!(mean_abs_diff(&a, &b), Some(30.0));
        assert_eq!(mean_abs_diff(&a, &flat(2, 2, 0)), None);
        assert_eq!(motion_between(&[a.clone(), b.clone(), a]), 30.0);
        assert_eq!(motion_between(&[b]), 0.0);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(500.0, 1000.0), 0.5);
        assert_eq!(normalize(5000.0, 1000.0), 1.0);
        assert_eq!(normalize(f64::NAN, 1000.0), 0.0);
        assert_eq!(normalize(1.0, 0.0), 0.0);
    }

    #[test]
    fn test_resolution_score() {
        let reference = Resolution::new(1080, 1920);
        assert_eq!(resolution_score(reference, reference), 1.0);
        assert_eq!(resolution_score(Resolution::new(540, 960), reference), 0.25);
        assert_eq!(resolution_score(Resolution::new(2160, 3840), reference), 1.0);
    }

    #[test]
    fn test_compression_score() {
        // 7.5 MB over 10 s = 6 Mbps
        assert_eq!(compression_score(7_500_000, 10.0, 6_000_000), 1.0);
        // 15 MB over 10 s = 12 Mbps
        assert!((compression_score(15_000_000, 10.0, 6_000_000) - 0.5).abs() < 1e-9);
        assert_eq!(compression_score(0, 10.0, 6_000_000), 0.0);
        assert_eq!(compression_score(1000, 0.0, 6_000_000), 0.0);
    }

    #[test]
    fn test_audio_sync_score() {
        assert_eq!(audio_sync_score(10.0, Some(10.0), 0.5), 1.0);
        assert!((audio_sync_score(10.0, Some(10.25), 0.5) - 0.5).abs() < 1e-9);
        assert_eq!(audio_sync_score(10.0, Some(12.0), 0.5), 0.0);
        assert_eq!(audio_sync_score(10.0, None, 0.5), 0.0);
    }

    #[test]
    fn test_compliance() {
        let reference = Resolution::new(1080, 1920);
        assert!(is_compliant(reference, 30.0, reference, 30));
        assert!(is_compliant(reference, 29.97, reference, 30));
        assert!(!is_compliant(reference, 24.0, reference, 30));
        assert!(!is_compliant(Resolution::new(720, 1280), 30.0, reference, 30));
    }
}
