//! Thumbnail extraction.
//!
//! A frame is pulled as raw RGB, styled with the `image` crate and written
//! as a JPEG. With candidates enabled, the sharpest of several frames wins,
//! scored with the same Laplacian statistic as the quality evaluator.

use image::codecs::jpeg::JpegEncoder;
use image::{imageops, RgbImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};
use crate::frames::{extract_rgb_frame, scaled_size, GrayFrame};
use crate::probe::probe_video;
use crate::quality::laplacian_variance;
use vcomp_models::{ThumbnailOptions, ThumbnailStyle};

/// Contrast increase for [`ThumbnailStyle::ContrastBoost`].
const CONTRAST_BOOST: f32 = 20.0;
/// Share of the frame height darkened for [`ThumbnailStyle::TextOverlay`].
const OVERLAY_BAND_RATIO: f64 = 0.35;
/// Brightness kept inside the darkened band.
const OVERLAY_BAND_KEEP: f64 = 0.55;

/// A written thumbnail.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailOutput {
    pub path: PathBuf,
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    /// Laplacian variance of the chosen frame
    pub sharpness: f64,
}

/// Thumbnail file name for an output stem.
pub fn thumbnail_name(output_stem: &str) -> String {
    format!("{output_stem}.jpg")
}

/// Timestamps to consider: the configured one first, then evenly spaced
/// candidates.
pub fn candidate_timestamps(duration: f64, options: &ThumbnailOptions) -> Vec<f64> {
    let mut timestamps = vec![options.timestamp_for(duration)];
    if duration > 0.0 {
        let n = options.candidates as f64;
        timestamps.extend((1..=options.candidates).map(|k| duration * k as f64 / (n + 1.0)));
    }
    timestamps
}

/// Apply the style post-processing.
pub fn apply_style(image: RgbImage, style: ThumbnailStyle) -> RgbImage {
    match style {
        ThumbnailStyle::Standard => image,
        ThumbnailStyle::ContrastBoost => imageops::contrast(&image, CONTRAST_BOOST),
        ThumbnailStyle::TextOverlay => darken_top_band(image),
    }
}

fn darken_top_band(mut image: RgbImage) -> RgbImage {
    let band = (image.height() as f64 * OVERLAY_BAND_RATIO).round() as u32;
    for y in 0..band.min(image.height()) {
        for x in 0..image.width() {
            let pixel = image.get_pixel_mut(x, y);
            for channel in pixel.0.iter_mut() {
                *channel = (*channel as f64 * OVERLAY_BAND_KEEP).round() as u8;
            }
        }
    }
    image
}

/// Write `image` as a JPEG.
pub fn write_jpeg(image: &RgbImage, quality: u8, path: &Path) -> MediaResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100)).encode_image(image)?;
    Ok(())
}

/// Extract, style and save a thumbnail for `video_path`.
pub async fn generate_thumbnail(
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    options: &ThumbnailOptions,
) -> MediaResult<ThumbnailOutput> {
    let video_path = video_path.as_ref();
    let output_path = output_path.as_ref().to_path_buf();

    let info = probe_video(video_path).await?;
    let (width, height) = scaled_size(info.width, info.height, options.width);

    let mut best: Option<(f64, f64, RgbImage)> = None;
    for timestamp in candidate_timestamps(info.duration, options) {
        let frame = extract_rgb_frame(video_path, timestamp, width, height).await?;
        let sharpness = laplacian_variance(&GrayFrame::from_rgb(&frame));
        debug!(timestamp, sharpness, "Scored thumbnail candidate");
        if best.as_ref().map_or(true, |(score, _, _)| sharpness > *score) {
            best = Some((sharpness, timestamp, frame));
        }
    }
    let (sharpness, timestamp, frame) =
        best.ok_or_else(|| MediaError::internal("no thumbnail candidates"))?;

    let styled = apply_style(frame, options.style);
    let quality = options.jpeg_quality();
    let target = output_path.clone();
    tokio::task::spawn_blocking(move || write_jpeg(&styled, quality, &target))
        .await
        .map_err(|e| MediaError::internal(format!("thumbnail writer panicked: {e}")))??;

    info!(
        path = %output_path.display(),
        timestamp = %format!("{:.2}", timestamp),
        style = ?options.style,
        "Thumbnail written"
    );

    Ok(ThumbnailOutput {
        path: output_path,
        timestamp,
        width,
        height,
        sharpness,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tempfile::TempDir;

    fn solid(width: u32, height: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([value, value, value]))
    }

    #[test]
    fn test_thumbnail_name() {
        assert_eq!(thumbnail_name("final"), "final.jpg");
    }

    #[test]
    fn test_candidate_timestamps() {
        let options = ThumbnailOptions::default();
        assert_eq!(candidate_timestamps(20.0, &options), vec![6.0]);

        let options = ThumbnailOptions {
            candidates: 3,
            ..Default::default()
        };
        assert_eq!(candidate_timestamps(20.0, &options), vec![6.0, 5.0, 10.0, 15.0]);
        assert_eq!(candidate_timestamps(0.0, &options), vec![0.0]);
    }

    #[test]
    fn test_text_overlay_darkens_top_band() {
        let styled = apply_style(solid(10, 20, 200), ThumbnailStyle::TextOverlay);
        // 35% of 20 rows = 7
        assert_eq!(styled.get_pixel(0, 0).0, [110, 110, 110]);
        assert_eq!(styled.get_pixel(9, 6).0, [110, 110, 110]);
        assert_eq!(styled.get_pixel(0, 7).0, [200, 200, 200]);
    }

    #[test]
    fn test_contrast_boost_spreads_values() {
        let mut image = solid(2, 1, 100);
        image.put_pixel(1, 0, Rgb([180, 180, 180]));
        let styled = apply_style(image, ThumbnailStyle::ContrastBoost);
        let dark = styled.get_pixel(0, 0).0[0];
        let light = styled.get_pixel(1, 0).0[0];
        assert!(dark < 100);
        assert!(light > 180);
    }

    #[test]
    fn test_standard_is_unchanged() {
        let image = solid(4, 4, 77);
        assert_eq!(apply_style(image.clone(), ThumbnailStyle::Standard), image);
    }

    #[test]
    fn test_write_jpeg() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("thumb.jpg");
        write_jpeg(&solid(16, 16, 128), 90, &path).unwrap();

        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 16));
    }
}
