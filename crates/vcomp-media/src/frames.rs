//! Raw frame extraction through FFmpeg `rawvideo` output.

use image::RgbImage;
use std::path::Path;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Timeout for a single frame grab.
const FRAME_TIMEOUT_SECS: u64 = 60;

/// Single-channel intensity frame.
#[derive(Debug, Clone, PartialEq)]
pub struct GrayFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl GrayFrame {
    /// Wrap a raw buffer, checking its length against the dimensions.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> MediaResult<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(MediaError::InvalidVideo(format!(
                "frame buffer has {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Convert an RGB image using BT.601 luma weights.
    pub fn from_rgb(image: &RgbImage) -> Self {
        let data = image
            .pixels()
            .map(|p| {
                let [r, g, b] = p.0;
                (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64).round() as u8
            })
            .collect();
        Self {
            width: image.width(),
            height: image.height(),
            data,
        }
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }
}

/// Even-sized frame dimensions at `width`, preserving the source aspect.
pub fn scaled_size(src_width: u32, src_height: u32, width: u32) -> (u32, u32) {
    if src_width == 0 || src_height == 0 {
        return (even(width), even(width));
    }
    let width = even(width.min(src_width).max(2));
    let height = (src_height as f64 * width as f64 / src_width as f64).round() as u32;
    (width, even(height.max(2)))
}

fn even(value: u32) -> u32 {
    value - (value % 2)
}

/// Build the stdout command for one frame at `timestamp`, scaled to `width`x`height`.
pub fn frame_command(
    video_path: &Path,
    timestamp: f64,
    width: u32,
    height: u32,
    pixel_format: &str,
) -> FfmpegCommand {
    FfmpegCommand::to_stdout(video_path)
        .seek(timestamp.max(0.0))
        .output_args([
            "-frames:v".to_string(),
            "1".to_string(),
            "-vf".to_string(),
            format!("scale={}:{}:flags=bicubic", width, height),
            "-pix_fmt".to_string(),
            pixel_format.to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
        ])
}

async fn grab(
    video_path: &Path,
    timestamp: f64,
    width: u32,
    height: u32,
    pixel_format: &str,
    channels: usize,
) -> MediaResult<Vec<u8>> {
    let cmd = frame_command(video_path, timestamp, width, height, pixel_format);
    let buffer = FfmpegRunner::new()
        .with_timeout(FRAME_TIMEOUT_SECS)
        .capture_stdout(&cmd)
        .await?;

    let bytes_per_frame = width as usize * height as usize * channels;
    debug!(
        path = %video_path.display(),
        timestamp,
        bytes = buffer.len(),
        "Extracted raw frame"
    );

    if buffer.len() < bytes_per_frame {
        return Err(MediaError::InvalidVideo(format!(
            "no frame decoded at {:.3}s from {}",
            timestamp,
            video_path.display()
        )));
    }

    let mut buffer = buffer;
    buffer.truncate(bytes_per_frame);
    Ok(buffer)
}

/// Extract a grayscale frame at `timestamp`.
pub async fn extract_gray_frame(
    video_path: impl AsRef<Path>,
    timestamp: f64,
    width: u32,
    height: u32,
) -> MediaResult<GrayFrame> {
    let data = grab(video_path.as_ref(), timestamp, width, height, "gray", 1).await?;
    GrayFrame::new(width, height, data)
}

/// Extract an RGB frame at `timestamp`.
pub async fn extract_rgb_frame(
    video_path: impl AsRef<Path>,
    timestamp: f64,
    width: u32,
    height: u32,
) -> MediaResult<RgbImage> {
    let data = grab(video_path.as_ref(), timestamp, width, height, "rgb24", 3).await?;
    RgbImage::from_raw(width, height, data)
        .ok_or_else(|| MediaError::internal("RGB buffer does not match frame size"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_frame_length_check() {
        assert!(GrayFrame::new(2, 2, vec![0; 4]).is_ok());
        assert!(GrayFrame::new(2, 2, vec![0; 3]).is_err());
    }

    #[test]
    fn test_from_rgb_luma() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, image::Rgb([255, 255, 255]));
        image.put_pixel(1, 0, image::Rgb([0, 0, 0]));
        let frame = GrayFrame::from_rgb(&image);
        assert_eq!(frame.get(0, 0), 255);
        assert_eq!(frame.get(1, 0), 0);
    }

    #[test]
    fn test_scaled_size_keeps_aspect_and_parity() {
        assert_eq!(scaled_size(1080, 1920, 360), (360, 640));
        assert_eq!(scaled_size(1920, 1080, 360), (360, 202));
        // Never upscales past the source width
        assert_eq!(scaled_size(200, 400, 360), (200, 400));
    }

    #[test]
    fn test_frame_command_args() {
        let args = frame_command(Path::new("in.mp4"), 2.5, 360, 640, "gray").build_args();
        assert!(args.contains(&"rawvideo".to_string()));
        assert!(args.contains(&"gray".to_string()));
        assert!(args.contains(&"2.500".to_string()));
        assert!(args.contains(&"scale=360:640:flags=bicubic".to_string()));
    }
}
