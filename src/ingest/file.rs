//! Local video file frame extractor.
//!
//! `VideoFile` decodes a local clip up to a requested time and captures one
//! RGB frame at native resolution. Out-of-range timestamps never fail; they
//! clamp to the nearest valid bound first.
//!
//! Every extraction opens and decodes the file independently. Two objects
//! sharing a timestamp decode twice.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use std::path::Path;

#[cfg(feature = "video-ffmpeg")]
use super::file_ffmpeg::FfmpegVideo;
use crate::jpeg;

const DEFAULT_STUB_WIDTH: u32 = 640;
const DEFAULT_STUB_HEIGHT: u32 = 480;
const DEFAULT_STUB_SECONDS: f64 = 10.0;

/// Clamp a requested time into `[0, duration]`.
///
/// NaN maps to 0. When the container reports no duration only the lower
/// bound applies.
pub fn clamp_timestamp(timestamp: f64, duration: Option<f64>) -> f64 {
    if timestamp.is_nan() {
        return 0.0;
    }
    let upper = duration
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(f64::INFINITY);
    timestamp.clamp(0.0, upper)
}

/// Decode the frame nearest `timestamp` seconds as an RGB raster.
pub fn extract_rgb(path: &Path, timestamp: f64) -> Result<RgbImage> {
    let mut video = VideoFile::open(path)?;
    video.frame_at(timestamp)
}

/// Decode the frame nearest `timestamp` seconds and encode it as JPEG.
pub fn extract_frame(path: &Path, timestamp: f64, quality: u8) -> Result<Vec<u8>> {
    let frame = extract_rgb(path, timestamp)?;
    jpeg::encode(&frame, quality)
}

/// An opened local video.
pub struct VideoFile {
    backend: VideoBackend,
}

enum VideoBackend {
    Synthetic(SyntheticVideo),
    #[cfg(feature = "video-ffmpeg")]
    Ffmpeg(FfmpegVideo),
}

impl VideoFile {
    /// Open a local file, or a `stub://WIDTHxHEIGHT@SECONDS` synthetic clip.
    pub fn open(path: &Path) -> Result<Self> {
        let display = path.to_string_lossy();
        if let Some(spec) = display.strip_prefix("stub://") {
            return Ok(Self {
                backend: VideoBackend::Synthetic(SyntheticVideo::parse(spec)?),
            });
        }
        if display.trim().is_empty() || display.contains("://") {
            return Err(anyhow!(
                "frame extraction only supports local paths (no URL schemes)"
            ));
        }
        #[cfg(feature = "video-ffmpeg")]
        {
            Ok(Self {
                backend: VideoBackend::Ffmpeg(FfmpegVideo::open(path)?),
            })
        }
        #[cfg(not(feature = "video-ffmpeg"))]
        {
            Err(anyhow!(
                "decoding '{}' requires the video-ffmpeg feature",
                display
            ))
        }
    }

    /// Clip duration in seconds, when known.
    pub fn duration(&self) -> Option<f64> {
        match &self.backend {
            VideoBackend::Synthetic(video) => Some(video.seconds),
            #[cfg(feature = "video-ffmpeg")]
            VideoBackend::Ffmpeg(video) => video.duration(),
        }
    }

    /// Capture one frame at (clamped) `timestamp` seconds.
    pub fn frame_at(&mut self, timestamp: f64) -> Result<RgbImage> {
        let target = clamp_timestamp(timestamp, self.duration());
        if target != timestamp {
            log::debug!("timestamp {:.3}s clamped to {:.3}s", timestamp, target);
        }
        match &mut self.backend {
            VideoBackend::Synthetic(video) => video.frame_at(target),
            #[cfg(feature = "video-ffmpeg")]
            VideoBackend::Ffmpeg(video) => video
                .frame_at(target)
                .with_context(|| format!("extract frame at {:.3}s", target)),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic clip (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticVideo {
    width: u32,
    height: u32,
    seconds: f64,
}

impl SyntheticVideo {
    fn parse(spec: &str) -> Result<Self> {
        let (size, seconds) = match spec.split_once('@') {
            Some((size, seconds)) => (size, Some(seconds)),
            None => (spec, None),
        };
        let (width, height) = match size.split_once('x') {
            Some((w, h)) => (
                w.parse().context("stub width")?,
                h.parse().context("stub height")?,
            ),
            None => (DEFAULT_STUB_WIDTH, DEFAULT_STUB_HEIGHT),
        };
        let seconds = match seconds {
            Some(s) => s.parse().context("stub duration")?,
            None => DEFAULT_STUB_SECONDS,
        };
        if width == 0 || height == 0 {
            return Err(anyhow!("stub video must have non-zero dimensions"));
        }
        Ok(Self {
            width,
            height,
            seconds,
        })
    }

    fn frame_at(&self, timestamp: f64) -> Result<RgbImage> {
        if !(0.0..=self.seconds).contains(&timestamp) {
            return Err(anyhow!(
                "seek to {:.3}s outside stub clip of {:.3}s",
                timestamp,
                self.seconds
            ));
        }
        let shade = ((timestamp * 10.0) as u32 % 256) as u8;
        Ok(RgbImage::from_fn(self.width, self.height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, shade])
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_keeps_in_range_values() {
        assert_eq!(clamp_timestamp(3.25, Some(10.0)), 3.25);
        assert_eq!(clamp_timestamp(0.0, Some(10.0)), 0.0);
        assert_eq!(clamp_timestamp(10.0, Some(10.0)), 10.0);
    }

    #[test]
    fn clamp_pulls_out_of_range_values_to_bounds() {
        assert_eq!(clamp_timestamp(-4.0, Some(10.0)), 0.0);
        assert_eq!(clamp_timestamp(42.0, Some(10.0)), 10.0);
        assert_eq!(clamp_timestamp(f64::INFINITY, Some(10.0)), 10.0);
        assert_eq!(clamp_timestamp(f64::NAN, Some(10.0)), 0.0);
    }

    #[test]
    fn clamp_without_duration_only_bounds_below() {
        assert_eq!(clamp_timestamp(-1.0, None), 0.0);
        assert_eq!(clamp_timestamp(1e6, None), 1e6);
        assert_eq!(clamp_timestamp(5.0, Some(0.0)), 5.0);
    }

    #[test]
    fn out_of_range_timestamps_still_yield_a_frame() -> Result<()> {
        let path = Path::new("stub://64x48@5");
        for t in [-10.0, 0.0, 2.5, 5.0, 99.0] {
            let frame = extract_rgb(path, t)?;
            assert_eq!(frame.dimensions(), (64, 48));
        }
        Ok(())
    }

    #[test]
    fn extracted_frame_is_jpeg_at_native_resolution() -> Result<()> {
        let bytes = extract_frame(Path::new("stub://120x80@2"), 1.0, 90)?;
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = jpeg::decode(&bytes)?;
        assert_eq!(decoded.dimensions(), (120, 80));
        Ok(())
    }

    #[test]
    fn url_paths_are_rejected() {
        assert!(VideoFile::open(Path::new("https://example.com/clip.mp4")).is_err());
        assert!(VideoFile::open(Path::new("")).is_err());
    }

    #[test]
    fn malformed_stub_uri_is_rejected() {
        assert!(VideoFile::open(Path::new("stub://0x10@1")).is_err());
        assert!(VideoFile::open(Path::new("stub://axb@1")).is_err());
    }
}
