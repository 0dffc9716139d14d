//! Frame extraction from local video files.
//!
//! - Local video files decoded with FFmpeg (feature: video-ffmpeg)
//! - Synthetic `stub://` clips (testing)
//!
//! Extraction runs once per detected object and is never shared between
//! objects, even for identical timestamps.

pub mod file;
#[cfg(feature = "video-ffmpeg")]
pub(crate) mod file_ffmpeg;

pub use file::{clamp_timestamp, extract_frame, extract_rgb, VideoFile};
